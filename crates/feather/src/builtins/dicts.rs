//! The `dict` ensemble. Dicts are ordered string→value mappings; every
//! mutating subcommand works on a fresh host copy so value semantics hold.

use crate::{
    error::FeatherError,
    eval::Evaluator,
    handle::ValueId,
    host::HostOps,
    status::{FlowResult, Unwind},
};

use super::{bad_subcommand, check_arity};

const SUBCOMMANDS: &[&str] = &[
    "append", "create", "exists", "for", "get", "incr", "keys", "lappend", "merge", "set", "size",
    "unset", "values", "with",
];

pub(super) fn dict_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "dict subcommand ?arg ...?")?;
    let sub = ev.value_text(argv[1]);
    match sub.as_str() {
        "create" => create(ev, argv),
        "get" => get(ev, argv),
        "set" => set(ev, argv),
        "unset" => unset(ev, argv),
        "exists" => exists(ev, argv),
        "keys" => keys(ev, argv),
        "values" => values(ev, argv),
        "size" => size(ev, argv),
        "for" => for_cmd(ev, argv),
        "merge" => merge(ev, argv),
        "with" => with(ev, argv),
        "incr" => incr(ev, argv),
        "append" => append(ev, argv),
        "lappend" => lappend(ev, argv),
        other => Err(bad_subcommand(other, SUBCOMMANDS).into()),
    }
}

fn missing_key(key: &str) -> FeatherError {
    FeatherError::with_code(
        format!("key \"{key}\" not known in dictionary"),
        format!("TCL LOOKUP DICT {key}"),
    )
}

fn dict_copy<H: HostOps>(ev: &mut Evaluator<'_, H>, value: ValueId) -> FlowResult<ValueId> {
    ev.host
        .dict_from(ev.interp, value)
        .map_err(|e| Unwind::Error(e.into()))
}

fn create<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    if argv.len() % 2 != 0 {
        return Err(FeatherError::wrong_num_args("dict create ?key value ...?").into());
    }
    let dict = ev.host.dict_new(ev.interp);
    for pair in argv[2..].chunks_exact(2) {
        let key = ev.value_text(pair[0]);
        ev.host.dict_set(ev.interp, dict, &key, pair[1]);
    }
    Ok(dict)
}

fn get<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, None, "dict get dictionary ?key ...?")?;
    let mut current = argv[2];
    for &key_arg in &argv[3..] {
        let key = ev.value_text(key_arg);
        match ev
            .host
            .dict_get(ev.interp, current, &key)
            .map_err(FeatherError::from)?
        {
            Some(value) => current = value,
            None => return Err(missing_key(&key).into()),
        }
    }
    Ok(current)
}

/// Rebuilds a nested path with `new` stored at the leaf, copying each level.
fn set_path<H: HostOps>(
    ev: &mut Evaluator<'_, H>,
    value: ValueId,
    keys: &[String],
    new: ValueId,
) -> FlowResult<ValueId> {
    let copy = dict_copy(ev, value)?;
    if keys.len() == 1 {
        ev.host.dict_set(ev.interp, copy, &keys[0], new);
        return Ok(copy);
    }
    let inner = match ev
        .host
        .dict_get(ev.interp, copy, &keys[0])
        .map_err(FeatherError::from)?
    {
        Some(existing) => existing,
        None => ev.host.dict_new(ev.interp),
    };
    let rebuilt = set_path(ev, inner, &keys[1..], new)?;
    ev.host.dict_set(ev.interp, copy, &keys[0], rebuilt);
    Ok(copy)
}

fn read_dict_var<H: HostOps>(ev: &mut Evaluator<'_, H>, name: &str) -> FlowResult<ValueId> {
    if ev.var_exists(name) {
        ev.var_read(name)
    } else {
        Ok(ev.host.dict_new(ev.interp))
    }
}

fn set<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 5, None, "dict set dictVarName key ?key ...? value")?;
    let name = ev.value_text(argv[2]);
    let current = read_dict_var(ev, &name)?;
    let keys: Vec<String> = argv[3..argv.len() - 1]
        .iter()
        .map(|&k| ev.value_text(k))
        .collect();
    let updated = set_path(ev, current, &keys, argv[argv.len() - 1])?;
    ev.var_write(&name, updated)
}

fn unset_path<H: HostOps>(
    ev: &mut Evaluator<'_, H>,
    value: ValueId,
    keys: &[String],
) -> FlowResult<ValueId> {
    let copy = dict_copy(ev, value)?;
    if keys.len() == 1 {
        ev.host.dict_remove(ev.interp, copy, &keys[0]);
        return Ok(copy);
    }
    match ev
        .host
        .dict_get(ev.interp, copy, &keys[0])
        .map_err(FeatherError::from)?
    {
        Some(inner) => {
            let rebuilt = unset_path(ev, inner, &keys[1..])?;
            ev.host.dict_set(ev.interp, copy, &keys[0], rebuilt);
            Ok(copy)
        }
        None => Err(missing_key(&keys[0]).into()),
    }
}

fn unset<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, None, "dict unset dictVarName key ?key ...?")?;
    let name = ev.value_text(argv[2]);
    let current = read_dict_var(ev, &name)?;
    let keys: Vec<String> = argv[3..].iter().map(|&k| ev.value_text(k)).collect();
    let updated = unset_path(ev, current, &keys)?;
    ev.var_write(&name, updated)
}

fn exists<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, None, "dict exists dictionary key ?key ...?")?;
    let mut current = argv[2];
    for &key_arg in &argv[3..] {
        let key = ev.value_text(key_arg);
        match ev.host.dict_get(ev.interp, current, &key) {
            Ok(Some(value)) => current = value,
            Ok(None) | Err(_) => return Ok(ev.int(0)),
        }
    }
    Ok(ev.int(1))
}

fn keys<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(4), "dict keys dictionary ?pattern?")?;
    let all = ev
        .host
        .dict_keys(ev.interp, argv[2])
        .map_err(FeatherError::from)?;
    let filtered = match argv.get(3) {
        Some(&pattern_arg) => {
            let pattern = ev.value_text(pattern_arg);
            all.into_iter()
                .filter(|k| ev.host.str_match(&pattern, k, false))
                .collect()
        }
        None => all,
    };
    Ok(ev.make_str_list(&filtered))
}

fn values<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(4), "dict values dictionary ?pattern?")?;
    let keys = ev
        .host
        .dict_keys(ev.interp, argv[2])
        .map_err(FeatherError::from)?;
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(value) = ev
            .host
            .dict_get(ev.interp, argv[2], &key)
            .map_err(FeatherError::from)?
        {
            if let Some(&pattern_arg) = argv.get(3) {
                let pattern = ev.value_text(pattern_arg);
                let text = ev.value_text(value);
                if !ev.host.str_match(&pattern, &text, false) {
                    continue;
                }
            }
            out.push(value);
        }
    }
    Ok(ev.make_list(&out))
}

fn size<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(3), "dict size dictionary")?;
    let n = ev
        .host
        .dict_size(ev.interp, argv[2])
        .map_err(FeatherError::from)?;
    Ok(ev.int(n as i64))
}

fn for_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 5, Some(5), "dict for {keyVarName valueVarName} dictionary script")?;
    let vars = ev.list_items(argv[2])?;
    let [key_var, value_var] = vars.as_slice() else {
        return Err(FeatherError::new("must have exactly two variable names").into());
    };
    let key_name = ev.value_text(*key_var);
    let value_name = ev.value_text(*value_var);
    let keys = ev
        .host
        .dict_keys(ev.interp, argv[3])
        .map_err(FeatherError::from)?;
    let body = ev.value_text(argv[4]);
    for key in keys {
        let Some(value) = ev
            .host
            .dict_get(ev.interp, argv[3], &key)
            .map_err(FeatherError::from)?
        else {
            continue;
        };
        let key_value = ev.intern(&key);
        ev.var_write(&key_name, key_value)?;
        ev.var_write(&value_name, value)?;
        match ev.eval_script(&body) {
            Ok(_) => {}
            Err(Unwind::Break) => break,
            Err(Unwind::Continue) => {}
            Err(other) => return Err(other),
        }
    }
    Ok(ev.empty())
}

fn merge<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    let merged = ev.host.dict_new(ev.interp);
    for &arg in &argv[2..] {
        let keys = ev
            .host
            .dict_keys(ev.interp, arg)
            .map_err(FeatherError::from)?;
        for key in keys {
            if let Some(value) = ev
                .host
                .dict_get(ev.interp, arg, &key)
                .map_err(FeatherError::from)?
            {
                ev.host.dict_set(ev.interp, merged, &key, value);
            }
        }
    }
    Ok(merged)
}

fn with<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, None, "dict with dictVarName ?key ...? script")?;
    let name = ev.value_text(argv[2]);
    let keys: Vec<String> = argv[3..argv.len() - 1]
        .iter()
        .map(|&k| ev.value_text(k))
        .collect();
    let root = ev.var_read(&name)?;
    let mut target = root;
    for key in &keys {
        match ev
            .host
            .dict_get(ev.interp, target, key)
            .map_err(FeatherError::from)?
        {
            Some(inner) => target = inner,
            None => return Err(missing_key(key).into()),
        }
    }
    let entries = ev
        .host
        .dict_keys(ev.interp, target)
        .map_err(FeatherError::from)?;
    for key in &entries {
        if let Some(value) = ev
            .host
            .dict_get(ev.interp, target, key)
            .map_err(FeatherError::from)?
        {
            ev.var_write(key, value)?;
        }
    }
    let body = ev.value_text(argv[argv.len() - 1]);
    let result = ev.eval_script(&body)?;

    // read the variables back into (a fresh copy of) the dict
    let mut updated = dict_copy(ev, target)?;
    for key in &entries {
        if ev.var_exists(key) {
            let value = ev.var_read(key)?;
            ev.host.dict_set(ev.interp, updated, key, value);
        } else {
            ev.host.dict_remove(ev.interp, updated, key);
        }
    }
    if !keys.is_empty() {
        let current = ev.var_read(&name)?;
        updated = set_path(ev, current, &keys, updated)?;
    }
    ev.var_write(&name, updated)?;
    Ok(result)
}

fn incr<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, Some(5), "dict incr dictVarName key ?increment?")?;
    let name = ev.value_text(argv[2]);
    let key = ev.value_text(argv[3]);
    let amount = if argv.len() == 5 { ev.want_int(argv[4])? } else { 1 };
    let current = read_dict_var(ev, &name)?;
    let existing = match ev
        .host
        .dict_get(ev.interp, current, &key)
        .map_err(FeatherError::from)?
    {
        Some(value) => ev.want_int(value)?,
        None => 0,
    };
    let copy = dict_copy(ev, current)?;
    let updated = ev.int(existing.wrapping_add(amount));
    ev.host.dict_set(ev.interp, copy, &key, updated);
    ev.var_write(&name, copy)
}

fn append<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, None, "dict append dictVarName key ?string ...?")?;
    let name = ev.value_text(argv[2]);
    let key = ev.value_text(argv[3]);
    let current = read_dict_var(ev, &name)?;
    let mut text = match ev
        .host
        .dict_get(ev.interp, current, &key)
        .map_err(FeatherError::from)?
    {
        Some(value) => ev.value_text(value),
        None => String::new(),
    };
    for &arg in &argv[4..] {
        text.push_str(&ev.value_text(arg));
    }
    let copy = dict_copy(ev, current)?;
    let updated = ev.intern(&text);
    ev.host.dict_set(ev.interp, copy, &key, updated);
    ev.var_write(&name, copy)
}

fn lappend<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, None, "dict lappend dictVarName key ?value ...?")?;
    let name = ev.value_text(argv[2]);
    let key = ev.value_text(argv[3]);
    let current = read_dict_var(ev, &name)?;
    let existing = match ev
        .host
        .dict_get(ev.interp, current, &key)
        .map_err(FeatherError::from)?
    {
        Some(value) => ev
            .host
            .list_from(ev.interp, value)
            .map_err(FeatherError::from)?,
        None => ev.host.list_new(ev.interp),
    };
    for &arg in &argv[4..] {
        ev.host.list_push(ev.interp, existing, arg);
    }
    let copy = dict_copy(ev, current)?;
    ev.host.dict_set(ev.interp, copy, &key, existing);
    ev.var_write(&name, copy)
}
