//! Variable commands: `set`, `unset`, `incr`, `append`, `global`,
//! `variable`, `upvar`, `uplevel`.

use crate::{
    error::FeatherError,
    eval::{self, Evaluator},
    handle::ValueId,
    host::HostOps,
    status::{FlowResult, Unwind},
};

use super::check_arity;

pub(super) fn set<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(3), "set varName ?newValue?")?;
    let name = ev.value_text(argv[1]);
    if argv.len() == 2 {
        ev.var_read(&name)
    } else {
        ev.var_write(&name, argv[2])
    }
}

pub(super) fn unset<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 1, None, "unset ?-nocomplain? ?--? ?varName varName ...?")?;
    let mut nocomplain = false;
    let mut i = 1;
    while i < argv.len() {
        let text = ev.value_text(argv[i]);
        match text.as_str() {
            "-nocomplain" => {
                nocomplain = true;
                i += 1;
            }
            "--" => {
                i += 1;
                break;
            }
            _ => break,
        }
    }
    for &arg in &argv[i..] {
        let name = ev.value_text(arg);
        let existed = ev.var_unset(&name)?;
        if !existed && !nocomplain {
            return Err(FeatherError::cant_unset_var(&name).into());
        }
    }
    Ok(ev.empty())
}

pub(super) fn incr<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(3), "incr varName ?increment?")?;
    let name = ev.value_text(argv[1]);
    let amount = if argv.len() == 3 { ev.want_int(argv[2])? } else { 1 };
    let current = if ev.var_exists(&name) {
        let value = ev.var_read(&name)?;
        ev.want_int(value)?
    } else {
        0
    };
    let updated = ev.int(current.wrapping_add(amount));
    ev.var_write(&name, updated)
}

pub(super) fn append<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "append varName ?value value ...?")?;
    let name = ev.value_text(argv[1]);
    let mut text = if ev.var_exists(&name) {
        let value = ev.var_read(&name)?;
        ev.value_text(value)
    } else {
        String::new()
    };
    for &arg in &argv[2..] {
        text.push_str(&ev.value_text(arg));
    }
    let value = ev.intern(&text);
    ev.var_write(&name, value)
}

pub(super) fn global<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "global varName ?varName ...?")?;
    if ev.host.frame_level(ev.interp) > 0 {
        for &arg in &argv[1..] {
            let name = ev.value_text(arg);
            // a qualified name links to its own namespace; plain names to ::
            let (ns, simple) = if name.contains("::") {
                let absolute = if name.starts_with("::") {
                    name.clone()
                } else {
                    format!("::{name}")
                };
                eval::split_qualified(&absolute)
            } else {
                ("::".to_owned(), name.clone())
            };
            ev.host
                .var_link_ns(ev.interp, &simple, &ns, &simple)
                .map_err(|e| Unwind::Error(e.into()))?;
        }
    }
    Ok(ev.empty())
}

pub(super) fn variable<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "variable ?name value...? name ?value?")?;
    let mut i = 1;
    while i < argv.len() {
        let name = ev.value_text(argv[i]);
        let (ns, simple) = if name.contains("::") {
            let absolute = if name.starts_with("::") {
                name.clone()
            } else {
                let current = ev.host.frame_namespace(ev.interp);
                eval::join_ns(&current, &name)
            };
            eval::split_qualified(&absolute)
        } else {
            (ev.host.frame_namespace(ev.interp), name.clone())
        };
        ev.host.ns_create(ev.interp, &ns);
        if ev.host.frame_level(ev.interp) > 0 {
            ev.host
                .var_link_ns(ev.interp, &simple, &ns, &simple)
                .map_err(|e| Unwind::Error(e.into()))?;
        }
        if i + 1 < argv.len() {
            ev.host.ns_set_var(ev.interp, &ns, &simple, argv[i + 1]);
        }
        i += 2;
    }
    Ok(ev.empty())
}

pub(super) fn upvar<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(
        argv,
        3,
        None,
        "upvar ?level? otherVar localVar ?otherVar localVar ...?",
    )?;
    let first = ev.value_text(argv[1]);
    let (level, pairs_at) = if eval::looks_like_level(&first) && (argv.len() - 2) % 2 == 0 {
        (ev.parse_level(&first)?, 2)
    } else {
        (ev.parse_level("1")?, 1)
    };
    let rest = &argv[pairs_at..];
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(FeatherError::wrong_num_args(
            "upvar ?level? otherVar localVar ?otherVar localVar ...?",
        )
        .into());
    }
    for pair in rest.chunks_exact(2) {
        let other = ev.value_text(pair[0]);
        let local = ev.value_text(pair[1]);
        ev.host
            .var_link(ev.interp, &local, level, &other)
            .map_err(|e| Unwind::Error(e.into()))?;
    }
    Ok(ev.empty())
}

pub(super) fn uplevel<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "uplevel ?level? command ?arg ...?")?;
    let first = ev.value_text(argv[1]);
    let (level, script_at) = if argv.len() > 2 && eval::looks_like_level(&first) {
        (ev.parse_level(&first)?, 2)
    } else {
        (ev.parse_level("1")?, 1)
    };
    let script = if argv.len() - script_at == 1 {
        ev.value_text(argv[script_at])
    } else {
        let parts: Vec<String> = argv[script_at..].iter().map(|&v| ev.value_text(v)).collect();
        parts.join(" ")
    };
    ev.with_active_frame(level, |ev| ev.eval_nested_script(&script))
}
