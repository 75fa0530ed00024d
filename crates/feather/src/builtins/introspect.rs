//! Introspection: the `info` ensemble and the `trace` command.

use crate::{
    error::FeatherError,
    eval::Evaluator,
    handle::ValueId,
    host::{HostOps, TraceKind, TraceOps},
    list,
    status::FlowResult,
};

use super::{bad_subcommand, check_arity};

const INFO_SUBCOMMANDS: &[&str] = &[
    "args", "body", "commands", "errorstack", "exists", "frame", "globals", "level", "locals",
    "procs", "script", "vars",
];

pub(super) fn info<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "info subcommand ?arg ...?")?;
    let sub = ev.value_text(argv[1]);
    match sub.as_str() {
        "exists" => exists(ev, argv),
        "commands" => named(ev, argv, NameSource::Commands),
        "procs" => named(ev, argv, NameSource::Procs),
        "args" => proc_args(ev, argv),
        "body" => proc_body(ev, argv),
        "vars" => named(ev, argv, NameSource::Vars),
        "globals" => named(ev, argv, NameSource::Globals),
        "locals" => named(ev, argv, NameSource::Locals),
        "level" => level(ev, argv),
        "frame" => frame(ev, argv),
        "script" => script(ev, argv),
        "errorstack" => errorstack(ev, argv),
        other => Err(bad_subcommand(other, INFO_SUBCOMMANDS).into()),
    }
}

fn exists<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(3), "info exists varName")?;
    let name = ev.value_text(argv[2]);
    let exists = ev.var_exists(&name);
    Ok(ev.int(i64::from(exists)))
}

enum NameSource {
    Commands,
    Procs,
    Vars,
    Globals,
    Locals,
}

fn named<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId], source: NameSource) -> FlowResult {
    check_arity(argv, 2, Some(3), "info subcommand ?pattern?")?;
    let mut names = match source {
        NameSource::Commands => ev.host.cmd_names(ev.interp),
        NameSource::Procs => ev.host.proc_names(ev.interp),
        NameSource::Vars => ev.host.var_names(ev.interp),
        NameSource::Globals => ev.host.ns_var_names(ev.interp, "::"),
        NameSource::Locals => {
            let all = ev.host.var_names(ev.interp);
            all.into_iter()
                .filter(|name| !ev.host.var_is_link(ev.interp, name))
                .collect()
        }
    };
    if let Some(&pattern_arg) = argv.get(2) {
        let pattern = ev.value_text(pattern_arg);
        names.retain(|name| ev.host.str_match(&pattern, name, false));
    }
    names.sort();
    Ok(ev.make_str_list(&names))
}

fn proc_args<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(3), "info args procname")?;
    let name = ev.value_text(argv[2]);
    let params = ev
        .host
        .proc_params(ev.interp, &name)
        .ok_or_else(|| FeatherError::new(format!("\"{name}\" isn't a procedure")))?;
    let specs = ev.list_items(params)?;
    let mut names = Vec::with_capacity(specs.len());
    for spec in specs {
        let fields = ev.list_items(spec)?;
        match fields.first() {
            Some(&first) => names.push(ev.value_text(first)),
            None => names.push(String::new()),
        }
    }
    Ok(ev.make_str_list(&names))
}

fn proc_body<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(3), "info body procname")?;
    let name = ev.value_text(argv[2]);
    ev.host
        .proc_body(ev.interp, &name)
        .ok_or_else(|| FeatherError::new(format!("\"{name}\" isn't a procedure")).into())
}

fn level<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(3), "info level ?number?")?;
    let current = ev.host.frame_level(ev.interp);
    let Some(&level_arg) = argv.get(2) else {
        return Ok(ev.int(current as i64));
    };
    let text = ev.value_text(level_arg);
    let n: i64 = text
        .parse()
        .map_err(|_| FeatherError::new(format!("bad level \"{text}\"")))?;
    // 0 and negative are relative to the current frame, positive absolute
    let target = if n <= 0 { current as i64 + n } else { n };
    if target < 1 || target > current as i64 {
        return Err(FeatherError::new(format!("bad level \"{text}\"")).into());
    }
    let frame_info = ev
        .host
        .frame_info(ev.interp, target as usize)
        .ok_or_else(|| FeatherError::new(format!("bad level \"{text}\"")))?;
    Ok(frame_info.args)
}

fn frame<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(3), "info frame ?number?")?;
    let size = ev.host.frame_size(ev.interp);
    let Some(&level_arg) = argv.get(2) else {
        return Ok(ev.int(size as i64));
    };
    let text = ev.value_text(level_arg);
    let n: i64 = text
        .parse()
        .map_err(|_| FeatherError::new(format!("bad level \"{text}\"")))?;
    let target = if n <= 0 { size as i64 - 1 + n } else { n - 1 };
    if target < 0 || target >= size as i64 {
        return Err(FeatherError::new(format!("bad level \"{text}\"")).into());
    }
    let frame_info = ev
        .host
        .frame_info(ev.interp, target as usize)
        .ok_or_else(|| FeatherError::new(format!("bad level \"{text}\"")))?;
    let dict = ev.host.dict_new(ev.interp);
    let type_value = ev.intern("eval");
    ev.host.dict_set(ev.interp, dict, "type", type_value);
    let level_value = ev.int(target);
    ev.host.dict_set(ev.interp, dict, "level", level_value);
    ev.host.dict_set(ev.interp, dict, "cmd", frame_info.args);
    let ns_value = ev.intern(&frame_info.namespace);
    ev.host.dict_set(ev.interp, dict, "ns", ns_value);
    Ok(dict)
}

fn script<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(3), "info script ?filename?")?;
    if let Some(&path_arg) = argv.get(2) {
        ev.host.script_set(ev.interp, path_arg);
        return Ok(path_arg);
    }
    let current = ev.host.script_get(ev.interp);
    if current.is_nil() {
        return Ok(ev.empty());
    }
    Ok(current)
}

fn errorstack<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(3), "info errorstack ?interp?")?;
    let options = ev.host.return_options_get(ev.interp);
    if options.is_nil() {
        return Ok(ev.make_list(&[]));
    }
    match ev.host.dict_get(ev.interp, options, "-errorstack") {
        Ok(Some(stack)) => Ok(stack),
        _ => Ok(ev.make_list(&[])),
    }
}

// --- trace --------------------------------------------------------------

pub(super) fn trace<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "trace subcommand ?arg ...?")?;
    let sub = ev.value_text(argv[1]);
    match sub.as_str() {
        "add" => trace_add(ev, argv),
        "remove" => trace_remove(ev, argv),
        "info" => trace_info(ev, argv),
        other => Err(bad_subcommand(other, &["add", "info", "remove"]).into()),
    }
}

fn parse_trace_kind(text: &str) -> Result<TraceKind, FeatherError> {
    match text {
        "variable" => Ok(TraceKind::Variable),
        "execution" => Ok(TraceKind::Execution),
        other => Err(bad_subcommand(other, &["execution", "variable"])),
    }
}

fn parse_trace_ops<H: HostOps>(
    ev: &mut Evaluator<'_, H>,
    kind: TraceKind,
    ops_arg: ValueId,
) -> FlowResult<TraceOps> {
    let items = ev.list_items(ops_arg)?;
    let mut ops = TraceOps::default();
    for item in items {
        let op = ev.value_text(item);
        match (kind, op.as_str()) {
            (TraceKind::Variable, "read") => ops.read = true,
            (TraceKind::Variable, "write") => ops.write = true,
            (TraceKind::Variable, "unset") => ops.unset = true,
            (TraceKind::Execution, "enter") => ops.enter = true,
            (TraceKind::Execution, "leave") => ops.leave = true,
            (TraceKind::Variable, other) => {
                return Err(FeatherError::new(format!(
                    "bad operation \"{other}\": must be read, write, or unset"
                ))
                .into());
            }
            (TraceKind::Execution, other) => {
                return Err(FeatherError::new(format!(
                    "bad operation \"{other}\": must be enter or leave"
                ))
                .into());
            }
        }
    }
    if ops.is_empty() {
        return Err(FeatherError::new("bad operation list \"\": must be one or more of read, write, unset, enter, or leave").into());
    }
    Ok(ops)
}

fn trace_add<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 6, Some(6), "trace add type name opList commandPrefix")?;
    let kind_text = ev.value_text(argv[2]);
    let kind = parse_trace_kind(&kind_text)?;
    let name = ev.value_text(argv[3]);
    let ops = parse_trace_ops(ev, kind, argv[4])?;
    ev.host.trace_add(ev.interp, kind, &name, ops, argv[5]);
    Ok(ev.empty())
}

fn trace_remove<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 6, Some(6), "trace remove type name opList commandPrefix")?;
    let kind_text = ev.value_text(argv[2]);
    let kind = parse_trace_kind(&kind_text)?;
    let name = ev.value_text(argv[3]);
    let ops = parse_trace_ops(ev, kind, argv[4])?;
    let script = ev.value_text(argv[5]);
    ev.host.trace_remove(ev.interp, kind, &name, ops, &script);
    Ok(ev.empty())
}

fn trace_info<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, Some(4), "trace info type name")?;
    let kind_text = ev.value_text(argv[2]);
    let kind = parse_trace_kind(&kind_text)?;
    let name = ev.value_text(argv[3]);
    let entries = ev.host.trace_list(ev.interp, kind, &name);
    let mut out: Vec<ValueId> = Vec::with_capacity(entries.len());
    for entry in entries {
        let script = ev.value_text(entry.script);
        let pair = list::format_list(&[entry.ops.to_list(), script]);
        out.push(ev.intern(&pair));
    }
    Ok(ev.make_list(&out))
}
