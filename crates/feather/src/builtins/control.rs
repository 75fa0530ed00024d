//! Control-flow commands: `if`, `while`, `for`, `foreach`, `lmap`, `break`,
//! `continue`, `switch`, `eval`, and the `expr` command wrapper.

use crate::{
    error::FeatherError,
    eval::Evaluator,
    expr,
    handle::ValueId,
    host::HostOps,
    status::{FlowResult, Unwind},
};

use super::{check_arity, operand_value};

pub(super) fn if_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, None, "if expr1 ?then? body1 elseif expr2 ?then? body2 elseif ... ?else? ?bodyN?")?;
    let mut i = 1;
    loop {
        if i >= argv.len() {
            return Err(FeatherError::new("wrong # args: no expression after \"if\" argument").into());
        }
        let cond = ev.value_text(argv[i]);
        i += 1;
        if i < argv.len() && ev.value_text(argv[i]) == "then" {
            i += 1;
        }
        if i >= argv.len() {
            return Err(FeatherError::new(format!(
                "wrong # args: no script following \"{cond}\" argument"
            ))
            .into());
        }
        let body = argv[i];
        i += 1;
        if expr::eval_expr_bool(ev, &cond)? {
            return ev.eval_script_value(body);
        }
        if i >= argv.len() {
            return Ok(ev.empty());
        }
        match ev.value_text(argv[i]).as_str() {
            "elseif" => {
                i += 1;
            }
            "else" => {
                i += 1;
                if i >= argv.len() {
                    return Err(FeatherError::new(
                        "wrong # args: no script following \"else\" argument",
                    )
                    .into());
                }
                if i + 1 < argv.len() {
                    return Err(FeatherError::new(
                        "wrong # args: extra words after \"else\" clause in \"if\" command",
                    )
                    .into());
                }
                return ev.eval_script_value(argv[i]);
            }
            other => {
                return Err(FeatherError::new(format!(
                    "invalid command name \"{other}\": expected \"elseif\" or \"else\""
                ))
                .into());
            }
        }
    }
}

pub(super) fn while_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(3), "while test command")?;
    let cond = ev.value_text(argv[1]);
    let body = ev.value_text(argv[2]);
    while expr::eval_expr_bool(ev, &cond)? {
        match ev.eval_script(&body) {
            Ok(_) => {}
            Err(Unwind::Break) => break,
            Err(Unwind::Continue) => {}
            Err(other) => return Err(other),
        }
    }
    Ok(ev.empty())
}

pub(super) fn for_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 5, Some(5), "for start test next command")?;
    let start = ev.value_text(argv[1]);
    let cond = ev.value_text(argv[2]);
    let next = ev.value_text(argv[3]);
    let body = ev.value_text(argv[4]);
    ev.eval_script(&start)?;
    while expr::eval_expr_bool(ev, &cond)? {
        match ev.eval_script(&body) {
            Ok(_) => {}
            // break skips the next-script
            Err(Unwind::Break) => return Ok(ev.empty()),
            Err(Unwind::Continue) => {}
            Err(other) => return Err(other),
        }
        ev.eval_script(&next)?;
    }
    Ok(ev.empty())
}

/// Shared driver for `foreach` and `lmap`: lockstep iteration over one or
/// more `(varList, valueList)` pairs, padding exhausted lists with empty
/// strings.
fn foreach_driver<H: HostOps>(
    ev: &mut Evaluator<'_, H>,
    argv: &[ValueId],
    usage: &str,
    collect: bool,
) -> FlowResult {
    check_arity(argv, 4, None, usage)?;
    if (argv.len() - 2) % 2 != 0 {
        return Err(FeatherError::wrong_num_args(usage).into());
    }
    let body = ev.value_text(argv[argv.len() - 1]);

    struct Pair {
        vars: Vec<String>,
        values: Vec<ValueId>,
    }
    let mut pairs = Vec::new();
    let mut iterations = 0usize;
    for chunk in argv[1..argv.len() - 1].chunks_exact(2) {
        let var_items = ev.list_items(chunk[0])?;
        let vars: Vec<String> = var_items.iter().map(|&v| ev.value_text(v)).collect();
        if vars.is_empty() {
            return Err(FeatherError::new("foreach varlist is empty").into());
        }
        let values = ev.list_items(chunk[1])?;
        iterations = iterations.max(values.len().div_ceil(vars.len()));
        pairs.push(Pair { vars, values });
    }

    let mut collected: Vec<ValueId> = Vec::new();
    'outer: for iteration in 0..iterations {
        for pair in &pairs {
            for (k, var) in pair.vars.iter().enumerate() {
                let idx = iteration * pair.vars.len() + k;
                let value = match pair.values.get(idx) {
                    Some(&v) => v,
                    None => ev.empty(),
                };
                ev.var_write(var, value)?;
            }
        }
        match ev.eval_script(&body) {
            Ok(value) => {
                if collect {
                    collected.push(value);
                }
            }
            Err(Unwind::Break) => break 'outer,
            Err(Unwind::Continue) => {}
            Err(other) => return Err(other),
        }
    }
    if collect {
        Ok(ev.make_list(&collected))
    } else {
        Ok(ev.empty())
    }
}

pub(super) fn foreach<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    foreach_driver(ev, argv, "foreach varList list ?varList list ...? command", false)
}

pub(super) fn lmap<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    foreach_driver(ev, argv, "lmap varList list ?varList list ...? command", true)
}

pub(super) fn break_cmd<H: HostOps>(_ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 1, Some(1), "break")?;
    Err(Unwind::Break)
}

pub(super) fn continue_cmd<H: HostOps>(_ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 1, Some(1), "continue")?;
    Err(Unwind::Continue)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    Exact,
    Glob,
    Regexp,
}

pub(super) fn switch<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    const USAGE: &str = "switch ?-option ...? string ?pattern body ... ?default body??";
    check_arity(argv, 3, None, USAGE)?;
    let mut mode = MatchMode::Exact;
    let mut nocase = false;
    let mut i = 1;
    while i < argv.len() {
        let text = ev.value_text(argv[i]);
        match text.as_str() {
            "-exact" => mode = MatchMode::Exact,
            "-glob" => mode = MatchMode::Glob,
            "-regexp" => mode = MatchMode::Regexp,
            "-nocase" => nocase = true,
            "--" => {
                i += 1;
                break;
            }
            _ if text.starts_with('-') => {
                return Err(FeatherError::new(format!(
                    "bad option \"{text}\": must be -exact, -glob, -regexp, -nocase, or --"
                ))
                .into());
            }
            _ => break,
        }
        i += 1;
    }
    if i >= argv.len() {
        return Err(FeatherError::wrong_num_args(USAGE).into());
    }
    let value = ev.value_text(argv[i]);
    i += 1;

    // either inline pattern/body words or a single braced list of them
    let clause_handles: Vec<ValueId> = if argv.len() - i == 1 {
        ev.list_items(argv[i])?
    } else {
        argv[i..].to_vec()
    };
    if clause_handles.is_empty() || clause_handles.len() % 2 != 0 {
        return Err(FeatherError::new("extra switch pattern with no body").into());
    }

    let count = clause_handles.len() / 2;
    let mut matched_at: Option<usize> = None;
    for c in 0..count {
        let pattern = ev.value_text(clause_handles[c * 2]);
        let is_default = pattern == "default" && c == count - 1;
        let hit = is_default
            || match mode {
                MatchMode::Exact => {
                    if nocase {
                        pattern.eq_ignore_ascii_case(&value)
                    } else {
                        pattern == value
                    }
                }
                MatchMode::Glob => ev.host.str_match(&pattern, &value, nocase),
                MatchMode::Regexp => {
                    let pat = if nocase {
                        format!("(?i){pattern}")
                    } else {
                        pattern.clone()
                    };
                    ev.host
                        .regex_match(ev.interp, &pat, &value)
                        .map_err(FeatherError::from)?
                }
            };
        if hit {
            matched_at = Some(c);
            break;
        }
    }

    let Some(mut at) = matched_at else {
        return Ok(ev.empty());
    };
    // `-` bodies fall through to the next clause's body
    loop {
        let body = ev.value_text(clause_handles[at * 2 + 1]);
        if body != "-" {
            return ev.eval_script_value(clause_handles[at * 2 + 1]);
        }
        at += 1;
        if at >= count {
            let pattern = ev.value_text(clause_handles[(at - 1) * 2]);
            return Err(FeatherError::new(format!(
                "no body specified for pattern \"{pattern}\""
            ))
            .into());
        }
    }
}

pub(super) fn eval_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "eval arg ?arg ...?")?;
    let script = if argv.len() == 2 {
        ev.value_text(argv[1])
    } else {
        let parts: Vec<String> = argv[1..].iter().map(|&v| ev.value_text(v)).collect();
        parts.join(" ")
    };
    ev.eval_nested_script(&script)
}

pub(super) fn expr_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "expr arg ?arg ...?")?;
    let text = if argv.len() == 2 {
        ev.value_text(argv[1])
    } else {
        let parts: Vec<String> = argv[1..].iter().map(|&v| ev.value_text(v)).collect();
        parts.join(" ")
    };
    let operand = expr::eval_expr(ev, &text)?;
    Ok(operand_value(ev, operand))
}
