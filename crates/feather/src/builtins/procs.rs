//! Procedure and error-handling commands: `proc`, `return`, `error`,
//! `throw`, `catch`, `try`, `apply`, `tailcall`, `rename`.

use std::str::FromStr;

use crate::{
    error::FeatherError,
    eval::Evaluator,
    handle::ValueId,
    host::HostOps,
    list,
    status::{FlowResult, ReturnUnwind, Status, Unwind},
};

use super::check_arity;

pub(super) fn proc_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, Some(4), "proc name args body")?;
    let name = ev.value_text(argv[1]);
    // validate the parameter list eagerly so bad specs fail at definition
    let specs = ev.list_items(argv[2])?;
    for spec in specs {
        let fields = ev.list_items(spec)?;
        if fields.is_empty() || fields.len() > 2 {
            let text = ev.value_text(spec);
            return Err(FeatherError::new(format!(
                "argument specifier \"{text}\" has too many fields"
            ))
            .into());
        }
    }
    ev.host
        .proc_define(ev.interp, &name, argv[2], argv[3])
        .map_err(|e| Unwind::Error(e.into()))?;
    Ok(ev.empty())
}

/// Parses a `-code` option value: a status name or its numeric code.
fn parse_code(text: &str) -> Result<Status, FeatherError> {
    if let Ok(status) = Status::from_str(text) {
        return Ok(status);
    }
    if let Ok(code) = text.parse::<i64>() {
        if let Some(status) = Status::from_code(code) {
            return Ok(status);
        }
    }
    Err(FeatherError::new(format!(
        "bad completion code \"{text}\": must be ok, error, return, break, continue, or an integer"
    )))
}

pub(super) fn return_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    let mut code = Status::Ok;
    let mut level = 1usize;
    let mut error_info: Option<String> = None;
    let mut error_code: Option<String> = None;
    let mut i = 1;
    while i + 1 < argv.len() {
        let option = ev.value_text(argv[i]);
        match option.as_str() {
            "-code" => {
                let text = ev.value_text(argv[i + 1]);
                code = parse_code(&text)?;
            }
            "-level" => {
                let text = ev.value_text(argv[i + 1]);
                level = text.parse().map_err(|_| {
                    FeatherError::new(format!("bad -level value: expected non-negative integer but got \"{text}\""))
                })?;
            }
            "-errorinfo" => error_info = Some(ev.value_text(argv[i + 1])),
            "-errorcode" => error_code = Some(ev.value_text(argv[i + 1])),
            _ => break,
        }
        i += 2;
    }
    if argv.len() - i > 1 {
        return Err(FeatherError::wrong_num_args("return ?-code code? ?-level level? ?result?").into());
    }
    let value = if i < argv.len() { argv[i] } else { ev.empty() };

    let err = if code == Status::Error {
        let message = ev.value_text(value);
        let mut e = FeatherError::new(message);
        if let Some(ec) = error_code {
            e.set_error_code(ec);
        }
        if let Some(info) = error_info {
            e.set_error_info(info);
        }
        Some(e)
    } else {
        None
    };

    let ret = ReturnUnwind {
        value,
        code,
        level,
        err,
    };
    if ret.level == 0 {
        // -level 0 applies the code right here instead of unwinding
        ev.return_code_outcome(ret)
    } else {
        Err(Unwind::Return(ret))
    }
}

pub(super) fn error_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(4), "error message ?errorInfo? ?errorCode?")?;
    let message = ev.value_text(argv[1]);
    let mut err = FeatherError::new(message);
    if argv.len() > 2 {
        let info = ev.value_text(argv[2]);
        if !info.is_empty() {
            err.set_error_info(info);
        }
    }
    if argv.len() > 3 {
        err.set_error_code(ev.value_text(argv[3]));
    }
    Err(Unwind::Error(err))
}

pub(super) fn throw<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(3), "throw type message")?;
    let code = ev.value_text(argv[1]);
    let message = ev.value_text(argv[2]);
    Err(Unwind::Error(FeatherError::with_code(message, code)))
}

pub(super) fn catch<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(4), "catch script ?resultVarName? ?optionVarName?")?;
    let script = ev.value_text(argv[1]);
    let outcome = ev.eval_nested_script(&script);
    // tailcall is not interceptable; it belongs to the enclosing proc
    if let Err(Unwind::Tailcall(handle)) = &outcome {
        return Err(Unwind::Tailcall(*handle));
    }

    let code = match &outcome {
        Ok(_) => Status::Ok.code(),
        Err(unwind) => unwind.status().code(),
    };
    let result_value = match &outcome {
        Ok(value) => *value,
        Err(unwind) => ev.unwind_result(unwind),
    };
    if argv.len() > 2 {
        let name = ev.value_text(argv[2]);
        ev.var_write(&name, result_value)?;
    }
    if argv.len() > 3 {
        let options = ev.unwind_options(&outcome.as_ref().map(|v| *v));
        let name = ev.value_text(argv[3]);
        ev.var_write(&name, options)?;
    }
    Ok(ev.int(code))
}

struct TryHandler {
    /// `None` matches via errorcode prefix (`trap`), `Some` via status.
    on_status: Option<Status>,
    trap_prefix: Vec<String>,
    var_names: Vec<String>,
    body: ValueId,
}

pub(super) fn try_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    const USAGE: &str = "try body ?handler ...? ?finally script?";
    check_arity(argv, 2, None, USAGE)?;
    let body = ev.value_text(argv[1]);

    let mut handlers: Vec<TryHandler> = Vec::new();
    let mut finally: Option<ValueId> = None;
    let mut i = 2;
    while i < argv.len() {
        let word = ev.value_text(argv[i]);
        match word.as_str() {
            "on" => {
                if i + 3 >= argv.len() {
                    return Err(FeatherError::wrong_num_args(USAGE).into());
                }
                let code_text = ev.value_text(argv[i + 1]);
                let status = parse_code(&code_text)?;
                let vars = ev.list_items(argv[i + 2])?;
                let var_names = vars.iter().map(|&v| ev.value_text(v)).collect();
                handlers.push(TryHandler {
                    on_status: Some(status),
                    trap_prefix: Vec::new(),
                    var_names,
                    body: argv[i + 3],
                });
                i += 4;
            }
            "trap" => {
                if i + 3 >= argv.len() {
                    return Err(FeatherError::wrong_num_args(USAGE).into());
                }
                let pattern = ev.value_text(argv[i + 1]);
                let trap_prefix = list::parse_list(&pattern).map_err(FeatherError::from)?;
                let vars = ev.list_items(argv[i + 2])?;
                let var_names = vars.iter().map(|&v| ev.value_text(v)).collect();
                handlers.push(TryHandler {
                    on_status: None,
                    trap_prefix,
                    var_names,
                    body: argv[i + 3],
                });
                i += 4;
            }
            "finally" => {
                if i + 1 >= argv.len() || i + 2 < argv.len() {
                    return Err(FeatherError::new(
                        "finally clause must be last and have a body",
                    )
                    .into());
                }
                finally = Some(argv[i + 1]);
                i += 2;
            }
            other => {
                return Err(FeatherError::new(format!(
                    "bad handler \"{other}\": must be on, trap, or finally"
                ))
                .into());
            }
        }
    }

    let outcome = ev.eval_nested_script(&body);

    let mut selected: Option<usize> = None;
    if !matches!(outcome, Err(Unwind::Tailcall(_))) {
        let status = match &outcome {
            Ok(_) => Status::Ok,
            Err(unwind) => unwind.status(),
        };
        for (idx, handler) in handlers.iter().enumerate() {
            let hit = match &handler.on_status {
                Some(on) => *on == status,
                None => match &outcome {
                    Err(Unwind::Error(err)) => {
                        let parts = list::parse_list(err.error_code()).unwrap_or_default();
                        handler.trap_prefix.len() <= parts.len()
                            && handler.trap_prefix.iter().zip(&parts).all(|(a, b)| a == b)
                    }
                    _ => false,
                },
            };
            if hit {
                selected = Some(idx);
                break;
            }
        }
    }

    let result = match selected {
        None => outcome,
        Some(idx) => {
            let result_value = match &outcome {
                Ok(value) => *value,
                Err(unwind) => ev.unwind_result(unwind),
            };
            let options = ev.unwind_options(&outcome.as_ref().map(|v| *v));
            let handler = &handlers[idx];
            let names = handler.var_names.clone();
            let handler_body = handler.body;
            if let Some(name) = names.first() {
                ev.var_write(name, result_value)?;
            }
            if let Some(name) = names.get(1) {
                ev.var_write(name, options)?;
            }
            ev.eval_script_value(handler_body)
        }
    };

    if let Some(script) = finally {
        match ev.eval_script_value(script) {
            Ok(_) => {}
            Err(Unwind::Error(mut fin_err)) => {
                // a failing cleanup wins; keep the body's error in its trace
                if let Err(Unwind::Error(body_err)) = &result {
                    let info = format!(
                        "{}\n    (\"try\" body line: {})",
                        fin_err.error_info(),
                        body_err.message()
                    );
                    fin_err.set_error_info(info);
                }
                return Err(Unwind::Error(fin_err));
            }
            Err(other) => return Err(other),
        }
    }

    result
}

pub(super) fn apply<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "apply lambdaExpr ?arg ...?")?;
    let lambda = ev.list_items(argv[1])?;
    if lambda.len() != 2 && lambda.len() != 3 {
        let text = ev.value_text(argv[1]);
        return Err(FeatherError::new(format!(
            "can't interpret \"{text}\" as a lambda expression"
        ))
        .into());
    }
    let params = lambda[0];
    let body = lambda[1];
    let namespace = lambda.get(2).map(|&ns| ev.value_text(ns));

    let limit = ev.host.recursion_limit(ev.interp);
    if ev.host.frame_size(ev.interp) >= limit {
        return Err(FeatherError::recursion_limit().into());
    }

    let args_list = ev.make_list(argv);
    let caller_active = ev.host.frame_level(ev.interp);
    ev.host
        .frame_push(ev.interp, argv[0], args_list)
        .map_err(|e| Unwind::Error(e.into()))?;
    if let Some(ns) = &namespace {
        let absolute = if ns.starts_with("::") {
            ns.clone()
        } else {
            format!("::{ns}")
        };
        ev.host.ns_create(ev.interp, &absolute);
        ev.host.frame_set_namespace(ev.interp, &absolute);
    }
    // argv[1] (the lambda) plays the command-name slot for binding
    let result = ev
        .bind_params("apply lambdaExpr", &argv[1..], params)
        .and_then(|()| ev.eval_script_value(body));
    ev.host.frame_pop(ev.interp);
    let _ = ev.host.frame_set_active(ev.interp, caller_active);

    match result {
        Err(Unwind::Return(ret)) => ev.apply_return(ret),
        Err(Unwind::Break) => Err(FeatherError::new("invoked \"break\" outside of a loop").into()),
        Err(Unwind::Continue) => {
            Err(FeatherError::new("invoked \"continue\" outside of a loop").into())
        }
        Err(Unwind::Tailcall(replacement)) => {
            let items = ev.list_items(replacement)?;
            if items.is_empty() {
                return Ok(ev.empty());
            }
            let text: Vec<String> = items.iter().map(|&v| ev.value_text(v)).collect();
            let cmd_text = list::format_list(&text);
            ev.dispatch(&items, &cmd_text)
        }
        other => other,
    }
}

pub(super) fn tailcall<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "tailcall command ?arg ...?")?;
    if ev.host.frame_level(ev.interp) == 0 {
        return Err(FeatherError::new("tailcall can only be called from within a procedure").into());
    }
    let replacement = ev.make_list(&argv[1..]);
    Err(Unwind::Tailcall(replacement))
}

pub(super) fn rename<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(3), "rename oldName newName")?;
    let old = ev.value_text(argv[1]);
    let new = ev.value_text(argv[2]);
    ev.host
        .cmd_rename(ev.interp, &old, &new)
        .map_err(|e| Unwind::Error(e.into()))?;
    Ok(ev.empty())
}
