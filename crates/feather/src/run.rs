//! Public entry points, shaped after the C ABI: initialize an interpreter,
//! evaluate scripts or single commands, and parse without evaluating.
//!
//! Every entry point takes the host and an interpreter handle; results
//! travel through `result_set`/`result_get` and the return-options dict,
//! with only the completion [`Status`] returned directly.

use strum::IntoEnumIterator;

use crate::{
    builtins::Builtin,
    error::FeatherError,
    eval::Evaluator,
    handle::{InterpId, ValueId},
    host::HostOps,
    list,
    parse::{self, ParseStep},
    status::{Status, Unwind},
};

/// Evaluation flags: whether the script runs in the active frame or is
/// redirected to the global frame first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvalFlags {
    #[default]
    Local,
    Global,
}

/// Registers every core built-in in the interpreter's command table.
pub fn interp_init<H: HostOps>(host: &mut H, interp: InterpId) {
    for builtin in Builtin::iter() {
        host.cmd_register_builtin(interp, builtin.name(), builtin);
    }
}

/// Evaluates a script buffer. The result (or error message) is left in the
/// interpreter result; error details populate the return options and the
/// `errorInfo`/`errorCode` globals.
pub fn script_eval<H: HostOps>(host: &mut H, interp: InterpId, src: &str, flags: EvalFlags) -> Status {
    script_eval_full(host, interp, src, flags).0
}

/// Like [`script_eval`], with the source held by a host value.
pub fn script_eval_obj<H: HostOps>(
    host: &mut H,
    interp: InterpId,
    script: ValueId,
    flags: EvalFlags,
) -> Status {
    let src = host.str_value(interp, script);
    script_eval(host, interp, &src, flags)
}

/// Evaluates one already-substituted command supplied as a list handle
/// (element 0 is the command name).
pub fn command_exec<H: HostOps>(
    host: &mut H,
    interp: InterpId,
    args: ValueId,
    flags: EvalFlags,
) -> Status {
    let mut ev = Evaluator::new(host, interp);
    let outcome = (|| {
        let argv = ev.list_items(args)?;
        if argv.is_empty() {
            return Ok(ev.empty());
        }
        let texts: Vec<String> = argv.iter().map(|&v| ev.value_text(v)).collect();
        let cmd_text = list::format_list(&texts);
        match flags {
            EvalFlags::Local => ev.dispatch(&argv, &cmd_text),
            EvalFlags::Global => ev.with_active_frame(0, |ev| ev.dispatch(&argv, &cmd_text)),
        }
    })();
    conclude(&mut ev, outcome).0
}

/// The full-result variant used by embedding conveniences: the status plus
/// the structured error when the status is `Error`.
pub(crate) fn script_eval_full<H: HostOps>(
    host: &mut H,
    interp: InterpId,
    src: &str,
    flags: EvalFlags,
) -> (Status, Option<FeatherError>) {
    let mut ev = Evaluator::new(host, interp);
    let outcome = match flags {
        EvalFlags::Local => ev.eval_script(src),
        EvalFlags::Global => ev.with_active_frame(0, |ev| ev.eval_script(src)),
    };
    conclude(&mut ev, outcome)
}

/// Translates an evaluator outcome into boundary state: result, options,
/// magic globals.
fn conclude<H: HostOps>(
    ev: &mut Evaluator<'_, H>,
    outcome: Result<ValueId, Unwind>,
) -> (Status, Option<FeatherError>) {
    // an escaped tailcall has no proc frame to replace
    let outcome = match outcome {
        Err(Unwind::Tailcall(_)) => Err(Unwind::Error(FeatherError::new(
            "tailcall can only be called from within a procedure",
        ))),
        other => other,
    };
    let options = ev.unwind_options(&outcome.as_ref().map(|v| *v));

    match outcome {
        Ok(value) => {
            ev.host.result_set(ev.interp, value);
            ev.host.return_options_set(ev.interp, options);
            (Status::Ok, None)
        }
        Err(Unwind::Return(ret)) => {
            ev.host.result_set(ev.interp, ret.value);
            ev.host.return_options_set(ev.interp, options);
            (Status::Return, None)
        }
        Err(Unwind::Break) => {
            let empty = ev.empty();
            ev.host.result_set(ev.interp, empty);
            ev.host.return_options_set(ev.interp, options);
            (Status::Break, None)
        }
        Err(Unwind::Continue) => {
            let empty = ev.empty();
            ev.host.result_set(ev.interp, empty);
            ev.host.return_options_set(ev.interp, options);
            (Status::Continue, None)
        }
        Err(Unwind::Error(err)) => {
            let message = ev.intern(err.message());
            ev.host.result_set(ev.interp, message);

            // errorInfo / errorCode magic globals
            let info = ev.intern(err.error_info());
            ev.host.ns_set_var(ev.interp, "::", "errorInfo", info);
            let code = ev.intern(err.error_code());
            ev.host.ns_set_var(ev.interp, "::", "errorCode", code);

            // a minimal -errorstack entry for `info errorstack`
            let inner = list::format_list(&["INNER", err.message()]);
            let stack = ev.intern(&inner);
            ev.host.dict_set(ev.interp, options, "-errorstack", stack);
            ev.host.return_options_set(ev.interp, options);
            (Status::Error, Some(err))
        }
        Err(Unwind::Tailcall(_)) => unreachable!("rewritten above"),
    }
}

/// Parses without evaluating. The interpreter result is set to one of:
/// `{OK}`, `{INCOMPLETE consumed needed}`, or `{ERROR line col message}`.
/// Always returns `Status::Ok`; the result list is the outcome channel.
pub fn parse_script<H: HostOps>(host: &mut H, interp: InterpId, script: ValueId) -> Status {
    let src = host.str_value(interp, script);
    let mut at = 0;
    let fields: Vec<String> = loop {
        match parse::next_command(&src, at) {
            ParseStep::Complete(cmd) => {
                at = crate::eval::next_offset(&src, cmd.end);
            }
            ParseStep::End => break vec!["OK".to_owned()],
            ParseStep::Incomplete { consumed, needed } => {
                break vec![
                    "INCOMPLETE".to_owned(),
                    consumed.to_string(),
                    needed.to_string(),
                ];
            }
            ParseStep::Error(err) => {
                break vec![
                    "ERROR".to_owned(),
                    err.line.to_string(),
                    err.col.to_string(),
                    err.message,
                ];
            }
        }
    };
    let text = list::format_list(&fields);
    let result = host.str_new(interp, &text);
    host.result_set(interp, result);
    Status::Ok
}
