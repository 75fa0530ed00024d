//! The built-in command set.
//!
//! Each command family has its own submodule; this module owns the
//! [`Builtin`] registry enum, the dispatch table, and the shared
//! arity/subcommand error helpers every family uses.

mod control;
mod dicts;
mod format;
mod introspect;
mod lists;
mod procs;
mod strings;
mod variables;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    error::FeatherError,
    eval::Evaluator,
    expr::Operand,
    handle::ValueId,
    host::HostOps,
    status::FlowResult,
};

/// Every core-registered built-in command.
///
/// The strum string forms are the command names as registered in the host's
/// command table (all lowercase, e.g. `Llength` → "llength").
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum Builtin {
    // variables
    Set,
    Unset,
    Incr,
    Append,
    Global,
    Variable,
    Upvar,
    Uplevel,
    // control flow
    If,
    While,
    For,
    Foreach,
    Lmap,
    Break,
    Continue,
    Switch,
    Eval,
    // procedures and error handling
    Proc,
    Return,
    Error,
    Throw,
    Catch,
    Try,
    Apply,
    Tailcall,
    Rename,
    // expressions and substitution
    Expr,
    Subst,
    // lists
    List,
    Llength,
    Lindex,
    Lrange,
    Lappend,
    Lset,
    Linsert,
    Lreplace,
    Lrepeat,
    Lreverse,
    Lsort,
    Lsearch,
    Lassign,
    Split,
    Join,
    Concat,
    // dicts and strings
    Dict,
    String,
    Format,
    Scan,
    // introspection
    Info,
    Trace,
}

impl Builtin {
    /// The command name this built-in is registered under.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Invokes the built-in with a substituted argv (`argv[0]` is the
    /// command name as invoked).
    pub(crate) fn call<H: HostOps>(self, ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
        match self {
            Self::Set => variables::set(ev, argv),
            Self::Unset => variables::unset(ev, argv),
            Self::Incr => variables::incr(ev, argv),
            Self::Append => variables::append(ev, argv),
            Self::Global => variables::global(ev, argv),
            Self::Variable => variables::variable(ev, argv),
            Self::Upvar => variables::upvar(ev, argv),
            Self::Uplevel => variables::uplevel(ev, argv),
            Self::If => control::if_cmd(ev, argv),
            Self::While => control::while_cmd(ev, argv),
            Self::For => control::for_cmd(ev, argv),
            Self::Foreach => control::foreach(ev, argv),
            Self::Lmap => control::lmap(ev, argv),
            Self::Break => control::break_cmd(ev, argv),
            Self::Continue => control::continue_cmd(ev, argv),
            Self::Switch => control::switch(ev, argv),
            Self::Eval => control::eval_cmd(ev, argv),
            Self::Proc => procs::proc_cmd(ev, argv),
            Self::Return => procs::return_cmd(ev, argv),
            Self::Error => procs::error_cmd(ev, argv),
            Self::Throw => procs::throw(ev, argv),
            Self::Catch => procs::catch(ev, argv),
            Self::Try => procs::try_cmd(ev, argv),
            Self::Apply => procs::apply(ev, argv),
            Self::Tailcall => procs::tailcall(ev, argv),
            Self::Rename => procs::rename(ev, argv),
            Self::Expr => control::expr_cmd(ev, argv),
            Self::Subst => strings::subst(ev, argv),
            Self::List => lists::list_cmd(ev, argv),
            Self::Llength => lists::llength(ev, argv),
            Self::Lindex => lists::lindex(ev, argv),
            Self::Lrange => lists::lrange(ev, argv),
            Self::Lappend => lists::lappend(ev, argv),
            Self::Lset => lists::lset(ev, argv),
            Self::Linsert => lists::linsert(ev, argv),
            Self::Lreplace => lists::lreplace(ev, argv),
            Self::Lrepeat => lists::lrepeat(ev, argv),
            Self::Lreverse => lists::lreverse(ev, argv),
            Self::Lsort => lists::lsort(ev, argv),
            Self::Lsearch => lists::lsearch(ev, argv),
            Self::Lassign => lists::lassign(ev, argv),
            Self::Split => lists::split(ev, argv),
            Self::Join => lists::join(ev, argv),
            Self::Concat => lists::concat(ev, argv),
            Self::Dict => dicts::dict_cmd(ev, argv),
            Self::String => strings::string_cmd(ev, argv),
            Self::Format => format::format_cmd(ev, argv),
            Self::Scan => format::scan_cmd(ev, argv),
            Self::Info => introspect::info(ev, argv),
            Self::Trace => introspect::trace(ev, argv),
        }
    }
}

/// Uniform arity check; counts include the command word itself.
pub(crate) fn check_arity(
    argv: &[ValueId],
    min: usize,
    max: Option<usize>,
    usage: &str,
) -> FlowResult<()> {
    if argv.len() < min || max.is_some_and(|m| argv.len() > m) {
        return Err(FeatherError::wrong_num_args(usage).into());
    }
    Ok(())
}

/// Uniform unknown-subcommand error for ensemble commands.
pub(crate) fn bad_subcommand(got: &str, choices: &[&str]) -> FeatherError {
    let listed = match choices.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{}, or {last}", rest.join(", ")),
        Some((last, _)) => (*last).to_owned(),
        None => String::new(),
    };
    FeatherError::new(format!(
        "unknown or ambiguous subcommand \"{got}\": must be {listed}"
    ))
}

/// Converts an expression result into a host value handle.
pub(crate) fn operand_value<H: HostOps>(ev: &mut Evaluator<'_, H>, operand: Operand) -> ValueId {
    match operand {
        Operand::Int(i) => ev.int(i),
        Operand::Double(d) => ev.host.double_new(ev.interp, d),
        Operand::Str(s) => ev.intern(&s),
    }
}
