#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional")]
#![expect(clippy::cast_possible_wrap, reason = "wrap behavior mirrors Tcl arithmetic")]
#![expect(clippy::missing_panics_doc, reason = "panics only on internal invariant breaks")]
#![expect(clippy::must_use_candidate, reason = "annotated where it aids call sites")]

mod builtins;
mod error;
mod eval;
mod expr;
mod handle;
mod host;
mod interp;
mod memory;
mod run;
mod status;

pub mod list;
pub mod number;
pub mod parse;

pub use crate::{
    builtins::Builtin,
    error::FeatherError,
    handle::{InterpId, ValueId},
    host::{
        CommandKind, FrameInfo, HostError, HostOps, TraceEntry, TraceKind, TraceOp, TraceOps,
    },
    interp::Interp,
    memory::{HostCommandFn, MemoryHost},
    parse::{
        Command, ParseError, ParseStep, ParserState, Token, TokenKind, Tokenizer, Word,
        command_complete,
    },
    run::{EvalFlags, command_exec, interp_init, parse_script, script_eval, script_eval_obj},
    status::Status,
};
