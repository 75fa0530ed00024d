//! Completion statuses and the unwinding machinery built on them.
//!
//! Control flow (`return`, `break`, `continue`, errors) is realized as status
//! values that unwind the evaluator, never as panics or exceptions crossing
//! the core boundary. Internally every evaluator function threads a
//! [`FlowResult`], the sum-type rendition of `(status, value, options)`.

use strum::{Display, EnumString, IntoStaticStr};

use crate::{error::FeatherError, handle::ValueId};

/// Command completion status.
///
/// The numeric codes are frozen ABI: `OK=0`, `ERROR=1`, `RETURN=2`,
/// `BREAK=3`, `CONTINUE=4`. The string forms (via strum) are the names
/// accepted by `return -code` and `try ... on`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
    Return,
    Break,
    Continue,
}

impl Status {
    /// Returns the frozen numeric status code.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Ok => 0,
            Self::Error => 1,
            Self::Return => 2,
            Self::Break => 3,
            Self::Continue => 4,
        }
    }

    /// Maps a numeric code back to a status. Codes outside `0..=4` have no
    /// named status and yield `None`.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Error),
            2 => Some(Self::Return),
            3 => Some(Self::Break),
            4 => Some(Self::Continue),
            _ => None,
        }
    }
}

/// Result type threaded through every evaluator function.
pub(crate) type FlowResult<T = ValueId> = Result<T, Unwind>;

/// A non-`OK` outcome unwinding the evaluator.
///
/// `catch` and `try` are the only constructs that intercept all variants;
/// loops intercept `Break`/`Continue`; proc invocation intercepts `Return`
/// and `Tailcall`.
#[derive(Debug)]
pub(crate) enum Unwind {
    /// An error carrying message, `-errorcode`, and accumulated `-errorinfo`.
    Error(FeatherError),
    /// `return` (or `return -code ...`) travelling up `level` proc frames.
    Return(ReturnUnwind),
    Break,
    Continue,
    /// `tailcall`: replace the enclosing proc's pending return with a call to
    /// the argv held by this list handle, evaluated in the proc's caller.
    Tailcall(ValueId),
}

impl Unwind {
    /// The status a host observes if this unwind reaches the boundary.
    pub fn status(&self) -> Status {
        match self {
            Self::Error(_) => Status::Error,
            Self::Return(_) => Status::Return,
            Self::Break => Status::Break,
            Self::Continue => Status::Continue,
            // An escaped tailcall is reported as an error by the dispatcher
            // before it can reach the boundary.
            Self::Tailcall(_) => Status::Error,
        }
    }
}

impl From<FeatherError> for Unwind {
    fn from(err: FeatherError) -> Self {
        Self::Error(err)
    }
}

/// Payload of a `return` travelling up the frame stack.
///
/// `level` counts proc boundaries still to cross; each boundary decrements
/// it. When it reaches zero the return re-materializes as `code`: plain `ok`
/// completes the proc with `value`, `error` raises `err`, and
/// `break`/`continue`/`return` resume unwinding as that status.
#[derive(Debug)]
pub(crate) struct ReturnUnwind {
    pub value: ValueId,
    pub code: Status,
    pub level: usize,
    /// `-errorinfo`/`-errorcode` payload, populated when `code` is `error`.
    pub err: Option<FeatherError>,
}
