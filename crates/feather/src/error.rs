//! The public error type and the uniform error-message constructors.
//!
//! Errors carry three pieces of user-visible state mirroring Tcl's return
//! options: the message (which becomes the interpreter result), the
//! `-errorcode` machine-readable list, and the `-errorinfo` unwinding trace
//! accumulated one line per frame as the error propagates.

use std::fmt;

/// An error produced by parsing or evaluation.
///
/// This is the boundary type handed to hosts: the message is what
/// `interp.get_result()` will hold, `error_code()` and `error_info()` feed
/// the `-errorcode`/`-errorinfo` return options and the `errorCode`/
/// `errorInfo` magic globals.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeatherError {
    message: String,
    /// `-errorcode` as Tcl list text; `None` means the default `NONE`.
    error_code: Option<String>,
    /// Accumulated `-errorinfo` trace; `None` until the first frame line.
    error_info: Option<String>,
    /// Line number (1-based) of the command that raised the error.
    error_line: Option<usize>,
}

impl FeatherError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: None,
            error_info: None,
            error_line: None,
        }
    }

    /// Creates an error with an explicit `-errorcode` list.
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: Some(code.into()),
            error_info: None,
            error_line: None,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The `-errorcode` list text (`NONE` when the error carries none).
    #[must_use]
    pub fn error_code(&self) -> &str {
        self.error_code.as_deref().unwrap_or("NONE")
    }

    /// The accumulated `-errorinfo` trace (the bare message before any frame
    /// line has been appended).
    #[must_use]
    pub fn error_info(&self) -> &str {
        self.error_info.as_deref().unwrap_or(&self.message)
    }

    /// Line of the command that raised the error, if known.
    #[must_use]
    pub fn error_line(&self) -> Option<usize> {
        self.error_line
    }

    pub(crate) fn set_error_code(&mut self, code: impl Into<String>) {
        self.error_code = Some(code.into());
    }

    pub(crate) fn set_error_info(&mut self, info: impl Into<String>) {
        self.error_info = Some(info.into());
    }

    pub(crate) fn set_error_line(&mut self, line: usize) {
        if self.error_line.is_none() {
            self.error_line = Some(line);
        }
    }

    /// Appends one unwinding-trace line. The first call seeds the trace with
    /// the message followed by a `while executing` frame; later calls append
    /// `invoked from within` frames.
    pub(crate) fn add_trace_frame(&mut self, command: &str) {
        let shown = truncate_command(command);
        match &mut self.error_info {
            None => {
                self.error_info = Some(format!(
                    "{}\n    while executing\n\"{shown}\"",
                    self.message
                ));
            }
            Some(info) => {
                info.push_str("\n    invoked from within\n\"");
                info.push_str(&shown);
                info.push('"');
            }
        }
    }

    // --- uniform constructors -------------------------------------------

    /// `wrong # args: should be "<usage>"`
    pub(crate) fn wrong_num_args(usage: &str) -> Self {
        Self::with_code(
            format!("wrong # args: should be \"{usage}\""),
            "TCL WRONGARGS",
        )
    }

    /// `expected <kind> but got "<value>"`
    pub(crate) fn expected(kind: &str, got: &str) -> Self {
        Self::new(format!("expected {kind} but got \"{got}\""))
    }

    pub(crate) fn invalid_command(name: &str) -> Self {
        Self::with_code(
            format!("invalid command name \"{name}\""),
            format!("TCL LOOKUP COMMAND {name}"),
        )
    }

    pub(crate) fn cant_read_var(name: &str, reason: &str) -> Self {
        Self::with_code(
            format!("can't read \"{name}\": {reason}"),
            format!("TCL READ VARNAME {name}"),
        )
    }

    pub(crate) fn cant_unset_var(name: &str) -> Self {
        Self::with_code(
            format!("can't unset \"{name}\": no such variable"),
            format!("TCL LOOKUP VARNAME {name}"),
        )
    }

    pub(crate) fn div_by_zero() -> Self {
        Self::with_code("divide by zero", "ARITH DIVZERO {divide by zero}")
    }

    pub(crate) fn recursion_limit() -> Self {
        Self::with_code("too many nested evaluations", "TCL LIMIT STACK")
    }

    pub(crate) fn bad_index(got: &str) -> Self {
        Self::new(format!(
            "bad index \"{got}\": must be integer?[+-]integer? or end?[+-]integer?"
        ))
    }
}

impl fmt::Display for FeatherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FeatherError {}

/// Truncates long command text for errorinfo frames the way Tcl does,
/// keeping the head and marking the cut with an ellipsis.
fn truncate_command(command: &str) -> String {
    const LIMIT: usize = 150;
    if command.len() <= LIMIT {
        return command.to_owned();
    }
    let mut cut = LIMIT;
    while !command.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &command[..cut])
}
