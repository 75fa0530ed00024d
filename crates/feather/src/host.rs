//! The host ABI: every piece of state the core touches goes through here.
//!
//! The C-shaped design is a vtable of callbacks grouped into sub-tables
//! (frames, variables, commands, namespaces, strings, lists, dicts, numbers,
//! interpreter state, dispatch fallback, traces). The strongly-typed Rust
//! rendition is this trait, with the sub-table grouping preserved as method
//! name prefixes. The core is generic over `H: HostOps` and owns no state of
//! its own beyond the call stack, so re-entry from a host command is safe
//! with no additional setup.
//!
//! Callbacks are non-throwing: failures are reported as [`HostError`] values,
//! never as panics crossing the boundary.

use crate::{
    builtins::Builtin,
    error::FeatherError,
    handle::{InterpId, ValueId},
};

/// Error channel for host callbacks.
///
/// An empty message is meaningful for the `unknown` hook: the core then
/// synthesizes the standard `invalid command name` message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HostError {
    pub message: String,
    /// Optional `-errorcode` list text.
    pub code: Option<String>,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// An error with no message, asking the core to synthesize one.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            message: String::new(),
            code: None,
        }
    }
}

impl From<HostError> for FeatherError {
    fn from(err: HostError) -> Self {
        match err.code {
            Some(code) => Self::with_code(err.message, code),
            None => Self::new(err.message),
        }
    }
}

/// What a command name resolves to in the host's command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// No entry; dispatch falls through to the `unknown` hook.
    None,
    /// A core-registered built-in.
    Builtin(Builtin),
    /// A user procedure defined via `proc` (body and params held by the host).
    Proc,
}

/// Per-frame data exposed for introspection (`info level`, `info frame`).
#[derive(Debug, Clone)]
pub struct FrameInfo {
    /// The command name handle as invoked.
    pub cmd: ValueId,
    /// The full argument list handle (element 0 is the command name).
    pub args: ValueId,
    /// The frame's current namespace (`::` for the global namespace).
    pub namespace: String,
}

/// Which trace table a registration lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TraceKind {
    Variable,
    Execution,
}

/// A single hook point a trace can fire at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TraceOp {
    Read,
    Write,
    Unset,
    Enter,
    Leave,
}

/// The set of operations one trace registration listens to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TraceOps {
    pub read: bool,
    pub write: bool,
    pub unset: bool,
    pub enter: bool,
    pub leave: bool,
}

impl TraceOps {
    #[must_use]
    pub fn contains(self, op: TraceOp) -> bool {
        match op {
            TraceOp::Read => self.read,
            TraceOp::Write => self.write,
            TraceOp::Unset => self.unset,
            TraceOp::Enter => self.enter,
            TraceOp::Leave => self.leave,
        }
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        !(self.read || self.write || self.unset || self.enter || self.leave)
    }

    /// Renders the registered operations as a Tcl list, in canonical order.
    #[must_use]
    pub fn to_list(self) -> String {
        let mut out = Vec::new();
        if self.read {
            out.push("read");
        }
        if self.write {
            out.push("write");
        }
        if self.unset {
            out.push("unset");
        }
        if self.enter {
            out.push("enter");
        }
        if self.leave {
            out.push("leave");
        }
        out.join(" ")
    }
}

/// One trace registration as reported back to the core for firing.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub ops: TraceOps,
    /// The command prefix script to invoke at the hook point.
    pub script: ValueId,
}

/// The complete host callback surface.
///
/// Handle lifetime contract: handles passed into a method are live for the
/// duration of the call; handles returned stay reachable at least until the
/// core stores them via `var_set`/`result_set` or abandons them. The core
/// never frees a handle.
///
/// `list_from`/`dict_from` must return a fresh, unshared handle (copying the
/// elements) so the core can mutate the copy without aliasing — this is how
/// Tcl's value semantics survive mutable handles.
pub trait HostOps {
    // --- frames ---------------------------------------------------------

    /// Pushes a call frame. `cmd` is the command name as invoked, `args` the
    /// full argument list.
    fn frame_push(&mut self, interp: InterpId, cmd: ValueId, args: ValueId) -> Result<(), HostError>;

    /// Pops the top frame, releasing its locals and links. Frame 0 is never
    /// popped.
    fn frame_pop(&mut self, interp: InterpId);

    /// The active frame's level (0 = global). Usually the top of the stack,
    /// redirected during `uplevel`.
    fn frame_level(&mut self, interp: InterpId) -> usize;

    /// Redirects variable resolution to the frame at `level`.
    fn frame_set_active(&mut self, interp: InterpId, level: usize) -> Result<(), HostError>;

    /// Number of frames on the stack (≥ 1; the global frame always exists).
    fn frame_size(&mut self, interp: InterpId) -> usize;

    /// Introspection data for the frame at `level`, or `None` if out of range.
    fn frame_info(&mut self, interp: InterpId, level: usize) -> Option<FrameInfo>;

    /// The active frame's current namespace.
    fn frame_namespace(&mut self, interp: InterpId) -> String;

    fn frame_set_namespace(&mut self, interp: InterpId, ns: &str);

    // --- variables (active frame; the host dereferences links) ----------

    fn var_get(&mut self, interp: InterpId, name: &str) -> Option<ValueId>;

    fn var_set(&mut self, interp: InterpId, name: &str, value: ValueId) -> Result<(), HostError>;

    /// Removes a variable; returns whether it existed.
    fn var_unset(&mut self, interp: InterpId, name: &str) -> bool;

    fn var_exists(&mut self, interp: InterpId, name: &str) -> bool;

    /// Installs an upvar link: `local` in the active frame resolves to
    /// `target` in the frame at absolute level `target_level`.
    fn var_link(
        &mut self,
        interp: InterpId,
        local: &str,
        target_level: usize,
        target: &str,
    ) -> Result<(), HostError>;

    /// Installs a namespace-variable link (`variable` / `global`).
    fn var_link_ns(&mut self, interp: InterpId, local: &str, ns: &str, target: &str) -> Result<(), HostError>;

    /// Names of variables visible in the active frame (locals and links).
    fn var_names(&mut self, interp: InterpId) -> Vec<String>;

    /// Whether `name` is a link (upvar or namespace) rather than a plain
    /// local. `info locals` excludes links.
    fn var_is_link(&mut self, interp: InterpId, name: &str) -> bool;

    // --- commands and procedures ----------------------------------------

    fn cmd_lookup(&mut self, interp: InterpId, name: &str) -> CommandKind;

    fn cmd_register_builtin(&mut self, interp: InterpId, name: &str, builtin: Builtin);

    /// Renames a command; an empty `new` deletes it.
    fn cmd_rename(&mut self, interp: InterpId, old: &str, new: &str) -> Result<(), HostError>;

    /// All command names (built-ins and procs).
    fn cmd_names(&mut self, interp: InterpId) -> Vec<String>;

    fn proc_define(
        &mut self,
        interp: InterpId,
        name: &str,
        params: ValueId,
        body: ValueId,
    ) -> Result<(), HostError>;

    fn proc_exists(&mut self, interp: InterpId, name: &str) -> bool;

    /// The formal parameter list of a proc, or `None` for non-procs.
    fn proc_params(&mut self, interp: InterpId, name: &str) -> Option<ValueId>;

    fn proc_body(&mut self, interp: InterpId, name: &str) -> Option<ValueId>;

    fn proc_names(&mut self, interp: InterpId) -> Vec<String>;

    // --- namespaces (flat storage keyed by absolute path) ---------------

    fn ns_create(&mut self, interp: InterpId, path: &str);

    fn ns_delete(&mut self, interp: InterpId, path: &str) -> bool;

    fn ns_exists(&mut self, interp: InterpId, path: &str) -> bool;

    fn ns_children(&mut self, interp: InterpId, path: &str) -> Vec<String>;

    fn ns_get_var(&mut self, interp: InterpId, ns: &str, name: &str) -> Option<ValueId>;

    fn ns_set_var(&mut self, interp: InterpId, ns: &str, name: &str, value: ValueId);

    fn ns_unset_var(&mut self, interp: InterpId, ns: &str, name: &str) -> bool;

    fn ns_var_exists(&mut self, interp: InterpId, ns: &str, name: &str) -> bool;

    fn ns_var_names(&mut self, interp: InterpId, ns: &str) -> Vec<String>;

    // --- strings --------------------------------------------------------

    /// Creates a string value.
    fn str_new(&mut self, interp: InterpId, s: &str) -> ValueId;

    /// The string form of any value (deriving it from the internal form if
    /// necessary). Always succeeds: every value has a string form.
    fn str_value(&mut self, interp: InterpId, value: ValueId) -> String;

    /// The well-known empty-string handle.
    fn str_empty(&mut self, interp: InterpId) -> ValueId;

    /// Glob-style match (`*`, `?`, `[...]`, `\x`).
    fn str_match(&mut self, pattern: &str, s: &str, nocase: bool) -> bool;

    /// Regular-expression match. Regex syntax and engine are host territory.
    fn regex_match(&mut self, interp: InterpId, pattern: &str, s: &str) -> Result<bool, HostError>;

    // --- lists ----------------------------------------------------------

    fn list_new(&mut self, interp: InterpId) -> ValueId;

    /// Coerces `value` to a list and returns a fresh, unshared copy.
    /// Fails when the string form is not valid list syntax.
    fn list_from(&mut self, interp: InterpId, value: ValueId) -> Result<ValueId, HostError>;

    fn list_push(&mut self, interp: InterpId, list: ValueId, value: ValueId);

    /// Element count, shimmering `value` to a list in place if needed.
    fn list_length(&mut self, interp: InterpId, value: ValueId) -> Result<usize, HostError>;

    /// Element at `index`, or `None` when out of range.
    fn list_at(&mut self, interp: InterpId, value: ValueId, index: usize) -> Result<Option<ValueId>, HostError>;

    // --- dicts (ordered string→value mappings) --------------------------

    fn dict_new(&mut self, interp: InterpId) -> ValueId;

    /// Coerces `value` to a dict and returns a fresh, unshared copy.
    fn dict_from(&mut self, interp: InterpId, value: ValueId) -> Result<ValueId, HostError>;

    fn dict_get(&mut self, interp: InterpId, dict: ValueId, key: &str) -> Result<Option<ValueId>, HostError>;

    /// Inserts or overwrites a key, preserving its original insertion slot.
    fn dict_set(&mut self, interp: InterpId, dict: ValueId, key: &str, value: ValueId);

    fn dict_remove(&mut self, interp: InterpId, dict: ValueId, key: &str) -> bool;

    fn dict_size(&mut self, interp: InterpId, dict: ValueId) -> Result<usize, HostError>;

    /// Keys in insertion order.
    fn dict_keys(&mut self, interp: InterpId, dict: ValueId) -> Result<Vec<String>, HostError>;

    // --- numbers --------------------------------------------------------

    fn int_new(&mut self, interp: InterpId, value: i64) -> ValueId;

    /// Reads a value as an integer (shimmering from the string form when
    /// needed); `None` when the value is not a valid integer.
    fn int_value(&mut self, interp: InterpId, value: ValueId) -> Option<i64>;

    fn double_new(&mut self, interp: InterpId, value: f64) -> ValueId;

    fn double_value(&mut self, interp: InterpId, value: ValueId) -> Option<f64>;

    // --- interpreter state ----------------------------------------------

    fn result_set(&mut self, interp: InterpId, value: ValueId);

    fn result_get(&mut self, interp: InterpId) -> ValueId;

    fn result_reset(&mut self, interp: InterpId);

    /// Stores the return-options dict accompanying the last completion.
    fn return_options_set(&mut self, interp: InterpId, options: ValueId);

    fn return_options_get(&mut self, interp: InterpId) -> ValueId;

    /// The path of the script being evaluated (`info script`).
    fn script_get(&mut self, interp: InterpId) -> ValueId;

    fn script_set(&mut self, interp: InterpId, path: ValueId);

    /// The interpreter's configured nesting limit (default 1000).
    fn recursion_limit(&mut self, interp: InterpId) -> usize;

    // --- dispatch fallback ----------------------------------------------

    /// Called when a command name resolves to nothing. `args` is the fully
    /// substituted argument list (element 0 is the command name). Returning
    /// `None` means the host declines, and the core raises the standard
    /// `invalid command name` error; an `Err` with an empty message does the
    /// same.
    fn unknown(&mut self, interp: InterpId, args: ValueId) -> Option<Result<ValueId, HostError>>;

    // --- traces ---------------------------------------------------------

    fn trace_add(&mut self, interp: InterpId, kind: TraceKind, name: &str, ops: TraceOps, script: ValueId);

    /// Removes the first registration matching `(kind, name, ops, script
    /// text)`; returns whether one was removed.
    fn trace_remove(&mut self, interp: InterpId, kind: TraceKind, name: &str, ops: TraceOps, script: &str)
    -> bool;

    /// Registrations for `name`, in registration order.
    fn trace_list(&mut self, interp: InterpId, kind: TraceKind, name: &str) -> Vec<TraceEntry>;
}
