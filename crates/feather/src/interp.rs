//! `Interp`: a ready-to-use session bundling the reference host with one
//! interpreter, for embedders that don't bring their own storage.

use crate::{
    error::FeatherError,
    handle::InterpId,
    host::HostOps,
    memory::{HostCommandFn, MemoryHost},
    run::{self, EvalFlags},
    status::Status,
};

/// A persistent interpreter session over [`MemoryHost`].
///
/// State (variables, procedures, namespaces, traces) survives across `eval`
/// calls, and the whole session can be snapshotted with `dump()`/`load()`.
///
/// # Example
/// ```
/// use feather::Interp;
///
/// let mut interp = Interp::new();
/// interp.eval("set x 10; set y 5").unwrap();
/// let result = interp.eval("expr {$x * $y + 2}").unwrap();
/// assert_eq!(result, "52");
/// ```
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Interp {
    host: MemoryHost,
    interp: InterpId,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    /// Creates a session with all built-ins registered.
    #[must_use]
    pub fn new() -> Self {
        let mut host = MemoryHost::new();
        let interp = host.create_interp();
        run::interp_init(&mut host, interp);
        Self { host, interp }
    }

    /// Evaluates a script and returns the result's string form.
    ///
    /// A top-level `return` yields its value; `break`/`continue` escaping to
    /// the top yield the empty string (the raw status is available through
    /// [`Interp::eval_status`]).
    ///
    /// # Errors
    /// Returns the error with its accumulated `-errorinfo` trace and
    /// `-errorcode` when the script raises one.
    pub fn eval(&mut self, script: &str) -> Result<String, FeatherError> {
        let (status, err) = run::script_eval_full(&mut self.host, self.interp, script, EvalFlags::Local);
        match status {
            Status::Error => Err(err.unwrap_or_else(|| {
                let result = self.host.result_get(self.interp);
                FeatherError::new(self.host.str_value(self.interp, result))
            })),
            _ => Ok(self.result()),
        }
    }

    /// Evaluates a script and returns the raw completion status, leaving
    /// the result in the interpreter.
    pub fn eval_status(&mut self, script: &str) -> Status {
        run::script_eval(&mut self.host, self.interp, script, EvalFlags::Local)
    }

    /// The current interpreter result as a string.
    pub fn result(&mut self) -> String {
        let result = self.host.result_get(self.interp);
        self.host.str_value(self.interp, result)
    }

    /// Sets a global variable from a string value.
    pub fn set_var(&mut self, name: &str, value: &str) {
        let handle = self.host.str_new(self.interp, value);
        self.host.ns_set_var(self.interp, "::", name, handle);
    }

    /// Reads a global variable's string form.
    pub fn get_var(&mut self, name: &str) -> Option<String> {
        let handle = self.host.ns_get_var(self.interp, "::", name)?;
        Some(self.host.str_value(self.interp, handle))
    }

    /// Configures the nesting limit (default 1000).
    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.host.set_recursion_limit(self.interp, limit);
    }

    /// Registers a host extension command dispatched via the `unknown`
    /// hook.
    pub fn register_command(&mut self, name: &str, f: HostCommandFn) {
        self.host.register_command(name, f);
    }

    /// The underlying host, for direct handle-level work.
    pub fn host_mut(&mut self) -> &mut MemoryHost {
        &mut self.host
    }

    /// The interpreter handle inside the host.
    #[must_use]
    pub fn interp_id(&self) -> InterpId {
        self.interp
    }

    /// Serializes the whole session to a binary snapshot.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores a session from `dump()` output. Extension commands must be
    /// re-registered (they are function pointers and don't serialize).
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
