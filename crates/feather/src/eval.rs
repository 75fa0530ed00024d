//! The substitution/evaluation loop.
//!
//! An [`Evaluator`] borrows the host for the duration of one entry-point
//! call; all per-invocation state lives on the Rust call stack, which is
//! what makes re-entry from host commands safe. Scripts are parsed one
//! command at a time, each word substituted into a value handle, and the
//! resulting argv dispatched to a built-in, a user proc (pushing a host
//! frame), or the host's `unknown` fallback.

use smallvec::SmallVec;

use crate::{
    error::FeatherError,
    handle::{InterpId, ValueId},
    host::{CommandKind, HostOps, TraceKind, TraceOp},
    list,
    parse::{self, Command, ParseStep, Token, TokenKind, Word},
    status::{FlowResult, ReturnUnwind, Status, Unwind},
};

/// How a variable name resolves: a plain local in the active frame, or a
/// `(namespace, simple-name)` pair routed to namespace storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VarRef {
    Local(String),
    Namespace { ns: String, name: String },
}

/// One word after substitution: a single value, or a `{*}`-spliced run.
enum WordValue {
    Single(ValueId),
    Splice(Vec<ValueId>),
}

/// The evaluator: a host borrow, an interpreter handle, and two depth
/// counters (command-substitution nesting and trace suppression).
pub(crate) struct Evaluator<'h, H: HostOps> {
    pub host: &'h mut H,
    pub interp: InterpId,
    subst_depth: usize,
    trace_depth: usize,
}

impl<'h, H: HostOps> Evaluator<'h, H> {
    pub fn new(host: &'h mut H, interp: InterpId) -> Self {
        Self {
            host,
            interp,
            subst_depth: 0,
            trace_depth: 0,
        }
    }

    // --- small host conveniences ----------------------------------------

    pub fn value_text(&mut self, value: ValueId) -> String {
        self.host.str_value(self.interp, value)
    }

    pub fn intern(&mut self, text: &str) -> ValueId {
        self.host.str_new(self.interp, text)
    }

    pub fn empty(&mut self) -> ValueId {
        self.host.str_empty(self.interp)
    }

    pub fn int(&mut self, value: i64) -> ValueId {
        self.host.int_new(self.interp, value)
    }

    /// Reads a value as an integer, with the uniform type error.
    pub fn want_int(&mut self, value: ValueId) -> FlowResult<i64> {
        match self.host.int_value(self.interp, value) {
            Some(i) => Ok(i),
            None => {
                let text = self.value_text(value);
                Err(FeatherError::expected("integer", &text).into())
            }
        }
    }

    /// Reads a value's elements, shimmering it to a list in place.
    pub fn list_items(&mut self, value: ValueId) -> FlowResult<Vec<ValueId>> {
        let len = self
            .host
            .list_length(self.interp, value)
            .map_err(FeatherError::from)?;
        let mut items = Vec::with_capacity(len);
        for i in 0..len {
            match self.host.list_at(self.interp, value, i).map_err(FeatherError::from)? {
                Some(v) => items.push(v),
                None => break,
            }
        }
        Ok(items)
    }

    pub fn make_list(&mut self, items: &[ValueId]) -> ValueId {
        let handle = self.host.list_new(self.interp);
        for &item in items {
            self.host.list_push(self.interp, handle, item);
        }
        handle
    }

    pub fn make_str_list(&mut self, items: &[String]) -> ValueId {
        let handles: Vec<ValueId> = items.iter().map(|s| self.intern(s)).collect();
        self.make_list(&handles)
    }

    // --- script evaluation ----------------------------------------------

    /// Evaluates a script, returning the last command's result (the empty
    /// string for an empty script). Errors pick up one `-errorinfo` frame
    /// per enclosing script as they unwind.
    pub fn eval_script(&mut self, src: &str) -> FlowResult {
        let mut at = 0;
        let mut result = ValueId::NIL;
        loop {
            match parse::next_command(src, at) {
                ParseStep::End => break,
                ParseStep::Complete(cmd) => {
                    at = next_offset(src, cmd.end);
                    match self.eval_command(src, &cmd) {
                        Ok(value) => result = value,
                        Err(Unwind::Error(mut err)) => {
                            let (line, _) = parse::line_col(src, cmd.start);
                            err.set_error_line(line);
                            err.add_trace_frame(cmd.text(src));
                            return Err(Unwind::Error(err));
                        }
                        Err(other) => return Err(other),
                    }
                }
                ParseStep::Incomplete { consumed, .. } => {
                    return Err(incomplete_error(src, consumed).into());
                }
                ParseStep::Error(parse_err) => return Err(FeatherError::from(parse_err).into()),
            }
        }
        if result.is_nil() {
            result = self.empty();
        }
        Ok(result)
    }

    /// Evaluates the script held by a value handle.
    pub fn eval_script_value(&mut self, script: ValueId) -> FlowResult {
        let text = self.value_text(script);
        self.eval_script(&text)
    }

    /// Evaluates one parsed command: substitution, argv assembly, dispatch.
    pub fn eval_command(&mut self, src: &str, cmd: &Command) -> FlowResult {
        let mut argv: SmallVec<[ValueId; 16]> = SmallVec::new();
        for word in &cmd.words {
            match self.subst_word(src, word)? {
                WordValue::Single(value) => argv.push(value),
                WordValue::Splice(values) => argv.extend(values),
            }
        }
        if argv.is_empty() {
            // expansion of an empty list can erase the whole command
            return Ok(self.empty());
        }
        self.dispatch(&argv, cmd.text(src))
    }

    /// Dispatches an already-substituted argv. `cmd_text` is the source
    /// rendition used for traces and error frames.
    pub fn dispatch(&mut self, argv: &[ValueId], cmd_text: &str) -> FlowResult {
        let name = self.value_text(argv[0]);
        self.fire_execution_traces(&name, cmd_text, TraceOp::Enter, None)?;
        let outcome = match self.host.cmd_lookup(self.interp, &name) {
            CommandKind::Builtin(builtin) => builtin.call(self, argv),
            CommandKind::Proc => self.call_proc(&name, argv),
            CommandKind::None => self.dispatch_unknown(&name, argv),
        };
        self.fire_execution_traces(&name, cmd_text, TraceOp::Leave, Some(&outcome))?;
        outcome
    }

    fn dispatch_unknown(&mut self, name: &str, argv: &[ValueId]) -> FlowResult {
        let args_list = self.make_list(argv);
        match self.host.unknown(self.interp, args_list) {
            None => Err(FeatherError::invalid_command(name).into()),
            Some(Ok(value)) => Ok(value),
            Some(Err(host_err)) => {
                if host_err.message.is_empty() {
                    Err(FeatherError::invalid_command(name).into())
                } else {
                    Err(FeatherError::from(host_err).into())
                }
            }
        }
    }

    // --- word substitution ----------------------------------------------

    fn subst_word(&mut self, src: &str, word: &Word) -> FlowResult<WordValue> {
        let value = if let [single] = word.parts.as_slice() {
            self.subst_token(src, single)?
        } else {
            let mut out = String::new();
            for part in &word.parts {
                let piece = self.subst_token(src, part)?;
                out.push_str(&self.value_text(piece));
            }
            self.intern(&out)
        };
        if word.expand {
            let items = self.list_items(value)?;
            Ok(WordValue::Splice(items))
        } else {
            Ok(WordValue::Single(value))
        }
    }

    fn subst_token(&mut self, src: &str, token: &Token) -> FlowResult<ValueId> {
        match token.kind {
            TokenKind::Literal => {
                let text = token.inner(src);
                if text.contains('\\') {
                    let substituted = parse::substitute_backslashes(text);
                    Ok(self.intern(&substituted))
                } else {
                    Ok(self.intern(text))
                }
            }
            TokenKind::Variable | TokenKind::BracedVariable => self.var_read(token.inner(src)),
            TokenKind::Command => self.eval_nested_script(token.inner(src)),
            TokenKind::Braced => Ok(self.intern(token.inner(src))),
            TokenKind::Quoted => {
                let mut out = String::new();
                for part in &token.parts {
                    match part.kind {
                        TokenKind::Literal => {
                            out.push_str(&parse::substitute_backslashes(part.inner(src)));
                        }
                        _ => {
                            let value = self.subst_token(src, part)?;
                            out.push_str(&self.value_text(value));
                        }
                    }
                }
                Ok(self.intern(&out))
            }
        }
    }

    /// Command substitution: one more nesting level, checked against the
    /// recursion limit so bracket bombs fail cleanly instead of exhausting
    /// the stack.
    pub fn eval_nested_script(&mut self, script: &str) -> FlowResult {
        if self.subst_depth >= self.host.recursion_limit(self.interp) {
            return Err(FeatherError::recursion_limit().into());
        }
        self.subst_depth += 1;
        let result = self.eval_script(script);
        self.subst_depth -= 1;
        result
    }

    // --- variable access (resolution, links, traces) --------------------

    /// Resolves a possibly qualified name per the flat-frame model:
    /// unqualified names stay in the active frame; `::`-qualified names are
    /// split into `(namespace, simple-name)` and routed to namespace
    /// storage.
    pub fn resolve_var(&mut self, name: &str) -> VarRef {
        if !name.contains("::") {
            return VarRef::Local(name.to_owned());
        }
        let absolute = if name.starts_with("::") {
            name.to_owned()
        } else {
            let current = self.host.frame_namespace(self.interp);
            join_ns(&current, name)
        };
        let (ns, simple) = split_qualified(&absolute);
        VarRef::Namespace {
            ns,
            name: simple,
        }
    }

    pub fn var_read(&mut self, name: &str) -> FlowResult {
        self.fire_var_traces(name, TraceOp::Read)?;
        let value = match self.resolve_var(name) {
            VarRef::Local(local) => self.host.var_get(self.interp, &local),
            VarRef::Namespace { ns, name: simple } => self.host.ns_get_var(self.interp, &ns, &simple),
        };
        value.ok_or_else(|| FeatherError::cant_read_var(name, "no such variable").into())
    }

    pub fn var_write(&mut self, name: &str, value: ValueId) -> FlowResult {
        match self.resolve_var(name) {
            VarRef::Local(local) => self
                .host
                .var_set(self.interp, &local, value)
                .map_err(|e| Unwind::Error(e.into()))?,
            VarRef::Namespace { ns, name: simple } => {
                self.host.ns_create(self.interp, &ns);
                self.host.ns_set_var(self.interp, &ns, &simple, value);
            }
        }
        self.fire_var_traces(name, TraceOp::Write)?;
        Ok(value)
    }

    pub fn var_unset(&mut self, name: &str) -> FlowResult<bool> {
        let existed = match self.resolve_var(name) {
            VarRef::Local(local) => self.host.var_unset(self.interp, &local),
            VarRef::Namespace { ns, name: simple } => self.host.ns_unset_var(self.interp, &ns, &simple),
        };
        if existed {
            self.fire_var_traces(name, TraceOp::Unset)?;
        }
        Ok(existed)
    }

    pub fn var_exists(&mut self, name: &str) -> bool {
        match self.resolve_var(name) {
            VarRef::Local(local) => self.host.var_exists(self.interp, &local),
            VarRef::Namespace { ns, name: simple } => self.host.ns_var_exists(self.interp, &ns, &simple),
        }
    }

    /// Fires variable traces for `op` on `name`. Re-entrant firing (a trace
    /// handler touching traced variables) is suppressed.
    fn fire_var_traces(&mut self, name: &str, op: TraceOp) -> FlowResult<()> {
        if self.trace_depth > 0 {
            return Ok(());
        }
        let entries = self.host.trace_list(self.interp, TraceKind::Variable, name);
        if entries.is_empty() {
            return Ok(());
        }
        let op_text = op.to_string();
        for entry in entries {
            if !entry.ops.contains(op) {
                continue;
            }
            let script = self.value_text(entry.script);
            let call = format!(
                "{script} {}",
                list::format_list(&[name, "", op_text.as_str()])
            );
            self.trace_depth += 1;
            let result = self.eval_script(&call);
            self.trace_depth -= 1;
            result?;
        }
        Ok(())
    }

    fn fire_execution_traces(
        &mut self,
        name: &str,
        cmd_text: &str,
        op: TraceOp,
        outcome: Option<&FlowResult>,
    ) -> FlowResult<()> {
        if self.trace_depth > 0 {
            return Ok(());
        }
        let entries = self.host.trace_list(self.interp, TraceKind::Execution, name);
        if entries.is_empty() {
            return Ok(());
        }
        let op_text = op.to_string();
        for entry in entries {
            if !entry.ops.contains(op) {
                continue;
            }
            let script = self.value_text(entry.script);
            let call = match (op, outcome) {
                (TraceOp::Leave, Some(result)) => {
                    let (code, value) = match result {
                        Ok(v) => (Status::Ok, *v),
                        Err(unwind) => (unwind.status(), ValueId::NIL),
                    };
                    let result_text = if value.is_nil() {
                        String::new()
                    } else {
                        self.value_text(value)
                    };
                    format!(
                        "{script} {}",
                        list::format_list(&[
                            cmd_text,
                            &code.code().to_string(),
                            &result_text,
                            &op_text
                        ])
                    )
                }
                _ => format!("{script} {}", list::format_list(&[cmd_text, &op_text])),
            };
            self.trace_depth += 1;
            let result = self.eval_script(&call);
            self.trace_depth -= 1;
            result?;
        }
        Ok(())
    }

    // --- procedure invocation -------------------------------------------

    /// Calls a user proc, looping on `tailcall` replacements.
    fn call_proc(&mut self, name: &str, argv: &[ValueId]) -> FlowResult {
        let mut name = name.to_owned();
        let mut argv: Vec<ValueId> = argv.to_vec();
        loop {
            let result = self.invoke_proc(&name, &argv);
            let Err(Unwind::Tailcall(replacement)) = result else {
                return result;
            };
            argv = self.list_items(replacement)?;
            if argv.is_empty() {
                return Ok(self.empty());
            }
            name = self.value_text(argv[0]);
            match self.host.cmd_lookup(self.interp, &name) {
                CommandKind::Proc => {}
                CommandKind::Builtin(builtin) => return builtin.call(self, &argv),
                CommandKind::None => return self.dispatch_unknown(&name, &argv),
            }
        }
    }

    fn invoke_proc(&mut self, name: &str, argv: &[ValueId]) -> FlowResult {
        let limit = self.host.recursion_limit(self.interp);
        if self.host.frame_size(self.interp) >= limit {
            return Err(FeatherError::recursion_limit().into());
        }
        let params = self
            .host
            .proc_params(self.interp, name)
            .ok_or_else(|| FeatherError::invalid_command(name))?;
        let body = self
            .host
            .proc_body(self.interp, name)
            .ok_or_else(|| FeatherError::invalid_command(name))?;

        let args_list = self.make_list(argv);
        // the caller's active frame may be an uplevel redirection; put it
        // back once the callee's frame is gone
        let caller_active = self.host.frame_level(self.interp);
        self.host
            .frame_push(self.interp, argv[0], args_list)
            .map_err(|e| Unwind::Error(e.into()))?;
        let result = self.run_proc_body(name, argv, params, body);
        self.host.frame_pop(self.interp);
        let _ = self.host.frame_set_active(self.interp, caller_active);

        match result {
            Err(Unwind::Return(ret)) => self.apply_return(ret),
            Err(Unwind::Break) => {
                Err(FeatherError::new("invoked \"break\" outside of a loop").into())
            }
            Err(Unwind::Continue) => {
                Err(FeatherError::new("invoked \"continue\" outside of a loop").into())
            }
            other => other,
        }
    }

    fn run_proc_body(
        &mut self,
        name: &str,
        argv: &[ValueId],
        params: ValueId,
        body: ValueId,
    ) -> FlowResult {
        self.bind_params(name, argv, params)?;
        self.eval_script_value(body)
    }

    /// Binds formal parameters in the freshly pushed frame: positional
    /// names, `{name default}` defaults, and a trailing `args` rest-list.
    pub fn bind_params(&mut self, name: &str, argv: &[ValueId], params: ValueId) -> FlowResult<()> {
        let specs = self.list_items(params)?;
        let mut parsed: Vec<(String, Option<ValueId>)> = Vec::with_capacity(specs.len());
        for spec in specs {
            let fields = self.list_items(spec)?;
            match fields.as_slice() {
                [single] => parsed.push((self.value_text(*single), None)),
                [pname, default] => parsed.push((self.value_text(*pname), Some(*default))),
                _ => {
                    let text = self.value_text(spec);
                    return Err(FeatherError::new(format!(
                        "too many fields in argument specifier \"{text}\""
                    ))
                    .into());
                }
            }
        }

        let supplied = &argv[1..];
        let has_rest = parsed.last().is_some_and(|(n, _)| n == "args");
        let fixed = if has_rest { parsed.len() - 1 } else { parsed.len() };

        for (i, (pname, default)) in parsed.iter().take(fixed).enumerate() {
            let value = match supplied.get(i) {
                Some(&v) => v,
                None => match default {
                    Some(d) => *d,
                    None => return Err(self.wrong_proc_args(name, &parsed, has_rest)),
                },
            };
            self.host
                .var_set(self.interp, pname, value)
                .map_err(|e| Unwind::Error(e.into()))?;
        }
        if has_rest {
            let rest = supplied.get(fixed..).unwrap_or(&[]);
            let rest_list = self.make_list(rest);
            self.host
                .var_set(self.interp, "args", rest_list)
                .map_err(|e| Unwind::Error(e.into()))?;
        } else if supplied.len() > fixed {
            return Err(self.wrong_proc_args(name, &parsed, has_rest));
        }
        Ok(())
    }

    fn wrong_proc_args(
        &mut self,
        name: &str,
        parsed: &[(String, Option<ValueId>)],
        has_rest: bool,
    ) -> Unwind {
        let mut usage = name.to_owned();
        let fixed = if has_rest { parsed.len() - 1 } else { parsed.len() };
        for (pname, default) in &parsed[..fixed] {
            usage.push(' ');
            if default.is_some() {
                usage.push('?');
                usage.push_str(pname);
                usage.push('?');
            } else {
                usage.push_str(pname);
            }
        }
        if has_rest {
            usage.push_str(" ?arg ...?");
        }
        FeatherError::wrong_num_args(&usage).into()
    }

    /// Crossing a proc boundary with a `return` unwind: decrement the level
    /// and, at zero, re-materialize the requested completion code.
    pub fn apply_return(&mut self, ret: ReturnUnwind) -> FlowResult {
        if ret.level > 1 {
            return Err(Unwind::Return(ReturnUnwind {
                level: ret.level - 1,
                ..ret
            }));
        }
        self.return_code_outcome(ret)
    }

    /// Applies a fully descended `return`: `-code ok` completes with the
    /// value, other codes resume unwinding as that status.
    pub fn return_code_outcome(&mut self, ret: ReturnUnwind) -> FlowResult {
        match ret.code {
            Status::Ok => Ok(ret.value),
            Status::Error => {
                let err = match ret.err {
                    Some(carried) => carried,
                    None => {
                        let message = self.value_text(ret.value);
                        FeatherError::new(message)
                    }
                };
                Err(Unwind::Error(err))
            }
            Status::Break => Err(Unwind::Break),
            Status::Continue => Err(Unwind::Continue),
            Status::Return => Err(Unwind::Return(ReturnUnwind {
                value: ret.value,
                code: Status::Ok,
                level: 1,
                err: None,
            })),
        }
    }

    // --- frame redirection (uplevel) ------------------------------------

    /// Runs `f` with the active frame redirected to `level`, restoring the
    /// previous active frame afterwards. The frame stack itself is
    /// unchanged.
    pub fn with_active_frame<T>(
        &mut self,
        level: usize,
        f: impl FnOnce(&mut Self) -> FlowResult<T>,
    ) -> FlowResult<T> {
        let saved = self.host.frame_level(self.interp);
        self.host
            .frame_set_active(self.interp, level)
            .map_err(|e| Unwind::Error(e.into()))?;
        let result = f(self);
        self.host
            .frame_set_active(self.interp, saved)
            .map_err(|e| Unwind::Error(e.into()))?;
        result
    }

    /// Parses `upvar`/`uplevel` level syntax relative to the active frame:
    /// `#N` is absolute, a bare integer is relative, default 1.
    pub fn parse_level(&mut self, text: &str) -> FlowResult<usize> {
        let current = self.host.frame_level(self.interp);
        let bad = || -> Unwind { FeatherError::new(format!("bad level \"{text}\"")).into() };
        let level = if let Some(abs) = text.strip_prefix('#') {
            abs.parse::<usize>().map_err(|_| bad())?
        } else {
            let rel: usize = text.parse().map_err(|_| bad())?;
            current.checked_sub(rel).ok_or_else(bad)?
        };
        if level > current {
            return Err(bad());
        }
        Ok(level)
    }

    // --- return options -------------------------------------------------

    /// Builds the options dict for a completed body, per `catch`/`try`.
    pub fn unwind_options(&mut self, outcome: &Result<ValueId, &Unwind>) -> ValueId {
        let dict = self.host.dict_new(self.interp);
        let code;
        let mut level = 0i64;
        match outcome {
            Ok(_) => code = Status::Ok.code(),
            Err(Unwind::Return(ret)) => {
                code = Status::Return.code();
                level = ret.level as i64;
            }
            Err(unwind) => code = unwind.status().code(),
        }
        let code_v = self.int(code);
        self.host.dict_set(self.interp, dict, "-code", code_v);
        let level_v = self.int(level);
        self.host.dict_set(self.interp, dict, "-level", level_v);
        if let Err(Unwind::Error(err)) = outcome {
            let info = self.intern(err.error_info());
            self.host.dict_set(self.interp, dict, "-errorinfo", info);
            let errorcode = self.intern(err.error_code());
            self.host.dict_set(self.interp, dict, "-errorcode", errorcode);
            if let Some(line) = err.error_line() {
                let line_v = self.int(line as i64);
                self.host.dict_set(self.interp, dict, "-errorline", line_v);
            }
        }
        dict
    }

    /// The result value a `catch` observer sees for an unwind.
    pub fn unwind_result(&mut self, unwind: &Unwind) -> ValueId {
        match unwind {
            Unwind::Error(err) => {
                let message = err.message().to_owned();
                self.intern(&message)
            }
            Unwind::Return(ret) => ret.value,
            Unwind::Break | Unwind::Continue | Unwind::Tailcall(_) => self.empty(),
        }
    }
}

/// Whether `text` is `upvar`/`uplevel` level syntax (`#N` or a bare
/// integer), used to disambiguate the optional level argument.
pub(crate) fn looks_like_level(text: &str) -> bool {
    if let Some(abs) = text.strip_prefix('#') {
        return !abs.is_empty() && abs.bytes().all(|b| b.is_ascii_digit());
    }
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Joins a namespace path and a relative qualified name.
pub(crate) fn join_ns(current: &str, relative: &str) -> String {
    if current == "::" {
        format!("::{relative}")
    } else {
        format!("{current}::{relative}")
    }
}

/// Splits an absolute qualified name at its last `::` into
/// `(namespace, simple-name)`; the namespace of `::x` is `::`.
pub(crate) fn split_qualified(absolute: &str) -> (String, String) {
    let idx = absolute.rfind("::").unwrap_or(0);
    let simple = &absolute[idx + 2..];
    let ns = if idx == 0 { "::" } else { &absolute[..idx] };
    (ns.to_owned(), simple.to_owned())
}

pub(crate) fn next_offset(src: &str, end: usize) -> usize {
    let bytes = src.as_bytes();
    if end < bytes.len() && (bytes[end] == b'\n' || bytes[end] == b';') {
        end + 1
    } else {
        end
    }
}

/// Maps an incomplete parse inside `eval` to the conventional error text.
fn incomplete_error(src: &str, from: usize) -> FeatherError {
    let tail = &src[from.min(src.len())..];
    let mut brackets = 0i64;
    let mut braces = 0i64;
    let mut in_quotes = false;
    let mut bytes = tail.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'\\' => {
                bytes.next();
            }
            b'{' if !in_quotes => braces += 1,
            b'}' if !in_quotes => braces -= 1,
            b'[' if !in_quotes => brackets += 1,
            b']' if !in_quotes => brackets -= 1,
            b'"' if braces == 0 => in_quotes = !in_quotes,
            _ => {}
        }
    }
    if in_quotes {
        FeatherError::new("missing \"")
    } else if brackets > 0 {
        FeatherError::new("missing close-bracket")
    } else {
        FeatherError::new("missing close-brace")
    }
}
