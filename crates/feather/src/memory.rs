//! `MemoryHost`: the in-process reference implementation of [`HostOps`].
//!
//! Values live in an arena of slots addressed by handle (index + 1, handle 0
//! is nil) with the lazy dual representation the ABI expects: every value
//! can produce a string form, and list/dict/int/double internal forms are
//! materialized in place on demand ("shimmering"). The arena retains values
//! for the life of the host; embedders needing reclamation snapshot and
//! restore instead.
//!
//! The whole host serializes with serde/postcard, so an embedder can dump a
//! session (variables, procs, namespaces, traces included) and restore it
//! later byte-for-byte.

use ahash::AHashMap;
use indexmap::IndexMap;
use regex::Regex;

use crate::{
    builtins::Builtin,
    handle::{InterpId, ValueId},
    host::{CommandKind, FrameInfo, HostError, HostOps, TraceEntry, TraceKind, TraceOps},
    list, number,
};

/// A host-registered extension command, dispatched through the `unknown`
/// hook. Receives the full argv (element 0 is the command name).
pub type HostCommandFn =
    fn(&mut MemoryHost, InterpId, &[ValueId]) -> Result<ValueId, HostError>;

/// Internal representation of a value slot.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
enum Rep {
    /// String-only; the text field carries the value.
    None,
    Int(i64),
    Double(f64),
    List(Vec<ValueId>),
    Dict(IndexMap<String, ValueId>),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Obj {
    /// Cached string form; derived lazily for numeric/list/dict reps.
    text: Option<String>,
    rep: Rep,
}

impl Obj {
    fn str(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            rep: Rep::None,
        }
    }
}

/// A variable link installed by `upvar`/`variable`/`global`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
enum Link {
    Frame { level: usize, name: String },
    Ns { ns: String, name: String },
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Frame {
    cmd: ValueId,
    args: ValueId,
    locals: AHashMap<String, ValueId>,
    links: AHashMap<String, Link>,
    namespace: String,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct NsRec {
    vars: AHashMap<String, ValueId>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
enum CommandEntry {
    Builtin(Builtin),
    Proc { params: ValueId, body: ValueId },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct TraceRec {
    kind: TraceKind,
    name: String,
    ops: TraceOps,
    script: ValueId,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct InterpState {
    frames: Vec<Frame>,
    active: usize,
    commands: AHashMap<String, CommandEntry>,
    namespaces: AHashMap<String, NsRec>,
    traces: Vec<TraceRec>,
    result: ValueId,
    return_options: ValueId,
    script: ValueId,
    recursion_limit: usize,
}

impl InterpState {
    fn new() -> Self {
        let mut namespaces = AHashMap::new();
        namespaces.insert("::".to_owned(), NsRec::default());
        Self {
            frames: vec![Frame {
                namespace: "::".to_owned(),
                ..Frame::default()
            }],
            active: 0,
            commands: AHashMap::new(),
            namespaces,
            traces: Vec::new(),
            result: ValueId::NIL,
            return_options: ValueId::NIL,
            script: ValueId::NIL,
            recursion_limit: 1000,
        }
    }
}

/// The reference host. See the module docs for the storage model.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct MemoryHost {
    slots: Vec<Obj>,
    interps: Vec<InterpState>,
    #[serde(skip)]
    regex_cache: AHashMap<String, Regex>,
    #[serde(skip)]
    extensions: AHashMap<String, HostCommandFn>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self {
            // slot 0 is the shared empty-string handle (ValueId 1)
            slots: vec![Obj::str("")],
            interps: Vec::new(),
            regex_cache: AHashMap::new(),
            extensions: AHashMap::new(),
        }
    }

    /// Creates a fresh interpreter record and returns its handle.
    pub fn create_interp(&mut self) -> InterpId {
        self.interps.push(InterpState::new());
        InterpId::new((self.interps.len() - 1) as u32)
    }

    /// Registers an extension command reachable through the `unknown` hook.
    ///
    /// Extension commands are plain function pointers so the host stays
    /// serializable; re-register them after [`MemoryHost::load`].
    pub fn register_command(&mut self, name: &str, f: HostCommandFn) {
        self.extensions.insert(name.to_owned(), f);
    }

    /// Serializes the entire host (values, interps, procs, traces).
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores a host from `dump()` output. Extension commands and the
    /// regex cache are not serialized; re-register extensions afterwards.
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// Number of live value slots, for growth assertions in tests.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    // --- slot plumbing ---------------------------------------------------

    fn alloc(&mut self, obj: Obj) -> ValueId {
        self.slots.push(obj);
        ValueId::new(self.slots.len() as u32)
    }

    fn obj(&self, v: ValueId) -> &Obj {
        &self.slots[v.raw() as usize - 1]
    }

    fn obj_mut(&mut self, v: ValueId) -> &mut Obj {
        &mut self.slots[v.raw() as usize - 1]
    }

    fn interp(&self, interp: InterpId) -> &InterpState {
        &self.interps[interp.raw() as usize]
    }

    fn interp_mut(&mut self, interp: InterpId) -> &mut InterpState {
        &mut self.interps[interp.raw() as usize]
    }

    /// Configures the interpreter's recursion limit.
    pub fn set_recursion_limit(&mut self, interp: InterpId, limit: usize) {
        self.interp_mut(interp).recursion_limit = limit.max(1);
    }

    // --- string form -----------------------------------------------------

    fn text_of(&mut self, v: ValueId) -> String {
        if v.is_nil() {
            return String::new();
        }
        if let Some(text) = &self.obj(v).text {
            return text.clone();
        }
        let derived = match self.obj(v).rep.clone() {
            Rep::None => String::new(),
            Rep::Int(i) => i.to_string(),
            Rep::Double(d) => number::format_double(d),
            Rep::List(ids) => {
                let texts: Vec<String> = ids.iter().map(|&id| self.text_of(id)).collect();
                list::format_list(&texts)
            }
            Rep::Dict(map) => {
                let mut parts: Vec<String> = Vec::with_capacity(map.len() * 2);
                for (key, value) in &map {
                    parts.push(key.clone());
                    parts.push(self.text_of(*value));
                }
                list::format_list(&parts)
            }
        };
        self.obj_mut(v).text = Some(derived.clone());
        derived
    }

    // --- shimmering ------------------------------------------------------

    /// Materializes the list representation of `v` in place.
    fn ensure_list(&mut self, v: ValueId) -> Result<(), HostError> {
        if v.is_nil() {
            return Err(HostError::new("nil handle has no list form"));
        }
        match self.obj(v).rep.clone() {
            Rep::List(_) => return Ok(()),
            Rep::Dict(map) => {
                let mut ids = Vec::with_capacity(map.len() * 2);
                for (key, value) in map {
                    ids.push(self.alloc(Obj::str(key)));
                    ids.push(value);
                }
                self.obj_mut(v).rep = Rep::List(ids);
                return Ok(());
            }
            Rep::Int(_) | Rep::Double(_) => {
                // derive the text first, then parse it as a one-element list
                self.text_of(v);
            }
            Rep::None => {}
        }
        let text = self.text_of(v);
        let elements = list::parse_list(&text).map_err(|e| HostError::new(e.message))?;
        let ids: Vec<ValueId> = elements.into_iter().map(|e| self.alloc(Obj::str(e))).collect();
        self.obj_mut(v).rep = Rep::List(ids);
        Ok(())
    }

    fn list_ids(&mut self, v: ValueId) -> Result<Vec<ValueId>, HostError> {
        self.ensure_list(v)?;
        match &self.obj(v).rep {
            Rep::List(ids) => Ok(ids.clone()),
            _ => unreachable!("ensure_list leaves a list rep"),
        }
    }

    /// Materializes the dict representation of `v` in place.
    fn ensure_dict(&mut self, v: ValueId) -> Result<(), HostError> {
        if v.is_nil() {
            return Err(HostError::new("nil handle has no dict form"));
        }
        if matches!(self.obj(v).rep, Rep::Dict(_)) {
            return Ok(());
        }
        let ids = self.list_ids(v)?;
        if ids.len() % 2 != 0 {
            return Err(HostError::new("missing value to go with key"));
        }
        let mut map = IndexMap::with_capacity(ids.len() / 2);
        for pair in ids.chunks_exact(2) {
            let key = self.text_of(pair[0]);
            map.insert(key, pair[1]);
        }
        self.obj_mut(v).rep = Rep::Dict(map);
        Ok(())
    }

    // --- variable resolution (links) -------------------------------------

    fn resolve_var(&self, interp: InterpId, name: &str) -> (VarSlot, String) {
        let state = self.interp(interp);
        let mut level = state.active;
        let mut name = name.to_owned();
        // follow link chains with a small bound; cycles only arise from
        // pathological upvar use
        for _ in 0..32 {
            if level == 0 {
                return (VarSlot::Ns("::".to_owned()), name);
            }
            match state.frames.get(level).and_then(|f| f.links.get(&name)) {
                Some(Link::Frame { level: target, name: target_name }) => {
                    let target_name = target_name.clone();
                    level = *target;
                    name = target_name;
                }
                Some(Link::Ns { ns, name: target_name }) => {
                    return (VarSlot::Ns(ns.clone()), target_name.clone());
                }
                None => return (VarSlot::Frame(level), name),
            }
        }
        (VarSlot::Frame(level), name)
    }

    fn ns_rec_mut(&mut self, interp: InterpId, ns: &str) -> &mut NsRec {
        let state = self.interp_mut(interp);
        state.namespaces.entry(ns.to_owned()).or_default()
    }

    // --- glob matching ---------------------------------------------------

    fn glob(pattern: &[char], text: &[char], nocase: bool) -> bool {
        let eq = |a: char, b: char| {
            if nocase {
                a.eq_ignore_ascii_case(&b)
            } else {
                a == b
            }
        };
        match pattern.first() {
            None => text.is_empty(),
            Some('*') => {
                // collapse runs of *
                let rest = &pattern[1..];
                for skip in 0..=text.len() {
                    if Self::glob(rest, &text[skip..], nocase) {
                        return true;
                    }
                }
                false
            }
            Some('?') => !text.is_empty() && Self::glob(&pattern[1..], &text[1..], nocase),
            Some('[') => {
                let Some(&c) = text.first() else { return false };
                let close = pattern.iter().position(|&p| p == ']');
                let Some(close) = close else { return false };
                let set = &pattern[1..close];
                if Self::char_in_set(c, set, nocase) {
                    Self::glob(&pattern[close + 1..], &text[1..], nocase)
                } else {
                    false
                }
            }
            Some('\\') if pattern.len() > 1 => {
                !text.is_empty()
                    && eq(pattern[1], text[0])
                    && Self::glob(&pattern[2..], &text[1..], nocase)
            }
            Some(&p) => !text.is_empty() && eq(p, text[0]) && Self::glob(&pattern[1..], &text[1..], nocase),
        }
    }

    fn char_in_set(c: char, set: &[char], nocase: bool) -> bool {
        let norm = |x: char| if nocase { x.to_ascii_lowercase() } else { x };
        let c = norm(c);
        let mut i = 0;
        while i < set.len() {
            if i + 2 < set.len() && set[i + 1] == '-' {
                let (lo, hi) = (norm(set[i]), norm(set[i + 2]));
                if c >= lo && c <= hi {
                    return true;
                }
                i += 3;
            } else {
                if c == norm(set[i]) {
                    return true;
                }
                i += 1;
            }
        }
        false
    }
}

enum VarSlot {
    Frame(usize),
    Ns(String),
}

impl HostOps for MemoryHost {
    // --- frames ----------------------------------------------------------

    fn frame_push(&mut self, interp: InterpId, cmd: ValueId, args: ValueId) -> Result<(), HostError> {
        let state = self.interp_mut(interp);
        state.frames.push(Frame {
            cmd,
            args,
            locals: AHashMap::new(),
            links: AHashMap::new(),
            namespace: "::".to_owned(),
        });
        state.active = state.frames.len() - 1;
        Ok(())
    }

    fn frame_pop(&mut self, interp: InterpId) {
        let state = self.interp_mut(interp);
        if state.frames.len() > 1 {
            state.frames.pop();
        }
        state.active = state.frames.len() - 1;
    }

    fn frame_level(&mut self, interp: InterpId) -> usize {
        self.interp(interp).active
    }

    fn frame_set_active(&mut self, interp: InterpId, level: usize) -> Result<(), HostError> {
        let state = self.interp_mut(interp);
        if level >= state.frames.len() {
            return Err(HostError::new(format!("bad level \"#{level}\"")));
        }
        state.active = level;
        Ok(())
    }

    fn frame_size(&mut self, interp: InterpId) -> usize {
        self.interp(interp).frames.len()
    }

    fn frame_info(&mut self, interp: InterpId, level: usize) -> Option<FrameInfo> {
        let frame = self.interp(interp).frames.get(level)?;
        Some(FrameInfo {
            cmd: frame.cmd,
            args: frame.args,
            namespace: frame.namespace.clone(),
        })
    }

    fn frame_namespace(&mut self, interp: InterpId) -> String {
        let state = self.interp(interp);
        state.frames[state.active].namespace.clone()
    }

    fn frame_set_namespace(&mut self, interp: InterpId, ns: &str) {
        let state = self.interp_mut(interp);
        let active = state.active;
        state.frames[active].namespace = ns.to_owned();
    }

    // --- variables --------------------------------------------------------

    fn var_get(&mut self, interp: InterpId, name: &str) -> Option<ValueId> {
        match self.resolve_var(interp, name) {
            (VarSlot::Frame(level), simple) => {
                self.interp(interp).frames[level].locals.get(&simple).copied()
            }
            (VarSlot::Ns(ns), simple) => self
                .interp(interp)
                .namespaces
                .get(&ns)
                .and_then(|rec| rec.vars.get(&simple))
                .copied(),
        }
    }

    fn var_set(&mut self, interp: InterpId, name: &str, value: ValueId) -> Result<(), HostError> {
        match self.resolve_var(interp, name) {
            (VarSlot::Frame(level), simple) => {
                self.interp_mut(interp).frames[level].locals.insert(simple, value);
            }
            (VarSlot::Ns(ns), simple) => {
                self.ns_rec_mut(interp, &ns).vars.insert(simple, value);
            }
        }
        Ok(())
    }

    fn var_unset(&mut self, interp: InterpId, name: &str) -> bool {
        // an unset through a link removes the target but leaves the link
        match self.resolve_var(interp, name) {
            (VarSlot::Frame(level), simple) => self
                .interp_mut(interp)
                .frames[level]
                .locals
                .remove(&simple)
                .is_some(),
            (VarSlot::Ns(ns), simple) => self
                .interp_mut(interp)
                .namespaces
                .get_mut(&ns)
                .is_some_and(|rec| rec.vars.remove(&simple).is_some()),
        }
    }

    fn var_exists(&mut self, interp: InterpId, name: &str) -> bool {
        self.var_get(interp, name).is_some()
    }

    fn var_link(
        &mut self,
        interp: InterpId,
        local: &str,
        target_level: usize,
        target: &str,
    ) -> Result<(), HostError> {
        let state = self.interp_mut(interp);
        if target_level >= state.frames.len() {
            return Err(HostError::new(format!("bad level \"#{target_level}\"")));
        }
        let active = state.active;
        if active == 0 {
            return Err(HostError::new("upvar links require a procedure frame"));
        }
        state.frames[active].links.insert(
            local.to_owned(),
            Link::Frame {
                level: target_level,
                name: target.to_owned(),
            },
        );
        state.frames[active].locals.remove(local);
        Ok(())
    }

    fn var_link_ns(&mut self, interp: InterpId, local: &str, ns: &str, target: &str) -> Result<(), HostError> {
        let state = self.interp_mut(interp);
        let active = state.active;
        if active == 0 {
            // linking at global level is the identity mapping
            return Ok(());
        }
        state.frames[active].links.insert(
            local.to_owned(),
            Link::Ns {
                ns: ns.to_owned(),
                name: target.to_owned(),
            },
        );
        state.frames[active].locals.remove(local);
        Ok(())
    }

    fn var_names(&mut self, interp: InterpId) -> Vec<String> {
        let state = self.interp(interp);
        if state.active == 0 {
            return state
                .namespaces
                .get("::")
                .map(|rec| rec.vars.keys().cloned().collect())
                .unwrap_or_default();
        }
        let frame = &state.frames[state.active];
        let mut names: Vec<String> = frame.locals.keys().cloned().collect();
        names.extend(frame.links.keys().cloned());
        names
    }

    fn var_is_link(&mut self, interp: InterpId, name: &str) -> bool {
        let state = self.interp(interp);
        state.active != 0 && state.frames[state.active].links.contains_key(name)
    }

    // --- commands ---------------------------------------------------------

    fn cmd_lookup(&mut self, interp: InterpId, name: &str) -> CommandKind {
        match self.interp(interp).commands.get(name) {
            Some(CommandEntry::Builtin(builtin)) => CommandKind::Builtin(*builtin),
            Some(CommandEntry::Proc { .. }) => CommandKind::Proc,
            None => CommandKind::None,
        }
    }

    fn cmd_register_builtin(&mut self, interp: InterpId, name: &str, builtin: Builtin) {
        self.interp_mut(interp)
            .commands
            .insert(name.to_owned(), CommandEntry::Builtin(builtin));
    }

    fn cmd_rename(&mut self, interp: InterpId, old: &str, new: &str) -> Result<(), HostError> {
        let state = self.interp_mut(interp);
        if !state.commands.contains_key(old) {
            return Err(HostError::new(format!(
                "can't rename \"{old}\": command doesn't exist"
            )));
        }
        if new.is_empty() {
            state.commands.remove(old);
            return Ok(());
        }
        if state.commands.contains_key(new) {
            return Err(HostError::new(format!(
                "can't rename to \"{new}\": command already exists"
            )));
        }
        if let Some(entry) = state.commands.remove(old) {
            state.commands.insert(new.to_owned(), entry);
        }
        Ok(())
    }

    fn cmd_names(&mut self, interp: InterpId) -> Vec<String> {
        let mut names: Vec<String> = self.interp(interp).commands.keys().cloned().collect();
        names.extend(self.extensions.keys().cloned());
        names
    }

    fn proc_define(
        &mut self,
        interp: InterpId,
        name: &str,
        params: ValueId,
        body: ValueId,
    ) -> Result<(), HostError> {
        self.interp_mut(interp)
            .commands
            .insert(name.to_owned(), CommandEntry::Proc { params, body });
        Ok(())
    }

    fn proc_exists(&mut self, interp: InterpId, name: &str) -> bool {
        matches!(
            self.interp(interp).commands.get(name),
            Some(CommandEntry::Proc { .. })
        )
    }

    fn proc_params(&mut self, interp: InterpId, name: &str) -> Option<ValueId> {
        match self.interp(interp).commands.get(name) {
            Some(CommandEntry::Proc { params, .. }) => Some(*params),
            _ => None,
        }
    }

    fn proc_body(&mut self, interp: InterpId, name: &str) -> Option<ValueId> {
        match self.interp(interp).commands.get(name) {
            Some(CommandEntry::Proc { body, .. }) => Some(*body),
            _ => None,
        }
    }

    fn proc_names(&mut self, interp: InterpId) -> Vec<String> {
        self.interp(interp)
            .commands
            .iter()
            .filter(|(_, entry)| matches!(entry, CommandEntry::Proc { .. }))
            .map(|(name, _)| name.clone())
            .collect()
    }

    // --- namespaces -------------------------------------------------------

    fn ns_create(&mut self, interp: InterpId, path: &str) {
        // ensure all ancestors exist as well
        let mut at = path;
        loop {
            self.interp_mut(interp)
                .namespaces
                .entry(at.to_owned())
                .or_default();
            match at.rfind("::") {
                Some(0) | None => break,
                Some(idx) => at = &path[..idx],
            }
        }
        self.interp_mut(interp)
            .namespaces
            .entry("::".to_owned())
            .or_default();
    }

    fn ns_delete(&mut self, interp: InterpId, path: &str) -> bool {
        if path == "::" {
            return false;
        }
        let state = self.interp_mut(interp);
        let children: Vec<String> = state
            .namespaces
            .keys()
            .filter(|k| k.starts_with(&format!("{path}::")))
            .cloned()
            .collect();
        for child in children {
            state.namespaces.remove(&child);
        }
        state.namespaces.remove(path).is_some()
    }

    fn ns_exists(&mut self, interp: InterpId, path: &str) -> bool {
        self.interp(interp).namespaces.contains_key(path)
    }

    fn ns_children(&mut self, interp: InterpId, path: &str) -> Vec<String> {
        let prefix = if path == "::" {
            "::".to_owned()
        } else {
            format!("{path}::")
        };
        self.interp(interp)
            .namespaces
            .keys()
            .filter(|k| {
                k.starts_with(&prefix) && *k != path && !k[prefix.len()..].contains("::")
            })
            .cloned()
            .collect()
    }

    fn ns_get_var(&mut self, interp: InterpId, ns: &str, name: &str) -> Option<ValueId> {
        self.interp(interp)
            .namespaces
            .get(ns)
            .and_then(|rec| rec.vars.get(name))
            .copied()
    }

    fn ns_set_var(&mut self, interp: InterpId, ns: &str, name: &str, value: ValueId) {
        self.ns_rec_mut(interp, ns).vars.insert(name.to_owned(), value);
    }

    fn ns_unset_var(&mut self, interp: InterpId, ns: &str, name: &str) -> bool {
        self.interp_mut(interp)
            .namespaces
            .get_mut(ns)
            .is_some_and(|rec| rec.vars.remove(name).is_some())
    }

    fn ns_var_exists(&mut self, interp: InterpId, ns: &str, name: &str) -> bool {
        self.ns_get_var(interp, ns, name).is_some()
    }

    fn ns_var_names(&mut self, interp: InterpId, ns: &str) -> Vec<String> {
        self.interp(interp)
            .namespaces
            .get(ns)
            .map(|rec| rec.vars.keys().cloned().collect())
            .unwrap_or_default()
    }

    // --- strings ----------------------------------------------------------

    fn str_new(&mut self, _interp: InterpId, s: &str) -> ValueId {
        if s.is_empty() {
            return ValueId::new(1);
        }
        self.alloc(Obj::str(s))
    }

    fn str_value(&mut self, _interp: InterpId, value: ValueId) -> String {
        self.text_of(value)
    }

    fn str_empty(&mut self, _interp: InterpId) -> ValueId {
        ValueId::new(1)
    }

    fn str_match(&mut self, pattern: &str, s: &str, nocase: bool) -> bool {
        let p: Vec<char> = pattern.chars().collect();
        let t: Vec<char> = s.chars().collect();
        Self::glob(&p, &t, nocase)
    }

    fn regex_match(&mut self, _interp: InterpId, pattern: &str, s: &str) -> Result<bool, HostError> {
        if let Some(re) = self.regex_cache.get(pattern) {
            return Ok(re.is_match(s));
        }
        let re = Regex::new(pattern).map_err(|e| {
            HostError::new(format!("couldn't compile regular expression pattern: {e}"))
        })?;
        let hit = re.is_match(s);
        self.regex_cache.insert(pattern.to_owned(), re);
        Ok(hit)
    }

    // --- lists ------------------------------------------------------------

    fn list_new(&mut self, _interp: InterpId) -> ValueId {
        self.alloc(Obj {
            text: None,
            rep: Rep::List(Vec::new()),
        })
    }

    fn list_from(&mut self, _interp: InterpId, value: ValueId) -> Result<ValueId, HostError> {
        let ids = self.list_ids(value)?;
        Ok(self.alloc(Obj {
            text: None,
            rep: Rep::List(ids),
        }))
    }

    fn list_push(&mut self, _interp: InterpId, list: ValueId, value: ValueId) {
        let obj = self.obj_mut(list);
        if let Rep::List(ids) = &mut obj.rep {
            ids.push(value);
            obj.text = None;
        }
    }

    fn list_length(&mut self, _interp: InterpId, value: ValueId) -> Result<usize, HostError> {
        if value.is_nil() {
            return Ok(0);
        }
        Ok(self.list_ids(value)?.len())
    }

    fn list_at(&mut self, _interp: InterpId, value: ValueId, index: usize) -> Result<Option<ValueId>, HostError> {
        Ok(self.list_ids(value)?.get(index).copied())
    }

    // --- dicts ------------------------------------------------------------

    fn dict_new(&mut self, _interp: InterpId) -> ValueId {
        self.alloc(Obj {
            text: None,
            rep: Rep::Dict(IndexMap::new()),
        })
    }

    fn dict_from(&mut self, _interp: InterpId, value: ValueId) -> Result<ValueId, HostError> {
        self.ensure_dict(value)?;
        let map = match &self.obj(value).rep {
            Rep::Dict(map) => map.clone(),
            _ => unreachable!("ensure_dict leaves a dict rep"),
        };
        Ok(self.alloc(Obj {
            text: None,
            rep: Rep::Dict(map),
        }))
    }

    fn dict_get(&mut self, _interp: InterpId, dict: ValueId, key: &str) -> Result<Option<ValueId>, HostError> {
        self.ensure_dict(dict)?;
        match &self.obj(dict).rep {
            Rep::Dict(map) => Ok(map.get(key).copied()),
            _ => Ok(None),
        }
    }

    fn dict_set(&mut self, _interp: InterpId, dict: ValueId, key: &str, value: ValueId) {
        if self.ensure_dict(dict).is_err() {
            return;
        }
        let obj = self.obj_mut(dict);
        if let Rep::Dict(map) = &mut obj.rep {
            map.insert(key.to_owned(), value);
            obj.text = None;
        }
    }

    fn dict_remove(&mut self, _interp: InterpId, dict: ValueId, key: &str) -> bool {
        if self.ensure_dict(dict).is_err() {
            return false;
        }
        let obj = self.obj_mut(dict);
        if let Rep::Dict(map) = &mut obj.rep {
            let removed = map.shift_remove(key).is_some();
            if removed {
                obj.text = None;
            }
            removed
        } else {
            false
        }
    }

    fn dict_size(&mut self, _interp: InterpId, dict: ValueId) -> Result<usize, HostError> {
        self.ensure_dict(dict)?;
        match &self.obj(dict).rep {
            Rep::Dict(map) => Ok(map.len()),
            _ => Ok(0),
        }
    }

    fn dict_keys(&mut self, _interp: InterpId, dict: ValueId) -> Result<Vec<String>, HostError> {
        self.ensure_dict(dict)?;
        match &self.obj(dict).rep {
            Rep::Dict(map) => Ok(map.keys().cloned().collect()),
            _ => Ok(Vec::new()),
        }
    }

    // --- numbers ----------------------------------------------------------

    fn int_new(&mut self, _interp: InterpId, value: i64) -> ValueId {
        self.alloc(Obj {
            text: None,
            rep: Rep::Int(value),
        })
    }

    fn int_value(&mut self, _interp: InterpId, value: ValueId) -> Option<i64> {
        if value.is_nil() {
            return None;
        }
        match self.obj(value).rep {
            Rep::Int(i) => Some(i),
            Rep::Double(_) => None,
            _ => {
                let text = self.text_of(value);
                number::parse_integer(&text)
            }
        }
    }

    fn double_new(&mut self, _interp: InterpId, value: f64) -> ValueId {
        self.alloc(Obj {
            text: None,
            rep: Rep::Double(value),
        })
    }

    fn double_value(&mut self, _interp: InterpId, value: ValueId) -> Option<f64> {
        if value.is_nil() {
            return None;
        }
        match self.obj(value).rep {
            Rep::Int(i) => Some(i as f64),
            Rep::Double(d) => Some(d),
            _ => {
                let text = self.text_of(value);
                number::parse_double(&text)
                    .or_else(|| number::parse_integer(&text).map(|i| i as f64))
            }
        }
    }

    // --- interpreter state ------------------------------------------------

    fn result_set(&mut self, interp: InterpId, value: ValueId) {
        self.interp_mut(interp).result = value;
    }

    fn result_get(&mut self, interp: InterpId) -> ValueId {
        self.interp(interp).result
    }

    fn result_reset(&mut self, interp: InterpId) {
        self.interp_mut(interp).result = ValueId::new(1);
    }

    fn return_options_set(&mut self, interp: InterpId, options: ValueId) {
        self.interp_mut(interp).return_options = options;
    }

    fn return_options_get(&mut self, interp: InterpId) -> ValueId {
        self.interp(interp).return_options
    }

    fn script_get(&mut self, interp: InterpId) -> ValueId {
        self.interp(interp).script
    }

    fn script_set(&mut self, interp: InterpId, path: ValueId) {
        self.interp_mut(interp).script = path;
    }

    fn recursion_limit(&mut self, interp: InterpId) -> usize {
        self.interp(interp).recursion_limit
    }

    // --- dispatch fallback ------------------------------------------------

    fn unknown(&mut self, interp: InterpId, args: ValueId) -> Option<Result<ValueId, HostError>> {
        let argv = match self.list_ids(args) {
            Ok(ids) => ids,
            Err(e) => return Some(Err(e)),
        };
        let name = match argv.first() {
            Some(&first) => self.text_of(first),
            None => return Some(Err(HostError::new("empty command"))),
        };
        let f = *self.extensions.get(&name)?;
        Some(f(self, interp, &argv))
    }

    // --- traces -----------------------------------------------------------

    fn trace_add(&mut self, interp: InterpId, kind: TraceKind, name: &str, ops: TraceOps, script: ValueId) {
        self.interp_mut(interp).traces.push(TraceRec {
            kind,
            name: name.to_owned(),
            ops,
            script,
        });
    }

    fn trace_remove(
        &mut self,
        interp: InterpId,
        kind: TraceKind,
        name: &str,
        ops: TraceOps,
        script: &str,
    ) -> bool {
        let candidates: Vec<(usize, ValueId)> = self
            .interp(interp)
            .traces
            .iter()
            .enumerate()
            .filter(|(_, rec)| rec.kind == kind && rec.name == name && rec.ops == ops)
            .map(|(i, rec)| (i, rec.script))
            .collect();
        for (i, stored) in candidates {
            if self.text_of(stored) == script {
                self.interp_mut(interp).traces.remove(i);
                return true;
            }
        }
        false
    }

    fn trace_list(&mut self, interp: InterpId, kind: TraceKind, name: &str) -> Vec<TraceEntry> {
        self.interp(interp)
            .traces
            .iter()
            .filter(|rec| rec.kind == kind && rec.name == name)
            .map(|rec| TraceEntry {
                ops: rec.ops,
                script: rec.script,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_with_interp() -> (MemoryHost, InterpId) {
        let mut host = MemoryHost::new();
        let interp = host.create_interp();
        (host, interp)
    }

    #[test]
    fn string_shimmering_to_list() {
        let (mut host, interp) = host_with_interp();
        let value = host.str_new(interp, "a {b c} d");
        assert_eq!(host.list_length(interp, value).unwrap(), 3);
        let second = host.list_at(interp, value, 1).unwrap().unwrap();
        assert_eq!(host.str_value(interp, second), "b c");
        // string form is unchanged by shimmering
        assert_eq!(host.str_value(interp, value), "a {b c} d");
    }

    #[test]
    fn list_derives_canonical_text() {
        let (mut host, interp) = host_with_interp();
        let list = host.list_new(interp);
        let a = host.str_new(interp, "a b");
        let b = host.str_new(interp, "c");
        host.list_push(interp, list, a);
        host.list_push(interp, list, b);
        assert_eq!(host.str_value(interp, list), "{a b} c");
    }

    #[test]
    fn dict_preserves_insertion_order() {
        let (mut host, interp) = host_with_interp();
        let dict = host.dict_new(interp);
        for key in ["z", "a", "m"] {
            let value = host.str_new(interp, key);
            host.dict_set(interp, dict, key, value);
        }
        assert_eq!(host.dict_keys(interp, dict).unwrap(), vec!["z", "a", "m"]);
        // overwriting keeps the original slot
        let update = host.str_new(interp, "zz");
        host.dict_set(interp, dict, "z", update);
        assert_eq!(host.dict_keys(interp, dict).unwrap(), vec!["z", "a", "m"]);
    }

    #[test]
    fn int_shimmering_rejects_doubles() {
        let (mut host, interp) = host_with_interp();
        let i = host.str_new(interp, "0x1f");
        assert_eq!(host.int_value(interp, i), Some(31));
        let d = host.double_new(interp, 1.5);
        assert_eq!(host.int_value(interp, d), None);
        assert_eq!(host.double_value(interp, d), Some(1.5));
    }

    #[test]
    fn glob_patterns() {
        let mut host = MemoryHost::new();
        assert!(host.str_match("a*c", "abc", false));
        assert!(host.str_match("a?c", "abc", false));
        assert!(host.str_match("[a-c]x", "bx", false));
        assert!(host.str_match("\\*", "*", false));
        assert!(!host.str_match("\\*", "x", false));
        assert!(host.str_match("ABC", "abc", true));
        assert!(!host.str_match("a*d", "abc", false));
    }

    #[test]
    fn snapshot_round_trip() {
        let (mut host, interp) = host_with_interp();
        let value = host.str_new(interp, "persisted");
        host.var_set(interp, "x", value).unwrap();
        let bytes = host.dump().unwrap();
        let mut restored = MemoryHost::load(&bytes).unwrap();
        let got = restored.var_get(interp, "x").unwrap();
        assert_eq!(restored.str_value(interp, got), "persisted");
    }
}
