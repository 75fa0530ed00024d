//! Resumable tokenizer for Tcl source.
//!
//! The parser scans a script buffer into commands, each command into words,
//! and each word into tokens carrying `(kind, start, end)` byte offsets into
//! the source. No source bytes are copied at parse time; substitution reads
//! the spans later. A command may span multiple buffer chunks: scanning an
//! unterminated construct yields [`ParseStep::Incomplete`] with the number of
//! bytes already consumed, and the host re-feeds once more input has been
//! accumulated.

use crate::error::FeatherError;

/// Classification of a word token.
///
/// The numeric codes are frozen ABI, exposed through `feather_parse` so
/// scripts and hosts can inspect parse output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum TokenKind {
    /// Bare text; backslash escapes are substituted at evaluation time.
    Literal = 0,
    /// `$name` variable reference.
    Variable = 1,
    /// `${name}` variable reference.
    BracedVariable = 2,
    /// `[script]` command substitution.
    Command = 3,
    /// `"..."` double-quoted text with inner substitution tokens.
    Quoted = 4,
    /// `{...}` raw text, no substitutions.
    Braced = 5,
}

impl TokenKind {
    /// The frozen ABI code for this kind.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// One token: a kind plus byte offsets into the source buffer.
///
/// `start..end` covers the token including its delimiters (`$`, braces,
/// quotes, brackets). Quoted tokens carry their inner substitution pieces in
/// `parts`; other kinds leave it empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub parts: Vec<Token>,
}

impl Token {
    fn leaf(kind: TokenKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            start,
            end,
            parts: Vec::new(),
        }
    }

    /// The full source span of this token, delimiters included.
    #[must_use]
    pub fn span<'s>(&self, src: &'s str) -> &'s str {
        &src[self.start..self.end]
    }

    /// The token's content with delimiters stripped: the variable name, the
    /// bracketed script, the braced/quoted interior, or the literal text.
    #[must_use]
    pub fn inner<'s>(&self, src: &'s str) -> &'s str {
        match self.kind {
            TokenKind::Literal => &src[self.start..self.end],
            TokenKind::Variable => &src[self.start + 1..self.end],
            TokenKind::BracedVariable => &src[self.start + 2..self.end - 1],
            TokenKind::Command | TokenKind::Quoted | TokenKind::Braced => {
                &src[self.start + 1..self.end - 1]
            }
        }
    }
}

/// One word of a command: possibly `{*}`-expanded, made of one or more
/// tokens (more than one means concatenation of the pieces).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub expand: bool,
    pub parts: Vec<Token>,
    pub start: usize,
    pub end: usize,
}

/// A complete parsed command: its words and its source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub words: Vec<Word>,
    pub start: usize,
    pub end: usize,
}

impl Command {
    /// The command's source text, used for error traces and `info level`.
    #[must_use]
    pub fn text<'s>(&self, src: &'s str) -> &'s str {
        &src[self.start..self.end]
    }
}

/// A syntax error with 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (line {}, column {})", self.message, self.line, self.col)
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for FeatherError {
    fn from(err: ParseError) -> Self {
        Self::with_code(err.message, "TCL PARSE")
    }
}

/// Result of one parse step.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseStep {
    /// A full command was recognized.
    Complete(Command),
    /// More input is needed. Bytes before `consumed` were fully used by
    /// earlier commands and may be discarded by the host; `needed` is a
    /// lower bound on the open constructs still to close.
    Incomplete { consumed: usize, needed: usize },
    /// Only whitespace, separators, and comments remain.
    End,
    Error(ParseError),
}

/// Resumable parser state: six small integers, cheap to snapshot.
///
/// The depth/flag fields are informational mirrors of the last scan (useful
/// to hosts deciding whether to prompt for continuation); `cursor` and
/// `command_start` drive resumption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParserState {
    pub bracket_depth: u32,
    pub brace_depth: u32,
    pub in_quotes: bool,
    pub escaped: bool,
    pub command_start: usize,
    pub cursor: usize,
}

impl ParserState {
    /// Serializes the state to a compact binary form.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores state previously produced by `dump()`.
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// Streaming command scanner.
///
/// Feed the accumulated buffer repeatedly: each `feed` either yields the
/// next complete command (advancing the cursor past it), reports that more
/// bytes are needed, or reports the end of the buffer. Two tokenizers with
/// equal state fed equal input produce equal output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer {
    state: ParserState,
}

impl Tokenizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_state(state: ParserState) -> Self {
        Self { state }
    }

    #[must_use]
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Scans the next command starting at the current cursor.
    ///
    /// `src` must contain at least the bytes seen by previous calls (the
    /// host accumulates chunks). On `Incomplete` the cursor stays at the
    /// start of the unfinished command so the next call rescans it against
    /// the grown buffer.
    pub fn feed(&mut self, src: &str) -> ParseStep {
        let step = next_command(src, self.state.cursor);
        match &step {
            ParseStep::Complete(cmd) => {
                self.state.command_start = cmd.start;
                self.state.cursor = after_separator(src, cmd.end);
                self.state.bracket_depth = 0;
                self.state.brace_depth = 0;
                self.state.in_quotes = false;
                self.state.escaped = false;
            }
            ParseStep::Incomplete { consumed, .. } => {
                self.state.command_start = *consumed;
                let probe = probe_open_constructs(src, *consumed);
                self.state.bracket_depth = probe.brackets;
                self.state.brace_depth = probe.braces;
                self.state.in_quotes = probe.in_quotes;
                self.state.escaped = probe.escaped;
            }
            ParseStep::End => {
                self.state.cursor = src.len();
                self.state.command_start = src.len();
            }
            ParseStep::Error(_) => {}
        }
        step
    }
}

/// Whether `script` forms one or more complete commands (nothing left open).
/// The streaming analog of a REPL's "is this line finished" check.
#[must_use]
pub fn command_complete(script: &str) -> bool {
    let mut at = 0;
    loop {
        match next_command(script, at) {
            ParseStep::Complete(cmd) => at = after_separator(script, cmd.end),
            ParseStep::Incomplete { .. } => return false,
            // errors are "complete": feeding more bytes won't fix them
            ParseStep::End | ParseStep::Error(_) => return true,
        }
    }
}

fn after_separator(src: &str, end: usize) -> usize {
    let bytes = src.as_bytes();
    if end < bytes.len() && (bytes[end] == b'\n' || bytes[end] == b';') {
        end + 1
    } else {
        end
    }
}

/// Computes 1-based line and column for a byte offset.
#[must_use]
pub fn line_col(src: &str, offset: usize) -> (usize, usize) {
    let clamped = offset.min(src.len());
    let before = &src.as_bytes()[..clamped];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let col = clamped - before.iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1) + 1;
    (line, col)
}

fn error_at(src: &str, offset: usize, message: impl Into<String>) -> ParseStep {
    let (line, col) = line_col(src, offset);
    ParseStep::Error(ParseError {
        line,
        col,
        message: message.into(),
    })
}

/// Scans the next command at `start`, skipping separators and comments.
pub fn next_command(src: &str, start: usize) -> ParseStep {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut i = start;

    // Skip whitespace, command separators, and comments. A comment is only
    // recognized where a command could start.
    loop {
        while i < len && matches!(bytes[i], b' ' | b'\t' | b'\r' | b'\n' | b';') {
            i += 1;
        }
        if i + 1 < len && bytes[i] == b'\\' && bytes[i + 1] == b'\n' {
            i += 2;
            continue;
        }
        if i < len && bytes[i] == b'#' {
            i += 1;
            while i < len {
                if bytes[i] == b'\\' && i + 1 < len {
                    i += 2;
                    continue;
                }
                if bytes[i] == b'\n' {
                    break;
                }
                i += 1;
            }
            continue;
        }
        break;
    }
    if i >= len {
        return ParseStep::End;
    }

    let cmd_start = i;
    let mut words = Vec::new();
    let mut end = i;
    loop {
        // intra-command whitespace
        while i < len && matches!(bytes[i], b' ' | b'\t' | b'\r') {
            i += 1;
        }
        if i + 1 < len && bytes[i] == b'\\' && bytes[i + 1] == b'\n' {
            i += 2;
            continue;
        }
        if i >= len || bytes[i] == b'\n' || bytes[i] == b';' {
            // A trailing lone backslash keeps the command open.
            if i >= len && len > 0 && trailing_backslash(bytes, cmd_start, len) {
                return ParseStep::Incomplete {
                    consumed: cmd_start,
                    needed: 1,
                };
            }
            break;
        }
        match parse_word(src, i) {
            WordScan::Word(word) => {
                end = word.end;
                i = word.end;
                words.push(word);
            }
            WordScan::Incomplete(needed) => {
                return ParseStep::Incomplete {
                    consumed: cmd_start,
                    needed,
                };
            }
            WordScan::Error(offset, message) => return error_at(src, offset, message),
        }
    }

    if words.is_empty() {
        return ParseStep::End;
    }
    ParseStep::Complete(Command {
        words,
        start: cmd_start,
        end,
    })
}

fn trailing_backslash(bytes: &[u8], from: usize, len: usize) -> bool {
    // An odd run of backslashes at EOF escapes a byte that hasn't arrived.
    let mut count = 0;
    let mut i = len;
    while i > from && bytes[i - 1] == b'\\' {
        count += 1;
        i -= 1;
    }
    count % 2 == 1
}

enum WordScan {
    Word(Word),
    Incomplete(usize),
    Error(usize, &'static str),
}

fn is_word_end(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b';')
}

fn parse_word(src: &str, at: usize) -> WordScan {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut start = at;
    let mut expand = false;

    // `{*}` followed by more word text is the expansion prefix; a lone `{*}`
    // is just the braced word `*`.
    if bytes[start..].starts_with(b"{*}") && start + 3 < len && !is_word_end(bytes[start + 3]) {
        expand = true;
        start += 3;
    }

    match bytes[start] {
        b'{' => match scan_braced(src, start) {
            ConstructScan::Done(token, next) => {
                if next < len && !is_word_end(bytes[next]) {
                    return WordScan::Error(next, "extra characters after close-brace");
                }
                WordScan::Word(Word {
                    expand,
                    start: at,
                    end: next,
                    parts: vec![token],
                })
            }
            ConstructScan::Incomplete(needed) => WordScan::Incomplete(needed),
        },
        b'"' => match scan_quoted(src, start) {
            QuotedScan::Done(token, next) => {
                if next < len && !is_word_end(bytes[next]) {
                    return WordScan::Error(next, "extra characters after close-quote");
                }
                WordScan::Word(Word {
                    expand,
                    start: at,
                    end: next,
                    parts: vec![token],
                })
            }
            QuotedScan::Incomplete(needed) => WordScan::Incomplete(needed),
        },
        b'}' => WordScan::Error(start, "unmatched close-brace"),
        _ => parse_bare_word(src, at, start, expand),
    }
}

fn parse_bare_word(src: &str, word_start: usize, start: usize, expand: bool) -> WordScan {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut parts = Vec::new();
    let mut literal_start = start;
    let mut i = start;

    macro_rules! flush_literal {
        ($upto:expr) => {
            if literal_start < $upto {
                parts.push(Token::leaf(TokenKind::Literal, literal_start, $upto));
            }
        };
    }

    while i < len {
        match bytes[i] {
            b if is_word_end(b) => break,
            b'\\' => {
                if i + 1 >= len {
                    return WordScan::Incomplete(1);
                }
                if bytes[i + 1] == b'\n' {
                    // backslash-newline separates words
                    break;
                }
                i += 2;
            }
            b'$' => {
                match scan_dollar(src, i) {
                    DollarScan::Token(token, next) => {
                        flush_literal!(i);
                        i = next;
                        literal_start = next;
                        parts.push(token);
                    }
                    DollarScan::Plain => i += 1,
                    DollarScan::Incomplete(needed) => return WordScan::Incomplete(needed),
                }
            }
            b'[' => match scan_bracketed(src, i) {
                ConstructScan::Done(token, next) => {
                    flush_literal!(i);
                    i = next;
                    literal_start = next;
                    parts.push(token);
                }
                ConstructScan::Incomplete(needed) => return WordScan::Incomplete(needed),
            },
            _ => i += 1,
        }
    }
    flush_literal!(i);
    if parts.is_empty() {
        parts.push(Token::leaf(TokenKind::Literal, start, i));
    }
    WordScan::Word(Word {
        expand,
        start: word_start,
        end: i,
        parts,
    })
}

pub(crate) enum ConstructScan {
    Done(Token, usize),
    Incomplete(usize),
}

/// Scans a brace-quoted region starting at `{`. Raw text: only brace
/// counting and backslash-skipping, no substitution structure.
pub(crate) fn scan_braced(src: &str, at: usize) -> ConstructScan {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut depth = 1usize;
    let mut i = at + 1;
    while i < len {
        match bytes[i] {
            b'\\' => {
                if i + 1 >= len {
                    return ConstructScan::Incomplete(depth);
                }
                i += 1;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return ConstructScan::Done(Token::leaf(TokenKind::Braced, at, i + 1), i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    ConstructScan::Incomplete(depth)
}

pub(crate) enum QuotedScan {
    Done(Token, usize),
    Incomplete(usize),
}

/// Scans a double-quoted region starting at `"`, collecting the inner
/// substitution pieces. Newlines are ordinary content here.
pub(crate) fn scan_quoted(src: &str, at: usize) -> QuotedScan {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut parts = Vec::new();
    let mut literal_start = at + 1;
    let mut i = at + 1;
    while i < len {
        match bytes[i] {
            b'"' => {
                if literal_start < i {
                    parts.push(Token::leaf(TokenKind::Literal, literal_start, i));
                }
                return QuotedScan::Done(
                    Token {
                        kind: TokenKind::Quoted,
                        start: at,
                        end: i + 1,
                        parts,
                    },
                    i + 1,
                );
            }
            b'\\' => {
                if i + 1 >= len {
                    return QuotedScan::Incomplete(1);
                }
                i += 2;
            }
            b'$' => match scan_dollar(src, i) {
                DollarScan::Token(token, next) => {
                    if literal_start < i {
                        parts.push(Token::leaf(TokenKind::Literal, literal_start, i));
                    }
                    i = next;
                    literal_start = next;
                    parts.push(token);
                }
                DollarScan::Plain => i += 1,
                DollarScan::Incomplete(needed) => return QuotedScan::Incomplete(needed),
            },
            b'[' => match scan_bracketed(src, i) {
                ConstructScan::Done(token, next) => {
                    if literal_start < i {
                        parts.push(Token::leaf(TokenKind::Literal, literal_start, i));
                    }
                    i = next;
                    literal_start = next;
                    parts.push(token);
                }
                ConstructScan::Incomplete(needed) => return QuotedScan::Incomplete(needed),
            },
            _ => i += 1,
        }
    }
    QuotedScan::Incomplete(1)
}

pub(crate) enum DollarScan {
    Token(Token, usize),
    /// `$` not followed by a variable name: a literal dollar sign.
    Plain,
    Incomplete(usize),
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Scans `$name`, `$ns::name`, or `${name}` starting at the `$`.
pub(crate) fn scan_dollar(src: &str, at: usize) -> DollarScan {
    let bytes = src.as_bytes();
    let len = bytes.len();
    if at + 1 >= len {
        return DollarScan::Plain;
    }
    if bytes[at + 1] == b'{' {
        let mut i = at + 2;
        while i < len {
            if bytes[i] == b'}' {
                return DollarScan::Token(Token::leaf(TokenKind::BracedVariable, at, i + 1), i + 1);
            }
            i += 1;
        }
        return DollarScan::Incomplete(1);
    }
    let mut i = at + 1;
    loop {
        if i < len && is_name_byte(bytes[i]) {
            i += 1;
        } else if i + 1 < len && bytes[i] == b':' && bytes[i + 1] == b':' {
            i += 2;
        } else {
            break;
        }
    }
    if i == at + 1 {
        return DollarScan::Plain;
    }
    DollarScan::Token(Token::leaf(TokenKind::Variable, at, i), i)
}

/// Scans a `[script]` command substitution, honoring nested brackets and
/// skipping brace/quote regions that begin at word positions inside it.
pub(crate) fn scan_bracketed(src: &str, at: usize) -> ConstructScan {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut depth = 1usize;
    let mut i = at + 1;
    while i < len {
        match bytes[i] {
            b'\\' => {
                if i + 1 >= len {
                    return ConstructScan::Incomplete(depth);
                }
                i += 1;
            }
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return ConstructScan::Done(Token::leaf(TokenKind::Command, at, i + 1), i + 1);
                }
            }
            b'{' if at_word_position(bytes, at, i) => match scan_braced(src, i) {
                ConstructScan::Done(_, next) => {
                    i = next;
                    continue;
                }
                ConstructScan::Incomplete(needed) => {
                    return ConstructScan::Incomplete(depth + needed);
                }
            },
            b'"' if at_word_position(bytes, at, i) => {
                i += 1;
                loop {
                    if i >= len {
                        return ConstructScan::Incomplete(depth + 1);
                    }
                    match bytes[i] {
                        b'\\' => {
                            if i + 1 >= len {
                                return ConstructScan::Incomplete(depth + 1);
                            }
                            i += 2;
                        }
                        b'"' => {
                            i += 1;
                            break;
                        }
                        _ => i += 1,
                    }
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    ConstructScan::Incomplete(depth)
}

/// Whether position `i` begins a word inside a bracketed script whose `[`
/// sits at `open`. Braces and quotes are only special at word positions.
fn at_word_position(bytes: &[u8], open: usize, i: usize) -> bool {
    if i == open + 1 {
        return true;
    }
    matches!(bytes[i - 1], b' ' | b'\t' | b'\r' | b'\n' | b';' | b'[')
}

/// Returns the end offset of the backslash escape sequence starting at
/// `at` (which must point at a `\`), so callers can substitute one escape
/// in isolation.
pub(crate) fn escape_extent(src: &str, at: usize) -> usize {
    let bytes = src.as_bytes();
    let len = bytes.len();
    if at + 1 >= len {
        return len;
    }
    match bytes[at + 1] {
        b'x' => {
            let mut i = at + 2;
            while i < len && i < at + 4 && bytes[i].is_ascii_hexdigit() {
                i += 1;
            }
            i
        }
        b'u' => {
            let mut i = at + 2;
            while i < len && i < at + 6 && bytes[i].is_ascii_hexdigit() {
                i += 1;
            }
            i
        }
        b'U' => {
            let mut i = at + 2;
            while i < len && i < at + 10 && bytes[i].is_ascii_hexdigit() {
                i += 1;
            }
            i
        }
        b'0'..=b'7' => {
            let mut i = at + 1;
            while i < len && i < at + 4 && (b'0'..=b'7').contains(&bytes[i]) {
                i += 1;
            }
            i
        }
        b'\n' => {
            let mut i = at + 2;
            while i < len && (bytes[i] == b' ' || bytes[i] == b'\t') {
                i += 1;
            }
            i
        }
        _ => {
            // skip one whole UTF-8 character
            let mut i = at + 2;
            while i < len && (bytes[i] & 0xc0) == 0x80 {
                i += 1;
            }
            i
        }
    }
}

/// Performs backslash substitution over a span of word text.
///
/// Handles the single-character escapes, `\x`/`\u`/`\U` hex forms, octal
/// digits, and backslash-newline (plus following blanks) collapsing to one
/// space. An unknown escape yields the escaped character itself.
#[must_use]
pub fn substitute_backslashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(&(_, next)) = chars.peek() else {
            out.push('\\');
            break;
        };
        match next {
            'a' => {
                out.push('\x07');
                chars.next();
            }
            'b' => {
                out.push('\x08');
                chars.next();
            }
            'f' => {
                out.push('\x0c');
                chars.next();
            }
            'n' => {
                out.push('\n');
                chars.next();
            }
            'r' => {
                out.push('\r');
                chars.next();
            }
            't' => {
                out.push('\t');
                chars.next();
            }
            'v' => {
                out.push('\x0b');
                chars.next();
            }
            '\n' => {
                chars.next();
                while chars.peek().is_some_and(|&(_, c)| c == ' ' || c == '\t') {
                    chars.next();
                }
                out.push(' ');
            }
            'x' => {
                chars.next();
                push_hex_escape(&mut out, &mut chars, 2, 'x');
            }
            'u' => {
                chars.next();
                push_hex_escape(&mut out, &mut chars, 4, 'u');
            }
            'U' => {
                chars.next();
                push_hex_escape(&mut out, &mut chars, 8, 'U');
            }
            '0'..='7' => {
                let mut value = 0u32;
                let mut digits = 0;
                while digits < 3 {
                    match chars.peek() {
                        Some(&(_, d @ '0'..='7')) => {
                            value = value * 8 + d.to_digit(8).unwrap_or(0);
                            digits += 1;
                            chars.next();
                        }
                        _ => break,
                    }
                }
                out.push(char::from_u32(value & 0xff).unwrap_or('\u{fffd}'));
            }
            other => {
                out.push(other);
                chars.next();
            }
        }
    }
    out
}

fn push_hex_escape(
    out: &mut String,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    max_digits: usize,
    intro: char,
) {
    let mut value = 0u32;
    let mut digits = 0;
    while digits < max_digits {
        match chars.peek() {
            Some(&(_, d)) if d.is_ascii_hexdigit() => {
                value = value.wrapping_mul(16) + d.to_digit(16).unwrap_or(0);
                digits += 1;
                chars.next();
            }
            _ => break,
        }
    }
    if digits == 0 {
        out.push(intro);
        return;
    }
    out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
}

/// What a resumed scan has left open, for the informational state fields.
struct OpenConstructs {
    brackets: u32,
    braces: u32,
    in_quotes: bool,
    escaped: bool,
}

fn probe_open_constructs(src: &str, from: usize) -> OpenConstructs {
    let bytes = &src.as_bytes()[from.min(src.len())..];
    let mut brackets = 0u32;
    let mut braces = 0u32;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut i = 0;
    while i < bytes.len() {
        if escaped {
            escaped = false;
            i += 1;
            continue;
        }
        match bytes[i] {
            b'\\' => escaped = true,
            b'{' if !in_quotes => braces += 1,
            b'}' if !in_quotes => braces = braces.saturating_sub(1),
            b'[' if !in_quotes => brackets += 1,
            b']' if !in_quotes => brackets = brackets.saturating_sub(1),
            b'"' if braces == 0 => in_quotes = !in_quotes,
            _ => {}
        }
        i += 1;
    }
    OpenConstructs {
        brackets,
        braces,
        in_quotes,
        escaped,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn complete(src: &str) -> Command {
        match next_command(src, 0) {
            ParseStep::Complete(cmd) => cmd,
            other => panic!("expected complete command for {src:?}, got {other:?}"),
        }
    }

    fn word_texts(src: &str) -> Vec<String> {
        complete(src)
            .words
            .iter()
            .map(|w| src[w.start..w.end].to_owned())
            .collect()
    }

    #[test]
    fn splits_words() {
        assert_eq!(word_texts("set x 10"), vec!["set", "x", "10"]);
        assert_eq!(word_texts("  set   x\t10  "), vec!["set", "x", "10"]);
    }

    #[test]
    fn command_boundary_at_semicolon() {
        let src = "set x [expr 1+2]; set y 3";
        let first = complete(src);
        assert_eq!(first.text(src), "set x [expr 1+2]");
        let second = match next_command(src, after_separator(src, first.end)) {
            ParseStep::Complete(cmd) => cmd,
            other => panic!("expected second command, got {other:?}"),
        };
        assert_eq!(second.text(src), "set y 3");
    }

    #[test]
    fn quoted_word_spans_newline() {
        let src = "set x \"a\nb\"";
        let cmd = complete(src);
        assert_eq!(cmd.words.len(), 3);
        assert_eq!(cmd.words[2].parts[0].kind, TokenKind::Quoted);
        assert_eq!(cmd.words[2].parts[0].inner(src), "a\nb");
    }

    #[test]
    fn open_brace_is_incomplete() {
        assert_eq!(
            next_command("set x {", 0),
            ParseStep::Incomplete {
                consumed: 0,
                needed: 1
            }
        );
    }

    #[test]
    fn open_bracket_and_quote_are_incomplete() {
        assert!(matches!(
            next_command("set x [foo", 0),
            ParseStep::Incomplete { .. }
        ));
        assert!(matches!(
            next_command("set x \"abc", 0),
            ParseStep::Incomplete { .. }
        ));
        assert!(matches!(
            next_command("set x abc\\", 0),
            ParseStep::Incomplete { .. }
        ));
    }

    #[test]
    fn expansion_prefix_sets_flag() {
        let src = "cmd {*}$lst tail";
        let cmd = complete(src);
        assert!(cmd.words[1].expand);
        assert_eq!(cmd.words[1].parts[0].kind, TokenKind::Variable);
        assert!(!cmd.words[2].expand);
    }

    #[test]
    fn lone_brace_star_brace_is_a_word() {
        let src = "cmd {*}";
        let cmd = complete(src);
        assert!(!cmd.words[1].expand);
        assert_eq!(cmd.words[1].parts[0].kind, TokenKind::Braced);
        assert_eq!(cmd.words[1].parts[0].inner(src), "*");
    }

    #[test]
    fn bare_word_with_inner_substitutions_is_compound() {
        let src = "set x a$b[c]d";
        let cmd = complete(src);
        let parts = &cmd.words[2].parts;
        let kinds: Vec<TokenKind> = parts.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Literal,
                TokenKind::Variable,
                TokenKind::Command,
                TokenKind::Literal
            ]
        );
        assert_eq!(parts[1].inner(src), "b");
        assert_eq!(parts[2].inner(src), "c");
    }

    #[test]
    fn braced_variable() {
        let src = "set x ${a b}";
        let cmd = complete(src);
        assert_eq!(cmd.words[2].parts[0].kind, TokenKind::BracedVariable);
        assert_eq!(cmd.words[2].parts[0].inner(src), "a b");
    }

    #[test]
    fn qualified_variable_name() {
        let src = "set x $foo::bar";
        let cmd = complete(src);
        assert_eq!(cmd.words[2].parts[0].inner(src), "foo::bar");
    }

    #[test]
    fn comments_skip_to_newline() {
        let src = "# a comment\nset x 1";
        assert_eq!(complete(src).text(src), "set x 1");
        // not a comment mid-command
        let src2 = "set x #5";
        assert_eq!(word_texts(src2), vec!["set", "x", "#5"]);
    }

    #[test]
    fn nested_brackets_with_braces_inside() {
        let src = "set x [set y {]}]";
        let cmd = complete(src);
        assert_eq!(cmd.words[2].parts[0].kind, TokenKind::Command);
        assert_eq!(cmd.words[2].parts[0].inner(src), "set y {]}");
    }

    #[test]
    fn extra_characters_errors() {
        assert!(matches!(
            next_command("set x {a}b", 0),
            ParseStep::Error(e) if e.message.contains("close-brace")
        ));
        assert!(matches!(
            next_command("set x \"a\"b", 0),
            ParseStep::Error(e) if e.message.contains("close-quote")
        ));
        assert!(matches!(
            next_command("set x } y", 0),
            ParseStep::Error(e) if e.message.contains("unmatched")
        ));
    }

    #[test]
    fn tokens_are_ordered_and_non_overlapping() {
        let src = "puts \"x=$x, y=[get y]\" {raw $z} tail$q";
        let cmd = complete(src);
        let mut flat = Vec::new();
        fn walk(tokens: &[Token], out: &mut Vec<(usize, usize)>) {
            for t in tokens {
                if t.parts.is_empty() {
                    out.push((t.start, t.end));
                } else {
                    walk(&t.parts, out);
                }
            }
        }
        for w in &cmd.words {
            walk(&w.parts, &mut flat);
        }
        for pair in flat.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlapping tokens: {pair:?}");
        }
        let covered: usize = flat.iter().map(|(s, e)| e - s).sum();
        assert!(covered <= src.len());
    }

    #[test]
    fn streaming_feed_accumulates() {
        let mut tok = Tokenizer::new();
        assert!(matches!(
            tok.feed("set x {"),
            ParseStep::Incomplete { consumed: 0, .. }
        ));
        assert!(tok.state().brace_depth >= 1);
        let full = "set x {hello}";
        let step = tok.feed(full);
        match step {
            ParseStep::Complete(cmd) => assert_eq!(cmd.text(full), "set x {hello}"),
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(tok.feed(full), ParseStep::End);
    }

    #[test]
    fn parser_is_idempotent() {
        let src = "foreach n {1 2 3} { incr s $n }";
        let a = next_command(src, 0);
        let b = next_command(src, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn parser_state_round_trips_through_dump() {
        let mut tok = Tokenizer::new();
        tok.feed("set x {");
        let bytes = tok.state().dump().unwrap();
        let restored = ParserState::load(&bytes).unwrap();
        assert_eq!(restored, tok.state());
    }

    #[test]
    fn backslash_substitution() {
        assert_eq!(substitute_backslashes(r"a\tb"), "a\tb");
        assert_eq!(substitute_backslashes(r"a\nb"), "a\nb");
        assert_eq!(substitute_backslashes(r"\x41"), "A");
        assert_eq!(substitute_backslashes(r"é"), "é");
        assert_eq!(substitute_backslashes(r"\101"), "A");
        assert_eq!(substitute_backslashes("a\\\n   b"), "a b");
        assert_eq!(substitute_backslashes(r"\q"), "q");
        assert_eq!(substitute_backslashes(r"\\"), "\\");
    }

    #[test]
    fn command_complete_checks() {
        assert!(command_complete("set x 1"));
        assert!(command_complete("set x 1\nset y 2"));
        assert!(!command_complete("set x {"));
        assert!(!command_complete("while {$a} {"));
        assert!(command_complete(""));
    }
}
