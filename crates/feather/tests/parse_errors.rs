//! Parser-level behavior through the public surface: incomplete input,
//! syntax errors, streaming accumulation, and the `parse_script` entry
//! point's result protocol.

use feather::{
    Interp, ParseStep, ParserState, Status, Tokenizer, command_complete, parse_script,
};

/// Helper: drive `parse_script` over a source string and return the result
/// list text.
fn parse_result(src: &str) -> String {
    let mut interp = Interp::new();
    let id = interp.interp_id();
    let host = interp.host_mut();
    let script = feather::HostOps::str_new(host, id, src);
    let status = parse_script(host, id, script);
    assert_eq!(status, Status::Ok, "parse_script reports through the result");
    interp.result()
}

#[test]
fn complete_script_parses_ok() {
    assert_eq!(parse_result("set x 1; set y 2"), "OK");
}

#[test]
fn open_brace_is_incomplete() {
    // `set x {` consumed nothing and needs at least one close brace
    assert_eq!(parse_result("set x {"), "INCOMPLETE 0 1");
}

#[test]
fn error_carries_line_and_column() {
    let text = parse_result("set x {a}b");
    assert!(
        text.starts_with("ERROR 1 "),
        "expected line/col error, got: {text}"
    );
    assert!(text.contains("close-brace"), "got: {text}");
}

#[test]
fn evaluating_incomplete_input_is_an_error() {
    let mut interp = Interp::new();
    let err = interp.eval("set x {").expect_err("unterminated brace should fail");
    assert_eq!(err.message(), "missing close-brace");

    let err = interp.eval("set x \"abc").expect_err("unterminated quote should fail");
    assert_eq!(err.message(), "missing \"");

    let err = interp.eval("set x [foo").expect_err("unterminated bracket should fail");
    assert_eq!(err.message(), "missing close-bracket");
}

#[test]
fn streaming_chunks_accumulate_into_a_command() {
    let mut tok = Tokenizer::new();
    match tok.feed("set x {") {
        ParseStep::Incomplete { consumed, needed } => {
            assert_eq!(consumed, 0);
            assert!(needed >= 1);
        }
        other => panic!("expected incomplete, got {other:?}"),
    }
    let full = "set x {hello}";
    match tok.feed(full) {
        ParseStep::Complete(cmd) => assert_eq!(cmd.text(full), "set x {hello}"),
        other => panic!("expected complete command, got {other:?}"),
    }
    assert_eq!(tok.feed(full), ParseStep::End);
}

/// The multi-chunk scenario end to end: accumulate, recognize, evaluate.
#[test]
fn streamed_command_evaluates() {
    let mut tok = Tokenizer::new();
    assert!(matches!(tok.feed("set x {"), ParseStep::Incomplete { .. }));
    let full = "set x {hello}";
    let ParseStep::Complete(cmd) = tok.feed(full) else {
        panic!("expected completion after second chunk");
    };
    let mut interp = Interp::new();
    let result = interp.eval(cmd.text(full)).unwrap();
    assert_eq!(result, "hello");
    assert_eq!(interp.eval("set x").unwrap(), "hello");
}

#[test]
fn tokenizer_state_snapshots() {
    let mut tok = Tokenizer::new();
    tok.feed("set x {");
    let bytes = tok.state().dump().unwrap();
    let restored = ParserState::load(&bytes).unwrap();
    assert_eq!(restored, tok.state());
    assert!(restored.brace_depth >= 1);

    let mut resumed = Tokenizer::from_state(restored);
    assert!(matches!(resumed.feed("set x {hello}"), ParseStep::Complete(_)));
}

#[test]
fn command_complete_matches_repl_expectations() {
    assert!(command_complete("set x 1"));
    assert!(command_complete("proc p {} {return 1}"));
    assert!(!command_complete("proc p {} {"));
    assert!(!command_complete("while {1} \"puts"));
    // syntax errors are complete: more input cannot fix them
    assert!(command_complete("set x {a}b"));
}

#[test]
fn unbalanced_close_brace_is_an_error() {
    let mut interp = Interp::new();
    let err = interp.eval("set x } y").expect_err("stray close brace");
    assert!(err.message().contains("unmatched close-brace"), "got: {err}");
}
