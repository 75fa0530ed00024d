use feather::Interp;

/// Test we can reuse a session across evaluations without borrow issues.
#[test]
fn repeat_eval() {
    let mut interp = Interp::new();

    let r = interp.eval("expr {1 + 2}").unwrap();
    assert_eq!(r, "3");

    let r = interp.eval("expr {1 + 2}").unwrap();
    assert_eq!(r, "3");
}

#[test]
fn state_persists_between_evals() {
    let mut interp = Interp::new();
    interp.eval("set greeting hello").unwrap();
    assert_eq!(interp.eval("set greeting").unwrap(), "hello");
}

#[test]
fn empty_script_gives_empty_result() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval("").unwrap(), "");
    assert_eq!(interp.eval("   \n  ;; # just a comment").unwrap(), "");
}
