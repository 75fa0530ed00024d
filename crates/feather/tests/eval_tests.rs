//! End-to-end evaluation scenarios: substitution, procedures, error
//! propagation, and the evaluator's frame discipline.

use feather::{HostOps, Interp, Status};

fn eval(script: &str) -> String {
    Interp::new().eval(script).unwrap_or_else(|e| panic!("script failed: {e}\n{script}"))
}

// =============================================================================
// 1. substitution
// =============================================================================

#[test]
fn arithmetic_and_variables() {
    assert_eq!(eval("set x 10; set y 5; expr {$x * $y + 2}"), "52");
}

#[test]
fn command_substitution() {
    assert_eq!(eval("set x [expr 1+2]; set y 3; list $x $y"), "3 3");
}

#[test]
fn quoted_words_substitute() {
    assert_eq!(eval("set a 1; set b \"a=$a, c=[expr {2}]\""), "a=1, c=2");
}

#[test]
fn braced_words_are_raw() {
    assert_eq!(eval("set a {$x [y] \\n}"), "$x [y] \\n");
}

#[test]
fn backslash_escapes_in_bare_words() {
    assert_eq!(eval(r"set a a\tb"), "a\tb");
    // backslash-newline inside quotes collapses to one space
    assert_eq!(eval("set a \"x\\\n   y\"; set a"), "x y");
}

#[test]
fn compound_words_concatenate() {
    assert_eq!(eval("set x abc; set y ${x}def; set y"), "abcdef");
    assert_eq!(eval("set n 7; set msg n=$n!; set msg"), "n=7!");
}

#[test]
fn expansion_prefix_splices_arguments() {
    assert_eq!(eval("set lst {1 2 3}; list a {*}$lst b"), "a 1 2 3 b");
    assert_eq!(eval("set lst {}; llength [list {*}$lst]"), "0");
}

#[test]
fn line_continuation_joins_words() {
    assert_eq!(eval("list a \\\n b"), "a b");
}

// =============================================================================
// 2. procedures
// =============================================================================

#[test]
fn proc_with_defaults_and_rest() {
    let mut interp = Interp::new();
    interp
        .eval("proc greet {name {prefix Hello} args} { return \"$prefix, $name! extras=[llength $args]\" }")
        .unwrap();
    assert_eq!(interp.eval("greet World").unwrap(), "Hello, World! extras=0");
    assert_eq!(
        interp.eval("greet World Hi a b c").unwrap(),
        "Hi, World! extras=3"
    );
}

#[test]
fn proc_wrong_args_message() {
    let mut interp = Interp::new();
    interp.eval("proc p {a {b 2}} {}").unwrap();
    let err = interp.eval("p").expect_err("missing required argument");
    assert_eq!(err.message(), "wrong # args: should be \"p a ?b?\"");

    interp.eval("proc q {a} {}").unwrap();
    let err = interp.eval("q 1 2").expect_err("too many arguments");
    assert_eq!(err.message(), "wrong # args: should be \"q a\"");
}

#[test]
fn info_level_zero_reports_invocation() {
    let mut interp = Interp::new();
    interp.eval("proc p {a b} { info level 0 }").unwrap();
    assert_eq!(interp.eval("p one two").unwrap(), "p one two");
}

#[test]
fn locals_do_not_leak_between_frames() {
    let mut interp = Interp::new();
    interp.eval("proc p {} { set inner 42 }").unwrap();
    interp.eval("p").unwrap();
    assert_eq!(interp.eval("info exists inner").unwrap(), "0");
}

#[test]
fn frame_stack_is_balanced_after_evaluation() {
    let mut interp = Interp::new();
    let id = interp.interp_id();
    let before = feather::HostOps::frame_size(interp.host_mut(), id);
    interp
        .eval("proc a {} {b}; proc b {} {return deep}; a")
        .unwrap();
    let after = feather::HostOps::frame_size(interp.host_mut(), id);
    assert_eq!(before, after, "frame stack must return to its prior depth");
}

#[test]
fn upvar_modifies_callers_variable() {
    let mut interp = Interp::new();
    interp
        .eval("proc bump {varName} { upvar 1 $varName v; incr v }")
        .unwrap();
    interp.eval("set counter 41; bump counter").unwrap();
    assert_eq!(interp.eval("set counter").unwrap(), "42");
}

#[test]
fn uplevel_evaluates_in_caller_frame() {
    let mut interp = Interp::new();
    interp
        .eval("proc setInCaller {name value} { uplevel 1 [list set $name $value] }")
        .unwrap();
    interp.eval("setInCaller fromBelow 99").unwrap();
    assert_eq!(interp.eval("set fromBelow").unwrap(), "99");
}

#[test]
fn global_links_to_the_root_namespace() {
    let mut interp = Interp::new();
    interp.eval("set g 1").unwrap();
    interp.eval("proc p {} { global g; incr g; set g }").unwrap();
    assert_eq!(interp.eval("p").unwrap(), "2");
    assert_eq!(interp.eval("set g").unwrap(), "2");
}

#[test]
fn apply_invokes_anonymous_procedures() {
    assert_eq!(eval("apply {{x} {expr {$x * 2}}} 21"), "42");
    assert_eq!(eval("apply {{a {b 10}} {expr {$a + $b}}} 5"), "15");
}

#[test]
fn rename_moves_and_deletes_commands() {
    let mut interp = Interp::new();
    interp.eval("proc orig {} {return here}").unwrap();
    interp.eval("rename orig moved").unwrap();
    assert_eq!(interp.eval("moved").unwrap(), "here");
    let err = interp.eval("orig").expect_err("old name must be gone");
    assert_eq!(err.message(), "invalid command name \"orig\"");
    interp.eval("rename moved {}").unwrap();
    let err = interp.eval("moved").expect_err("deleted command");
    assert!(err.message().contains("invalid command name"));
}

// =============================================================================
// 3. errors
// =============================================================================

#[test]
fn unknown_command_error() {
    let mut interp = Interp::new();
    let err = interp.eval("definitely-not-a-command").expect_err("should fail");
    assert_eq!(err.message(), "invalid command name \"definitely-not-a-command\"");
    assert!(err.error_code().contains("TCL LOOKUP COMMAND"));
}

#[test]
fn error_info_accumulates_frames() {
    let mut interp = Interp::new();
    interp.eval("proc outer {} { inner }").unwrap();
    interp.eval("proc inner {} { error boom }").unwrap();
    let err = interp.eval("outer").expect_err("propagated error");
    assert_eq!(err.message(), "boom");
    let info = err.error_info();
    assert!(info.contains("while executing"), "got: {info}");
    assert!(info.contains("invoked from within"), "got: {info}");
}

#[test]
fn error_populates_magic_globals() {
    let mut interp = Interp::new();
    let _ = interp.eval("throw {APP FAIL} kaboom");
    assert_eq!(interp.get_var("errorCode").as_deref(), Some("APP FAIL"));
    let info = interp.get_var("errorInfo").expect("errorInfo must be set");
    assert!(info.starts_with("kaboom"), "got: {info}");
}

#[test]
fn top_level_statuses_reach_the_host() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval_status("break"), Status::Break);
    assert_eq!(interp.eval_status("continue"), Status::Continue);
    assert_eq!(interp.eval_status("return hi"), Status::Return);
    assert_eq!(interp.result(), "hi");
    assert_eq!(interp.eval_status("set x 1"), Status::Ok);
}

// =============================================================================
// 4. recursion and tailcall
// =============================================================================

#[test]
fn recursion_limit_boundary() {
    let mut interp = Interp::new();
    interp.set_recursion_limit(20);
    interp
        .eval("proc down n { if {$n > 0} { down [expr {$n - 1}] } }")
        .unwrap();
    // limit 20 admits 19 nested frames above the global frame
    interp.eval("down 18").unwrap();
    let err = interp.eval("down 19").expect_err("one deeper must fail");
    assert_eq!(err.message(), "too many nested evaluations");
}

#[test]
fn tailcall_replaces_the_frame() {
    let mut interp = Interp::new();
    interp.set_recursion_limit(25);
    interp
        .eval("proc countdown n { if {$n == 0} { return done }; tailcall countdown [expr {$n - 1}] }")
        .unwrap();
    // far deeper than the recursion limit: frames are replaced, not stacked
    assert_eq!(interp.eval("countdown 500").unwrap(), "done");
}

#[test]
fn tailcall_outside_a_procedure_errors() {
    let mut interp = Interp::new();
    let err = interp.eval("tailcall set x 1").expect_err("no enclosing proc");
    assert_eq!(
        err.message(),
        "tailcall can only be called from within a procedure"
    );
}

#[test]
fn tailcall_to_a_builtin() {
    let mut interp = Interp::new();
    interp.eval("proc double {x} { tailcall expr {$x * 2} }").unwrap();
    assert_eq!(interp.eval("double 8").unwrap(), "16");
}

// =============================================================================
// 5. host dispatch
// =============================================================================

#[test]
fn unknown_hook_dispatches_extension_commands() {
    let mut interp = Interp::new();
    interp.register_command("host::upper", |host, id, argv| {
        let text = host.str_value(id, argv[1]);
        Ok(host.str_new(id, &text.to_uppercase()))
    });
    assert_eq!(interp.eval("host::upper hello").unwrap(), "HELLO");
}

/// Extension commands re-enter the evaluator; nothing about the core may
/// assume a single active evaluation.
#[test]
fn host_commands_can_reenter_the_evaluator() {
    let mut interp = Interp::new();
    interp.register_command("host::twice", |host, id, argv| {
        let script = host.str_value(id, argv[1]);
        let doubled = format!("{script}; {script}");
        match feather::script_eval(host, id, &doubled, feather::EvalFlags::Local) {
            Status::Ok => Ok(host.result_get(id)),
            _ => Err(feather::HostError::new("nested evaluation failed")),
        }
    });
    interp.eval("set n 0").unwrap();
    interp.eval("host::twice {incr n}").unwrap();
    assert_eq!(interp.eval("set n").unwrap(), "2");
}

#[test]
fn command_exec_runs_a_prebuilt_argv() {
    let mut interp = Interp::new();
    let id = interp.interp_id();
    let host = interp.host_mut();
    let args = host.list_new(id);
    for word in ["set", "direct", "value"] {
        let w = host.str_new(id, word);
        host.list_push(id, args, w);
    }
    assert_eq!(feather::command_exec(host, id, args, feather::EvalFlags::Local), Status::Ok);
    assert_eq!(interp.get_var("direct").as_deref(), Some("value"));
}

#[test]
fn eval_global_flag_targets_the_root_frame() {
    let mut interp = Interp::new();
    let id = interp.interp_id();
    interp.eval("proc p {} { runGlobal }").unwrap();
    interp.register_command("runGlobal", |host, id, _argv| {
        match feather::script_eval(host, id, "set fromGlobal yes", feather::EvalFlags::Global) {
            Status::Ok => Ok(host.result_get(id)),
            _ => Err(feather::HostError::new("global eval failed")),
        }
    });
    interp.eval("p").unwrap();
    let host = interp.host_mut();
    let value = host.ns_get_var(id, "::", "fromGlobal").expect("set in global frame");
    assert_eq!(host.str_value(id, value), "yes");
}
