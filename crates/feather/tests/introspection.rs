//! `info` subcommands, variable/execution traces, and namespace-qualified
//! variable access.

use feather::Interp;

fn eval(script: &str) -> String {
    Interp::new().eval(script).unwrap_or_else(|e| panic!("script failed: {e}\n{script}"))
}

// =============================================================================
// 1. info
// =============================================================================

#[test]
fn info_exists() {
    assert_eq!(eval("set x 1; info exists x"), "1");
    assert_eq!(eval("info exists nope"), "0");
    assert_eq!(eval("proc p {} { set local 1; info exists local }; p"), "1");
}

#[test]
fn info_commands_include_builtins() {
    let mut interp = Interp::new();
    let commands = interp.eval("info commands").unwrap();
    for name in ["set", "foreach", "llength", "dict", "tailcall"] {
        assert!(
            commands.split_whitespace().any(|c| c == name),
            "missing {name} in: {commands}"
        );
    }
    assert_eq!(interp.eval("info commands lleng*").unwrap(), "llength");
}

#[test]
fn info_procs_lists_only_procs() {
    let mut interp = Interp::new();
    interp.eval("proc mine {} {}").unwrap();
    assert_eq!(interp.eval("info procs").unwrap(), "mine");
    assert_eq!(interp.eval("info procs m*").unwrap(), "mine");
    assert_eq!(interp.eval("info procs zz*").unwrap(), "");
}

#[test]
fn info_args_and_body() {
    let mut interp = Interp::new();
    interp.eval("proc f {a {b 5} args} { expr {$a + $b} }").unwrap();
    assert_eq!(interp.eval("info args f").unwrap(), "a b args");
    assert_eq!(interp.eval("info body f").unwrap(), " expr {$a + $b} ");
    let err = interp.eval("info args set").expect_err("builtins have no args");
    assert_eq!(err.message(), "\"set\" isn't a procedure");
}

#[test]
fn info_level_reports_depth() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval("info level").unwrap(), "0");
    interp.eval("proc outer {} { inner x }").unwrap();
    interp.eval("proc inner {arg} { info level }").unwrap();
    assert_eq!(interp.eval("outer").unwrap(), "2");
    // absolute and relative forms
    interp.eval("proc show {} { info level -1 }").unwrap();
    interp.eval("proc caller {} { show }").unwrap();
    assert_eq!(interp.eval("caller").unwrap(), "caller");
}

#[test]
fn info_locals_vars_globals() {
    let mut interp = Interp::new();
    interp.eval("set g 1").unwrap();
    interp
        .eval("proc p {param} { global g; set local 2; list [lsort [info locals]] [lsort [info vars]] }")
        .unwrap();
    assert_eq!(interp.eval("p arg").unwrap(), "{local param} {g local param}");
    let globals = interp.eval("info globals g").unwrap();
    assert_eq!(globals, "g");
}

#[test]
fn info_frame_counts_frames() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval("info frame").unwrap(), "1");
    interp.eval("proc p {} { info frame }").unwrap();
    assert_eq!(interp.eval("p").unwrap(), "2");
    let dict = interp.eval("proc q {a} { info frame 1 }; q z").unwrap();
    assert!(dict.contains("cmd"), "got: {dict}");
}

#[test]
fn info_script_round_trips() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval("info script").unwrap(), "");
    assert_eq!(interp.eval("info script demo.tcl").unwrap(), "demo.tcl");
    assert_eq!(interp.eval("info script").unwrap(), "demo.tcl");
}

#[test]
fn info_errorstack_after_error() {
    let mut interp = Interp::new();
    let _ = interp.eval("error kapow");
    let stack = interp.eval("info errorstack").unwrap();
    assert!(stack.contains("INNER"), "got: {stack}");
}

// =============================================================================
// 2. namespace-qualified variables
// =============================================================================

#[test]
fn qualified_names_route_to_namespace_storage() {
    let mut interp = Interp::new();
    interp.eval("set ::app::config::mode fast").unwrap();
    assert_eq!(interp.eval("set ::app::config::mode").unwrap(), "fast");
    // relative resolution from the global namespace
    assert_eq!(interp.eval("set app::config::mode").unwrap(), "fast");
}

#[test]
fn variable_links_procs_to_namespace_vars() {
    let mut interp = Interp::new();
    interp.eval("set ::counter::n 0").unwrap();
    interp
        .eval("proc tick {} { variable ::counter::n; incr n }")
        .unwrap();
    interp.eval("tick; tick").unwrap();
    assert_eq!(interp.eval("set ::counter::n").unwrap(), "2");
}

#[test]
fn global_frame_and_root_namespace_are_one_storage() {
    let mut interp = Interp::new();
    interp.eval("set x direct").unwrap();
    assert_eq!(interp.eval("set ::x").unwrap(), "direct");
    interp.eval("set ::y qualified").unwrap();
    assert_eq!(interp.eval("set y").unwrap(), "qualified");
}

// =============================================================================
// 3. traces
// =============================================================================

#[test]
fn write_trace_fires_after_set() {
    let mut interp = Interp::new();
    interp.eval("set log {}").unwrap();
    interp
        .eval("trace add variable x {write} {lappend ::log}")
        .unwrap();
    interp.eval("set x 1; set x 2").unwrap();
    // each firing appends: name1 name2 op
    assert_eq!(interp.eval("set log").unwrap(), "x {} write x {} write");
}

#[test]
fn read_trace_fires_before_get() {
    let mut interp = Interp::new();
    interp.eval("set hits 0; set x seen").unwrap();
    interp
        .eval("trace add variable x {read} {incr ::hits ;#}")
        .unwrap();
    assert_eq!(interp.eval("set x").unwrap(), "seen");
    assert_eq!(interp.eval("set hits").unwrap(), "1");
}

#[test]
fn unset_trace_fires_on_removal() {
    let mut interp = Interp::new();
    interp.eval("set log {}; set x 1").unwrap();
    interp
        .eval("trace add variable x {unset} {lappend ::log}")
        .unwrap();
    interp.eval("unset x").unwrap();
    assert_eq!(interp.eval("set log").unwrap(), "x {} unset");
}

#[test]
fn execution_traces_fire_around_commands() {
    let mut interp = Interp::new();
    interp.eval("set log {}; proc target {} {return done}").unwrap();
    interp
        .eval("trace add execution target {enter leave} {lappend ::log}")
        .unwrap();
    interp.eval("target").unwrap();
    let log = interp.eval("set log").unwrap();
    assert!(log.contains("enter"), "got: {log}");
    assert!(log.contains("leave"), "got: {log}");
    assert!(log.contains("done"), "leave trace carries the result: {log}");
}

#[test]
fn trace_handlers_do_not_refire_themselves() {
    let mut interp = Interp::new();
    interp.eval("set count 0").unwrap();
    // the handler writes the traced variable; suppression must stop the loop
    interp
        .eval("trace add variable x {write} {apply {{n1 n2 op} { incr ::count; set ::x inner }}}")
        .unwrap();
    interp.eval("set x outer").unwrap();
    assert_eq!(interp.eval("set count").unwrap(), "1");
}

#[test]
fn trace_info_and_remove() {
    let mut interp = Interp::new();
    interp.eval("trace add variable v {write} {noop}").unwrap();
    assert_eq!(interp.eval("trace info variable v").unwrap(), "{write noop}");
    interp.eval("trace remove variable v {write} {noop}").unwrap();
    assert_eq!(interp.eval("trace info variable v").unwrap(), "");
}

#[test]
fn trace_error_aborts_the_access() {
    let mut interp = Interp::new();
    interp
        .eval("trace add variable x {write} {apply {{n1 n2 op} { error vetoed }}}")
        .unwrap();
    let err = interp.eval("set x 1").expect_err("trace error propagates");
    assert_eq!(err.message(), "vetoed");
}
