//! Control-flow semantics: conditionals, loops, `switch`, the `return`
//! machinery, and structured error handling with `catch`/`try`.

use feather::Interp;

fn eval(script: &str) -> String {
    Interp::new().eval(script).unwrap_or_else(|e| panic!("script failed: {e}\n{script}"))
}

// =============================================================================
// 1. conditionals and loops
// =============================================================================

#[test]
fn if_elseif_else_chain() {
    assert_eq!(eval("if {1} {set r a}"), "a");
    assert_eq!(eval("if {0} {set r a} else {set r b}"), "b");
    assert_eq!(eval("if {0} {set r a} elseif {1} {set r b} else {set r c}"), "b");
    assert_eq!(eval("if {0} {set r a}"), "");
    assert_eq!(eval("if {1} then {set r a} else {set r b}"), "a");
}

#[test]
fn if_requires_boolean_condition() {
    let mut interp = Interp::new();
    interp.eval("set c maybe").unwrap();
    let err = interp.eval("if {$c} {}").expect_err("non-boolean condition");
    assert_eq!(err.message(), "expected boolean but got \"maybe\"");
}

#[test]
fn while_loops_with_break_and_continue() {
    assert_eq!(
        eval("set s 0; set i 0; while {$i < 10} { incr i; if {$i == 3} continue; if {$i > 5} break; incr s $i }; set s"),
        "12"
    );
}

#[test]
fn for_loop_counts() {
    assert_eq!(
        eval("set s 0; for {set i 1} {$i <= 5} {incr i} { incr s $i }; set s"),
        "15"
    );
}

#[test]
fn for_break_skips_next_script() {
    assert_eq!(
        eval("for {set i 0} {1} {incr i} { if {$i == 2} break }; set i"),
        "2"
    );
}

#[test]
fn foreach_sums_a_list() {
    assert_eq!(eval("set s 0; foreach n {1 2 3 4 5} { incr s $n }; set s"), "15");
}

#[test]
fn foreach_multiple_vars_consume_in_chunks() {
    assert_eq!(
        eval("set out {}; foreach {a b} {1 2 3 4} { lappend out $b $a }; set out"),
        "2 1 4 3"
    );
}

#[test]
fn foreach_pads_short_lists_with_empty() {
    assert_eq!(
        eval("set out {}; foreach a {1 2 3} b {x} { lappend out $a=$b }; set out"),
        "1=x 2= 3="
    );
}

#[test]
fn lmap_collects_results() {
    assert_eq!(eval("lmap n {1 2 3} { expr {$n * $n} }"), "1 4 9");
    assert_eq!(
        eval("lmap n {1 2 3 4} { if {$n % 2} continue; set n }"),
        "2 4"
    );
    assert_eq!(eval("lmap n {1 2 3 4} { if {$n == 3} break; set n }"), "1 2");
}

// =============================================================================
// 2. switch
// =============================================================================

#[test]
fn switch_exact_and_default() {
    assert_eq!(eval("switch b {a {set r 1} b {set r 2} default {set r 3}}"), "2");
    assert_eq!(eval("switch z {a {set r 1} default {set r 3}}"), "3");
    assert_eq!(eval("switch z {a {set r 1} b {set r 2}}"), "");
}

#[test]
fn switch_fallthrough_bodies() {
    assert_eq!(eval("switch a {a - b {set r shared} default {set r other}}"), "shared");
}

#[test]
fn switch_glob_and_regexp() {
    assert_eq!(eval("switch -glob ab.c {*.c {set r glob} default {set r no}}"), "glob");
    assert_eq!(eval("switch -regexp abc {^a.c$ {set r re} default {set r no}}"), "re");
}

#[test]
fn switch_double_dash_stops_options() {
    assert_eq!(eval("switch -- -glob {-glob {set r dash} default {set r no}}"), "dash");
}

// =============================================================================
// 3. return machinery
// =============================================================================

#[test]
fn return_translates_to_ok_at_proc_boundary() {
    assert_eq!(eval("proc p {} { return early; set never reached }; p"), "early");
}

#[test]
fn return_code_break_escapes_into_callers_loop() {
    assert_eq!(
        eval("proc stop {} { return -code break }; set s 0; foreach n {1 2 3} { if {$n == 2} stop; incr s $n }; set s"),
        "1"
    );
}

#[test]
fn return_level_two_unwinds_two_procs() {
    assert_eq!(
        eval("proc inner {} { return -level 2 both }; proc outer {} { inner; return one }; outer"),
        "both"
    );
}

#[test]
fn return_level_zero_is_inline() {
    assert_eq!(eval("proc p {} { set r [return -level 0 val]; set r }; p"), "val");
}

#[test]
fn return_code_error_raises_in_caller() {
    let mut interp = Interp::new();
    interp
        .eval("proc fail {} { return -code error -errorcode {APP X} oops }")
        .unwrap();
    let err = interp.eval("fail").expect_err("must raise");
    assert_eq!(err.message(), "oops");
    assert_eq!(err.error_code(), "APP X");
}

#[test]
fn break_outside_loop_is_an_error_in_a_proc() {
    let mut interp = Interp::new();
    interp.eval("proc p {} { break }").unwrap();
    let err = interp.eval("p").expect_err("break must not escape the proc");
    assert_eq!(err.message(), "invoked \"break\" outside of a loop");
}

// =============================================================================
// 4. catch and try
// =============================================================================

#[test]
fn catch_converts_statuses_to_codes() {
    assert_eq!(eval("catch {set x ok}"), "0");
    assert_eq!(eval("catch {error boom}"), "1");
    assert_eq!(eval("catch {return hi}"), "2");
    assert_eq!(eval("catch {break}"), "3");
    assert_eq!(eval("catch {continue}"), "4");
}

#[test]
fn catch_captures_result_and_options() {
    assert_eq!(
        eval("proc safeDiv {a b} { if {$b == 0} { error \"divzero\" }; expr {$a / $b} }\ncatch {safeDiv 10 0} msg opts\nlist $msg [dict get $opts -code]"),
        "divzero 1"
    );
}

#[test]
fn catch_options_carry_error_details() {
    assert_eq!(
        eval("catch {throw {A B} msg} m o; dict get $o -errorcode"),
        "A B"
    );
    assert_eq!(eval("catch {set q ok} m o; dict get $o -code"), "0");
}

#[test]
fn catch_of_success_stores_result() {
    assert_eq!(eval("catch {expr {6 * 7}} r; set r"), "42");
}

#[test]
fn error_command_sets_info_and_code() {
    let mut interp = Interp::new();
    let err = interp
        .eval("error msg customInfo {MY CODE}")
        .expect_err("explicit error");
    assert_eq!(err.message(), "msg");
    assert_eq!(err.error_code(), "MY CODE");
    assert!(err.error_info().starts_with("customInfo"));
}

#[test]
fn try_on_error_handler_binds_message_and_options() {
    assert_eq!(
        eval("try { error boom } on error {m o} { list caught $m [dict get $o -code] }"),
        "caught boom 1"
    );
}

#[test]
fn try_passes_through_ok_results() {
    assert_eq!(eval("try { expr {1 + 1} }"), "2");
    assert_eq!(eval("try { expr {1 + 1} } on error {m o} { set never here }"), "2");
}

#[test]
fn try_on_ok_handler_runs() {
    assert_eq!(eval("try { set x fine } on ok {m o} { list got $m }"), "got fine");
}

#[test]
fn try_trap_matches_errorcode_prefix() {
    assert_eq!(
        eval("try { throw {ARITH DIVZERO} bad } trap {ARITH} {m o} { list trapped $m }"),
        "trapped bad"
    );
    // non-matching prefix falls through to a later handler
    assert_eq!(
        eval("try { throw {POSIX ENOENT} nofile } trap {ARITH} {m o} { set r wrong } on error {m o} { set r generic }"),
        "generic"
    );
}

#[test]
fn try_finally_always_runs() {
    assert_eq!(
        eval("set log {}; try { lappend log body } finally { lappend log cleanup }; set log"),
        "body cleanup"
    );
    let mut interp = Interp::new();
    let err = interp
        .eval("set ::log {}; try { error boom } finally { lappend ::log cleanup }")
        .expect_err("body error survives finally");
    assert_eq!(err.message(), "boom");
    assert_eq!(interp.eval("set ::log").unwrap(), "cleanup");
}

#[test]
fn try_finally_error_overrides_body_error() {
    let mut interp = Interp::new();
    let err = interp
        .eval("try { error original } finally { error cleanupFailed }")
        .expect_err("finally error wins");
    assert_eq!(err.message(), "cleanupFailed");
    assert!(
        err.error_info().contains("original"),
        "body error kept in the trace: {}",
        err.error_info()
    );
}

#[test]
fn throw_is_error_with_code() {
    assert_eq!(
        eval("catch {throw {HTTP 404} {not found}} m o; list $m [dict get $o -errorcode]"),
        "{not found} {HTTP 404}"
    );
}
