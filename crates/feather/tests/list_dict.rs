//! List and dict primitives: round-trips, index syntax, editing commands,
//! and insertion-order guarantees.

use feather::Interp;

fn eval(script: &str) -> String {
    Interp::new().eval(script).unwrap_or_else(|e| panic!("script failed: {e}\n{script}"))
}

// =============================================================================
// 1. lists
// =============================================================================

#[test]
fn list_round_trip() {
    assert_eq!(eval("lindex [list a {b c} d] 1"), "b c");
    assert_eq!(eval("lindex [list a b c] 0"), "a");
    assert_eq!(eval("llength [list a {b c} d]"), "3");
}

#[test]
fn list_quotes_special_elements() {
    assert_eq!(eval("list a {b c} {}"), "a {b c} {}");
    assert_eq!(eval("llength [list {a b} c]"), "2");
}

#[test]
fn lindex_out_of_range_is_empty() {
    assert_eq!(eval("set lst {a b c}; lindex $lst -1"), "");
    assert_eq!(eval("set lst {a b c}; lindex $lst [llength $lst]"), "");
}

#[test]
fn lindex_nested_indices() {
    assert_eq!(eval("lindex {{a b} {c d}} 1 0"), "c");
    assert_eq!(eval("lindex {{a b} {c d}} {1 1}"), "d");
    assert_eq!(eval("lindex {a b c}"), "a b c");
}

#[test]
fn end_relative_indices() {
    assert_eq!(eval("lindex {a b c} end"), "c");
    assert_eq!(eval("lindex {a b c} end-1"), "b");
    assert_eq!(eval("lrange {a b c d e} 1 end-1"), "b c d");
    assert_eq!(eval("lrange {a b c} 2 0"), "");
}

#[test]
fn lappend_creates_and_extends() {
    assert_eq!(eval("lappend fresh a b; set fresh"), "a b");
    assert_eq!(eval("set l {x}; lappend l y z; set l"), "x y z");
}

#[test]
fn lset_replaces_in_place() {
    assert_eq!(eval("set l {a b c}; lset l 1 B; set l"), "a B c");
    assert_eq!(eval("set l {{a b} {c d}}; lset l 1 0 C; set l"), "{a b} {C d}");
    let mut interp = Interp::new();
    interp.eval("set l {a b}").unwrap();
    let err = interp.eval("lset l 5 X").expect_err("index past end");
    assert!(err.message().contains("out of range"), "got: {err}");
}

#[test]
fn linsert_and_lreplace() {
    assert_eq!(eval("linsert {a b c} 1 X Y"), "a X Y b c");
    assert_eq!(eval("linsert {a b} end Z"), "a Z b");
    assert_eq!(eval("lreplace {a b c d} 1 2 X"), "a X d");
    assert_eq!(eval("lreplace {a b c} 1 0 X"), "a X b c");
    assert_eq!(eval("lreplace {a b c} 0 end"), "");
}

#[test]
fn lrepeat_and_lreverse() {
    assert_eq!(eval("lrepeat 3 a b"), "a b a b a b");
    assert_eq!(eval("lrepeat 0 a"), "");
    assert_eq!(eval("lreverse {1 2 3}"), "3 2 1");
}

#[test]
fn lsort_modes() {
    assert_eq!(eval("lsort {b c a}"), "a b c");
    assert_eq!(eval("lsort -integer {10 9 2}"), "2 9 10");
    assert_eq!(eval("lsort -real {1.5 0.3 2.0}"), "0.3 1.5 2.0");
    assert_eq!(eval("lsort -decreasing {a c b}"), "c b a");
    assert_eq!(eval("lsort -unique {b a b c a}"), "a b c");
    assert_eq!(eval("lsort -nocase {B a C}"), "a B C");
}

#[test]
fn lsearch_modes() {
    assert_eq!(eval("lsearch {a b c} b"), "1");
    assert_eq!(eval("lsearch {a b c} z"), "-1");
    assert_eq!(eval("lsearch -exact {a* b} a*"), "0");
    assert_eq!(eval("lsearch -all {a b a} a"), "0 2");
    assert_eq!(eval("lsearch -inline {aa bb} b*"), "bb");
    assert_eq!(eval("lsearch -all -inline -not {a b a} a"), "b");
    assert_eq!(eval("lsearch -regexp {foo bar} ^b"), "1");
}

#[test]
fn lassign_assigns_and_returns_leftover() {
    assert_eq!(eval("lassign {1 2 3 4} a b; list $a $b"), "1 2");
    assert_eq!(eval("lassign {1 2 3 4} a b"), "3 4");
    assert_eq!(eval("lassign {1} a b; list $a $b"), "1 {}");
}

#[test]
fn split_join_and_concat() {
    assert_eq!(eval("split a,b,c ,"), "a b c");
    assert_eq!(eval("split {a b}"), "a b");
    assert_eq!(eval("split abc {}"), "a b c");
    assert_eq!(eval("split a,,b ,"), "a {} b");
    assert_eq!(eval("join {a b c} -"), "a-b-c");
    assert_eq!(eval("join {{1 2} 3}"), "1 2 3");
    assert_eq!(eval("concat a {b c} {} d"), "a b c d");
}

// =============================================================================
// 2. dicts
// =============================================================================

#[test]
fn dict_round_trip() {
    assert_eq!(eval("dict get [dict set D k v] k"), "v");
    assert_eq!(eval("dict get [dict create a 1 b 2] b"), "2");
}

#[test]
fn dict_keys_preserve_insertion_order() {
    assert_eq!(eval("dict keys [dict create z 1 a 2 m 3]"), "z a m");
    assert_eq!(
        eval("set d [dict create z 1 a 2]; dict set d z 9; dict keys $d"),
        "z a"
    );
    assert_eq!(eval("dict values [dict create a 1 b 2]"), "1 2");
}

#[test]
fn dict_missing_key_errors() {
    let mut interp = Interp::new();
    let err = interp
        .eval("dict get {a 1} nope")
        .expect_err("missing key must fail");
    assert_eq!(err.message(), "key \"nope\" not known in dictionary");
}

#[test]
fn dict_exists_and_size() {
    assert_eq!(eval("dict exists {a 1 b 2} a"), "1");
    assert_eq!(eval("dict exists {a 1} z"), "0");
    assert_eq!(eval("dict size {a 1 b 2}"), "2");
    assert_eq!(eval("dict size {}"), "0");
}

#[test]
fn dict_nested_paths() {
    assert_eq!(eval("set d {}; dict set d outer inner 42; dict get $d outer inner"), "42");
    assert_eq!(
        eval("set d {}; dict set d o i 1; dict unset d o i; dict exists $d o i"),
        "0"
    );
    assert_eq!(eval("dict exists {o {i 5}} o i"), "1");
}

#[test]
fn dict_for_iterates_in_order() {
    assert_eq!(
        eval("set out {}; dict for {k v} {a 1 b 2 c 3} { lappend out $k=$v }; set out"),
        "a=1 b=2 c=3"
    );
    assert_eq!(
        eval("set out {}; dict for {k v} {a 1 b 2 c 3} { if {$k eq \"b\"} break; lappend out $k }; set out"),
        "a"
    );
}

#[test]
fn dict_merge_later_wins() {
    assert_eq!(eval("dict merge {a 1 b 2} {b 9 c 3}"), "a 1 b 9 c 3");
}

#[test]
fn dict_with_binds_and_writes_back() {
    assert_eq!(
        eval("set d {x 1 y 2}; dict with d { incr x 10 }; dict get $d x"),
        "11"
    );
}

#[test]
fn dict_incr_append_lappend() {
    assert_eq!(eval("set d {n 5}; dict incr d n 3; dict get $d n"), "8");
    assert_eq!(eval("set d {}; dict incr d fresh; dict get $d fresh"), "1");
    assert_eq!(eval("set d {s ab}; dict append d s cd; dict get $d s"), "abcd");
    assert_eq!(eval("set d {l {1 2}}; dict lappend d l 3; dict get $d l"), "1 2 3");
}

#[test]
fn dict_value_semantics_are_preserved() {
    // editing a copy must not alias the original variable's value
    assert_eq!(
        eval("set a {k 1}; set b $a; dict set b k 2; list [dict get $a k] [dict get $b k]"),
        "1 2"
    );
}

#[test]
fn malformed_dict_errors() {
    let mut interp = Interp::new();
    let err = interp.eval("dict get {a 1 b} a").expect_err("odd element count");
    assert!(err.message().contains("missing value"), "got: {err}");
}
