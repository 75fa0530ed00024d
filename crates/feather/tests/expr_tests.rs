//! The expression evaluator: coercion rules, the precedence ladder,
//! short-circuiting, math functions, and arithmetic edge cases.

use feather::Interp;

fn eval(script: &str) -> String {
    Interp::new().eval(script).unwrap_or_else(|e| panic!("script failed: {e}\n{script}"))
}

fn expr(text: &str) -> String {
    eval(&format!("expr {{{text}}}"))
}

// =============================================================================
// 1. arithmetic
// =============================================================================

#[test]
fn integer_arithmetic() {
    assert_eq!(expr("1 + 2 * 3"), "7");
    assert_eq!(expr("(1 + 2) * 3"), "9");
    assert_eq!(expr("7 / 2"), "3");
    assert_eq!(expr("7 % 3"), "1");
    assert_eq!(expr("2 ** 10"), "1024");
}

#[test]
fn division_truncates_toward_negative_infinity() {
    assert_eq!(expr("-7 / 2"), "-4");
    assert_eq!(expr("-7 % 2"), "1");
    assert_eq!(expr("7 / -2"), "-4");
    assert_eq!(expr("7 % -2"), "-1");
}

#[test]
fn mixed_arithmetic_widens_to_double() {
    assert_eq!(expr("1 + 2.5"), "3.5");
    assert_eq!(expr("1 / 2.0"), "0.5");
    assert_eq!(expr("2.0 ** 3"), "8.0");
}

#[test]
fn integer_overflow_wraps() {
    assert_eq!(expr("9223372036854775807 + 1"), "-9223372036854775808");
    assert_eq!(expr("-9223372036854775808 - 1"), "9223372036854775807");
}

#[test]
fn division_by_integer_zero_errors() {
    let mut interp = Interp::new();
    let err = interp.eval("expr {1 / 0}").expect_err("div by zero");
    assert_eq!(err.message(), "divide by zero");
    assert!(err.error_code().starts_with("ARITH DIVZERO"), "got: {}", err.error_code());
    let err = interp.eval("expr {1 % 0}").expect_err("mod by zero");
    assert_eq!(err.message(), "divide by zero");
}

#[test]
fn float_division_by_zero_is_inf_or_nan() {
    assert_eq!(expr("1.0 / 0.0"), "Inf");
    assert_eq!(expr("-1.0 / 0.0"), "-Inf");
    assert_eq!(expr("isnan(0.0 / 0.0)"), "1");
}

#[test]
fn unary_operators() {
    assert_eq!(expr("-5"), "-5");
    assert_eq!(expr("- -5"), "5");
    assert_eq!(expr("+7"), "7");
    assert_eq!(expr("!0"), "1");
    assert_eq!(expr("!5"), "0");
    assert_eq!(expr("~0"), "-1");
}

#[test]
fn power_binds_tighter_than_unary_minus() {
    assert_eq!(expr("-2 ** 2"), "-4");
    assert_eq!(expr("2 ** 3 ** 2"), "512");
}

#[test]
fn radix_literals() {
    assert_eq!(expr("0xff"), "255");
    assert_eq!(expr("0o17"), "15");
    assert_eq!(expr("0b101 + 1"), "6");
}

// =============================================================================
// 2. bit operations and shifts
// =============================================================================

#[test]
fn bit_operations() {
    assert_eq!(expr("6 & 3"), "2");
    assert_eq!(expr("6 | 3"), "7");
    assert_eq!(expr("6 ^ 3"), "5");
    assert_eq!(expr("1 << 4"), "16");
    assert_eq!(expr("16 >> 2"), "4");
    assert_eq!(expr("-1 >> 1"), "-1");
}

#[test]
fn bit_operations_reject_doubles() {
    let mut interp = Interp::new();
    let err = interp.eval("expr {1.5 & 1}").expect_err("float bitand");
    assert!(
        err.message().contains("can't use floating-point value"),
        "got: {err}"
    );
}

// =============================================================================
// 3. comparisons and string operators
// =============================================================================

#[test]
fn numeric_vs_lexical_comparison() {
    assert_eq!(expr("5 == 5.0"), "1");
    assert_eq!(expr("10 > 9"), "1");
    // both operands non-numeric: lexical ordering applies
    assert_eq!(eval("set a abc; set b abd; expr {$a < $b}"), "1");
    assert_eq!(eval("set a 10; set b 9; expr {$a > $b}"), "1");
}

#[test]
fn eq_ne_are_string_comparisons() {
    assert_eq!(expr("\"1\" eq \"1.0\""), "0");
    assert_eq!(expr("1 == 1.0"), "1");
    assert_eq!(eval("set x abc; expr {$x eq \"abc\"}"), "1");
    assert_eq!(eval("set x abc; expr {$x ne \"abd\"}"), "1");
}

#[test]
fn in_and_ni_test_list_membership() {
    assert_eq!(eval("set l {a b c}; expr {\"b\" in $l}"), "1");
    assert_eq!(eval("set l {a b c}; expr {\"z\" in $l}"), "0");
    assert_eq!(eval("set l {a b c}; expr {\"z\" ni $l}"), "1");
}

// =============================================================================
// 4. boolean protocol and lazy evaluation
// =============================================================================

#[test]
fn boolean_words() {
    assert_eq!(expr("true && 1"), "1");
    assert_eq!(expr("off || 0"), "0");
    assert_eq!(eval("set f no; expr {$f || 1}"), "1");
}

#[test]
fn logical_operators_normalize_to_zero_one() {
    assert_eq!(expr("3 && 2"), "1");
    assert_eq!(expr("0 || 7"), "1");
}

#[test]
fn short_circuit_skips_side_effects() {
    // the command substitution in the untaken branch must not run
    assert_eq!(eval("set hits 0; expr {1 || [incr hits]}; set hits"), "0");
    assert_eq!(eval("set hits 0; expr {0 && [incr hits]}; set hits"), "0");
    assert_eq!(eval("set hits 0; expr {0 ? [incr hits] : 5}; set hits"), "0");
}

#[test]
fn ternary_selects_branch() {
    assert_eq!(expr("1 ? \"yes\" : \"no\""), "yes");
    assert_eq!(expr("0 ? \"yes\" : \"no\""), "no");
    assert_eq!(expr("1 ? 0 ? \"a\" : \"b\" : \"c\""), "b");
}

// =============================================================================
// 5. substitutions inside expressions
// =============================================================================

#[test]
fn variables_and_commands_as_operands() {
    assert_eq!(eval("set x 4; expr {$x * $x}"), "16");
    assert_eq!(eval("expr {[string length hello] + 1}"), "6");
    assert_eq!(eval("set s abc; expr {\"x$s\" eq \"xabc\"}"), "1");
}

#[test]
fn expr_concatenates_multiple_arguments() {
    assert_eq!(eval("expr 1 + 2"), "3");
}

#[test]
fn expr_idempotence() {
    assert_eq!(eval("expr {[expr {3 + 4}]}"), "7");
}

#[test]
fn non_numeric_operand_errors() {
    let mut interp = Interp::new();
    interp.eval("set s pear").unwrap();
    let err = interp.eval("expr {$s + 1}").expect_err("non-numeric operand");
    assert!(
        err.message().contains("can't use non-numeric string"),
        "got: {err}"
    );
}

// =============================================================================
// 6. math functions
// =============================================================================

#[test]
fn basic_functions() {
    assert_eq!(expr("abs(-5)"), "5");
    assert_eq!(expr("abs(-2.5)"), "2.5");
    assert_eq!(expr("sqrt(9)"), "3.0");
    assert_eq!(expr("ceil(1.2)"), "2.0");
    assert_eq!(expr("floor(1.8)"), "1.0");
    assert_eq!(expr("round(2.5)"), "3");
    assert_eq!(expr("round(-2.5)"), "-3");
    assert_eq!(expr("int(3.9)"), "3");
    assert_eq!(expr("int(-3.9)"), "-3");
    assert_eq!(expr("double(2)"), "2.0");
    assert_eq!(expr("wide(7.1)"), "7");
}

#[test]
fn two_argument_functions() {
    assert_eq!(expr("pow(2, 10)"), "1024.0");
    assert_eq!(expr("fmod(7.5, 2)"), "1.5");
    assert_eq!(expr("hypot(3, 4)"), "5.0");
    assert_eq!(expr("atan2(0, 1)"), "0.0");
}

#[test]
fn transcendental_functions() {
    assert_eq!(expr("exp(0)"), "1.0");
    assert_eq!(expr("log(1)"), "0.0");
    assert_eq!(expr("log10(100)"), "2.0");
    assert_eq!(expr("sin(0)"), "0.0");
    assert_eq!(expr("cos(0)"), "1.0");
    assert_eq!(expr("isinf(1.0 / 0.0)"), "1");
    assert_eq!(expr("isnan(1.0)"), "0");
}

#[test]
fn domain_errors() {
    let mut interp = Interp::new();
    for bad in ["sqrt(-1)", "log(0)", "asin(2)", "fmod(1, 0)"] {
        let err = interp
            .eval(&format!("expr {{{bad}}}"))
            .expect_err("domain error expected");
        assert_eq!(err.message(), "domain error: argument not in valid range");
    }
}

#[test]
fn unknown_function_errors() {
    let mut interp = Interp::new();
    let err = interp.eval("expr {frobnicate(1)}").expect_err("unknown function");
    assert_eq!(err.message(), "unknown math function \"frobnicate\"");
}
