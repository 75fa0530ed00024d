//! Numeric syntax shared by the expression evaluator, the built-ins, and
//! host shimmering.
//!
//! Hosts are expected to recognize exactly this grammar when converting
//! string forms to integers and doubles, so the same text parses the same
//! way on both sides of the ABI.

/// A number read from a string form: either a 64-bit integer or a double.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Double(f64),
}

/// Parses an integer with optional sign and `0x`/`0o`/`0b` radix prefixes.
///
/// Surrounding ASCII whitespace is ignored. Magnitudes up to 2^64-1 are
/// accepted and wrap into the i64 domain (two's complement), matching the
/// modulo-2^64 arithmetic model; anything larger is rejected.
#[must_use]
pub fn parse_integer(text: &str) -> Option<i64> {
    let s = text.trim_matches(|c: char| c.is_ascii_whitespace());
    if s.is_empty() {
        return None;
    }
    let (neg, rest) = match s.as_bytes()[0] {
        b'+' => (false, &s[1..]),
        b'-' => (true, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match rest.as_bytes() {
        [b'0', b'x' | b'X', ..] => (16, &rest[2..]),
        [b'0', b'o' | b'O', ..] => (8, &rest[2..]),
        [b'0', b'b' | b'B', ..] => (2, &rest[2..]),
        _ => (10, rest),
    };
    if digits.is_empty() {
        return None;
    }
    let mut magnitude: u64 = 0;
    for b in digits.bytes() {
        let digit = (b as char).to_digit(radix)?;
        magnitude = magnitude
            .checked_mul(u64::from(radix))?
            .checked_add(u64::from(digit))?;
    }
    Some(if neg {
        (magnitude as i64).wrapping_neg()
    } else {
        magnitude as i64
    })
}

/// Parses a double, accepting the usual decimal/exponent forms plus the
/// case-insensitive spellings `Inf`, `Infinity`, and `NaN`.
#[must_use]
pub fn parse_double(text: &str) -> Option<f64> {
    let s = text.trim_matches(|c: char| c.is_ascii_whitespace());
    if s.is_empty() {
        return None;
    }
    // Reject forms Rust accepts but Tcl's number grammar does not.
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    if body.is_empty() {
        return None;
    }
    let lower = body.to_ascii_lowercase();
    if lower == "inf" || lower == "infinity" || lower == "nan" {
        return s.parse().ok();
    }
    if !body.bytes().next().is_some_and(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    s.parse().ok()
}

/// Reads a string form as a number, preferring the integer interpretation.
#[must_use]
pub fn parse_number(text: &str) -> Option<Num> {
    if let Some(i) = parse_integer(text) {
        return Some(Num::Int(i));
    }
    parse_double(text).map(Num::Double)
}

/// The boolean protocol: any nonzero number is true, `0` (and `0.0`) false;
/// otherwise the words `true`/`yes`/`on` and `false`/`no`/`off`
/// (case-insensitive). Everything else is not a boolean.
#[must_use]
pub fn parse_boolean(text: &str) -> Option<bool> {
    if let Some(num) = parse_number(text) {
        return Some(match num {
            Num::Int(i) => i != 0,
            Num::Double(d) => d != 0.0,
        });
    }
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Whether the string form reads as a number at all.
#[must_use]
pub fn is_numeric(text: &str) -> bool {
    parse_number(text).is_some()
}

/// Canonical string form of a double: shortest round-trip representation,
/// always containing a `.` or exponent so it re-reads as a double, with
/// `Inf`/`NaN` spelled the way the expression grammar reads them back.
#[must_use]
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-Inf" } else { "Inf" }.to_owned();
    }
    let mut buffer = ryu::Buffer::new();
    buffer.format(value).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_radix_prefixes() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer(" -7 "), Some(-7));
        assert_eq!(parse_integer("0x1A"), Some(26));
        assert_eq!(parse_integer("0o17"), Some(15));
        assert_eq!(parse_integer("0b101"), Some(5));
        assert_eq!(parse_integer("+0X10"), Some(16));
    }

    #[test]
    fn integer_rejects_junk() {
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("12ab"), None);
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_integer("0x"), None);
        assert_eq!(parse_integer("--3"), None);
    }

    #[test]
    fn integer_wraps_at_64_bits() {
        // 2^63 wraps to i64::MIN; 2^64-1 wraps to -1.
        assert_eq!(parse_integer("9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_integer("18446744073709551615"), Some(-1));
        assert_eq!(parse_integer("18446744073709551616"), None);
        assert_eq!(parse_integer("-9223372036854775808"), Some(i64::MIN));
    }

    #[test]
    fn double_forms() {
        assert_eq!(parse_double("1.5"), Some(1.5));
        assert_eq!(parse_double(".5"), Some(0.5));
        assert_eq!(parse_double("2e3"), Some(2000.0));
        assert_eq!(parse_double("-1E-2"), Some(-0.01));
        assert_eq!(parse_double("Inf"), Some(f64::INFINITY));
        assert!(parse_double("nan").is_some_and(f64::is_nan));
        assert_eq!(parse_double("1.5x"), None);
        assert_eq!(parse_double("e5"), None);
    }

    #[test]
    fn boolean_protocol() {
        assert_eq!(parse_boolean("1"), Some(true));
        assert_eq!(parse_boolean("0"), Some(false));
        assert_eq!(parse_boolean("0.0"), Some(false));
        assert_eq!(parse_boolean("42"), Some(true));
        assert_eq!(parse_boolean("TRUE"), Some(true));
        assert_eq!(parse_boolean("off"), Some(false));
        assert_eq!(parse_boolean("Yes"), Some(true));
        assert_eq!(parse_boolean("maybe"), None);
    }

    #[test]
    fn double_formatting_round_trips() {
        assert_eq!(format_double(1.0), "1.0");
        assert_eq!(format_double(0.1), "0.1");
        assert_eq!(format_double(f64::INFINITY), "Inf");
        assert_eq!(format_double(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_double(f64::NAN), "NaN");
        let text = format_double(1.0 / 3.0);
        assert_eq!(text.parse::<f64>().unwrap(), 1.0 / 3.0);
    }
}
