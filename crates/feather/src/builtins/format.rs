//! `format` and `scan`: printf/scanf-style conversion with the
//! `%d %i %x %o %b %c %s %f %e %g %%` specifiers plus width, precision,
//! and the `- + space 0 #` flags.

use crate::{
    error::FeatherError,
    eval::Evaluator,
    handle::ValueId,
    host::HostOps,
    number,
    status::FlowResult,
};

use super::check_arity;

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

pub(super) fn format_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "format formatString ?arg ...?")?;
    let fmt = ev.value_text(argv[1]);
    let args = &argv[2..];
    let mut next_arg = 0usize;
    let mut take = || -> Result<ValueId, FeatherError> {
        let value = args
            .get(next_arg)
            .copied()
            .ok_or_else(|| FeatherError::new("not enough arguments for all format specifiers"))?;
        next_arg += 1;
        Ok(value)
    };

    let mut out = String::new();
    let bytes = fmt.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            let c = fmt[i..].chars().next().unwrap_or('\0');
            out.push(c);
            i += c.len_utf8().max(1);
            continue;
        }
        i += 1;
        if i >= bytes.len() {
            return Err(FeatherError::new("format string ended in middle of field specifier").into());
        }
        if bytes[i] == b'%' {
            out.push('%');
            i += 1;
            continue;
        }

        let mut spec = Spec::default();
        while i < bytes.len() {
            match bytes[i] {
                b'-' => spec.minus = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'0' => spec.zero = true,
                b'#' => spec.alt = true,
                _ => break,
            }
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'*' {
            let arg = take()?;
            let w = ev.want_int(arg)?;
            if w < 0 {
                spec.minus = true;
                spec.width = Some(w.unsigned_abs() as usize);
            } else {
                spec.width = Some(w as usize);
            }
            i += 1;
        } else {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                spec.width = fmt[start..i].parse().ok();
            }
        }
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            if i < bytes.len() && bytes[i] == b'*' {
                let arg = take()?;
                let p = ev.want_int(arg)?.max(0);
                spec.precision = Some(p as usize);
                i += 1;
            } else {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                spec.precision = Some(fmt[start..i].parse().unwrap_or(0));
            }
        }
        if i >= bytes.len() {
            return Err(FeatherError::new("format string ended in middle of field specifier").into());
        }
        let conversion = bytes[i] as char;
        i += 1;

        match conversion {
            'd' | 'i' => {
                let arg = take()?;
                let v = ev.want_int(arg)?;
                out.push_str(&pad_signed(&v.unsigned_abs().to_string(), v < 0, spec));
            }
            'u' => {
                let arg = take()?;
                let v = ev.want_int(arg)?;
                out.push_str(&pad_unsigned(&(v as u64).to_string(), spec));
            }
            'x' => {
                let arg = take()?;
                let v = ev.want_int(arg)? as u64;
                let body = format!("{v:x}");
                let body = if spec.alt && v != 0 { format!("0x{body}") } else { body };
                out.push_str(&pad_unsigned(&body, spec));
            }
            'X' => {
                let arg = take()?;
                let v = ev.want_int(arg)? as u64;
                let body = format!("{v:X}");
                let body = if spec.alt && v != 0 { format!("0X{body}") } else { body };
                out.push_str(&pad_unsigned(&body, spec));
            }
            'o' => {
                let arg = take()?;
                let v = ev.want_int(arg)? as u64;
                let body = format!("{v:o}");
                let body = if spec.alt && v != 0 { format!("0{body}") } else { body };
                out.push_str(&pad_unsigned(&body, spec));
            }
            'b' => {
                let arg = take()?;
                let v = ev.want_int(arg)? as u64;
                out.push_str(&pad_unsigned(&format!("{v:b}"), spec));
            }
            'c' => {
                let arg = take()?;
                let v = ev.want_int(arg)?;
                let c = u32::try_from(v)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or('\u{fffd}');
                out.push_str(&pad_text(&c.to_string(), spec));
            }
            's' => {
                let arg = take()?;
                let mut text = ev.value_text(arg);
                if let Some(p) = spec.precision {
                    text = text.chars().take(p).collect();
                }
                out.push_str(&pad_text(&text, spec));
            }
            'f' => {
                let arg = take()?;
                let v = want_double(ev, arg)?;
                let p = spec.precision.unwrap_or(6);
                out.push_str(&pad_signed(&format!("{:.p$}", v.abs()), v.is_sign_negative(), spec));
            }
            'e' | 'E' => {
                let arg = take()?;
                let v = want_double(ev, arg)?;
                let p = spec.precision.unwrap_or(6);
                let body = c_style_exponent(v.abs(), p, conversion == 'E');
                out.push_str(&pad_signed(&body, v.is_sign_negative(), spec));
            }
            'g' | 'G' => {
                let arg = take()?;
                let v = want_double(ev, arg)?;
                let p = spec.precision.unwrap_or(6).max(1);
                let body = g_style(v.abs(), p, conversion == 'G');
                out.push_str(&pad_signed(&body, v.is_sign_negative(), spec));
            }
            other => {
                return Err(FeatherError::new(format!(
                    "bad field specifier \"{other}\""
                ))
                .into());
            }
        }
    }
    Ok(ev.intern(&out))
}

fn want_double<H: HostOps>(ev: &mut Evaluator<'_, H>, value: ValueId) -> Result<f64, FeatherError> {
    ev.host.double_value(ev.interp, value).ok_or_else(|| {
        let text = ev.host.str_value(ev.interp, value);
        FeatherError::expected("floating-point number", &text)
    })
}

/// Lays out a non-negative body with sign handling, zero padding, and
/// justification.
fn pad_signed(body: &str, negative: bool, spec: Spec) -> String {
    let sign = if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };
    let content_len = sign.len() + body.chars().count();
    let width = spec.width.unwrap_or(0);
    if content_len >= width {
        return format!("{sign}{body}");
    }
    let fill = width - content_len;
    if spec.minus {
        format!("{sign}{body}{}", " ".repeat(fill))
    } else if spec.zero {
        format!("{sign}{}{body}", "0".repeat(fill))
    } else {
        format!("{}{sign}{body}", " ".repeat(fill))
    }
}

fn pad_unsigned(body: &str, spec: Spec) -> String {
    pad_signed(body, false, Spec { plus: false, space: false, ..spec })
}

fn pad_text(text: &str, spec: Spec) -> String {
    let len = text.chars().count();
    let width = spec.width.unwrap_or(0);
    if len >= width {
        return text.to_owned();
    }
    let fill = " ".repeat(width - len);
    if spec.minus {
        format!("{text}{fill}")
    } else {
        format!("{fill}{text}")
    }
}

/// C-style `%e`: mantissa with fixed precision and a signed two-digit
/// exponent.
fn c_style_exponent(v: f64, precision: usize, upper: bool) -> String {
    if v == 0.0 {
        let mantissa = format!("{:.precision$}", 0.0);
        return format!("{mantissa}{}+00", if upper { "E" } else { "e" });
    }
    let exp = v.abs().log10().floor() as i32;
    let mantissa = v / 10f64.powi(exp);
    // log10 rounding at decade boundaries can leave the mantissa outside
    // [1, 10); renormalize.
    let (mantissa, exp) = if mantissa >= 10.0 {
        (mantissa / 10.0, exp + 1)
    } else if mantissa < 1.0 {
        (mantissa * 10.0, exp - 1)
    } else {
        (mantissa, exp)
    };
    let e = if upper { "E" } else { "e" };
    let sign = if exp < 0 { "-" } else { "+" };
    format!("{mantissa:.precision$}{e}{sign}{:02}", exp.abs())
}

/// C-style `%g`: exponent form for very small/large magnitudes, fixed form
/// otherwise, trailing zeros trimmed.
fn g_style(v: f64, precision: usize, upper: bool) -> String {
    if v == 0.0 {
        return "0".to_owned();
    }
    let exp = v.abs().log10().floor() as i32;
    let text = if exp < -4 || exp >= precision as i32 {
        let s = c_style_exponent(v, precision.saturating_sub(1), upper);
        trim_exponent_zeros(&s)
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        let s = format!("{v:.decimals$}");
        trim_fixed_zeros(&s)
    };
    text
}

fn trim_fixed_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_owned();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_owned()
}

fn trim_exponent_zeros(s: &str) -> String {
    let Some(e_at) = s.find(['e', 'E']) else {
        return s.to_owned();
    };
    let (mantissa, exponent) = s.split_at(e_at);
    format!("{}{}", trim_fixed_zeros(mantissa), exponent)
}

// --- scan ---------------------------------------------------------------

pub(super) fn scan_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, None, "scan string format ?varName ...?")?;
    let input = ev.value_text(argv[1]);
    let fmt = ev.value_text(argv[2]);
    let var_names: Vec<String> = argv[3..].iter().map(|&v| ev.value_text(v)).collect();

    let mut values: Vec<String> = Vec::new();
    let in_bytes = input.as_bytes();
    let fmt_bytes = fmt.as_bytes();
    let mut ip = 0usize;
    let mut fp = 0usize;
    let mut hit_end_early = false;

    while fp < fmt_bytes.len() {
        let fc = fmt_bytes[fp];
        if fc != b'%' {
            if fc.is_ascii_whitespace() {
                while ip < in_bytes.len() && in_bytes[ip].is_ascii_whitespace() {
                    ip += 1;
                }
                fp += 1;
                continue;
            }
            if ip < in_bytes.len() && in_bytes[ip] == fc {
                ip += 1;
                fp += 1;
                continue;
            }
            break;
        }
        fp += 1;
        if fp >= fmt_bytes.len() {
            break;
        }
        if fmt_bytes[fp] == b'%' {
            while ip < in_bytes.len() && in_bytes[ip].is_ascii_whitespace() {
                ip += 1;
            }
            if ip < in_bytes.len() && in_bytes[ip] == b'%' {
                ip += 1;
                fp += 1;
                continue;
            }
            break;
        }
        let suppress = fmt_bytes[fp] == b'*';
        if suppress {
            fp += 1;
        }
        let mut width: Option<usize> = None;
        let ws = fp;
        while fp < fmt_bytes.len() && fmt_bytes[fp].is_ascii_digit() {
            fp += 1;
        }
        if fp > ws {
            width = fmt[ws..fp].parse().ok();
        }
        if fp >= fmt_bytes.len() {
            break;
        }
        let conversion = fmt_bytes[fp] as char;
        fp += 1;

        if conversion != 'c' {
            while ip < in_bytes.len() && in_bytes[ip].is_ascii_whitespace() {
                ip += 1;
            }
        }
        if ip >= in_bytes.len() {
            hit_end_early = true;
            break;
        }

        let limit = width.map_or(in_bytes.len() - ip, |w| w.min(in_bytes.len() - ip));
        let window = &input[ip..ip + limit];
        let scanned: Option<(String, usize)> = match conversion {
            'd' => scan_integer(window, 10, false),
            'i' => scan_integer(window, 10, true),
            'x' => scan_integer(window, 16, false),
            'o' => scan_integer(window, 8, false),
            'b' => scan_integer(window, 2, false),
            'c' => window.chars().next().map(|c| ((c as u32).to_string(), c.len_utf8())),
            's' => {
                let end = window
                    .find(|c: char| c.is_ascii_whitespace())
                    .unwrap_or(window.len());
                if end == 0 {
                    None
                } else {
                    Some((window[..end].to_owned(), end))
                }
            }
            'f' | 'e' | 'g' => scan_double(window),
            other => {
                return Err(FeatherError::new(format!(
                    "bad scan conversion character \"{other}\""
                ))
                .into());
            }
        };
        match scanned {
            Some((value, used)) => {
                ip += used;
                if !suppress {
                    values.push(value);
                }
            }
            None => break,
        }
    }

    if var_names.is_empty() {
        return Ok(ev.make_str_list(&values));
    }
    let assigned = values.len().min(var_names.len());
    for (name, value) in var_names.iter().zip(values.iter()) {
        let handle = ev.intern(value);
        ev.var_write(name, handle)?;
    }
    if assigned == 0 && hit_end_early {
        return Ok(ev.int(-1));
    }
    Ok(ev.int(assigned as i64))
}

/// Scans a signed integer prefix in `radix`; `detect` honors 0x/0o/0b.
fn scan_integer(window: &str, radix: u32, detect: bool) -> Option<(String, usize)> {
    let bytes = window.as_bytes();
    let mut i = 0;
    let negative = match bytes.first() {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };
    let mut radix = radix;
    if detect && bytes[i..].len() >= 2 && bytes[i] == b'0' {
        match bytes[i + 1] {
            b'x' | b'X' => {
                radix = 16;
                i += 2;
            }
            b'o' | b'O' => {
                radix = 8;
                i += 2;
            }
            b'b' | b'B' => {
                radix = 2;
                i += 2;
            }
            _ => {}
        }
    }
    let start = i;
    let mut value: i64 = 0;
    while i < bytes.len() {
        let Some(digit) = (bytes[i] as char).to_digit(radix) else {
            break;
        };
        value = value
            .wrapping_mul(i64::from(radix))
            .wrapping_add(i64::from(digit));
        i += 1;
    }
    if i == start {
        return None;
    }
    if negative {
        value = value.wrapping_neg();
    }
    Some((value.to_string(), i))
}

/// Scans the longest valid double prefix.
fn scan_double(window: &str) -> Option<(String, usize)> {
    let bytes = window.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i == digits_start {
        return None;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j + 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let text = &window[..i];
    let value: f64 = text.parse().ok()?;
    Some((number::format_double(value), i))
}
