//! The `string` ensemble and the `subst` command. Index-based subcommands
//! operate on characters, not bytes.

use crate::{
    error::FeatherError,
    eval::Evaluator,
    handle::ValueId,
    host::HostOps,
    list,
    number,
    parse::{self, ConstructScan, DollarScan},
    status::{FlowResult, Unwind},
};

use super::{bad_subcommand, check_arity};

const SUBCOMMANDS: &[&str] = &[
    "cat", "compare", "equal", "first", "index", "is", "last", "length", "map", "match", "range",
    "repeat", "replace", "reverse", "tolower", "toupper", "trim", "trimleft", "trimright",
];

pub(super) fn string_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "string subcommand ?arg ...?")?;
    let sub = ev.value_text(argv[1]);
    match sub.as_str() {
        "length" => length(ev, argv),
        "index" => index(ev, argv),
        "range" => range(ev, argv),
        "equal" => compare_driver(ev, argv, true),
        "compare" => compare_driver(ev, argv, false),
        "match" => match_cmd(ev, argv),
        "map" => map(ev, argv),
        "tolower" => case_map(ev, argv, true),
        "toupper" => case_map(ev, argv, false),
        "trim" => trim(ev, argv, true, true),
        "trimleft" => trim(ev, argv, true, false),
        "trimright" => trim(ev, argv, false, true),
        "replace" => replace(ev, argv),
        "first" => first(ev, argv),
        "last" => last(ev, argv),
        "reverse" => reverse(ev, argv),
        "cat" => cat(ev, argv),
        "repeat" => repeat(ev, argv),
        "is" => is_class(ev, argv),
        other => Err(bad_subcommand(other, SUBCOMMANDS).into()),
    }
}

fn length<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(3), "string length string")?;
    let text = ev.value_text(argv[2]);
    Ok(ev.int(text.chars().count() as i64))
}

fn index<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, Some(4), "string index string charIndex")?;
    let text = ev.value_text(argv[2]);
    let chars: Vec<char> = text.chars().collect();
    let index_text = ev.value_text(argv[3]);
    let idx = list::parse_index(&index_text, chars.len())?;
    if idx < 0 || idx as usize >= chars.len() {
        return Ok(ev.empty());
    }
    Ok(ev.intern(&chars[idx as usize].to_string()))
}

fn range<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 5, Some(5), "string range string first last")?;
    let text = ev.value_text(argv[2]);
    let chars: Vec<char> = text.chars().collect();
    let first_text = ev.value_text(argv[3]);
    let last_text = ev.value_text(argv[4]);
    let first = list::parse_index(&first_text, chars.len())?.max(0) as usize;
    let last = list::parse_index(&last_text, chars.len())?.min(chars.len() as i64 - 1);
    if last < first as i64 {
        return Ok(ev.empty());
    }
    let slice: String = chars[first..=last as usize].iter().collect();
    Ok(ev.intern(&slice))
}

fn compare_driver<H: HostOps>(
    ev: &mut Evaluator<'_, H>,
    argv: &[ValueId],
    equality: bool,
) -> FlowResult {
    let usage = if equality {
        "string equal ?-nocase? ?-length length? string1 string2"
    } else {
        "string compare ?-nocase? ?-length length? string1 string2"
    };
    check_arity(argv, 4, None, usage)?;
    let mut nocase = false;
    let mut length: Option<usize> = None;
    let mut i = 2;
    while i < argv.len() - 2 {
        let option = ev.value_text(argv[i]);
        match option.as_str() {
            "-nocase" => {
                nocase = true;
                i += 1;
            }
            "-length" => {
                if i + 1 >= argv.len() - 2 {
                    return Err(FeatherError::wrong_num_args(usage).into());
                }
                let n = ev.want_int(argv[i + 1])?;
                length = if n < 0 { None } else { Some(n as usize) };
                i += 2;
            }
            other => {
                return Err(FeatherError::new(format!(
                    "bad option \"{other}\": must be -nocase or -length"
                ))
                .into());
            }
        }
    }
    if argv.len() - i != 2 {
        return Err(FeatherError::wrong_num_args(usage).into());
    }
    let mut a = ev.value_text(argv[i]);
    let mut b = ev.value_text(argv[i + 1]);
    if nocase {
        a = a.to_lowercase();
        b = b.to_lowercase();
    }
    if let Some(n) = length {
        a = a.chars().take(n).collect();
        b = b.chars().take(n).collect();
    }
    if equality {
        Ok(ev.int(i64::from(a == b)))
    } else {
        let ord = a.cmp(&b) as i64;
        Ok(ev.int(ord.signum()))
    }
}

fn match_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, Some(5), "string match ?-nocase? pattern string")?;
    let mut nocase = false;
    let mut i = 2;
    if argv.len() == 5 {
        let option = ev.value_text(argv[2]);
        if option != "-nocase" {
            return Err(FeatherError::new(format!("bad option \"{option}\": must be -nocase")).into());
        }
        nocase = true;
        i = 3;
    }
    let pattern = ev.value_text(argv[i]);
    let text = ev.value_text(argv[i + 1]);
    let matched = ev.host.str_match(&pattern, &text, nocase);
    Ok(ev.int(i64::from(matched)))
}

fn map<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, Some(5), "string map ?-nocase? charMap string")?;
    let mut nocase = false;
    let mut i = 2;
    if argv.len() == 5 {
        let option = ev.value_text(argv[2]);
        if option != "-nocase" {
            return Err(FeatherError::new(format!("bad option \"{option}\": must be -nocase")).into());
        }
        nocase = true;
        i = 3;
    }
    let mapping_items = ev.list_items(argv[i])?;
    if mapping_items.len() % 2 != 0 {
        return Err(FeatherError::new("char map list unbalanced").into());
    }
    let mut mapping: Vec<(String, String)> = Vec::with_capacity(mapping_items.len() / 2);
    for pair in mapping_items.chunks_exact(2) {
        mapping.push((ev.value_text(pair[0]), ev.value_text(pair[1])));
    }
    let text = ev.value_text(argv[i + 1]);

    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    'outer: while !rest.is_empty() {
        for (from, to) in &mapping {
            if from.is_empty() {
                continue;
            }
            let matched = if nocase {
                rest.len() >= from.len()
                    && rest
                        .get(..from.len())
                        .is_some_and(|head| head.eq_ignore_ascii_case(from))
            } else {
                rest.starts_with(from.as_str())
            };
            if matched {
                out.push_str(to);
                rest = &rest[from.len()..];
                continue 'outer;
            }
        }
        let c = rest.chars().next().unwrap_or('\0');
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    Ok(ev.intern(&out))
}

fn case_map<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId], lower: bool) -> FlowResult {
    let usage = if lower {
        "string tolower string"
    } else {
        "string toupper string"
    };
    check_arity(argv, 3, Some(3), usage)?;
    let text = ev.value_text(argv[2]);
    let mapped = if lower {
        text.to_lowercase()
    } else {
        text.to_uppercase()
    };
    Ok(ev.intern(&mapped))
}

fn trim<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId], left: bool, right: bool) -> FlowResult {
    check_arity(argv, 3, Some(4), "string trim string ?chars?")?;
    let text = ev.value_text(argv[2]);
    let chars: Vec<char> = if argv.len() == 4 {
        ev.value_text(argv[3]).chars().collect()
    } else {
        vec![' ', '\t', '\n', '\r', '\x0b', '\x0c']
    };
    let trimmed = match (left, right) {
        (true, true) => text.trim_matches(|c| chars.contains(&c)),
        (true, false) => text.trim_start_matches(|c| chars.contains(&c)),
        (false, true) => text.trim_end_matches(|c| chars.contains(&c)),
        (false, false) => text.as_str(),
    };
    Ok(ev.intern(trimmed))
}

fn replace<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 5, Some(6), "string replace string first last ?string?")?;
    let text = ev.value_text(argv[2]);
    let chars: Vec<char> = text.chars().collect();
    let first_text = ev.value_text(argv[3]);
    let last_text = ev.value_text(argv[4]);
    let first = list::parse_index(&first_text, chars.len())?;
    let last = list::parse_index(&last_text, chars.len())?;
    if first > last || first as usize >= chars.len() || last < 0 {
        return Ok(ev.intern(&text));
    }
    let first = first.max(0) as usize;
    let last = (last as usize).min(chars.len() - 1);
    let mut out: String = chars[..first].iter().collect();
    if argv.len() == 6 {
        out.push_str(&ev.value_text(argv[5]));
    }
    out.extend(&chars[last + 1..]);
    Ok(ev.intern(&out))
}

fn first<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, Some(5), "string first needleString haystackString ?startIndex?")?;
    let needle = ev.value_text(argv[2]);
    let haystack = ev.value_text(argv[3]);
    let chars: Vec<char> = haystack.chars().collect();
    let start = if argv.len() == 5 {
        let text = ev.value_text(argv[4]);
        list::parse_index(&text, chars.len())?.max(0) as usize
    } else {
        0
    };
    let needle_chars: Vec<char> = needle.chars().collect();
    if needle_chars.is_empty() {
        return Ok(ev.int(-1));
    }
    let mut at = start;
    while at + needle_chars.len() <= chars.len() {
        if chars[at..at + needle_chars.len()] == needle_chars[..] {
            return Ok(ev.int(at as i64));
        }
        at += 1;
    }
    Ok(ev.int(-1))
}

fn last<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, Some(5), "string last needleString haystackString ?lastIndex?")?;
    let needle = ev.value_text(argv[2]);
    let haystack = ev.value_text(argv[3]);
    let chars: Vec<char> = haystack.chars().collect();
    let limit = if argv.len() == 5 {
        let text = ev.value_text(argv[4]);
        list::parse_index(&text, chars.len())?
    } else {
        chars.len() as i64 - 1
    };
    let needle_chars: Vec<char> = needle.chars().collect();
    if needle_chars.is_empty() || limit < 0 {
        return Ok(ev.int(-1));
    }
    let highest = (limit as usize).min(chars.len().saturating_sub(needle_chars.len()));
    for at in (0..=highest).rev() {
        if at + needle_chars.len() <= chars.len() && chars[at..at + needle_chars.len()] == needle_chars[..] {
            return Ok(ev.int(at as i64));
        }
    }
    Ok(ev.int(-1))
}

fn reverse<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, Some(3), "string reverse string")?;
    let text = ev.value_text(argv[2]);
    let reversed: String = text.chars().rev().collect();
    Ok(ev.intern(&reversed))
}

fn cat<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    let mut out = String::new();
    for &arg in &argv[2..] {
        out.push_str(&ev.value_text(arg));
    }
    Ok(ev.intern(&out))
}

fn repeat<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, Some(4), "string repeat string count")?;
    let text = ev.value_text(argv[2]);
    let count = ev.want_int(argv[3])?;
    if count <= 0 {
        return Ok(ev.empty());
    }
    Ok(ev.intern(&text.repeat(count as usize)))
}

fn is_class<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, None, "string is class ?-strict? string")?;
    let class = ev.value_text(argv[2]);
    let mut strict = false;
    let mut i = 3;
    while i < argv.len() - 1 {
        let option = ev.value_text(argv[i]);
        if option == "-strict" {
            strict = true;
        } else {
            return Err(FeatherError::new(format!("bad option \"{option}\": must be -strict")).into());
        }
        i += 1;
    }
    let text = ev.value_text(argv[argv.len() - 1]);
    if text.is_empty() {
        return Ok(ev.int(i64::from(!strict)));
    }
    let ok = match class.as_str() {
        "alnum" => text.chars().all(char::is_alphanumeric),
        "alpha" => text.chars().all(char::is_alphabetic),
        "ascii" => text.is_ascii(),
        "boolean" => number::parse_boolean(&text).is_some(),
        "digit" => text.chars().all(|c| c.is_ascii_digit()),
        "double" => number::parse_double(&text).is_some() || number::parse_integer(&text).is_some(),
        "entier" | "integer" | "wideinteger" => number::parse_integer(&text).is_some(),
        "false" => number::parse_boolean(&text) == Some(false),
        "true" => number::parse_boolean(&text) == Some(true),
        "list" => list::parse_list(&text).is_ok(),
        "lower" => text.chars().all(|c| !c.is_alphabetic() || c.is_lowercase()),
        "upper" => text.chars().all(|c| !c.is_alphabetic() || c.is_uppercase()),
        "space" => text.chars().all(char::is_whitespace),
        "xdigit" => text.chars().all(|c| c.is_ascii_hexdigit()),
        other => {
            return Err(FeatherError::new(format!(
                "unknown class \"{other}\": must be alnum, alpha, ascii, boolean, digit, double, entier, false, integer, list, lower, space, true, upper, wideinteger, or xdigit"
            ))
            .into());
        }
    };
    Ok(ev.int(i64::from(ok)))
}

// --- subst --------------------------------------------------------------

pub(super) fn subst<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    const USAGE: &str = "subst ?-nobackslashes? ?-nocommands? ?-novariables? string";
    check_arity(argv, 2, Some(5), USAGE)?;
    let mut backslashes = true;
    let mut commands = true;
    let mut variables = true;
    let mut i = 1;
    while i < argv.len() - 1 {
        let option = ev.value_text(argv[i]);
        match option.as_str() {
            "-nobackslashes" => backslashes = false,
            "-nocommands" => commands = false,
            "-novariables" => variables = false,
            other => {
                return Err(FeatherError::new(format!(
                    "bad switch \"{other}\": must be -nobackslashes, -nocommands, or -novariables"
                ))
                .into());
            }
        }
        i += 1;
    }
    let text = ev.value_text(argv[i]);
    let substituted = subst_text(ev, &text, backslashes, commands, variables)?;
    Ok(ev.intern(&substituted))
}

/// Performs selective substitution over raw text.
///
/// Inside command substitutions, `break` stops processing, `continue` skips
/// that substitution, and `return` contributes its value.
fn subst_text<H: HostOps>(
    ev: &mut Evaluator<'_, H>,
    text: &str,
    backslashes: bool,
    commands: bool,
    variables: bool,
) -> FlowResult<String> {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if backslashes => {
                let end = parse::escape_extent(text, i);
                out.push_str(&parse::substitute_backslashes(&text[i..end]));
                i = end;
            }
            b'$' if variables => match parse::scan_dollar(text, i) {
                DollarScan::Token(token, next) => {
                    let value = ev.var_read(token.inner(text))?;
                    out.push_str(&ev.value_text(value));
                    i = next;
                }
                DollarScan::Plain | DollarScan::Incomplete(_) => {
                    out.push('$');
                    i += 1;
                }
            },
            b'[' if commands => match parse::scan_bracketed(text, i) {
                ConstructScan::Done(token, next) => {
                    match ev.eval_nested_script(token.inner(text)) {
                        Ok(value) => out.push_str(&ev.value_text(value)),
                        Err(Unwind::Break) => return Ok(out),
                        Err(Unwind::Continue) => {}
                        Err(Unwind::Return(ret)) => {
                            out.push_str(&ev.value_text(ret.value));
                        }
                        Err(other) => return Err(other),
                    }
                    i = next;
                }
                ConstructScan::Incomplete(_) => {
                    return Err(FeatherError::new("missing close-bracket").into());
                }
            },
            _ => {
                // copy one UTF-8 character untouched
                let c = text[i..].chars().next().unwrap_or('\0');
                out.push(c);
                i += c.len_utf8().max(1);
            }
        }
    }
    Ok(out)
}
