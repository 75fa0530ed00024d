//! List commands: constructors, accessors, and editors. Index arguments
//! accept `end`, `end±N`, and integer arithmetic forms throughout.

use std::cmp::Ordering;

use crate::{
    error::FeatherError,
    eval::Evaluator,
    handle::ValueId,
    host::HostOps,
    list,
    number,
    status::FlowResult,
};

use super::check_arity;

pub(super) fn list_cmd<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    Ok(ev.make_list(&argv[1..]))
}

pub(super) fn llength<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(2), "llength list")?;
    let len = ev
        .host
        .list_length(ev.interp, argv[1])
        .map_err(FeatherError::from)?;
    Ok(ev.int(len as i64))
}

/// Flattens `lindex`/`lset` index arguments: each argument may itself be a
/// list of indices.
fn flatten_indices<H: HostOps>(
    ev: &mut Evaluator<'_, H>,
    args: &[ValueId],
) -> FlowResult<Vec<String>> {
    let mut indices = Vec::new();
    for &arg in args {
        let text = ev.value_text(arg);
        match list::parse_list(&text) {
            Ok(items) if items.len() > 1 => indices.extend(items),
            _ => indices.push(text),
        }
    }
    Ok(indices)
}

pub(super) fn lindex<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "lindex list ?index ...?")?;
    let indices = flatten_indices(ev, &argv[2..])?;
    let mut current = argv[1];
    for index in indices {
        let items = ev.list_items(current)?;
        let idx = list::parse_index(&index, items.len())?;
        if idx < 0 || idx as usize >= items.len() {
            return Ok(ev.empty());
        }
        current = items[idx as usize];
    }
    Ok(current)
}

pub(super) fn lrange<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, Some(4), "lrange list first last")?;
    let items = ev.list_items(argv[1])?;
    let first_text = ev.value_text(argv[2]);
    let last_text = ev.value_text(argv[3]);
    let first = list::parse_index(&first_text, items.len())?.max(0) as usize;
    let last = list::parse_index(&last_text, items.len())?.min(items.len() as i64 - 1);
    if last < first as i64 {
        return Ok(ev.make_list(&[]));
    }
    Ok(ev.make_list(&items[first..=last as usize]))
}

pub(super) fn lappend<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "lappend varName ?value value ...?")?;
    let name = ev.value_text(argv[1]);
    let updated = if ev.var_exists(&name) {
        let current = ev.var_read(&name)?;
        ev.host
            .list_from(ev.interp, current)
            .map_err(FeatherError::from)?
    } else {
        ev.host.list_new(ev.interp)
    };
    for &value in &argv[2..] {
        ev.host.list_push(ev.interp, updated, value);
    }
    ev.var_write(&name, updated)
}

fn lset_at<H: HostOps>(
    ev: &mut Evaluator<'_, H>,
    value: ValueId,
    indices: &[String],
    replacement: ValueId,
) -> FlowResult {
    if indices.is_empty() {
        return Ok(replacement);
    }
    let items = ev.list_items(value)?;
    let idx = list::parse_index(&indices[0], items.len())?;
    // appending right at the end is allowed for the final index
    let appending = indices.len() == 1 && idx == items.len() as i64;
    if idx < 0 || (idx as usize >= items.len() && !appending) {
        return Err(FeatherError::new("list index out of range").into());
    }
    let mut rebuilt = items.clone();
    if appending {
        rebuilt.push(replacement);
    } else {
        let inner = lset_at(ev, items[idx as usize], &indices[1..], replacement)?;
        rebuilt[idx as usize] = inner;
    }
    Ok(ev.make_list(&rebuilt))
}

pub(super) fn lset<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, None, "lset listVar ?index? ?index ...? value")?;
    let name = ev.value_text(argv[1]);
    let current = ev.var_read(&name)?;
    let indices = flatten_indices(ev, &argv[2..argv.len() - 1])?;
    let replacement = argv[argv.len() - 1];
    let updated = lset_at(ev, current, &indices, replacement)?;
    ev.var_write(&name, updated)
}

pub(super) fn linsert<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 3, None, "linsert list index ?element element ...?")?;
    let items = ev.list_items(argv[1])?;
    let index_text = ev.value_text(argv[2]);
    let at = list::parse_index(&index_text, items.len())?
        .clamp(0, items.len() as i64) as usize;
    let mut rebuilt = Vec::with_capacity(items.len() + argv.len() - 3);
    rebuilt.extend_from_slice(&items[..at]);
    rebuilt.extend_from_slice(&argv[3..]);
    rebuilt.extend_from_slice(&items[at..]);
    Ok(ev.make_list(&rebuilt))
}

pub(super) fn lreplace<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 4, None, "lreplace list first last ?element element ...?")?;
    let items = ev.list_items(argv[1])?;
    let first_text = ev.value_text(argv[2]);
    let last_text = ev.value_text(argv[3]);
    let first = list::parse_index(&first_text, items.len())?.max(0) as usize;
    let first = first.min(items.len());
    let last = list::parse_index(&last_text, items.len())?.min(items.len() as i64 - 1);
    // last < first deletes nothing and inserts before first
    let resume = if last < first as i64 { first } else { last as usize + 1 };
    let mut rebuilt = Vec::new();
    rebuilt.extend_from_slice(&items[..first]);
    rebuilt.extend_from_slice(&argv[4..]);
    rebuilt.extend_from_slice(&items[resume.min(items.len())..]);
    Ok(ev.make_list(&rebuilt))
}

pub(super) fn lrepeat<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "lrepeat count ?value ...?")?;
    let count = ev.want_int(argv[1])?;
    if count < 0 {
        let text = ev.value_text(argv[1]);
        return Err(FeatherError::new(format!(
            "bad count \"{text}\": must be integer >= 0"
        ))
        .into());
    }
    let mut items = Vec::with_capacity(count as usize * (argv.len() - 2));
    for _ in 0..count {
        items.extend_from_slice(&argv[2..]);
    }
    Ok(ev.make_list(&items))
}

pub(super) fn lreverse<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(2), "lreverse list")?;
    let mut items = ev.list_items(argv[1])?;
    items.reverse();
    Ok(ev.make_list(&items))
}

#[derive(Clone)]
enum SortKey {
    Str(String),
    Int(i64),
    Double(f64),
}

fn sort_compare(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        (SortKey::Str(x), SortKey::Str(y)) => x.cmp(y),
        (SortKey::Int(x), SortKey::Int(y)) => x.cmp(y),
        (SortKey::Double(x), SortKey::Double(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

pub(super) fn lsort<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    const USAGE: &str = "lsort ?-option value ...? list";
    check_arity(argv, 2, None, USAGE)?;
    let mut integer = false;
    let mut real = false;
    let mut nocase = false;
    let mut decreasing = false;
    let mut unique = false;
    let mut i = 1;
    while i < argv.len() - 1 {
        let option = ev.value_text(argv[i]);
        match option.as_str() {
            "-integer" => integer = true,
            "-real" => real = true,
            "-ascii" => {}
            "-nocase" => nocase = true,
            "-increasing" => decreasing = false,
            "-decreasing" => decreasing = true,
            "-unique" => unique = true,
            other => {
                return Err(FeatherError::new(format!(
                    "bad option \"{other}\": must be -ascii, -decreasing, -increasing, -integer, -nocase, -real, or -unique"
                ))
                .into());
            }
        }
        i += 1;
    }

    let items = ev.list_items(argv[i])?;
    let mut keyed: Vec<(SortKey, ValueId)> = Vec::with_capacity(items.len());
    for &item in &items {
        let text = ev.value_text(item);
        let key = if integer {
            let value = number::parse_integer(&text)
                .ok_or_else(|| FeatherError::expected("integer", &text))?;
            SortKey::Int(value)
        } else if real {
            let value = number::parse_double(&text)
                .ok_or_else(|| FeatherError::expected("floating-point number", &text))?;
            SortKey::Double(value)
        } else if nocase {
            SortKey::Str(text.to_lowercase())
        } else {
            SortKey::Str(text)
        };
        keyed.push((key, item));
    }
    keyed.sort_by(|a, b| sort_compare(&a.0, &b.0));
    if decreasing {
        keyed.reverse();
    }
    if unique {
        keyed.dedup_by(|a, b| sort_compare(&a.0, &b.0) == Ordering::Equal);
    }
    let sorted: Vec<ValueId> = keyed.into_iter().map(|(_, v)| v).collect();
    Ok(ev.make_list(&sorted))
}

pub(super) fn lsearch<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    const USAGE: &str = "lsearch ?-option ...? list pattern";
    check_arity(argv, 3, None, USAGE)?;
    let mut exact = false;
    let mut regexp = false;
    let mut all = false;
    let mut inline = false;
    let mut not = false;
    let mut nocase = false;
    let mut i = 1;
    while i < argv.len() - 2 {
        let option = ev.value_text(argv[i]);
        match option.as_str() {
            "-exact" => exact = true,
            "-glob" => {}
            "-regexp" => regexp = true,
            "-all" => all = true,
            "-inline" => inline = true,
            "-not" => not = true,
            "-nocase" => nocase = true,
            other => {
                return Err(FeatherError::new(format!(
                    "bad option \"{other}\": must be -all, -exact, -glob, -inline, -nocase, -not, or -regexp"
                ))
                .into());
            }
        }
        i += 1;
    }
    let items = ev.list_items(argv[i])?;
    let pattern = ev.value_text(argv[i + 1]);

    let mut hits: Vec<(usize, ValueId)> = Vec::new();
    for (idx, &item) in items.iter().enumerate() {
        let text = ev.value_text(item);
        let mut hit = if exact {
            if nocase {
                text.eq_ignore_ascii_case(&pattern)
            } else {
                text == pattern
            }
        } else if regexp {
            let pat = if nocase {
                format!("(?i){pattern}")
            } else {
                pattern.clone()
            };
            ev.host
                .regex_match(ev.interp, &pat, &text)
                .map_err(FeatherError::from)?
        } else {
            ev.host.str_match(&pattern, &text, nocase)
        };
        if not {
            hit = !hit;
        }
        if hit {
            hits.push((idx, item));
            if !all {
                break;
            }
        }
    }

    if all {
        if inline {
            let values: Vec<ValueId> = hits.iter().map(|&(_, v)| v).collect();
            Ok(ev.make_list(&values))
        } else {
            let indices: Vec<String> = hits.iter().map(|(idx, _)| idx.to_string()).collect();
            Ok(ev.make_str_list(&indices))
        }
    } else {
        match hits.first() {
            Some(&(idx, value)) => {
                if inline {
                    Ok(value)
                } else {
                    Ok(ev.int(idx as i64))
                }
            }
            None => {
                if inline {
                    Ok(ev.empty())
                } else {
                    Ok(ev.int(-1))
                }
            }
        }
    }
}

pub(super) fn lassign<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, None, "lassign list ?varName ...?")?;
    let items = ev.list_items(argv[1])?;
    let vars = &argv[2..];
    for (i, &var) in vars.iter().enumerate() {
        let name = ev.value_text(var);
        let value = match items.get(i) {
            Some(&v) => v,
            None => ev.empty(),
        };
        ev.var_write(&name, value)?;
    }
    let leftover = items.get(vars.len()..).unwrap_or(&[]).to_vec();
    Ok(ev.make_list(&leftover))
}

pub(super) fn split<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(3), "split string ?splitChars?")?;
    let text = ev.value_text(argv[1]);
    let separators = if argv.len() == 3 {
        ev.value_text(argv[2])
    } else {
        " \t\n\r".to_owned()
    };
    let fields: Vec<String> = if separators.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        let seps: Vec<char> = separators.chars().collect();
        text.split(|c| seps.contains(&c)).map(str::to_owned).collect()
    };
    Ok(ev.make_str_list(&fields))
}

pub(super) fn join<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    check_arity(argv, 2, Some(3), "join list ?joinString?")?;
    let items = ev.list_items(argv[1])?;
    let glue = if argv.len() == 3 {
        ev.value_text(argv[2])
    } else {
        " ".to_owned()
    };
    let parts: Vec<String> = items.iter().map(|&v| ev.value_text(v)).collect();
    Ok(ev.intern(&parts.join(&glue)))
}

pub(super) fn concat<H: HostOps>(ev: &mut Evaluator<'_, H>, argv: &[ValueId]) -> FlowResult {
    let mut parts: Vec<String> = Vec::new();
    for &arg in &argv[1..] {
        let text = ev.value_text(arg);
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_owned());
        }
    }
    Ok(ev.intern(&parts.join(" ")))
}
