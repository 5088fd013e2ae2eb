// src/core/html.rs
//
// Tolerant tag slicing for EDGAR pages and Form 4 XML. Case-insensitive on
// ASCII tag and attribute names; no DOM, just local scans within known blocks.

use super::sanitize::{normalize_entities, normalize_ws};

pub fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Byte ranges of the next `<name ...>...</name>` element at or after `from`.
/// Returns `(start, inner_start, inner_end, end)`. The tag name must match exactly,
/// so `<transactionCode>` is never mistaken for `<transactionCoding>`.
/// Self-closing elements yield an empty inner range.
fn next_element(lc: &str, name: &str, from: usize) -> Option<(usize, usize, usize, usize)> {
    let open = format!("<{}", to_lower(name));
    let close = format!("</{}", to_lower(name));
    let mut at = from;
    loop {
        let start = lc.get(at..)?.find(&open)? + at;
        let after_name = start + open.len();
        match lc.as_bytes().get(after_name) {
            Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {}
            _ => {
                at = after_name;
                continue;
            }
        }
        let open_end = lc[start..].find('>')? + start;
        if lc.as_bytes()[open_end - 1] == b'/' {
            return Some((start, open_end + 1, open_end + 1, open_end + 1));
        }
        let inner_start = open_end + 1;
        let close_at = find_close(lc, &close, inner_start)?;
        let end = lc[close_at..].find('>').map(|i| close_at + i + 1).unwrap_or(lc.len());
        return Some((start, inner_start, close_at, end));
    }
}

/// `</name>` but not `</nameSuffix>`.
fn find_close(lc: &str, close: &str, from: usize) -> Option<usize> {
    let mut at = from;
    loop {
        let i = lc.get(at..)?.find(close)? + at;
        match lc.as_bytes().get(i + close.len()) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') | None => return Some(i),
            _ => at = i + close.len(),
        }
    }
}

/// All elements named `name` in `s`, as `(open_tag, inner)` slices. Non-nesting.
pub fn elements<'a>(s: &'a str, name: &str) -> Vec<(&'a str, &'a str)> {
    let lc = to_lower(s);
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some((start, inner_s, inner_e, end)) = next_element(&lc, name, pos) {
        out.push((&s[start..inner_s], &s[inner_s..inner_e]));
        pos = end.max(start + 1);
    }
    out
}

/// Inner markup of the first element named `name`.
pub fn first_inner<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let lc = to_lower(s);
    let (_, inner_s, inner_e, _) = next_element(&lc, name, 0)?;
    Some(&s[inner_s..inner_e])
}

/// Visible text of the first element named `name`, entities and whitespace normalized.
pub fn first_text(s: &str, name: &str) -> Option<String> {
    first_inner(s, name).map(strip_tags)
}

/// Inner markup of the first `<table>` whose opening tag carries every `attrs`
/// pair (case-insensitive, quotes optional).
pub fn table_with_attrs<'a>(doc: &'a str, attrs: &[(&str, &str)]) -> Option<&'a str> {
    elements(doc, "table")
        .into_iter()
        .find(|(open, _)| attrs.iter().all(|(k, v)| attr_value(open, k).is_some_and(|got| got.eq_ignore_ascii_case(v))))
        .map(|(_, inner)| inner)
}

/// Value of attribute `name` in an opening tag: `name="v"`, `name='v'` or `name=v`.
pub fn attr_value(open_tag: &str, name: &str) -> Option<String> {
    let lc = to_lower(open_tag);
    let needle = format!("{}=", to_lower(name));
    let mut at = 0usize;
    while let Some(rel) = lc[at..].find(&needle) {
        let i = at + rel;
        // must start a word: `summary=` but not `data-summary=`
        let boundary = i == 0 || matches!(lc.as_bytes()[i - 1], b' ' | b'\t' | b'\r' | b'\n' | b'<');
        let val_start = i + needle.len();
        if !boundary {
            at = val_start;
            continue;
        }
        let rest = &open_tag[val_start..];
        let value = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let body = &rest[1..];
                &body[..body.find(q).unwrap_or(body.len())]
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                &rest[..end]
            }
        };
        return Some(normalize_entities(value));
    }
    None
}

/// `href` of every anchor in the block, in document order.
pub fn hrefs(block: &str) -> Vec<String> {
    elements(block, "a")
        .into_iter()
        .filter_map(|(open, _)| attr_value(open, "href"))
        .collect()
}

/// `<td>` inners of every `<tr>` in a table.
pub fn table_rows(table_inner: &str) -> Vec<Vec<&str>> {
    elements(table_inner, "tr")
        .into_iter()
        .map(|(_, tr)| elements(tr, "td").into_iter().map(|(_, td)| td).collect())
        .collect()
}

/// Trimmed `<title>` text.
pub fn title(doc: &str) -> Option<String> {
    first_text(doc, "title")
}

/// Remove all tags, decode the common entities, collapse whitespace.
pub fn strip_tags<S: AsRef<str>>(s: S) -> String {
    let s = s.as_ref();

    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;

    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&normalize_entities(&out))
}

/// Last `/`-separated segment of a path or URL.
pub fn last_segment(href: &str) -> &str {
    let trimmed = href.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
