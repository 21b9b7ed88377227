//! Locating declarations and attributes in manifest text.
//!
//! Headers are found by pattern search, then bounded by bracket depth over
//! code bytes, so a greedy pattern can never run into the next block. All
//! positions are byte offsets into the text the [`Scan`] was built from.
use crate::manifest::scan::{literal_value, ByteClass, Scan};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// One `resource "<type>" "<name>" { ... }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    /// Offset of the `resource` keyword.
    pub start: usize,
    /// Offset of the opening `{`.
    pub open: usize,
    /// Offset of the closing `}`.
    pub close: usize,
}

impl Declaration {
    pub fn body(&self) -> Range<usize> {
        self.open + 1..self.close
    }

    pub fn start_line(&self, text: &str) -> usize {
        offset_to_line(text, self.start)
    }

    pub fn end_line(&self, text: &str) -> usize {
        offset_to_line(text, self.close)
    }
}

/// A top-level `key = value` assignment inside a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key_offset: usize,
    pub value_start: usize,
    /// Quoted literal range when the value is a plain string.
    pub literal: Option<Range<usize>>,
}

impl Attribute {
    pub fn literal_value<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.literal
            .as_ref()
            .map(|literal| literal_value(text, literal))
    }
}

/// One top-level element of a list value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Literal value when the element is a single quoted string.
    pub value: Option<String>,
    /// Expression span, surrounding blanks and comments excluded.
    pub range: Range<usize>,
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r#"\bresource[ \t]+"([^"\n]+)"[ \t]+"([^"\n]+)"\s*\{"#).expect("header regex")
    })
}

/// Every declaration of `resource_type`, in text order.
pub fn declarations(scan: &Scan<'_>, resource_type: &str) -> Vec<Declaration> {
    let text = scan.text();
    let mut found = Vec::new();
    for caps in header_regex().captures_iter(text) {
        let (Some(whole), Some(kind), Some(name)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        if kind.as_str() != resource_type || !scan.is_code(whole.start()) {
            continue;
        }
        let open = whole.end() - 1;
        let Some(close) = scan.matching_close(open) else {
            tracing::debug!(
                resource_type,
                name = name.as_str(),
                "declaration has no closing brace"
            );
            continue;
        };
        found.push(Declaration {
            name: name.as_str().to_string(),
            start: whole.start(),
            open,
            close,
        });
    }
    found
}

/// First declaration of `resource_type` named `name`.
///
/// Each resource is expected to be declared once; later duplicates are ignored.
pub fn find_declaration(scan: &Scan<'_>, resource_type: &str, name: &str) -> Option<Declaration> {
    declarations(scan, resource_type)
        .into_iter()
        .find(|decl| decl.name == name)
}

/// Top-level `key = ...` assignment of a declaration; nested blocks are skipped.
pub fn find_attribute(scan: &Scan<'_>, decl: &Declaration, key: &str) -> Option<Attribute> {
    let text = scan.text();
    let bytes = text.as_bytes();
    let pattern = Regex::new(&format!(r"\b{}[ \t]*=", regex::escape(key))).ok()?;
    let body = decl.body();
    for found in pattern.find_iter(&text[body.clone()]) {
        let key_offset = body.start + found.start();
        let eq_end = body.start + found.end();
        if !scan.is_code(key_offset) || bytes.get(eq_end) == Some(&b'=') {
            continue;
        }
        let preceded_ok = key_offset == 0
            || matches!(bytes[key_offset - 1], b' ' | b'\t' | b'\n' | b'\r' | b'{' | b',');
        if !preceded_ok || scan.brace_depth(body.start..key_offset) != 0 {
            continue;
        }
        let value_start = skip_blanks(bytes, eq_end);
        let literal = scan
            .literals_in(value_start..value_start + 1)
            .next()
            .cloned();
        return Some(Attribute {
            key_offset,
            value_start,
            literal,
        });
    }
    None
}

/// Top-level elements of a `[ ... ]` attribute value, split at depth-0 commas
/// in code; `None` when the value is not a list literal.
pub fn list_items(scan: &Scan<'_>, attr: &Attribute) -> Option<Vec<ListItem>> {
    let bytes = scan.text().as_bytes();
    if bytes.get(attr.value_start) != Some(&b'[') {
        return None;
    }
    let close = scan.matching_close(attr.value_start)?;
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut segment_start = attr.value_start + 1;
    for offset in attr.value_start + 1..=close {
        if offset < close && !scan.is_code(offset) {
            continue;
        }
        let byte = bytes[offset];
        if offset == close || (depth == 0 && byte == b',') {
            items.extend(list_item(scan, segment_start..offset));
            segment_start = offset + 1;
            continue;
        }
        match byte {
            b'[' | b'{' | b'(' => depth += 1,
            b']' | b'}' | b')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Some(items)
}

fn list_item(scan: &Scan<'_>, segment: Range<usize>) -> Option<ListItem> {
    let text = scan.text();
    let bytes = text.as_bytes();
    let significant = |offset: &usize| match scan.class_at(*offset) {
        Some(ByteClass::Str) => true,
        Some(ByteClass::Code) => !bytes[*offset].is_ascii_whitespace(),
        _ => false,
    };
    let start = segment.clone().find(significant)?;
    let end = segment.rev().find(significant)? + 1;
    let value = scan
        .literals_in(start..end)
        .find(|literal| literal.start == start && literal.end == end)
        .map(|literal| literal_value(text, literal).to_string());
    Some(ListItem {
        value,
        range: start..end,
    })
}

/// 1-based line holding the byte at `offset`.
pub fn offset_to_line(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    1 + text.as_bytes()[..end]
        .iter()
        .filter(|byte| **byte == b'\n')
        .count()
}

/// Offset of the first byte of 1-based `line`.
pub fn line_start_offset(text: &str, line: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    if line == 1 {
        return Some(0);
    }
    text.match_indices('\n')
        .nth(line - 2)
        .map(|(offset, _)| offset + 1)
}

/// Byte range of 1-based `line`, line terminator excluded.
pub fn line_range(text: &str, line: usize) -> Option<Range<usize>> {
    let start = line_start_offset(text, line)?;
    if start > text.len() {
        return None;
    }
    let end = text[start..]
        .find('\n')
        .map_or(text.len(), |pos| start + pos);
    let end = if end > start && text.as_bytes()[end - 1] == b'\r' {
        end - 1
    } else {
        end
    };
    Some(start..end)
}

fn skip_blanks(bytes: &[u8], mut offset: usize) -> usize {
    while offset < bytes.len() && matches!(bytes[offset], b' ' | b'\t') {
        offset += 1;
    }
    offset
}
