//! Byte classification for manifest text.
//!
//! Declarations are located with patterns, but a pattern hit only counts when
//! it lands in code: the same text inside a comment or a string literal is
//! ignored, and block ends are found by bracket depth over code bytes only.
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteClass {
    Code,
    Str,
    Comment,
}

/// Classified view over one manifest text.
#[derive(Debug, Clone)]
pub struct Scan<'a> {
    text: &'a str,
    classes: Vec<ByteClass>,
    literals: Vec<Range<usize>>,
}

impl<'a> Scan<'a> {
    pub fn new(text: &'a str) -> Self {
        let bytes = text.as_bytes();
        let len = bytes.len();
        let mut classes = vec![ByteClass::Code; len];
        let mut literals = Vec::new();
        let mut i = 0;
        while i < len {
            let next = bytes.get(i + 1).copied();
            match bytes[i] {
                b'"' => {
                    let end = string_end(bytes, i).min(len);
                    classes[i..end].fill(ByteClass::Str);
                    literals.push(i..end);
                    i = end;
                }
                b'#' => {
                    let end = line_end(bytes, i);
                    classes[i..end].fill(ByteClass::Comment);
                    i = end;
                }
                b'/' if next == Some(b'/') => {
                    let end = line_end(bytes, i);
                    classes[i..end].fill(ByteClass::Comment);
                    i = end;
                }
                b'/' if next == Some(b'*') => {
                    let end = find_from(bytes, i + 2, b"*/").map_or(len, |pos| pos + 2);
                    classes[i..end].fill(ByteClass::Comment);
                    i = end;
                }
                b'<' if next == Some(b'<') => match heredoc_end(bytes, i) {
                    Some(end) => {
                        classes[i..end].fill(ByteClass::Str);
                        i = end;
                    }
                    None => i += 2,
                },
                _ => i += 1,
            }
        }
        Self {
            text,
            classes,
            literals,
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn class_at(&self, offset: usize) -> Option<ByteClass> {
        self.classes.get(offset).copied()
    }

    pub fn is_code(&self, offset: usize) -> bool {
        self.class_at(offset) == Some(ByteClass::Code)
    }

    /// Quoted string literals (quotes included) that start inside `range`.
    pub fn literals_in(&self, range: Range<usize>) -> impl Iterator<Item = &Range<usize>> + '_ {
        self.literals
            .iter()
            .filter(move |literal| range.contains(&literal.start))
    }

    /// Offset of the bracket closing the one at `open` (`{` or `[`).
    pub fn matching_close(&self, open: usize) -> Option<usize> {
        let bytes = self.text.as_bytes();
        let (open_byte, close_byte) = match bytes.get(open)? {
            b'{' => (b'{', b'}'),
            b'[' => (b'[', b']'),
            _ => return None,
        };
        if !self.is_code(open) {
            return None;
        }
        let mut depth = 0usize;
        for (offset, byte) in bytes.iter().enumerate().skip(open) {
            if self.classes[offset] != ByteClass::Code {
                continue;
            }
            if *byte == open_byte {
                depth += 1;
            } else if *byte == close_byte {
                depth -= 1;
                if depth == 0 {
                    return Some(offset);
                }
            }
        }
        None
    }

    /// Net `{` depth of code bytes in `range`.
    pub fn brace_depth(&self, range: Range<usize>) -> i64 {
        let bytes = self.text.as_bytes();
        let mut depth = 0i64;
        for offset in range {
            if self.classes.get(offset) != Some(&ByteClass::Code) {
                continue;
            }
            match bytes[offset] {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
        }
        depth
    }
}

/// Inner text of a quoted literal range produced by [`Scan`].
pub fn literal_value<'t>(text: &'t str, literal: &Range<usize>) -> &'t str {
    let raw = &text[literal.clone()];
    let raw = raw.strip_prefix('"').unwrap_or(raw);
    raw.strip_suffix('"').unwrap_or(raw)
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|byte| *byte == b'\n')
        .map_or(bytes.len(), |pos| from + pos)
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| from + pos)
}

// Unterminated literals stop at the end of their line so one stray quote
// cannot swallow the rest of the file.
fn string_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            b'\n' => return i,
            b'$' | b'%' if next == Some(bytes[i]) => i += 2,
            b'$' | b'%' if next == Some(b'{') => i = template_end(bytes, i + 2),
            _ => i += 1,
        }
    }
    bytes.len()
}

fn template_end(bytes: &[u8], mut i: usize) -> usize {
    let mut depth = 1usize;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = string_end(bytes, i),
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return i;
                }
            }
            b'\n' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn heredoc_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 2;
    if bytes.get(i) == Some(&b'-') || bytes.get(i) == Some(&b'~') {
        i += 1;
    }
    let marker_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    let marker = &bytes[marker_start..i];
    if bytes.get(i) == Some(&b'\r') {
        i += 1;
    }
    if marker.is_empty() || bytes.get(i) != Some(&b'\n') {
        return None;
    }
    let mut line_start = i + 1;
    while line_start < bytes.len() {
        let end = line_end(bytes, line_start);
        let line = std::str::from_utf8(&bytes[line_start..end]).unwrap_or_default();
        if line.trim().as_bytes() == marker {
            return Some(end);
        }
        line_start = end + 1;
    }
    Some(bytes.len())
}
