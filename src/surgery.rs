//! Line-granular edits on original manifest content.
//!
//! Every operation addresses 1-based lines and leaves all other bytes,
//! including line terminators, exactly as they were.
use crate::manifest::scan::Scan;
use anyhow::{anyhow, Result};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

fn role_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\brole[ \t]*=[ \t]*")[^"\n]*(")"#).expect("role regex"))
}

struct Lines<'a> {
    lines: Vec<&'a str>,
}

impl<'a> Lines<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            lines: content.split_inclusive('\n').collect(),
        }
    }

    fn check(&self, line: usize) -> Result<()> {
        if line == 0 || line > self.lines.len() {
            return Err(anyhow!(
                "line {line} out of range (content has {} lines)",
                self.lines.len()
            ));
        }
        Ok(())
    }

    /// Rebuild the content, passing each line's body through `edit`.
    fn rebuild<F>(&self, mut edit: F) -> String
    where
        F: FnMut(usize, &str) -> Option<String>,
    {
        let mut out = String::new();
        for (idx, raw) in self.lines.iter().enumerate() {
            let (body, ending) = split_ending(raw);
            match edit(idx + 1, body) {
                Some(replacement) => out.push_str(&replacement),
                None => out.push_str(body),
            }
            out.push_str(ending);
        }
        out
    }
}

fn split_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn split_indent(body: &str) -> (&str, &str) {
    let rest = body.trim_start_matches([' ', '\t']);
    (&body[..body.len() - rest.len()], rest)
}

/// Replace the text of `line`, keeping its terminator.
pub fn replace_line(content: &str, line: usize, new_text: &str) -> Result<String> {
    let lines = Lines::new(content);
    lines.check(line)?;
    Ok(lines.rebuild(|number, _| (number == line).then(|| new_text.to_string())))
}

/// Wrap `line` in a block comment, after its indentation.
pub fn comment_line(content: &str, line: usize) -> Result<String> {
    let lines = Lines::new(content);
    lines.check(line)?;
    Ok(lines.rebuild(|number, body| {
        (number == line).then(|| {
            let (indent, rest) = split_indent(body);
            format!("{indent}/* {rest} */")
        })
    }))
}

/// Wrap byte range `span` of `line` (offsets relative to the line start) in a
/// block comment.
pub fn comment_span(content: &str, line: usize, span: Range<usize>) -> Result<String> {
    let lines = Lines::new(content);
    lines.check(line)?;
    let (body, _) = split_ending(lines.lines[line - 1]);
    if span.start > span.end
        || span.end > body.len()
        || !body.is_char_boundary(span.start)
        || !body.is_char_boundary(span.end)
    {
        return Err(anyhow!("span {span:?} outside line {line}"));
    }
    Ok(lines.rebuild(|number, body| {
        (number == line).then(|| {
            format!(
                "{}/* {} */{}",
                &body[..span.start],
                &body[span.clone()],
                &body[span.end..]
            )
        })
    }))
}

/// Comment out lines `start..=end`.
///
/// Only the boundary lines change: `/* ` opens the first line and ` */` closes
/// the last. Block comments do not nest, so a range that already contains a
/// `*/` is commented line by line with `# ` instead.
pub fn comment_block(content: &str, start: usize, end: usize) -> Result<String> {
    let lines = Lines::new(content);
    lines.check(start)?;
    lines.check(end)?;
    if start > end {
        return Err(anyhow!("block start {start} is after end {end}"));
    }
    let interior_closes = lines.lines[start - 1..end]
        .iter()
        .any(|line| line.contains("*/"));
    if interior_closes {
        return Ok(lines.rebuild(|number, body| {
            (start..=end).contains(&number).then(|| {
                let (indent, rest) = split_indent(body);
                format!("{indent}# {rest}")
            })
        }));
    }
    Ok(lines.rebuild(|number, body| {
        let (indent, rest) = split_indent(body);
        match (number == start, number == end) {
            (true, true) => Some(format!("{indent}/* {rest} */")),
            (true, false) => Some(format!("{indent}/* {rest}")),
            (false, true) => Some(format!("{body} */")),
            (false, false) => None,
        }
    }))
}

/// Append a copy of lines `start..=end` after `end`, separated by a blank
/// line, with the first `role = "<value>"` assignment rewritten to `role`.
///
/// Returns `None` when the copied range has no literal role assignment.
pub fn append_transformed_copy(
    content: &str,
    start: usize,
    end: usize,
    role: &str,
) -> Result<Option<String>> {
    let lines = Lines::new(content);
    lines.check(start)?;
    lines.check(end)?;
    if start > end {
        return Err(anyhow!("block start {start} is after end {end}"));
    }
    let copy: String = lines.lines[start - 1..end].concat();
    let Some(copy) = rewrite_role(&copy, role) else {
        return Ok(None);
    };

    let (_, end_ending) = split_ending(lines.lines[end - 1]);
    let newline = if end_ending.is_empty() {
        "\n"
    } else {
        end_ending
    };
    let mut out = String::with_capacity(content.len() + copy.len() + 2);
    for (idx, raw) in lines.lines.iter().enumerate() {
        out.push_str(raw);
        if idx + 1 == end {
            if end_ending.is_empty() {
                out.push_str(newline);
            }
            out.push_str(newline);
            out.push_str(&copy);
        }
    }
    Ok(Some(out))
}

fn rewrite_role(text: &str, role: &str) -> Option<String> {
    let scan = Scan::new(text);
    let caps = role_regex()
        .captures_iter(text)
        .find(|caps| caps.get(0).is_some_and(|whole| scan.is_code(whole.start())))?;
    let prefix = caps.get(1)?;
    let quote = caps.get(2)?;
    Some(format!(
        "{}{}{}",
        &text[..prefix.end()],
        role,
        &text[quote.start()..]
    ))
}
