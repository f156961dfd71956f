//! Bracket-aware scanning of data code.
//!
//! Data code nests function calls inside square brackets:
//!
//! ```text
//! [Set(i, 0, int)][For((i < 3), [PrintF("%v", i)][Set(i, i+1, int)])]
//! ```
//!
//! Only `[` and `]` affect nesting depth.  Parentheses and quotes are not
//! tracked, so a comma inside a quoted string at depth 0 still separates
//! arguments.

use super::error::EvalError;

/// Split `text` into its top-level bracket expressions.
///
/// Text without any brackets is returned whole as a single inline
/// expression.  Text before a span (or between two spans) is carried as a
/// prefix of the following token and text after the last span is appended to
/// the last token, so concatenating the tokens reproduces `text` exactly.
pub fn split_top_level(text: &str) -> Vec<&str> {
    if !text.contains(['[', ']']) {
        return vec![text];
    }

    let mut out = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    out.push(&text[start..=i]);
                    start = i + 1;
                }
            }
            _ => {}
        }
    }

    if start < text.len() {
        let tail = &text[start..];
        match out.pop() {
            // Whitespace or stray text after the last span belongs to it.
            Some(last) if depth == 0 => {
                let begin = text.len() - tail.len() - last.len();
                out.push(&text[begin..]);
            }
            Some(last) => {
                out.push(last);
                out.push(tail);
            }
            None => out.push(tail),
        }
    }
    out
}

/// Split a raw argument list on commas at bracket depth 0.
///
/// Always returns at least one (possibly empty) argument.
pub fn split_arguments(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                out.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out
}

/// A parsed `[Name(raw args)]` span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall<'a> {
    pub name: &'a str,
    /// Unevaluated argument text; callees evaluate it lazily.
    pub raw_params: &'a str,
}

/// Extract the function name and raw parameter text from the first
/// top-level `[...]` span in `expr`.
pub fn split_call(expr: &str) -> Result<FunctionCall<'_>, EvalError> {
    let malformed = || EvalError::MalformedExpression(expr.trim().to_owned());

    let open = expr.find('[').ok_or_else(malformed)?;
    let mut depth: i32 = 0;
    let mut close = None;
    for (i, ch) in expr[open..].char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close.ok_or_else(malformed)?;

    let inner = &expr[open + 1..close];
    let paren = inner.find('(').ok_or_else(malformed)?;
    let name = inner[..paren].trim();
    let raw_params = inner[paren + 1..]
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(malformed)?;
    if name.is_empty() {
        return Err(malformed());
    }
    Ok(FunctionCall { name, raw_params })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
