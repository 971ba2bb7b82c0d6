//! Best-effort parsing of free-text agent replies.
//!
//! Nothing here returns an error. Text that does not contain the expected
//! markers yields `None` or an empty result, and callers fall back to
//! defaults.

use serde_json::{Map, Value};

/// Separator the crossover prompt asks agents to put between candidates.
pub const CANDIDATE_SEPARATOR: &str = "---CANDIDATE---";

/// Find the first balanced `{...}` block and parse it as a JSON object.
///
/// Braces inside string literals are ignored while matching. Returns `None`
/// if there is no balanced block or the block is not a JSON object.
pub fn extract_json_block(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let block = &text[start..start + offset + 1];
                    return match serde_json::from_str::<Value>(block) {
                        Ok(Value::Object(map)) => Some(map),
                        _ => None,
                    };
                }
            }
            _ => {}
        }
    }
    None
}

/// A JSON number, or a string that parses as one.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Split crossover output into candidates and force exactly `population`
/// entries.
///
/// Pieces are trimmed and blank ones dropped. Missing entries repeat the last
/// candidate (or are empty if there is none); extra entries are cut.
pub fn split_candidates(text: &str, population: usize) -> Vec<String> {
    let mut candidates: Vec<String> = text
        .split(CANDIDATE_SEPARATOR)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    while candidates.len() < population {
        let pad = candidates.last().cloned().unwrap_or_default();
        candidates.push(pad);
    }
    candidates.truncate(population);
    candidates
}

/// Up to `len` bytes of `text` starting at byte `from`, widened to char
/// boundaries so slicing never panics.
pub fn window(text: &str, from: usize, len: usize) -> &str {
    let mut start = from.min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = start.saturating_add(len).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}
