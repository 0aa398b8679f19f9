//! JSON object extraction from free model text

use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Find the first JSON object embedded in `text`.
///
/// Tolerates markdown code fences and prose before or after the object.
/// Brace matching skips braces inside string literals.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ValidationError> {
    let mut last_error = None;
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        // An unclosed brace may still precede a complete object
        if let Some(len) = balanced_end(&text[start..]) {
            match serde_json::from_str::<Value>(&text[start..start + len]) {
                Ok(Value::Object(map)) => return Ok(map),
                Ok(_) => {}
                Err(e) => last_error = Some(e.to_string()),
            }
        }
        search_from = start + 1;
    }

    Err(last_error.map_or(ValidationError::NoJsonObject, ValidationError::InvalidJson))
}

/// Byte length of the balanced `{...}` at the start of `text`
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
