//! Structured-Output Parser: pulls one JSON object or array out of free-form model text.
//!
//! Models wrap JSON in prose, markdown fences, or both. The parser strips fences,
//! then walks every candidate opening bracket and scans forward to its balanced
//! closing bracket (string-aware, so `"}"` inside a value does not end the scan).
//! The first candidate that deserializes wins. Nested objects and arrays parse
//! correctly, which the interview question bank (object of string → array) needs.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no balanced JSON {kind} found in model output")]
    NotFound { kind: &'static str },

    #[error("malformed JSON {kind} in model output: {source}")]
    Invalid {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

const OBJECT: (char, char, &str) = ('{', '}', "object");
const ARRAY: (char, char, &str) = ('[', ']', "array");

/// Returns the first JSON object embedded in `text`.
pub fn extract_object(text: &str) -> Result<Map<String, Value>, ParseError> {
    first_parsed(text, OBJECT)
}

/// Returns the first embedded JSON object that deserializes into `T`.
///
/// Candidates that are valid JSON but the wrong shape for `T` are skipped.
pub fn extract_object_as<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    first_parsed(text, OBJECT)
}

/// Returns the first JSON array of strings embedded in `text`.
pub fn extract_list(text: &str) -> Result<Vec<String>, ParseError> {
    first_parsed(text, ARRAY)
}

fn first_parsed<T: DeserializeOwned>(
    text: &str,
    (open, close, kind): (char, char, &'static str),
) -> Result<T, ParseError> {
    let text = strip_json_fences(text);
    let mut first_error = None;

    for candidate in balanced_candidates(text, open, close) {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(source) => {
                first_error.get_or_insert(ParseError::Invalid { kind, source });
            }
        }
    }

    Err(first_error.unwrap_or(ParseError::NotFound { kind }))
}

/// Yields every balanced `open ... close` substring, in order of its opening position.
fn balanced_candidates(text: &str, open: char, close: char) -> impl Iterator<Item = &str> {
    text.char_indices()
        .filter(move |(_, c)| *c == open)
        .filter_map(move |(start, _)| {
            balanced_end(&text[start..], open, close).map(|len| &text[start..start + len])
        })
}

/// Byte length of the balanced span at the start of `text`, if it closes.
fn balanced_end(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
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
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
