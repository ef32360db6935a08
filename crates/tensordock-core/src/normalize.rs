//! Correction of known backend response defects.
//!
//! The marketplace backend does not always honor its own envelope contract. Three
//! defects are repaired here, in this order:
//!
//! 1. an HTML error page served with a 2xx status (replaced by a failure envelope),
//! 2. `success` sent as a string or null (parsed, unparseable text and null become `false`),
//! 3. `success` missing entirely (inferred from the HTTP status).
//!
//! This is the only place that handles the generic JSON tree; everything
//! downstream decodes the canonical bytes into typed records.

use crate::envelope::Envelope;
use crate::error::{Error, Result};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::warn;

/// Field holding the success indicator.
pub const SUCCESS_FIELD: &str = "success";

/// Message substituted when the backend answers with an HTML page.
pub const HTML_FAILURE_MESSAGE: &str = "api call failed";

const HTML_CONTENT_TYPE: &str = "text/html";

/// Produce the canonical envelope bytes for a raw response.
///
/// Only the `success` field is ever rewritten; every other field, known or not,
/// passes through.
///
/// # Errors
///
/// Returns [`Error::Decode`] if a non-HTML body is not a JSON object, or if
/// `success` holds a number, array or object.
pub fn normalize(body: &[u8], status: StatusCode, content_type: Option<&str>) -> Result<Vec<u8>> {
    if is_html(content_type) {
        warn!(%status, bytes = body.len(), "backend returned an HTML page, discarding body");
        return Ok(serde_json::to_vec(&Envelope::failure(HTML_FAILURE_MESSAGE))?);
    }

    let mut fields: Map<String, Value> = serde_json::from_slice(body)
        .map_err(|err| Error::Decode(format!("response body is not a JSON object: {err}")))?;

    let corrected = match fields.get(SUCCESS_FIELD) {
        Some(Value::Bool(_)) => None,
        Some(Value::String(text)) => {
            let parsed = parse_flag(text);
            if parsed.is_none() {
                warn!(value = %text, "unrecognised `success` string, treating as failure");
            }
            Some(parsed.unwrap_or(false))
        }
        Some(Value::Null) => {
            warn!("`success` is null, treating as failure");
            Some(false)
        }
        Some(other) => {
            return Err(Error::Decode(format!(
                "`{SUCCESS_FIELD}` must be a boolean, got {other}"
            )));
        }
        None => {
            let inferred = status.is_success();
            if !inferred {
                warn!(%status, "response has no `success` field, treating as failure");
            }
            Some(inferred)
        }
    };

    if let Some(success) = corrected {
        fields.insert(SUCCESS_FIELD.to_string(), Value::Bool(success));
    }

    Ok(serde_json::to_vec(&fields)?)
}

fn is_html(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.trim_start().get(..HTML_CONTENT_TYPE.len()))
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(HTML_CONTENT_TYPE))
}

fn parse_flag(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
