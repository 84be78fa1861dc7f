//! Shared handling of provider HTTP responses and LLM answer text.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use tracing::{debug, warn};

use super::Result;
use crate::error::ExtractionError;
use crate::models::receipt::ExtractedRecord;

/// Strip a markdown code fence (```` ```json ```` or ```` ``` ````) around an answer.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();

    let inner = if let Some((_, rest)) = text.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = text.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        text
    };

    inner.trim()
}

/// Parse an LLM answer into a record.
///
/// The fenced body is tried first, then the widest `{ … }` span, so prose
/// around the object is tolerated. Anything else is a malformed response.
pub fn parse_record(text: &str) -> Result<ExtractedRecord> {
    let body = strip_code_fence(text);

    if let Ok(record) = parse_object(body) {
        return Ok(record.with_raw_text(text));
    }

    let span = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => {
            return Err(ExtractionError::MalformedResponse(format!(
                "no JSON object in answer: {}",
                preview(text)
            )));
        }
    };

    parse_object(span)
        .map(|record| record.with_raw_text(text))
        .map_err(|e| ExtractionError::MalformedResponse(format!("{}: {}", e, preview(text))))
}

fn parse_object(body: &str) -> std::result::Result<ExtractedRecord, String> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("answer is not a JSON object".to_string());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    let trimmed = text.trim();
    if trimmed.chars().count() > MAX {
        format!("{}…", trimmed.chars().take(MAX).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

/// Map a transport-level reqwest failure.
pub(crate) fn transport_error(e: reqwest::Error) -> ExtractionError {
    if e.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        return ExtractionError::RateLimited { retry_after: None };
    }
    ExtractionError::Transport(e.to_string())
}

/// Read a response body, classifying non-success statuses.
pub(crate) async fn read_body(provider: &str, response: Response) -> Result<String> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    let body = response.text().await.map_err(transport_error)?;
    debug!("{} responded {} ({} bytes)", provider, status, body.len());

    if status.is_success() {
        return Ok(body);
    }

    let err = classify_failure(status, &body, retry_after);
    warn!("{} request failed: {}", provider, err);
    Err(err)
}

/// Classify a non-success status and body.
pub(crate) fn classify_failure(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> ExtractionError {
    let lower = body.to_ascii_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS
        || lower.contains("resource_exhausted")
        || lower.contains("rate limit")
        || lower.contains("quota")
    {
        return ExtractionError::RateLimited { retry_after };
    }

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || lower.contains("api_key_invalid")
        || lower.contains("api key not valid")
    {
        return ExtractionError::Auth(format!("{}: {}", status, preview(body)));
    }

    ExtractionError::Upstream {
        status: status.as_u16(),
        message: preview(body),
    }
}
