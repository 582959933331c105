//! Shared API error response parsing across all providers.
//!
//! Handles multiple error envelope formats:
//! - OpenAI-style (Groq, Perplexity): `{"error": {"message": "...", "type": "...", "code": "..."}}`
//! - Google:   `{"error": {"message": "...", "status": "..."}}`
//! - Detail:   `{"detail": "..."}`
//! - Flat:     `{"message": "...", "code": "..."}`

use serde_json::Value;

/// Parsed API error information.
pub struct ApiErrorInfo {
    /// Human-readable error message.
    pub message: String,
    /// Provider-specific error code (e.g., `"context_length_exceeded"`, `"INVALID_ARGUMENT"`).
    pub code: Option<String>,
}

/// Parse an API error response body into structured error info.
///
/// Tries multiple JSON error formats in order of specificity, falling back
/// to the raw body text if nothing matches.
pub fn parse_api_error(body: &str, status: u16) -> ApiErrorInfo {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = json["error"]["message"].as_str() {
            // `code` is the most specific marker OpenAI-compatible APIs send.
            let code = json["error"]["code"]
                .as_str()
                .or_else(|| json["error"]["type"].as_str())
                .or_else(|| json["error"]["status"].as_str())
                .map(String::from);
            return ApiErrorInfo {
                message: msg.to_string(),
                code,
            };
        }

        if let Some(msg) = json["detail"].as_str().or_else(|| json["message"].as_str()) {
            let code = json["code"]
                .as_str()
                .or_else(|| json["type"].as_str())
                .map(String::from);
            return ApiErrorInfo {
                message: msg.to_string(),
                code,
            };
        }

        // A bare string error: {"error": "..."}
        if let Some(msg) = json["error"].as_str() {
            return ApiErrorInfo {
                message: msg.to_string(),
                code: None,
            };
        }
    }

    ApiErrorInfo {
        message: format!("HTTP {status}: {body}"),
        code: None,
    }
}
