//! Crate-wide error type for the transfer engine

use serde::Deserialize;

pub type TransferResult<T> = Result<T, TransferError>;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Authorization failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Client is not authorized. Authorize first.")]
    NotAuthorized,

    #[error("Upload failed ({status}): {message}")]
    Upload { status: u16, message: String },

    #[error("Download failed ({status}): {message}")]
    Download { status: u16, message: String },

    #[error("Request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transfer stopped by user.")]
    Stopped,

    #[error("{0}")]
    Validation(String),

    #[error("Another transfer is already running")]
    JobActive,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransferError {
    /// True for user-initiated cancellation, which is never retried.
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransferError::Stopped)
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        TransferError::Validation(message.into())
    }
}

/// Error document returned by the service on non-2xx responses
#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Render a failed response body, preferring the service's `code: message` form.
pub(crate) fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<ServiceErrorBody>(body) {
        Ok(parsed) if !parsed.code.is_empty() || !parsed.message.is_empty() => {
            if parsed.code.is_empty() {
                parsed.message
            } else if parsed.message.is_empty() {
                parsed.code
            } else {
                format!("{}: {}", parsed.code, parsed.message)
            }
        }
        _ => body.trim().to_string(),
    }
}

/// Read status and body from a failed response.
pub(crate) async fn read_failure(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    (status, describe_error_body(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_prefers_code_and_message() {
        let body = r#"{"status":401,"code":"bad_auth_token","message":"Invalid token"}"#;
        assert_eq!(describe_error_body(body), "bad_auth_token: Invalid token");
    }

    #[test]
    fn error_body_falls_back_to_raw_text() {
        assert_eq!(describe_error_body("  gateway timeout \n"), "gateway timeout");
    }

    #[test]
    fn stopped_is_distinguished() {
        assert!(TransferError::Stopped.is_stopped());
        assert!(!TransferError::NotAuthorized.is_stopped());
        assert_eq!(TransferError::Stopped.to_string(), "Transfer stopped by user.");
    }
}
