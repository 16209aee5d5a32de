//! Error taxonomy for backend calls
//!
//! Validation failures never reach the network. Everything else is sorted by
//! what the user can do about it: 4xx means fix the input, 5xx / no response
//! means try again later.

use std::fmt;

/// Longest non-JSON error body we carry around for display
const MAX_RAW_DETAIL: usize = 200;

/// Input rejected locally, before any request is made
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter some text to analyze")]
    EmptyText,

    #[error("Text must be at least {min} characters long")]
    TextTooShort { min: usize, actual: usize },

    #[error("Please select a valid image file (JPG, PNG, or WebP)")]
    UnsupportedImageType { mime: String },

    #[error("File size must be less than 10MB")]
    ImageTooLarge { size: u64, max: u64 },

    #[error("Please select an image to analyze")]
    EmptyFile,

    #[error("Could not read file: {message}")]
    Io { message: String },
}

impl ValidationError {
    /// The measured value behind the message, for logs and CLI output
    pub fn context(&self) -> Option<String> {
        match self {
            ValidationError::TextTooShort { min, actual } => {
                Some(format!("got {} of {} characters", actual, min))
            }
            ValidationError::UnsupportedImageType { mime } => Some(format!("got {}", mime)),
            ValidationError::ImageTooLarge { size, max } => Some(format!(
                "file is {:.2} MB, limit is {:.2} MB",
                *size as f64 / 1024.0 / 1024.0,
                *max as f64 / 1024.0 / 1024.0
            )),
            ValidationError::EmptyText | ValidationError::EmptyFile | ValidationError::Io { .. } => None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Request rejected ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Request { status: u16, detail: Option<String> },

    #[error("Server error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Server { status: u16, detail: Option<String> },

    #[error("Network error: {message}")]
    Network { message: String, timed_out: bool },

    #[error("Unexpected response: {message}")]
    Decode { message: String },
}

/// What the user is being asked to do about a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input, fix and resubmit
    UserFixable,
    /// Backend or connection trouble, retrying may help
    Retryable,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::UserFixable => write!(f, "user-fixable"),
            ErrorClass::Retryable => write!(f, "retryable"),
        }
    }
}

impl ApiError {
    /// Build the error for a non-success status, pulling `detail` out of the body
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = extract_detail(body);
        if (400..500).contains(&status) {
            ApiError::Request { status, detail }
        } else {
            ApiError::Server { status, detail }
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ApiError::Validation(_) | ApiError::Request { .. } => ErrorClass::UserFixable,
            ApiError::Server { .. } | ApiError::Network { .. } | ApiError::Decode { .. } => {
                ErrorClass::Retryable
            }
        }
    }

    pub fn is_user_fixable(&self) -> bool {
        self.class() == ErrorClass::UserFixable
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Message for an inline error banner. Prefers the backend's own `detail`,
    /// otherwise falls back to a generic "Failed to <action>" line.
    pub fn user_message(&self, action: &str) -> String {
        match self {
            ApiError::Validation(v) => v.to_string(),
            ApiError::Request { detail: Some(d), .. } | ApiError::Server { detail: Some(d), .. } => {
                d.clone()
            }
            ApiError::Network { timed_out: true, .. } => {
                format!("Failed to {}: the backend did not respond in time.", action)
            }
            ApiError::Network { .. } => {
                format!("Failed to {}: could not reach the backend.", action)
            }
            _ => format!("Failed to {}. Please try again.", action),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return ApiError::from_status(status.as_u16(), "");
        }
        if e.is_decode() {
            return ApiError::Decode { message: e.to_string() };
        }
        ApiError::Network {
            message: e.to_string(),
            timed_out: e.is_timeout(),
        }
    }
}

/// Pull a human-readable `detail` out of an error body.
///
/// FastAPI-style backends send `{"detail": "..."}` for handled errors and
/// `{"detail": [{"msg": ...}, ...]}` for request validation failures.
pub fn extract_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Array(items)) => {
                let msgs: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .map(str::to_string)
                    .collect();
                if msgs.is_empty() {
                    Some(serde_json::Value::Array(items.clone()).to_string())
                } else {
                    Some(msgs.join("; "))
                }
            }
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        },
        Err(_) => Some(body.chars().take(MAX_RAW_DETAIL).collect()),
    }
}
