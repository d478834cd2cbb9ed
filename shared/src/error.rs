use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Field-level messages from a rejected registration, in the order the
/// server sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    fields: Vec<(String, Vec<String>)>,
}

impl FieldErrors {
    /// Flattens a server error body. Values may be a message, a list of
    /// messages, or anything else, which is rendered as JSON text.
    pub fn from_body(body: &str) -> Self {
        let mut fields = Vec::new();
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
            for (field, value) in map {
                let messages = match value {
                    Value::String(message) => vec![message],
                    Value::Array(items) => items.into_iter().map(message_text).collect(),
                    other => vec![message_text(other)],
                };
                fields.push((field, messages));
            }
        }
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(|(_, messages)| messages.is_empty())
    }

    /// All messages joined by single spaces.
    pub fn summary(&self) -> String {
        self.fields
            .iter()
            .flat_map(|(_, messages)| messages)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn message_text(value: Value) -> String {
    match value {
        Value::String(message) => message,
        other => other.to_string(),
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Registration failed")
        } else {
            f.write_str(&self.summary())
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    Validation(FieldErrors),

    #[error("{0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request failed with status {status}")]
    Request { status: u16 },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Network(err.0)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// The request never produced an HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable")]
    Unavailable,

    #[error("storage rejected write to {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
