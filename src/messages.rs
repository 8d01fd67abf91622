//! `{status, data}` response envelopes shared by every HTTP handler.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub status: Status,
    pub data: Value,
}

/// Body of success/warning/error messages. Absent `code`/`name` are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message: String,
}

fn with_body(status: Status, message: String, name: Option<&str>, code: Option<Value>) -> ApiMessage {
    let body = MessageBody { code, name: name.map(str::to_string), message };
    // MessageBody always serializes to an object
    let data = serde_json::to_value(body).unwrap_or(Value::Null);
    ApiMessage { status, data }
}

pub fn data_message(data: impl Into<Value>) -> ApiMessage {
    ApiMessage { status: Status::Success, data: data.into() }
}

pub fn success_message(message: &str, name: Option<&str>, code: Option<Value>) -> ApiMessage {
    with_body(Status::Success, message.to_string(), name, code)
}

pub fn warning_message(message: &str, name: Option<&str>, code: Option<Value>) -> ApiMessage {
    with_body(Status::Warning, message.to_string(), name, code)
}

pub fn error_message(message: Option<&str>, name: Option<&str>, code: Option<Value>) -> ApiMessage {
    let message = message.filter(|m| !m.is_empty()).unwrap_or("Unknown error");
    with_body(Status::Error, message.to_string(), name, code)
}

pub fn unauthorized_message() -> ApiMessage {
    error_message(Some("Unauthorized. Access denied."), Some("Unauthorized"), Some(Value::from(401)))
}

impl From<&AuthError> for ApiMessage {
    fn from(e: &AuthError) -> Self {
        error_message(Some(&e.to_string()), Some(e.code_str()), Some(Value::from(e.http_status())))
    }
}
