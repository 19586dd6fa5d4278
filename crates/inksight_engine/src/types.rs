use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

pub type SendId = u64;

/// Lifecycle phase announced by the scanning pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusAction {
    Start,
    Scanning,
    Processing,
    End,
    /// Anything else, including frames that carry no `action` at all.
    Other(String),
}

impl StatusAction {
    pub fn from_wire(action: Option<&str>) -> Self {
        match action {
            Some("start") => StatusAction::Start,
            Some("scanning") => StatusAction::Scanning,
            Some("processing") => StatusAction::Processing,
            Some("end") => StatusAction::End,
            Some(other) => StatusAction::Other(other.to_string()),
            None => StatusAction::Other(String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub action: StatusAction,
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceImage {
    #[serde(deserialize_with = "string_or_number")]
    pub page_number: String,
    pub image_path: String,
    pub score: f32,
}

/// One decoded frame of a streamed chat reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatFrame {
    SourceImages(Vec<SourceImage>),
    Response(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub content: String,
}

/// Body of the chat POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub query: String,
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSummary {
    pub frames: usize,
    pub skipped: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StatusOpened,
    Status(StatusEvent),
    StatusClosed {
        error: Option<StatusError>,
    },
    Chat {
        send_id: SendId,
        frame: ChatFrame,
    },
    ChatCompleted {
        send_id: SendId,
        result: Result<StreamSummary, ChatError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ChatError {
    pub kind: FailureKind,
    pub message: String,
}

impl ChatError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "send cancelled")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidRequest,
    HttpStatus(u16),
    Timeout,
    MissingBody,
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidRequest => write!(f, "invalid request"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::MissingBody => write!(f, "missing response body"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("invalid status url: {0}")]
    InvalidUrl(String),
    #[error("status connect failed: {0}")]
    Connect(String),
    #[error("status connect timed out")]
    Timeout,
    #[error("status socket error: {0}")]
    Protocol(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Integer(i64),
    Float(f64),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(value) => value,
        StringOrNumber::Integer(value) => value.to_string(),
        StringOrNumber::Float(value) => value.to_string(),
    })
}
