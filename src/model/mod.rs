use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroup {
    pub name: String,
    pub creation_time: Option<i64>,
    pub retention_days: Option<i32>,
    pub stored_bytes: Option<i64>,
}

#[cfg(test)]
impl LogGroup {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_time: None,
            retention_days: None,
            stored_bytes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStream {
    pub name: String,
    pub first_event_timestamp: Option<i64>,
    pub last_event_timestamp: Option<i64>,
}

#[cfg(test)]
impl LogStream {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            first_event_timestamp: None,
            last_event_timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp: i64,
    pub message: String,
    pub ingestion_time: i64,
}

/// Opaque continuation token issued by the log provider. Only ever compared
/// for equality, never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub events: Vec<LogEvent>,
    pub next_token: Option<PageToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub group: String,
    pub stream: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub limit: i32,
    pub start_from_head: bool,
    pub token: Option<PageToken>,
}
