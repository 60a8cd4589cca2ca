use async_trait::async_trait;
use thiserror::Error;

use crate::model::{EventBatch, EventQuery, LogGroup, LogStream};

pub mod aws;
#[cfg(test)]
pub mod fake;

pub use aws::AwsLogProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    NotFound,
    Throttled,
    AccessDenied,
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A provider fault, tagged with the group/stream it was raised for.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("failed to list log groups: {source}")]
    Groups { source: ProviderError },
    #[error("failed to list streams of {group}: {source}")]
    Streams {
        group: String,
        source: ProviderError,
    },
    #[error("failed to fetch events of {group} / {stream}: {source}")]
    Events {
        group: String,
        stream: String,
        source: ProviderError,
    },
}

impl FetchError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Groups { source } | Self::Streams { source, .. } | Self::Events { source, .. } => {
                source.kind
            }
        }
    }
}

#[async_trait]
pub trait LogProvider: Send + Sync {
    async fn list_groups(&self, limit: i32) -> Result<Vec<LogGroup>, ProviderError>;

    async fn list_streams(&self, group: &str, limit: i32) -> Result<Vec<LogStream>, ProviderError>;

    async fn describe_stream(
        &self,
        group: &str,
        stream: &str,
    ) -> Result<Option<LogStream>, ProviderError>;

    async fn get_events(&self, query: &EventQuery) -> Result<EventBatch, ProviderError>;
}
