use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;

use super::{LogProvider, ProviderError};
use crate::model::{EventBatch, EventQuery, LogEvent, LogGroup, LogStream, PageToken};

/// Scripted provider: `get_events` replays queued responses in order and
/// records every query it receives.
#[derive(Debug, Default)]
pub struct FakeLogProvider {
    groups: Vec<LogGroup>,
    streams: Vec<LogStream>,
    groups_error: Option<ProviderError>,
    responses: Mutex<VecDeque<Result<EventBatch, ProviderError>>>,
    queries: Mutex<Vec<EventQuery>>,
    describe_calls: Mutex<usize>,
}

impl FakeLogProvider {
    pub fn with_batches<I>(batches: I) -> Self
    where
        I: IntoIterator<Item = EventBatch>,
    {
        let provider = Self::default();
        for batch in batches {
            provider.push(Ok(batch));
        }
        provider
    }

    pub fn groups(mut self, groups: Vec<LogGroup>) -> Self {
        self.groups = groups;
        self
    }

    pub fn streams(mut self, streams: Vec<LogStream>) -> Self {
        self.streams = streams;
        self
    }

    pub fn failing_groups(mut self, error: ProviderError) -> Self {
        self.groups_error = Some(error);
        self
    }

    pub fn push(&self, response: Result<EventBatch, ProviderError>) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(response);
    }

    pub fn queries(&self) -> Vec<EventQuery> {
        self.queries.lock().expect("queries lock").clone()
    }

    pub fn describe_calls(&self) -> usize {
        *self.describe_calls.lock().expect("describe lock")
    }
}

pub fn batch(messages: &[&str], token: Option<&str>) -> EventBatch {
    EventBatch {
        events: messages
            .iter()
            .enumerate()
            .map(|(index, message)| event(1_000 + index as i64, message))
            .collect(),
        next_token: token.map(PageToken::from),
    }
}

pub fn event(timestamp: i64, message: &str) -> LogEvent {
    LogEvent {
        timestamp,
        message: message.to_owned(),
        ingestion_time: timestamp + 5,
    }
}

#[async_trait]
impl LogProvider for FakeLogProvider {
    async fn list_groups(&self, limit: i32) -> Result<Vec<LogGroup>, ProviderError> {
        if let Some(error) = &self.groups_error {
            return Err(error.clone());
        }
        Ok(self.groups.iter().take(limit as usize).cloned().collect())
    }

    async fn list_streams(&self, _group: &str, limit: i32) -> Result<Vec<LogStream>, ProviderError> {
        Ok(self.streams.iter().take(limit as usize).cloned().collect())
    }

    async fn describe_stream(
        &self,
        _group: &str,
        stream: &str,
    ) -> Result<Option<LogStream>, ProviderError> {
        *self.describe_calls.lock().expect("describe lock") += 1;
        Ok(self.streams.iter().find(|s| s.name == stream).cloned())
    }

    async fn get_events(&self, query: &EventQuery) -> Result<EventBatch, ProviderError> {
        self.queries
            .lock()
            .expect("queries lock")
            .push(query.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Ok(EventBatch::default()))
    }
}
