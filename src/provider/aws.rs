use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::{
    Client,
    error::{DisplayErrorContext, ProvideErrorMetadata},
    types::OrderBy,
};
use tracing::debug;

use super::{LogProvider, ProviderError, ProviderErrorKind};
use crate::model::{EventBatch, EventQuery, LogEvent, LogGroup, LogStream, PageToken};

const DESCRIBE_STREAM_SCAN: i32 = 50;

#[derive(Debug, Clone)]
pub struct AwsLogProvider {
    client: Client,
}

impl AwsLogProvider {
    pub async fn from_env(region: Option<String>, profile: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        Self {
            client: Client::new(&config),
        }
    }
}

#[async_trait]
impl LogProvider for AwsLogProvider {
    async fn list_groups(&self, limit: i32) -> Result<Vec<LogGroup>, ProviderError> {
        let response = self
            .client
            .describe_log_groups()
            .limit(limit)
            .send()
            .await
            .map_err(provider_error)?;

        Ok(response
            .log_groups()
            .iter()
            .filter_map(|group| {
                Some(LogGroup {
                    name: group.log_group_name()?.to_owned(),
                    creation_time: group.creation_time(),
                    retention_days: group.retention_in_days(),
                    stored_bytes: group.stored_bytes(),
                })
            })
            .collect())
    }

    async fn list_streams(&self, group: &str, limit: i32) -> Result<Vec<LogStream>, ProviderError> {
        let response = self
            .client
            .describe_log_streams()
            .log_group_name(group)
            .order_by(OrderBy::LastEventTime)
            .descending(true)
            .limit(limit)
            .send()
            .await
            .map_err(provider_error)?;

        Ok(response.log_streams().iter().filter_map(convert_stream).collect())
    }

    async fn describe_stream(
        &self,
        group: &str,
        stream: &str,
    ) -> Result<Option<LogStream>, ProviderError> {
        let response = self
            .client
            .describe_log_streams()
            .log_group_name(group)
            .log_stream_name_prefix(stream)
            .limit(DESCRIBE_STREAM_SCAN)
            .send()
            .await
            .map_err(provider_error)?;

        Ok(response
            .log_streams()
            .iter()
            .filter_map(convert_stream)
            .find(|candidate| candidate.name == stream))
    }

    async fn get_events(&self, query: &EventQuery) -> Result<EventBatch, ProviderError> {
        debug!(
            group = %query.group,
            stream = %query.stream,
            start = query.start_ms,
            end = query.end_ms,
            limit = query.limit,
            start_from_head = query.start_from_head,
            has_token = query.token.is_some(),
            "calling GetLogEvents"
        );

        let response = self
            .client
            .get_log_events()
            .log_group_name(&query.group)
            .log_stream_name(&query.stream)
            .start_time(query.start_ms)
            .end_time(query.end_ms)
            .limit(query.limit)
            .start_from_head(query.start_from_head)
            .set_next_token(query.token.as_ref().map(|token| token.as_str().to_owned()))
            .send()
            .await
            .map_err(provider_error)?;

        let events = response
            .events()
            .iter()
            .map(|event| LogEvent {
                timestamp: event.timestamp().unwrap_or_default(),
                message: event.message().unwrap_or_default().to_owned(),
                ingestion_time: event.ingestion_time().unwrap_or_default(),
            })
            .collect();

        // Reading from the tail, the backward token is the one that continues
        // towards older events.
        let next_token = if query.start_from_head {
            response.next_forward_token()
        } else {
            response.next_backward_token()
        };

        Ok(EventBatch {
            events,
            next_token: next_token.map(PageToken::from),
        })
    }
}

fn convert_stream(stream: &aws_sdk_cloudwatchlogs::types::LogStream) -> Option<LogStream> {
    Some(LogStream {
        name: stream.log_stream_name()?.to_owned(),
        first_event_timestamp: stream.first_event_timestamp(),
        last_event_timestamp: stream.last_event_timestamp(),
    })
}

fn provider_error<E>(error: E) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let kind = classify(error.code());
    ProviderError::new(kind, DisplayErrorContext(&error).to_string())
}

fn classify(code: Option<&str>) -> ProviderErrorKind {
    match code {
        Some("ResourceNotFoundException") => ProviderErrorKind::NotFound,
        Some("ThrottlingException" | "LimitExceededException") => ProviderErrorKind::Throttled,
        Some(
            "AccessDeniedException"
            | "UnrecognizedClientException"
            | "ExpiredTokenException"
            | "InvalidSignatureException",
        ) => ProviderErrorKind::AccessDenied,
        _ => ProviderErrorKind::Service,
    }
}
