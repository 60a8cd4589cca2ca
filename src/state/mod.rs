use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    favorites::{Favorites, FavoritesError, FavoritesStore},
    format::{RenderedMessage, format_message},
    model::{LogEvent, LogGroup, LogStream, PageToken},
    pager,
    provider::{FetchError, LogProvider},
    window::{self, FormatError, RangeQuery, TimeWindow},
};

#[derive(Debug, Clone, Copy)]
pub struct ListLimits {
    pub groups: i32,
    pub streams: i32,
}

impl Default for ListLimits {
    fn default() -> Self {
        Self {
            groups: 50,
            streams: 50,
        }
    }
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Favorites(#[from] FavoritesError),
}

#[derive(Debug, Clone)]
pub struct GroupRow {
    pub group: LogGroup,
    pub favorite: bool,
}

#[derive(Debug, Clone)]
pub struct StreamRow {
    pub stream: LogStream,
    pub favorite: bool,
}

#[derive(Debug, Clone)]
pub struct EventRow {
    pub event: LogEvent,
    pub message: RenderedMessage,
}

#[derive(Debug, Clone)]
pub struct EventsView {
    pub group: String,
    pub stream: String,
    pub window: TimeWindow,
    pub events: Vec<EventRow>,
    pub next_token: Option<PageToken>,
    pub favorite: bool,
}

pub struct AppState {
    provider: Arc<dyn LogProvider>,
    favorites: FavoritesStore,
    limits: ListLimits,
}

impl AppState {
    pub fn new(provider: Arc<dyn LogProvider>, favorites: FavoritesStore, limits: ListLimits) -> Self {
        Self {
            provider,
            favorites,
            limits,
        }
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub async fn group_rows(&self) -> Result<Vec<GroupRow>, ViewError> {
        let groups = self
            .provider
            .list_groups(self.limits.groups)
            .await
            .map_err(|source| FetchError::Groups { source })?;
        let favorites = self.favorites_or_empty().await;

        let mut rows: Vec<_> = groups
            .into_iter()
            .map(|group| GroupRow {
                favorite: favorites.is_group_favorite(&group.name),
                group,
            })
            .collect();
        rows.sort_by_key(|row| !row.favorite);
        Ok(rows)
    }

    pub async fn stream_rows(&self, group: &str) -> Result<(bool, Vec<StreamRow>), ViewError> {
        let streams = self
            .provider
            .list_streams(group, self.limits.streams)
            .await
            .map_err(|source| FetchError::Streams {
                group: group.to_owned(),
                source,
            })?;
        let favorites = self.favorites_or_empty().await;

        let mut rows: Vec<_> = streams
            .into_iter()
            .map(|stream| StreamRow {
                favorite: favorites.is_stream_favorite(group, &stream.name),
                stream,
            })
            .collect();
        rows.sort_by_key(|row| !row.favorite);
        Ok((favorites.is_group_favorite(group), rows))
    }

    /// The latest-event anchor is only needed when the request carries no
    /// explicit end; `latest_hint` saves the metadata lookup when the caller
    /// already knows it.
    pub async fn events_view(
        &self,
        group: &str,
        stream: &str,
        range: &RangeQuery,
        token: Option<PageToken>,
        latest_hint: Option<i64>,
        now_ms: i64,
    ) -> Result<EventsView, ViewError> {
        let needs_anchor = range.end.as_deref().is_none_or(|end| end.trim().is_empty());
        let latest = match latest_hint {
            Some(latest) => Some(latest),
            None if needs_anchor => self.latest_event_time(group, stream).await?,
            None => None,
        };

        let window = window::resolve(range, latest, now_ms)?;
        debug!(
            group,
            stream,
            start = window.start_ms(),
            end = window.end_ms(),
            width_ms = window.width_ms(),
            "resolved event window"
        );

        let page =
            pager::fetch_with_lookahead(self.provider.as_ref(), group, stream, window, token)
                .await?;

        let favorite = self
            .favorites_or_empty()
            .await
            .is_stream_favorite(group, stream);

        let events = page
            .events
            .into_iter()
            .map(|event| EventRow {
                message: format_message(&event.message),
                event,
            })
            .collect();

        Ok(EventsView {
            group: group.to_owned(),
            stream: stream.to_owned(),
            window,
            events,
            next_token: page.next_token,
            favorite,
        })
    }

    /// Listings never fail on an unreadable favorites file; they render as if
    /// nothing were starred. Toggling still reports the error.
    async fn favorites_or_empty(&self) -> Favorites {
        self.favorites.snapshot().await.unwrap_or_else(|err| {
            warn!(%err, "could not read favorites; listing without them");
            Favorites::default()
        })
    }

    async fn latest_event_time(&self, group: &str, stream: &str) -> Result<Option<i64>, FetchError> {
        let described = self
            .provider
            .describe_stream(group, stream)
            .await
            .map_err(|source| FetchError::Events {
                group: group.to_owned(),
                stream: stream.to_owned(),
                source,
            })?;
        Ok(described.and_then(|stream| stream.last_event_timestamp))
    }
}
