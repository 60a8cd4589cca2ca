use std::collections::HashSet;

use tracing::debug;

use crate::{
    model::{EventQuery, LogEvent, PageToken},
    provider::{FetchError, LogProvider},
    window::TimeWindow,
};

/// Events requested per provider call.
pub const PAGE_LIMIT: i32 = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPage {
    pub events: Vec<LogEvent>,
    pub next_token: Option<PageToken>,
}

/// Fetches the next non-empty page of events, newest first.
///
/// Empty batches that hand back a fresh token are followed; an empty batch
/// with no token, or with a token already seen during this call, ends the
/// stream with `([], None)`. The returned token is never one that was sent.
pub async fn fetch_page(
    provider: &dyn LogProvider,
    group: &str,
    stream: &str,
    window: TimeWindow,
    token: Option<PageToken>,
) -> Result<EventPage, FetchError> {
    let mut seen: HashSet<PageToken> = token.iter().cloned().collect();
    let mut current = token;

    loop {
        let query = EventQuery {
            group: group.to_owned(),
            stream: stream.to_owned(),
            start_ms: window.start_ms(),
            end_ms: window.end_ms(),
            limit: PAGE_LIMIT,
            start_from_head: false,
            token: current.clone(),
        };

        let batch = provider
            .get_events(&query)
            .await
            .map_err(|source| FetchError::Events {
                group: group.to_owned(),
                stream: stream.to_owned(),
                source,
            })?;

        let next_token = batch.next_token.filter(|next| !seen.contains(next));

        if !batch.events.is_empty() {
            return Ok(EventPage {
                events: batch.events,
                next_token,
            });
        }

        match next_token {
            Some(next) => {
                debug!(group, stream, "skipping empty page");
                seen.insert(next.clone());
                current = Some(next);
            }
            None => {
                debug!(group, stream, "pagination exhausted");
                return Ok(EventPage::default());
            }
        }
    }
}

/// Fetches a page and, when it advertises a continuation, peeks one page
/// further so that a dead-end token is never surfaced.
pub async fn fetch_with_lookahead(
    provider: &dyn LogProvider,
    group: &str,
    stream: &str,
    window: TimeWindow,
    token: Option<PageToken>,
) -> Result<EventPage, FetchError> {
    let mut page = fetch_page(provider, group, stream, window, token).await?;

    if let Some(next) = page.next_token.clone() {
        let peek = fetch_page(provider, group, stream, window, Some(next)).await?;
        if peek.events.is_empty() {
            debug!(group, stream, "peek found no further events; hiding token");
            page.next_token = None;
        }
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::EventBatch,
        provider::{
            ProviderError, ProviderErrorKind,
            fake::{FakeLogProvider, batch},
        },
    };

    fn window() -> TimeWindow {
        TimeWindow::new(0, 10_000).expect("window")
    }

    #[tokio::test]
    async fn returns_first_page_with_its_token() {
        let provider = FakeLogProvider::with_batches([batch(&["a", "b"], Some("t1"))]);

        let page = fetch_page(&provider, "g", "s", window(), None)
            .await
            .expect("page");

        assert_eq!(page.events.len(), 2);
        assert_eq!(page.next_token, Some(PageToken::from("t1")));

        let queries = provider.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].limit, PAGE_LIMIT);
        assert!(!queries[0].start_from_head);
        assert_eq!((queries[0].start_ms, queries[0].end_ms), (0, 10_000));
        assert_eq!(queries[0].token, None);
    }

    #[tokio::test]
    async fn skips_empty_pages_that_advance_the_token() {
        let provider = FakeLogProvider::with_batches([
            batch(&[], Some("t1")),
            batch(&[], Some("t2")),
            batch(&["found"], Some("t3")),
        ]);

        let page = fetch_page(&provider, "g", "s", window(), None)
            .await
            .expect("page");

        assert_eq!(page.events[0].message, "found");
        assert_eq!(page.next_token, Some(PageToken::from("t3")));

        let tokens: Vec<_> = provider
            .queries()
            .into_iter()
            .map(|query| query.token)
            .collect();
        assert_eq!(
            tokens,
            vec![None, Some(PageToken::from("t1")), Some(PageToken::from("t2"))]
        );
    }

    #[tokio::test]
    async fn empty_page_without_token_ends_the_stream() {
        let provider = FakeLogProvider::with_batches([batch(&[], None)]);

        let page = fetch_page(&provider, "g", "s", window(), Some("t0".into()))
            .await
            .expect("page");

        assert_eq!(page, EventPage::default());
        assert_eq!(provider.queries().len(), 1);
    }

    #[tokio::test]
    async fn repeated_token_ends_the_stream() {
        let provider = FakeLogProvider::with_batches([batch(&[], Some("same"))]);

        let page = fetch_page(&provider, "g", "s", window(), Some("same".into()))
            .await
            .expect("page");

        assert_eq!(page, EventPage::default());
        assert_eq!(provider.queries().len(), 1);
    }

    #[tokio::test]
    async fn token_cycle_terminates() {
        let provider = FakeLogProvider::with_batches([
            batch(&[], Some("b")),
            batch(&[], Some("a")),
            batch(&["never reached"], None),
        ]);

        let page = fetch_page(&provider, "g", "s", window(), Some("a".into()))
            .await
            .expect("page");

        assert!(page.events.is_empty());
        assert_eq!(page.next_token, None);
        assert_eq!(provider.queries().len(), 2);
    }

    #[tokio::test]
    async fn never_returns_the_supplied_token() {
        let provider = FakeLogProvider::with_batches([batch(&["last"], Some("t9"))]);

        let page = fetch_page(&provider, "g", "s", window(), Some("t9".into()))
            .await
            .expect("page");

        assert_eq!(page.events.len(), 1);
        assert_eq!(page.next_token, None);
    }

    #[tokio::test]
    async fn provider_fault_carries_identifiers() {
        let provider = FakeLogProvider::default();
        provider.push(Err(ProviderError::new(
            ProviderErrorKind::NotFound,
            "stream does not exist",
        )));

        let err = fetch_page(&provider, "/aws/lambda/app", "2024/05/01", window(), None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ProviderErrorKind::NotFound);
        let FetchError::Events { group, stream, .. } = err else {
            panic!("expected an events fault, got {err:?}");
        };
        assert_eq!(group, "/aws/lambda/app");
        assert_eq!(stream, "2024/05/01");
        assert_eq!(provider.queries().len(), 1, "faults are not retried");
    }

    #[tokio::test]
    async fn lookahead_hides_dead_end_token() {
        let provider = FakeLogProvider::with_batches([
            batch(&["a"], Some("t1")),
            batch(&[], Some("t1")),
        ]);

        let page = fetch_with_lookahead(&provider, "g", "s", window(), None)
            .await
            .expect("page");

        assert_eq!(page.events.len(), 1);
        assert_eq!(page.next_token, None);
        assert_eq!(provider.queries().len(), 2);
    }

    #[tokio::test]
    async fn lookahead_keeps_token_when_more_events_exist() {
        let provider = FakeLogProvider::with_batches([
            batch(&["a"], Some("t1")),
            batch(&["b"], Some("t2")),
        ]);

        let page = fetch_with_lookahead(&provider, "g", "s", window(), None)
            .await
            .expect("page");

        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].message, "a");
        assert_eq!(page.next_token, Some(PageToken::from("t1")));
    }

    #[tokio::test]
    async fn lookahead_skips_peek_without_token() {
        let provider = FakeLogProvider::with_batches([EventBatch {
            events: vec![],
            next_token: None,
        }]);

        let page = fetch_with_lookahead(&provider, "g", "s", window(), None)
            .await
            .expect("page");

        assert_eq!(page, EventPage::default());
        assert_eq!(provider.queries().len(), 1);
    }
}
