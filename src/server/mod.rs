use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle, time};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    model::PageToken,
    provider::ProviderErrorKind,
    state::{AppState, EventsView, ViewError},
    ui,
    window::{RangeQuery, format_timestamp},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

#[derive(Clone)]
struct HttpState {
    app_state: Arc<AppState>,
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<Result<(), std::io::Error>>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting connections and lets in-flight requests finish for up
    /// to [`SHUTDOWN_GRACE`] before the server task is aborted.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(stop) = self.shutdown.take() {
            let _ = stop.send(());
        }
        let Some(mut task) = self.join_handle.take() else {
            return Ok(());
        };

        match time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(joined) => Ok(joined??),
            Err(_) => {
                warn!(grace = ?SHUTDOWN_GRACE, "requests still in flight; aborting server task");
                task.abort();
                Ok(())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server task failed to join: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub async fn spawn(
    state: Arc<AppState>,
    config: ServerConfig,
) -> Result<ServerHandle, ServerError> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    let router = router(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let addr = listener.local_addr()?;

    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });

    let join_handle = tokio::spawn(async move {
        server
            .await
            .inspect_err(|error| warn!(%error, "HTTP server stopped with an error"))
    });

    info!(%addr, "serving log browser");

    Ok(ServerHandle {
        addr,
        shutdown: Some(shutdown_tx),
        join_handle: Some(join_handle),
    })
}

fn router(state: Arc<AppState>) -> Router {
    let http_state = HttpState { app_state: state };

    Router::new()
        .route("/", get(list_groups))
        .route("/healthz", get(health))
        .route("/groups/:group", get(list_streams))
        .route("/groups/:group/streams/:stream", get(show_events))
        .route("/groups/:group/streams/:stream/more", get(more_events))
        .route("/favorites/groups/:group", post(toggle_group))
        .route(
            "/favorites/groups/:group/streams/:stream",
            post(toggle_stream),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(http_state)
}

#[derive(Debug, Default, Deserialize)]
struct EventsParams {
    span: Option<String>,
    start: Option<String>,
    end: Option<String>,
    token: Option<String>,
    latest: Option<String>,
}

impl EventsParams {
    fn into_parts(self) -> (RangeQuery, Option<PageToken>, Option<i64>) {
        let range = RangeQuery {
            span: self.span,
            start: self.start,
            end: self.end,
        };
        let token = self
            .token
            .filter(|token| !token.is_empty())
            .map(PageToken::new);
        let latest = self.latest.and_then(|value| value.trim().parse().ok());
        (range, token, latest)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ToggleForm {
    back: Option<String>,
}

#[derive(Debug, Serialize)]
struct MorePage {
    group: String,
    stream: String,
    window: WindowJson,
    events: Vec<EventJson>,
    next_token: Option<PageToken>,
}

#[derive(Debug, Serialize)]
struct WindowJson {
    start_ms: i64,
    end_ms: i64,
    start: String,
    end: String,
}

#[derive(Debug, Serialize)]
struct EventJson {
    timestamp: i64,
    time: String,
    ingestion_time: i64,
    message_html: String,
}

impl From<EventsView> for MorePage {
    fn from(view: EventsView) -> Self {
        Self {
            window: WindowJson {
                start_ms: view.window.start_ms(),
                end_ms: view.window.end_ms(),
                start: view.window.start_display(),
                end: view.window.end_display(),
            },
            events: view
                .events
                .into_iter()
                .map(|row| EventJson {
                    timestamp: row.event.timestamp,
                    time: format_timestamp(row.event.timestamp),
                    ingestion_time: row.event.ingestion_time,
                    message_html: row.message.to_html(),
                })
                .collect(),
            next_token: view.next_token,
            group: view.group,
            stream: view.stream,
        }
    }
}

#[derive(Debug)]
struct Failure {
    status: StatusCode,
    message: String,
    group: Option<String>,
    stream: Option<String>,
    json: bool,
}

impl Failure {
    fn page(error: ViewError, group: Option<&str>, stream: Option<&str>) -> Self {
        let status = status_for(&error);
        warn!(%error, group, stream, status = status.as_u16(), "request failed");
        Self {
            status,
            message: error.to_string(),
            group: group.map(ToOwned::to_owned),
            stream: stream.map(ToOwned::to_owned),
            json: false,
        }
    }

    fn json(error: ViewError, group: &str, stream: &str) -> Self {
        Self {
            json: true,
            ..Self::page(error, Some(group), Some(stream))
        }
    }

    fn back(&self) -> String {
        match (&self.group, &self.stream) {
            (Some(group), Some(_)) => ui::group_href(group),
            _ => "/".to_string(),
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        if self.json {
            return (self.status, Json(json!({ "error": self.message }))).into_response();
        }

        let page = ui::error_page(
            &self.message,
            self.group.as_deref(),
            self.stream.as_deref(),
            &self.back(),
        );
        (self.status, Html(page)).into_response()
    }
}

fn status_for(error: &ViewError) -> StatusCode {
    match error {
        ViewError::Format(_) => StatusCode::BAD_REQUEST,
        ViewError::Fetch(fetch) => match fetch.kind() {
            ProviderErrorKind::NotFound => StatusCode::NOT_FOUND,
            ProviderErrorKind::Throttled => StatusCode::TOO_MANY_REQUESTS,
            ProviderErrorKind::AccessDenied | ProviderErrorKind::Service => StatusCode::BAD_GATEWAY,
        },
        ViewError::Favorites(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Only same-site paths are accepted as redirect targets. Browsers read `\`
/// as `/` in a Location header, so it is refused anywhere in the target.
fn safe_back(back: Option<String>, fallback: String) -> String {
    back.filter(|back| {
        back.starts_with('/')
            && !back.starts_with("//")
            && !back.chars().any(|ch| ch == '\\' || ch.is_control())
    })
    .unwrap_or(fallback)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_groups(State(state): State<HttpState>) -> Result<Html<String>, Failure> {
    let rows = state
        .app_state
        .group_rows()
        .await
        .map_err(|error| Failure::page(error, None, None))?;
    Ok(Html(ui::groups_page(&rows)))
}

async fn list_streams(
    State(state): State<HttpState>,
    Path(group): Path<String>,
) -> Result<Html<String>, Failure> {
    let (group_favorite, rows) = state
        .app_state
        .stream_rows(&group)
        .await
        .map_err(|error| Failure::page(error, Some(&group), None))?;
    Ok(Html(ui::streams_page(&group, group_favorite, &rows)))
}

async fn show_events(
    State(state): State<HttpState>,
    Path((group, stream)): Path<(String, String)>,
    Query(params): Query<EventsParams>,
) -> Result<Html<String>, Failure> {
    let (range, token, latest) = params.into_parts();
    let view = state
        .app_state
        .events_view(&group, &stream, &range, token, latest, now_ms())
        .await
        .map_err(|error| Failure::page(error, Some(&group), Some(&stream)))?;
    Ok(Html(ui::events_page(&view, &range)))
}

async fn more_events(
    State(state): State<HttpState>,
    Path((group, stream)): Path<(String, String)>,
    Query(params): Query<EventsParams>,
) -> Result<Json<MorePage>, Failure> {
    let (range, token, latest) = params.into_parts();
    let view = state
        .app_state
        .events_view(&group, &stream, &range, token, latest, now_ms())
        .await
        .map_err(|error| Failure::json(error, &group, &stream))?;
    Ok(Json(MorePage::from(view)))
}

async fn toggle_group(
    State(state): State<HttpState>,
    Path(group): Path<String>,
    Form(form): Form<ToggleForm>,
) -> Result<Redirect, Failure> {
    state
        .app_state
        .favorites()
        .toggle_group(&group)
        .await
        .map_err(|error| Failure::page(error.into(), Some(&group), None))?;
    Ok(Redirect::to(&safe_back(form.back, "/".to_string())))
}

async fn toggle_stream(
    State(state): State<HttpState>,
    Path((group, stream)): Path<(String, String)>,
    Form(form): Form<ToggleForm>,
) -> Result<Redirect, Failure> {
    state
        .app_state
        .favorites()
        .toggle_stream(&group, &stream)
        .await
        .map_err(|error| Failure::page(error.into(), Some(&group), Some(&stream)))?;
    Ok(Redirect::to(&safe_back(form.back, ui::group_href(&group))))
}
