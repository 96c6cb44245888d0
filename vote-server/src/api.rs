//! HTTP routes over the tally store.
//!
//! Every store call is blocking, so handlers hop onto tokio's blocking pool
//! with [`run_blocking`] before touching the ledgers.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tally_store::{Direction, TallyError, VoteRecord};
use tokio::task::JoinError;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::backend::Tallies;
use crate::seed::STATIC_MOUNT;

/// Shared handler state.
///
/// The key count is computed once at startup and cached here as the size
/// hint for random selection. It is refreshed whenever a random pick finds
/// it stale.
#[derive(Clone)]
pub struct AppState {
    tallies: Arc<Tallies>,
    size_hint: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(tallies: Arc<Tallies>, size_hint: u64) -> Self {
        Self {
            tallies,
            size_hint: Arc::new(AtomicU64::new(size_hint)),
        }
    }

    pub fn size_hint(&self) -> u64 {
        self.size_hint.load(Ordering::Relaxed)
    }
}

/// Builds the application router. Files under `static_folder` are served at
/// `/static`.
pub fn router(state: AppState, static_folder: &Path) -> Router {
    let routes = Router::new()
        .route("/api/vote/", post(vote))
        .route("/api/unvote/", post(unvote))
        .route("/api/getkey/", get(random_key))
        .route("/api/minkey/", get(min_key))
        .route("/api/tally/", get(tally))
        .route("/api/results/", get(results))
        .nest_service(&format!("/{STATIC_MOUNT}"), ServeDir::new(static_folder));
    with_middleware(routes).with_state(state)
}

/// A panicking handler answers 500 instead of dropping the connection.
fn with_middleware<S>(routes: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    routes
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Body of `/api/vote/` and `/api/unvote/`.
///
/// `Vote` is the string `"true"` for an up vote and `"false"` for a down
/// vote.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoteRequest {
    pub key: String,
    pub vote: String,
}

impl VoteRequest {
    fn direction(&self) -> Result<Direction, ApiError> {
        match self.vote.as_str() {
            "true" => Ok(Direction::Up),
            "false" => Ok(Direction::Down),
            other => Err(ApiError::BadVote(other.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TallyResponse {
    pub key: String,
    pub tally: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ResultRow {
    pub key: String,
    pub tally: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<i64>,
}

impl From<VoteRecord> for ResultRow {
    fn from(record: VoteRecord) -> Self {
        Self {
            key: record.key_lossy(),
            tally: record.tally,
            attempts: record.attempts,
        }
    }
}

async fn vote(
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<TallyResponse>, ApiError> {
    let direction = request.direction()?;
    debug!(key = %request.key, ?direction, "vote");
    let record = run_blocking(&state, move |tallies| {
        tallies.vote(request.key.as_bytes(), direction)
    })
    .await?;
    Ok(Json(TallyResponse {
        key: record.key_lossy(),
        tally: record.tally,
    }))
}

async fn unvote(
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<TallyResponse>, ApiError> {
    let direction = request.direction()?;
    debug!(key = %request.key, ?direction, "unvote");
    let record = run_blocking(&state, move |tallies| {
        tallies.unvote(request.key.as_bytes(), direction)
    })
    .await?;
    Ok(Json(TallyResponse {
        key: record.key_lossy(),
        tally: record.tally,
    }))
}

async fn random_key(State(state): State<AppState>) -> Result<(StatusCode, String), ApiError> {
    let hint = state.size_hint();
    let size_hint = Arc::clone(&state.size_hint);

    let key = run_blocking(&state, move |tallies| {
        let repo = tallies.repository();
        match repo.random_key(hint) {
            Err(TallyError::EmptyOrStale) => {
                // The cached count is out of date; refresh it and retry once.
                let fresh = repo.count()?;
                size_hint.store(fresh, Ordering::Relaxed);
                debug!(stale = hint, fresh, "refreshed size hint");
                repo.random_key(fresh)
            }
            other => other,
        }
    })
    .await?;

    Ok((StatusCode::ACCEPTED, String::from_utf8_lossy(&key).into_owned()))
}

async fn min_key(State(state): State<AppState>) -> Result<String, ApiError> {
    let key = run_blocking(&state, |tallies| tallies.repository().min_key()).await?;
    Ok(String::from_utf8_lossy(&key).into_owned())
}

async fn tally(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<TallyResponse>, ApiError> {
    let key = query.key.clone();
    let tally = run_blocking(&state, move |tallies| tallies.repository().get(key.as_bytes())).await?;
    Ok(Json(TallyResponse {
        key: query.key,
        tally,
    }))
}

async fn results(State(state): State<AppState>) -> Result<Json<Vec<ResultRow>>, ApiError> {
    let records = run_blocking(&state, |tallies| tallies.records()).await?;
    Ok(Json(records.into_iter().map(ResultRow::from).collect()))
}

/// Runs a store operation on the blocking pool.
async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Tallies) -> tally_store::Result<T> + Send + 'static,
{
    let tallies = Arc::clone(&state.tallies);
    let outcome = tokio::task::spawn_blocking(move || f(&tallies)).await?;
    Ok(outcome?)
}

/// Failures a handler can report.
#[derive(Debug)]
pub enum ApiError {
    Tally(TallyError),
    BadVote(String),
    Task(JoinError),
}

impl From<TallyError> for ApiError {
    fn from(err: TallyError) -> Self {
        Self::Tally(err)
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        Self::Task(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadVote(vote) => (
                StatusCode::BAD_REQUEST,
                format!("vote must be \"true\" or \"false\", got {vote:?}"),
            ),
            ApiError::Tally(err) => {
                let status = match &err {
                    TallyError::NotFound
                    | TallyError::EmptyRepository
                    | TallyError::EmptyOrStale => StatusCode::NOT_FOUND,
                    TallyError::AlreadyExists | TallyError::NothingToRetract => {
                        StatusCode::CONFLICT
                    }
                    TallyError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    TallyError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                if status.is_server_error() {
                    error!(error = %err, "store operation failed");
                }
                (status, err.to_string())
            }
            ApiError::Task(err) => {
                warn!(error = %err, "blocking store task did not complete");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, message).into_response()
    }
}
