//! HTTP routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{ApiKeyResponse, Leaderboard, MatchCreated, MatchResults, MovePayload};
use crate::auth::IdentityProvider;
use crate::game::{GameError, MatchView};
use crate::publish::HallOfFame;
use crate::service::{MatchService, ServiceError};

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared dependencies of every handler, built once at startup.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Match operations.
    pub service: MatchService,
    /// Login code exchange.
    pub identity: Arc<dyn IdentityProvider>,
    /// Hall-of-fame publisher.
    pub hall_of_fame: HallOfFame,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/gh-oauth", get(gh_oauth))
        .route("/match", put(create_match))
        .route("/match/{match_id}", get(get_match).post(post_move))
        .route("/match/{match_id}/results", get(match_results))
        .route("/leaderboard", get(leaderboard))
        .with_state(state)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Game(GameError::InvalidBoardSize { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Game(_) | ServiceError::NotFound(_) | ServiceError::InvalidCredential => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Unauthorized => StatusCode::FORBIDDEN,
            ServiceError::Conflict => StatusCode::CONFLICT,
            ServiceError::Db(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            "Internal Server Error".to_string()
        } else {
            debug!(error = %self, %status, "Request rejected");
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// API key taken from the `x-api-key` header.
#[derive(Debug, Clone)]
pub struct ApiKey(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ApiKey {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| ApiKey(v.to_string()))
            .ok_or(ServiceError::Unauthorized)
    }
}

/// Runs a storage-bound closure off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Internal(format!("Worker task failed: {}", e)))?
}

/// Recomputes the leaderboard and republishes the hall of fame in the background.
fn refresh_hall_of_fame(state: &AppState) {
    let service = state.service.clone();
    let hall_of_fame = state.hall_of_fame.clone();
    tokio::spawn(async move {
        match blocking(move || service.leaderboard()).await {
            Ok(entries) => {
                let status = hall_of_fame.publish(&entries).await;
                debug!(?status, "Hall of fame refresh done");
            }
            Err(e) => warn!(error = %e, "Hall of fame refresh skipped"),
        }
    });
}

async fn index() -> &'static str {
    "gridmatch server"
}

#[derive(Debug, Deserialize)]
struct OAuthQuery {
    code: Option<String>,
}

#[instrument(skip(state, query))]
async fn gh_oauth(
    State(state): State<AppState>,
    Query(query): Query<OAuthQuery>,
) -> Result<Json<ApiKeyResponse>, ServiceError> {
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| GameError::InvalidInput("no code".to_string()))?;

    let identity = state.identity.exchange_code(&code).await.map_err(|e| {
        warn!(error = %e, "Login code rejected");
        ServiceError::InvalidCredential
    })?;

    let service = state.service.clone();
    let api_key = blocking(move || service.login(&identity)).await?;
    Ok(Json(ApiKeyResponse { api_key }))
}

#[instrument(skip(state, api_key))]
async fn create_match(
    State(state): State<AppState>,
    ApiKey(api_key): ApiKey,
) -> Result<Json<MatchCreated>, ServiceError> {
    let service = state.service.clone();
    let game = blocking(move || service.create_match(&api_key)).await?;
    info!(match_id = %game.match_id(), "Match created");
    refresh_hall_of_fame(&state);
    Ok(Json(MatchCreated {
        match_id: game.match_id().clone(),
    }))
}

#[instrument(skip(state, api_key))]
async fn get_match(
    State(state): State<AppState>,
    ApiKey(api_key): ApiKey,
    Path(match_id): Path<String>,
) -> Result<Json<MatchView>, ServiceError> {
    let service = state.service.clone();
    let view = blocking(move || service.match_state(&api_key, &match_id)).await?;
    Ok(Json(view))
}

#[instrument(skip(state, api_key, body))]
async fn post_move(
    State(state): State<AppState>,
    ApiKey(api_key): ApiKey,
    Path(match_id): Path<String>,
    body: Bytes,
) -> Result<Json<MatchView>, ServiceError> {
    let payload = MovePayload::from_slice(&body);
    let service = state.service.clone();
    let reply = blocking(move || service.submit_move(&api_key, &match_id, &payload)).await?;
    if reply.finished_now {
        refresh_hall_of_fame(&state);
    }
    Ok(Json(reply.view))
}

#[instrument(skip(state))]
async fn match_results(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> Result<Json<MatchResults>, ServiceError> {
    let service = state.service.clone();
    let results = blocking(move || service.match_results(&match_id)).await?;
    Ok(Json(MatchResults {
        players: results.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(state))]
async fn leaderboard(State(state): State<AppState>) -> Result<Json<Leaderboard>, ServiceError> {
    let service = state.service.clone();
    Ok(Json(blocking(move || service.leaderboard()).await?))
}
