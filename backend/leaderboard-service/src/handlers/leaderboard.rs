/// Leaderboard and user handlers
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::AppState;
use crate::cache::CacheError;
use crate::domain::{Page, DEFAULT_LIMIT};
use crate::error::{LeaderboardError, Result};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub rating: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRatingRequest {
    pub rating: i32,
}

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub id: Option<String>,
}

/// Raw strings so malformed numbers fall back to defaults instead of a 400
#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    #[serde(default)]
    pub username: String,
}

fn lenient_i64(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

/// Create a user
pub async fn create_user(
    state: web::Data<AppState>,
    payload: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    let req = payload.into_inner();
    let user = state.leaderboard.create_user(&req.username, req.rating).await?;
    Ok(HttpResponse::Created().json(user))
}

/// Set a user's rating
pub async fn update_rating(
    state: web::Data<AppState>,
    query: web::Query<UserIdQuery>,
    payload: web::Json<UpdateRatingRequest>,
) -> Result<HttpResponse> {
    let id: i64 = query
        .id
        .as_deref()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| LeaderboardError::validation("id query parameter must be an integer"))?;

    state.leaderboard.update_rating(id, payload.rating).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Ranked page (default limit: 50)
pub async fn get_leaderboard(
    state: web::Data<AppState>,
    query: web::Query<LeaderboardQuery>,
) -> Result<HttpResponse> {
    let limit = lenient_i64(query.limit.as_deref(), DEFAULT_LIMIT);
    let offset = lenient_i64(query.offset.as_deref(), 0);
    let page = Page::new(limit, offset)?;

    let rows = state
        .leaderboard
        .get_leaderboard(page, query.search.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// First user matching `username`, with rank
pub async fn get_user_rank(
    state: web::Data<AppState>,
    query: web::Query<UsernameQuery>,
) -> Result<HttpResponse> {
    let found = state.leaderboard.get_user_with_rank(&query.username).await?;
    Ok(HttpResponse::Ok().json(found))
}

pub async fn search_users(
    state: web::Data<AppState>,
    query: web::Query<UsernameQuery>,
) -> Result<HttpResponse> {
    let rows = state.leaderboard.search_users(&query.username).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Rebuild the cache index now
pub async fn resync(state: web::Data<AppState>) -> Result<HttpResponse> {
    let sync = state
        .sync
        .as_ref()
        .ok_or(LeaderboardError::Cache(CacheError::Unavailable))?;

    // Detached so a dropped request cannot cancel a rebuild between clear and load
    let sync = sync.clone();
    let members = tokio::spawn(async move { sync.rebuild().await })
        .await
        .map_err(|e| LeaderboardError::Internal(format!("resync task failed: {}", e)))??;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "members": members })))
}

/// Liveness plus a summary of the cache routing state
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let index_state = state.leaderboard.index_state();
    let cache = match state.leaderboard.index() {
        None => "disabled",
        Some(index) if !index.is_available() => "unavailable",
        Some(_) if index_state.is_rebuilding() => "rebuilding",
        Some(_) if !index_state.is_warm() => "cold",
        Some(_) => "warm",
    };

    let database = match state.leaderboard.store().health_check().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Durable store health check failed");
            "unavailable"
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "database": database,
        "cache": cache,
        "simulation": state.simulation.status(),
    }))
}
