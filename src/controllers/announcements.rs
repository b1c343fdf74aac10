use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::extract::{AppJson, AppPath};
use crate::middleware::{Admin, Caller};
use crate::models::{announcement::AnnouncementPatch, Announcement};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/announcements", get(list_announcements).post(create_announcement))
        .route(
            "/announcements/{id}",
            patch(update_announcement).delete(delete_announcement),
        )
}

// GET /announcements
pub async fn list_announcements(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
) -> AppResult<Json<Vec<Announcement>>> {
    Ok(Json(state.store.list_announcements().await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    pub description: Option<String>,
}

// POST /announcements
pub async fn create_announcement(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppJson(req): AppJson<CreateAnnouncementRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let result = state
        .store
        .insert_announcement(req.title, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

// PATCH /announcements/{id}
pub async fn update_announcement(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppPath(id): AppPath<Uuid>,
    AppJson(patch): AppJson<AnnouncementPatch>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.update_announcement(id, patch).await?))
}

// DELETE /announcements/{id}
pub async fn delete_announcement(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.delete_announcement(id).await?))
}
