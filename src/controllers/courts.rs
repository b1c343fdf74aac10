use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::cache::courts::page_key;
use crate::error::AppResult;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::Admin;
use crate::models::{
    court::{CourtPatch, NewCourt},
    Court, Slot,
};
use crate::store::{CourtQuery, PageRequest};
use crate::AppState;

const DEFAULT_PAGE_SIZE: u64 = 6;
const MAX_PAGE_SIZE: u64 = 50;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/courts", get(list_courts).post(create_court))
        .route("/courts/pagination", get(paginate_courts))
        .route(
            "/courts/{id}",
            get(get_court).patch(update_court).delete(delete_court),
        )
}

// GET /courts
pub async fn list_courts(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Court>>> {
    let page = state.store.list_courts(&CourtQuery::default()).await?;
    Ok(Json(page.courts))
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourtPageResponse {
    pub courts: Vec<Court>,
    pub total_pages: u64,
    pub current_page: u64,
}

fn json_response(json: String, cache_status: &'static str) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Cache", cache_status)
        .body(Body::from(json))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

// GET /courts/pagination?page=&limit=&search=
pub async fn paginate_courts(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<PaginationQuery>,
) -> AppResult<Response> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let cache_key = page_key(params.search.as_deref(), page, limit);

    if let Some(cache) = &state.cache {
        if let Some(cached_json) = cache.get_court_page(&cache_key).await {
            return Ok(json_response(cached_json, "HIT"));
        }
    }

    let result = state
        .store
        .list_courts(&CourtQuery {
            search: params.search,
            page: Some(PageRequest { page, limit }),
        })
        .await?;

    let body = CourtPageResponse {
        courts: result.courts,
        total_pages: result.total.div_ceil(limit),
        current_page: page,
    };
    let json = serde_json::to_string(&body).map_err(anyhow::Error::from)?;

    if let Some(cache) = &state.cache {
        cache.cache_court_page(&cache_key, &json).await;
    }
    Ok(json_response(json, "MISS"))
}

// GET /courts/{id}
// A miss is `null`, not 404
pub async fn get_court(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Option<Court>>> {
    Ok(Json(state.store.find_court(id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourtRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(rename = "sportType")]
    #[validate(length(min = 1, message = "sportType is required"))]
    pub sport_type: String,
    pub image: Option<String>,
    pub price: Option<f64>,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

pub(crate) async fn invalidate_court_cache(state: &AppState) {
    if let Some(cache) = &state.cache {
        cache.invalidate_courts().await;
    }
}

// POST /courts
pub async fn create_court(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppJson(req): AppJson<CreateCourtRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let result = state
        .store
        .insert_court(NewCourt {
            name: req.name,
            sport_type: req.sport_type,
            image: req.image,
            price: req.price,
            slots: req.slots,
        })
        .await?;
    invalidate_court_cache(&state).await;
    Ok((StatusCode::CREATED, Json(result)))
}

// PATCH /courts/{id}
pub async fn update_court(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppPath(id): AppPath<Uuid>,
    AppJson(patch): AppJson<CourtPatch>,
) -> AppResult<impl IntoResponse> {
    let result = state.store.update_court(id, patch).await?;
    if result.modified() {
        invalidate_court_cache(&state).await;
    }
    Ok(Json(result))
}

// DELETE /courts/{id}
pub async fn delete_court(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let result = state.store.delete_court(id).await?;
    invalidate_court_cache(&state).await;
    Ok(Json(result))
}
