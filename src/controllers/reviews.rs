use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::Caller;
use crate::models::Review;
use crate::AppState;

/// Keys owned by the server; client copies are dropped.
const RESERVED_KEYS: [&str; 2] = ["_id", "created_at"];

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/reviews", get(list_reviews).post(create_review))
}

// GET /reviews
pub async fn list_reviews(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Review>>> {
    Ok(Json(state.store.list_reviews().await?))
}

fn strip_reserved(mut body: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_KEYS {
        body.remove(key);
    }
    body
}

// POST /reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    AppJson(body): AppJson<Map<String, Value>>,
) -> AppResult<impl IntoResponse> {
    let result = state.store.insert_review(strip_reserved(body)).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_owned_keys_are_dropped() {
        let body = json!({ "_id": "x", "created_at": "y", "rating": 5, "text": "great" });
        let Value::Object(map) = body else { unreachable!() };
        let cleaned = strip_reserved(map);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned["rating"], 5);
    }
}
