use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath};
use crate::middleware::{Admin, Caller};
use crate::models::{
    coupon::{CouponPatch, NewCoupon},
    Coupon,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/coupons", get(list_active_coupons).post(create_coupon))
        .route("/coupons/validate", post(validate_coupon))
        .route("/coupons/{id}", patch(update_coupon).delete(delete_coupon))
        .route("/manage/coupons", get(list_all_coupons))
}

// GET /coupons
pub async fn list_active_coupons(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Coupon>>> {
    Ok(Json(state.store.list_coupons(true).await?))
}

// GET /manage/coupons
pub async fn list_all_coupons(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
) -> AppResult<Json<Vec<Coupon>>> {
    Ok(Json(state.store.list_coupons(false).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
}

// POST /coupons/validate
pub async fn validate_coupon(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    AppJson(req): AppJson<ValidateCouponRequest>,
) -> AppResult<Json<Coupon>> {
    req.validate()?;
    let coupon = state
        .store
        .find_coupon_by_code(req.code.trim())
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid coupon code"))?;
    coupon.redeemability(Utc::now()).map_err(AppError::bad_request)?;
    Ok(Json(coupon))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub max_uses: i64,
    #[serde(default)]
    pub discount_amount: f64,
    pub expiry_date: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

// POST /coupons
pub async fn create_coupon(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppJson(req): AppJson<CreateCouponRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let result = state
        .store
        .insert_coupon(NewCoupon {
            code: req.code.trim().to_string(),
            active: req.active,
            max_uses: req.max_uses,
            discount_amount: req.discount_amount,
            expiry_date: req.expiry_date,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

// PATCH /coupons/{id}
pub async fn update_coupon(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppPath(id): AppPath<Uuid>,
    AppJson(patch): AppJson<CouponPatch>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.update_coupon(id, patch).await?))
}

// DELETE /coupons/{id}
pub async fn delete_coupon(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.delete_coupon(id).await?))
}
