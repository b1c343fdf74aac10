use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::courts::invalidate_court_cache;
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppQuery};
use crate::middleware::{Admin, Caller, OwnAccount};
use crate::models::{Payment, SlotTime};
use crate::services::reconcile::{self, ConfirmPayment};
use crate::store::PaymentFilter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/payments", post(confirm_payment).get(list_own_payments))
        .route("/manage/payments", get(list_all_payments))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub amount_in_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

// POST /create-payment-intent
pub async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    AppJson(req): AppJson<PaymentIntentRequest>,
) -> AppResult<Json<PaymentIntentResponse>> {
    if req.amount_in_cents <= 0 {
        return Err(AppError::bad_request("amountInCents must be greater than zero"));
    }
    let intent = state.payments.create_payment_intent(req.amount_in_cents).await?;
    tracing::debug!("payment intent {} created for {}", intent.id, caller.email());
    Ok(Json(PaymentIntentResponse { client_secret: intent.client_secret }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub booking_id: Uuid,
    pub court_id: Uuid,
    #[validate(length(min = 1, message = "courtName is required"))]
    pub court_name: String,
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    pub amount: f64,
    pub slots: Vec<SlotTime>,
    #[validate(length(min = 1, message = "transactionId is required"))]
    pub transaction_id: String,
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub discount_amount: f64,
    pub coupon_max_uses: Option<i64>,
}

impl From<ConfirmPaymentRequest> for ConfirmPayment {
    fn from(req: ConfirmPaymentRequest) -> Self {
        ConfirmPayment {
            booking_id: req.booking_id,
            court_id: req.court_id,
            court_name: req.court_name,
            email: req.email,
            amount: req.amount,
            slots: req.slots,
            transaction_id: req.transaction_id,
            coupon_code: req.coupon_code.filter(|c| !c.trim().is_empty()),
            discount_amount: req.discount_amount,
            coupon_max_uses: req.coupon_max_uses,
        }
    }
}

// POST /payments
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    AppJson(req): AppJson<ConfirmPaymentRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let outcome = reconcile::confirm_payment(state.store.as_ref(), req.into()).await?;
    if outcome.court_update.modified() {
        invalidate_court_cache(&state).await;
    }
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

// GET /payments?email=
pub async fn list_own_payments(
    State(state): State<Arc<AppState>>,
    caller: OwnAccount,
) -> AppResult<Json<Vec<Payment>>> {
    let payments = state
        .store
        .list_payments(&PaymentFilter { email: Some(caller.identity.email), ..Default::default() })
        .await?;
    Ok(Json(payments))
}

// GET /manage/payments?search=
pub async fn list_all_payments(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<Vec<Payment>>> {
    let payments = state
        .store
        .list_payments(&PaymentFilter { search: query.search, ..Default::default() })
        .await?;
    Ok(Json(payments))
}
