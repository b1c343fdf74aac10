use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::courts::invalidate_court_cache;
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::{Admin, Caller, OwnAccount};
use crate::models::{
    booking::NewBooking, Booking, BookingStatus, DeleteResult, Role, Slot, SlotTime, UpdateResult,
};
use crate::services::reconcile;
use crate::store::BookingFilter;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_own_bookings))
        .route("/bookings/{id}", patch(set_booking_status).delete(withdraw_booking))
        .route("/manage/bookings", get(list_all_bookings))
        .route("/manage/booking/{id}", delete(cancel_booking))
}

/* ---------- member side ---------- */

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[serde(rename = "courtId")]
    pub court_id: Uuid,
    #[serde(rename = "courtName")]
    #[validate(length(min = 1, message = "courtName is required"))]
    pub court_name: String,
    #[serde(rename = "courtType")]
    pub court_type: Option<String>,
    #[validate(length(min = 1, message = "at least one slot is required"))]
    pub slots: Vec<Slot>,
    pub price: Option<f64>,
    pub status: Option<BookingStatus>,
}

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    AppJson(req): AppJson<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    req.validate()?;
    let result = state
        .store
        .insert_booking(NewBooking {
            user: caller.identity.email,
            court_id: req.court_id,
            court_name: req.court_name,
            court_type: req.court_type,
            slots: req.slots,
            price: req.price,
            status: req.status.unwrap_or_default(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[derive(Debug, Deserialize)]
pub struct OwnBookingsQuery {
    pub status: Option<BookingStatus>,
}

// GET /bookings?email=&status=
pub async fn list_own_bookings(
    State(state): State<Arc<AppState>>,
    caller: OwnAccount,
    AppQuery(query): AppQuery<OwnBookingsQuery>,
) -> AppResult<Json<Vec<Booking>>> {
    let bookings = state
        .store
        .list_bookings(&BookingFilter {
            user: Some(caller.identity.email),
            status: query.status,
            search: None,
        })
        .await?;
    Ok(Json(bookings))
}

// DELETE /bookings/{id}
// Withdraws a booking without touching court slots
pub async fn withdraw_booking(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<DeleteResult>> {
    let Some(booking) = state.store.find_booking(id).await? else {
        return Ok(Json(DeleteResult::new(0)));
    };

    if booking.user != caller.email() {
        let role = state
            .store
            .find_user_by_email(caller.email())
            .await?
            .map(|u| u.role);
        if role != Some(Role::Admin) {
            return Err(AppError::Forbidden);
        }
    }

    let result = state.store.delete_booking(id).await?;
    Ok(Json(result))
}

/* ---------- admin side ---------- */

#[derive(Debug, Deserialize)]
pub struct ManageBookingsQuery {
    pub status: Option<BookingStatus>,
    pub search: Option<String>,
}

// GET /manage/bookings?status=&search=
pub async fn list_all_bookings(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppQuery(query): AppQuery<ManageBookingsQuery>,
) -> AppResult<Json<Vec<Booking>>> {
    let bookings = state
        .store
        .list_bookings(&BookingFilter {
            user: None,
            status: query.status,
            search: query.search,
        })
        .await?;
    Ok(Json(bookings))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

// PATCH /bookings/{id}
// Approval turns a plain user into a member
pub async fn set_booking_status(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<SetStatusRequest>,
) -> AppResult<Json<UpdateResult>> {
    let status: BookingStatus = req.status.parse().map_err(AppError::BadRequest)?;
    let result = state.store.set_booking_status(id, status).await?;

    if status == BookingStatus::Approved && result.matched_count > 0 {
        if let Some(booking) = state.store.find_booking(id).await? {
            let user = state.store.find_user_by_email(&booking.user).await?;
            if user.is_some_and(|u| u.role == Role::User) {
                state
                    .store
                    .set_role(&booking.user, Role::Member, Some(Utc::now()))
                    .await?;
                tracing::info!("{} promoted to member on approval of booking {}", booking.user, id);
            }
        }
    }
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    #[serde(rename = "courtId")]
    pub court_id: Uuid,
    pub slots: Vec<SlotTime>,
}

// DELETE /manage/booking/{id}
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    _admin: Admin,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<CancelBookingRequest>,
) -> AppResult<Json<reconcile::CancelOutcome>> {
    let outcome = reconcile::cancel_booking(state.store.as_ref(), id, req.court_id, &req.slots).await?;
    if outcome.court_update.modified() {
        invalidate_court_cache(&state).await;
    }
    Ok(Json(outcome))
}
