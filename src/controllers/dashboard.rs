use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::extract::AppQuery;
use crate::middleware::{Caller, OwnAccount};
use crate::services::analytics::{self, AdminStats, MemberStats, Range};
use crate::store::{BookingFilter, PaymentFilter};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard/stats", get(admin_stats))
        .route("/member/dashboard", get(member_dashboard))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub range: Option<String>,
}

// GET /dashboard/stats?range=week|month|year
pub async fn admin_stats(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    AppQuery(query): AppQuery<StatsQuery>,
) -> AppResult<Json<AdminStats>> {
    let range = match query.range.as_deref() {
        None | Some("") => Range::default(),
        Some(value) => value.parse().map_err(AppError::BadRequest)?,
    };

    let now = Utc::now();
    let (current_window, previous_window) = analytics::windows(range, now);

    let overview = state.store.dashboard_overview().await?;
    let current = state.store.window_totals(current_window.start, current_window.end).await?;
    let previous = state.store.window_totals(previous_window.start, previous_window.end).await?;
    let activity = state.store.activity_since(analytics::trend_start(range, now)).await?;
    let recent_payments = state
        .store
        .list_payments(&PaymentFilter {
            limit: Some(analytics::RECENT_PAYMENTS as u64),
            ..Default::default()
        })
        .await?;

    Ok(Json(analytics::admin_stats(
        range,
        now,
        overview,
        current,
        previous,
        &activity,
        recent_payments,
    )))
}

// GET /member/dashboard?email=
pub async fn member_dashboard(
    State(state): State<Arc<AppState>>,
    caller: OwnAccount,
) -> AppResult<Json<MemberStats>> {
    let email = caller.email();
    let user = state.store.find_user_by_email(email).await?;
    let bookings = state
        .store
        .list_bookings(&BookingFilter { user: Some(email.to_string()), ..Default::default() })
        .await?;
    let payments = state
        .store
        .list_payments(&PaymentFilter { email: Some(email.to_string()), ..Default::default() })
        .await?;

    Ok(Json(analytics::member_stats(email, user.as_ref(), &bookings, &payments)))
}
