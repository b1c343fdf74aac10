//! Storage boundary.
//!
//! Every handler talks to a `dyn Store`; the concrete backend is chosen at
//! startup. There is no cross-document transaction in this interface: callers
//! that touch several documents sequence the writes themselves (see
//! `services::reconcile`).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    announcement::AnnouncementPatch,
    booking::NewBooking,
    coupon::{CouponPatch, NewCoupon},
    court::{CourtPatch, NewCourt},
    payment::NewPayment,
    stats::{Activity, Overview, PeriodValues},
    user::{NewUser, UserPatch},
    Announcement, Booking, BookingStatus, Coupon, Court, DeleteResult, InsertResult, Payment,
    Review, Role, Slot, UpdateResult, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    /// Case-insensitive substring on name or email.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CourtQuery {
    /// Case-insensitive substring on name or sport type.
    pub search: Option<String>,
    pub page: Option<PageRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * self.limit
    }
}

#[derive(Debug, Clone, Default)]
pub struct CourtPage {
    pub courts: Vec<Court>,
    /// Number of courts matching the search, ignoring paging.
    pub total: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub user: Option<String>,
    pub status: Option<BookingStatus>,
    /// Case-insensitive substring on user email or court name.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub email: Option<String>,
    /// Case-insensitive substring on email, court name or transaction id.
    pub search: Option<String>,
    /// Newest `limit` payments only.
    pub limit: Option<u64>,
}

/// Lowercased search term, or `None` if blank.
pub(crate) fn normalize_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- users ---
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: NewUser) -> StoreResult<InsertResult>;
    async fn set_last_login(&self, email: &str, at: DateTime<Utc>) -> StoreResult<UpdateResult>;
    async fn update_user(&self, email: &str, patch: UserPatch) -> StoreResult<UpdateResult>;
    async fn set_role(
        &self,
        email: &str,
        role: Role,
        member_since: Option<DateTime<Utc>>,
    ) -> StoreResult<UpdateResult>;
    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    // --- courts ---
    async fn list_courts(&self, query: &CourtQuery) -> StoreResult<CourtPage>;
    async fn find_court(&self, id: Uuid) -> StoreResult<Option<Court>>;
    async fn insert_court(&self, court: NewCourt) -> StoreResult<InsertResult>;
    async fn update_court(&self, id: Uuid, patch: CourtPatch) -> StoreResult<UpdateResult>;
    /// Replaces the slot array; `modified_count` is 0 when it was already equal.
    async fn replace_slots(&self, id: Uuid, slots: Vec<Slot>) -> StoreResult<UpdateResult>;
    async fn delete_court(&self, id: Uuid) -> StoreResult<DeleteResult>;

    // --- bookings ---
    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<InsertResult>;
    async fn find_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;
    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>>;
    async fn set_booking_status(&self, id: Uuid, status: BookingStatus) -> StoreResult<UpdateResult>;
    async fn delete_booking(&self, id: Uuid) -> StoreResult<DeleteResult>;

    // --- payments ---
    async fn insert_payment(&self, payment: NewPayment) -> StoreResult<InsertResult>;
    async fn list_payments(&self, filter: &PaymentFilter) -> StoreResult<Vec<Payment>>;

    // --- coupons ---
    async fn list_coupons(&self, active_only: bool) -> StoreResult<Vec<Coupon>>;
    async fn find_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>>;
    async fn insert_coupon(&self, coupon: NewCoupon) -> StoreResult<InsertResult>;
    async fn update_coupon(&self, id: Uuid, patch: CouponPatch) -> StoreResult<UpdateResult>;
    async fn set_coupon_max_uses(&self, code: &str, max_uses: i64) -> StoreResult<UpdateResult>;
    async fn delete_coupon(&self, id: Uuid) -> StoreResult<DeleteResult>;

    // --- announcements ---
    async fn list_announcements(&self) -> StoreResult<Vec<Announcement>>;
    async fn insert_announcement(
        &self,
        title: String,
        description: Option<String>,
    ) -> StoreResult<InsertResult>;
    async fn update_announcement(
        &self,
        id: Uuid,
        patch: AnnouncementPatch,
    ) -> StoreResult<UpdateResult>;
    async fn delete_announcement(&self, id: Uuid) -> StoreResult<DeleteResult>;

    // --- reviews ---
    async fn list_reviews(&self) -> StoreResult<Vec<Review>>;
    async fn insert_review(&self, body: Map<String, Value>) -> StoreResult<InsertResult>;

    // --- dashboard aggregates ---
    async fn dashboard_overview(&self) -> StoreResult<Overview>;
    /// New users by `created_at`, new members by `member_since`, bookings by
    /// `booking_at` and revenue by `pay_at`, all within `[start, end)`.
    async fn window_totals(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<PeriodValues>;
    /// Bookings and payments at or after `since`.
    async fn activity_since(&self, since: DateTime<Utc>) -> StoreResult<Activity>;
}
