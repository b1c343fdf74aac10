//! Postgres backend.
//!
//! Nested arrays (court and booking slots, payment slots) and review documents
//! live in JSONB columns. Updates report `matched`/`modified` the way the
//! front-end expects: a write that leaves the row unchanged is matched but not
//! modified.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{
    normalize_search, BookingFilter, CourtPage, CourtQuery, PaymentFilter, Store, StoreResult,
    UserFilter,
};
use crate::models::{
    announcement::AnnouncementPatch,
    booking::NewBooking,
    coupon::{CouponPatch, NewCoupon},
    court::{CourtPatch, NewCourt},
    payment::NewPayment,
    stats::{Activity, Overview, PeriodValues, StatusCounts, Totals},
    user::{NewUser, UserPatch},
    Announcement, Booking, BookingStatus, Coupon, Court, DeleteResult, InsertResult, Payment,
    Review, Role, Slot, SlotTime, UpdateResult, User,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }
}

/// `%term%` for ILIKE with the LIKE metacharacters escaped.
fn like_pattern(search: Option<&str>) -> Option<String> {
    normalize_search(search).map(|s| {
        let escaped = s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        format!("%{}%", escaped)
    })
}

fn update_result((matched, modified): (i64, i64)) -> UpdateResult {
    UpdateResult::new(matched as u64, modified as u64)
}

// --- row types ---

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    photo: Option<String>,
    role: String,
    last_login: Option<DateTime<Utc>>,
    member_since: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            email: r.email,
            name: r.name,
            photo: r.photo,
            role: r.role.parse().unwrap_or_default(),
            last_login: r.last_login,
            member_since: r.member_since,
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct CourtRow {
    id: Uuid,
    name: String,
    sport_type: String,
    image: Option<String>,
    price: Option<f64>,
    slots: Json<Vec<Slot>>,
    created_at: DateTime<Utc>,
}

impl From<CourtRow> for Court {
    fn from(r: CourtRow) -> Self {
        Court {
            id: r.id,
            name: r.name,
            sport_type: r.sport_type,
            image: r.image,
            price: r.price,
            slots: r.slots.0,
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    user_email: String,
    court_id: Uuid,
    court_name: String,
    court_type: Option<String>,
    slots: Json<Vec<Slot>>,
    price: Option<f64>,
    status: String,
    booking_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(r: BookingRow) -> Self {
        Booking {
            id: r.id,
            user: r.user_email,
            court_id: r.court_id,
            court_name: r.court_name,
            court_type: r.court_type,
            slots: r.slots.0,
            price: r.price,
            status: r.status.parse().unwrap_or_default(),
            booking_at: r.booking_at,
        }
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    court_name: String,
    email: String,
    amount: f64,
    coupon_code: Option<String>,
    discount_amount: f64,
    transaction_id: String,
    slots: Json<Vec<SlotTime>>,
    pay_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(r: PaymentRow) -> Self {
        Payment {
            id: r.id,
            court_name: r.court_name,
            email: r.email,
            amount: r.amount,
            coupon_code: r.coupon_code,
            discount_amount: r.discount_amount,
            transaction_id: r.transaction_id,
            slots: r.slots.0,
            pay_at: r.pay_at,
        }
    }
}

#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    body: Json<Map<String, Value>>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(r: ReviewRow) -> Self {
        Review { id: r.id, body: r.body.0, created_at: r.created_at }
    }
}

#[derive(FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    active: bool,
    max_uses: i64,
    discount_amount: f64,
    expiry_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(r: CouponRow) -> Self {
        Coupon {
            id: r.id,
            code: r.code,
            active: r.active,
            max_uses: r.max_uses,
            discount_amount: r.discount_amount,
            expiry_date: r.expiry_date,
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct AnnouncementRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AnnouncementRow> for Announcement {
    fn from(r: AnnouncementRow) -> Self {
        Announcement { id: r.id, title: r.title, description: r.description, created_at: r.created_at }
    }
}

const USER_COLUMNS: &str = "id, email, name, photo, role, last_login, member_since, created_at";
const COURT_COLUMNS: &str = "id, name, sport_type, image, price, slots, created_at";
const BOOKING_COLUMNS: &str =
    "id, user_email, court_id, court_name, court_type, slots, price, status, booking_at";
const PAYMENT_COLUMNS: &str =
    "id, court_name, email, amount, coupon_code, discount_amount, transaction_id, slots, pay_at";
const COUPON_COLUMNS: &str = "id, code, active, max_uses, discount_amount, expiry_date, created_at";

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<InsertResult> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, email, name, photo, role, last_login)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.photo)
        .bind(user.role.as_str())
        .bind(user.last_login)
        .execute(&self.pool)
        .await?;
        Ok(InsertResult::new(id))
    }

    async fn set_last_login(&self, email: &str, at: DateTime<Utc>) -> StoreResult<UpdateResult> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (SELECT id FROM users WHERE email = $1),
                 changed AS (
                    UPDATE users SET last_login = $2
                    WHERE email = $1 AND last_login IS DISTINCT FROM $2
                    RETURNING id)
            SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM changed)
            "#,
        )
        .bind(email)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(update_result(counts))
    }

    async fn update_user(&self, email: &str, patch: UserPatch) -> StoreResult<UpdateResult> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (SELECT id FROM users WHERE email = $1),
                 changed AS (
                    UPDATE users SET name = COALESCE($2, name), photo = COALESCE($3, photo)
                    WHERE email = $1
                      AND (name, photo) IS DISTINCT FROM (COALESCE($2, name), COALESCE($3, photo))
                    RETURNING id)
            SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM changed)
            "#,
        )
        .bind(email)
        .bind(patch.name)
        .bind(patch.photo)
        .fetch_one(&self.pool)
        .await?;
        Ok(update_result(counts))
    }

    async fn set_role(
        &self,
        email: &str,
        role: Role,
        member_since: Option<DateTime<Utc>>,
    ) -> StoreResult<UpdateResult> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (SELECT id FROM users WHERE email = $1),
                 changed AS (
                    UPDATE users SET role = $2, member_since = $3
                    WHERE email = $1
                      AND (role, member_since) IS DISTINCT FROM ($2, $3::timestamptz)
                    RETURNING id)
            SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM changed)
            "#,
        )
        .bind(email)
        .bind(role.as_str())
        .bind(member_since)
        .fetch_one(&self.pool)
        .await?;
        Ok(update_result(counts))
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE ($1::text IS NULL OR role = $1)
               AND ($2::text IS NULL OR email ILIKE $2 OR name ILIKE $2)
             ORDER BY created_at"
        ))
        .bind(filter.role.map(|r| r.as_str()))
        .bind(like_pattern(filter.search.as_deref()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_courts(&self, query: &CourtQuery) -> StoreResult<CourtPage> {
        let pattern = like_pattern(query.search.as_deref());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM courts
             WHERE ($1::text IS NULL OR name ILIKE $1 OR sport_type ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let (limit, offset) = match query.page {
            Some(page) => (Some(page.limit as i64), page.offset() as i64),
            None => (None, 0),
        };
        let rows = sqlx::query_as::<_, CourtRow>(&format!(
            "SELECT {COURT_COLUMNS} FROM courts
             WHERE ($1::text IS NULL OR name ILIKE $1 OR sport_type ILIKE $1)
             ORDER BY created_at
             LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(CourtPage { courts: rows.into_iter().map(Court::from).collect(), total: total as u64 })
    }

    async fn find_court(&self, id: Uuid) -> StoreResult<Option<Court>> {
        let row = sqlx::query_as::<_, CourtRow>(&format!(
            "SELECT {COURT_COLUMNS} FROM courts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Court::from))
    }

    async fn insert_court(&self, court: NewCourt) -> StoreResult<InsertResult> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO courts (id, name, sport_type, image, price, slots)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(&court.name)
        .bind(&court.sport_type)
        .bind(&court.image)
        .bind(court.price)
        .bind(Json(&court.slots))
        .execute(&self.pool)
        .await?;
        Ok(InsertResult::new(id))
    }

    async fn update_court(&self, id: Uuid, patch: CourtPatch) -> StoreResult<UpdateResult> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (SELECT id FROM courts WHERE id = $1),
                 changed AS (
                    UPDATE courts SET
                        name = COALESCE($2, name),
                        sport_type = COALESCE($3, sport_type),
                        image = COALESCE($4, image),
                        price = COALESCE($5, price),
                        slots = COALESCE($6::jsonb, slots)
                    WHERE id = $1
                      AND (name, sport_type, image, price, slots) IS DISTINCT FROM
                          (COALESCE($2, name), COALESCE($3, sport_type), COALESCE($4, image),
                           COALESCE($5, price), COALESCE($6::jsonb, slots))
                    RETURNING id)
            SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM changed)
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.sport_type)
        .bind(patch.image)
        .bind(patch.price)
        .bind(patch.slots.map(Json))
        .fetch_one(&self.pool)
        .await?;
        Ok(update_result(counts))
    }

    async fn replace_slots(&self, id: Uuid, slots: Vec<Slot>) -> StoreResult<UpdateResult> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (SELECT id FROM courts WHERE id = $1),
                 changed AS (
                    UPDATE courts SET slots = $2::jsonb
                    WHERE id = $1 AND slots IS DISTINCT FROM $2::jsonb
                    RETURNING id)
            SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM changed)
            "#,
        )
        .bind(id)
        .bind(Json(&slots))
        .fetch_one(&self.pool)
        .await?;
        Ok(update_result(counts))
    }

    async fn delete_court(&self, id: Uuid) -> StoreResult<DeleteResult> {
        let res = sqlx::query("DELETE FROM courts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(DeleteResult::new(res.rows_affected()))
    }

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<InsertResult> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO bookings (id, user_email, court_id, court_name, court_type, slots, price, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(&booking.user)
        .bind(booking.court_id)
        .bind(&booking.court_name)
        .bind(&booking.court_type)
        .bind(Json(&booking.slots))
        .bind(booking.price)
        .bind(booking.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(InsertResult::new(id))
    }

    async fn find_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Booking::from))
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE ($1::text IS NULL OR user_email = $1)
               AND ($2::text IS NULL OR status = $2)
               AND ($3::text IS NULL OR user_email ILIKE $3 OR court_name ILIKE $3)
             ORDER BY booking_at DESC"
        ))
        .bind(filter.user.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(like_pattern(filter.search.as_deref()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn set_booking_status(&self, id: Uuid, status: BookingStatus) -> StoreResult<UpdateResult> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (SELECT id FROM bookings WHERE id = $1),
                 changed AS (
                    UPDATE bookings SET status = $2
                    WHERE id = $1 AND status IS DISTINCT FROM $2
                    RETURNING id)
            SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM changed)
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(update_result(counts))
    }

    async fn delete_booking(&self, id: Uuid) -> StoreResult<DeleteResult> {
        let res = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(DeleteResult::new(res.rows_affected()))
    }

    async fn insert_payment(&self, payment: NewPayment) -> StoreResult<InsertResult> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO payments
                (id, court_name, email, amount, coupon_code, discount_amount, transaction_id, slots)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(&payment.court_name)
        .bind(&payment.email)
        .bind(payment.amount)
        .bind(&payment.coupon_code)
        .bind(payment.discount_amount)
        .bind(&payment.transaction_id)
        .bind(Json(&payment.slots))
        .execute(&self.pool)
        .await?;
        Ok(InsertResult::new(id))
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE ($1::text IS NULL OR email = $1)
               AND ($2::text IS NULL OR email ILIKE $2 OR court_name ILIKE $2 OR transaction_id ILIKE $2)
             ORDER BY pay_at DESC
             LIMIT $3"
        ))
        .bind(filter.email.as_deref())
        .bind(like_pattern(filter.search.as_deref()))
        .bind(filter.limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Payment::from).collect())
    }

    async fn list_coupons(&self, active_only: bool) -> StoreResult<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons
             WHERE (NOT $1 OR active)
             ORDER BY created_at"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Coupon::from).collect())
    }

    async fn find_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1 ORDER BY created_at LIMIT 1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Coupon::from))
    }

    async fn insert_coupon(&self, coupon: NewCoupon) -> StoreResult<InsertResult> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO coupons (id, code, active, max_uses, discount_amount, expiry_date)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(&coupon.code)
        .bind(coupon.active)
        .bind(coupon.max_uses)
        .bind(coupon.discount_amount)
        .bind(coupon.expiry_date)
        .execute(&self.pool)
        .await?;
        Ok(InsertResult::new(id))
    }

    async fn update_coupon(&self, id: Uuid, patch: CouponPatch) -> StoreResult<UpdateResult> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (SELECT id FROM coupons WHERE id = $1),
                 changed AS (
                    UPDATE coupons SET
                        code = COALESCE($2, code),
                        active = COALESCE($3, active),
                        max_uses = COALESCE($4, max_uses),
                        discount_amount = COALESCE($5, discount_amount),
                        expiry_date = COALESCE($6, expiry_date)
                    WHERE id = $1
                      AND (code, active, max_uses, discount_amount, expiry_date) IS DISTINCT FROM
                          (COALESCE($2, code), COALESCE($3, active), COALESCE($4, max_uses),
                           COALESCE($5, discount_amount), COALESCE($6, expiry_date))
                    RETURNING id)
            SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM changed)
            "#,
        )
        .bind(id)
        .bind(patch.code)
        .bind(patch.active)
        .bind(patch.max_uses)
        .bind(patch.discount_amount)
        .bind(patch.expiry_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(update_result(counts))
    }

    async fn set_coupon_max_uses(&self, code: &str, max_uses: i64) -> StoreResult<UpdateResult> {
        // Codes are not unique; touch only the oldest, the one lookups return.
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (
                    SELECT id, max_uses FROM coupons WHERE code = $1
                    ORDER BY created_at LIMIT 1),
                 changed AS (
                    UPDATE coupons c SET max_uses = $2
                    FROM target t
                    WHERE c.id = t.id AND t.max_uses IS DISTINCT FROM $2
                    RETURNING c.id)
            SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM changed)
            "#,
        )
        .bind(code)
        .bind(max_uses)
        .fetch_one(&self.pool)
        .await?;
        Ok(update_result(counts))
    }

    async fn delete_coupon(&self, id: Uuid) -> StoreResult<DeleteResult> {
        let res = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(DeleteResult::new(res.rows_affected()))
    }

    async fn list_announcements(&self) -> StoreResult<Vec<Announcement>> {
        let rows = sqlx::query_as::<_, AnnouncementRow>(
            "SELECT id, title, description, created_at FROM announcements ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Announcement::from).collect())
    }

    async fn insert_announcement(
        &self,
        title: String,
        description: Option<String>,
    ) -> StoreResult<InsertResult> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO announcements (id, title, description) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(title)
            .bind(description)
            .execute(&self.pool)
            .await?;
        Ok(InsertResult::new(id))
    }

    async fn update_announcement(
        &self,
        id: Uuid,
        patch: AnnouncementPatch,
    ) -> StoreResult<UpdateResult> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (SELECT id FROM announcements WHERE id = $1),
                 changed AS (
                    UPDATE announcements SET
                        title = COALESCE($2, title),
                        description = COALESCE($3, description)
                    WHERE id = $1
                      AND (title, description) IS DISTINCT FROM
                          (COALESCE($2, title), COALESCE($3, description))
                    RETURNING id)
            SELECT (SELECT COUNT(*) FROM target), (SELECT COUNT(*) FROM changed)
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(update_result(counts))
    }

    async fn delete_announcement(&self, id: Uuid) -> StoreResult<DeleteResult> {
        let res = sqlx::query("DELETE FROM announcements WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(DeleteResult::new(res.rows_affected()))
    }

    async fn list_reviews(&self) -> StoreResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT id, body, created_at FROM reviews ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn insert_review(&self, body: Map<String, Value>) -> StoreResult<InsertResult> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO reviews (id, body) VALUES ($1, $2)")
            .bind(id)
            .bind(Json(&body))
            .execute(&self.pool)
            .await?;
        Ok(InsertResult::new(id))
    }

    async fn dashboard_overview(&self) -> StoreResult<Overview> {
        let (users, members, courts, revenue): (i64, i64, i64, f64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM users WHERE role = $1),
                (SELECT COUNT(*) FROM courts),
                (SELECT COALESCE(SUM(amount), 0) FROM payments)",
        )
        .bind(Role::Member.as_str())
        .fetch_one(&self.pool)
        .await?;

        let by_status: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM bookings GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        let mut statuses = StatusCounts::default();
        for (status, count) in by_status {
            match status.parse::<BookingStatus>() {
                Ok(status) => statuses.add(status, count as u64),
                Err(_) => tracing::warn!("ignoring bookings with unknown status {:?}", status),
            }
        }

        Ok(Overview {
            totals: Totals {
                users: users as u64,
                members: members as u64,
                courts: courts as u64,
                bookings: statuses.total,
                confirmed_bookings: statuses.confirmed,
                revenue,
            },
            statuses,
        })
    }

    async fn window_totals(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<PeriodValues> {
        let (new_users, new_members, bookings, revenue): (i64, i64, i64, f64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM users WHERE created_at >= $1 AND created_at < $2),
                (SELECT COUNT(*) FROM users WHERE member_since >= $1 AND member_since < $2),
                (SELECT COUNT(*) FROM bookings WHERE booking_at >= $1 AND booking_at < $2),
                (SELECT COALESCE(SUM(amount), 0) FROM payments WHERE pay_at >= $1 AND pay_at < $2)",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(PeriodValues {
            new_users: new_users as u64,
            new_members: new_members as u64,
            bookings: bookings as u64,
            revenue,
        })
    }

    async fn activity_since(&self, since: DateTime<Utc>) -> StoreResult<Activity> {
        let bookings: Vec<DateTime<Utc>> =
            sqlx::query_scalar("SELECT booking_at FROM bookings WHERE booking_at >= $1")
                .bind(since)
                .fetch_all(&self.pool)
                .await?;
        let payments: Vec<(DateTime<Utc>, f64)> =
            sqlx::query_as("SELECT pay_at, amount FROM payments WHERE pay_at >= $1")
                .bind(since)
                .fetch_all(&self.pool)
                .await?;
        Ok(Activity { bookings, payments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern(Some("Court")), Some("%court%".to_string()));
        assert_eq!(like_pattern(Some("50%_off")), Some("%50\\%\\_off%".to_string()));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }
}
