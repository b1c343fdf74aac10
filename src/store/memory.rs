//! In-process store.
//!
//! Backs local runs without a database and the test-suite. Individual
//! operations can be made to fail with [`MemoryStore::fail_on`] to exercise
//! partial-failure paths.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    normalize_search, BookingFilter, CourtPage, CourtQuery, PaymentFilter, Store, StoreError,
    StoreResult, UserFilter,
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
    Review, Role, Slot, UpdateResult, User,
};

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    courts: Vec<Court>,
    bookings: Vec<Booking>,
    payments: Vec<Payment>,
    coupons: Vec<Coupon>,
    announcements: Vec<Announcement>,
    reviews: Vec<Review>,
}

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
    failing: RwLock<HashSet<&'static str>>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Assigns `value` to `slot` and reports whether that changed anything.
fn assign<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

fn update_one<T>(items: &mut [T], pred: impl Fn(&T) -> bool, apply: impl FnOnce(&mut T) -> bool) -> UpdateResult {
    match items.iter_mut().find(|item| pred(item)) {
        Some(item) => UpdateResult::new(1, apply(item) as u64),
        None => UpdateResult::unmatched(),
    }
}

fn delete_one<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> DeleteResult {
    match items.iter().position(pred) {
        Some(idx) => {
            items.remove(idx);
            DeleteResult::new(1)
        }
        None => DeleteResult::new(0),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call of operation `op` (the trait method name)
    /// fail with [`StoreError::Unavailable`].
    pub async fn fail_on(&self, op: &'static str) {
        self.failing.write().await.insert(op);
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    async fn check(&self, op: &'static str) -> StoreResult<()> {
        if self.failing.read().await.contains(op) {
            return Err(StoreError::Unavailable(format!("injected failure in {}", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.check("find_user_by_email").await?;
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.check("find_user").await?;
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<InsertResult> {
        self.check("insert_user").await?;
        let id = Uuid::new_v4();
        self.data.write().await.users.push(User {
            id,
            email: user.email,
            name: user.name,
            photo: user.photo,
            role: user.role,
            last_login: Some(user.last_login),
            member_since: None,
            created_at: Utc::now(),
        });
        Ok(InsertResult::new(id))
    }

    async fn set_last_login(&self, email: &str, at: DateTime<Utc>) -> StoreResult<UpdateResult> {
        self.check("set_last_login").await?;
        let mut data = self.data.write().await;
        Ok(update_one(&mut data.users, |u| u.email == email, |u| assign(&mut u.last_login, Some(at))))
    }

    async fn update_user(&self, email: &str, patch: UserPatch) -> StoreResult<UpdateResult> {
        self.check("update_user").await?;
        let mut data = self.data.write().await;
        Ok(update_one(&mut data.users, |u| u.email == email, |u| {
            let mut changed = false;
            if let Some(name) = patch.name {
                changed |= assign(&mut u.name, Some(name));
            }
            if let Some(photo) = patch.photo {
                changed |= assign(&mut u.photo, Some(photo));
            }
            changed
        }))
    }

    async fn set_role(
        &self,
        email: &str,
        role: Role,
        member_since: Option<DateTime<Utc>>,
    ) -> StoreResult<UpdateResult> {
        self.check("set_role").await?;
        let mut data = self.data.write().await;
        Ok(update_one(&mut data.users, |u| u.email == email, |u| {
            let role_changed = assign(&mut u.role, role);
            let since_changed = assign(&mut u.member_since, member_since);
            role_changed || since_changed
        }))
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        self.check("list_users").await?;
        let search = normalize_search(filter.search.as_deref());
        let data = self.data.read().await;
        Ok(data
            .users
            .iter()
            .filter(|u| filter.role.is_none_or(|r| u.role == r))
            .filter(|u| {
                search.as_deref().is_none_or(|s| {
                    contains_ci(&u.email, s) || u.name.as_deref().is_some_and(|n| contains_ci(n, s))
                })
            })
            .cloned()
            .collect())
    }

    async fn list_courts(&self, query: &CourtQuery) -> StoreResult<CourtPage> {
        self.check("list_courts").await?;
        let search = normalize_search(query.search.as_deref());
        let data = self.data.read().await;
        let matching: Vec<&Court> = data
            .courts
            .iter()
            .filter(|c| {
                search
                    .as_deref()
                    .is_none_or(|s| contains_ci(&c.name, s) || contains_ci(&c.sport_type, s))
            })
            .collect();
        let total = matching.len() as u64;
        let courts = match query.page {
            Some(page) => matching
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit as usize)
                .cloned()
                .collect(),
            None => matching.into_iter().cloned().collect(),
        };
        Ok(CourtPage { courts, total })
    }

    async fn find_court(&self, id: Uuid) -> StoreResult<Option<Court>> {
        self.check("find_court").await?;
        let data = self.data.read().await;
        Ok(data.courts.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_court(&self, court: NewCourt) -> StoreResult<InsertResult> {
        self.check("insert_court").await?;
        let id = Uuid::new_v4();
        self.data.write().await.courts.push(Court {
            id,
            name: court.name,
            sport_type: court.sport_type,
            image: court.image,
            price: court.price,
            slots: court.slots,
            created_at: Utc::now(),
        });
        Ok(InsertResult::new(id))
    }

    async fn update_court(&self, id: Uuid, patch: CourtPatch) -> StoreResult<UpdateResult> {
        self.check("update_court").await?;
        let mut data = self.data.write().await;
        Ok(update_one(&mut data.courts, |c| c.id == id, |c| {
            let mut changed = false;
            if let Some(name) = patch.name {
                changed |= assign(&mut c.name, name);
            }
            if let Some(sport_type) = patch.sport_type {
                changed |= assign(&mut c.sport_type, sport_type);
            }
            if let Some(image) = patch.image {
                changed |= assign(&mut c.image, Some(image));
            }
            if let Some(price) = patch.price {
                changed |= assign(&mut c.price, Some(price));
            }
            if let Some(slots) = patch.slots {
                changed |= assign(&mut c.slots, slots);
            }
            changed
        }))
    }

    async fn replace_slots(&self, id: Uuid, slots: Vec<Slot>) -> StoreResult<UpdateResult> {
        self.check("replace_slots").await?;
        let mut data = self.data.write().await;
        Ok(update_one(&mut data.courts, |c| c.id == id, |c| assign(&mut c.slots, slots)))
    }

    async fn delete_court(&self, id: Uuid) -> StoreResult<DeleteResult> {
        self.check("delete_court").await?;
        Ok(delete_one(&mut self.data.write().await.courts, |c| c.id == id))
    }

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<InsertResult> {
        self.check("insert_booking").await?;
        let id = Uuid::new_v4();
        self.data.write().await.bookings.push(Booking {
            id,
            user: booking.user,
            court_id: booking.court_id,
            court_name: booking.court_name,
            court_type: booking.court_type,
            slots: booking.slots,
            price: booking.price,
            status: booking.status,
            booking_at: Utc::now(),
        });
        Ok(InsertResult::new(id))
    }

    async fn find_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        self.check("find_booking").await?;
        let data = self.data.read().await;
        Ok(data.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        self.check("list_bookings").await?;
        let search = normalize_search(filter.search.as_deref());
        let data = self.data.read().await;
        let mut bookings: Vec<Booking> = data
            .bookings
            .iter()
            .filter(|b| filter.user.as_deref().is_none_or(|u| b.user == u))
            .filter(|b| filter.status.is_none_or(|s| b.status == s))
            .filter(|b| {
                search
                    .as_deref()
                    .is_none_or(|s| contains_ci(&b.user, s) || contains_ci(&b.court_name, s))
            })
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.booking_at.cmp(&a.booking_at));
        Ok(bookings)
    }

    async fn set_booking_status(&self, id: Uuid, status: BookingStatus) -> StoreResult<UpdateResult> {
        self.check("set_booking_status").await?;
        let mut data = self.data.write().await;
        Ok(update_one(&mut data.bookings, |b| b.id == id, |b| assign(&mut b.status, status)))
    }

    async fn delete_booking(&self, id: Uuid) -> StoreResult<DeleteResult> {
        self.check("delete_booking").await?;
        Ok(delete_one(&mut self.data.write().await.bookings, |b| b.id == id))
    }

    async fn insert_payment(&self, payment: NewPayment) -> StoreResult<InsertResult> {
        self.check("insert_payment").await?;
        let id = Uuid::new_v4();
        self.data.write().await.payments.push(Payment {
            id,
            court_name: payment.court_name,
            email: payment.email,
            amount: payment.amount,
            coupon_code: payment.coupon_code,
            discount_amount: payment.discount_amount,
            transaction_id: payment.transaction_id,
            slots: payment.slots,
            pay_at: Utc::now(),
        });
        Ok(InsertResult::new(id))
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> StoreResult<Vec<Payment>> {
        self.check("list_payments").await?;
        let search = normalize_search(filter.search.as_deref());
        let data = self.data.read().await;
        let mut payments: Vec<Payment> = data
            .payments
            .iter()
            .filter(|p| filter.email.as_deref().is_none_or(|e| p.email == e))
            .filter(|p| {
                search.as_deref().is_none_or(|s| {
                    contains_ci(&p.email, s)
                        || contains_ci(&p.court_name, s)
                        || contains_ci(&p.transaction_id, s)
                })
            })
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.pay_at.cmp(&a.pay_at));
        if let Some(limit) = filter.limit {
            payments.truncate(limit as usize);
        }
        Ok(payments)
    }

    async fn list_coupons(&self, active_only: bool) -> StoreResult<Vec<Coupon>> {
        self.check("list_coupons").await?;
        let data = self.data.read().await;
        Ok(data
            .coupons
            .iter()
            .filter(|c| !active_only || c.active)
            .cloned()
            .collect())
    }

    async fn find_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        self.check("find_coupon_by_code").await?;
        let data = self.data.read().await;
        Ok(data.coupons.iter().find(|c| c.code == code).cloned())
    }

    async fn insert_coupon(&self, coupon: NewCoupon) -> StoreResult<InsertResult> {
        self.check("insert_coupon").await?;
        let id = Uuid::new_v4();
        self.data.write().await.coupons.push(Coupon {
            id,
            code: coupon.code,
            active: coupon.active,
            max_uses: coupon.max_uses,
            discount_amount: coupon.discount_amount,
            expiry_date: coupon.expiry_date,
            created_at: Utc::now(),
        });
        Ok(InsertResult::new(id))
    }

    async fn update_coupon(&self, id: Uuid, patch: CouponPatch) -> StoreResult<UpdateResult> {
        self.check("update_coupon").await?;
        let mut data = self.data.write().await;
        Ok(update_one(&mut data.coupons, |c| c.id == id, |c| {
            let mut changed = false;
            if let Some(code) = patch.code {
                changed |= assign(&mut c.code, code);
            }
            if let Some(active) = patch.active {
                changed |= assign(&mut c.active, active);
            }
            if let Some(max_uses) = patch.max_uses {
                changed |= assign(&mut c.max_uses, max_uses);
            }
            if let Some(discount) = patch.discount_amount {
                changed |= assign(&mut c.discount_amount, discount);
            }
            if let Some(expiry) = patch.expiry_date {
                changed |= assign(&mut c.expiry_date, Some(expiry));
            }
            changed
        }))
    }

    async fn set_coupon_max_uses(&self, code: &str, max_uses: i64) -> StoreResult<UpdateResult> {
        self.check("set_coupon_max_uses").await?;
        let mut data = self.data.write().await;
        Ok(update_one(&mut data.coupons, |c| c.code == code, |c| assign(&mut c.max_uses, max_uses)))
    }

    async fn delete_coupon(&self, id: Uuid) -> StoreResult<DeleteResult> {
        self.check("delete_coupon").await?;
        Ok(delete_one(&mut self.data.write().await.coupons, |c| c.id == id))
    }

    async fn list_announcements(&self) -> StoreResult<Vec<Announcement>> {
        self.check("list_announcements").await?;
        let mut items = self.data.read().await.announcements.clone();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn insert_announcement(
        &self,
        title: String,
        description: Option<String>,
    ) -> StoreResult<InsertResult> {
        self.check("insert_announcement").await?;
        let id = Uuid::new_v4();
        self.data.write().await.announcements.push(Announcement {
            id,
            title,
            description,
            created_at: Utc::now(),
        });
        Ok(InsertResult::new(id))
    }

    async fn update_announcement(
        &self,
        id: Uuid,
        patch: AnnouncementPatch,
    ) -> StoreResult<UpdateResult> {
        self.check("update_announcement").await?;
        let mut data = self.data.write().await;
        Ok(update_one(&mut data.announcements, |a| a.id == id, |a| {
            let mut changed = false;
            if let Some(title) = patch.title {
                changed |= assign(&mut a.title, title);
            }
            if let Some(description) = patch.description {
                changed |= assign(&mut a.description, Some(description));
            }
            changed
        }))
    }

    async fn delete_announcement(&self, id: Uuid) -> StoreResult<DeleteResult> {
        self.check("delete_announcement").await?;
        Ok(delete_one(&mut self.data.write().await.announcements, |a| a.id == id))
    }

    async fn list_reviews(&self) -> StoreResult<Vec<Review>> {
        self.check("list_reviews").await?;
        let mut items = self.data.read().await.reviews.clone();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn insert_review(&self, body: Map<String, Value>) -> StoreResult<InsertResult> {
        self.check("insert_review").await?;
        let id = Uuid::new_v4();
        self.data.write().await.reviews.push(Review { id, body, created_at: Utc::now() });
        Ok(InsertResult::new(id))
    }

    async fn dashboard_overview(&self) -> StoreResult<Overview> {
        self.check("dashboard_overview").await?;
        let data = self.data.read().await;
        let statuses = StatusCounts::tally(&data.bookings);
        Ok(Overview {
            totals: Totals {
                users: data.users.len() as u64,
                members: data.users.iter().filter(|u| u.role == Role::Member).count() as u64,
                courts: data.courts.len() as u64,
                bookings: data.bookings.len() as u64,
                confirmed_bookings: statuses.confirmed,
                revenue: data.payments.iter().map(|p| p.amount).sum(),
            },
            statuses,
        })
    }

    async fn window_totals(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<PeriodValues> {
        self.check("window_totals").await?;
        let within = |at: DateTime<Utc>| at >= start && at < end;
        let data = self.data.read().await;
        Ok(PeriodValues {
            new_users: data.users.iter().filter(|u| within(u.created_at)).count() as u64,
            new_members: data
                .users
                .iter()
                .filter(|u| u.member_since.is_some_and(within))
                .count() as u64,
            bookings: data.bookings.iter().filter(|b| within(b.booking_at)).count() as u64,
            revenue: data
                .payments
                .iter()
                .filter(|p| within(p.pay_at))
                .map(|p| p.amount)
                .sum(),
        })
    }

    async fn activity_since(&self, since: DateTime<Utc>) -> StoreResult<Activity> {
        self.check("activity_since").await?;
        let data = self.data.read().await;
        Ok(Activity {
            bookings: data
                .bookings
                .iter()
                .map(|b| b.booking_at)
                .filter(|at| *at >= since)
                .collect(),
            payments: data
                .payments
                .iter()
                .filter(|p| p.pay_at >= since)
                .map(|p| (p.pay_at, p.amount))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PageRequest;

    fn court(name: &str, sport: &str) -> NewCourt {
        NewCourt { name: name.into(), sport_type: sport.into(), ..Default::default() }
    }

    #[tokio::test]
    async fn court_search_is_case_insensitive_substring() {
        let store = MemoryStore::new();
        store.insert_court(court("Court A", "Tennis")).await.unwrap();
        store.insert_court(court("Hall B", "Badminton")).await.unwrap();

        let page = store
            .list_courts(&CourtQuery { search: Some("court".into()), page: None })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.courts[0].name, "Court A");

        let by_sport = store
            .list_courts(&CourtQuery { search: Some("BADM".into()), page: None })
            .await
            .unwrap();
        assert_eq!(by_sport.courts[0].name, "Hall B");
    }

    #[tokio::test]
    async fn paging_reports_total_of_all_matches() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.insert_court(court(&format!("Court {i}"), "Tennis")).await.unwrap();
        }
        let page = store
            .list_courts(&CourtQuery { search: None, page: Some(PageRequest { page: 2, limit: 2 }) })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.courts.len(), 2);
        assert_eq!(page.courts[0].name, "Court 2");
    }

    #[tokio::test]
    async fn unchanged_write_reports_zero_modified() {
        let store = MemoryStore::new();
        let id = store.insert_court(court("Court A", "Tennis")).await.unwrap().inserted_id;
        let res = store.replace_slots(id, vec![]).await.unwrap();
        assert_eq!(res, UpdateResult::new(1, 0));
        let missing = store.replace_slots(Uuid::new_v4(), vec![]).await.unwrap();
        assert_eq!(missing, UpdateResult::unmatched());
    }

    #[tokio::test]
    async fn injected_failures_apply_per_operation() {
        let store = MemoryStore::new();
        store.fail_on("insert_court").await;
        assert!(matches!(
            store.insert_court(court("Court A", "Tennis")).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.list_courts(&CourtQuery::default()).await.is_ok());

        store.clear_failures().await;
        assert!(store.insert_court(court("Court A", "Tennis")).await.is_ok());
    }

    fn payment(email: &str, amount: f64) -> NewPayment {
        NewPayment {
            court_name: "Court A".into(),
            email: email.into(),
            amount,
            coupon_code: None,
            discount_amount: 0.0,
            transaction_id: format!("pi_{}", amount),
            slots: vec![],
        }
    }

    #[tokio::test]
    async fn aggregates_count_within_window_and_overall() {
        let store = MemoryStore::new();
        let start = Utc::now() - chrono::Duration::hours(1);
        for email in ["a@example.com", "b@example.com"] {
            store
                .insert_user(NewUser {
                    email: email.into(),
                    name: None,
                    photo: None,
                    role: Role::User,
                    last_login: Utc::now(),
                })
                .await
                .unwrap();
        }
        store.set_role("b@example.com", Role::Member, Some(Utc::now())).await.unwrap();
        for status in [BookingStatus::Pending, BookingStatus::Confirmed, BookingStatus::Confirmed] {
            store
                .insert_booking(NewBooking {
                    user: "a@example.com".into(),
                    court_id: Uuid::new_v4(),
                    court_name: "Court A".into(),
                    court_type: None,
                    slots: vec![],
                    price: None,
                    status,
                })
                .await
                .unwrap();
        }
        store.insert_payment(payment("a@example.com", 30.0)).await.unwrap();
        store.insert_payment(payment("a@example.com", 12.5)).await.unwrap();

        let overview = store.dashboard_overview().await.unwrap();
        assert_eq!(overview.totals.users, 2);
        assert_eq!(overview.totals.members, 1);
        assert_eq!(overview.totals.confirmed_bookings, 2);
        assert_eq!(overview.totals.revenue, 42.5);
        assert_eq!(overview.statuses.pending, 1);

        let now = store.window_totals(start, Utc::now() + chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(now, PeriodValues { new_users: 2, new_members: 1, bookings: 3, revenue: 42.5 });
        let before = store.window_totals(start - chrono::Duration::days(7), start).await.unwrap();
        assert_eq!(before, PeriodValues::default());

        let activity = store.activity_since(start).await.unwrap();
        assert_eq!(activity.bookings.len(), 3);
        assert_eq!(activity.payments.len(), 2);
        assert!(store.activity_since(Utc::now() + chrono::Duration::hours(1)).await.unwrap().bookings.is_empty());
    }

    #[tokio::test]
    async fn payment_limit_keeps_the_newest() {
        let store = MemoryStore::new();
        for amount in [1.0, 2.0, 3.0] {
            store.insert_payment(payment("a@example.com", amount)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        let recent = store
            .list_payments(&PaymentFilter { limit: Some(2), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(recent.iter().map(|p| p.amount).collect::<Vec<_>>(), vec![3.0, 2.0]);
    }
}
