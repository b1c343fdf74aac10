//! Slot reconciliation.
//!
//! The two flows that write several documents for one request:
//!
//! * **cancel**: release the booked slots on the court, then delete the
//!   booking. The delete only happens if releasing actually changed the court.
//! * **confirm**: look up the booking (it must exist and belong to the paying
//!   email), reserve slots, consume the coupon, mark the booking `confirmed`,
//!   record the payment under the booking owner's email.
//!
//! The store has no multi-document transactions, so each flow runs as a saga:
//! every completed step registers an undo action, and if a later step fails the
//! undo actions run newest-first before the error is returned. Undo failures
//! are logged; they never replace the original error.
//!
//! Slots are matched on exact `(startTime, endTime)` equality. Reserving a slot
//! that is already unavailable is logged but allowed.

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{
    court::set_availability, payment::NewPayment, BookingStatus, DeleteResult, SlotTime,
    UpdateResult,
};
use crate::store::{Store, StoreError, StoreResult};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("court {0} not found")]
    CourtNotFound(Uuid),

    #[error("booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("payment email does not match booking {0}")]
    EmailMismatch(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Undo actions registered by completed saga steps.
struct Compensations<'a> {
    steps: Vec<(&'static str, BoxFuture<'a, StoreResult<UpdateResult>>)>,
}

impl<'a> Compensations<'a> {
    fn new() -> Self {
        Self { steps: Vec::new() }
    }

    fn push(&mut self, name: &'static str, undo: BoxFuture<'a, StoreResult<UpdateResult>>) {
        self.steps.push((name, undo));
    }

    async fn unwind(self) {
        for (name, undo) in self.steps.into_iter().rev() {
            match undo.await {
                Ok(_) => warn!("compensated: {}", name),
                Err(e) => error!("compensation '{}' failed, manual repair needed: {:?}", name, e),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    pub court_update: UpdateResult,
    pub booking_delete: DeleteResult,
}

pub async fn cancel_booking(
    store: &dyn Store,
    booking_id: Uuid,
    court_id: Uuid,
    release: &[SlotTime],
) -> Result<CancelOutcome, ReconcileError> {
    let court = store
        .find_court(court_id)
        .await?
        .ok_or(ReconcileError::CourtNotFound(court_id))?;

    let previous = court.slots.clone();
    let mut slots = court.slots;
    let released = set_availability(&mut slots, release, true);
    let court_update = store.replace_slots(court_id, slots).await?;

    if !court_update.modified() {
        info!(
            "cancel booking {}: no slot on court {} changed, booking kept",
            booking_id, court_id
        );
        return Ok(CancelOutcome { court_update, booking_delete: DeleteResult::new(0) });
    }

    match store.delete_booking(booking_id).await {
        Ok(booking_delete) => {
            info!(
                "cancel booking {}: released {} slots on court {}, deleted {}",
                booking_id, released, court_id, booking_delete.deleted_count
            );
            Ok(CancelOutcome { court_update, booking_delete })
        }
        Err(e) => {
            error!("cancel booking {}: delete failed: {:?}", booking_id, e);
            let mut undo = Compensations::new();
            undo.push("restore court slots", store.replace_slots(court_id, previous));
            undo.unwind().await;
            Err(e.into())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfirmPayment {
    pub booking_id: Uuid,
    pub court_id: Uuid,
    pub court_name: String,
    pub email: String,
    pub amount: f64,
    pub slots: Vec<SlotTime>,
    pub transaction_id: String,
    pub coupon_code: Option<String>,
    pub discount_amount: f64,
    /// Remaining uses as computed by the client.
    pub coupon_max_uses: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOutcome {
    pub payment_id: Uuid,
    pub court_update: UpdateResult,
    pub coupon_update: Option<UpdateResult>,
    pub booking_update: UpdateResult,
}

pub async fn confirm_payment(
    store: &dyn Store,
    req: ConfirmPayment,
) -> Result<ConfirmOutcome, ReconcileError> {
    let mut undo = Compensations::new();
    match run_confirm(store, &req, &mut undo).await {
        Ok(outcome) => {
            info!(
                "booking {} confirmed: payment {} of {} by {}",
                req.booking_id, outcome.payment_id, req.amount, req.email
            );
            Ok(outcome)
        }
        Err(e) => {
            error!("confirm booking {} failed: {:?}", req.booking_id, e);
            undo.unwind().await;
            Err(e)
        }
    }
}

async fn run_confirm<'a>(
    store: &'a dyn Store,
    req: &ConfirmPayment,
    undo: &mut Compensations<'a>,
) -> Result<ConfirmOutcome, ReconcileError> {
    // 0. the payment must belong to an existing booking; nothing is written otherwise
    let booking = store
        .find_booking(req.booking_id)
        .await?
        .ok_or(ReconcileError::BookingNotFound(req.booking_id))?;
    if !booking.user.eq_ignore_ascii_case(req.email.trim()) {
        return Err(ReconcileError::EmailMismatch(req.booking_id));
    }

    // 1. reserve slots
    let court = store
        .find_court(req.court_id)
        .await?
        .ok_or(ReconcileError::CourtNotFound(req.court_id))?;

    let taken = court
        .slots
        .iter()
        .filter(|s| !s.available && req.slots.iter().any(|t| s.matches(t)))
        .count();
    if taken > 0 {
        warn!(
            "booking {} reserves {} slot(s) on court {} that are already unavailable",
            req.booking_id, taken, req.court_id
        );
    }

    let previous_slots = court.slots.clone();
    let mut slots = court.slots;
    set_availability(&mut slots, &req.slots, false);
    let court_update = store.replace_slots(req.court_id, slots).await?;
    if court_update.modified() {
        undo.push("restore court slots", store.replace_slots(req.court_id, previous_slots));
    }

    // 2. consume coupon
    let coupon_update = match (&req.coupon_code, req.coupon_max_uses) {
        (Some(code), Some(max_uses)) => {
            let previous = store.find_coupon_by_code(code).await?;
            let update = store.set_coupon_max_uses(code, max_uses).await?;
            if let (true, Some(previous)) = (update.modified(), previous) {
                let code = code.clone();
                undo.push(
                    "restore coupon uses",
                    async move { store.set_coupon_max_uses(&code, previous.max_uses).await }.boxed(),
                );
            }
            Some(update)
        }
        _ => None,
    };

    // 3. confirm booking
    let booking_update = store.set_booking_status(req.booking_id, BookingStatus::Confirmed).await?;
    if booking_update.modified() {
        undo.push(
            "restore booking status",
            store.set_booking_status(req.booking_id, booking.status),
        );
    }

    // 4. record payment
    let payment = store
        .insert_payment(NewPayment {
            court_name: req.court_name.clone(),
            email: booking.user.clone(),
            amount: req.amount,
            coupon_code: req.coupon_code.clone(),
            discount_amount: req.discount_amount,
            transaction_id: req.transaction_id.clone(),
            slots: req.slots.clone(),
        })
        .await?;

    Ok(ConfirmOutcome {
        payment_id: payment.inserted_id,
        court_update,
        coupon_update,
        booking_update,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        booking::NewBooking, coupon::NewCoupon, court::NewCourt, Slot,
    };
    use crate::store::{MemoryStore, PaymentFilter};

    fn slot(start: &str, end: &str, available: bool) -> Slot {
        Slot { start_time: start.into(), end_time: end.into(), available }
    }

    async fn seed(store: &MemoryStore, available: bool) -> (Uuid, Uuid) {
        let court_id = store
            .insert_court(NewCourt {
                name: "Court A".into(),
                sport_type: "Tennis".into(),
                slots: vec![
                    slot("08:00 AM", "09:00 AM", available),
                    slot("09:00 AM", "10:00 AM", available),
                    slot("10:00 AM", "11:00 AM", true),
                ],
                ..Default::default()
            })
            .await
            .unwrap()
            .inserted_id;
        let booking_id = store
            .insert_booking(NewBooking {
                user: "player@example.com".into(),
                court_id,
                court_name: "Court A".into(),
                court_type: Some("Tennis".into()),
                slots: vec![slot("08:00 AM", "09:00 AM", true), slot("09:00 AM", "10:00 AM", true)],
                price: Some(40.0),
                status: BookingStatus::Approved,
            })
            .await
            .unwrap()
            .inserted_id;
        (court_id, booking_id)
    }

    fn booked() -> Vec<SlotTime> {
        vec![SlotTime::new("08:00 AM", "09:00 AM"), SlotTime::new("09:00 AM", "10:00 AM")]
    }

    fn confirm_req(court_id: Uuid, booking_id: Uuid) -> ConfirmPayment {
        ConfirmPayment {
            booking_id,
            court_id,
            court_name: "Court A".into(),
            email: "player@example.com".into(),
            amount: 36.0,
            slots: booked(),
            transaction_id: "pi_123".into(),
            coupon_code: Some("SAVE10".into()),
            discount_amount: 4.0,
            coupon_max_uses: Some(4),
        }
    }

    async fn seed_coupon(store: &MemoryStore) {
        store
            .insert_coupon(NewCoupon {
                code: "SAVE10".into(),
                active: true,
                max_uses: 5,
                discount_amount: 10.0,
                expiry_date: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_releases_slots_and_deletes_booking() {
        let store = MemoryStore::new();
        let (court_id, booking_id) = seed(&store, false).await;

        let outcome = cancel_booking(&store, booking_id, court_id, &booked()).await.unwrap();

        assert_eq!(outcome.court_update, UpdateResult::new(1, 1));
        assert_eq!(outcome.booking_delete, DeleteResult::new(1));
        let court = store.find_court(court_id).await.unwrap().unwrap();
        assert!(court.slots.iter().all(|s| s.available));
        assert!(store.find_booking(booking_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_without_court_change_keeps_booking() {
        let store = MemoryStore::new();
        // slots already free: releasing modifies nothing
        let (court_id, booking_id) = seed(&store, true).await;

        let outcome = cancel_booking(&store, booking_id, court_id, &booked()).await.unwrap();

        assert_eq!(outcome.court_update.modified_count, 0);
        assert_eq!(outcome.booking_delete.deleted_count, 0);
        assert!(store.find_booking(booking_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cancel_restores_slots_when_delete_fails() {
        let store = MemoryStore::new();
        let (court_id, booking_id) = seed(&store, false).await;
        store.fail_on("delete_booking").await;

        let err = cancel_booking(&store, booking_id, court_id, &booked()).await.unwrap_err();

        assert!(matches!(err, ReconcileError::Store(_)));
        let court = store.find_court(court_id).await.unwrap().unwrap();
        assert!(!court.slots[0].available);
        assert!(!court.slots[1].available);
        assert!(store.find_booking(booking_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cancel_on_missing_court_is_not_found() {
        let store = MemoryStore::new();
        let err = cancel_booking(&store, Uuid::new_v4(), Uuid::new_v4(), &booked())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::CourtNotFound(_)));
    }

    #[tokio::test]
    async fn confirm_reserves_slots_confirms_booking_and_records_one_payment() {
        let store = MemoryStore::new();
        let (court_id, booking_id) = seed(&store, true).await;
        seed_coupon(&store).await;

        let outcome = confirm_payment(&store, confirm_req(court_id, booking_id)).await.unwrap();

        let court = store.find_court(court_id).await.unwrap().unwrap();
        assert!(!court.slots[0].available);
        assert!(!court.slots[1].available);
        assert!(court.slots[2].available);

        let booking = store.find_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let payments = store.list_payments(&PaymentFilter::default()).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].id, outcome.payment_id);
        assert_eq!(payments[0].email, "player@example.com");
        assert_eq!(payments[0].amount, 36.0);

        // coupon takes the client-supplied value verbatim
        let coupon = store.find_coupon_by_code("SAVE10").await.unwrap().unwrap();
        assert_eq!(coupon.max_uses, 4);
        assert_eq!(outcome.coupon_update, Some(UpdateResult::new(1, 1)));
    }

    #[tokio::test]
    async fn confirm_allows_already_taken_slots() {
        let store = MemoryStore::new();
        let (court_id, booking_id) = seed(&store, false).await;

        let outcome = confirm_payment(&store, confirm_req(court_id, booking_id)).await.unwrap();

        assert_eq!(outcome.court_update.modified_count, 0);
        assert_eq!(outcome.booking_update.modified_count, 1);
    }

    #[tokio::test]
    async fn confirm_rolls_back_every_step_when_payment_insert_fails() {
        let store = MemoryStore::new();
        let (court_id, booking_id) = seed(&store, true).await;
        seed_coupon(&store).await;
        store.fail_on("insert_payment").await;

        let err = confirm_payment(&store, confirm_req(court_id, booking_id)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Store(_)));

        let court = store.find_court(court_id).await.unwrap().unwrap();
        assert!(court.slots.iter().all(|s| s.available));
        let booking = store.find_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Approved);
        let coupon = store.find_coupon_by_code("SAVE10").await.unwrap().unwrap();
        assert_eq!(coupon.max_uses, 5);
        assert!(store.list_payments(&PaymentFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_failure_at_coupon_only_restores_slots() {
        let store = MemoryStore::new();
        let (court_id, booking_id) = seed(&store, true).await;
        seed_coupon(&store).await;
        store.fail_on("set_coupon_max_uses").await;

        confirm_payment(&store, confirm_req(court_id, booking_id)).await.unwrap_err();

        let court = store.find_court(court_id).await.unwrap().unwrap();
        assert!(court.slots.iter().all(|s| s.available));
        let booking = store.find_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Approved);
    }

    #[tokio::test]
    async fn confirm_for_unknown_booking_writes_nothing() {
        let store = MemoryStore::new();
        let (court_id, _) = seed(&store, true).await;
        seed_coupon(&store).await;

        let err = confirm_payment(&store, confirm_req(court_id, Uuid::new_v4()))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::BookingNotFound(_)));
        let court = store.find_court(court_id).await.unwrap().unwrap();
        assert!(court.slots.iter().all(|s| s.available));
        let coupon = store.find_coupon_by_code("SAVE10").await.unwrap().unwrap();
        assert_eq!(coupon.max_uses, 5);
        assert!(store.list_payments(&PaymentFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_rejects_email_other_than_booking_owner() {
        let store = MemoryStore::new();
        let (court_id, booking_id) = seed(&store, true).await;
        let req = ConfirmPayment {
            email: "victim@example.com".into(),
            ..confirm_req(court_id, booking_id)
        };

        let err = confirm_payment(&store, req).await.unwrap_err();

        assert!(matches!(err, ReconcileError::EmailMismatch(_)));
        let court = store.find_court(court_id).await.unwrap().unwrap();
        assert!(court.slots.iter().all(|s| s.available));
        assert!(store.list_payments(&PaymentFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_records_booking_owner_email() {
        let store = MemoryStore::new();
        let (court_id, booking_id) = seed(&store, true).await;
        let req = ConfirmPayment {
            email: "Player@Example.com".into(),
            coupon_code: None,
            coupon_max_uses: None,
            ..confirm_req(court_id, booking_id)
        };

        confirm_payment(&store, req).await.unwrap();

        let payments = store.list_payments(&PaymentFilter::default()).await.unwrap();
        assert_eq!(payments[0].email, "player@example.com");
    }

    #[tokio::test]
    async fn confirm_without_coupon_skips_coupon_step() {
        let store = MemoryStore::new();
        let (court_id, booking_id) = seed(&store, true).await;
        let req = ConfirmPayment {
            coupon_code: None,
            coupon_max_uses: None,
            discount_amount: 0.0,
            ..confirm_req(court_id, booking_id)
        };

        let outcome = confirm_payment(&store, req).await.unwrap();
        assert_eq!(outcome.coupon_update, None);
    }
}
