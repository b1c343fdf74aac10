use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Booking, BookingStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub confirmed: u64,
}

impl StatusCounts {
    pub fn add(&mut self, status: BookingStatus, count: u64) {
        self.total += count;
        match status {
            BookingStatus::Pending => self.pending += count,
            BookingStatus::Approved => self.approved += count,
            BookingStatus::Rejected => self.rejected += count,
            BookingStatus::Confirmed => self.confirmed += count,
        }
    }

    pub fn tally<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> Self {
        let mut counts = StatusCounts::default();
        for b in bookings {
            counts.add(b.status, 1);
        }
        counts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub users: u64,
    pub members: u64,
    pub courts: u64,
    pub bookings: u64,
    pub confirmed_bookings: u64,
    pub revenue: f64,
}

/// All-time totals plus the booking status distribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overview {
    pub totals: Totals,
    pub statuses: StatusCounts,
}

/// Activity inside one `[start, end)` window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodValues {
    pub new_users: u64,
    pub new_members: u64,
    pub bookings: u64,
    pub revenue: f64,
}

/// Booking timestamps and dated payment amounts since some instant, for
/// trend buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    pub bookings: Vec<DateTime<Utc>>,
    pub payments: Vec<(DateTime<Utc>, f64)>,
}
