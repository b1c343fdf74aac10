//! Dashboard aggregation. Admin figures arrive pre-aggregated from the store;
//! this module picks the windows, derives growth and lays out trend buckets.
//! Member figures are computed from that member's own documents.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::{Booking, BookingStatus, Payment, Role, User};

pub use crate::models::stats::{Activity, Overview, PeriodValues, StatusCounts, Totals};

pub const RECENT_PAYMENTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Range {
    #[default]
    Week,
    Month,
    Year,
}

impl Range {
    pub fn days(&self) -> i64 {
        match self {
            Range::Week => 7,
            Range::Month => 30,
            Range::Year => 365,
        }
    }
}

impl FromStr for Range {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(Range::Week),
            "month" => Ok(Range::Month),
            "year" => Ok(Range::Year),
            other => Err(format!("invalid range '{}', expected week, month or year", other)),
        }
    }
}

/// Half-open `[start, end)` time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Current window ending now, and the equal-length window right before it.
pub fn windows(range: Range, now: DateTime<Utc>) -> (Window, Window) {
    let len = Duration::days(range.days());
    // end is exclusive; nudge so records stamped exactly `now` count
    let end = now + Duration::milliseconds(1);
    let current = Window { start: end - len, end };
    let previous = Window { start: current.start - len, end: current.start };
    (current, previous)
}

/// Percentage change, one decimal. A zero baseline counts as 100% growth.
pub fn growth(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 100.0;
    }
    ((current - previous) / previous * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub label: String,
    pub bookings: u64,
    pub revenue: f64,
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn month_label(index: i32) -> String {
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_default()
}

/// Start of the first trend bucket: midnight six or twenty-nine days back for
/// week and month, the first of the month eleven months back for year.
pub fn trend_start(range: Range, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let first_day = match range {
        Range::Week | Range::Month => today - Duration::days(range.days() - 1),
        Range::Year => {
            let month = month_index(today) - 11;
            NaiveDate::from_ymd_opt(month.div_euclid(12), month.rem_euclid(12) as u32 + 1, 1)
                .unwrap_or(today)
        }
    };
    first_day.and_time(NaiveTime::MIN).and_utc()
}

/// Fixed-grid trend: one bucket per day for week/month, per calendar month
/// for year. Oldest first; the last bucket is the one containing `now`.
pub fn trend(range: Range, now: DateTime<Utc>, activity: &Activity) -> Vec<TrendBucket> {
    let today = now.date_naive();
    match range {
        Range::Week | Range::Month => {
            let days = range.days();
            (0..days)
                .rev()
                .map(|back| {
                    let day = today - Duration::days(back);
                    let label = match range {
                        Range::Week => day.format("%a").to_string(),
                        _ => day.format("%b %d").to_string(),
                    };
                    TrendBucket {
                        label,
                        bookings: activity
                            .bookings
                            .iter()
                            .filter(|at| at.date_naive() == day)
                            .count() as u64,
                        revenue: activity
                            .payments
                            .iter()
                            .filter(|(at, _)| at.date_naive() == day)
                            .map(|(_, amount)| amount)
                            .sum(),
                    }
                })
                .collect()
        }
        Range::Year => {
            let this_month = month_index(today);
            (0..12)
                .rev()
                .map(|back| {
                    let month = this_month - back;
                    TrendBucket {
                        label: month_label(month),
                        bookings: activity
                            .bookings
                            .iter()
                            .filter(|at| month_index(at.date_naive()) == month)
                            .count() as u64,
                        revenue: activity
                            .payments
                            .iter()
                            .filter(|(at, _)| month_index(at.date_naive()) == month)
                            .map(|(_, amount)| amount)
                            .sum(),
                    }
                })
                .collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Growth {
    pub users: f64,
    pub members: f64,
    pub bookings: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub range: Range,
    pub start_date: DateTime<Utc>,
    pub totals: Totals,
    pub current: PeriodValues,
    pub previous: PeriodValues,
    pub growth: Growth,
    pub status_distribution: StatusCounts,
    pub trend: Vec<TrendBucket>,
    pub recent_payments: Vec<Payment>,
}

fn recent(payments: &[Payment]) -> Vec<Payment> {
    let mut sorted = payments.to_vec();
    sorted.sort_by(|a, b| b.pay_at.cmp(&a.pay_at));
    sorted.truncate(RECENT_PAYMENTS);
    sorted
}

/// Assembles the admin dashboard. `current` and `previous` are the store's
/// totals for the two windows from [`windows`]; `activity` covers at least
/// everything since [`trend_start`]; `recent_payments` is newest first.
pub fn admin_stats(
    range: Range,
    now: DateTime<Utc>,
    overview: Overview,
    current: PeriodValues,
    previous: PeriodValues,
    activity: &Activity,
    recent_payments: Vec<Payment>,
) -> AdminStats {
    let (current_window, _) = windows(range, now);

    AdminStats {
        range,
        start_date: current_window.start,
        totals: overview.totals,
        growth: Growth {
            users: growth(current.new_users as f64, previous.new_users as f64),
            members: growth(current.new_members as f64, previous.new_members as f64),
            bookings: growth(current.bookings as f64, previous.bookings as f64),
            revenue: growth(current.revenue, previous.revenue),
        },
        current,
        previous,
        status_distribution: overview.statuses,
        trend: trend(range, now, activity),
        recent_payments,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStats {
    pub email: String,
    pub role: Option<Role>,
    pub member_since: Option<DateTime<Utc>>,
    pub bookings: StatusCounts,
    pub total_spent: f64,
    pub total_saved: f64,
    pub confirmed_slots: u64,
    pub recent_payments: Vec<Payment>,
}

/// `bookings` and `payments` must already be restricted to `email`.
pub fn member_stats(email: &str, user: Option<&User>, bookings: &[Booking], payments: &[Payment]) -> MemberStats {
    MemberStats {
        email: email.to_string(),
        role: user.map(|u| u.role),
        member_since: user.and_then(|u| u.member_since),
        bookings: StatusCounts::tally(bookings),
        total_spent: payments.iter().map(|p| p.amount).sum(),
        total_saved: payments.iter().map(|p| p.discount_amount).sum(),
        confirmed_slots: bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .map(|b| b.slots.len() as u64)
            .sum(),
        recent_payments: recent(payments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn booking(at: DateTime<Utc>, status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user: "a@example.com".into(),
            court_id: Uuid::new_v4(),
            court_name: "Court A".into(),
            court_type: None,
            slots: vec![],
            price: None,
            status,
            booking_at: at,
        }
    }

    fn payment(at: DateTime<Utc>, amount: f64) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            court_name: "Court A".into(),
            email: "a@example.com".into(),
            amount,
            coupon_code: None,
            discount_amount: 1.0,
            transaction_id: "pi".into(),
            slots: vec![],
            pay_at: at,
        }
    }

    #[test]
    fn growth_from_zero_is_one_hundred() {
        assert_eq!(growth(0.0, 0.0), 100.0);
        assert_eq!(growth(12.0, 0.0), 100.0);
    }

    #[test]
    fn growth_is_relative_change() {
        assert_eq!(growth(75.0, 50.0), 50.0);
        assert_eq!(growth(25.0, 50.0), -50.0);
        assert_eq!(growth(1.0, 3.0), -66.7);
    }

    #[test]
    fn windows_are_adjacent_and_equal_length() {
        let (cur, prev) = windows(Range::Month, now());
        assert_eq!(prev.end, cur.start);
        assert_eq!(cur.end - cur.start, prev.end - prev.start);
        assert!(cur.contains(now()));
        assert!(!prev.contains(now()));
    }

    #[test]
    fn week_trend_has_seven_daily_buckets_ending_today() {
        let activity = Activity {
            bookings: vec![now(), now() - Duration::days(6), now() - Duration::days(7)],
            payments: vec![(now(), 20.0), (now(), 5.5)],
        };
        let buckets = trend(Range::Week, now(), &activity);

        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[6].label, "Sat");
        assert_eq!(buckets[6].bookings, 1);
        assert_eq!(buckets[6].revenue, 25.5);
        assert_eq!(buckets[0].bookings, 1);
        assert_eq!(buckets.iter().map(|b| b.bookings).sum::<u64>(), 2);
    }

    #[test]
    fn year_trend_uses_calendar_months() {
        let activity = Activity {
            bookings: vec![
                Utc.with_ymd_and_hms(2023, 7, 2, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2023, 6, 30, 0, 0, 0).unwrap(),
            ],
            payments: vec![],
        };
        let buckets = trend(Range::Year, now(), &activity);

        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets[0].label, "Jul 2023");
        assert_eq!(buckets[11].label, "Jun 2024");
        assert_eq!(buckets[0].bookings, 1);
    }

    #[test]
    fn trend_start_is_the_first_bucket_boundary() {
        assert_eq!(trend_start(Range::Week, now()), Utc.with_ymd_and_hms(2024, 6, 9, 0, 0, 0).unwrap());
        assert_eq!(trend_start(Range::Month, now()), Utc.with_ymd_and_hms(2024, 5, 17, 0, 0, 0).unwrap());
        assert_eq!(trend_start(Range::Year, now()), Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn admin_stats_compare_current_with_previous_window() {
        let mut statuses = StatusCounts::default();
        statuses.add(BookingStatus::Pending, 2);
        statuses.add(BookingStatus::Confirmed, 1);
        let overview = Overview {
            totals: Totals { courts: 3, bookings: 3, confirmed_bookings: 1, revenue: 125.0, ..Default::default() },
            statuses,
        };
        let current = PeriodValues { new_users: 4, new_members: 0, bookings: 3, revenue: 75.0 };
        let previous = PeriodValues { new_users: 0, new_members: 2, bookings: 2, revenue: 50.0 };
        let activity = Activity { bookings: vec![now() - Duration::days(1)], payments: vec![] };
        let recent = vec![payment(now() - Duration::days(1), 75.0)];

        let stats = admin_stats(Range::Week, now(), overview, current, previous, &activity, recent);

        assert_eq!(stats.growth.bookings, 50.0);
        assert_eq!(stats.growth.revenue, 50.0);
        assert_eq!(stats.growth.users, 100.0);
        assert_eq!(stats.growth.members, -100.0);
        assert_eq!(stats.totals.courts, 3);
        assert_eq!(stats.status_distribution.pending, 2);
        assert_eq!(stats.status_distribution.total, 3);
        assert_eq!(stats.trend.iter().map(|b| b.bookings).sum::<u64>(), 1);
        assert_eq!(stats.start_date, windows(Range::Week, now()).0.start);
        assert_eq!(stats.recent_payments[0].amount, 75.0);
    }

    #[test]
    fn member_stats_sum_spend_and_confirmed_slots() {
        let mut confirmed = booking(now(), BookingStatus::Confirmed);
        confirmed.slots = vec![
            crate::models::Slot { start_time: "1".into(), end_time: "2".into(), available: false },
            crate::models::Slot { start_time: "2".into(), end_time: "3".into(), available: false },
        ];
        let bookings = vec![confirmed, booking(now(), BookingStatus::Pending)];
        let payments = vec![payment(now(), 40.0), payment(now(), 10.0)];

        let stats = member_stats("a@example.com", None, &bookings, &payments);
        assert_eq!(stats.bookings.total, 2);
        assert_eq!(stats.confirmed_slots, 2);
        assert_eq!(stats.total_spent, 50.0);
        assert_eq!(stats.total_saved, 2.0);
        assert_eq!(stats.role, None);
    }

    proptest! {
        #[test]
        fn growth_matches_formula_for_nonzero_baseline(cur in 0u32..10_000, prev in 1u32..10_000) {
            let expected = (cur as f64 - prev as f64) / prev as f64 * 100.0;
            prop_assert!((growth(cur as f64, prev as f64) - expected).abs() <= 0.05 + 1e-9);
        }

        #[test]
        fn daily_trend_never_loses_in_window_bookings(offsets in proptest::collection::vec(0i64..7, 0..30)) {
            let activity = Activity {
                bookings: offsets.iter().map(|d| now() - Duration::days(*d)).collect(),
                payments: vec![],
            };
            let buckets = trend(Range::Week, now(), &activity);
            prop_assert_eq!(buckets.iter().map(|b| b.bookings).sum::<u64>(), offsets.len() as u64);
        }
    }
}
