use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::court::Slot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Confirmed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Approved,
        BookingStatus::Rejected,
        BookingStatus::Confirmed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("invalid booking status '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Email of the booking user.
    pub user: String,
    #[serde(rename = "courtId")]
    pub court_id: Uuid,
    #[serde(rename = "courtName")]
    pub court_name: String,
    #[serde(rename = "courtType")]
    pub court_type: Option<String>,
    pub slots: Vec<Slot>,
    pub price: Option<f64>,
    pub status: BookingStatus,
    pub booking_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user: String,
    pub court_id: Uuid,
    pub court_name: String,
    pub court_type: Option<String>,
    pub slots: Vec<Slot>,
    pub price: Option<f64>,
    pub status: BookingStatus,
}
