use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::court::SlotTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "courtName")]
    pub court_name: String,
    pub email: String,
    pub amount: f64,
    #[serde(rename = "couponCode")]
    pub coupon_code: Option<String>,
    #[serde(rename = "discountAmount")]
    pub discount_amount: f64,
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    pub slots: Vec<SlotTime>,
    pub pay_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub court_name: String,
    pub email: String,
    pub amount: f64,
    pub coupon_code: Option<String>,
    pub discount_amount: f64,
    pub transaction_id: String,
    pub slots: Vec<SlotTime>,
}
