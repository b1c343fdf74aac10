use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub code: String,
    pub active: bool,
    #[serde(rename = "maxUses")]
    pub max_uses: i64,
    #[serde(rename = "discountAmount")]
    pub discount_amount: f64,
    #[serde(rename = "expiryDate")]
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Reason the coupon cannot be redeemed at `now`, if any.
    pub fn redeemability(&self, now: DateTime<Utc>) -> Result<(), &'static str> {
        if !self.active {
            return Err("Coupon is not active");
        }
        if self.expiry_date.is_some_and(|exp| exp < now) {
            return Err("Coupon has expired");
        }
        if self.max_uses <= 0 {
            return Err("Coupon usage limit reached");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCoupon {
    pub code: String,
    pub active: bool,
    pub max_uses: i64,
    pub discount_amount: f64,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CouponPatch {
    pub code: Option<String>,
    pub active: Option<bool>,
    #[serde(rename = "maxUses")]
    pub max_uses: Option<i64>,
    #[serde(rename = "discountAmount")]
    pub discount_amount: Option<f64>,
    #[serde(rename = "expiryDate")]
    pub expiry_date: Option<DateTime<Utc>>,
}
