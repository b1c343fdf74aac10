pub mod analytics;
pub mod identity;
pub mod payment;
pub mod reconcile;
