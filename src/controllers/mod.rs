pub mod announcements;
pub mod bookings;
pub mod coupons;
pub mod courts;
pub mod dashboard;
pub mod payments;
pub mod reviews;
pub mod users;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(users::routes())
        .merge(courts::routes())
        .merge(bookings::routes())
        .merge(payments::routes())
        .merge(coupons::routes())
        .merge(announcements::routes())
        .merge(reviews::routes())
        .merge(dashboard::routes())
}
