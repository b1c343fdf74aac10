pub mod user;
pub mod court;
pub mod booking;
pub mod payment;
pub mod coupon;
pub mod announcement;
pub mod review;
pub mod results;
pub mod stats;

pub use user::{Role, User};
pub use court::{Court, Slot, SlotTime};
pub use booking::{Booking, BookingStatus};
pub use payment::Payment;
pub use coupon::Coupon;
pub use announcement::Announcement;
pub use review::Review;
pub use results::{DeleteResult, InsertResult, UpdateResult};
