pub mod booking;
pub mod room;

pub use booking::{Booking, BookingStatus};
pub use room::{Room, RoomType};
