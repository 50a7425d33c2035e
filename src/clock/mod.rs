mod controller;
pub mod global;
mod subscribers;

pub use controller::{MILLIS_PER_DAY, MILLIS_PER_HOUR, MILLIS_PER_MINUTE, VirtualClock};
pub use subscribers::Subscription;
