//! Reference facility-booking collaborator.
//!
//! Owns the payload microformat for every operation and the in-memory
//! catalog. Booking changes report the facility name as the mutated
//! resource so the dispatcher can notify its monitors.

pub mod catalog;
pub mod handler;
pub mod timeslot;

pub use catalog::{Booking, Catalog, Facility, OpeningHours, Rating};
pub use handler::FacilityService;
pub use timeslot::{ClockTime, TimeSlot, Weekday};
