//! Built-in operation handlers.

pub mod facility;

pub use facility::FacilityService;
