//! Channel session management
//!
//! `SessionManager` turns the device's raw enabled/disabled channel report
//! into acquire/release exclusivity:
//! - acquire picks the first free channel in device order
//! - release is tolerant of channels that are already closed
//! - listing is always a live device query

mod manager;

pub use manager::SessionManager;
