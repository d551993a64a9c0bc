//! Gateway service
//!
//! Owns the session manager and abort coordinator and exposes the
//! operations an HTTP layer calls into:
//! - start a live call for a negotiated browser transport
//! - play a pre-recorded clip
//! - abort everything
//! - health probe and shutdown

mod call;
mod service;

pub use call::CallHandle;
pub use service::Gateway;
