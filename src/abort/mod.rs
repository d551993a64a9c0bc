//! Abort coordination
//!
//! Every cancellable operation (live call, file playback) registers here.
//! An abort cancels a subset by kind, or everything followed by a forced
//! release of every channel the device still reports open.

mod coordinator;
mod operation;

pub use coordinator::{AbortCoordinator, AbortReport};
pub use operation::{OperationHandle, OperationInfo, OperationKind};
