//! # Error Types
//!
//! This module defines the error taxonomy shared by the actor tree, the
//! render session, and the frame transports. These errors are propagated back
//! to callers to help diagnose and handle problems; unknown-event handling
//! under the `Warn`/`Ignore` policies is recovered locally and never surfaces
//! here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actor::machine::{LifecycleCommand, LifecycleState};

/// Errors that can occur while operating a viewer session.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ViewerError {
    /// An event tag outside the actor's declared set, under the `Error` policy
    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    /// A known event tag whose payload failed structural validation
    #[error("Invalid payload for event '{kind}': {reason}")]
    InvalidEventPayload { kind: String, reason: String },

    /// A lifecycle edge that is not in the declared transition table
    #[error("Invalid transition: cannot {command} from {state}")]
    InvalidTransition {
        state: LifecycleState,
        command: LifecycleCommand,
    },

    /// A running-only operation invoked outside the `running` state
    #[error("Actor not ready: state is {state}")]
    ActorNotReady { state: LifecycleState },

    /// A pull render was requested before `setup` ever ran
    #[error("Render session has not been set up")]
    NotSetUp,

    /// The rendering device could not be reached
    #[error("Rendering device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The rendering device failed while executing a command
    #[error("Rendering device failed: {0}")]
    DeviceFailure(String),

    /// Non-positive render dimensions
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    /// The backing store path does not exist
    #[error("Store not found: {0}")]
    StoreNotFound(String),

    /// The backing store exists but could not be read
    #[error("Store unreachable: {0}")]
    StoreUnreachable(String),

    /// An `ImageData` without exactly one data source
    #[error("Invalid image data: {0}")]
    InvalidImageData(String),

    /// The still-image codec rejected a frame
    #[error("Frame encoding failed: {0}")]
    Encode(String),

    /// The actor is shutting down and no longer accepts operations
    #[error("Actor is shutting down")]
    ShuttingDown,

    /// Communication channel to the actor was closed unexpectedly
    #[error("Operation channel closed")]
    ChannelClosed,

    /// Operation exceeded the maximum allowed execution time
    #[error("Operation timed out after {0}s")]
    OperationTimeout(u64),
}
