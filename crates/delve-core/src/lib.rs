//! # delve-core
//!
//! Foundation types for the delve research orchestrator.
//!
//! This crate provides the shared vocabulary the other delve crates depend on:
//!
//! - **Branded IDs**: `SessionId`, `RequestId` as newtypes for type safety
//! - **Session records**: `SessionRecord` with the `SessionState` machine
//! - **Lifecycle events**: `SessionEvent` notifications published by the hub
//! - **Failure taxonomy**: `SessionFailure` with remote/timeout/storage kinds

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod session;

pub use events::{BaseEvent, SessionEvent};
pub use ids::{RequestId, SessionId};
pub use session::{
    FailureKind, ResearchOptions, SessionFailure, SessionRecord, SessionState,
};
