//! # vigil-core
//!
//! Core types, traits, and abstractions for the vigil alert platform.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other vigil crates depend on.

pub mod backoff;
pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use backoff::{backoff_delay, Backoff};
pub use error::{Error, Result};
pub use events::{
    operator_channel, org_channel, wildcard_channel, AlertEvent, ChannelKey, ClientFrame,
    ServerFrame,
};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{is_v7, new_v7};
