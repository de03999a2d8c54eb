//! # vigil-realtime
//!
//! Session registry and Redis fan-out for vigil alert delivery.
//!
//! This crate provides:
//! - An in-process registry of live WebSocket sessions, scoped by
//!   organization and operator
//! - A Redis publisher that puts alert events on per-organization channels
//! - A subscription bridge that routes bus messages back into local
//!   sessions, reconnecting with exponential backoff
//!
//! ## Example
//!
//! ```ignore
//! use vigil_realtime::{AlertPublisher, BridgeConfig, ConnectionRegistry, SubscriptionBridge};
//!
//! let registry = ConnectionRegistry::new();
//!
//! // One bridge per API node
//! let bridge = SubscriptionBridge::new(registry.clone(), BridgeConfig::from_env());
//! let handle = bridge.start();
//!
//! // Publish from wherever alerts are written
//! let publisher = AlertPublisher::from_env().await;
//! publisher.publish_alert_created(&alert).await;
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod bridge;
pub mod publisher;
pub mod registry;

// Re-export core types
pub use vigil_core::*;

pub use bridge::{route_message, BridgeConfig, BridgeHandle, SubscriptionBridge};
pub use publisher::AlertPublisher;
pub use registry::{ConnectionRegistry, Session};
