//! # vigil-client
//!
//! Reconnecting WebSocket alert feed for vigil dashboards.
//!
//! The feed maintains a single connection to a vigil-api node, re-dialing
//! with exponential backoff whenever the socket drops, and fans received
//! frames out to in-process subscribers. A bounded ring of recent events
//! backs the dashboard's "latest alerts" panel; it is a display buffer,
//! not a durable log.
//!
//! ## Example
//!
//! ```ignore
//! use vigil_client::{AlertFeed, ConnectionStatus, FeedConfig};
//!
//! let config = FeedConfig::from_env().with_token("op-token");
//! let feed = AlertFeed::connect(config);
//!
//! let mut frames = feed.subscribe();
//! let mut status = feed.status();
//!
//! tokio::select! {
//!     Ok(frame) = frames.recv() => println!("{:?}", frame),
//!     _ = status.changed() => println!("{:?}", *status.borrow()),
//! }
//!
//! feed.shutdown().await?;
//! ```

pub mod feed;

// Re-export core types
pub use vigil_core::*;

pub use feed::{AlertFeed, ConnectionStatus, FeedConfig, FeedHandle};
