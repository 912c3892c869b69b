//! # Topic Bus
//!
//! An in-process publish/subscribe bus organised around a hierarchical,
//! MQTT-style topic namespace.
//!
//! ## Features
//!
//! - **Lazy Topic Tree**: Topics are created on first use from
//!   slash-delimited paths
//! - **Multi-level Wildcard**: `a/#` matches `a` itself and everything below it
//! - **Per-target Subscriptions**: At most one subscription per target on
//!   each topic
//! - **Deferred Multicast**: Handlers run on a background worker, isolated
//!   from each other
//! - **Retained Messages**: In memory or through a pluggable key/value store
//! - **Graceful Shutdown**: Pending deliveries are drained within a timeout
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use topic_bus::{BusConfig, PublishOptions, TopicBus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (bus, worker) = TopicBus::<String>::start(BusConfig::default())?;
//!
//!     bus.subscribe("sensors/#", "logger", |msg, info| {
//!         println!("{}: {}", info.topic, msg);
//!     })?;
//!
//!     bus.publish(
//!         "sensors/kitchen/temperature",
//!         "21.5".to_string(),
//!         PublishOptions::retained(),
//!     )?;
//!
//!     bus.flush().await?;
//!     worker.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Topic Matching
//!
//! - `sport/tennis` matches only publishes to `sport/tennis`
//! - `sport/#` matches `sport`, `sport/tennis`, `sport/tennis/player1`, ...
//! - `#` matches every publish
//!
//! The single-level wildcard `+` is not supported and is rejected.

#![warn(missing_docs)]

pub mod bus;
pub mod message_serializer;
pub mod retained;
pub mod routing;
pub mod topic;

// === Core Public API ===
pub use bus::{
	BusConfig, BusError, BusResult, BusSettings, PublishOptions,
	SubscriptionBuilder, TopicBus,
};
pub use routing::{DeliveryInfo, DeliveryWorker, Target};

// Message serialization
#[cfg(feature = "json")]
pub use message_serializer::JsonSerializer;
pub use message_serializer::{BincodeSerializer, MessageSerializer};

// Retained message storage
pub use retained::{MemoryStore, RetainedStore, RetentionProvider};

/// Prelude module for convenient imports
///
/// ```rust
/// use topic_bus::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for most bus users

	pub use crate::{
		BincodeSerializer, BusConfig, BusError, BusResult, DeliveryInfo,
		DeliveryWorker, MessageSerializer, PublishOptions, RetentionProvider,
		Target, TopicBus,
	};
}

/// Error types used throughout the library
///
/// ```rust
/// use topic_bus::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::bus::BusError;
	pub use crate::retained::RetentionError;
	pub use crate::routing::DeliveryError;
	pub use crate::topic::TopicPathError;
}
