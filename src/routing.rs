//! Message routing and delivery module
//!
//! This module provides per-topic subscription lists and the multicaster
//! that delivers published messages to them on a background worker.

/// Routing and delivery error types
pub mod error;
/// Deferred, isolated delivery of messages to subscriptions
pub mod multicaster;
/// Subscription records and subscriber identities
pub mod subscription;

// Re-export commonly used types for convenience
pub use error::DeliveryError;
pub use multicaster::{DeliveryActor, DeliveryWorker, Multicaster};
pub use subscription::{
	DeliveryInfo, MessageHandler, SubscribedHandler, Subscription,
	SubscriptionList, Target,
};
