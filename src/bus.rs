//! Bus façade
//!
//! This module ties the topic tree, the retained message tiers and the
//! delivery worker together behind [`TopicBus`].

/// Configuration types for bus initialization
pub mod config;
/// Bus error types
pub mod error;
/// Per-publish options
pub mod options;
/// Fluent subscription setup
pub mod subscription_builder;
/// The publish/subscribe entry point
pub mod topic_bus;

pub use config::{BusConfig, BusSettings};
pub use error::{BusError, BusResult};
pub use options::PublishOptions;
pub use subscription_builder::SubscriptionBuilder;
pub use topic_bus::TopicBus;
