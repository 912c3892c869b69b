//! Retained message handling
//!
//! A topic may remember its last published value, either on the topic node
//! itself or in a pluggable key/value store, and replay it to subscribers
//! that join later.

/// Provider selection and the two retained tiers
pub mod coordinator;
/// Key/value backends for the store tier
pub mod store;

pub use coordinator::{
	DEFAULT_STORE_NAME, MEMORY_PROVIDER, RETAINED_KEY_PREFIX,
	RetainedCoordinator, RetainedWrite, RetentionError, RetentionProvider,
	retained_key,
};
pub use store::{MemoryStore, RetainedStore};
