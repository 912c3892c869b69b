use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arcstr::ArcStr;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

use super::store::RetainedStore;
use crate::message_serializer::MessageSerializer;
use crate::topic::TopicNode;

/// Prefix of every key written to the external store
pub const RETAINED_KEY_PREFIX: &str = "[retained]";

/// Provider name selecting the per-node memory tier
pub const MEMORY_PROVIDER: &str = "memory";

/// Provider name of the default external store
pub const DEFAULT_STORE_NAME: &str = "localStorage";

/// Errors raised while retaining a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetentionError {
	/// Provider is neither `memory` nor the configured store name
	#[error("Unknown retention provider '{provider}'")]
	UnknownProvider {
		/// The rejected provider name
		provider: String,
	},

	/// Message could not be encoded for the external store
	#[error("Failed to serialize retained message: {details}")]
	Serialization {
		/// Serializer error description
		details: String,
	},
}

impl RetentionError {
	/// Creates a new UnknownProvider error
	pub fn unknown_provider(provider: impl Into<String>) -> Self {
		Self::UnknownProvider {
			provider: provider.into(),
		}
	}

	/// Returns the error type for categorization
	pub fn error_type(&self) -> &'static str {
		match self {
			| RetentionError::UnknownProvider { .. } => "unknown_provider",
			| RetentionError::Serialization { .. } => "serialization",
		}
	}
}

/// Where a retained message is kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum RetentionProvider {
	/// On the topic node itself
	#[default]
	Memory,
	/// In the external store registered under this name
	Named(ArcStr),
}

impl RetentionProvider {
	/// Provider backed by the external store registered as `name`
	pub fn named(name: impl Into<ArcStr>) -> Self {
		Self::Named(name.into())
	}

	/// Name used in publish options and logs
	pub fn name(&self) -> &str {
		match self {
			| RetentionProvider::Memory => MEMORY_PROVIDER,
			| RetentionProvider::Named(name) => name.as_str(),
		}
	}
}

impl fmt::Display for RetentionProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for RetentionProvider {
	type Err = RetentionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			| "" => Err(RetentionError::unknown_provider(s)),
			| MEMORY_PROVIDER => Ok(RetentionProvider::Memory),
			| name => Ok(RetentionProvider::named(name)),
		}
	}
}

/// A validated retained write, prepared before the tree is touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetainedWrite {
	/// Keep the message on the node
	Memory,
	/// Keep the encoded message in the external store
	Store(Bytes),
}

/// External store key for a topic
pub fn retained_key(topic: &str) -> String {
	format!("{RETAINED_KEY_PREFIX}{topic}")
}

/// Reads and writes the last value of a topic through either tier.
pub struct RetainedCoordinator<S> {
	store: Arc<dyn RetainedStore>,
	store_name: ArcStr,
	serializer: S,
}

impl<S> fmt::Debug for RetainedCoordinator<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RetainedCoordinator")
			.field("store_name", &self.store_name)
			.finish_non_exhaustive()
	}
}

impl<S> RetainedCoordinator<S> {
	/// Coordinator writing store-tier values to `store` under `store_name`
	pub fn new(
		store: Arc<dyn RetainedStore>,
		store_name: impl Into<ArcStr>,
		serializer: S,
	) -> Self {
		Self {
			store,
			store_name: store_name.into(),
			serializer,
		}
	}

	/// Fails unless `provider` is `memory` or the configured store name
	pub fn check_provider(
		&self,
		provider: &RetentionProvider,
	) -> Result<(), RetentionError> {
		match provider {
			| RetentionProvider::Memory => Ok(()),
			| RetentionProvider::Named(name) if *name == self.store_name => {
				Ok(())
			}
			| RetentionProvider::Named(name) => {
				Err(RetentionError::unknown_provider(name.as_str()))
			}
		}
	}

	/// Validates the provider and encodes the message if the store needs it
	pub fn prepare<T>(
		&self,
		provider: &RetentionProvider,
		message: &T,
	) -> Result<RetainedWrite, RetentionError>
	where
		S: MessageSerializer<T>,
	{
		self.check_provider(provider)?;
		match provider {
			| RetentionProvider::Memory => Ok(RetainedWrite::Memory),
			| RetentionProvider::Named(_) => self
				.serializer
				.serialize(message)
				.map(|bytes| RetainedWrite::Store(Bytes::from(bytes)))
				.map_err(|e| RetentionError::Serialization {
					details: format!("{e:?}"),
				}),
		}
	}

	/// Makes `message` the retained value of `node`.
	///
	/// Writing one tier clears the other, so a topic never holds two
	/// competing retained values.
	pub fn retain<T>(
		&self,
		node: &mut TopicNode<T>,
		topic: &str,
		message: &Arc<T>,
		write: RetainedWrite,
	) {
		match write {
			| RetainedWrite::Memory => {
				node.retained = Some(Arc::clone(message));
				self.store.remove(&retained_key(topic));
				debug!(
					topic = %topic,
					provider = MEMORY_PROVIDER,
					"Message retained"
				);
			}
			| RetainedWrite::Store(bytes) => {
				node.retained = None;
				self.store.set(&retained_key(topic), bytes);
				debug!(
					topic = %topic,
					provider = %self.store_name,
					"Message retained"
				);
			}
		}
	}

	/// Retained value of `node`, memory tier first
	pub fn lookup<T>(&self, node: &TopicNode<T>, topic: &str) -> Option<Arc<T>>
	where S: MessageSerializer<T> {
		if let Some(message) = node.retained() {
			return Some(Arc::clone(message));
		}
		self.lookup_in_store(topic)
	}

	/// Retained value of `topic` in the external store only
	pub fn lookup_in_store<T>(&self, topic: &str) -> Option<Arc<T>>
	where S: MessageSerializer<T> {
		let bytes = self.store.get(&retained_key(topic))?;
		match self.serializer.deserialize(&bytes) {
			| Ok(message) => Some(Arc::new(message)),
			| Err(e) => {
				warn!(
					topic = %topic,
					provider = %self.store_name,
					error = ?e,
					"Discarding undecodable retained message"
				);
				None
			}
		}
	}

	/// Removes the retained value from both tiers.
	///
	/// Returns true if either tier held a value.
	pub fn clear<T>(
		&self,
		node: Option<&mut TopicNode<T>>,
		topic: &str,
	) -> bool {
		let from_node = node.and_then(|node| node.retained.take()).is_some();
		let from_store = self.store.remove(&retained_key(topic)).is_some();
		let cleared = from_node || from_store;
		if cleared {
			debug!(topic = %topic, "Retained message cleared");
		}
		cleared
	}
}
