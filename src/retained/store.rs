use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

/// Synchronous key/value backend for retained messages.
///
/// The bus owns one store per instance and addresses it with keys of the form
/// `"[retained]<topic>"`.
pub trait RetainedStore: Send + Sync {
	/// Returns the value stored under `key`
	fn get(&self, key: &str) -> Option<Bytes>;
	/// Stores `value` under `key`, replacing any previous value
	fn set(&self, key: &str, value: Bytes);
	/// Removes and returns the value stored under `key`
	fn remove(&self, key: &str) -> Option<Bytes>;
}

/// Process-local [`RetainedStore`] backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
	data: Mutex<HashMap<String, Bytes>>,
}

impl MemoryStore {
	/// Creates an empty store
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored keys
	pub fn len(&self) -> usize {
		self.data().len()
	}

	/// True if nothing is stored
	pub fn is_empty(&self) -> bool {
		self.data().is_empty()
	}

	fn data(&self) -> MutexGuard<'_, HashMap<String, Bytes>> {
		self.data.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

impl RetainedStore for MemoryStore {
	fn get(&self, key: &str) -> Option<Bytes> {
		self.data().get(key).cloned()
	}

	fn set(&self, key: &str, value: Bytes) {
		self.data().insert(key.to_owned(), value);
	}

	fn remove(&self, key: &str) -> Option<Bytes> {
		self.data().remove(key)
	}
}
