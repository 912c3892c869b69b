//! Payload encoding for the external retained store

use std::fmt::Debug;

use bincode::{Decode, Encode};

/// Converts messages to and from the bytes kept by a
/// [`RetainedStore`](crate::retained::RetainedStore).
pub trait MessageSerializer<T>: Default + Clone + Send + Sync + 'static {
	/// Error produced while encoding
	type SerializeError: Debug + Send + Sync + 'static;
	/// Error produced while decoding
	type DeserializeError: Debug + Send + Sync + 'static;

	/// Encodes `data`
	fn serialize(&self, data: &T) -> Result<Vec<u8>, Self::SerializeError>;
	/// Decodes a value previously produced by [`serialize`](Self::serialize)
	fn deserialize(&self, bytes: &[u8]) -> Result<T, Self::DeserializeError>;
}

/// Compact binary encoding via `bincode`
#[derive(Clone, Default)]
pub struct BincodeSerializer {
	config: bincode::config::Configuration,
}

impl BincodeSerializer {
	/// Serializer with the standard bincode configuration
	pub fn new() -> Self {
		Self::default()
	}

	/// Serializer with a custom bincode configuration
	pub fn with_config(config: bincode::config::Configuration) -> Self {
		Self { config }
	}
}

impl<T> MessageSerializer<T> for BincodeSerializer
where T: Encode + Decode<()> + 'static
{
	type SerializeError = bincode::error::EncodeError;
	type DeserializeError = bincode::error::DecodeError;

	fn serialize(&self, data: &T) -> Result<Vec<u8>, Self::SerializeError> {
		bincode::encode_to_vec(data, self.config)
	}

	fn deserialize(&self, bytes: &[u8]) -> Result<T, Self::DeserializeError> {
		bincode::decode_from_slice(bytes, self.config).map(|(value, _)| value)
	}
}

/// Human-readable encoding via `serde_json`
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

#[cfg(feature = "json")]
impl<T> MessageSerializer<T> for JsonSerializer
where T: serde::Serialize + serde::de::DeserializeOwned + 'static
{
	type SerializeError = serde_json::Error;
	type DeserializeError = serde_json::Error;

	fn serialize(&self, data: &T) -> Result<Vec<u8>, Self::SerializeError> {
		serde_json::to_vec(data)
	}

	fn deserialize(&self, bytes: &[u8]) -> Result<T, Self::DeserializeError> {
		serde_json::from_slice(bytes)
	}
}
