//! Configuration for bus initialization

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arcstr::ArcStr;

use super::error::BusError;
use crate::message_serializer::BincodeSerializer;
use crate::retained::{DEFAULT_STORE_NAME, MemoryStore, RetainedStore};

/// Environment variable overriding [`BusSettings::delivery_delay`]
pub const ENV_DELIVERY_DELAY_MS: &str = "TOPIC_BUS_DELIVERY_DELAY_MS";
/// Environment variable overriding [`BusSettings::topic_cache_size`]
pub const ENV_TOPIC_CACHE_SIZE: &str = "TOPIC_BUS_TOPIC_CACHE_SIZE";
/// Environment variable overriding [`BusSettings::shutdown_timeout`]
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "TOPIC_BUS_SHUTDOWN_TIMEOUT_MS";

/// Bus-level performance and behavior settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusSettings {
	/// Delay before a scheduled delivery runs
	pub delivery_delay: Duration,
	/// Size of the exact topic path cache (must be > 0)
	pub topic_cache_size: usize,
	/// How long shutdown waits for pending deliveries
	pub shutdown_timeout: Duration,
}

impl Default for BusSettings {
	fn default() -> Self {
		Self {
			delivery_delay: Duration::from_millis(1),
			topic_cache_size: 100,
			shutdown_timeout: Duration::from_millis(500),
		}
	}
}

impl BusSettings {
	/// Default settings overlaid with `TOPIC_BUS_*` environment variables
	pub fn from_env() -> Result<Self, BusError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Default settings overlaid with values returned by `lookup`
	pub fn from_lookup(
		lookup: impl Fn(&str) -> Option<String>,
	) -> Result<Self, BusError> {
		let mut settings = Self::default();
		if let Some(ms) = parse_var::<u64>(&lookup, ENV_DELIVERY_DELAY_MS)? {
			settings.delivery_delay = Duration::from_millis(ms);
		}
		if let Some(size) = parse_var::<usize>(&lookup, ENV_TOPIC_CACHE_SIZE)? {
			settings.topic_cache_size = size;
		}
		if let Some(ms) = parse_var::<u64>(&lookup, ENV_SHUTDOWN_TIMEOUT_MS)? {
			settings.shutdown_timeout = Duration::from_millis(ms);
		}
		Ok(settings)
	}

	/// Checks values that cannot be represented by the type alone
	pub fn validate(&self) -> Result<(), BusError> {
		if self.topic_cache_size == 0 {
			return Err(BusError::ConfigurationValue(
				"topic_cache_size must be greater than 0".to_string(),
			));
		}
		Ok(())
	}
}

fn parse_var<V: FromStr>(
	lookup: &impl Fn(&str) -> Option<String>,
	key: &str,
) -> Result<Option<V>, BusError> {
	let Some(raw) = lookup(key) else {
		return Ok(None);
	};
	raw.trim().parse().map(Some).map_err(|_| {
		BusError::ConfigurationValue(format!("{key}: cannot parse '{raw}'"))
	})
}

/// Configuration for bus creation
pub struct BusConfig<S = BincodeSerializer> {
	/// Bus-level performance and behavior settings
	pub settings: BusSettings,
	/// External store for retained messages
	pub store: Arc<dyn RetainedStore>,
	/// Provider name selecting `store` in publish options
	pub store_name: ArcStr,
	/// Encoding used for values kept in `store`
	pub serializer: S,
}

impl<S> fmt::Debug for BusConfig<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BusConfig")
			.field("settings", &self.settings)
			.field("store_name", &self.store_name)
			.finish_non_exhaustive()
	}
}

impl<S: Default> Default for BusConfig<S> {
	fn default() -> Self {
		Self::new()
	}
}

impl<S> BusConfig<S> {
	/// Create config with default settings and an in-memory store
	pub fn new() -> Self
	where S: Default {
		Self {
			settings: BusSettings::default(),
			store: Arc::new(MemoryStore::new()),
			store_name: ArcStr::from(DEFAULT_STORE_NAME),
			serializer: S::default(),
		}
	}

	/// Replace the settings
	pub fn with_settings(self, settings: BusSettings) -> Self {
		Self { settings, ..self }
	}

	/// Set the delivery delay
	pub fn with_delivery_delay(mut self, delay: Duration) -> Self {
		self.settings.delivery_delay = delay;
		self
	}

	/// Plug in an external store under the provider name `name`
	pub fn with_store(
		self,
		name: impl Into<ArcStr>,
		store: Arc<dyn RetainedStore>,
	) -> Self {
		Self {
			store,
			store_name: name.into(),
			..self
		}
	}

	/// Switch to another serializer
	pub fn with_serializer<S2>(self, serializer: S2) -> BusConfig<S2> {
		BusConfig {
			settings: self.settings,
			store: self.store,
			store_name: self.store_name,
			serializer,
		}
	}
}
