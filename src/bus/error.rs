use crate::retained::RetentionError;
use crate::routing::DeliveryError;
use crate::topic::TopicPathError;

/// Errors that can occur in bus operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
	/// Topic path is invalid or misuses a wildcard
	#[error("Topic error: {0}")]
	Topic(#[from] TopicPathError),

	/// Retained message could not be stored
	#[error("Retention error: {0}")]
	Retention(#[from] RetentionError),

	/// Delivery worker is unavailable
	#[error("Delivery error: {0}")]
	Delivery(#[from] DeliveryError),

	/// Subscription requested without a message handler
	#[error("Subscription to '{path}' has no message callback")]
	MissingCallback {
		/// Topic the subscription was requested for
		path: String,
	},

	/// Invalid configuration parameter values
	#[error("Invalid configuration value: {0}")]
	ConfigurationValue(String),

	/// The bus was started outside a tokio runtime
	#[error("TopicBus must be started from within a tokio runtime")]
	RuntimeUnavailable,
}

impl BusError {
	/// Creates a new MissingCallback error
	pub fn missing_callback(path: impl Into<String>) -> Self {
		BusError::MissingCallback { path: path.into() }
	}

	/// Returns the error type for categorization
	pub fn error_type(&self) -> &'static str {
		match self {
			| BusError::Topic(e) => e.error_type(),
			| BusError::Retention(e) => e.error_type(),
			| BusError::Delivery(_) => "delivery",
			| BusError::MissingCallback { .. } => "missing_callback",
			| BusError::ConfigurationValue(_) => "configuration_value",
			| BusError::RuntimeUnavailable => "runtime_unavailable",
		}
	}
}

/// Result type alias for bus operations
pub type BusResult<T> = Result<T, BusError>;
