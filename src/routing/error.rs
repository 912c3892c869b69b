use thiserror::Error;

/// Errors raised while scheduling deferred work
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
	/// The delivery worker no longer accepts commands
	#[error("Delivery worker has shut down")]
	WorkerClosed,
	/// The delivery worker task ended abnormally
	#[error("Delivery worker task failed: {details}")]
	WorkerFailed {
		/// Join error reported by the runtime
		details: String,
	},
}
