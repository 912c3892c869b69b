//! Error types and limits for topic path handling
//!
//! Resolution itself reports failure by returning `None`; the error type here
//! is what the public operations turn that (and wildcard misuse) into.

use thiserror::Error;

/// Errors raised while turning a topic path into tree nodes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicPathError {
	/// Path is empty, has a blank segment or breaks a structural limit
	#[error("Invalid topic path '{path}'")]
	InvalidPath {
		/// The rejected path
		path: String,
	},

	/// Wildcard supplied where only an exact topic is valid
	#[error("Wildcards are not allowed in '{path}' for {operation}")]
	WildcardMisuse {
		/// The rejected path
		path: String,
		/// Operation that requires an exact topic
		operation: &'static str,
	},

	/// Single-level wildcard used in a subscription
	#[error("Single-level wildcard '+' is not supported: '{path}'")]
	UnsupportedWildcard {
		/// The rejected path
		path: String,
	},
}

impl TopicPathError {
	/// Creates a new InvalidPath error
	pub fn invalid_path(path: impl Into<String>) -> Self {
		Self::InvalidPath { path: path.into() }
	}

	/// Creates a new WildcardMisuse error
	pub fn wildcard_misuse(
		path: impl Into<String>,
		operation: &'static str,
	) -> Self {
		Self::WildcardMisuse {
			path: path.into(),
			operation,
		}
	}

	/// Creates a new UnsupportedWildcard error
	pub fn unsupported_wildcard(path: impl Into<String>) -> Self {
		Self::UnsupportedWildcard { path: path.into() }
	}

	/// Returns the error type for categorization
	pub fn error_type(&self) -> &'static str {
		match self {
			| TopicPathError::InvalidPath { .. } => "invalid_path",
			| TopicPathError::WildcardMisuse { .. } => "wildcard_misuse",
			| TopicPathError::UnsupportedWildcard { .. } => {
				"unsupported_wildcard"
			}
		}
	}
}

/// Convenient Result type for topic path operations
pub type TopicResult<T> = Result<T, TopicPathError>;

/// Topic processing limits and reserved symbols
pub mod limits {
	/// Separator between topic levels
	pub const LEVEL_SEPARATOR: char = '/';

	/// Multi-level wildcard, valid only as the last segment of a subscription
	pub const MULTI_LEVEL_WILDCARD: &str = "#";

	/// Single-level wildcard, reserved and rejected
	pub const SINGLE_LEVEL_WILDCARD: &str = "+";

	/// Maximum topic nesting depth allowed
	pub const MAX_TOPIC_DEPTH: usize = 64;

	/// Maximum total topic path length in bytes
	pub const MAX_TOPIC_LENGTH: usize = 65535;
}

/// Validation utilities for topic paths
pub mod validation {
	use smallvec::SmallVec;

	use super::limits::*;

	/// Returns true if the path contains any wildcard character
	pub fn has_wildcard(path: &str) -> bool {
		path.contains(['#', '+'])
	}

	/// Returns true if any segment of the path is exactly `+`
	pub fn has_single_level_wildcard(path: &str) -> bool {
		path.split(LEVEL_SEPARATOR)
			.any(|segment| segment == SINGLE_LEVEL_WILDCARD)
	}

	/// Splits a path into validated segments.
	///
	/// Returns `None` when any segment is blank, a wildcard character is
	/// embedded in a segment, `+` is used, `#` is not the last segment, or a
	/// limit is exceeded. Nothing is returned partially.
	pub fn split_segments(path: &str) -> Option<SmallVec<[&str; 8]>> {
		if path.trim().is_empty() || path.len() > MAX_TOPIC_LENGTH {
			return None;
		}

		let segments: SmallVec<[&str; 8]> =
			path.split(LEVEL_SEPARATOR).collect();
		if segments.len() > MAX_TOPIC_DEPTH {
			return None;
		}

		let last = segments.len() - 1;
		for (index, segment) in segments.iter().enumerate() {
			if segment.trim().is_empty() {
				return None;
			}
			if *segment == MULTI_LEVEL_WILDCARD {
				if index != last {
					return None;
				}
			} else if segment.contains(['#', '+']) {
				return None;
			}
		}

		Some(segments)
	}
}
