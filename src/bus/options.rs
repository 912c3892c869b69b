use crate::retained::RetentionProvider;

/// Per-publish options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
	/// Remember the message as the topic's retained value
	pub retained: bool,
	/// Tier the retained value is written to
	pub provider: RetentionProvider,
}

impl PublishOptions {
	/// Retain in the node's memory tier
	pub fn retained() -> Self {
		Self {
			retained: true,
			provider: RetentionProvider::Memory,
		}
	}

	/// Retain through the given provider
	pub fn retained_in(provider: RetentionProvider) -> Self {
		Self {
			retained: true,
			provider,
		}
	}
}
