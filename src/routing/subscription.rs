//! Subscription records attached to topic nodes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arcstr::ArcStr;

/// Opaque subscriber identity.
///
/// Two subscriptions on the same topic with equal targets are the same
/// subscription; targets are never compared by topic path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target(ArcStr);

impl Target {
	/// Creates a target from any string-like identity
	pub fn new(id: impl Into<ArcStr>) -> Self {
		Self(id.into())
	}

	/// Creates a process-unique target
	pub fn unique() -> Self {
		static NEXT_TARGET: AtomicUsize = AtomicUsize::new(0);
		let id = NEXT_TARGET.fetch_add(1, Ordering::Relaxed);
		Self(arcstr::format!("target-{id}"))
	}

	/// Returns the identity string
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Target {
	fn from(id: &str) -> Self {
		Self(ArcStr::from(id))
	}
}

impl From<String> for Target {
	fn from(id: String) -> Self {
		Self(ArcStr::from(id))
	}
}

impl From<ArcStr> for Target {
	fn from(id: ArcStr) -> Self {
		Self(id)
	}
}

/// Metadata passed alongside every delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryInfo {
	/// Concrete topic the message belongs to
	pub topic: ArcStr,
	/// True only when the message is a retained replay
	pub retained: bool,
}

impl DeliveryInfo {
	/// Info for a message published live
	pub fn live(topic: impl Into<ArcStr>) -> Self {
		Self {
			topic: topic.into(),
			retained: false,
		}
	}

	/// Info for a retained replay
	pub fn retained(topic: impl Into<ArcStr>) -> Self {
		Self {
			topic: topic.into(),
			retained: true,
		}
	}
}

/// Callback invoked for each delivered message
pub type MessageHandler<T> = Arc<dyn Fn(Arc<T>, DeliveryInfo) + Send + Sync>;

/// Callback invoked once a deferred subscription is in place
pub type SubscribedHandler = Box<dyn FnOnce() + Send>;

/// A `(target, handler)` pair registered on one topic node
pub struct Subscription<T> {
	target: Target,
	handler: MessageHandler<T>,
}

impl<T> Clone for Subscription<T> {
	fn clone(&self) -> Self {
		Self {
			target: self.target.clone(),
			handler: Arc::clone(&self.handler),
		}
	}
}

impl<T> fmt::Debug for Subscription<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("target", &self.target)
			.finish_non_exhaustive()
	}
}

impl<T> Subscription<T> {
	/// Pairs `handler` with the subscriber identity `target`
	pub fn new(target: Target, handler: MessageHandler<T>) -> Self {
		Self { target, handler }
	}

	/// Subscriber identity used for de-duplication
	pub fn target(&self) -> &Target {
		&self.target
	}

	/// Calls the handler on the current thread
	pub fn invoke(&self, message: Arc<T>, info: DeliveryInfo) {
		(self.handler)(message, info)
	}
}

/// Ordered subscriptions of one node, at most one per target
pub struct SubscriptionList<T> {
	entries: Vec<Subscription<T>>,
}

impl<T> Default for SubscriptionList<T> {
	fn default() -> Self {
		Self {
			entries: Vec::new(),
		}
	}
}

impl<T> fmt::Debug for SubscriptionList<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(&self.entries).finish()
	}
}

impl<T> SubscriptionList<T> {
	/// Creates an empty list
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a subscription unless `target` already holds one.
	///
	/// An existing entry keeps its original handler. Returns true if the
	/// subscription was added.
	pub fn add(&mut self, target: Target, handler: MessageHandler<T>) -> bool {
		if self.contains(&target) {
			return false;
		}
		self.entries.push(Subscription::new(target, handler));
		true
	}

	/// Drops the entry for `target`. Returns true if one was removed.
	pub fn remove(&mut self, target: &Target) -> bool {
		let before = self.entries.len();
		self.entries.retain(|s| s.target() != target);
		self.entries.len() != before
	}

	/// True if `target` holds a subscription
	pub fn contains(&self, target: &Target) -> bool {
		self.entries.iter().any(|s| s.target() == target)
	}

	/// Subscription held by `target`
	pub fn get(&self, target: &Target) -> Option<&Subscription<T>> {
		self.entries.iter().find(|s| s.target() == target)
	}

	/// Subscriptions in registration order
	pub fn iter(&self) -> impl Iterator<Item = &Subscription<T>> {
		self.entries.iter()
	}

	/// Number of subscriptions
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// True if no target is subscribed
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
