use std::sync::Arc;

use arcstr::ArcStr;

use super::error::{BusError, BusResult};
use super::topic_bus::TopicBus;
use crate::message_serializer::MessageSerializer;
use crate::routing::{
	DeliveryInfo, MessageHandler, SubscribedHandler, Target,
};

/// Builder for configuring a subscription before registering it
pub struct SubscriptionBuilder<'a, T, S> {
	bus: &'a TopicBus<T, S>,
	path: ArcStr,
	target: Target,
	on_message: Option<MessageHandler<T>>,
	on_subscribed: Option<SubscribedHandler>,
}

impl<T, S> std::fmt::Debug for SubscriptionBuilder<'_, T, S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SubscriptionBuilder")
			.field("path", &self.path)
			.field("target", &self.target)
			.field("has_on_message", &self.on_message.is_some())
			.field("has_on_subscribed", &self.on_subscribed.is_some())
			.finish()
	}
}

impl<'a, T, S> SubscriptionBuilder<'a, T, S>
where
	T: Send + Sync + 'static,
	S: MessageSerializer<T>,
{
	pub(crate) fn new(
		bus: &'a TopicBus<T, S>,
		path: &str,
		target: Target,
	) -> Self {
		Self {
			bus,
			path: ArcStr::from(path),
			target,
			on_message: None,
			on_subscribed: None,
		}
	}

	/// Set the handler invoked for each delivered message
	pub fn on_message(
		self,
		handler: impl Fn(Arc<T>, DeliveryInfo) + Send + Sync + 'static,
	) -> Self {
		Self {
			on_message: Some(Arc::new(handler)),
			..self
		}
	}

	/// Defer the subscription to the delivery worker and call `callback`
	/// once it is in place
	pub fn on_subscribed(
		self,
		callback: impl FnOnce() + Send + 'static,
	) -> Self {
		Self {
			on_subscribed: Some(Box::new(callback)),
			..self
		}
	}

	/// Register the subscription.
	///
	/// Returns the retained message replayed to it when registered
	/// synchronously, and `None` when deferred via
	/// [`on_subscribed`](Self::on_subscribed).
	pub fn subscribe(self) -> BusResult<Option<Arc<T>>> {
		let handler = self
			.on_message
			.ok_or_else(|| BusError::missing_callback(self.path.as_str()))?;
		match self.on_subscribed {
			| Some(on_subscribed) => {
				self.bus.defer_subscribe(
					&self.path,
					self.target,
					handler,
					on_subscribed,
				)?;
				Ok(None)
			}
			| None => self.bus.subscribe_with(&self.path, self.target, handler),
		}
	}
}
