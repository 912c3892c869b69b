use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arcstr::ArcStr;
use tracing::{debug, info, warn};

use super::config::BusConfig;
use super::error::{BusError, BusResult};
use super::options::PublishOptions;
use super::subscription_builder::SubscriptionBuilder;
use crate::message_serializer::{BincodeSerializer, MessageSerializer};
use crate::retained::RetainedCoordinator;
use crate::routing::{
	DeliveryActor, DeliveryError, DeliveryInfo, DeliveryWorker, MessageHandler,
	Multicaster, SubscribedHandler, Target,
};
use crate::topic::{NodeId, TopicPathError, TopicTree, validation};

/// Everything guarded by the bus lock
struct BusState<T, S> {
	tree: TopicTree<T>,
	retained: RetainedCoordinator<S>,
}

/// In-process publish/subscribe bus over a hierarchical topic tree.
///
/// Clones share the same tree and delivery worker. Handlers run on the
/// delivery worker, never while the bus lock is held, so they may call back
/// into the bus.
///
/// A handler that captures a clone of its own bus keeps the worker's command
/// channel open for as long as the subscription exists. Such a bus must be
/// stopped with [`DeliveryWorker::shutdown`]; dropping the worker handle
/// alone leaves the worker task running.
pub struct TopicBus<T, S = BincodeSerializer> {
	state: Arc<Mutex<BusState<T, S>>>,
	multicaster: Multicaster<T>,
}

impl<T, S> Clone for TopicBus<T, S> {
	fn clone(&self) -> Self {
		Self {
			state: Arc::clone(&self.state),
			multicaster: self.multicaster.clone(),
		}
	}
}

impl<T, S> std::fmt::Debug for TopicBus<T, S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TopicBus")
			.field("multicaster", &self.multicaster)
			.finish_non_exhaustive()
	}
}

impl<T, S> TopicBus<T, S>
where
	T: Send + Sync + 'static,
	S: MessageSerializer<T>,
{
	/// Creates a bus and spawns its delivery worker.
	///
	/// Must be called from within a tokio runtime. The returned worker handle
	/// is used for graceful shutdown; dropping it leaves the worker running
	/// until every bus clone is gone.
	pub fn start(config: BusConfig<S>) -> BusResult<(Self, DeliveryWorker)> {
		tokio::runtime::Handle::try_current()
			.map_err(|_| BusError::RuntimeUnavailable)?;
		config.settings.validate()?;
		let capacity = NonZeroUsize::new(config.settings.topic_cache_size)
			.ok_or_else(|| {
				BusError::ConfigurationValue(
					"topic_cache_size must be greater than 0".to_string(),
				)
			})?;

		let state = BusState {
			tree: TopicTree::with_cache_capacity(capacity),
			retained: RetainedCoordinator::new(
				config.store,
				config.store_name,
				config.serializer,
			),
		};
		let (worker, multicaster) = DeliveryActor::spawn(
			config.settings.delivery_delay,
			config.settings.shutdown_timeout,
		);
		let delay_ms = config.settings.delivery_delay.as_millis() as u64;
		info!(
			delivery_delay_ms = delay_ms,
			topic_cache_size = config.settings.topic_cache_size,
			"TopicBus started"
		);
		let bus = Self {
			state: Arc::new(Mutex::new(state)),
			multicaster,
		};
		Ok((bus, worker))
	}

	fn state(&self) -> MutexGuard<'_, BusState<T, S>> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn ensure_running(&self) -> BusResult<()> {
		if self.multicaster.is_closed() {
			return Err(DeliveryError::WorkerClosed.into());
		}
		Ok(())
	}

	/// Publishes `message` to the exact topic `path`.
	///
	/// Missing topics are created. The message is delivered to the
	/// subscriptions of `path` and of every matching `#` topic; the number of
	/// scheduled deliveries is returned. All validation happens before the
	/// tree is touched, so an error means nothing was created or retained.
	pub fn publish(
		&self,
		path: &str,
		message: T,
		options: PublishOptions,
	) -> BusResult<usize> {
		if validation::has_wildcard(path) {
			return Err(TopicPathError::wildcard_misuse(path, "publish").into());
		}
		self.ensure_running()?;
		let message = Arc::new(message);

		let mut state = self.state();
		let write = if options.retained {
			Some(state.retained.prepare(&options.provider, &*message)?)
		} else {
			None
		};
		let node = state.tree.resolve_exact(path)?;

		let BusState { tree, retained } = &mut *state;
		if let Some(write) = write {
			retained.retain(tree.node_mut(node), path, &message, write);
		}

		let info = DeliveryInfo::live(path);
		let mut scheduled =
			self.multicaster.deliver(tree.node(node), &message, &info)?;
		for wildcard in tree.wildcard_matches(node) {
			scheduled +=
				self.multicaster.deliver(tree.node(wildcard), &message, &info)?;
		}
		debug!(
			topic = %path,
			retained = options.retained,
			scheduled,
			"Message published"
		);
		Ok(scheduled)
	}

	/// Subscribes `target` to `path`, which may end in `#`.
	///
	/// Runs synchronously. If the topic holds a retained message it is
	/// replayed to this subscription only and also returned. Subscribing an
	/// already subscribed target keeps the original handler and replays
	/// nothing.
	pub fn subscribe(
		&self,
		path: &str,
		target: impl Into<Target>,
		handler: impl Fn(Arc<T>, DeliveryInfo) + Send + Sync + 'static,
	) -> BusResult<Option<Arc<T>>> {
		self.subscribe_with(path, target.into(), Arc::new(handler))
	}

	/// Starts a subscription built step by step
	pub fn subscription(
		&self,
		path: &str,
		target: impl Into<Target>,
	) -> SubscriptionBuilder<'_, T, S> {
		SubscriptionBuilder::new(self, path, target.into())
	}

	/// Subscribes on the delivery worker instead of the calling task.
	///
	/// `on_subscribed` runs once the subscription is in place and any
	/// retained replay is scheduled. The path is validated immediately.
	pub fn async_subscribe(
		&self,
		path: &str,
		target: impl Into<Target>,
		handler: impl Fn(Arc<T>, DeliveryInfo) + Send + Sync + 'static,
		on_subscribed: Option<SubscribedHandler>,
	) -> BusResult<()> {
		let on_subscribed = on_subscribed
			.unwrap_or_else(|| Box::new(|| {}) as SubscribedHandler);
		self.defer_subscribe(
			path,
			target.into(),
			Arc::new(handler),
			on_subscribed,
		)
	}

	pub(crate) fn subscribe_with(
		&self,
		path: &str,
		target: Target,
		handler: MessageHandler<T>,
	) -> BusResult<Option<Arc<T>>> {
		check_subscription_path(path)?;
		self.ensure_running()?;

		let mut state = self.state();
		let node = state
			.tree
			.resolve(path)
			.and_then(|resolved| resolved.last().copied())
			.ok_or_else(|| TopicPathError::invalid_path(path))?;
		let added = state
			.tree
			.node_mut(node)
			.subscriptions
			.add(target.clone(), handler);
		debug!(
			topic = %path,
			subscriber = %target,
			added,
			"Subscription registered"
		);

		let topic = state.tree.full_path(node);
		let retained = state.retained.lookup(state.tree.node(node), &topic);
		let replay = retained.as_ref().filter(|_| added);
		if let Some(message) = replay {
			if let Some(subscription) =
				state.tree.node(node).subscriptions().get(&target)
			{
				self.multicaster.deliver_to(
					subscription,
					message,
					DeliveryInfo::retained(topic),
				)?;
			}
		}
		Ok(retained)
	}

	pub(crate) fn defer_subscribe(
		&self,
		path: &str,
		target: Target,
		handler: MessageHandler<T>,
		on_subscribed: SubscribedHandler,
	) -> BusResult<()> {
		check_subscription_path(path)?;
		let bus = self.clone();
		let path = ArcStr::from(path);
		self.multicaster.defer(move || {
			match bus.subscribe_with(&path, target, handler) {
				| Ok(_) => on_subscribed(),
				| Err(e) => {
					warn!(
						topic = %path,
						error = ?e,
						"Deferred subscription failed"
					)
				}
			}
		})?;
		Ok(())
	}

	/// Removes the subscription of `target` from the exact topic `path`.
	///
	/// Returns whether a subscription was removed. Deliveries already
	/// scheduled for it still run.
	pub fn unsubscribe(
		&self,
		path: &str,
		target: impl Into<Target>,
	) -> BusResult<bool> {
		if validation::has_wildcard(path) {
			return Err(
				TopicPathError::wildcard_misuse(path, "unsubscribe").into()
			);
		}
		let target = target.into();
		let mut state = self.state();
		let node = state.tree.resolve_exact(path)?;
		let removed = state.tree.node_mut(node).subscriptions.remove(&target);
		debug!(
			topic = %path,
			subscriber = %target,
			removed,
			"Subscription removed"
		);
		Ok(removed)
	}

	/// Forgets the retained message of `path` in both tiers.
	///
	/// Returns whether anything was retained.
	pub fn clear_retained(&self, path: &str) -> BusResult<bool> {
		let mut state = self.state();
		let node = find_exact(&state.tree, path, "clear retained")?;
		let BusState { tree, retained } = &mut *state;
		Ok(retained.clear(node.map(|id| tree.node_mut(id)), path))
	}

	/// Retained message of `path`, without subscribing or creating topics
	pub fn retained_message(&self, path: &str) -> BusResult<Option<Arc<T>>> {
		let state = self.state();
		let message = match find_exact(&state.tree, path, "retained lookup")? {
			| Some(node) => state.retained.lookup(state.tree.node(node), path),
			| None => state.retained.lookup_in_store(path),
		};
		Ok(message)
	}

	/// Waits until every delivery scheduled so far has run
	pub async fn flush(&self) -> BusResult<()> {
		self.multicaster.flush().await.map_err(BusError::from)
	}

	/// Number of topics created so far
	pub fn topic_count(&self) -> usize {
		self.state().tree.topic_count()
	}

	/// Number of subscriptions on `path`, which may end in `#`
	pub fn subscription_count(&self, path: &str) -> usize {
		let state = self.state();
		state
			.tree
			.find(path)
			.map_or(0, |node| state.tree.node(node).subscriptions().len())
	}
}

fn check_subscription_path(path: &str) -> Result<(), TopicPathError> {
	if validation::has_single_level_wildcard(path) {
		return Err(TopicPathError::unsupported_wildcard(path));
	}
	if validation::split_segments(path).is_none() {
		return Err(TopicPathError::invalid_path(path));
	}
	Ok(())
}

fn find_exact<T>(
	tree: &TopicTree<T>,
	path: &str,
	operation: &'static str,
) -> Result<Option<NodeId>, TopicPathError> {
	if validation::has_wildcard(path) {
		return Err(TopicPathError::wildcard_misuse(path, operation));
	}
	if validation::split_segments(path).is_none() {
		return Err(TopicPathError::invalid_path(path));
	}
	Ok(tree.find(path))
}
