use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use super::error::DeliveryError;
use super::subscription::{DeliveryInfo, Subscription};
use crate::topic::TopicNode;

type DeferredJob = Box<dyn FnOnce() + Send>;

enum Command<T> {
	Deliver(Delivery<T>),
	Run { due: Instant, job: DeferredJob },
	Flush(oneshot::Sender<u64>),
}

/// One scheduled handler invocation, owning everything it needs
struct Delivery<T> {
	due: Instant,
	subscription: Subscription<T>,
	message: Arc<T>,
	info: DeliveryInfo,
}

impl<T> Delivery<T> {
	fn invoke(self) {
		let Delivery {
			subscription,
			message,
			info,
			..
		} = self;
		let target = subscription.target().clone();
		let topic = info.topic.clone();
		let result = panic::catch_unwind(AssertUnwindSafe(|| {
			subscription.invoke(message, info)
		}));
		if let Err(payload) = result {
			error!(
				subscriber = %target,
				topic = %topic,
				panic = panic_message(payload.as_ref()),
				"Subscriber handler panicked, delivery skipped"
			);
		}
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
	payload
		.downcast_ref::<&str>()
		.copied()
		.or_else(|| payload.downcast_ref::<String>().map(String::as_str))
		.unwrap_or("unknown panic")
}

/// Worker task executing deliveries and deferred jobs in arrival order.
pub struct DeliveryActor<T> {
	command_rx: mpsc::UnboundedReceiver<Command<T>>,
	shutdown_rx: oneshot::Receiver<()>,
	listening_for_shutdown: bool,
	shutdown_timeout: Duration,
	handled: u64,
}

impl<T> DeliveryActor<T>
where T: Send + Sync + 'static
{
	/// Spawns the worker on the current tokio runtime.
	///
	/// Must be called from within a runtime context.
	pub fn spawn(
		delivery_delay: Duration,
		shutdown_timeout: Duration,
	) -> (DeliveryWorker, Multicaster<T>) {
		let (command_tx, command_rx) = mpsc::unbounded_channel();
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let actor = Self {
			command_rx,
			shutdown_rx,
			listening_for_shutdown: true,
			shutdown_timeout,
			handled: 0,
		};
		let join_handler = tokio::spawn(async move { actor.run().await });

		let worker = DeliveryWorker {
			shutdown_tx,
			join_handler,
		};
		let multicaster = Multicaster {
			command_tx,
			delivery_delay,
		};
		(worker, multicaster)
	}

	async fn run(mut self) {
		loop {
			tokio::select! {
				signal = &mut self.shutdown_rx,
					if self.listening_for_shutdown =>
				{
					if signal.is_ok() {
						info!("DeliveryActor: Shutdown signal received");
						break;
					}
					// Worker handle dropped: keep serving until the bus is gone
					self.listening_for_shutdown = false;
				}
				cmd = self.command_rx.recv() => {
					if let Some(cmd) = cmd {
						self.handle(cmd).await;
					} else {
						debug!("DeliveryActor: Multicasters dropped, exiting");
						return;
					}
				}
			}
		}
		self.drain().await;
		info!("DeliveryActor: Exiting run loop");
	}

	async fn handle(&mut self, command: Command<T>) {
		match command {
			| Command::Deliver(delivery) => {
				self.handled += 1;
				wait_until(delivery.due).await;
				delivery.invoke();
			}
			| Command::Run { due, job } => {
				self.handled += 1;
				wait_until(due).await;
				if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job))
				{
					error!(
						panic = panic_message(payload.as_ref()),
						"Deferred job panicked"
					);
				}
			}
			| Command::Flush(reply) => {
				let _ = reply.send(self.handled);
			}
		}
	}

	/// Runs whatever is already queued, bounded by the shutdown timeout
	async fn drain(&mut self) {
		self.command_rx.close();
		let timeout_ms = self.shutdown_timeout.as_millis() as u64;
		let shutdown_timeout = self.shutdown_timeout;
		let pending = async {
			while let Some(cmd) = self.command_rx.recv().await {
				self.handle(cmd).await;
			}
		};
		if time::timeout(shutdown_timeout, pending).await.is_err() {
			warn!(
				timeout_ms,
				"DeliveryActor: Pending deliveries dropped at shutdown"
			);
		}
	}
}

async fn wait_until(due: Instant) {
	if due > Instant::now() {
		time::sleep_until(due).await;
	}
}

/// Handle to the delivery worker task.
///
/// Dropping it detaches the worker, which then runs until every bus clone
/// is dropped. A clone held by a subscribed handler never is, so call
/// [`shutdown`](Self::shutdown) in that case.
#[derive(Debug)]
pub struct DeliveryWorker {
	shutdown_tx: oneshot::Sender<()>,
	join_handler: JoinHandle<()>,
}

impl DeliveryWorker {
	/// Stops accepting work, runs what is queued and waits for the worker.
	pub async fn shutdown(self) -> Result<(), DeliveryError> {
		let _ = self.shutdown_tx.send(()).inspect_err(|_| {
			warn!("DeliveryWorker: Worker already stopped");
		});
		self.join_handler.await.map_err(|e| {
			warn!(error = ?e, "DeliveryWorker: Worker task failed");
			DeliveryError::WorkerFailed {
				details: e.to_string(),
			}
		})
	}
}

/// Schedules deferred, isolated handler invocations.
pub struct Multicaster<T> {
	command_tx: mpsc::UnboundedSender<Command<T>>,
	delivery_delay: Duration,
}

impl<T> Clone for Multicaster<T> {
	fn clone(&self) -> Self {
		Self {
			command_tx: self.command_tx.clone(),
			delivery_delay: self.delivery_delay,
		}
	}
}

impl<T> std::fmt::Debug for Multicaster<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Multicaster")
			.field("delivery_delay", &self.delivery_delay)
			.field("closed", &self.command_tx.is_closed())
			.finish()
	}
}

impl<T> Multicaster<T> {
	/// True once the worker stopped accepting work
	pub fn is_closed(&self) -> bool {
		self.command_tx.is_closed()
	}

	/// Schedules one invocation per subscription of `node`.
	///
	/// Each job captures its own clone of the subscription, so later changes
	/// to the node do not affect already scheduled deliveries. Returns the
	/// number of deliveries scheduled.
	pub fn deliver(
		&self,
		node: &TopicNode<T>,
		message: &Arc<T>,
		info: &DeliveryInfo,
	) -> Result<usize, DeliveryError> {
		let due = Instant::now() + self.delivery_delay;
		let mut scheduled = 0;
		for subscription in node.subscriptions().iter() {
			self.send(Command::Deliver(Delivery {
				due,
				subscription: subscription.clone(),
				message: Arc::clone(message),
				info: info.clone(),
			}))?;
			scheduled += 1;
		}
		if scheduled > 0 {
			debug!(
				topic = %info.topic,
				node = %node.name(),
				retained = info.retained,
				scheduled,
				"Deliveries scheduled"
			);
		}
		Ok(scheduled)
	}

	/// Schedules a single invocation of `subscription`
	pub fn deliver_to(
		&self,
		subscription: &Subscription<T>,
		message: &Arc<T>,
		info: DeliveryInfo,
	) -> Result<(), DeliveryError> {
		self.send(Command::Deliver(Delivery {
			due: Instant::now() + self.delivery_delay,
			subscription: subscription.clone(),
			message: Arc::clone(message),
			info,
		}))
	}

	/// Runs `job` on the worker at its next turn, without the delivery delay
	pub fn defer(
		&self,
		job: impl FnOnce() + Send + 'static,
	) -> Result<(), DeliveryError> {
		self.send(Command::Run {
			due: Instant::now(),
			job: Box::new(job),
		})
	}

	/// Waits until the worker has run everything queued so far, including
	/// work queued by those jobs themselves.
	pub async fn flush(&self) -> Result<(), DeliveryError> {
		let mut last = self.flush_round().await?;
		loop {
			let current = self.flush_round().await?;
			if current == last {
				return Ok(());
			}
			last = current;
		}
	}

	async fn flush_round(&self) -> Result<u64, DeliveryError> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.send(Command::Flush(reply_tx))?;
		reply_rx.await.map_err(|_| DeliveryError::WorkerClosed)
	}

	fn send(&self, command: Command<T>) -> Result<(), DeliveryError> {
		self.command_tx
			.send(command)
			.map_err(|_| DeliveryError::WorkerClosed)
	}
}
