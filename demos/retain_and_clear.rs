//! # Retained Messages Demo
//!
//! Subscribers joining at different times see the last retained value of a
//! topic, while a `#` subscriber observes every publish below `sensors`.
//!
//! ```text
//! step 1: retained reading #1 published to sensors/kitchen (memory tier)
//! step 2: late subscriber A joins → receives #1 as a retained replay
//! step 3: retained reading #2 published through the external store
//! step 4: late subscriber B joins → receives #2 (not #1)
//! step 5: live reading #3 published → A, B and the watcher see it
//! step 6: retained value cleared → late subscriber C receives nothing
//! ```
//!
//! ```bash
//! RUST_LOG=debug cargo run --example retain_and_clear
//! ```

use bincode::{Decode, Encode};
use topic_bus::{
	BusConfig, BusSettings, PublishOptions, RetentionProvider, TopicBus,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Encode, Decode, Debug, Clone)]
struct Reading {
	seq: u32,
	celsius: f32,
}

fn setup_tracing() {
	if std::env::var("RUST_LOG").is_err() {
		return;
	}
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info".into()),
		)
		.with(tracing_subscriber::fmt::layer().with_target(true).compact())
		.init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	setup_tracing();

	let config =
		BusConfig::default().with_settings(BusSettings::from_env()?);
	let (bus, worker) = TopicBus::<Reading>::start(config)?;

	bus.subscribe("sensors/#", "watcher", |reading, info| {
		println!("[watcher] {} -> {:?}", info.topic, reading);
	})?;

	println!("step 1: retained reading #1 (memory)");
	bus.publish(
		"sensors/kitchen",
		Reading {
			seq: 1,
			celsius: 20.5,
		},
		PublishOptions::retained(),
	)?;
	bus.flush().await?;

	println!("step 2: subscriber A joins");
	let replay = bus.subscribe("sensors/kitchen", "A", |reading, info| {
		println!("[A] retained={} {:?}", info.retained, reading);
	})?;
	println!("  A got retained value: {replay:?}");
	bus.flush().await?;

	println!("step 3: retained reading #2 (external store)");
	bus.publish(
		"sensors/kitchen",
		Reading {
			seq: 2,
			celsius: 21.0,
		},
		PublishOptions::retained_in(RetentionProvider::named("localStorage")),
	)?;
	bus.flush().await?;

	println!("step 4: subscriber B joins");
	bus.subscription("sensors/kitchen", "B")
		.on_message(|reading, info| {
			println!("[B] retained={} {:?}", info.retained, reading);
		})
		.on_subscribed(|| println!("  B subscribed on the delivery worker"))
		.subscribe()?;
	bus.flush().await?;

	println!("step 5: live reading #3");
	let scheduled = bus.publish(
		"sensors/kitchen",
		Reading {
			seq: 3,
			celsius: 21.5,
		},
		PublishOptions::default(),
	)?;
	println!("  {scheduled} deliveries scheduled");
	bus.flush().await?;

	println!("step 6: clear retained, subscriber C joins");
	bus.clear_retained("sensors/kitchen")?;
	let replay = bus.subscribe("sensors/kitchen", "C", |reading, _info| {
		println!("[C] {:?}", reading);
	})?;
	println!("  C got retained value: {replay:?}");

	bus.flush().await?;
	worker.shutdown().await?;
	Ok(())
}
