//! End-to-end behaviour of the bus: matching, retained replay, error paths
//! and delivery isolation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use topic_bus::errors::{DeliveryError, RetentionError, TopicPathError};
use topic_bus::{
	BusConfig, BusError, BusSettings, DeliveryInfo, DeliveryWorker,
	MemoryStore, PublishOptions, RetainedStore, RetentionProvider, TopicBus,
};

type Log = Arc<Mutex<Vec<String>>>;

fn start() -> (TopicBus<String>, DeliveryWorker) {
	TopicBus::<String>::start(BusConfig::default()).unwrap()
}

fn recorder(
	log: &Log,
	label: &'static str,
) -> impl Fn(Arc<String>, DeliveryInfo) + Send + Sync + 'static {
	let log = Arc::clone(log);
	move |msg: Arc<String>, info: DeliveryInfo| {
		let kind = if info.retained { "retained" } else { "live" };
		log.lock()
			.unwrap()
			.push(format!("{label}|{}|{msg}|{kind}", info.topic));
	}
}

fn entries(log: &Log) -> Vec<String> {
	log.lock().unwrap().clone()
}

#[tokio::test]
async fn test_unsubscribed_target_stops_receiving() {
	let (bus, worker) = start();
	let log = Log::default();

	bus.subscribe("charol/manuh", "one", recorder(&log, "one")).unwrap();
	bus.subscribe("charol/manuh", "two", recorder(&log, "two")).unwrap();
	assert_eq!(bus.subscription_count("charol/manuh"), 2);

	assert!(bus.unsubscribe("charol/manuh", "one").unwrap());
	assert!(!bus.unsubscribe("charol/manuh", "ghost").unwrap());

	let scheduled = bus
		.publish("charol/manuh", "hello".into(), PublishOptions::default())
		.unwrap();
	bus.flush().await.unwrap();

	assert_eq!(scheduled, 1);
	assert_eq!(entries(&log), vec!["two|charol/manuh|hello|live"]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_wildcard_receives_publishes_to_new_descendants() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.subscribe("charol/#", "watcher", recorder(&log, "w")).unwrap();

	for topic in ["charol/manuh1", "charol/manuh2", "charol/manuh/rhelena"] {
		bus.publish(topic, "m".into(), PublishOptions::default())
			.unwrap();
	}
	bus.publish("romeu/boy", "m".into(), PublishOptions::default())
		.unwrap();
	bus.flush().await.unwrap();

	assert_eq!(entries(&log), vec![
		"w|charol/manuh1|m|live",
		"w|charol/manuh2|m|live",
		"w|charol/manuh/rhelena|m|live",
	]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_wildcard_matches_parent_level() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.subscribe("sport/#", "fan", recorder(&log, "fan")).unwrap();

	let scheduled = bus
		.publish("sport", "kickoff".into(), PublishOptions::default())
		.unwrap();
	bus.flush().await.unwrap();

	assert_eq!(scheduled, 1);
	assert_eq!(entries(&log), vec!["fan|sport|kickoff|live"]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_exact_and_all_wildcard_levels_receive_once() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.subscribe("a/b/c", "exact", recorder(&log, "exact")).unwrap();
	bus.subscribe("a/b/#", "ab", recorder(&log, "ab")).unwrap();
	bus.subscribe("a/#", "a", recorder(&log, "a")).unwrap();
	bus.subscribe("#", "all", recorder(&log, "all")).unwrap();

	let scheduled = bus
		.publish("a/b/c", "m".into(), PublishOptions::default())
		.unwrap();
	bus.flush().await.unwrap();

	assert_eq!(scheduled, 4);
	let mut labels: Vec<String> = entries(&log)
		.iter()
		.map(|e| e.split('|').next().unwrap().to_string())
		.collect();
	labels.sort();
	assert_eq!(labels, vec!["a", "ab", "all", "exact"]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_publish_without_subscribers_builds_chain() {
	let (bus, worker) = start();

	let scheduled = bus
		.publish("charol/manuh/rhelena", "m".into(), PublishOptions::default())
		.unwrap();

	assert_eq!(scheduled, 0);
	assert_eq!(bus.topic_count(), 3);
	for path in ["charol", "charol/manuh", "charol/manuh/rhelena"] {
		assert_eq!(bus.subscription_count(path), 0);
	}
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_retained_message_replayed_to_each_late_subscriber() {
	let (bus, worker) = start();
	let log = Log::default();

	bus.publish("status/door", "open".into(), PublishOptions::retained())
		.unwrap();

	let first = bus
		.subscribe("status/door", "first", recorder(&log, "first"))
		.unwrap();
	bus.flush().await.unwrap();
	let second = bus
		.subscribe("status/door", "second", recorder(&log, "second"))
		.unwrap();
	bus.flush().await.unwrap();

	assert_eq!(first.as_deref().map(String::as_str), Some("open"));
	assert_eq!(second.as_deref().map(String::as_str), Some("open"));
	assert_eq!(entries(&log), vec![
		"first|status/door|open|retained",
		"second|status/door|open|retained",
	]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_retained_in_external_store() {
	let store = Arc::new(MemoryStore::new());
	let config = BusConfig::default().with_store("localStorage", store.clone());
	let (bus, worker) = TopicBus::<String>::start(config).unwrap();
	let log = Log::default();

	bus.publish(
		"status/window",
		"closed".into(),
		PublishOptions::retained_in(RetentionProvider::named("localStorage")),
	)
	.unwrap();
	assert!(store.get("[retained]status/window").is_some());

	let replay = bus
		.subscribe("status/window", "late", recorder(&log, "late"))
		.unwrap();
	bus.flush().await.unwrap();

	assert_eq!(replay.as_deref().map(String::as_str), Some("closed"));
	assert_eq!(entries(&log), vec!["late|status/window|closed|retained"]);
	worker.shutdown().await.unwrap();
}

#[cfg(feature = "json")]
#[tokio::test]
async fn test_external_store_with_json_serializer() {
	use topic_bus::JsonSerializer;

	let store = Arc::new(MemoryStore::new());
	let config: BusConfig =
		BusConfig::default().with_store("localStorage", store.clone());
	let config = config.with_serializer(JsonSerializer);
	let (bus, worker) =
		TopicBus::<String, JsonSerializer>::start(config).unwrap();

	bus.publish(
		"status/lamp",
		"on".into(),
		PublishOptions::retained_in(RetentionProvider::named("localStorage")),
	)
	.unwrap();

	let raw = store.get("[retained]status/lamp").unwrap();
	assert_eq!(&raw[..], br#""on""#);
	let found = bus.retained_message("status/lamp").unwrap();
	assert_eq!(found.as_deref().map(String::as_str), Some("on"));
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_store_survives_bus_restart() {
	let store = Arc::new(MemoryStore::new());
	let provider = RetentionProvider::named("localStorage");
	{
		let (bus, worker) = TopicBus::<String>::start(
			BusConfig::default().with_store("localStorage", store.clone()),
		)
		.unwrap();
		bus.publish(
			"config/mode",
			"eco".into(),
			PublishOptions::retained_in(provider.clone()),
		)
		.unwrap();
		worker.shutdown().await.unwrap();
	}

	let (bus, worker) = TopicBus::<String>::start(
		BusConfig::default().with_store("localStorage", store),
	)
	.unwrap();
	let found = bus.retained_message("config/mode").unwrap();
	assert_eq!(found.as_deref().map(String::as_str), Some("eco"));
	assert_eq!(bus.topic_count(), 0);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_clear_retained() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.publish("status/door", "open".into(), PublishOptions::retained())
		.unwrap();

	assert!(bus.clear_retained("status/door").unwrap());
	assert!(!bus.clear_retained("status/door").unwrap());
	assert!(bus.retained_message("status/door").unwrap().is_none());

	let replay = bus
		.subscribe("status/door", "late", recorder(&log, "late"))
		.unwrap();
	bus.flush().await.unwrap();
	assert!(replay.is_none());
	assert!(entries(&log).is_empty());
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_retained_not_inherited_by_children_or_wildcards() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.publish("home", "parent".into(), PublishOptions::retained())
		.unwrap();

	let child = bus
		.subscribe("home/kitchen", "child", recorder(&log, "child"))
		.unwrap();
	let wildcard = bus
		.subscribe("home/#", "wildcard", recorder(&log, "wildcard"))
		.unwrap();
	bus.flush().await.unwrap();

	assert!(child.is_none());
	assert!(wildcard.is_none());
	assert!(entries(&log).is_empty());
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_wildcard_publish_fails_without_mutation() {
	let (bus, worker) = start();

	let err = bus
		.publish("charol/#", "m".into(), PublishOptions::default())
		.unwrap_err();
	assert!(matches!(
		err,
		BusError::Topic(TopicPathError::WildcardMisuse { .. })
	));
	let err = bus
		.publish("charol/+/x", "m".into(), PublishOptions::default())
		.unwrap_err();
	assert_eq!(err.error_type(), "wildcard_misuse");

	let err = bus.unsubscribe("charol/#", "one").unwrap_err();
	assert_eq!(err.error_type(), "wildcard_misuse");
	assert_eq!(bus.topic_count(), 0);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_provider_fails_without_mutation() {
	let (bus, worker) = start();

	let err = bus
		.publish(
			"charol/manuh",
			"m".into(),
			PublishOptions::retained_in(RetentionProvider::named("disk")),
		)
		.unwrap_err();

	assert_eq!(
		err,
		BusError::Retention(RetentionError::unknown_provider("disk"))
	);
	assert_eq!(bus.topic_count(), 0);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_paths_rejected() {
	let (bus, worker) = start();
	let log = Log::default();

	for path in ["", "a//b", "/a", "a/", "sport/#/ranking", "tennis#"] {
		let err = bus.subscribe(path, "t", recorder(&log, "t")).unwrap_err();
		assert_eq!(err.error_type(), "invalid_path", "path {path:?}");
	}
	let err = bus.subscribe("sport/+", "t", recorder(&log, "t")).unwrap_err();
	assert_eq!(err.error_type(), "unsupported_wildcard");

	assert_eq!(bus.topic_count(), 0);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_resubscribe_keeps_first_handler() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.subscribe("a", "t", recorder(&log, "first")).unwrap();
	bus.subscribe("a", "t", recorder(&log, "second")).unwrap();

	bus.publish("a", "m".into(), PublishOptions::default())
		.unwrap();
	bus.flush().await.unwrap();

	assert_eq!(bus.subscription_count("a"), 1);
	assert_eq!(entries(&log), vec!["first|a|m|live"]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_resubscribe_does_not_replay_retained_again() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.publish("door", "open".into(), PublishOptions::retained())
		.unwrap();

	bus.subscribe("door", "t", recorder(&log, "first")).unwrap();
	bus.flush().await.unwrap();
	let again = bus.subscribe("door", "t", recorder(&log, "second")).unwrap();
	bus.flush().await.unwrap();

	assert_eq!(again.as_deref().map(String::as_str), Some("open"));
	assert_eq!(entries(&log), vec!["first|door|open|retained"]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unsubscribe_keeps_already_scheduled_delivery() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.subscribe("news", "t", recorder(&log, "t")).unwrap();

	bus.publish("news", "m".into(), PublishOptions::default())
		.unwrap();
	assert!(bus.unsubscribe("news", "t").unwrap());
	let scheduled = bus
		.publish("news", "m2".into(), PublishOptions::default())
		.unwrap();
	bus.flush().await.unwrap();

	assert_eq!(scheduled, 0);
	assert_eq!(entries(&log), vec!["t|news|m|live"]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_panicking_handler_does_not_block_others() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.subscribe("alerts", "before", recorder(&log, "before")).unwrap();
	bus.subscribe("alerts", "faulty", |_msg: Arc<String>, _info: DeliveryInfo| {
		panic!("faulty subscriber");
	})
	.unwrap();
	bus.subscribe("alerts", "after", recorder(&log, "after")).unwrap();

	bus.publish("alerts", "fire".into(), PublishOptions::default())
		.unwrap();
	bus.publish("alerts", "smoke".into(), PublishOptions::default())
		.unwrap();
	bus.flush().await.unwrap();

	assert_eq!(entries(&log), vec![
		"before|alerts|fire|live",
		"after|alerts|fire|live",
		"before|alerts|smoke|live",
		"after|alerts|smoke|live",
	]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_handler_may_publish_back_into_bus() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.subscribe("echo/out", "sink", recorder(&log, "sink")).unwrap();

	let inner = bus.clone();
	bus.subscribe("echo/in", "relay", move |msg: Arc<String>, _info| {
		inner
			.publish("echo/out", format!("re:{msg}"), PublishOptions::default())
			.unwrap();
	})
	.unwrap();

	bus.publish("echo/in", "ping".into(), PublishOptions::default())
		.unwrap();
	bus.flush().await.unwrap();

	assert_eq!(entries(&log), vec!["sink|echo/out|re:ping|live"]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_builder_requires_message_callback() {
	let (bus, worker) = start();

	let err = bus.subscription("a/b", "t").subscribe().unwrap_err();

	assert_eq!(err, BusError::missing_callback("a/b"));
	assert_eq!(bus.topic_count(), 0);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_builder_on_subscribed_defers_subscription() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.publish("lobby", "welcome".into(), PublishOptions::retained())
		.unwrap();

	let done = Log::default();
	let done_clone = Arc::clone(&done);
	let result = bus
		.subscription("lobby", "guest")
		.on_message(recorder(&log, "guest"))
		.on_subscribed(move || {
			done_clone.lock().unwrap().push("subscribed".into());
		})
		.subscribe()
		.unwrap();
	assert!(result.is_none());

	bus.flush().await.unwrap();
	assert_eq!(entries(&done), vec!["subscribed"]);
	assert_eq!(entries(&log), vec!["guest|lobby|welcome|retained"]);
	assert_eq!(bus.subscription_count("lobby"), 1);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_async_subscribe_without_callback() {
	let (bus, worker) = start();
	let log = Log::default();

	bus.async_subscribe("x/#", "t", recorder(&log, "t"), None)
		.unwrap();
	bus.flush().await.unwrap();
	assert_eq!(bus.subscription_count("x/#"), 1);

	bus.publish("x/y", "m".into(), PublishOptions::default())
		.unwrap();
	bus.flush().await.unwrap();
	assert_eq!(entries(&log), vec!["t|x/y|m|live"]);

	let err = bus
		.async_subscribe("x/+", "t", recorder(&log, "t"), None)
		.unwrap_err();
	assert_eq!(err.error_type(), "unsupported_wildcard");
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_independent_buses_are_isolated() {
	let (first, first_worker) = start();
	let (second, second_worker) = start();
	let log = Log::default();
	first.subscribe("shared", "t", recorder(&log, "first")).unwrap();

	second
		.publish("shared", "m".into(), PublishOptions::retained())
		.unwrap();
	first.flush().await.unwrap();
	second.flush().await.unwrap();

	assert!(entries(&log).is_empty());
	assert!(first.retained_message("shared").unwrap().is_none());
	first_worker.shutdown().await.unwrap();
	second_worker.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_delivery_respects_configured_delay() {
	let config =
		BusConfig::default().with_delivery_delay(Duration::from_millis(50));
	let (bus, worker) = TopicBus::<String>::start(config).unwrap();
	let log = Log::default();
	bus.subscribe("slow", "t", recorder(&log, "t")).unwrap();

	bus.publish("slow", "m".into(), PublishOptions::default())
		.unwrap();
	tokio::time::sleep(Duration::from_millis(20)).await;
	assert!(entries(&log).is_empty());

	tokio::time::sleep(Duration::from_millis(40)).await;
	assert_eq!(entries(&log), vec!["t|slow|m|live"]);
	worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_drains_then_rejects() {
	let (bus, worker) = start();
	let log = Log::default();
	bus.subscribe("last", "t", recorder(&log, "t")).unwrap();
	bus.publish("last", "m".into(), PublishOptions::default())
		.unwrap();

	worker.shutdown().await.unwrap();
	assert_eq!(entries(&log), vec!["t|last|m|live"]);

	let err = bus
		.publish("last", "late".into(), PublishOptions::default())
		.unwrap_err();
	assert_eq!(err.error_type(), "delivery");
}

#[tokio::test]
async fn test_failed_publish_after_shutdown_changes_nothing() {
	let (bus, worker) = start();
	worker.shutdown().await.unwrap();

	let err = bus
		.publish("a", "late".into(), PublishOptions::retained())
		.unwrap_err();
	assert_eq!(err, BusError::Delivery(DeliveryError::WorkerClosed));
	assert!(bus.retained_message("a").unwrap().is_none());
	assert_eq!(bus.topic_count(), 0);

	let log = Log::default();
	let err = bus.subscribe("b", "t", recorder(&log, "t")).unwrap_err();
	assert_eq!(err.error_type(), "delivery");
	assert_eq!(bus.subscription_count("b"), 0);
}

#[tokio::test]
async fn test_shutdown_stops_worker_kept_alive_by_handler() {
	let (bus, worker) = start();
	let inner = bus.clone();
	bus.subscribe("ping", "relay", move |_msg: Arc<String>, _info| {
		let _ = inner.topic_count();
	})
	.unwrap();
	drop(bus);

	tokio::time::timeout(Duration::from_secs(5), worker.shutdown())
		.await
		.expect("worker did not stop")
		.unwrap();
}

#[test]
fn test_start_outside_runtime_fails() {
	let err = TopicBus::<String>::start(BusConfig::default()).unwrap_err();
	assert_eq!(err, BusError::RuntimeUnavailable);
}

#[tokio::test]
async fn test_zero_cache_size_rejected() {
	let settings = BusSettings {
		topic_cache_size: 0,
		..BusSettings::default()
	};
	let err =
		TopicBus::<String>::start(BusConfig::default().with_settings(settings))
			.unwrap_err();
	assert_eq!(err.error_type(), "configuration_value");
}
