//! Shared fixtures for mgdao-db integration tests

#![allow(dead_code)]

use mgdao_conf::Settings;
use mgdao_db::backends::memory::MemoryStore;
use mgdao_db::{ConnectionRegistry, RegistrySource};
use rstest::fixture;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;

pub const SINGLE_URI: &str = "memory://primary";
pub const ORDERS_URI: &str = "memory://orders";
pub const USERS_URI: &str = "memory://users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
	#[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
	pub id: Option<bson::oid::ObjectId>,
	pub name: String,
	pub age: i32,
}

impl User {
	pub fn new(name: &str, age: i32) -> Self {
		Self {
			id: None,
			name: name.to_string(),
			age,
		}
	}
}

/// Single-database settings pointing at `uri`
pub fn single_settings(uri: &str) -> Settings {
	Settings::from_yaml(&format!(
		r#"
go:
  data:
    mongo_pool:
      min: 2
    mongodb:
      uri: "{}"
      db: app
"#,
		uri
	))
	.unwrap()
}

/// Multi-database settings; `ghost` is listed but has no uri key
pub fn multi_settings() -> Settings {
	Settings::from_yaml(&format!(
		r#"
go:
  data:
    mongodb:
      multidb: true
      dbNames: "orders, ,users,ghost"
      orders:
        uri: "{}"
        db: shop
      users:
        uri: "{}"
        db: accounts
"#,
		ORDERS_URI, USERS_URI
	))
	.unwrap()
}

#[fixture]
pub fn store() -> MemoryStore {
	MemoryStore::new()
}

pub fn registry(store: &MemoryStore, settings: Settings) -> Arc<ConnectionRegistry> {
	Arc::new(ConnectionRegistry::new(
		Arc::new(store.clone()),
		RegistrySource::Settings(settings),
	))
}

/// Records formatted events while the returned guard is alive
pub struct LogCapture {
	logs: Arc<Mutex<Vec<String>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LogCapture {
	fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
		struct MessageVisitor {
			message: String,
		}

		impl tracing::field::Visit for MessageVisitor {
			fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
				if field.name() == "message" {
					self.message = format!("{:?}", value);
				}
			}
		}

		let mut visitor = MessageVisitor {
			message: String::new(),
		};
		event.record(&mut visitor);

		self.logs.lock().unwrap().push(format!(
			"[{}] {}",
			event.metadata().level(),
			visitor.message
		));
	}
}

pub fn capture_logs() -> (Arc<Mutex<Vec<String>>>, tracing::subscriber::DefaultGuard) {
	let logs = Arc::new(Mutex::new(Vec::new()));
	let capture = LogCapture { logs: logs.clone() };
	let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture));
	(logs, guard)
}
