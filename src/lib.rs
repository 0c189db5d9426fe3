//! # mgdao
//!
//! MongoDB connection management and a generic typed data-access object.
//!
//! mgdao reads a settings document (local or fetched over HTTP), dials one
//! database or several tagged ones, keeps the clients healthy by pinging them
//! before use and re-dialing on failure, and exposes a small typed DAO on top.
//!
//! ## Feature Flags
//!
//! - `mongodb` (default) - official driver backend ([`MongoStore`])
//! - `remote-config` (default) - fetch the settings YAML from a URL
//!
//! Without `mongodb` only the in-process [`MemoryStore`] is available, which
//! is also what the examples below use.
//!
//! ## Settings
//!
//! ```yaml
//! go:
//!   data:
//!     mongo_pool: { min: 5, max: 50, idle: 300, timeout: 60 }
//!     mongodb:
//!       multidb: true
//!       dbNames: orders,users
//!       orders: { uri: "mongodb://orders:27017", db: shop }
//!       users: { uri: "mongodb://users:27017", db: accounts }
//! ```
//!
//! Single-database mode uses `mongodb.uri` and `mongodb.db` instead.
//!
//! ## Quick Start
//!
//! ```rust
//! use mgdao::prelude::*;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Order {
//!     sku: String,
//!     qty: i32,
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_yaml(r#"
//! go:
//!   data:
//!     mongodb:
//!       uri: memory://local
//!       db: shop
//! "#)?;
//!
//! let registry = Arc::new(ConnectionRegistry::new(
//!     Arc::new(MemoryStore::new()),
//!     RegistrySource::Settings(settings),
//! ));
//!
//! let orders: Dao<Order> = Dao::new(registry, "orders");
//! orders.insert(&Order { sku: "A-1".into(), qty: 3 }).await?;
//!
//! let (rows, page) = orders.pager(bson::doc! {}, &["-qty"], 1, 20).await?;
//! assert_eq!(rows.len(), 1);
//! assert_eq!(page.total, 1);
//! # Ok(())
//! # }
//! ```

pub use mgdao_conf as conf;
pub use mgdao_db as db;

pub use mgdao_conf::{ConfigError, MongoConfig, PoolSettings, Settings};
pub use mgdao_db::{
	CollectionHandle, ConnectionRegistry, Context, Dao, DatabaseHandle, Error, MemoryStore,
	RegistrySource, Result, ResultPage,
};

#[cfg(feature = "mongodb")]
pub use mgdao_db::MongoStore;

/// Common imports
pub mod prelude {
	pub use crate::{
		CollectionHandle, ConnectionRegistry, Context, Dao, DatabaseHandle, Error, MemoryStore,
		PoolSettings, RegistrySource, ResultPage, Settings,
	};
	pub use mgdao_db::{DefaultTag, FixedTag, TagResolver};

	#[cfg(feature = "mongodb")]
	pub use crate::MongoStore;
}
