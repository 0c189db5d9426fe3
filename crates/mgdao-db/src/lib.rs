//! # mgdao database layer
//!
//! A registry of health-checked MongoDB connections and a generic typed DAO
//! on top of it.
//!
//! - [`registry`]: loads settings, dials every configured database and hands
//!   out verified connections by tag
//! - [`health`]: ping-then-redial checks run before a connection is handed out
//! - [`handle`], [`collection`]: per-request handles whose operations honour
//!   a cancellation [`Context`]
//! - [`dao`]: `insert`/`delete`/`updates`/`all`/`one`/`pager` over one
//!   collection and one record type
//! - [`store`]: the traits the layers above talk to, implemented by
//!   [`backends::mongodb`] (feature `mongodb`) and [`backends::memory`]
//!
//! ## Example
//!
//! ```rust
//! use mgdao_conf::Settings;
//! use mgdao_db::{ConnectionRegistry, Dao, FixedTag, RegistrySource};
//! use mgdao_db::backends::memory::MemoryStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let settings = Settings::from_yaml(r#"
//! go:
//!   data:
//!     mongodb:
//!       multidb: true
//!       dbNames: orders,users
//!       orders: { uri: "memory://orders", db: shop }
//!       users: { uri: "memory://users", db: accounts }
//! "#).unwrap();
//!
//! let registry = Arc::new(ConnectionRegistry::new(
//!     Arc::new(MemoryStore::new()),
//!     RegistrySource::Settings(settings),
//! ));
//!
//! let orders: Dao<bson::Document> = Dao::new(registry.clone(), "orders").with_tag(FixedTag::new("orders"));
//! orders.insert(&bson::doc! { "sku": "A-1" }).await.unwrap();
//!
//! assert_eq!(registry.list_tags(), vec!["orders", "users"]);
//! # }
//! ```

pub mod backends;
pub mod collection;
pub mod context;
pub mod dao;
pub mod error;
pub mod handle;
pub mod health;
pub mod registry;
pub mod store;
pub mod types;

pub use collection::{Bulk, BulkResult, CollectionHandle, Query};
pub use context::Context;
pub use dao::{DEFAULT_PAGE_SIZE, Dao, DefaultTag, FixedTag, TagResolver};
pub use error::{Error, Result};
pub use handle::DatabaseHandle;
pub use health::HEALTH_CHECK_BUDGET;
pub use registry::{Connection, ConnectionRegistry, RegistrySource};
pub use store::{DocumentStore, StoreClient, StoreCollection, StoreDatabase};
pub use types::{DeleteResult, FindOptions, ResultPage, UpdateResult};

#[cfg(feature = "mongodb")]
pub use backends::mongodb::MongoStore;
pub use backends::memory::MemoryStore;
