//! Generic typed data-access object
//!
//! A [`Dao<E>`] maps one collection to one record type. Each operation
//! fetches a verified connection from the registry, runs a single store
//! call and hides store error details behind a generic error after logging
//! them.
//!
//! # Example
//!
//! ```rust
//! use bson::doc;
//! use mgdao_conf::Settings;
//! use mgdao_db::backends::memory::MemoryStore;
//! use mgdao_db::dao::Dao;
//! use mgdao_db::registry::{ConnectionRegistry, RegistrySource};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     name: String,
//!     age: i32,
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! # let settings = Settings::from_yaml("go: { data: { mongodb: { uri: 'memory://x', db: app } } }").unwrap();
//! let registry = Arc::new(ConnectionRegistry::new(
//!     Arc::new(MemoryStore::new()),
//!     RegistrySource::Settings(settings),
//! ));
//! let users: Dao<User> = Dao::new(registry, "users");
//!
//! users.insert(&User { name: "alice".into(), age: 31 }).await.unwrap();
//! let alice = users.one(doc! { "name": "alice" }).await.unwrap();
//! assert_eq!(alice.map(|u| u.age), Some(31));
//! # }
//! ```

use bson::{Bson, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::collection::CollectionHandle;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::registry::ConnectionRegistry;
use crate::types::ResultPage;

/// Page size used when a pager call asks for 0
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Picks the database tag for each operation
pub trait TagResolver: Send + Sync {
	fn resolve(&self) -> String;
}

impl<F> TagResolver for F
where
	F: Fn() -> String + Send + Sync,
{
	fn resolve(&self) -> String {
		self()
	}
}

/// Always the same tag
#[derive(Debug, Clone)]
pub struct FixedTag(pub String);

impl FixedTag {
	pub fn new(tag: impl Into<String>) -> Self {
		Self(tag.into())
	}
}

impl TagResolver for FixedTag {
	fn resolve(&self) -> String {
		self.0.clone()
	}
}

/// The empty tag: the single database, or the first one in multi-database mode
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTag;

impl TagResolver for DefaultTag {
	fn resolve(&self) -> String {
		String::new()
	}
}

/// Typed access to one collection
pub struct Dao<E> {
	registry: Arc<ConnectionRegistry>,
	collection_name: String,
	tag: Arc<dyn TagResolver>,
	ctx: Context,
	_entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Dao<E> {
	fn clone(&self) -> Self {
		Self {
			registry: self.registry.clone(),
			collection_name: self.collection_name.clone(),
			tag: self.tag.clone(),
			ctx: self.ctx.clone(),
			_entity: PhantomData,
		}
	}
}

impl<E> Dao<E>
where
	E: Serialize + DeserializeOwned + Send + Sync,
{
	/// DAO over `collection_name` using [`DefaultTag`]
	pub fn new(registry: Arc<ConnectionRegistry>, collection_name: impl Into<String>) -> Self {
		Self {
			registry,
			collection_name: collection_name.into(),
			tag: Arc::new(DefaultTag),
			ctx: Context::background(),
			_entity: PhantomData,
		}
	}

	pub fn with_tag(mut self, tag: impl TagResolver + 'static) -> Self {
		self.tag = Arc::new(tag);
		self
	}

	/// Run every operation under `ctx` instead of the background context
	pub fn with_context(mut self, ctx: Context) -> Self {
		self.ctx = ctx;
		self
	}

	pub fn collection_name(&self) -> &str {
		&self.collection_name
	}

	pub async fn insert(&self, entity: &E) -> Result<()> {
		let collection = self.collection().await?;
		collection
			.insert_one(entity)
			.await
			.map(|_| ())
			.map_err(|e| failed(e, "insert", Error::Write))
	}

	/// Remove every record matching `filter`, returning how many went
	pub async fn delete(&self, filter: Document) -> Result<u64> {
		let collection = self.collection().await?;
		collection
			.remove_all(filter)
			.await
			.map(|result| result.deleted_count)
			.map_err(|e| failed(e, "delete", Error::Delete))
	}

	/// Apply update operators to the record with `_id == id`
	pub async fn updates(&self, id: impl Into<Bson>, fields: Document) -> Result<()> {
		let collection = self.collection().await?;
		collection
			.update_by_id(id, fields)
			.await
			.map_err(|e| failed(e, "update", Error::Update))
	}

	/// Every record matching `filter`
	pub async fn all(&self, filter: Document) -> Result<Vec<E>> {
		let collection = self.collection().await?;
		collection
			.find(filter)
			.all()
			.await
			.map_err(|e| failed(e, "query", Error::Query))
	}

	/// First record matching `filter`
	pub async fn one(&self, filter: Document) -> Result<Option<E>> {
		let collection = self.collection().await?;
		collection
			.find(filter)
			.one()
			.await
			.map_err(|e| failed(e, "query", Error::Query))
	}

	/// One page of records matching `filter`
	///
	/// `page` is 1-based and `size` 0 means [`DEFAULT_PAGE_SIZE`]. The page
	/// metadata counts the whole collection, not only the matches, and
	/// reports `total / size + 1` pages. A page past the end comes back
	/// empty with the metadata still filled in.
	///
	/// # Examples
	///
	/// ```rust
	/// # use mgdao_conf::Settings;
	/// # use mgdao_db::backends::memory::MemoryStore;
	/// # use mgdao_db::dao::Dao;
	/// # use mgdao_db::registry::{ConnectionRegistry, RegistrySource};
	/// # use std::sync::Arc;
	/// # #[tokio::main]
	/// # async fn main() {
	/// # let settings = Settings::from_yaml("go: { data: { mongodb: { uri: 'memory://x', db: app } } }").unwrap();
	/// # let registry = Arc::new(ConnectionRegistry::new(Arc::new(MemoryStore::new()), RegistrySource::Settings(settings)));
	/// let logs: Dao<bson::Document> = Dao::new(registry, "logs");
	/// for n in 0..45 {
	///     logs.insert(&bson::doc! { "n": n }).await.unwrap();
	/// }
	///
	/// let (rows, page) = logs.pager(bson::doc! {}, &["-n"], 3, 20).await.unwrap();
	/// assert_eq!(rows.len(), 5);
	/// assert_eq!((page.count, page.total), (3, 45));
	/// # }
	/// ```
	pub async fn pager<S: AsRef<str>>(
		&self,
		filter: Document,
		sort: &[S],
		page: u64,
		size: u64,
	) -> Result<(Vec<E>, ResultPage)> {
		let collection = self.collection().await?;
		let size = if size == 0 { DEFAULT_PAGE_SIZE } else { size };

		let total = collection
			.count()
			.await
			.map_err(|e| failed(e, "query", Error::Query))?;
		let result_page = ResultPage {
			count: total / size + 1,
			index: page,
			size,
			total,
		};

		let offset = page.max(1).saturating_sub(1).saturating_mul(size);
		if total == 0 || offset > total {
			return Ok((Vec::new(), result_page));
		}

		let records = collection
			.find(filter)
			.sort(sort)
			.skip(offset)
			.limit(i64::try_from(size).unwrap_or(i64::MAX))
			.all()
			.await
			.map_err(|e| failed(e, "query", Error::Query))?;
		Ok((records, result_page))
	}

	async fn collection(&self) -> Result<CollectionHandle> {
		if self.collection_name.is_empty() {
			return Err(Error::Configuration("collection name is not defined".to_string()));
		}

		let tag = self.tag.resolve();
		match self.registry.connection(Some(&tag)).await {
			Ok(db) => Ok(db.context(self.ctx.clone()).c(&self.collection_name)),
			Err(e) => {
				tracing::error!("database connection failed: {}", e);
				match e {
					Error::Configuration(_) => Err(e),
					_ => Err(Error::Connection("database connection failed".to_string())),
				}
			}
		}
	}
}

/// Log a store failure and swap it for the operation's generic error
///
/// Context errors pass through untouched.
fn failed(error: Error, operation: &str, generic: Error) -> Error {
	if error.is_context_error() {
		return error;
	}
	tracing::error!("database {} failed: {}", operation, error);
	generic
}
