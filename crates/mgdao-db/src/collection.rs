//! Collection handle, chainable queries and ordered bulk batches
//!
//! Every operation is one store call raced against the handle's
//! [`Context`]. A cancelled or expired context always surfaces as
//! [`Error::Cancelled`] / [`Error::DeadlineExceeded`], never as a store error.
//!
//! # Example
//!
//! ```rust
//! use bson::doc;
//! use mgdao_conf::Settings;
//! use mgdao_db::backends::memory::MemoryStore;
//! use mgdao_db::registry::{ConnectionRegistry, RegistrySource};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Order {
//!     sku: String,
//!     qty: i32,
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! # let settings = Settings::from_yaml("go: { data: { mongodb: { uri: 'memory://x', db: shop } } }").unwrap();
//! # let registry = ConnectionRegistry::new(Arc::new(MemoryStore::new()), RegistrySource::Settings(settings));
//! let orders = registry.connection(None).await.unwrap().c("orders");
//!
//! orders.insert(&[
//!     Order { sku: "a".into(), qty: 2 },
//!     Order { sku: "b".into(), qty: 5 },
//! ]).await.unwrap();
//!
//! let big: Vec<Order> = orders
//!     .find(doc! { "qty": { "$gt": 3 } })
//!     .sort(["-qty"])
//!     .all()
//!     .await
//!     .unwrap();
//! assert_eq!(big[0].sku, "b");
//! # }
//! ```

use bson::{Bson, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::store::StoreCollection;
use crate::types::{DeleteResult, FindOptions, UpdateResult, id_filter, index_name, sort_document};

/// A collection bound to a cancellation [`Context`]
#[derive(Clone)]
pub struct CollectionHandle {
	collection: Arc<dyn StoreCollection>,
	ctx: Context,
}

impl CollectionHandle {
	pub(crate) fn new(collection: Arc<dyn StoreCollection>, ctx: Context) -> Self {
		Self { collection, ctx }
	}

	/// Replace the context used by this handle
	pub fn context(mut self, ctx: Context) -> Self {
		self.ctx = ctx;
		self
	}

	pub fn name(&self) -> &str {
		self.collection.name()
	}

	/// Insert every given document, returning their `_id`s in order
	///
	/// An empty slice is a no-op.
	pub async fn insert<T: Serialize>(&self, documents: &[T]) -> Result<Vec<Bson>> {
		let mut encoded = documents
			.iter()
			.map(bson::serialize_to_document)
			.collect::<std::result::Result<Vec<_>, _>>()?;

		match encoded.len() {
			0 => Ok(Vec::new()),
			1 => {
				let document = encoded.remove(0);
				let id = self.ctx.run(self.collection.insert_one(document)).await?;
				Ok(vec![id])
			}
			_ => self.ctx.run(self.collection.insert_many(encoded)).await,
		}
	}

	pub async fn insert_one<T: Serialize>(&self, document: &T) -> Result<Bson> {
		let document = bson::serialize_to_document(document)?;
		self.ctx.run(self.collection.insert_one(document)).await
	}

	/// Remove the first match; [`Error::NotFound`] when nothing matched
	pub async fn remove(&self, filter: Document) -> Result<()> {
		let deleted = self.ctx.run(self.collection.delete_one(filter)).await?;
		if deleted == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}

	pub async fn remove_by_id(&self, id: impl Into<Bson>) -> Result<()> {
		self.remove(id_filter(id)).await
	}

	/// Remove every match
	pub async fn remove_all(&self, filter: Document) -> Result<DeleteResult> {
		let deleted_count = self.ctx.run(self.collection.delete_many(filter)).await?;
		Ok(DeleteResult { deleted_count })
	}

	/// Update the first match; [`Error::NotFound`] when nothing matched
	///
	/// `update` must use update operators such as `$set`.
	pub async fn update(&self, filter: Document, update: Document) -> Result<()> {
		let result = self
			.ctx
			.run(self.collection.update_one(filter, update, false))
			.await?;
		if result.matched_count == 0 {
			return Err(Error::NotFound);
		}
		Ok(())
	}

	pub async fn update_by_id(&self, id: impl Into<Bson>, update: Document) -> Result<()> {
		self.update(id_filter(id), update).await
	}

	pub async fn update_all(&self, filter: Document, update: Document) -> Result<UpdateResult> {
		self.ctx.run(self.collection.update_many(filter, update)).await
	}

	/// Update the first match, inserting a document built from the filter
	/// when nothing matches
	pub async fn upsert(&self, filter: Document, update: Document) -> Result<UpdateResult> {
		self.ctx
			.run(self.collection.update_one(filter, update, true))
			.await
	}

	pub async fn upsert_by_id(&self, id: impl Into<Bson>, update: Document) -> Result<UpdateResult> {
		self.upsert(id_filter(id), update).await
	}

	/// Start a query; nothing runs until a terminal method is awaited
	pub fn find(&self, filter: Document) -> Query {
		Query {
			collection: self.collection.clone(),
			ctx: self.ctx.clone(),
			filter,
			options: FindOptions::new(),
		}
	}

	pub fn find_by_id(&self, id: impl Into<Bson>) -> Query {
		self.find(id_filter(id))
	}

	/// Number of documents in the whole collection
	pub async fn count(&self) -> Result<u64> {
		self.ctx.run(self.collection.count(Document::new())).await
	}

	/// Start an ordered batch of writes
	pub fn bulk(&self) -> Bulk {
		Bulk {
			collection: self.collection.clone(),
			ctx: self.ctx.clone(),
			ops: Vec::new(),
			encode_error: None,
		}
	}

	pub async fn drop_collection(&self) -> Result<()> {
		self.ctx.run(self.collection.drop_collection()).await
	}

	/// Drop the index built from `keys`, e.g. `["name", "-age"]`
	pub async fn drop_index<I, S>(&self, keys: I) -> Result<()>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let name = index_name(keys);
		if name.is_empty() {
			return Err(Error::InvalidOperation("index key list is empty".to_string()));
		}
		self.drop_index_name(&name).await
	}

	pub async fn drop_index_name(&self, name: &str) -> Result<()> {
		self.ctx.run(self.collection.drop_index(name)).await
	}
}

/// A pending find
pub struct Query {
	collection: Arc<dyn StoreCollection>,
	ctx: Context,
	filter: Document,
	options: FindOptions,
}

impl Query {
	/// Sort by `"field"` (ascending) or `"-field"` (descending), in order
	pub fn sort<I, S>(mut self, keys: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let sort = sort_document(keys);
		self.options.sort = (!sort.is_empty()).then_some(sort);
		self
	}

	pub fn skip(mut self, skip: u64) -> Self {
		self.options.skip = Some(skip);
		self
	}

	pub fn limit(mut self, limit: i64) -> Self {
		self.options.limit = Some(limit);
		self
	}

	/// Every match decoded as `T`
	pub async fn all<T: DeserializeOwned>(self) -> Result<Vec<T>> {
		let documents = self
			.ctx
			.run(self.collection.find(self.filter, self.options))
			.await?;
		documents
			.into_iter()
			.map(|document| Ok(bson::deserialize_from_document(document)?))
			.collect()
	}

	/// First match decoded as `T`, `None` when nothing matches
	pub async fn one<T: DeserializeOwned>(self) -> Result<Option<T>> {
		let document = self
			.ctx
			.run(self.collection.find_one(self.filter, self.options))
			.await?;
		match document {
			Some(document) => Ok(Some(bson::deserialize_from_document(document)?)),
			None => Ok(None),
		}
	}

	/// Number of documents matching the filter; sort, skip and limit are ignored
	pub async fn count(self) -> Result<u64> {
		self.ctx.run(self.collection.count(self.filter)).await
	}
}

enum BulkOp {
	Insert(Document),
	Update {
		filter: Document,
		update: Document,
		many: bool,
		upsert: bool,
	},
	Remove {
		filter: Document,
		many: bool,
	},
}

/// Totals of a completed [`Bulk`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkResult {
	pub inserted: u64,
	pub matched: u64,
	pub modified: u64,
	pub upserted: u64,
	pub deleted: u64,
}

/// Ordered batch of writes
///
/// Operations run in the order they were queued; the first failure stops
/// the batch, leaving earlier writes applied.
pub struct Bulk {
	collection: Arc<dyn StoreCollection>,
	ctx: Context,
	ops: Vec<BulkOp>,
	encode_error: Option<Error>,
}

impl Bulk {
	pub fn insert<T: Serialize>(&mut self, document: &T) -> &mut Self {
		match bson::serialize_to_document(document) {
			Ok(document) => self.ops.push(BulkOp::Insert(document)),
			Err(e) => {
				self.encode_error.get_or_insert(e.into());
			}
		}
		self
	}

	pub fn update_one(&mut self, filter: Document, update: Document) -> &mut Self {
		self.push_update(filter, update, false, false)
	}

	pub fn update_all(&mut self, filter: Document, update: Document) -> &mut Self {
		self.push_update(filter, update, true, false)
	}

	pub fn upsert(&mut self, filter: Document, update: Document) -> &mut Self {
		self.push_update(filter, update, false, true)
	}

	pub fn remove(&mut self, filter: Document) -> &mut Self {
		self.ops.push(BulkOp::Remove { filter, many: false });
		self
	}

	pub fn remove_all(&mut self, filter: Document) -> &mut Self {
		self.ops.push(BulkOp::Remove { filter, many: true });
		self
	}

	pub fn len(&self) -> usize {
		self.ops.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}

	fn push_update(&mut self, filter: Document, update: Document, many: bool, upsert: bool) -> &mut Self {
		self.ops.push(BulkOp::Update {
			filter,
			update,
			many,
			upsert,
		});
		self
	}

	/// Execute the queued operations
	///
	/// A document that failed to encode while queuing fails the batch
	/// before anything is written.
	pub async fn run(self) -> Result<BulkResult> {
		if let Some(e) = self.encode_error {
			return Err(e);
		}

		let collection = self.collection;
		let ops = self.ops;
		self.ctx
			.run(async move {
				let mut result = BulkResult::default();
				for op in ops {
					match op {
						BulkOp::Insert(document) => {
							collection.insert_one(document).await?;
							result.inserted += 1;
						}
						BulkOp::Update {
							filter,
							update,
							many,
							upsert,
						} => {
							let updated = if many {
								collection.update_many(filter, update).await?
							} else {
								collection.update_one(filter, update, upsert).await?
							};
							result.matched += updated.matched_count;
							result.modified += updated.modified_count;
							result.upserted += updated.upserted_count;
						}
						BulkOp::Remove { filter, many } => {
							result.deleted += if many {
								collection.delete_many(filter).await?
							} else {
								collection.delete_one(filter).await?
							};
						}
					}
				}
				Ok(result)
			})
			.await
	}
}
