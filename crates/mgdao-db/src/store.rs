//! Store boundary
//!
//! The registry and handles only talk to the database through these traits.
//! [`backends::mongodb`](crate::backends::mongodb) adapts the official
//! driver; [`backends::memory`](crate::backends::memory) keeps everything in
//! process.

use async_trait::async_trait;
use bson::{Bson, Document};
use mgdao_conf::PoolSettings;
use std::sync::Arc;

use super::error::Result;
use super::types::{FindOptions, UpdateResult};

/// Something that can open clients
#[async_trait]
pub trait DocumentStore: Send + Sync {
	/// Open a client for `uri` sized by `pool`
	async fn dial(&self, uri: &str, pool: &PoolSettings) -> Result<Arc<dyn StoreClient>>;
}

/// An open client; owned by the registry, shared with handles
#[async_trait]
pub trait StoreClient: Send + Sync {
	/// Round-trip to the server
	///
	/// The registry bounds this call with its own time budget.
	async fn ping(&self) -> Result<()>;

	/// Release the client's resources; further use fails
	async fn close(&self);

	fn database(&self, name: &str) -> Arc<dyn StoreDatabase>;

	fn as_any(&self) -> &dyn std::any::Any;
}

#[async_trait]
pub trait StoreDatabase: Send + Sync {
	fn name(&self) -> &str;

	fn collection(&self, name: &str) -> Arc<dyn StoreCollection>;

	async fn drop_database(&self) -> Result<()>;

	async fn run_command(&self, command: Document) -> Result<Document>;
}

/// Collection-level operations
///
/// Filters and update documents are passed through untouched.
#[async_trait]
pub trait StoreCollection: Send + Sync {
	fn name(&self) -> &str;

	/// Insert one document, returning its `_id`
	async fn insert_one(&self, document: Document) -> Result<Bson>;

	/// Insert documents in order, returning their `_id`s
	async fn insert_many(&self, documents: Vec<Document>) -> Result<Vec<Bson>>;

	async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>>;

	async fn find_one(&self, filter: Document, options: FindOptions) -> Result<Option<Document>>;

	async fn count(&self, filter: Document) -> Result<u64>;

	/// Update the first match; with `upsert` insert when nothing matches
	async fn update_one(
		&self,
		filter: Document,
		update: Document,
		upsert: bool,
	) -> Result<UpdateResult>;

	async fn update_many(&self, filter: Document, update: Document) -> Result<UpdateResult>;

	/// Delete the first match, returning the number deleted (0 or 1)
	async fn delete_one(&self, filter: Document) -> Result<u64>;

	async fn delete_many(&self, filter: Document) -> Result<u64>;

	async fn drop_collection(&self) -> Result<()>;

	async fn drop_index(&self, name: &str) -> Result<()>;
}
