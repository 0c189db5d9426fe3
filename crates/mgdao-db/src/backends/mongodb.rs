//! MongoDB driver backend
//!
//! Implements the store traits on top of the official `mongodb` crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use mgdao_conf::PoolSettings;
//! use mgdao_db::backends::mongodb::MongoStore;
//! use mgdao_db::store::DocumentStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MongoStore::new()
//!     .dial("mongodb://localhost:27017", &PoolSettings::default())
//!     .await?;
//! client.ping().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::stream::TryStreamExt;
use mgdao_conf::PoolSettings;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::{DocumentStore, StoreClient, StoreCollection, StoreDatabase};
use crate::types::{FindOptions, UpdateResult};

/// Dials MongoDB deployments
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoStore;

impl MongoStore {
	pub fn new() -> Self {
		Self
	}
}

/// Parse `uri` and apply pool sizing
///
/// The idle timeout bounds how long a pooled connection may sit unused; the
/// socket timeout bounds connecting and server selection.
pub async fn client_options(uri: &str, pool: &PoolSettings) -> Result<ClientOptions> {
	let mut options = ClientOptions::parse(uri).await?;

	options.min_pool_size = Some(pool.min_connections);
	options.max_pool_size = Some(pool.max_connections);
	options.max_idle_time = Some(pool.idle_timeout());
	options.connect_timeout = Some(pool.socket_timeout());
	options.server_selection_timeout = Some(pool.socket_timeout());

	Ok(options)
}

#[async_trait]
impl DocumentStore for MongoStore {
	/// The driver connects lazily, so the new client must answer a ping
	/// within the socket timeout before it is handed out.
	async fn dial(&self, uri: &str, pool: &PoolSettings) -> Result<Arc<dyn StoreClient>> {
		let options = client_options(uri, pool).await?;
		let client = MongoClient {
			client: Client::with_options(options)?,
		};

		let reached = match tokio::time::timeout(pool.socket_timeout(), client.ping()).await {
			Ok(reached) => reached,
			Err(_) => Err(Error::Timeout(format!(
				"no reply to ping within {:?}",
				pool.socket_timeout()
			))),
		};
		if let Err(e) = reached {
			client.close().await;
			return Err(match e {
				Error::Connection(msg) => Error::Connection(msg),
				other => Error::Connection(other.to_string()),
			});
		}

		Ok(Arc::new(client))
	}
}

/// Driver client wrapper
#[derive(Clone)]
pub struct MongoClient {
	client: Client,
}

impl MongoClient {
	pub fn inner(&self) -> &Client {
		&self.client
	}
}

#[async_trait]
impl StoreClient for MongoClient {
	async fn ping(&self) -> Result<()> {
		self.client
			.database("admin")
			.run_command(doc! { "ping": 1 })
			.await?;
		Ok(())
	}

	async fn close(&self) {
		self.client.clone().shutdown().immediate(true).await;
	}

	fn database(&self, name: &str) -> Arc<dyn StoreDatabase> {
		Arc::new(MongoDatabase {
			db: self.client.database(name),
		})
	}

	fn as_any(&self) -> &dyn std::any::Any {
		self
	}
}

pub struct MongoDatabase {
	db: Database,
}

impl MongoDatabase {
	pub fn inner(&self) -> &Database {
		&self.db
	}
}

#[async_trait]
impl StoreDatabase for MongoDatabase {
	fn name(&self) -> &str {
		self.db.name()
	}

	fn collection(&self, name: &str) -> Arc<dyn StoreCollection> {
		Arc::new(MongoCollection {
			coll: self.db.collection::<Document>(name),
		})
	}

	async fn drop_database(&self) -> Result<()> {
		self.db.drop().await?;
		Ok(())
	}

	async fn run_command(&self, command: Document) -> Result<Document> {
		Ok(self.db.run_command(command).await?)
	}
}

pub struct MongoCollection {
	coll: Collection<Document>,
}

fn update_result(result: mongodb::results::UpdateResult) -> UpdateResult {
	let upserted_count = u64::from(result.upserted_id.is_some());
	UpdateResult::new(
		result.matched_count,
		result.modified_count,
		upserted_count,
		result.upserted_id,
	)
}

#[async_trait]
impl StoreCollection for MongoCollection {
	fn name(&self) -> &str {
		self.coll.name()
	}

	async fn insert_one(&self, document: Document) -> Result<Bson> {
		let result = self.coll.insert_one(document).await?;
		Ok(result.inserted_id)
	}

	async fn insert_many(&self, documents: Vec<Document>) -> Result<Vec<Bson>> {
		let result = self.coll.insert_many(documents).await?;

		// Driver reports ids keyed by input position
		let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
		ids.sort_by_key(|(index, _)| *index);
		Ok(ids.into_iter().map(|(_, id)| id).collect())
	}

	async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>> {
		let mut mongo_options = mongodb::options::FindOptions::default();
		mongo_options.limit = options.limit;
		mongo_options.skip = options.skip;
		mongo_options.sort = options.sort;

		let cursor = self.coll.find(filter).with_options(mongo_options).await?;
		Ok(cursor.try_collect().await?)
	}

	async fn find_one(&self, filter: Document, options: FindOptions) -> Result<Option<Document>> {
		let mut mongo_options = mongodb::options::FindOneOptions::default();
		mongo_options.skip = options.skip;
		mongo_options.sort = options.sort;

		Ok(self.coll.find_one(filter).with_options(mongo_options).await?)
	}

	async fn count(&self, filter: Document) -> Result<u64> {
		Ok(self.coll.count_documents(filter).await?)
	}

	async fn update_one(
		&self,
		filter: Document,
		update: Document,
		upsert: bool,
	) -> Result<UpdateResult> {
		let result = self.coll.update_one(filter, update).upsert(upsert).await?;
		Ok(update_result(result))
	}

	async fn update_many(&self, filter: Document, update: Document) -> Result<UpdateResult> {
		let result = self.coll.update_many(filter, update).await?;
		Ok(update_result(result))
	}

	async fn delete_one(&self, filter: Document) -> Result<u64> {
		let result = self.coll.delete_one(filter).await?;
		Ok(result.deleted_count)
	}

	async fn delete_many(&self, filter: Document) -> Result<u64> {
		let result = self.coll.delete_many(filter).await?;
		Ok(result.deleted_count)
	}

	async fn drop_collection(&self) -> Result<()> {
		self.coll.drop().await?;
		Ok(())
	}

	async fn drop_index(&self, name: &str) -> Result<()> {
		self.coll.drop_index(name).await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::time::Duration;

	#[rstest]
	#[tokio::test]
	async fn test_client_options_apply_pool_settings() {
		// Arrange
		let pool = PoolSettings::default()
			.with_min_connections(2)
			.with_max_connections(7)
			.with_idle_timeout(Duration::from_secs(90))
			.with_socket_timeout(Duration::from_secs(12));

		// Act
		let options = client_options("mongodb://localhost:27017", &pool)
			.await
			.unwrap();

		// Assert
		assert_eq!(options.min_pool_size, Some(2));
		assert_eq!(options.max_pool_size, Some(7));
		assert_eq!(options.max_idle_time, Some(Duration::from_secs(90)));
		assert_eq!(options.connect_timeout, Some(Duration::from_secs(12)));
		assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(12)));
	}

	#[rstest]
	#[tokio::test]
	async fn test_dial_rejects_malformed_uri() {
		let result = MongoStore::new()
			.dial("not-a-mongodb-uri", &PoolSettings::default())
			.await;

		assert!(result.is_err());
	}

	#[rstest]
	#[tokio::test]
	async fn test_dial_unreachable_server_fails() {
		// Arrange
		let pool = PoolSettings::default().with_socket_timeout(Duration::from_secs(1));

		// Act
		let result = MongoStore::new().dial("mongodb://127.0.0.1:1", &pool).await;

		// Assert
		assert!(matches!(result, Err(Error::Connection(_))));
	}
}
