//! Per-request database handle

use bson::Document;
use std::sync::Arc;

use crate::collection::CollectionHandle;
use crate::context::Context;
use crate::error::Result;
use crate::registry::Connection;
use crate::store::{StoreClient, StoreDatabase};

/// A database bound to a cancellation [`Context`]
///
/// Handles are cheap and meant to live for one request. The client behind
/// them is shared with the registry, so dropping a handle never closes it.
pub struct DatabaseHandle {
	connection: Arc<Connection>,
	ctx: Context,
}

impl DatabaseHandle {
	pub(crate) fn new(connection: Arc<Connection>) -> Self {
		Self {
			connection,
			ctx: Context::background(),
		}
	}

	/// Replace the context used by this handle and the collections it opens
	pub fn context(mut self, ctx: Context) -> Self {
		self.ctx = ctx;
		self
	}

	pub fn ctx(&self) -> &Context {
		&self.ctx
	}

	/// Tag the connection was registered under
	pub fn tag(&self) -> &str {
		self.connection.tag()
	}

	pub fn client(&self) -> Arc<dyn StoreClient> {
		self.connection.client().clone()
	}

	pub fn database(&self) -> Arc<dyn StoreDatabase> {
		self.connection.database().clone()
	}

	/// Database name
	pub fn name(&self) -> &str {
		self.connection.database().name()
	}

	/// Shorthand for [`collection`](Self::collection)
	pub fn c(&self, name: &str) -> CollectionHandle {
		self.collection(name)
	}

	/// Open a collection that inherits this handle's context
	pub fn collection(&self, name: &str) -> CollectionHandle {
		CollectionHandle::new(self.connection.database().collection(name), self.ctx.clone())
	}

	pub async fn drop_database(&self) -> Result<()> {
		let database = self.connection.database();
		self.ctx.run(database.drop_database()).await
	}

	/// Run a raw database command
	pub async fn run_command(&self, command: Document) -> Result<Document> {
		let database = self.connection.database();
		self.ctx.run(database.run_command(command)).await
	}
}

impl std::fmt::Debug for DatabaseHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DatabaseHandle")
			.field("tag", &self.tag())
			.field("database", &self.name())
			.finish()
	}
}
