//! Connection health checks with close-and-redial recovery

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::registry::{Connection, ConnectionRegistry};
use mgdao_conf::SINGLE_DB_TAG;

/// Time a single health-check ping may take
pub const HEALTH_CHECK_BUDGET: Duration = Duration::from_secs(30);

impl ConnectionRegistry {
	/// Verify the connection registered under `tag`, re-dialing it if needed
	///
	/// Checks on the same tag are serialized. A live connection is pinged
	/// within the health-check budget. When the ping fails, or the previous
	/// check left the tag broken, the stale client is closed and a new one
	/// is dialed with the stored URI and the current pool settings. A failed
	/// re-dial leaves the tag broken and returns [`Error::Connection`].
	pub async fn check(&self, tag: &str) -> Result<()> {
		self.check_connection(tag).await.map(|_| ())
	}

	pub(crate) async fn check_connection(&self, tag: &str) -> Result<Arc<Connection>> {
		let entry = self
			.entry(tag)
			.ok_or_else(|| Error::Connection(format!("{} mongodb connection is not registered", tag)))?;
		let _guard = entry.check_lock.lock().await;

		if let Some(connection) = entry.live() {
			let pinged = tokio::time::timeout(self.health_check_budget, connection.client().ping())
				.await
				.unwrap_or_else(|_| {
					Err(Error::Timeout(format!(
						"no reply to ping within {:?}",
						self.health_check_budget
					)))
				});
			match pinged {
				Ok(()) => return Ok(connection),
				Err(e) => tracing::warn!("{} mongodb ping failed: {}", tag, e),
			}

			// Nobody picks up the stale client once it is swapped out
			if let Some(stale) = entry.mark_broken() {
				stale.client().close().await;
			}
		}

		let client = match self
			.store
			.dial(&entry.target.uri, &self.pool_settings())
			.await
		{
			Ok(client) => client,
			Err(e) => {
				tracing::error!("{} mongodb connection error: {}", tag, e);
				return Err(Error::Connection(e.to_string()));
			}
		};

		if !self.holds(tag, &entry) {
			client.close().await;
			return Err(Error::Connection(format!(
				"{} mongodb connection was closed",
				tag
			)));
		}

		let connection = Arc::new(Connection::new(&entry.target, client));
		entry.install(connection.clone());
		tracing::info!("{} mongodb reconnected", tag);
		Ok(connection)
	}

	/// Check every registered connection
	///
	/// Initializes the registry first when nothing is registered. In
	/// multi-database mode every tag is checked even after a failure; each
	/// failure is logged and the last one is returned.
	pub async fn check_all(&self) -> Result<()> {
		if self.is_empty() {
			self.initialize().await?;
		}

		if !self.is_multi_db() {
			if self.entry(SINGLE_DB_TAG).is_none() {
				return Err(Error::Connection("mongodb connection failed".to_string()));
			}
			return self.check(SINGLE_DB_TAG).await;
		}

		let mut last = Ok(());
		for tag in self.list_tags() {
			if let Err(e) = self.check(&tag).await {
				tracing::error!("{} connection check failed: {}", tag, e);
				last = Err(e);
			}
		}
		last
	}
}
