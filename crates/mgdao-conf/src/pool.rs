//! Connection pool sizing
//!
//! [`PoolSettings`] is resolved once per registry from the `mongo_pool.*`
//! keys and shared by every dialed connection.

use super::settings::Settings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
/// Unset max pool size is this multiple of the min pool size
pub const MAX_CONNECTIONS_FACTOR: u32 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 60;

/// Pool values as they appear in configuration; zero means unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPoolConfig {
	#[serde(default)]
	pub min: u64,
	#[serde(default)]
	pub max: u64,
	#[serde(default)]
	pub idle: u64,
	#[serde(default)]
	pub timeout: u64,
}

impl RawPoolConfig {
	/// Read `mongo_pool.{min,max,idle,timeout}`; negative values count as unset
	pub fn from_settings(settings: &Settings) -> Self {
		let read = |key: &str| {
			settings
				.get_i64(&format!("mongo_pool.{}", key))
				.and_then(|v| u64::try_from(v).ok())
				.unwrap_or(0)
		};

		Self {
			min: read("min"),
			max: read("max"),
			idle: read("idle"),
			timeout: read("timeout"),
		}
	}
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
	pub min_connections: u32,
	pub max_connections: u32,
	pub idle_timeout_secs: u64,
	pub socket_timeout_secs: u64,
}

impl Default for PoolSettings {
	fn default() -> Self {
		Self::resolve(&RawPoolConfig::default())
	}
}

impl PoolSettings {
	/// Apply defaults to raw configuration values
	///
	/// An unset max is derived from the resolved min, and an explicit max
	/// below min is raised to min.
	///
	/// # Examples
	///
	/// ```rust
	/// use mgdao_conf::pool::{PoolSettings, RawPoolConfig};
	///
	/// let pool = PoolSettings::resolve(&RawPoolConfig { min: 3, ..Default::default() });
	/// assert_eq!(pool.min_connections, 3);
	/// assert_eq!(pool.max_connections, 30);
	/// assert_eq!(pool.idle_timeout_secs, 300);
	/// assert_eq!(pool.socket_timeout_secs, 60);
	/// ```
	pub fn resolve(raw: &RawPoolConfig) -> Self {
		let min_connections = match raw.min {
			0 => DEFAULT_MIN_CONNECTIONS,
			n => saturate(n),
		};
		let max_connections = match raw.max {
			0 => min_connections.saturating_mul(MAX_CONNECTIONS_FACTOR),
			n => saturate(n).max(min_connections),
		};

		Self {
			min_connections,
			max_connections,
			idle_timeout_secs: non_zero_or(raw.idle, DEFAULT_IDLE_TIMEOUT_SECS),
			socket_timeout_secs: non_zero_or(raw.timeout, DEFAULT_SOCKET_TIMEOUT_SECS),
		}
	}

	pub fn from_settings(settings: &Settings) -> Self {
		Self::resolve(&RawPoolConfig::from_settings(settings))
	}

	pub fn with_min_connections(mut self, min: u32) -> Self {
		self.min_connections = min;
		self
	}

	pub fn with_max_connections(mut self, max: u32) -> Self {
		self.max_connections = max;
		self
	}

	pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
		self.idle_timeout_secs = timeout.as_secs();
		self
	}

	pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
		self.socket_timeout_secs = timeout.as_secs();
		self
	}

	pub fn idle_timeout(&self) -> Duration {
		Duration::from_secs(self.idle_timeout_secs)
	}

	pub fn socket_timeout(&self) -> Duration {
		Duration::from_secs(self.socket_timeout_secs)
	}

	pub fn validate(&self) -> Result<(), String> {
		if self.max_connections < self.min_connections {
			return Err("max_connections must be >= min_connections".to_string());
		}
		Ok(())
	}
}

fn saturate(value: u64) -> u32 {
	u32::try_from(value).unwrap_or(u32::MAX)
}

fn non_zero_or(value: u64, default: u64) -> u64 {
	if value == 0 { default } else { value }
}
