//! # mgdao configuration
//!
//! Loads the settings document that describes which MongoDB databases to
//! connect to and how large their pools should be.
//!
//! ## Keys
//!
//! All keys live under a namespace (`go.data` by default):
//!
//! - `mongo_pool.min`, `mongo_pool.max`, `mongo_pool.idle`, `mongo_pool.timeout`
//! - `mongodb.multidb` (bool), `mongodb.dbNames` (comma-separated)
//! - `mongodb.{name}.uri`, `mongodb.{name}.db` in multi-database mode
//! - `mongodb.uri`, `mongodb.db` in single-database mode
//!
//! ## Example
//!
//! ```rust
//! use mgdao_conf::{MongoConfig, Settings};
//!
//! let settings = Settings::from_yaml(r#"
//! go:
//!   data:
//!     mongodb:
//!       uri: mongodb://localhost:27017
//!       db: app
//! "#).unwrap();
//!
//! let config = MongoConfig::from_settings(&settings);
//! assert_eq!(config.targets[0].tag, "0");
//! assert_eq!(config.pool.max_connections, 10);
//! ```

pub mod error;
pub mod mongo;
pub mod pool;
#[cfg(feature = "remote")]
pub mod remote;
pub mod settings;
pub mod sources;

pub use error::{ConfigError, Result};
pub use mongo::{DatabaseTarget, MongoConfig, SINGLE_DB_TAG};
pub use pool::{PoolSettings, RawPoolConfig};
#[cfg(feature = "remote")]
pub use remote::RemoteYamlSource;
pub use settings::{DEFAULT_PREFIX, Settings};
pub use sources::{ConfigSource, DefaultSource, YamlFileSource, YamlSource};
