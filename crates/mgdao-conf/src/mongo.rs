//! Database targets described by the `mongodb.*` keys

use super::pool::PoolSettings;
use super::settings::Settings;

/// Tag used for the only connection in single-database mode
pub const SINGLE_DB_TAG: &str = "0";

/// One database the registry should dial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
	pub tag: String,
	pub uri: String,
	pub database: String,
}

/// Everything the registry needs to open its connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
	pub multi_db: bool,
	pub targets: Vec<DatabaseTarget>,
	pub pool: PoolSettings,
}

impl MongoConfig {
	/// Interpret settings
	///
	/// Multi-database mode keeps every non-empty name from `mongodb.dbNames`
	/// that has a `mongodb.{name}.uri` key, in list order. Single mode always
	/// yields exactly one target tagged [`SINGLE_DB_TAG`], even when the URI
	/// is blank; dialing it is what fails.
	///
	/// # Examples
	///
	/// ```
	/// use mgdao_conf::mongo::MongoConfig;
	/// use mgdao_conf::settings::Settings;
	///
	/// let settings = Settings::from_yaml(r#"
	/// go:
	///   data:
	///     mongodb:
	///       multidb: true
	///       dbNames: orders,users
	///       orders: { uri: "mongodb://a:27017", db: shop }
	///       users: { uri: "mongodb://b:27017", db: accounts }
	/// "#).unwrap();
	///
	/// let config = MongoConfig::from_settings(&settings);
	/// assert!(config.multi_db);
	/// assert_eq!(config.targets[1].database, "accounts");
	/// ```
	pub fn from_settings(settings: &Settings) -> Self {
		let multi_db = settings.get_bool("mongodb.multidb");
		let pool = PoolSettings::from_settings(settings);

		let targets = if multi_db {
			let mut targets: Vec<DatabaseTarget> = Vec::new();
			for name in settings.get_list("mongodb.dbNames") {
				if name.is_empty() || targets.iter().any(|t| t.tag == name) {
					continue;
				}
				let uri_key = format!("mongodb.{}.uri", name);
				if !settings.exists(&uri_key) {
					tracing::warn!("mongodb database {} has no uri configured, skipping", name);
					continue;
				}
				targets.push(DatabaseTarget {
					uri: settings.get_string(&uri_key),
					database: settings.get_string(&format!("mongodb.{}.db", name)),
					tag: name,
				});
			}
			targets
		} else {
			vec![DatabaseTarget {
				tag: SINGLE_DB_TAG.to_string(),
				uri: settings.get_string("mongodb.uri"),
				database: settings.get_string("mongodb.db"),
			}]
		};

		Self {
			multi_db,
			targets,
			pool,
		}
	}
}
