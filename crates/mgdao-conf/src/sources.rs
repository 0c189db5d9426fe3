//! Configuration sources for the settings map
//!
//! Every source produces a flat map of dotted keys (`go.data.mongodb.uri`)
//! to JSON values. Sources are merged in priority order by
//! [`Settings::from_sources`](crate::settings::Settings::from_sources).

use super::error::{ConfigError, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Flatten a nested JSON object into dotted keys.
///
/// Arrays and scalars are leaves; only objects are descended into.
pub fn flatten(value: &Value) -> Result<IndexMap<String, Value>> {
	let map = value
		.as_object()
		.ok_or_else(|| ConfigError::Parse("Expected mapping at root".to_string()))?;

	let mut out = IndexMap::new();
	for (key, child) in map {
		flatten_into(key, child, &mut out);
	}
	Ok(out)
}

fn flatten_into(path: &str, value: &Value, out: &mut IndexMap<String, Value>) {
	match value {
		Value::Object(map) if !map.is_empty() => {
			for (key, child) in map {
				flatten_into(&format!("{}.{}", path, key), child, out);
			}
		}
		other => {
			out.insert(path.to_string(), other.clone());
		}
	}
}

/// Parse YAML text into a flat settings map
pub fn parse_yaml(text: &str) -> Result<IndexMap<String, Value>> {
	if text.trim().is_empty() {
		return Ok(IndexMap::new());
	}

	let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
	let json = serde_json::to_value(yaml)?;
	flatten(&json)
}

/// In-memory YAML document source
pub struct YamlSource {
	text: String,
}

impl YamlSource {
	/// Create a source from YAML text
	///
	/// # Examples
	///
	/// ```
	/// use mgdao_conf::sources::{ConfigSource, YamlSource};
	///
	/// let source = YamlSource::new("mongodb:\n  uri: mongodb://localhost:27017\n");
	/// let map = source.load().unwrap();
	/// assert!(map.contains_key("mongodb.uri"));
	/// ```
	pub fn new(text: impl Into<String>) -> Self {
		Self { text: text.into() }
	}
}

impl ConfigSource for YamlSource {
	fn load(&self) -> Result<IndexMap<String, Value>> {
		parse_yaml(&self.text)
	}

	fn priority(&self) -> u8 {
		60
	}

	fn description(&self) -> String {
		"YAML document".to_string()
	}
}

/// YAML file configuration source
pub struct YamlFileSource {
	path: PathBuf,
}

impl YamlFileSource {
	/// Create a new YAML file configuration source
	///
	/// # Examples
	///
	/// ```
	/// use mgdao_conf::sources::YamlFileSource;
	/// use std::path::PathBuf;
	///
	/// let source = YamlFileSource::new(PathBuf::from("mongo.yaml"));
	/// ```
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for YamlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>> {
		if !self.path.exists() {
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		parse_yaml(&content)
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("YAML file: {}", self.path.display())
	}
}

/// Default values configuration source
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	/// Create a new default values configuration source
	///
	/// # Examples
	///
	/// ```
	/// use mgdao_conf::sources::DefaultSource;
	/// use serde_json::Value;
	///
	/// let source = DefaultSource::new()
	///     .with_value("go.data.mongodb.multidb", Value::Bool(false));
	/// ```
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	/// Add a default value for a dotted configuration key
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0 // Lowest priority
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}
