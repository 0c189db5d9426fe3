//! Flattened settings map with typed, prefix-aware accessors

use super::error::Result;
use super::sources::{ConfigSource, parse_yaml};
use indexmap::IndexMap;
use serde_json::Value;

/// Namespace all database keys live under unless overridden
pub const DEFAULT_PREFIX: &str = "go.data";

/// Parsed settings
///
/// Keys are stored fully qualified (`go.data.mongodb.uri`); accessors take
/// keys relative to the configured prefix (`mongodb.uri`). Missing or
/// mistyped values read as zero/empty, never as errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
	values: IndexMap<String, Value>,
	prefix: String,
}

impl Default for Settings {
	fn default() -> Self {
		Self::new(IndexMap::new())
	}
}

impl Settings {
	/// Wrap an already flattened map
	pub fn new(values: IndexMap<String, Value>) -> Self {
		Self {
			values,
			prefix: DEFAULT_PREFIX.to_string(),
		}
	}

	/// Parse YAML text
	///
	/// # Examples
	///
	/// ```
	/// use mgdao_conf::settings::Settings;
	///
	/// let settings = Settings::from_yaml("go:\n  data:\n    mongodb:\n      db: app\n").unwrap();
	/// assert_eq!(settings.get_string("mongodb.db"), "app");
	/// ```
	pub fn from_yaml(text: &str) -> Result<Self> {
		Ok(Self::new(parse_yaml(text)?))
	}

	/// Merge sources, higher priority sources overriding lower ones
	pub fn from_sources(sources: &[&dyn ConfigSource]) -> Result<Self> {
		let mut ordered: Vec<&&dyn ConfigSource> = sources.iter().collect();
		ordered.sort_by_key(|source| source.priority());

		let mut values = IndexMap::new();
		for source in ordered {
			tracing::debug!("loading settings from {}", source.description());
			values.extend(source.load()?);
		}
		Ok(Self::new(values))
	}

	/// Use a different key namespace; an empty prefix means top-level keys
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	fn qualify(&self, key: &str) -> String {
		if self.prefix.is_empty() {
			key.to_string()
		} else {
			format!("{}.{}", self.prefix, key)
		}
	}

	/// Raw value for a relative key
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(&self.qualify(key))
	}

	/// Whether a key is set, either as a leaf or as a parent of other keys
	pub fn exists(&self, key: &str) -> bool {
		let full = self.qualify(key);
		if self.values.contains_key(&full) {
			return true;
		}
		let parent = format!("{}.", full);
		self.values.keys().any(|k| k.starts_with(&parent))
	}

	/// Integer value; numeric strings are parsed, floats truncated
	pub fn get_i64(&self, key: &str) -> Option<i64> {
		match self.get(key)? {
			Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
			Value::String(s) => s.trim().parse().ok(),
			Value::Bool(b) => Some(i64::from(*b)),
			_ => None,
		}
	}

	/// Boolean value; `"true"`, `"1"`, `"yes"`, `"on"` and non-zero numbers are true
	pub fn get_bool(&self, key: &str) -> bool {
		match self.get(key) {
			Some(Value::Bool(b)) => *b,
			Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
			Some(Value::String(s)) => matches!(
				s.trim().to_lowercase().as_str(),
				"true" | "1" | "yes" | "on"
			),
			_ => false,
		}
	}

	/// String value; scalars are stringified, anything else reads as empty
	pub fn get_string(&self, key: &str) -> String {
		match self.get(key) {
			Some(Value::String(s)) => s.clone(),
			Some(Value::Number(n)) => n.to_string(),
			Some(Value::Bool(b)) => b.to_string(),
			_ => String::new(),
		}
	}

	/// List value from either a comma-separated string or a sequence
	pub fn get_list(&self, key: &str) -> Vec<String> {
		match self.get(key) {
			Some(Value::String(s)) => s.split(',').map(|part| part.trim().to_string()).collect(),
			Some(Value::Array(items)) => items
				.iter()
				.map(|item| match item {
					Value::String(s) => s.trim().to_string(),
					other => other.to_string(),
				})
				.collect(),
			_ => Vec::new(),
		}
	}
}
