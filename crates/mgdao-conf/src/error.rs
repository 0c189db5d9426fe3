//! Configuration error types

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or interpreting settings
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Fetch error: {0}")]
	Fetch(String),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("YAML error: {0}")]
	Yaml(#[from] serde_yaml::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Missing setting: {0}")]
	Missing(String),

	#[error("Invalid setting: {0}")]
	Invalid(String),
}
