//! Settings fetched over HTTP

use super::error::{ConfigError, Result};
use super::settings::{DEFAULT_PREFIX, Settings};
use std::time::Duration;

/// YAML settings document served from a URL
#[derive(Debug, Clone)]
pub struct RemoteYamlSource {
	url: String,
	prefix: String,
	timeout: Duration,
}

impl RemoteYamlSource {
	/// Create a remote source for `url`
	///
	/// # Examples
	///
	/// ```
	/// use mgdao_conf::remote::RemoteYamlSource;
	///
	/// let source = RemoteYamlSource::new("http://config.internal/mongo.yaml")
	///     .with_prefix("app.data");
	/// assert_eq!(source.url(), "http://config.internal/mongo.yaml");
	/// ```
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			prefix: DEFAULT_PREFIX.to_string(),
			timeout: Duration::from_secs(30),
		}
	}

	/// Key namespace applied to the fetched settings
	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	/// Download and parse the document
	pub async fn fetch(&self) -> Result<Settings> {
		if self.url.is_empty() {
			return Err(ConfigError::Missing("configuration url is empty".to_string()));
		}

		let client = reqwest::Client::builder()
			.timeout(self.timeout)
			.build()
			.map_err(|e| ConfigError::Fetch(format!("Failed to create client: {}", e)))?;

		let response = client
			.get(&self.url)
			.send()
			.await
			.map_err(|e| ConfigError::Fetch(format!("Request failed: {}", e)))?;

		if !response.status().is_success() {
			return Err(ConfigError::Fetch(format!(
				"{} returned status {}",
				self.url,
				response.status()
			)));
		}

		let body = response
			.text()
			.await
			.map_err(|e| ConfigError::Fetch(format!("Failed to read body: {}", e)))?;

		Ok(Settings::from_yaml(&body)?.with_prefix(self.prefix.clone()))
	}
}
