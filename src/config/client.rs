use super::{fallback_table, ConfigCache, FallbackTable, ModelConfiguration};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration source unavailable: {0}")]
    Unavailable(String),
    #[error("configuration request for '{name}' failed: {reason}")]
    Request { name: String, reason: String },
    #[error("configuration service answered {status} for '{name}'")]
    Status { name: String, status: u16 },
    #[error("configuration for '{name}' is malformed: {reason}")]
    Malformed { name: String, reason: String },
    #[error("no configuration exists for model '{0}'")]
    NotFound(String),
}

/// Remote provider of model configurations.
///
/// `Ok(None)` means the provider answered and does not know the model.
pub trait ConfigSource: Send + Sync + 'static {
    fn fetch_configuration(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<ModelConfiguration>, ConfigError>> + Send;

    fn fetch_candidate_paths(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Vec<String>>, ConfigError>> + Send;
}

/// Configuration provider reached over HTTP.
///
/// `GET {endpoint}/models/{name}` returns a configuration document and
/// `GET {endpoint}/models/{name}/paths` its candidate path list. Without an
/// endpoint every lookup reports [`ConfigError::Unavailable`].
#[derive(Clone)]
pub struct HttpConfigSource {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpConfigSource {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ConfigError::Unavailable(err.to_string()))?;
        let endpoint = endpoint
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Ok(Self { client, endpoint })
    }

    /// A source with no endpoint; every lookup falls through to the static table.
    pub fn offline() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: None,
        }
    }

    fn endpoint(&self) -> Result<&str, ConfigError> {
        self.endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::Unavailable("no configuration endpoint set".to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
        url: String,
    ) -> Result<Option<T>, ConfigError> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| ConfigError::Request {
                name: name.to_string(),
                reason: err.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ConfigError::Status {
                name: name.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|err| ConfigError::Request {
            name: name.to_string(),
            reason: err.to_string(),
        })?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|err| ConfigError::Malformed {
                name: name.to_string(),
                reason: err.to_string(),
            })
    }
}

impl ConfigSource for HttpConfigSource {
    async fn fetch_configuration(
        &self,
        name: &str,
    ) -> Result<Option<ModelConfiguration>, ConfigError> {
        let url = format!("{}/models/{}", self.endpoint()?, name);
        self.get_json(name, url).await
    }

    async fn fetch_candidate_paths(&self, name: &str) -> Result<Option<Vec<String>>, ConfigError> {
        let url = format!("{}/models/{}/paths", self.endpoint()?, name);
        self.get_json(name, url).await
    }
}

/// Where a resolved configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    Cache,
    Remote,
    Fallback,
    Generated,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfiguration {
    pub config: Arc<ModelConfiguration>,
    pub origin: ConfigOrigin,
}

/// Resolves model configurations: cache, then remote, then the static table.
pub struct ConfigClient<S> {
    source: S,
    cache: Option<Arc<ConfigCache>>,
    fallback: &'static FallbackTable,
    generate_default_on_miss: bool,
}

impl<S: ConfigSource> ConfigClient<S> {
    /// Client without a cache, suitable for one-shot batch resolution.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: None,
            fallback: fallback_table(),
            generate_default_on_miss: false,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ConfigCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Opt into a generated configuration for names no source knows.
    pub fn with_generated_default(mut self, enabled: bool) -> Self {
        self.generate_default_on_miss = enabled;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn resolve_configuration(
        &self,
        name: &str,
    ) -> Result<ResolvedConfiguration, ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::NotFound(String::new()));
        }

        if let Some(config) = self.cache.as_ref().and_then(|cache| cache.get(name)) {
            log::debug!("Configuration for '{}' served from cache", name);
            return Ok(ResolvedConfiguration {
                config,
                origin: ConfigOrigin::Cache,
            });
        }

        match self.fetch_remote(name).await {
            Ok(config) => {
                let config = Arc::new(config);
                if let Some(cache) = &self.cache {
                    cache.insert(name, config.clone());
                }
                log::info!("Configuration for '{}' resolved remotely", name);
                return Ok(ResolvedConfiguration {
                    config,
                    origin: ConfigOrigin::Remote,
                });
            }
            Err(err) => {
                log::warn!("Remote configuration lookup failed: {}; trying static table", err);
            }
        }

        if let Some(config) = self.fallback.get(name) {
            log::info!("Configuration for '{}' resolved from static table", name);
            return Ok(ResolvedConfiguration {
                config,
                origin: ConfigOrigin::Fallback,
            });
        }

        if self.generate_default_on_miss {
            log::warn!(
                "No configuration for '{}'; using a generated default as last resort",
                name
            );
            return Ok(ResolvedConfiguration {
                config: Arc::new(ModelConfiguration::generated_default(name)),
                origin: ConfigOrigin::Generated,
            });
        }

        Err(ConfigError::NotFound(name.to_string()))
    }

    /// Candidate asset paths for `name`, remote first, then whatever the
    /// resolved configuration lists.
    pub async fn resolve_candidate_paths(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        let name = name.trim();
        match self.source.fetch_candidate_paths(name).await {
            Ok(Some(paths)) if !paths.is_empty() => return Ok(paths),
            Ok(_) => log::debug!("Remote has no candidate paths for '{}'", name),
            Err(err) => log::warn!("Remote candidate path lookup failed: {}", err),
        }
        let resolved = self.resolve_configuration(name).await?;
        Ok(resolved.config.candidate_paths.clone())
    }

    async fn fetch_remote(&self, name: &str) -> Result<ModelConfiguration, ConfigError> {
        let config = self
            .source
            .fetch_configuration(name)
            .await?
            .ok_or_else(|| ConfigError::NotFound(name.to_string()))?;
        config.validate().map_err(|reason| ConfigError::Malformed {
            name: name.to_string(),
            reason,
        })?;
        Ok(config)
    }
}
