//! Secret store resolving names across providers, with caching.

use crate::providers::{SecretProvider, SecretValue};
use perfdag_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Configuration for the secret store.
#[derive(Debug, Clone)]
pub struct SecretStoreConfig {
    /// Cache TTL in seconds.
    pub cache_ttl_seconds: u64,
    /// Whether to mask secrets in rendered output.
    pub mask_output: bool,
}

impl Default for SecretStoreConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            mask_output: true,
        }
    }
}

struct CachedSecret {
    value: SecretValue,
    cached_at: std::time::Instant,
    /// Masked in rendered output; values only ever read with a default are not.
    sensitive: bool,
}

/// Resolves names against providers in registration order.
pub struct SecretStore {
    config: SecretStoreConfig,
    providers: Vec<Arc<dyn SecretProvider>>,
    cache: RwLock<HashMap<String, CachedSecret>>,
}

impl SecretStore {
    pub fn new(config: SecretStoreConfig) -> Self {
        Self {
            config,
            providers: Vec::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider consulted after every provider registered before it.
    pub fn register_provider(&mut self, provider: Arc<dyn SecretProvider>) {
        info!(provider = %provider.name(), "Registering secret provider");
        self.providers.push(provider);
    }

    /// Resolve a name; the first provider that knows it wins.
    pub async fn get(&self, name: &str) -> Result<String> {
        self.resolve(name, true).await
    }

    async fn resolve(&self, name: &str, sensitive: bool) -> Result<String> {
        {
            let mut cache = self.cache.write().await;
            if let Some(cached) = cache.get_mut(name)
                && cached.cached_at.elapsed().as_secs() < self.config.cache_ttl_seconds
            {
                debug!(name = %name, "Secret cache hit");
                cached.sensitive |= sensitive;
                return Ok(cached.value.value.clone());
            }
        }

        if self.providers.is_empty() {
            return Err(Error::SecretProviderNotConfigured(name.to_string()));
        }

        for provider in &self.providers {
            match provider.get(name).await {
                Ok(value) => {
                    debug!(name = %name, provider = value.provider, "Secret resolved");
                    let resolved = value.value.clone();
                    let mut cache = self.cache.write().await;
                    cache.insert(
                        name.to_string(),
                        CachedSecret {
                            value,
                            cached_at: std::time::Instant::now(),
                            sensitive,
                        },
                    );
                    return Ok(resolved);
                }
                Err(Error::SecretNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::SecretNotFound(name.to_string()))
    }

    /// Resolve a name holding JSON and deserialize it.
    pub async fn get_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let raw = self.get(name).await?;
        serde_json::from_str(&raw).map_err(|e| Error::InvalidValue {
            key: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Resolve a name, falling back to `default` when no provider has it.
    ///
    /// Such names are plain settings and stay visible in masked output.
    pub async fn get_or(&self, name: &str, default: &str) -> Result<String> {
        match self.resolve(name, false).await {
            Ok(value) => Ok(value),
            Err(Error::SecretNotFound(_)) => Ok(default.to_string()),
            Err(e) => Err(e),
        }
    }

    /// Replace every cached secret value in `input` with `***`.
    pub async fn mask_string(&self, input: &str) -> String {
        if !self.config.mask_output {
            return input.to_string();
        }

        let cache = self.cache.read().await;
        let mut output = input.to_string();

        for cached in cache.values().filter(|c| c.sensitive) {
            if cached.value.value.len() > 3 {
                output = output.replace(&cached.value.value, "***");
            }
        }

        output
    }

    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
        info!("Secret cache cleared");
    }

    pub async fn cache_size(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }
}

impl Default for SecretStore {
    fn default() -> Self {
        Self::new(SecretStoreConfig::default())
    }
}
