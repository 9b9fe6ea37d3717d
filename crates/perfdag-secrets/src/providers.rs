//! Secret provider trait and implementations.

use async_trait::async_trait;
use perfdag_core::{Error, Result};
use std::collections::HashMap;

/// A resolved value and the provider that supplied it.
#[derive(Debug, Clone)]
pub struct SecretValue {
    pub value: String,
    pub provider: &'static str,
}

impl SecretValue {
    pub fn new(value: impl Into<String>, provider: &'static str) -> Self {
        Self {
            value: value.into(),
            provider,
        }
    }
}

/// Trait for secret providers.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Get a secret by name. Unknown names are `Error::SecretNotFound`.
    async fn get(&self, name: &str) -> Result<SecretValue>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Environment variable provider.
///
/// With prefix `AIRFLOW_VAR`, the variable `elasticsearch` is read from
/// `AIRFLOW_VAR_elasticsearch` or, failing that, `AIRFLOW_VAR_ELASTICSEARCH`.
pub struct EnvProvider {
    prefix: Option<String>,
}

impl EnvProvider {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    fn candidates(&self, name: &str) -> [String; 2] {
        let verbatim = match &self.prefix {
            Some(p) => format!("{}_{}", p, name),
            None => name.to_string(),
        };
        let upper = verbatim.to_ascii_uppercase();
        [verbatim, upper]
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.candidates(name)
            .iter()
            .find_map(|key| std::env::var(key).ok())
    }
}

impl Default for EnvProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl SecretProvider for EnvProvider {
    async fn get(&self, name: &str) -> Result<SecretValue> {
        self.lookup(name)
            .map(|value| SecretValue::new(value, self.name()))
            .ok_or_else(|| Error::SecretNotFound(name.to_string()))
    }

    fn name(&self) -> &'static str {
        "env"
    }
}

/// File-based provider: one JSON object of name to value.
///
/// Non-string values are kept as their JSON text so they can be read
/// back with [`crate::SecretStore::get_json`].
pub struct FileProvider {
    secrets: HashMap<String, String>,
}

impl FileProvider {
    pub fn from_map(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(content)
            .map_err(|e| Error::Internal(format!("Failed to parse secrets: {}", e)))?;

        let secrets = raw
            .into_iter()
            .map(|(name, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (name, text)
            })
            .collect();

        Ok(Self { secrets })
    }

    pub async fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Internal(format!("Failed to read secrets file: {}", e)))?;
        Self::from_json(&content)
    }
}

#[async_trait]
impl SecretProvider for FileProvider {
    async fn get(&self, name: &str) -> Result<SecretValue> {
        self.secrets
            .get(name)
            .map(|value| SecretValue::new(value.clone(), self.name()))
            .ok_or_else(|| Error::SecretNotFound(name.to_string()))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
