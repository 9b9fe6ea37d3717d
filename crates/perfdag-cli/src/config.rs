//! CLI configuration management.

use perfdag_graph::DagSettings;
use perfdag_graph::context::{DEFAULT_DAGS_ROOT, DEFAULT_EXECUTOR_IMAGE, DEFAULT_INDEX_IMAGE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Root of the DAG checkout; scripts live under `scripts/`.
    #[serde(default = "default_dags_root")]
    pub dags_root: PathBuf,
    /// Directory of task variable files.
    #[serde(default = "default_vars_root")]
    pub vars_root: PathBuf,
    #[serde(default = "default_side_channel_dir")]
    pub side_channel_dir: PathBuf,
    /// JSON object of named variables and secrets.
    pub secrets_file: Option<PathBuf>,
    /// Prefix of environment variables holding named variables.
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
    #[serde(default = "default_executor_image")]
    pub executor_image: String,
    #[serde(default = "default_index_image")]
    pub index_image: String,
    #[serde(default)]
    pub output_format: OutputFormat,
}

fn default_dags_root() -> PathBuf {
    PathBuf::from(DEFAULT_DAGS_ROOT)
}

fn default_vars_root() -> PathBuf {
    default_dags_root().join("vars")
}

fn default_side_channel_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_env_prefix() -> String {
    "AIRFLOW_VAR".to_string()
}

fn default_executor_image() -> String {
    DEFAULT_EXECUTOR_IMAGE.to_string()
}

fn default_index_image() -> String {
    DEFAULT_INDEX_IMAGE.to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            dags_root: default_dags_root(),
            vars_root: default_vars_root(),
            side_channel_dir: default_side_channel_dir(),
            secrets_file: None,
            env_prefix: default_env_prefix(),
            executor_image: default_executor_image(),
            index_image: default_index_image(),
            output_format: OutputFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Tree,
    Json,
    Yaml,
}

impl CliConfig {
    /// Load configuration from file.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let dirs = directories::ProjectDirs::from("io", "perfdag", "perfdag")
            .ok_or("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "dags_root" => self.dags_root = PathBuf::from(value),
            "vars_root" => self.vars_root = PathBuf::from(value),
            "side_channel_dir" => self.side_channel_dir = PathBuf::from(value),
            "secrets_file" => {
                self.secrets_file = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "env_prefix" => self.env_prefix = value.to_string(),
            "executor_image" => self.executor_image = value.to_string(),
            "index_image" => self.index_image = value.to_string(),
            "output_format" => {
                self.output_format = match value {
                    "tree" => OutputFormat::Tree,
                    "json" => OutputFormat::Json,
                    "yaml" => OutputFormat::Yaml,
                    _ => return Err(format!("Invalid output format: {}", value)),
                };
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }

    pub fn dag_settings(&self) -> DagSettings {
        DagSettings {
            dags_root: self.dags_root.clone(),
            side_channel_dir: self.side_channel_dir.clone(),
            executor_image: self.executor_image.clone(),
            index_image: self.index_image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: CliConfig =
            serde_yaml::from_str("vars_root: /srv/vars\noutput_format: json\n").unwrap();
        assert_eq!(config.vars_root, PathBuf::from("/srv/vars"));
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.dags_root, PathBuf::from(DEFAULT_DAGS_ROOT));
        assert_eq!(config.env_prefix, "AIRFLOW_VAR");
        assert_eq!(config.secrets_file, None);
    }

    #[test]
    fn test_set_values() {
        let mut config = CliConfig::default();
        config.set("secrets_file", "/etc/perfdag/secrets.json").unwrap();
        config.set("output_format", "yaml").unwrap();
        config.set("side_channel_dir", "/var/tmp").unwrap();

        assert_eq!(
            config.secrets_file,
            Some(PathBuf::from("/etc/perfdag/secrets.json"))
        );
        assert_eq!(config.output_format, OutputFormat::Yaml);
        assert_eq!(
            config.dag_settings().side_channel_dir,
            PathBuf::from("/var/tmp")
        );

        config.set("secrets_file", "").unwrap();
        assert_eq!(config.secrets_file, None);
    }

    #[test]
    fn test_set_rejects_unknown() {
        let mut config = CliConfig::default();
        assert!(config.set("output_format", "table").is_err());
        assert!(config.set("api_url", "http://localhost").is_err());
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = CliConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: CliConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }
}
