//! Release descriptor.
//!
//! Describes the cluster a workflow targets. Supplied externally and
//! never mutated while a workflow is built.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment platform of a release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Platform {
    Aws,
    Azure,
    Gcp,
    Rosa,
    Openstack,
    Baremetal,
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::Aws => "aws",
            Platform::Azure => "azure",
            Platform::Gcp => "gcp",
            Platform::Rosa => "rosa",
            Platform::Openstack => "openstack",
            Platform::Baremetal => "baremetal",
            Platform::Other(name) => name,
        }
    }

    pub fn is_baremetal(&self) -> bool {
        matches!(self, Platform::Baremetal)
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "aws" => Platform::Aws,
            "azure" => Platform::Azure,
            "gcp" => Platform::Gcp,
            "rosa" => Platform::Rosa,
            "openstack" => Platform::Openstack,
            "baremetal" => Platform::Baremetal,
            _ => Platform::Other(value),
        }
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.as_str().to_string()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The release a workflow installs and benchmarks.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Release {
    #[schemars(with = "String")]
    pub platform: Platform,
    /// Major.minor only, e.g. `4.8`.
    pub version: String,
    /// Release stream to follow (nightly, ci, ...).
    pub release_stream: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Build identifier, baremetal installs only.
    #[serde(default)]
    pub build: Option<String>,
    /// Location of the matching `oc` client tarball.
    #[serde(default)]
    pub client_location: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
}

fn default_profile() -> String {
    "default".to_string()
}

impl Release {
    pub fn new(
        platform: Platform,
        version: impl Into<String>,
        release_stream: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            version: version.into(),
            release_stream: release_stream.into(),
            profile: default_profile(),
            build: None,
            client_location: None,
            variant: None,
        }
    }

    /// Name used for side-channel files and kubeconfig secrets.
    pub fn release_name(&self) -> String {
        match &self.variant {
            Some(variant) => format!(
                "{}-{}-{}-{}",
                self.version, self.platform, self.profile, variant
            ),
            None => format!("{}-{}-{}", self.version, self.platform, self.profile),
        }
    }
}
