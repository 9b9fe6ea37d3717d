//! Named variables and secrets for perfdag.
//!
//! Workflow construction reads connection details and credentials by
//! name. Providers are consulted in registration order and a name no
//! provider knows aborts the build.

pub mod providers;
pub mod store;

pub use providers::{EnvProvider, FileProvider, SecretProvider, SecretValue};
pub use store::{SecretStore, SecretStoreConfig};
