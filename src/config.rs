//! Configuration for keychain automation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KeychainError, Result};

/// Executable wrapped by every operation
pub const SECURITY_PROGRAM: &str = "security";

/// Seed name for the per-user login keychain
pub const DEFAULT_LOGIN_KEYCHAIN: &str = "login.keychain-db";

/// Preference domain passed to `default-keychain`, `login-keychain` and `list-keychains`
pub const DEFAULT_DOMAIN: &str = "user";

/// Partition list granted by `set-key-partition-list`
pub const DEFAULT_PARTITION_LIST: &str = "apple-tool:,apple:";

/// Applications trusted to use imported keys without prompting
pub const DEFAULT_TRUSTED_APPS: [&str; 2] = ["/usr/bin/codesign", "/usr/bin/security"];

/// Settings shared by the command facade and the CLI.
///
/// Every field has a default, so an empty TOML file is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeychainConfig {
    /// Program invoked for every operation
    pub program: String,

    /// Overrides the home directory used to resolve bare keychain names
    pub home_dir: Option<PathBuf>,

    /// Seed name resolved by `login_keychain_path`
    pub login_keychain: String,

    /// Value passed with `-d` to the search-list verbs
    pub domain: String,

    /// `-T` entries for certificate import
    pub trusted_apps: Vec<String>,

    /// `-S` value for `set-key-partition-list`
    pub partition_list: String,
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self {
            program: SECURITY_PROGRAM.to_string(),
            home_dir: None,
            login_keychain: DEFAULT_LOGIN_KEYCHAIN.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            trusted_apps: DEFAULT_TRUSTED_APPS.iter().map(ToString::to_string).collect(),
            partition_list: DEFAULT_PARTITION_LIST.to_string(),
        }
    }
}

impl KeychainConfig {
    /// Load a config from a TOML file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(KeychainError::InvalidConfig(
                "program must not be empty".to_string(),
            ));
        }
        if self.domain.trim().is_empty() {
            return Err(KeychainError::InvalidConfig(
                "domain must not be empty".to_string(),
            ));
        }
        if self.login_keychain.trim().is_empty() {
            return Err(KeychainError::InvalidConfig(
                "login_keychain must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
