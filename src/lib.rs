//! Keychain lifecycle automation over the macOS `security` tool
//!
//! Creates, locks, unlocks and deletes keychains, manages the per-user
//! default/login/search-list roles, imports PKCS#12 certificates and
//! queries code-signing identities. Every operation is one invocation of
//! `security`; keychain storage and access control stay with the tool.
//!
//! # Module Organization
//!
//! - `path` - keychain name/path resolution
//! - `runner` - subprocess boundary (`CommandRunner`, `SecurityRunner`)
//! - `security` - the command facade, one method per keychain task
//! - `handle` - `KeychainFile`, a keychain bound to a path and password
//! - `output` - parsers for the tool's line-oriented output
//! - `config` - TOML configuration
//! - `prompts` - colored CLI output macros

pub mod config;
pub mod error;
pub mod handle;
pub mod output;
pub mod path;

#[macro_use]
pub mod prompts;

pub mod runner;
pub mod security;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use config::KeychainConfig;
pub use error::{KeychainError, Result};
pub use handle::KeychainFile;
pub use output::{KeychainList, SigningIdentity};
pub use path::{HomeDir, KeychainPath, KeychainPathResolver};
pub use runner::{CommandOutput, CommandRunner, ExitCode, Invocation, SecurityRunner};
pub use security::{KeychainRole, Security};
