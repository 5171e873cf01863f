//! Keychain path resolution
//!
//! Bare keychain names (no `/`) live in `<home>/Library/Keychains`. Any
//! path without an extension gets the `.keychain-db` extension appended.
//! Anything that already carries a directory component is passed through
//! untouched apart from that extension rule.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{DEFAULT_LOGIN_KEYCHAIN, KeychainConfig};

/// Extension appended to keychain names that have none
pub const KEYCHAIN_EXTENSION: &str = "keychain-db";

/// Per-user keychain directory, relative to the home directory
pub const KEYCHAINS_DIR: &str = "Library/Keychains";

/// Path to a keychain file.
///
/// Values produced by [`KeychainPathResolver::resolve`] always carry a
/// directory component and an extension. Paths reported back by the
/// `security` tool are wrapped as-is via `From<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeychainPath(String);

impl KeychainPath {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Final path component, e.g. `login.keychain-db`
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.as_path()
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or(&self.0)
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for KeychainPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for KeychainPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl From<&str> for KeychainPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl AsRef<str> for KeychainPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<OsStr> for KeychainPath {
    fn as_ref(&self) -> &OsStr {
        OsStr::new(&self.0)
    }
}

impl AsRef<Path> for KeychainPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

/// Home directory provider for path resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeDir(Option<PathBuf>);

impl HomeDir {
    /// Look up the calling user's home directory
    ///
    /// An unavailable home directory is kept as `None`; resolution then
    /// produces `/Library/Keychains/<name>` (empty home segment).
    #[must_use]
    pub fn from_env() -> Self {
        let home = dirs::home_dir();
        if home.is_none() {
            tracing::warn!("home directory unavailable, keychain names resolve under /Library/Keychains");
        }
        Self(home)
    }

    #[must_use]
    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self(Some(path.into()))
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.0.as_deref()
    }

    /// Home directory as a string prefix without trailing separator
    fn prefix(&self) -> String {
        match &self.0 {
            Some(home) => home.to_string_lossy().trim_end_matches('/').to_string(),
            None => String::new(),
        }
    }
}

/// Turns keychain names or paths into keychain file paths.
#[derive(Debug, Clone)]
pub struct KeychainPathResolver {
    home: HomeDir,
    login_keychain: String,
}

impl KeychainPathResolver {
    #[must_use]
    pub fn new(home: HomeDir) -> Self {
        Self {
            home,
            login_keychain: DEFAULT_LOGIN_KEYCHAIN.to_string(),
        }
    }

    /// Resolver using the config's home override (or the environment) and login seed
    #[must_use]
    pub fn from_config(config: &KeychainConfig) -> Self {
        let home = match &config.home_dir {
            Some(path) => HomeDir::fixed(path),
            None => HomeDir::from_env(),
        };
        Self {
            home,
            login_keychain: config.login_keychain.clone(),
        }
    }

    #[must_use]
    pub fn home(&self) -> &HomeDir {
        &self.home
    }

    /// Resolve a keychain name or path
    ///
    /// - `build` -> `<home>/Library/Keychains/build.keychain-db`
    /// - `login.keychain` -> `<home>/Library/Keychains/login.keychain`
    /// - `/tmp/ci` -> `/tmp/ci.keychain-db`
    /// - `./ci.keychain` -> unchanged
    #[must_use]
    pub fn resolve(&self, name_or_path: &str) -> KeychainPath {
        let path = if name_or_path.contains('/') {
            name_or_path.to_string()
        } else {
            format!("{}/{KEYCHAINS_DIR}/{name_or_path}", self.home.prefix())
        };

        if Path::new(&path).extension().is_none() {
            KeychainPath(format!("{path}.{KEYCHAIN_EXTENSION}"))
        } else {
            KeychainPath(path)
        }
    }

    /// Path of the per-user login keychain
    #[must_use]
    pub fn login_keychain_path(&self) -> KeychainPath {
        self.resolve(&self.login_keychain)
    }
}

impl Default for KeychainPathResolver {
    fn default() -> Self {
        Self::new(HomeDir::from_env())
    }
}
