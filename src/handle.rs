//! A keychain bound to one path and a remembered password

use std::path::Path;

use zeroize::Zeroizing;

use crate::error::{KeychainError, Result};
use crate::path::KeychainPath;
use crate::runner::{CommandRunner, ExitCode};
use crate::security::Security;

/// Handle to one keychain file.
///
/// Methods delegate to [`Security`] with the bound path, and with the
/// remembered password wherever no explicit one is given. Dropping the
/// handle leaves the keychain as it is: nothing is locked or deleted.
///
/// # Example
/// ```no_run
/// # async fn run() -> keychain_automation::Result<()> {
/// use keychain_automation::{KeychainFile, Security};
///
/// let security = Security::new();
/// let mut keychain = KeychainFile::open(&security, "build", Some("pw")).await?;
/// keychain.unlock(None).await?;
/// keychain.change_password("pw", "rotated").await?;
/// # Ok(())
/// # }
/// ```
pub struct KeychainFile<'s, R: CommandRunner> {
    security: &'s Security<R>,
    path: KeychainPath,
    password: Option<Zeroizing<String>>,
}

impl<'s, R: CommandRunner> KeychainFile<'s, R> {
    /// Bind a keychain name or path without touching the filesystem
    pub fn new(security: &'s Security<R>, keychain: &str, password: Option<&str>) -> Self {
        Self {
            security,
            path: security.resolve(keychain),
            password: password.map(|p| Zeroizing::new(p.to_string())),
        }
    }

    /// Bind an existing keychain file
    ///
    /// Fails with [`KeychainError::KeychainNotFound`] if the resolved path
    /// does not exist.
    pub async fn open(
        security: &'s Security<R>,
        keychain: &str,
        password: Option<&str>,
    ) -> Result<Self> {
        let handle = Self::new(security, keychain, password);
        if !tokio::fs::try_exists(handle.path.as_path()).await? {
            return Err(KeychainError::KeychainNotFound(
                handle.path.as_path().to_path_buf(),
            ));
        }
        Ok(handle)
    }

    #[must_use]
    pub fn path(&self) -> &KeychainPath {
        &self.path
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.path.file_name()
    }

    pub fn set_password(&mut self, password: &str) {
        self.password = Some(Zeroizing::new(password.to_string()));
    }

    fn password_or<'a>(&'a self, password: Option<&'a str>) -> Option<&'a str> {
        password.or_else(|| self.password.as_deref().map(String::as_str))
    }

    /// Change the password, remembering the new one only if the tool succeeds
    pub async fn change_password(
        &mut self,
        old_password: &str,
        new_password: &str,
    ) -> Result<ExitCode> {
        let code = self
            .security
            .change_password(&self.path, old_password, new_password)
            .await?;
        if code.is_success() {
            self.set_password(new_password);
        }
        Ok(code)
    }

    pub async fn lock(&self) -> Result<ExitCode> {
        self.security.lock(Some(&self.path)).await
    }

    /// Unlock with `password`, falling back to the remembered one
    pub async fn unlock(&self, password: Option<&str>) -> Result<ExitCode> {
        self.security
            .unlock(Some(&self.path), self.password_or(password))
            .await
    }

    pub async fn set_timeout(&self, seconds: u32) -> Result<ExitCode> {
        self.security.set_timeout(&self.path, seconds).await
    }

    pub async fn set_default(&self) -> Result<ExitCode> {
        self.security.set_default_keychain(&self.path).await
    }

    pub async fn set_login(&self) -> Result<ExitCode> {
        self.security.set_login_keychain(&self.path).await
    }

    /// Make this keychain the only entry of the search list
    pub async fn set_list(&self) -> Result<ExitCode> {
        self.security.set_list_keychain(&self.path).await
    }

    pub async fn import_certificate(&self, certificate: &Path, passphrase: &str) -> Result<ExitCode> {
        self.security
            .import_certificate(&self.path, certificate, passphrase)
            .await
    }

    pub async fn allow_access_for_apple_tools(&self, password: Option<&str>) -> Result<ExitCode> {
        let password = self
            .password_or(password)
            .ok_or(KeychainError::PasswordRequired("set-key-partition-list"))?;
        self.security
            .allow_access_for_apple_tools(&self.path, password)
            .await
    }

    pub async fn find_generic_password(&self, service: &str) -> Result<ExitCode> {
        self.security
            .find_generic_password(service, Some(&self.path))
            .await
    }

    pub async fn show_code_signing(&self) -> Result<ExitCode> {
        self.security.show_code_signing(Some(&self.path)).await
    }
}
