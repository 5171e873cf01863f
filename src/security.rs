//! Keychain operations over the `security` command-line tool
//!
//! [`Security`] has one method per keychain task. Each method builds the
//! argument vector, runs the tool once through its [`CommandRunner`] and
//! maps the result:
//!
//! - mutating and display operations return the tool's [`ExitCode`]; a
//!   non-zero code is a value, not an `Err`
//! - missing passwords fail with [`KeychainError::PasswordRequired`]
//!   before anything is spawned
//! - the lenient queries (`default_keychain`, `login_keychain`,
//!   `list_keychains`, `code_signing_output`) turn any failure into empty
//!   output; the `try_*` variants report it instead

use std::path::Path;

use crate::config::KeychainConfig;
use crate::error::{KeychainError, Result};
use crate::output::{KeychainList, SigningIdentity, parse_keychain_list, parse_signing_identities};
use crate::path::{KeychainPath, KeychainPathResolver};
use crate::runner::{CommandOutput, CommandRunner, ExitCode, Invocation, SecurityRunner};

/// Per-user keychain role managed by `default-keychain`, `login-keychain`
/// or `list-keychains`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeychainRole {
    Default,
    Login,
    SearchList,
}

impl KeychainRole {
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::Default => "default-keychain",
            Self::Login => "login-keychain",
            Self::SearchList => "list-keychains",
        }
    }
}

/// Command facade for the `security` tool.
pub struct Security<R = SecurityRunner> {
    runner: R,
    resolver: KeychainPathResolver,
    config: KeychainConfig,
}

impl Security<SecurityRunner> {
    /// Facade over the real `security` program with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(KeychainConfig::default())
    }

    #[must_use]
    pub fn from_config(config: KeychainConfig) -> Self {
        Self::with_runner(SecurityRunner, config)
    }
}

impl Default for Security<SecurityRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> Security<R> {
    #[must_use]
    pub fn with_runner(runner: R, config: KeychainConfig) -> Self {
        let resolver = KeychainPathResolver::from_config(&config);
        Self::with_parts(runner, resolver, config)
    }

    #[must_use]
    pub fn with_parts(runner: R, resolver: KeychainPathResolver, config: KeychainConfig) -> Self {
        Self {
            runner,
            resolver,
            config,
        }
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    #[must_use]
    pub fn resolver(&self) -> &KeychainPathResolver {
        &self.resolver
    }

    #[must_use]
    pub fn config(&self) -> &KeychainConfig {
        &self.config
    }

    /// Resolve a keychain name or path, see [`KeychainPathResolver::resolve`]
    #[must_use]
    pub fn resolve(&self, name_or_path: &str) -> KeychainPath {
        self.resolver.resolve(name_or_path)
    }

    #[must_use]
    pub fn login_keychain_path(&self) -> KeychainPath {
        self.resolver.login_keychain_path()
    }

    fn command(&self, subcommand: &str) -> Invocation {
        Invocation::new(&self.config.program).arg(subcommand)
    }

    async fn status(&self, invocation: Invocation) -> Result<ExitCode> {
        Ok(self.runner.run(&invocation).await?.status)
    }

    /// Run with captured output, failing on a non-zero exit
    async fn capture(&self, invocation: Invocation) -> Result<CommandOutput> {
        let invocation = invocation.capture_stdout();
        let output = self.runner.run(&invocation).await?;
        if !output.status.is_success() {
            return Err(KeychainError::CommandFailed {
                subcommand: invocation.subcommand().to_string(),
                code: output.status.code(),
                stderr: output.stderr_lossy(),
            });
        }
        Ok(output)
    }

    /// Create a keychain and return its resolved path
    ///
    /// `keychain` may be a bare name or a path. Fails before running
    /// anything when `password` is empty, and with
    /// [`KeychainError::CommandFailed`] when the tool rejects the request.
    pub async fn create_keychain(&self, keychain: &str, password: &str) -> Result<KeychainPath> {
        if password.is_empty() {
            return Err(KeychainError::PasswordRequired("create-keychain"));
        }

        let path = self.resolve(keychain);
        let invocation = self
            .command("create-keychain")
            .args(["-p", password])
            .arg(path.as_str());

        self.capture(invocation).await?;
        tracing::debug!(keychain = %path, "created keychain");
        Ok(path)
    }

    /// Import a PKCS#12 bundle, trusting the configured tools for its keys
    pub async fn import_certificate(
        &self,
        keychain: &KeychainPath,
        certificate: &Path,
        passphrase: &str,
    ) -> Result<ExitCode> {
        let certificate = certificate
            .to_str()
            .ok_or_else(|| KeychainError::NonUtf8Path(certificate.to_path_buf()))?;

        let mut invocation = self
            .command("import")
            .arg(certificate)
            .args(["-k", keychain.as_str()])
            .args(["-P", passphrase])
            .args(["-f", "pkcs12"])
            .arg("-A");
        for app in &self.config.trusted_apps {
            invocation = invocation.args(["-T", app.as_str()]);
        }

        self.status(invocation).await
    }

    /// Change a keychain password
    ///
    /// The tool prompts for the old password and the new one twice; the
    /// answers are written to its stdin.
    pub async fn change_password(
        &self,
        keychain: &KeychainPath,
        old_password: &str,
        new_password: &str,
    ) -> Result<ExitCode> {
        let answers = format!("{old_password}\n{new_password}\n{new_password}");
        let invocation = self
            .command("set-keychain-password")
            .arg(keychain.as_str())
            .stdin(answers);

        self.status(invocation).await
    }

    /// Lock `keychain`, or the default keychain when `None`
    pub async fn lock(&self, keychain: Option<&KeychainPath>) -> Result<ExitCode> {
        let invocation = self
            .command("lock-keychain")
            .arg_opt(keychain.map(KeychainPath::as_str));
        self.status(invocation).await
    }

    pub async fn lock_all(&self) -> Result<ExitCode> {
        self.status(self.command("lock-keychain").arg("-a")).await
    }

    /// Unlock `keychain`, or the default keychain when `None`
    pub async fn unlock(
        &self,
        keychain: Option<&KeychainPath>,
        password: Option<&str>,
    ) -> Result<ExitCode> {
        let password = password
            .filter(|password| !password.is_empty())
            .ok_or(KeychainError::PasswordRequired("unlock-keychain"))?;

        let invocation = self
            .command("unlock-keychain")
            .args(["-p", password])
            .arg_opt(keychain.map(KeychainPath::as_str));
        self.status(invocation).await
    }

    /// Lock after `seconds` of inactivity and on sleep
    pub async fn set_timeout(&self, keychain: &KeychainPath, seconds: u32) -> Result<ExitCode> {
        let seconds = seconds.to_string();
        let invocation = self
            .command("set-keychain-settings")
            .args(["-lut", seconds.as_str()])
            .arg(keychain.as_str());
        self.status(invocation).await
    }

    /// Delete the keychain file and remove it from the search list
    pub async fn delete_keychain(&self, keychain: &KeychainPath) -> Result<ExitCode> {
        self.status(self.command("delete-keychain").arg(keychain.as_str()))
            .await
    }

    fn role_query(&self, role: KeychainRole) -> Invocation {
        self.command(role.verb()).args(["-d", self.config.domain.as_str()])
    }

    /// Keychains assigned to `role`, failing if the tool fails
    pub async fn try_keychains(&self, role: KeychainRole) -> Result<KeychainList> {
        let output = self.capture(self.role_query(role)).await?;
        Ok(parse_keychain_list(&output.stdout_lossy()))
    }

    /// Keychains assigned to `role`, empty if the tool fails
    pub async fn keychains(&self, role: KeychainRole) -> KeychainList {
        match self.try_keychains(role).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(verb = role.verb(), error = %e, "keychain query failed, reporting none");
                Vec::new()
            }
        }
    }

    pub async fn default_keychain(&self) -> KeychainList {
        self.keychains(KeychainRole::Default).await
    }

    pub async fn login_keychain(&self) -> KeychainList {
        self.keychains(KeychainRole::Login).await
    }

    pub async fn list_keychains(&self) -> KeychainList {
        self.keychains(KeychainRole::SearchList).await
    }

    pub async fn try_default_keychain(&self) -> Result<KeychainList> {
        self.try_keychains(KeychainRole::Default).await
    }

    pub async fn try_login_keychain(&self) -> Result<KeychainList> {
        self.try_keychains(KeychainRole::Login).await
    }

    pub async fn try_list_keychains(&self) -> Result<KeychainList> {
        self.try_keychains(KeychainRole::SearchList).await
    }

    /// Assign keychains to `role`; for the search list this replaces the
    /// whole list, and an empty slice clears it
    pub async fn set_keychains(
        &self,
        role: KeychainRole,
        keychains: &[KeychainPath],
    ) -> Result<ExitCode> {
        let invocation = self
            .role_query(role)
            .arg("-s")
            .args(keychains.iter().map(KeychainPath::as_str));
        self.status(invocation).await
    }

    pub async fn set_default_keychain(&self, keychain: &KeychainPath) -> Result<ExitCode> {
        self.set_keychains(KeychainRole::Default, std::slice::from_ref(keychain))
            .await
    }

    pub async fn set_login_keychain(&self, keychain: &KeychainPath) -> Result<ExitCode> {
        self.set_keychains(KeychainRole::Login, std::slice::from_ref(keychain))
            .await
    }

    /// Make `keychain` the only entry of the search list
    pub async fn set_list_keychain(&self, keychain: &KeychainPath) -> Result<ExitCode> {
        self.set_keychains(KeychainRole::SearchList, std::slice::from_ref(keychain))
            .await
    }

    pub async fn set_list_keychains(&self, keychains: &[KeychainPath]) -> Result<ExitCode> {
        self.set_keychains(KeychainRole::SearchList, keychains).await
    }

    /// Print the keychains assigned to `role` on the tool's stdout
    pub async fn show_keychains(&self, role: KeychainRole) -> Result<ExitCode> {
        self.status(self.role_query(role)).await
    }

    pub async fn show_default_keychain(&self) -> Result<ExitCode> {
        self.show_keychains(KeychainRole::Default).await
    }

    pub async fn show_login_keychain(&self) -> Result<ExitCode> {
        self.show_keychains(KeychainRole::Login).await
    }

    pub async fn show_list_keychains(&self) -> Result<ExitCode> {
        self.show_keychains(KeychainRole::SearchList).await
    }

    /// Let Apple's signing tools use the keychain's keys without prompting
    pub async fn allow_access_for_apple_tools(
        &self,
        keychain: &KeychainPath,
        password: &str,
    ) -> Result<ExitCode> {
        if password.is_empty() {
            return Err(KeychainError::PasswordRequired("set-key-partition-list"));
        }

        let invocation = self
            .command("set-key-partition-list")
            .args(["-S", self.config.partition_list.as_str()])
            .arg("-s")
            .args(["-k", password])
            .arg(keychain.as_str());
        self.status(invocation).await
    }

    /// Look up a generic password item by service name
    pub async fn find_generic_password(
        &self,
        service: &str,
        keychain: Option<&KeychainPath>,
    ) -> Result<ExitCode> {
        let invocation = self
            .command("find-generic-password")
            .args(["-s", service])
            .arg_opt(keychain.map(KeychainPath::as_str));
        self.status(invocation).await
    }

    fn find_identity(&self, keychain: Option<&KeychainPath>) -> Invocation {
        self.command("find-identity")
            .args(["-p", "codesigning", "-v"])
            .arg_opt(keychain.map(KeychainPath::as_str))
    }

    /// Print valid code-signing identities on the tool's stdout
    pub async fn show_code_signing(&self, keychain: Option<&KeychainPath>) -> Result<ExitCode> {
        self.status(self.find_identity(keychain)).await
    }

    /// Raw `find-identity` output, empty if the tool fails
    pub async fn code_signing_output(&self, keychain: Option<&KeychainPath>) -> String {
        match self.capture(self.find_identity(keychain)).await {
            Ok(output) => output.stdout_lossy(),
            Err(e) => {
                tracing::warn!(error = %e, "find-identity failed, reporting no output");
                String::new()
            }
        }
    }

    /// Valid code-signing identities
    pub async fn code_signing_identities(
        &self,
        keychain: Option<&KeychainPath>,
    ) -> Result<Vec<SigningIdentity>> {
        let output = self.capture(self.find_identity(keychain)).await?;
        Ok(parse_signing_identities(&output.stdout_lossy()))
    }
}
