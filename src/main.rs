use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use keychain_automation::prompts::prompt_yes_no;
use keychain_automation::{
    ExitCode, KeychainConfig, KeychainList, KeychainPath, KeychainRole, Security, error, success,
    warn,
};

// Status lines go through the termcolor macros and ignore write errors.
// Anything the wrapped tool reports is propagated, and code-returning
// subcommands exit with the tool's own exit code.

#[derive(Parser)]
#[command(name = "keychain")]
#[command(version, about = "Manage macOS keychains through the security tool")]
struct Cli {
    /// Path to config file (TOML)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Log every security invocation
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the keychain path a name resolves to (login keychain if omitted)
    Resolve { keychain: Option<String> },

    /// Create a keychain
    Create {
        keychain: String,
        #[arg(long, short = 'p', env = "KEYCHAIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Import a PKCS#12 certificate bundle
    Import {
        keychain: String,
        certificate: PathBuf,
        #[arg(
            long,
            short = 'P',
            env = "CERTIFICATE_PASSPHRASE",
            hide_env_values = true,
            default_value = ""
        )]
        passphrase: String,
    },

    /// Change a keychain password
    ChangePassword {
        keychain: String,
        #[arg(long, env = "KEYCHAIN_PASSWORD", hide_env_values = true)]
        old: String,
        #[arg(long, env = "KEYCHAIN_NEW_PASSWORD", hide_env_values = true)]
        new: String,
    },

    /// Lock a keychain (the default keychain if omitted)
    Lock {
        keychain: Option<String>,
        /// Lock every keychain
        #[arg(long, short = 'a', conflicts_with = "keychain")]
        all: bool,
    },

    /// Unlock a keychain (the default keychain if omitted)
    Unlock {
        keychain: Option<String>,
        #[arg(long, short = 'p', env = "KEYCHAIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Lock a keychain after a period of inactivity and on sleep
    SetTimeout { keychain: String, seconds: u32 },

    /// Delete a keychain
    Delete {
        keychain: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Print the default keychain
    GetDefault {
        /// Fail instead of printing nothing when the tool fails
        #[arg(long)]
        strict: bool,
    },

    /// Print the login keychain
    GetLogin {
        #[arg(long)]
        strict: bool,
    },

    /// Print the keychain search list
    GetList {
        #[arg(long)]
        strict: bool,
    },

    /// Make a keychain the default keychain
    SetDefault { keychain: String },

    /// Make a keychain the login keychain
    SetLogin { keychain: String },

    /// Replace the keychain search list (clears it if no keychain is given)
    SetList { keychains: Vec<String> },

    /// Let the tool print the default keychain
    ShowDefault,

    /// Let the tool print the login keychain
    ShowLogin,

    /// Let the tool print the search list
    ShowList,

    /// Allow Apple's signing tools to use the keychain's keys without prompting
    AllowAppleTools {
        keychain: String,
        #[arg(long, short = 'p', env = "KEYCHAIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Look up a generic password item by service name
    FindGenericPassword {
        service: String,
        #[arg(long, short = 'k')]
        keychain: Option<String>,
    },

    /// Let the tool print valid code-signing identities
    ShowCodeSigning { keychain: Option<String> },

    /// List valid code-signing identities
    Identities { keychain: Option<String> },
}

#[tokio::main]
async fn main() -> Result<std::process::ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => KeychainConfig::load(path)
            .await
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => KeychainConfig::default(),
    };
    let security = Security::from_config(config);

    run(&security, cli.command).await
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(security: &Security, command: Command) -> Result<std::process::ExitCode> {
    let code = match command {
        Command::Resolve { keychain } => {
            let path = match keychain {
                Some(name) => security.resolve(&name),
                None => security.login_keychain_path(),
            };
            println!("{path}");
            return Ok(std::process::ExitCode::SUCCESS);
        }
        Command::Create { keychain, password } => {
            let path = security.create_keychain(&keychain, &password).await?;
            success!("Created keychain: {path}");
            return Ok(std::process::ExitCode::SUCCESS);
        }
        Command::Import {
            keychain,
            certificate,
            passphrase,
        } => {
            security
                .import_certificate(&security.resolve(&keychain), &certificate, &passphrase)
                .await?
        }
        Command::ChangePassword { keychain, old, new } => {
            security
                .change_password(&security.resolve(&keychain), &old, &new)
                .await?
        }
        Command::Lock { keychain, all } => {
            if all {
                security.lock_all().await?
            } else {
                security.lock(resolve_opt(security, keychain).as_ref()).await?
            }
        }
        Command::Unlock { keychain, password } => {
            security
                .unlock(resolve_opt(security, keychain).as_ref(), password.as_deref())
                .await?
        }
        Command::SetTimeout { keychain, seconds } => {
            security.set_timeout(&security.resolve(&keychain), seconds).await?
        }
        Command::Delete { keychain, yes } => {
            return delete(security, &keychain, yes, prompt_yes_no).await;
        }
        Command::GetDefault { strict } => {
            return print_keychains(security, KeychainRole::Default, strict).await;
        }
        Command::GetLogin { strict } => {
            return print_keychains(security, KeychainRole::Login, strict).await;
        }
        Command::GetList { strict } => {
            return print_keychains(security, KeychainRole::SearchList, strict).await;
        }
        Command::SetDefault { keychain } => {
            security.set_default_keychain(&security.resolve(&keychain)).await?
        }
        Command::SetLogin { keychain } => security.set_login_keychain(&security.resolve(&keychain)).await?,
        Command::SetList { keychains } => {
            let paths: Vec<KeychainPath> = keychains.iter().map(|name| security.resolve(name)).collect();
            security.set_list_keychains(&paths).await?
        }
        Command::ShowDefault => security.show_default_keychain().await?,
        Command::ShowLogin => security.show_login_keychain().await?,
        Command::ShowList => security.show_list_keychains().await?,
        Command::AllowAppleTools { keychain, password } => {
            security
                .allow_access_for_apple_tools(&security.resolve(&keychain), &password)
                .await?
        }
        Command::FindGenericPassword { service, keychain } => {
            security
                .find_generic_password(&service, resolve_opt(security, keychain).as_ref())
                .await?
        }
        Command::ShowCodeSigning { keychain } => {
            security
                .show_code_signing(resolve_opt(security, keychain).as_ref())
                .await?
        }
        Command::Identities { keychain } => {
            let identities = security
                .code_signing_identities(resolve_opt(security, keychain).as_ref())
                .await?;
            if identities.is_empty() {
                warn!("No valid code-signing identities found");
            }
            for identity in identities {
                println!("{}  {}", identity.hash, identity.name);
            }
            return Ok(std::process::ExitCode::SUCCESS);
        }
    };

    Ok(exit_with(code))
}

/// Delete after confirmation; a declined or unanswered prompt is a failure
async fn delete(
    security: &Security,
    keychain: &str,
    yes: bool,
    confirm: impl FnOnce(&str) -> keychain_automation::Result<bool>,
) -> Result<std::process::ExitCode> {
    let path = security.resolve(keychain);
    if !yes && !confirm(&format!("Delete keychain {path}?"))? {
        warn!("Keychain deletion cancelled");
        return Ok(std::process::ExitCode::FAILURE);
    }
    Ok(exit_with(security.delete_keychain(&path).await?))
}

async fn print_keychains(
    security: &Security,
    role: KeychainRole,
    strict: bool,
) -> Result<std::process::ExitCode> {
    let keychains: KeychainList = if strict {
        security.try_keychains(role).await?
    } else {
        security.keychains(role).await
    };
    for keychain in keychains {
        println!("{keychain}");
    }
    Ok(std::process::ExitCode::SUCCESS)
}

fn resolve_opt(security: &Security, keychain: Option<String>) -> Option<KeychainPath> {
    keychain.map(|name| security.resolve(&name))
}

/// Map the tool's exit code onto this process's exit code
fn exit_with(code: ExitCode) -> std::process::ExitCode {
    if !code.is_success() {
        error!("security exited with status {code}");
    }
    std::process::ExitCode::from(process_status(code))
}

/// Tool codes outside `0..=255` become 1
fn process_status(code: ExitCode) -> u8 {
    match u8::try_from(code.code()) {
        Ok(status) => status,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn lock_all_conflicts_with_keychain() {
        assert!(Cli::try_parse_from(["keychain", "lock", "--all", "build"]).is_err());
        assert!(Cli::try_parse_from(["keychain", "lock", "--all"]).is_ok());
    }

    #[test]
    fn set_list_accepts_no_keychains() {
        let cli = Cli::try_parse_from(["keychain", "set-list"]).unwrap();
        match cli.command {
            Command::SetList { keychains } => assert!(keychains.is_empty()),
            _ => panic!("expected set-list"),
        }
    }

    #[tokio::test]
    async fn declined_delete_fails_without_running_the_tool() {
        let security = Security::from_config(KeychainConfig {
            program: "definitely-not-a-real-program-4f1c".to_string(),
            home_dir: Some(PathBuf::from("/Users/ci")),
            ..KeychainConfig::default()
        });
        let mut asked = None;

        let status = delete(&security, "build", false, |question| {
            asked = Some(question.to_string());
            Ok(false)
        })
        .await
        .unwrap();

        assert_eq!(status, std::process::ExitCode::FAILURE);
        assert_eq!(
            asked.as_deref(),
            Some("Delete keychain /Users/ci/Library/Keychains/build.keychain-db?")
        );
    }

    #[test]
    fn tool_codes_map_to_process_status() {
        assert_eq!(process_status(ExitCode::SUCCESS), 0);
        assert_eq!(process_status(ExitCode::new(51)), 51);
        assert_eq!(process_status(ExitCode::new(255)), 255);
        assert_eq!(process_status(ExitCode::new(256)), 1);
        assert_eq!(process_status(ExitCode::new(300)), 1);
        assert_eq!(process_status(ExitCode::new(-1)), 1);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["keychain", "get-list", "--strict", "-v", "-c", "k.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("k.toml")));
        assert!(matches!(cli.command, Command::GetList { strict: true }));
    }
}
