//! Warden - directory-backed user provider
//!
//! Validates credentials, shows user details and changes passwords against an
//! LDAP directory or Active Directory.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use commands::CommandContext;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use warden_auth::LdapUserProvider;
use warden_core::{TracingDiagnostics, WardenConfig};

#[derive(Parser)]
#[command(name = "warden")]
#[command(author = "Warden Team")]
#[command(version = warden_core::VERSION)]
#[command(about = "Directory-backed user provider", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "WARDEN_CONFIG")]
    config: Option<String>,

    /// Directory URL, overrides the configuration
    #[arg(long, global = true)]
    url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "WARDEN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a user's password
    Check {
        username: String,

        /// Password, read from stdin when omitted
        #[arg(long, env = "WARDEN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show profile and group memberships of a user
    Details { username: String },

    /// Set a new password for a user
    Passwd {
        username: String,

        /// New password, read from stdin when omitted
        #[arg(long, env = "WARDEN_NEW_PASSWORD", hide_env_values = true)]
        new_password: Option<String>,
    },

    /// Bind as the service account and disconnect
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load or create config
    let mut config = if let Some(config_path) = &cli.config {
        WardenConfig::from_file(config_path)?
    } else {
        WardenConfig::from_env().context("Invalid environment configuration")?
    };

    // Override with CLI args
    if let Some(url) = cli.url {
        config.ldap.url = url;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config);

    let ldap = config
        .ldap
        .normalize(&TracingDiagnostics)
        .context("Invalid LDAP configuration")?;
    debug!("Using directory {}", ldap.url);

    let ctx = CommandContext {
        provider: LdapUserProvider::new(ldap),
        output_format: cli.output,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Check { username, password } => {
            commands::check::execute(&ctx, &username, password).await
        }
        Commands::Details { username } => commands::details::execute(&ctx, &username).await,
        Commands::Passwd {
            username,
            new_password,
        } => commands::passwd::execute(&ctx, &username, new_password).await,
        Commands::Ping => commands::ping::execute(&ctx).await,
    }
}

/// Logs go to stderr so command output on stdout stays parseable.
fn init_logging(config: &WardenConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from([
            "warden",
            "--config",
            "warden.toml",
            "check",
            "john",
            "--password",
            "secret",
        ])
        .unwrap();

        assert_eq!(cli.config.as_deref(), Some("warden.toml"));
        match cli.command {
            Commands::Check { username, password } => {
                assert_eq!(username, "john");
                assert_eq!(password.as_deref(), Some("secret"));
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_parse_details_json() {
        let cli = Cli::try_parse_from(["warden", "details", "john", "-o", "json"]).unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Details { .. }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["warden"]).is_err());
        assert!(Cli::try_parse_from(["warden", "passwd"]).is_err());
    }
}
