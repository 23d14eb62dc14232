use clap::{Parser, Subcommand};

/// CLI surface definition. Exercises the credential security core; the
/// desktop front end consumes the same `wes-security` API.
#[derive(Parser, Debug)]
#[command(
    name = "wes",
    about = "Encrypted credential vault for the executive summary toolchain",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Derive the master key from this password instead of the OS keyring.
    #[arg(long, global = true)]
    pub master_password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Encrypt and store a credential.
    Store {
        service: String,
        username: String,
        value: String,
    },
    /// Retrieve and decrypt a credential.
    Get { service: String, username: String },
    /// Delete a credential (succeeds even when absent).
    Delete { service: String, username: String },
    /// List stored credential identifiers.
    List,
    /// Rotate the master key, re-encrypting every stored credential.
    Rotate,
    /// Check that encryption round-trips.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_subcommand() {
        let cli = Cli::try_parse_from(["wes", "store", "jira", "api_token", "tok-123"])
            .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Command::Store {
                service: "jira".to_string(),
                username: "api_token".to_string(),
                value: "tok-123".to_string(),
            }
        );
    }

    #[test]
    fn parses_get_subcommand() {
        let cli = Cli::try_parse_from(["wes", "get", "jira", "api_token"])
            .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Command::Get {
                service: "jira".to_string(),
                username: "api_token".to_string(),
            }
        );
    }

    #[test]
    fn parses_global_master_password_flag() {
        let cli = Cli::try_parse_from(["wes", "health", "--master-password", "hunter2"])
            .expect("parse should succeed");
        assert_eq!(cli.command, Command::Health);
        assert_eq!(cli.master_password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn parses_config_init_subcommand() {
        let cli = Cli::try_parse_from(["wes", "config", "init"]).expect("parse should succeed");
        assert_eq!(cli.command, Command::Config(ConfigCommand::Init));
    }

    #[test]
    fn requires_a_subcommand() {
        Cli::try_parse_from(["wes"]).expect_err("missing subcommand should fail");
    }
}
