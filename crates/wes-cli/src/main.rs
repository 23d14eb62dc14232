mod cli;
mod config;

use clap::Parser;
use color_eyre::Result;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wes_security::{KeyringSecretStore, SecurityManager, DEFAULT_KEYRING_SERVICE};

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        cli::Command::Version => print_version(),
        cli::Command::Config(cli::ConfigCommand::Init) => init_config(&config)?,
        command => {
            let mut manager = build_manager(&config, cli.master_password.as_deref())?;
            run(command, &mut manager)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("wes {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

/// Build the security manager from config overrides, falling back to
/// the platform defaults.
fn build_manager(
    config: &config::Config,
    master_password: Option<&str>,
) -> Result<SecurityManager<KeyringSecretStore>> {
    let keyring_service = config
        .keyring_service
        .clone()
        .unwrap_or_else(|| DEFAULT_KEYRING_SERVICE.to_string());

    if let Some(salt_dir) = &config.salt_dir {
        debug!(?salt_dir, "initializing security manager (config override)");
        return Ok(SecurityManager::with_backend(
            salt_dir.join("salt"),
            KeyringSecretStore,
            keyring_service,
            master_password,
        )?);
    }

    if keyring_service == DEFAULT_KEYRING_SERVICE {
        return Ok(SecurityManager::new(master_password)?);
    }

    let salt_path = config::default_path()?
        .parent()
        .map(|dir| dir.join("salt"))
        .ok_or_else(|| color_eyre::eyre::eyre!("cannot resolve salt path"))?;
    Ok(SecurityManager::with_backend(
        salt_path,
        KeyringSecretStore,
        keyring_service,
        master_password,
    )?)
}

fn run(command: cli::Command, manager: &mut SecurityManager<KeyringSecretStore>) -> Result<()> {
    match command {
        cli::Command::Store {
            service,
            username,
            value,
        } => {
            manager.store_credential(&service, &username, &value)?;
            println!("Stored {service}:{username}");
        }
        cli::Command::Get { service, username } => {
            match manager.retrieve_credential(&service, &username)? {
                Some(value) => println!("{value}"),
                None => println!("No credential for {service}:{username}"),
            }
        }
        cli::Command::Delete { service, username } => {
            manager.delete_credential(&service, &username)?;
            println!("Deleted {service}:{username}");
        }
        cli::Command::List => {
            for id in manager.list_stored_credentials()? {
                println!("{id}");
            }
        }
        cli::Command::Rotate => {
            let report = manager.rotate_master_key()?;
            println!("Rotated {} credential(s)", report.rotated.len());
        }
        cli::Command::Health => {
            if !manager.validate_integrity() {
                color_eyre::eyre::bail!("encryption integrity check failed");
            }
            println!("Encryption: ok");
        }
        // Handled in main before a manager is built.
        cli::Command::Version | cli::Command::Config(_) => {}
    }
    Ok(())
}
