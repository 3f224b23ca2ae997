//! Gigya IM CLI - Database migrations and Gigya operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! gim-cli migrate
//!
//! # Write a new key file and store the encrypted app secret
//! gim-cli secret generate-key --output /etc/gigya/key
//! gim-cli secret encrypt < app-secret.txt
//!
//! # Check that the storefront can resolve its Gigya credentials
//! gim-cli credentials check
//!
//! # Generate a password
//! gim-cli password generate --length 12
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gigya_im_storefront::services::password::DEFAULT_GENERATED_LENGTH;

mod commands;

#[derive(Parser)]
#[command(name = "gim-cli")]
#[command(author, version, about = "Gigya IM CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage the Gigya app secret
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
    /// Check Gigya credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
    /// Password utilities
    Password {
        #[command(subcommand)]
        action: PasswordAction,
    },
}

#[derive(Subcommand)]
enum SecretAction {
    /// Encrypt the app secret and store it in the settings record
    Encrypt {
        /// App secret (read from stdin when omitted)
        #[arg(long)]
        value: Option<String>,

        /// Print the encrypted value instead of storing it
        #[arg(long)]
        print: bool,
    },
    /// Write a new encryption key file
    GenerateKey {
        /// Key file path (defaults to `GIGYA_KEY_FILE_LOCATION`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CredentialsAction {
    /// Resolve the credentials and report the outcome
    Check,
}

#[derive(Subcommand)]
enum PasswordAction {
    /// Print a generated password
    Generate {
        /// Number of characters after the prefix
        #[arg(short, long, default_value_t = DEFAULT_GENERATED_LENGTH)]
        length: usize,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Secret { action } => match action {
            SecretAction::Encrypt { value, print } => {
                commands::secret::encrypt(value, print).await?;
            }
            SecretAction::GenerateKey { output, force } => {
                commands::secret::generate_key(output, force).await?;
            }
        },
        Commands::Credentials { action } => match action {
            CredentialsAction::Check => commands::credentials::check().await?,
        },
        Commands::Password { action } => match action {
            PasswordAction::Generate { length } => commands::password::generate(length),
        },
    }
    Ok(())
}
