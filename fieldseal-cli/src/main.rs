//! fieldseal CLI - sign, seal and check requests; issue and validate tokens

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fieldseal_auth::{BaseSecret, ProtocolConfig};
use tracing_subscriber::EnvFilter;

mod commands;
mod utils;

use commands::{keys, request, token};

/// fieldseal - request signing and field encryption toolkit
#[derive(Parser)]
#[command(name = "fieldseal", version, about)]
struct Cli {
    /// Base secret shared with the server
    #[arg(long, env = "FIELDSEAL_BASE_SECRET", hide_env_values = true, global = true)]
    secret: Option<String>,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the time window and derived key for a device
    Derive {
        /// Device fingerprint
        #[arg(long)]
        device: String,

        /// Timestamp in milliseconds (default: now)
        #[arg(long)]
        timestamp: Option<u64>,
    },

    /// Compute the signing headers for a request
    Sign {
        #[command(flatten)]
        request: request::RequestArgs,
    },

    /// Encrypt fields of a JSON body and attach the `_crypto` block
    Seal {
        /// Device fingerprint
        #[arg(long)]
        device: String,

        /// Timestamp in milliseconds (default: now)
        #[arg(long)]
        timestamp: Option<u64>,

        /// Field to encrypt (repeatable)
        #[arg(long = "field", value_name = "NAME", required = true)]
        fields: Vec<String>,

        /// JSON body, or `-` to read stdin
        body: String,
    },

    /// Run a signed request through the server-side guard
    Check {
        #[command(flatten)]
        request: request::RequestArgs,

        /// Value of the X-Signature header
        #[arg(long)]
        signature: String,

        /// Server time in milliseconds (default: now)
        #[arg(long)]
        now: Option<u64>,
    },

    /// Session token operations
    #[command(subcommand)]
    Token(TokenCommand),
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Issue a token for a subject
    Issue {
        /// Subject (user name)
        subject: String,

        /// Bind the token to this device fingerprint
        #[arg(long)]
        device: Option<String>,
    },

    /// Validate a token as the server would
    Validate {
        /// Token string or `Authorization` header value
        token: String,

        /// Device fingerprint presented by the caller
        #[arg(long)]
        device: Option<String>,
    },

    /// Decode and authenticate a token without lifetime checks
    Inspect {
        /// Token string or `Authorization` header value
        token: String,
    },

    /// Show the denylist entry that revokes a token
    Revoke {
        /// Token string or `Authorization` header value
        token: String,
    },
}

/// Settings shared by every subcommand.
pub struct Runtime {
    pub secret: Arc<BaseSecret>,
    pub config: ProtocolConfig,
    pub json: bool,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let secret = cli
        .secret
        .context("no base secret: pass --secret or set FIELDSEAL_BASE_SECRET")?;
    let runtime = Runtime {
        secret: Arc::new(BaseSecret::new(secret.trim().as_bytes()).context("invalid base secret")?),
        config: ProtocolConfig::from_env().context("invalid protocol configuration")?,
        json: cli.json,
    };

    match cli.command {
        Commands::Derive { device, timestamp } => keys::cmd_derive(&runtime, &device, timestamp),
        Commands::Sign { request } => request::cmd_sign(&runtime, &request),
        Commands::Seal {
            device,
            timestamp,
            fields,
            body,
        } => request::cmd_seal(&runtime, &device, timestamp, &fields, &body),
        Commands::Check {
            request,
            signature,
            now,
        } => request::cmd_check(&runtime, &request, &signature, now),
        Commands::Token(TokenCommand::Issue { subject, device }) => {
            token::cmd_issue(&runtime, &subject, device.as_deref())
        }
        Commands::Token(TokenCommand::Validate { token, device }) => {
            token::cmd_validate(&runtime, &token, device.as_deref())
        }
        Commands::Token(TokenCommand::Inspect { token }) => token::cmd_inspect(&runtime, &token),
        Commands::Token(TokenCommand::Revoke { token }) => token::cmd_revoke(&runtime, &token),
    }
}
