// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `helpdesk-sync` - operator tool for inspecting stored values.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use helpdesk_sync::auth::{Identity, Role};
use helpdesk_sync::config::{LogFormat, SyncConfig};
use helpdesk_sync::storage::{find_collisions, sanitize_deep, sanitize_key, EnvelopeCodec};
use tracing::{error, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Inspect partitions, envelopes and store keys.
#[derive(Parser, Debug)]
#[command(name = "helpdesk-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seal a value with the configured passphrase
    Encrypt { plaintext: String },
    /// Open an envelope with the configured passphrase
    Decrypt { envelope: String },
    /// Show the partition a collection resolves to
    Resolve {
        /// `admin` or `employee`
        role: String,
        subject: String,
        collection: String,
    },
    /// Rewrite a key, or with `--json` every key of a JSON value
    Sanitize {
        input: String,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let config = SyncConfig::from_env();
    init_tracing(
        config
            .as_ref()
            .map(|config| config.log_format)
            .unwrap_or_default(),
    );
    let cli = Cli::parse();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &config) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &SyncConfig) -> Result<String, Box<dyn std::error::Error>> {
    match command {
        Commands::Encrypt { plaintext } => Ok(codec(config)?.encrypt(&plaintext)?),
        Commands::Decrypt { envelope } => Ok(codec(config)?.try_decrypt(&envelope)?),
        Commands::Resolve {
            role,
            subject,
            collection,
        } => {
            let role = Role::from_str(&role).ok_or_else(|| format!("unknown role `{role}`"))?;
            let identity = Identity::new(subject, role);
            Ok(config
                .resolver()
                .resolve(&collection, &identity)
                .map_or_else(|| "(no partition)".to_string(), |path| path.to_string()))
        }
        Commands::Sanitize { input, json } => {
            if !json {
                return Ok(sanitize_key(&input).into_string());
            }
            let value: serde_json::Value = serde_json::from_str(&input)?;
            for collision in find_collisions(&value) {
                warn!(
                    pointer = %collision.pointer,
                    sanitized = %collision.sanitized,
                    originals = ?collision.originals,
                    "Keys collide after sanitizing"
                );
            }
            Ok(serde_json::to_string_pretty(&sanitize_deep(&value))?)
        }
    }
}

fn codec(config: &SyncConfig) -> Result<EnvelopeCodec, Box<dyn std::error::Error>> {
    Ok(EnvelopeCodec::from_passphrase(config.passphrase()?)?
        .with_decrypt_cache(config.decrypt_cache_capacity))
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
