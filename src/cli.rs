//! Command-line surface of note-publisher.
//!
//! All reconciliation logic lives in `note-publisher-core`; this module loads the config,
//! wires the vault, the GitHub client and the ledger together, and reports results.
//!
//! Use [`run`] with a constructed [`Cli`] for programmatic invocation and integration tests.

use crate::github::GitHubClient;
use crate::load_config::{load_config, CliConfig};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use note_publisher_core::contract::RemoteStore;
use note_publisher_core::ledger::Ledger;
use note_publisher_core::publish::{CancelFlag, PublishOutcome, Publisher};
use note_publisher_core::vault::VaultStore;
use std::path::{Component, Path, PathBuf};

/// CLI for note-publisher: push marked notes and their images to a GitHub repository.
#[derive(Parser)]
#[clap(
    name = "note-publisher",
    version,
    about = "Publish notes marked for sharing from a markdown vault to a GitHub repository"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a single note
    Publish {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Note to publish, relative to the vault or absolute inside it
        note: PathBuf,
    },
    /// Publish every eligible note in the vault
    PublishAll {
        #[clap(long)]
        config: PathBuf,
    },
    /// List eligible notes with their target paths and last publish time
    Status {
        #[clap(long)]
        config: PathBuf,
        /// Only show notes whose path or name contains this text
        #[clap(long)]
        filter: Option<String>,
    },
    /// Verify the token can reach the configured repository
    Check {
        #[clap(long)]
        config: PathBuf,
    },
    /// Forget which notes have been published; remote files are left alone
    Reset {
        #[clap(long)]
        config: PathBuf,
    },
}

type GitHubPublisher = Publisher<GitHubClient, VaultStore>;

fn build_publisher(config: &CliConfig) -> Result<GitHubPublisher> {
    let client =
        GitHubClient::new_from_env(config.remote.coordinates(), config.remote.api_url.clone())?;
    let vault = VaultStore::new(&config.vault_dir);
    Ok(Publisher::new(client, vault, config.publish.clone())?)
}

/// `note` as a `/`-separated vault path.
pub fn vault_relative(vault_dir: &Path, note: &Path) -> Result<String> {
    let relative = if note.is_absolute() {
        note.strip_prefix(vault_dir)
            .map_err(|_| anyhow!("{} is outside the vault {}", note.display(), vault_dir.display()))?
    } else {
        note
    };
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| anyhow!("{} is not valid UTF-8", note.display()))?,
            ),
            Component::CurDir => {}
            _ => return Err(anyhow!("{} is outside the vault", note.display())),
        }
    }
    Ok(parts.join("/"))
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Publish { config, note } => {
            let config = load_config(config)?;
            let note = vault_relative(&config.vault_dir, &note)?;
            tracing::info!(command = "publish", %note, "Publishing note");
            let publisher = build_publisher(&config)?;
            let mut ledger = Ledger::open(config.state_path())?;
            match publisher.publish_document(&note, &mut ledger).await {
                Ok(PublishOutcome::Published(report)) => {
                    let verb = if report.created { "Created" } else { "Updated" };
                    println!("{verb} {} -> {}", report.local_path, report.remote_path);
                    if report.images_uploaded > 0 {
                        println!("Uploaded {} image(s)", report.images_uploaded);
                    }
                    if let Some(retired) = report.retired {
                        println!("Removed previous copy {retired}");
                    }
                    Ok(())
                }
                Ok(PublishOutcome::Skipped(reason)) => {
                    println!("Skipped {note}: {reason}");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "publish", error = %e, "Publish failed");
                    Err(anyhow!("Failed to publish {note}: {e}"))
                }
            }
        }
        Commands::PublishAll { config } => {
            let config = load_config(config)?;
            let publisher = build_publisher(&config)?;
            let mut ledger = Ledger::open(config.state_path())?;

            let cancel = CancelFlag::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, stopping after the current note");
                    on_signal.cancel();
                }
            });

            let report = publisher.publish_all(&mut ledger, &cancel).await?;
            tracing::info!(command = "publish-all", ?report, "Batch complete");
            for published in &report.published {
                println!("Published {} -> {}", published.local_path, published.remote_path);
            }
            for (path, message) in &report.failures {
                println!("Failed {path}: {message}");
            }
            println!(
                "Published {} of {} eligible notes ({} failed{})",
                report.published.len(),
                report.eligible,
                report.failures.len(),
                if report.cancelled { ", cancelled" } else { "" }
            );
            if report.failures.is_empty() {
                Ok(())
            } else {
                Err(anyhow!("{} note(s) failed to publish", report.failures.len()))
            }
        }
        Commands::Status { config, filter } => {
            let config = load_config(config)?;
            let publisher = build_publisher(&config)?;
            let ledger = Ledger::open(config.state_path())?;
            let notes = publisher.status(&ledger, filter.as_deref()).await?;
            if notes.is_empty() {
                println!("No notes marked for publishing");
            }
            for note in notes {
                let last = note
                    .last_published
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{} -> {} (last published: {last})", note.local_path, note.target_path);
            }
            Ok(())
        }
        Commands::Reset { config } => {
            let config = load_config(config)?;
            let mut ledger = Ledger::open(config.state_path())?;
            let dropped = ledger.clear()?;
            tracing::info!(command = "reset", dropped, "Publish history reset");
            println!("Published notes history has been reset ({dropped} record(s) removed)");
            Ok(())
        }
        Commands::Check { config } => {
            let config = load_config(config)?;
            let publisher = build_publisher(&config)?;
            let coords = publisher.remote().coordinates();
            match publisher.remote().check_access().await {
                Ok(()) => {
                    println!("Connected to {}/{}", coords.owner, coords.repo);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "check", error = %e, "Connection check failed");
                    Err(anyhow!("Cannot reach {}/{}: {e}", coords.owner, coords.repo))
                }
            }
        }
    }
}
