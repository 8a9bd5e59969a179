//! CLI for the giga downloader.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use giga_core::config;
use giga_core::ledger::{MissionDb, MissionId};
use giga_core::postprocess::PostProcessingSpec;
use std::path::PathBuf;

use commands::{run_add, run_pause, run_remove, run_resume, run_scheduler, run_status, AddArgs};

/// Top-level CLI for the giga downloader.
#[derive(Debug, Parser)]
#[command(name = "giga")]
#[command(about = "giga: segmented, resumable multi-stream downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a new download mission.
    Add {
        /// Direct HTTP/HTTPS URL of the main stream (file:// with --subtitle).
        url: String,

        /// Separate audio track to mux into the output.
        #[arg(long, value_name = "URL")]
        audio: Option<String>,

        /// Post-processing: copy, hls, demux:<container> or mux:<container>.
        #[arg(long, value_name = "SPEC")]
        post: Option<PostProcessingSpec>,

        /// Output file name (default: last path segment of the URL).
        #[arg(long, short = 'o', value_name = "NAME")]
        output: Option<String>,

        /// Directory for the output file (default: configured download dir).
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,

        /// Worker threads for this mission (default: from config).
        #[arg(long, value_name = "N")]
        threads: Option<usize>,

        /// Extra request header as "Name: value". May be repeated.
        #[arg(long = "header", short = 'H', value_name = "HEADER")]
        headers: Vec<String>,

        /// Subtitle track; a file:// source is copied from disk.
        #[arg(long)]
        subtitle: bool,
    },

    /// Run queued missions until the queue is empty.
    Run,

    /// Show all missions.
    Status,

    /// Pause a mission by its ID.
    Pause {
        /// Mission identifier.
        id: MissionId,
    },

    /// Queue a paused or failed mission again.
    Resume {
        /// Mission identifier.
        id: MissionId,
    },

    /// Remove a mission; a running one is cancelled and its partial output deleted.
    Remove {
        /// Mission identifier.
        id: MissionId,

        /// Also delete the output and `.part` files of a stopped mission.
        #[arg(long)]
        delete_files: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = MissionDb::open_default().await?;

        match cli.command {
            CliCommand::Add {
                url,
                audio,
                post,
                output,
                download_dir,
                threads,
                headers,
                subtitle,
            } => {
                let args = AddArgs {
                    url,
                    audio,
                    post,
                    output,
                    download_dir,
                    threads,
                    headers,
                    subtitle,
                };
                run_add(&db, &cfg, args).await?;
            }
            CliCommand::Run => run_scheduler(&db, &cfg).await?,
            CliCommand::Status => run_status(&db).await?,
            CliCommand::Pause { id } => run_pause(&db, id).await?,
            CliCommand::Resume { id } => run_resume(&db, id).await?,
            CliCommand::Remove { id, delete_files } => run_remove(&db, id, delete_files).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
