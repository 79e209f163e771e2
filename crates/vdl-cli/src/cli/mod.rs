//! CLI for the VDL video download manager.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::Arc;
use vdl_core::config;
use vdl_core::planner::VariantPreference;
use vdl_core::store::{RecordFilter, RecordStore};

use commands::{
    run_add, run_checksum, run_completions, run_download, run_edit, run_list, run_log,
    run_remove, run_scheduler, run_stop, RecordEdit,
};

/// Top-level CLI for the VDL video download manager.
#[derive(Debug, Parser)]
#[command(name = "vdl")]
#[command(about = "VDL: video download manager for direct files and HLS streams", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Fields of a download record as given on the command line.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Page, manifest or file URL.
    pub url: String,

    /// Display name (artifact file name without extension). Defaults to the URL's file name.
    #[arg(long)]
    pub name: Option<String>,

    /// direct, segmented (alias m3u8/hls) or a platform extractor name.
    /// Inferred from the URL when omitted.
    #[arg(long)]
    pub kind: Option<String>,

    /// Request header sent with every fetch, e.g. "Referer: https://site/".
    #[arg(long = "header", short = 'H', value_name = "NAME: VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Subfolder under the download directory.
    #[arg(long)]
    pub folder: Option<String>,

    /// Master playlist variant: highest, lowest, or a target bandwidth in
    /// bits per second. Defaults to the configured quality.
    #[arg(long, value_parser = parse_variant)]
    pub variant: Option<VariantPreference>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Add a download record (does not start it).
    Add(SourceArgs),

    /// Add a download record and run it until it finishes.
    Download(SourceArgs),

    /// Run downloads until all of them finish. Ctrl-C stops them.
    Run {
        /// Record ids to start. Default: every ready or waiting record.
        ids: Vec<i64>,
        /// Also restart failed and stopped records.
        #[arg(long)]
        retry_failed: bool,
    },

    /// List download records.
    List {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        page_size: u32,
        /// Only finished downloads.
        #[arg(long, conflicts_with = "unfinished")]
        done: bool,
        /// Only downloads that have not succeeded.
        #[arg(long)]
        unfinished: bool,
    },

    /// Stop a download in a running `vdl run`.
    Stop {
        /// Record id.
        id: i64,
    },

    /// Print the log of a download.
    Log {
        /// Record id.
        id: i64,
    },

    /// Change name, URL, kind, headers or folder of a record.
    Edit {
        /// Record id.
        id: i64,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        /// Replaces all headers when given at least once.
        #[arg(long = "header", short = 'H', value_name = "NAME: VALUE", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        #[arg(long)]
        folder: Option<String>,
        #[arg(long, value_parser = parse_variant)]
        variant: Option<VariantPreference>,
        /// Start the download right after editing.
        #[arg(long)]
        now: bool,
    },

    /// Remove a record (and optionally its artifact and segment temporaries).
    Remove {
        /// Record id.
        id: i64,
        #[arg(long)]
        delete_files: bool,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },

    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

/// Parse `"Name: value"` into a header pair.
pub fn parse_header(s: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{}'", s));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Parse `--variant`.
pub fn parse_variant(s: &str) -> std::result::Result<VariantPreference, String> {
    VariantPreference::parse(s)
        .ok_or_else(|| format!("expected highest, lowest or a bandwidth, got '{}'", s))
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        match cli.command {
            // These touch neither the config nor the DB.
            CliCommand::Checksum { path } => run_checksum(&path).await,
            CliCommand::Completions { shell } => {
                run_completions(shell, &mut Cli::command());
                Ok(())
            }
            CliCommand::Stop { id } => run_stop(id).await,
            command => command.run_with_store().await,
        }
    }

    async fn run_with_store(self) -> Result<()> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = Arc::new(RecordStore::open_default().await?);

        match self {
            CliCommand::Add(args) => {
                run_add(&store, &args).await?;
            }
            CliCommand::Download(args) => run_download(store.clone(), cfg, &args).await?,
            CliCommand::Run { ids, retry_failed } => {
                run_scheduler(store.clone(), cfg, ids, retry_failed).await?
            }
            CliCommand::List {
                page,
                page_size,
                done,
                unfinished,
            } => {
                let filter = if done {
                    RecordFilter::Done
                } else if unfinished {
                    RecordFilter::Unfinished
                } else {
                    RecordFilter::All
                };
                run_list(&store, &cfg, page, page_size, filter).await?
            }
            CliCommand::Log { id } => run_log(&store, id).await?,
            CliCommand::Edit {
                id,
                url,
                name,
                kind,
                headers,
                folder,
                variant,
                now,
            } => {
                let edit = RecordEdit {
                    url,
                    name,
                    kind,
                    headers,
                    folder,
                    variant,
                };
                run_edit(store.clone(), cfg, id, edit, now).await?
            }
            CliCommand::Remove { id, delete_files } => {
                run_remove(&store, &cfg, id, delete_files).await?
            }
            // Dispatched in `run_from_args`.
            CliCommand::Checksum { .. } | CliCommand::Completions { .. } | CliCommand::Stop { .. } => {}
        }
        store.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
