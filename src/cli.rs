//! Command-line front end over [`TransferEngine`]

use chrono::DateTime;
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{build_transfer_config, load_config_file, ConfigInput};
use crate::engine::TransferEngine;
use crate::error::{TransferError, TransferResult};
use crate::history::{HistoryStore, JsonlHistory, DEFAULT_TAIL_ROWS};
use crate::sync::SyncOutcome;
use crate::transfer::{
    format_bytes, spawn_job, JobContext, JobHandle, JobOutcome, TransferEvent, UploadQueue,
};
use crate::tree::{FolderBrowser, FolderNode, SizeFilter, TypeFilter, ViewFilter};

#[derive(Parser, Debug)]
#[command(name = "bucketdesk", version, about = "Upload, download, browse and share files in a B2 bucket")]
pub struct Cli {
    /// JSON settings file; flags override its values
    #[arg(long, env = "BUCKETDESK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "B2_KEY_ID", global = true)]
    pub key_id: Option<String>,

    #[arg(long, env = "B2_APP_KEY", global = true, hide_env_values = true)]
    pub app_key: Option<String>,

    #[arg(long, env = "B2_BUCKET_ID", global = true)]
    pub bucket_id: Option<String>,

    #[arg(long, env = "B2_BUCKET_NAME", global = true)]
    pub bucket_name: Option<String>,

    /// Remote folder all operations are rooted at
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    #[arg(long, global = true, help = "Authorization endpoint of the B2 API")]
    pub auth_url: Option<String>,

    /// Transfer history file (JSON lines)
    #[arg(long, env = "BUCKETDESK_HISTORY", global = true)]
    pub history: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TypeArg {
    Images,
    Video,
    Audio,
    Documents,
    Archives,
}

impl From<TypeArg> for TypeFilter {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Images => TypeFilter::Images,
            TypeArg::Video => TypeFilter::Video,
            TypeArg::Audio => TypeFilter::Audio,
            TypeArg::Documents => TypeFilter::Documents,
            TypeArg::Archives => TypeFilter::Archives,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SizeArg {
    Under10mb,
    #[value(name = "10-100mb")]
    From10To100mb,
    #[value(name = "100mb-1gb")]
    From100mbTo1gb,
    Over1gb,
}

impl From<SizeArg> for SizeFilter {
    fn from(value: SizeArg) -> Self {
        match value {
            SizeArg::Under10mb => SizeFilter::Under10Mb,
            SizeArg::From10To100mb => SizeFilter::From10To100Mb,
            SizeArg::From100mbTo1gb => SizeFilter::From100MbTo1Gb,
            SizeArg::Over1gb => SizeFilter::Over1Gb,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the credentials
    Authorize,

    /// List a folder of the bucket
    Ls {
        /// Folder below the prefix to show
        folder: Option<String>,
        #[arg(long)]
        query: Option<String>,
        #[arg(long = "type", value_enum)]
        file_type: Option<TypeArg>,
        #[arg(long, value_enum)]
        size: Option<SizeArg>,
    },

    /// Upload files and folders under the prefix
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Download objects by key
    Download {
        #[arg(required = true)]
        keys: Vec<String>,
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },

    /// Download every object below a remote folder
    DownloadPrefix {
        prefix: String,
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },

    /// Upload local files that are missing or differ in size under the prefix
    Sync { local_dir: PathBuf },

    /// Print a share link for an object
    Link {
        key: String,
        /// Time-limited link for a private bucket
        #[arg(long)]
        private: bool,
        /// Link lifetime in seconds (private links only)
        #[arg(long)]
        ttl: Option<i64>,
    },

    /// Show recent transfers
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn run_cli() -> TransferResult<()> {
    let cli = Cli::parse();
    run(cli).await
}

pub async fn run(cli: Cli) -> TransferResult<()> {
    let history: Option<Arc<dyn HistoryStore>> = cli
        .history
        .as_ref()
        .map(|path| Arc::new(JsonlHistory::new(path)) as Arc<dyn HistoryStore>);

    if let Commands::History { limit } = &cli.command {
        return print_history(history.as_deref(), *limit);
    }

    let input = merge_input(&cli).await?;
    let config = build_transfer_config(input)?;
    let mut engine = TransferEngine::new(config)?;
    if let Some(history) = history {
        engine = engine.with_history(history);
    }
    let engine = Arc::new(engine);

    match cli.command {
        Commands::Authorize => {
            let session = engine.authorize().await?;
            println!("Authorized account {}", session.account_id);
            println!("API URL:      {}", session.api_base_url);
            println!("Download URL: {}", session.download_base_url);
        }
        Commands::Ls {
            folder,
            query,
            file_type,
            size,
        } => {
            let filter = ViewFilter {
                query: query.unwrap_or_default(),
                file_type: file_type.map(TypeFilter::from).unwrap_or_default(),
                size: size.map(SizeFilter::from).unwrap_or_default(),
            };
            list_folder(&engine, folder.as_deref(), &filter).await?;
        }
        Commands::Upload { paths } => {
            let mut queue = UploadQueue::new();
            for path in &paths {
                if tokio::fs::metadata(path).await?.is_dir() {
                    queue.add_folder(path).await?;
                } else {
                    queue.add_files(&[path]).await?;
                }
            }
            println!(
                "Uploading {} file(s), {}",
                queue.len(),
                format_bytes(queue.total_bytes())
            );
            let items = queue.items().to_vec();
            let job_engine = engine.clone();
            let handle = spawn_job("upload", engine.history(), move |ctx: JobContext| async move {
                let summary = job_engine.upload(&ctx, &items).await?;
                Ok::<_, TransferError>(JobOutcome::files(summary.files, summary.bytes))
            })?;
            drive(handle).await?;
        }
        Commands::Download { keys, dest } => {
            let listing = engine.fetch_listing(None, None).await?;
            let mut entries = Vec::with_capacity(keys.len());
            for key in &keys {
                let key = key.trim_start_matches('/');
                let entry = listing
                    .entries
                    .iter()
                    .find(|entry| entry.key == key)
                    .ok_or_else(|| TransferError::validation(format!("File not found: {}", key)))?;
                entries.push(entry.clone());
            }
            let job_engine = engine.clone();
            let handle = spawn_job("download", engine.history(), move |ctx: JobContext| async move {
                let summary = job_engine.download_entries(&ctx, &entries, &dest).await?;
                Ok::<_, TransferError>(JobOutcome::files(summary.files, summary.bytes))
            })?;
            drive(handle).await?;
        }
        Commands::DownloadPrefix { prefix, dest } => {
            let job_engine = engine.clone();
            let handle = spawn_job("download", engine.history(), move |ctx: JobContext| async move {
                let summary = job_engine.download_prefix(&ctx, &prefix, &dest).await?;
                Ok::<_, TransferError>(JobOutcome::files(summary.files, summary.bytes))
            })?;
            drive(handle).await?;
        }
        Commands::Sync { local_dir } => {
            let job_engine = engine.clone();
            let handle = spawn_job("sync", engine.history(), move |ctx: JobContext| async move {
                match job_engine.sync(&ctx, &local_dir).await? {
                    SyncOutcome::UpToDate => Ok::<_, TransferError>(JobOutcome::files(0, 0)),
                    SyncOutcome::Synced(summary) => {
                        Ok(JobOutcome::files(summary.files, summary.bytes))
                    }
                }
            })?;
            drive(handle).await?;
        }
        Commands::Link { key, private, ttl } => {
            let url = if private {
                engine.private_link(&key, ttl).await?
            } else {
                engine.public_link(&key).await?
            };
            println!("{}", url);
        }
        Commands::History { .. } => {}
    }
    Ok(())
}

/// Settings file (if any) with flags and environment on top
async fn merge_input(cli: &Cli) -> TransferResult<ConfigInput> {
    let mut input = match &cli.config {
        Some(path) => load_config_file(path).await?,
        None => ConfigInput::default(),
    };

    let overrides = [
        (&cli.key_id, &mut input.key_id),
        (&cli.app_key, &mut input.app_key),
        (&cli.bucket_id, &mut input.bucket_id),
        (&cli.bucket_name, &mut input.bucket_name),
        (&cli.prefix, &mut input.prefix),
    ];
    for (flag, field) in overrides {
        if let Some(value) = flag {
            *field = value.clone();
        }
    }
    if cli.auth_url.is_some() {
        input.auth_url = cli.auth_url.clone();
    }
    Ok(input)
}

/// Print events until the job ends. Ctrl-C requests a cooperative stop.
async fn drive(mut handle: JobHandle) -> TransferResult<JobOutcome> {
    let controller = handle.controller.clone();
    let mut listen_for_interrupt = true;

    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(TransferEvent::Progress { percent, message }) => {
                    println!("[{:>3}%] {}", percent, message);
                }
                Some(TransferEvent::Finished { action, status, message }) => {
                    println!("{} {}: {}", action, status, message);
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if listen_for_interrupt => {
                listen_for_interrupt = false;
                match signal {
                    Ok(()) => {
                        info!("interrupt_received: stopping at the next block boundary");
                        controller.stop();
                    }
                    Err(e) => warn!("interrupt_listener_failed: {}", e),
                }
            }
        }
    }

    handle.wait().await
}

async fn list_folder(
    engine: &TransferEngine,
    folder: Option<&str>,
    filter: &ViewFilter,
) -> TransferResult<()> {
    let listing = engine.fetch_listing(None, None).await?;
    let mut browser = FolderBrowser::new(&engine.config().prefix);
    if let Some(folder) = folder {
        browser.open(&join_under(browser.base(), folder));
    }
    browser.reconcile(&listing);

    let crumbs: Vec<String> = browser.breadcrumbs().into_iter().map(|c| c.name).collect();
    println!("{}", crumbs.join(" > "));

    let nodes = filter.apply(browser.view(&listing));
    for node in &nodes {
        match node {
            FolderNode::Folder {
                name,
                file_count,
                total_size,
                ..
            } => println!(
                "{:<6} {:>12} {:<19} {}/  ({} files)",
                "DIR",
                format_bytes(*total_size),
                "",
                name,
                file_count
            ),
            FolderNode::File { name, entry } => println!(
                "{:<6} {:>12} {:<19} {}",
                "FILE",
                format_bytes(entry.size),
                format_timestamp(entry.upload_timestamp),
                name
            ),
        }
    }
    println!("{} item(s)", nodes.len());
    Ok(())
}

fn join_under(base: &str, folder: &str) -> String {
    let folder = folder.trim_matches('/');
    if base.is_empty() || folder == base || folder.starts_with(&format!("{}/", base)) {
        folder.to_string()
    } else {
        format!("{}/{}", base, folder)
    }
}

/// Upload timestamps are milliseconds since the epoch
fn format_timestamp(millis: i64) -> String {
    if millis <= 0 {
        return String::new();
    }
    DateTime::from_timestamp_millis(millis)
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn print_history(history: Option<&dyn HistoryStore>, limit: usize) -> TransferResult<()> {
    let Some(history) = history else {
        return Err(TransferError::validation(
            "No history file configured (use --history).",
        ));
    };
    let mut rows = history.tail(limit.min(DEFAULT_TAIL_ROWS))?;
    rows.reverse();
    for row in rows {
        println!(
            "{:<25} {:<14} {:<8} {:>12} {}",
            row.ts,
            row.action,
            row.status,
            format_bytes(row.bytes),
            row.details
        );
    }
    Ok(())
}
