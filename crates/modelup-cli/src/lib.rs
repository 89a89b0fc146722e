//! modelup - keep local model artifacts up to date
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Compares the locally installed model manifest with a remotely published
//! one and installs whatever is stale, one artifact at a time, with backup
//! and rollback.
//!
//! # Directory Layout
//!
//! ```text
//! <models dir>/
//! ├── manifest.json        # Installed versions
//! ├── manifest.json.lock   # Advisory lock for manifest writes
//! ├── upscale.bin          # Committed artifacts
//! ├── upscale.bin.part     # In-progress download (transient)
//! └── upscale.bin.bak      # Previous artifact during install (transient)
//! ```

pub mod cmd;
pub mod context;
pub mod ui;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use modelup_core::config::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY};

#[derive(Debug, Parser)]
#[command(name = "modelup")]
#[command(author, version, about = "modelup - keep local model artifacts up to date")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// URL of the published model manifest
    #[arg(long, env = "MODELUP_MANIFEST_URL", global = true)]
    pub manifest_url: Option<String>,

    /// Directory holding installed models
    #[arg(long, env = "MODELUP_MODELS_DIR", global = true)]
    pub models_dir: Option<PathBuf>,

    /// Local manifest path (defaults to <models dir>/manifest.json)
    #[arg(long, env = "MODELUP_MANIFEST", global = true)]
    pub manifest: Option<PathBuf>,

    /// Extra attempts after a failed download
    #[arg(long, default_value_t = DEFAULT_RETRIES, global = true)]
    pub retries: u32,

    /// Base delay between attempts, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64, global = true)]
    pub retry_delay_ms: u64,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List models with a newer version available
    Check,
    /// Download and install every pending update
    Update,
    /// Verify installed models against the local manifest (no network)
    Status,
    /// Print SHA-256 of files, for authoring manifests
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}
