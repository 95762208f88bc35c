//! Transfer engine for Backblaze B2 buckets
//!
//! Uploads hash each file with SHA-1 before streaming it to a one-time upload
//! target. Downloads stream objects to disk. Both run in sequential batches
//! with byte-accurate progress and cooperative pause/stop. Sync uploads the
//! local files whose size differs from the remote listing, and `tree` turns
//! the flat key listing into browsable folders.

pub mod b2;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod local;
pub mod sync;
pub mod transfer;
pub mod tree;

pub use cli::run_cli;
pub use config::{build_transfer_config, ConfigInput, RetrySettings, TransferConfig};
pub use engine::TransferEngine;
pub use error::{TransferError, TransferResult};
