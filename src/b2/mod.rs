//! B2 module - Backblaze B2 native API operations
//!
//! This module is organized into submodules:
//! - `types`: Wire types and session state
//! - `session`: Client, authorization and authorized calls
//! - `list`: Paginated file listing
//! - `share`: Direct URLs and scoped download authorization
//! - `upload`: Upload target and raw upload calls

mod list;
mod session;
mod share;
mod types;
mod upload;

pub use list::DEFAULT_MAX_FILE_COUNT;
pub use session::B2Client;
pub use share::{direct_url, encode_key};
pub use types::{
    Credentials, ListPage, RemoteEntry, Session, UploadTarget, UploadedFile, DEFAULT_AUTH_URL,
};
