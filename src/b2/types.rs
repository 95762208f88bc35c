//! B2 wire types and session state

use serde::{Deserialize, Serialize};

/// Default authorization endpoint of the B2 native API
pub const DEFAULT_AUTH_URL: &str = "https://api.backblazeb2.com";

/// Application key pair used to authorize a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credentials {
    pub key_id: String,
    pub app_key: String,
}

impl Credentials {
    pub fn new(key_id: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            app_key: app_key.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.key_id.trim().is_empty() && !self.app_key.trim().is_empty()
    }
}

/// Authorization state returned by `b2_authorize_account`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub account_id: String,
    #[serde(rename = "authorizationToken")]
    pub auth_token: String,
    #[serde(rename = "apiUrl")]
    pub api_base_url: String,
    #[serde(rename = "downloadUrl")]
    pub download_base_url: String,
}

/// One object from the listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    pub key: String,
    pub size: u64,
    pub upload_timestamp: i64,
    pub file_id: Option<String>,
}

impl RemoteEntry {
    pub fn new(key: impl Into<String>, size: u64, upload_timestamp: i64) -> Self {
        Self {
            key: key.into(),
            size,
            upload_timestamp,
            file_id: None,
        }
    }
}

/// Raw listing entry. The service reports the size as `contentLength`,
/// some API versions as `size`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawFileEntry {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub upload_timestamp: Option<i64>,
    #[serde(default)]
    pub file_id: Option<String>,
}

impl From<RawFileEntry> for RemoteEntry {
    fn from(raw: RawFileEntry) -> Self {
        RemoteEntry {
            size: raw.content_length.or(raw.size).unwrap_or(0),
            upload_timestamp: raw.upload_timestamp.unwrap_or(0),
            file_id: raw.file_id,
            key: raw.file_name,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListFileNamesRequest<'a> {
    pub bucket_id: &'a str,
    pub max_file_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_file_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListFileNamesResponse {
    #[serde(default)]
    pub files: Vec<RawFileEntry>,
    #[serde(default)]
    pub next_file_name: Option<String>,
}

/// One page of the listing call
#[derive(Debug, Clone)]
pub struct ListPage {
    pub entries: Vec<RemoteEntry>,
    pub next_key: Option<String>,
}

/// One-time upload URL/token pair. Never reused across files.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub upload_url: String,
    #[serde(rename = "authorizationToken")]
    pub upload_auth_token: String,
}

/// Response of a successful upload call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub content_length: u64,
    #[serde(default)]
    pub content_sha1: String,
    #[serde(default)]
    pub upload_timestamp: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DownloadAuthorizationRequest<'a> {
    pub bucket_id: &'a str,
    pub file_name_prefix: &'a str,
    pub valid_duration_in_seconds: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DownloadAuthorizationResponse {
    pub authorization_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_entry_prefers_content_length_over_size() {
        let raw: RawFileEntry = serde_json::from_str(
            r#"{"fileName":"a/b.txt","contentLength":12,"size":99,"uploadTimestamp":1700000000000}"#,
        )
        .unwrap();
        let entry = RemoteEntry::from(raw);
        assert_eq!(entry.key, "a/b.txt");
        assert_eq!(entry.size, 12);
        assert_eq!(entry.upload_timestamp, 1_700_000_000_000);
    }

    #[test]
    fn listing_entry_without_size_defaults_to_zero() {
        let raw: RawFileEntry = serde_json::from_str(r#"{"fileName":"x"}"#).unwrap();
        assert_eq!(RemoteEntry::from(raw).size, 0);
    }

    #[test]
    fn session_parses_authorize_response() {
        let session: Session = serde_json::from_str(
            r#"{"accountId":"acc","authorizationToken":"tok","apiUrl":"https://api","downloadUrl":"https://dl","allowed":{}}"#,
        )
        .unwrap();
        assert_eq!(session.auth_token, "tok");
        assert_eq!(session.api_base_url, "https://api");
        assert_eq!(session.download_base_url, "https://dl");
    }
}
