//! Connection and transfer settings

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::b2::Credentials;
use crate::error::{TransferError, TransferResult};

pub const DEFAULT_PRIVATE_TTL: u32 = 3600;
pub const MAX_PRIVATE_TTL: u32 = 604_800;

/// TTL as typed by the user: a number in a JSON file, a string from a form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TtlInput {
    Seconds(i64),
    Text(String),
}

impl Default for TtlInput {
    fn default() -> Self {
        TtlInput::Text(String::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff_step_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_secs: 2,
            max_backoff_secs: 5,
        }
    }
}

impl RetrySettings {
    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_step_secs: 0,
            max_backoff_secs: 0,
        }
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_secs(self.backoff_step_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

/// Unvalidated settings, as loaded from a config file or flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigInput {
    pub key_id: String,
    pub app_key: String,
    pub bucket_id: String,
    pub bucket_name: String,
    pub prefix: String,
    pub private_ttl: TtlInput,
    pub auth_url: Option<String>,
    pub retry: RetrySettings,
}

/// Validated settings for one engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub credentials: Credentials,
    pub bucket_id: String,
    pub bucket_name: String,
    pub prefix: String,
    pub private_ttl: u32,
    pub auth_url: Option<String>,
    pub retry: RetrySettings,
}

impl TransferConfig {
    pub fn require_bucket_id(&self) -> TransferResult<&str> {
        require_field(&self.bucket_id, "Bucket ID is empty.")
    }

    pub fn require_bucket_name(&self) -> TransferResult<&str> {
        require_field(&self.bucket_name, "Bucket Name is empty.")
    }
}

fn require_field<'a>(value: &'a str, message: &str) -> TransferResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(TransferError::validation(message))
    } else {
        Ok(value)
    }
}

/// Validate raw input into a [`TransferConfig`].
///
/// Bucket fields may stay blank here; operations that need them check on use.
pub fn build_transfer_config(input: ConfigInput) -> TransferResult<TransferConfig> {
    let credentials = Credentials::new(input.key_id.trim(), input.app_key.trim());
    if !credentials.is_complete() {
        return Err(TransferError::validation(
            "Fill Application Key ID and Application Key.",
        ));
    }

    let private_ttl = match &input.private_ttl {
        TtlInput::Seconds(seconds) => validate_ttl(*seconds)?,
        TtlInput::Text(text) => parse_ttl_seconds(text)?,
    };

    if input.retry.max_attempts == 0 {
        return Err(TransferError::validation(
            "Retry attempts must be at least 1.",
        ));
    }

    Ok(TransferConfig {
        credentials,
        bucket_id: input.bucket_id.trim().to_string(),
        bucket_name: input.bucket_name.trim().to_string(),
        prefix: input.prefix.trim().trim_matches('/').to_string(),
        private_ttl,
        auth_url: input
            .auth_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()),
        retry: input.retry,
    })
}

/// Parse a TTL typed as text. Blank means the default.
pub fn parse_ttl_seconds(raw: &str) -> TransferResult<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_PRIVATE_TTL);
    }
    let seconds: i64 = raw
        .parse()
        .map_err(|_| TransferError::validation("Private URL TTL must be an integer."))?;
    validate_ttl(seconds)
}

pub fn validate_ttl(seconds: i64) -> TransferResult<u32> {
    if !(1..=i64::from(MAX_PRIVATE_TTL)).contains(&seconds) {
        return Err(TransferError::validation(format!(
            "Private URL TTL must be between 1 and {} seconds.",
            MAX_PRIVATE_TTL
        )));
    }
    Ok(seconds as u32)
}

/// Read a JSON config file into [`ConfigInput`]
pub async fn load_config_file(path: &Path) -> TransferResult<ConfigInput> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ConfigInput {
        ConfigInput {
            key_id: " kid ".into(),
            app_key: "secret".into(),
            bucket_id: "bid".into(),
            bucket_name: "photos".into(),
            prefix: "/backup/2024/".into(),
            ..Default::default()
        }
    }

    #[test]
    fn builds_with_defaults() {
        let config = build_transfer_config(input()).unwrap();
        assert_eq!(config.credentials, Credentials::new("kid", "secret"));
        assert_eq!(config.prefix, "backup/2024");
        assert_eq!(config.private_ttl, DEFAULT_PRIVATE_TTL);
        assert_eq!(config.retry, RetrySettings::default());
        assert_eq!(config.auth_url, None);
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let mut raw = input();
        raw.app_key = "  ".into();
        let err = build_transfer_config(raw).unwrap_err();
        assert!(matches!(err, TransferError::Validation(_)));
    }

    #[test]
    fn ttl_text_must_be_an_integer_in_range() {
        assert_eq!(parse_ttl_seconds("").unwrap(), 3600);
        assert_eq!(parse_ttl_seconds(" 60 ").unwrap(), 60);
        assert_eq!(parse_ttl_seconds("604800").unwrap(), MAX_PRIVATE_TTL);
        assert_eq!(
            parse_ttl_seconds("1h").unwrap_err().to_string(),
            "Private URL TTL must be an integer."
        );
        assert_eq!(
            parse_ttl_seconds("0").unwrap_err().to_string(),
            "Private URL TTL must be between 1 and 604800 seconds."
        );
        assert!(parse_ttl_seconds("604801").is_err());
    }

    #[test]
    fn ttl_accepts_number_or_string_in_json() {
        let parsed: ConfigInput =
            serde_json::from_str(r#"{"key_id":"k","app_key":"a","private_ttl":120}"#).unwrap();
        assert_eq!(build_transfer_config(parsed).unwrap().private_ttl, 120);

        let parsed: ConfigInput =
            serde_json::from_str(r#"{"key_id":"k","app_key":"a","private_ttl":"90"}"#).unwrap();
        assert_eq!(build_transfer_config(parsed).unwrap().private_ttl, 90);
    }

    #[test]
    fn blank_bucket_fields_fail_on_use() {
        let mut raw = input();
        raw.bucket_id = String::new();
        let config = build_transfer_config(raw).unwrap();
        assert_eq!(
            config.require_bucket_id().unwrap_err().to_string(),
            "Bucket ID is empty."
        );
        assert_eq!(config.require_bucket_name().unwrap(), "photos");
    }

    #[tokio::test]
    async fn loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bucketdesk.json");
        std::fs::write(
            &path,
            r#"{"key_id":"k","app_key":"a","bucket_name":"b","retry":{"max_attempts":5}}"#,
        )
        .unwrap();

        let loaded = load_config_file(&path).await.unwrap();
        assert_eq!(loaded.bucket_name, "b");
        assert_eq!(loaded.retry.max_attempts, 5);
        assert_eq!(loaded.retry.backoff_step_secs, 2);
    }
}
