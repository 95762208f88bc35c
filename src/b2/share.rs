//! Direct object URLs and scoped download authorization

use super::session::B2Client;
use super::types::{DownloadAuthorizationRequest, DownloadAuthorizationResponse};
use crate::config::validate_ttl;
use crate::error::{TransferError, TransferResult};

/// Encode an object key for use in a URL or header - encode each segment
/// individually, keep / as separator
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build `{download_base}/file/{bucket}/{key}[?Authorization=token]`
pub fn direct_url(
    download_base_url: &str,
    bucket_name: &str,
    key: &str,
    auth_token: Option<&str>,
) -> String {
    let url = format!(
        "{}/file/{}/{}",
        download_base_url.trim_end_matches('/'),
        bucket_name,
        encode_key(key)
    );
    match auth_token {
        Some(token) if !token.is_empty() => {
            format!("{}?Authorization={}", url, urlencoding::encode(token))
        }
        _ => url,
    }
}

impl B2Client {
    /// Direct URL for an object using the session's download base
    pub fn make_direct_url(
        &self,
        bucket_name: &str,
        key: &str,
        auth_token: Option<&str>,
    ) -> TransferResult<String> {
        let session = self.session()?;
        if session.download_base_url.is_empty() {
            return Err(TransferError::NotAuthorized);
        }
        Ok(direct_url(
            &session.download_base_url,
            bucket_name,
            key,
            auth_token,
        ))
    }

    /// Request a short-lived token for keys starting with `key_prefix`
    pub async fn get_download_authorization(
        &self,
        bucket_id: &str,
        key_prefix: &str,
        valid_seconds: u32,
    ) -> TransferResult<String> {
        let valid_seconds = validate_ttl(i64::from(valid_seconds))?;
        let request = DownloadAuthorizationRequest {
            bucket_id,
            file_name_prefix: key_prefix,
            valid_duration_in_seconds: valid_seconds,
        };
        let response: DownloadAuthorizationResponse = self
            .post_api("b2_get_download_authorization", &request)
            .await?;
        Ok(response.authorization_token)
    }

    /// Time-limited link for a private bucket
    pub async fn private_link(
        &self,
        bucket_id: &str,
        bucket_name: &str,
        key: &str,
        valid_seconds: u32,
    ) -> TransferResult<String> {
        let token = self
            .get_download_authorization(bucket_id, key, valid_seconds)
            .await?;
        self.make_direct_url(bucket_name, key, Some(&token))
    }
}
