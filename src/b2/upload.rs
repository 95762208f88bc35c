//! B2 upload calls (upload target, raw upload)

use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Body;
use serde_json::json;

use super::session::B2Client;
use super::share::encode_key;
use super::types::{UploadTarget, UploadedFile};
use crate::error::{read_failure, TransferError, TransferResult};

/// Let the service pick the content type from the file extension
const AUTO_CONTENT_TYPE: &str = "b2/x-auto";

impl B2Client {
    /// Request a fresh one-time upload target for a bucket
    pub async fn get_upload_url(&self, bucket_id: &str) -> TransferResult<UploadTarget> {
        self.post_api("b2_get_upload_url", &json!({ "bucketId": bucket_id }))
            .await
    }

    /// POST the file body to an upload target. `sha1_hex` must be the digest
    /// of exactly `content_length` bytes produced by `body`.
    pub async fn send_upload(
        &self,
        target: &UploadTarget,
        key: &str,
        sha1_hex: &str,
        content_length: u64,
        body: Body,
    ) -> TransferResult<UploadedFile> {
        debug!(
            "upload_request: key={} content_length={} sha1={}",
            key, content_length, sha1_hex
        );
        let response = self
            .http()
            .post(&target.upload_url)
            .header(AUTHORIZATION, &target.upload_auth_token)
            .header("X-Bz-File-Name", encode_key(key))
            .header(CONTENT_TYPE, AUTO_CONTENT_TYPE)
            .header(CONTENT_LENGTH, content_length)
            .header("X-Bz-Content-Sha1", sha1_hex)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = read_failure(response).await;
            return Err(TransferError::Upload { status, message });
        }

        Ok(response.json().await?)
    }
}
