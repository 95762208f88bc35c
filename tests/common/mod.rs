#![allow(dead_code)]

use bucketdesk_lib::transfer::{
    JobContext, ProgressReporter, TransferController, TransferEvent,
};
use bucketdesk_lib::{build_transfer_config, ConfigInput, RetrySettings, TransferConfig, TransferEngine};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const ACCOUNT_TOKEN: &str = "acct-token";
pub const UPLOAD_TOKEN: &str = "upload-token";
pub const BUCKET_ID: &str = "bkt-id";
pub const BUCKET_NAME: &str = "bkt";
/// base64("kid:secret")
pub const BASIC_AUTH: &str = "Basic a2lkOnNlY3JldA==";

/// Mock server with a working authorize endpoint pointing back at itself
pub async fn start_b2() -> MockServer {
    let server = MockServer::start().await;
    mount_authorize(&server).await;
    server
}

pub async fn mount_authorize(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/b2api/v2/b2_authorize_account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body(server)))
        .mount(server)
        .await;
}

pub fn session_body(server: &MockServer) -> Value {
    json!({
        "accountId": "acct",
        "authorizationToken": ACCOUNT_TOKEN,
        "apiUrl": server.uri(),
        "downloadUrl": server.uri(),
    })
}

pub async fn mount_upload_target(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/b2api/v2/b2_get_upload_url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upload_target_body(server)))
        .mount(server)
        .await;
}

pub fn upload_target_body(server: &MockServer) -> Value {
    json!({
        "bucketId": BUCKET_ID,
        "uploadUrl": format!("{}/upload/{}", server.uri(), BUCKET_ID),
        "authorizationToken": UPLOAD_TOKEN,
    })
}

pub fn uploaded_body(key: &str, size: u64) -> Value {
    json!({
        "fileId": format!("4_z{}", key.len()),
        "fileName": key,
        "contentLength": size,
        "contentSha1": "unused",
        "uploadTimestamp": 1_700_000_000_000i64,
    })
}

pub fn listing_body(files: &[(&str, u64)], next: Option<&str>) -> Value {
    let files: Vec<Value> = files
        .iter()
        .map(|(name, size)| {
            json!({
                "fileName": name,
                "contentLength": size,
                "uploadTimestamp": 1_700_000_000_000i64,
                "fileId": format!("id-{}", name),
            })
        })
        .collect();
    json!({ "files": files, "nextFileName": next })
}

pub fn config_input(server: &MockServer, prefix: &str) -> ConfigInput {
    ConfigInput {
        key_id: "kid".into(),
        app_key: "secret".into(),
        bucket_id: BUCKET_ID.into(),
        bucket_name: BUCKET_NAME.into(),
        prefix: prefix.into(),
        auth_url: Some(server.uri()),
        retry: RetrySettings::immediate(3),
        ..Default::default()
    }
}

pub fn config(server: &MockServer, prefix: &str) -> TransferConfig {
    build_transfer_config(config_input(server, prefix)).unwrap()
}

pub fn engine(server: &MockServer, prefix: &str) -> TransferEngine {
    TransferEngine::new(config(server, prefix)).unwrap()
}

pub fn job() -> (JobContext, UnboundedReceiver<TransferEvent>) {
    let (reporter, events) = ProgressReporter::channel();
    (
        JobContext {
            controller: TransferController::new(),
            reporter,
        },
        events,
    )
}

/// Every `(percent, message)` pair sent so far
pub fn drain(events: &mut UnboundedReceiver<TransferEvent>) -> Vec<(u32, String)> {
    std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            TransferEvent::Progress { percent, message } => Some((percent, message)),
            TransferEvent::Finished { .. } => None,
        })
        .collect()
}

pub async fn requests_to(server: &MockServer, prefix: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path().starts_with(prefix))
        .collect()
}

pub fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// `X-Bz-File-Name` of every upload the server received, in order
pub async fn uploaded_names(server: &MockServer) -> Vec<String> {
    requests_to(server, "/upload/")
        .await
        .iter()
        .filter_map(|request| header_value(request, "x-bz-file-name"))
        .collect()
}
