//! B2 client: authorization state and authorized API calls

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::types::{Credentials, Session, DEFAULT_AUTH_URL};
use crate::error::{read_failure, TransferError, TransferResult};

/// Tokens are valid for 24h; refresh an hour early.
const SESSION_MAX_AGE: Duration = Duration::from_secs(23 * 60 * 60);

struct CachedSession {
    credentials: Credentials,
    session: Session,
    authorized_at: Instant,
}

/// Client for the B2 native API.
///
/// Holds at most one live [`Session`]. Re-authorization is keyed on the raw
/// credential pair: a cached token is reused until the pair changes or the
/// token ages out. Callers must serialize concurrent authorizations.
pub struct B2Client {
    http: Client,
    auth_url: String,
    state: Mutex<Option<CachedSession>>,
}

impl B2Client {
    pub fn new(auth_url: Option<&str>) -> TransferResult<Self> {
        let http = Client::builder().build()?;
        Ok(Self::with_http(http, auth_url))
    }

    pub fn with_http(http: Client, auth_url: Option<&str>) -> Self {
        Self {
            http,
            auth_url: auth_url
                .unwrap_or(DEFAULT_AUTH_URL)
                .trim_end_matches('/')
                .to_string(),
            state: Mutex::new(None),
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Exchange credentials for a session, replacing any cached one.
    pub async fn authorize(&self, credentials: &Credentials) -> TransferResult<Session> {
        let basic = BASE64.encode(format!("{}:{}", credentials.key_id, credentials.app_key));
        let url = format!("{}/b2api/v2/b2_authorize_account", self.auth_url);
        debug!("authorize_start: key_id={}", credentials.key_id);

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Basic {}", basic))
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = read_failure(response).await;
            return Err(TransferError::Auth { status, message });
        }

        let session: Session = response.json().await?;
        info!(
            "authorize_done: account_id={} api_url={}",
            session.account_id, session.api_base_url
        );

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = Some(CachedSession {
            credentials: credentials.clone(),
            session: session.clone(),
            authorized_at: Instant::now(),
        });
        Ok(session)
    }

    /// Reuse the cached session when it was issued for the same credential
    /// pair and is still fresh, otherwise authorize again.
    pub async fn ensure_authorized(&self, credentials: &Credentials) -> TransferResult<Session> {
        if !credentials.is_complete() {
            return Err(TransferError::validation(
                "Fill Application Key ID and Application Key.",
            ));
        }
        if let Some(session) = self.cached_for(credentials) {
            return Ok(session);
        }
        self.authorize(credentials).await
    }

    fn cached_for(&self, credentials: &Credentials) -> Option<Session> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .as_ref()
            .filter(|cached| {
                cached.credentials == *credentials
                    && !cached.session.auth_token.is_empty()
                    && cached.authorized_at.elapsed() < SESSION_MAX_AGE
            })
            .map(|cached| cached.session.clone())
    }

    /// Current session, or `NotAuthorized` when none is held.
    pub fn session(&self) -> TransferResult<Session> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.as_ref() {
            Some(cached)
                if !cached.session.auth_token.is_empty()
                    && !cached.session.api_base_url.is_empty() =>
            {
                Ok(cached.session.clone())
            }
            _ => Err(TransferError::NotAuthorized),
        }
    }

    /// Drop the cached session, e.g. after the service rejected its token.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = None;
    }

    /// POST a JSON body to an authorized API endpoint.
    pub(crate) async fn post_api<B, R>(&self, endpoint: &str, body: &B) -> TransferResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let session = self.session()?;
        let url = format!(
            "{}/b2api/v2/{}",
            session.api_base_url.trim_end_matches('/'),
            endpoint
        );

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, &session.auth_token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = read_failure(response).await;
            debug!("api_failed: {} status={} message={}", endpoint, status, message);
            return Err(TransferError::Api { status, message });
        }

        Ok(response.json().await?)
    }
}
