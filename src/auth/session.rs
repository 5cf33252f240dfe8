//! Session authenticator (§4.4): exchange login, HMAC-signed session
//! establishment, token lifetime tracking, background refresh.

use crate::auth::credentials::{AuthMethod, Credentials, HeaderSet};
use crate::error::AuthError;
use crate::time::wall_clock_secs;
use anyhow::{anyhow, Context, Result};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

type HmacSha256 = Hmac<Sha256>;

const USER_AGENT: &str = "GoldEarn-HFT/1.0";
const TOKEN_LIFETIME_SECS: u64 = 8 * 60 * 60;
const REFRESH_LEAD_SECS: u64 = 30 * 60;
const REFRESH_RETRY_DELAY_SECS: u64 = 5 * 60;

/// `(success, message)` delivered to the user-supplied auth callback.
pub type AuthCallback = Arc<dyn Fn(bool, String) + Send + Sync>;

/// Generates a CSPRNG-backed 128-bit session id as lowercase hex, refusing
/// to fall back to a weaker source on failure (§4.4 security rules).
fn generate_session_id() -> Result<String, AuthError> {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.try_fill_bytes(&mut bytes).map_err(|_| AuthError::CsprngFailure)?;
    Ok(hex::encode(bytes))
}

fn sign(secret_key: &str, api_key: &str, timestamp: u64, session_id: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).context("invalid HMAC key length")?;
    mac.update(api_key.as_bytes());
    mac.update(timestamp.to_string().as_bytes());
    mac.update(session_id.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time secret comparison.
pub fn secrets_equal(a: &str, b: &str) -> bool {
    use subtle_compare::compare;
    compare(a.as_bytes(), b.as_bytes())
}

mod subtle_compare {
    /// Compares two byte slices in time proportional to their max length,
    /// never short-circuiting on the first mismatch.
    pub fn compare(a: &[u8], b: &[u8]) -> bool {
        let len_ok = a.len() == b.len();
        let n = a.len().max(b.len());
        let mut diff = 0u8;
        for i in 0..n {
            let av = a.get(i).copied().unwrap_or(0);
            let bv = b.get(i).copied().unwrap_or(0);
            diff |= av ^ bv;
        }
        len_ok && diff == 0
    }
}

/// Parses `Authorization`-style headers, accepting only a single `Bearer`
/// or `ApiKey` prefix (§4.4 security rules).
pub fn parse_auth_header(value: &str) -> Option<(&'static str, &str)> {
    if let Some(rest) = value.strip_prefix("Bearer ") {
        Some(("Bearer", rest))
    } else if let Some(rest) = value.strip_prefix("ApiKey ") {
        Some(("ApiKey", rest))
    } else {
        None
    }
}

#[derive(serde::Deserialize)]
struct LoginResponseBody {
    session_token: Option<String>,
    access_token: Option<String>,
}

pub struct SessionAuthenticator {
    login_url: String,
    http: reqwest::Client,
    credentials: RwLock<Credentials>,
    running: Arc<AtomicBool>,
    refresh_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
    callback: Option<AuthCallback>,
}

impl SessionAuthenticator {
    pub fn new(login_url: impl Into<String>, credentials: Credentials, callback: Option<AuthCallback>) -> Self {
        Self {
            login_url: login_url.into(),
            http: reqwest::Client::new(),
            credentials: RwLock::new(credentials),
            running: Arc::new(AtomicBool::new(false)),
            refresh_handle: parking_lot::Mutex::new(None),
            callback,
        }
    }

    fn notify(&self, success: bool, message: impl Into<String>) {
        let message = message.into();
        if success {
            info!(%message, "auth event");
        } else {
            warn!(%message, "auth event");
        }
        if let Some(cb) = &self.callback {
            cb(success, message);
        }
    }

    /// Exchange login: builds the signed payload, POSTs it, and stores the
    /// returned token with an 8h expiry.
    pub async fn authenticate(&self) -> Result<()> {
        let creds = self.credentials.read().await.clone();
        match creds.method {
            AuthMethod::ApiKey => self.authenticate_api_key(&creds).await,
            AuthMethod::Certificate => self.authenticate_certificate(&creds).await,
            AuthMethod::OAuth2 => Err(anyhow!("OAuth2 login is declared but not implemented")),
            AuthMethod::SessionToken => {
                if creds.session_token.is_some() {
                    Ok(())
                } else {
                    Err(AuthError::MissingCredentials.into())
                }
            }
        }
    }

    async fn authenticate_api_key(&self, creds: &Credentials) -> Result<()> {
        let (api_key, secret_key) = match (&creds.api_key, &creds.secret_key) {
            (Some(a), Some(s)) => (a.clone(), s.clone()),
            _ => {
                self.notify(false, "missing credentials");
                return Err(AuthError::MissingCredentials.into());
            }
        };
        let timestamp = wall_clock_secs();
        let session_id = generate_session_id().map_err(|e| {
            self.notify(false, e.to_string());
            e
        })?;
        let signature = sign(&secret_key, &api_key, timestamp, &session_id)?;

        let body = serde_json::json!({
            "api_key": api_key,
            "timestamp": timestamp,
            "session_id": session_id,
            "signature": signature,
        });

        let response = self
            .http
            .post(&self.login_url)
            .json(&body)
            .send()
            .await
            .context("login request failed")?;

        let status = response.status();
        if status.as_u16() != 200 {
            self.notify(false, format!("login HTTP {status}"));
            return Err(AuthError::HttpStatus(status.as_u16()).into());
        }

        let parsed: LoginResponseBody = response.json().await.context("unparseable login response")?;
        let token = parsed
            .session_token
            .or(parsed.access_token)
            .ok_or(AuthError::MalformedToken)?;

        let mut creds = self.credentials.write().await;
        creds.session_token = Some(token);
        creds.token_expiry = Some(timestamp + TOKEN_LIFETIME_SECS);
        drop(creds);

        self.notify(true, "login succeeded");
        Ok(())
    }

    async fn authenticate_certificate(&self, creds: &Credentials) -> Result<()> {
        let (cert, key) = match (&creds.cert_path, &creds.key_path) {
            (Some(c), Some(k)) => (c.clone(), k.clone()),
            _ => return Err(AuthError::MissingCredentials.into()),
        };
        if !std::path::Path::new(&cert).exists() {
            return Err(AuthError::FileNotFound(cert).into());
        }
        if !std::path::Path::new(&key).exists() {
            return Err(AuthError::FileNotFound(key).into());
        }
        self.notify(true, "certificate credentials verified");
        Ok(())
    }

    pub async fn headers(&self) -> HeaderSet {
        let creds = self.credentials.read().await;
        let mut set = HeaderSet::common(USER_AGENT);
        match creds.method {
            AuthMethod::ApiKey => {
                if let Some(key) = &creds.api_key {
                    set.headers.push(("X-API-Key".to_string(), key.clone()));
                }
                if let Some(token) = &creds.session_token {
                    set.headers.push(("X-Session-Token".to_string(), token.clone()));
                }
            }
            AuthMethod::OAuth2 | AuthMethod::SessionToken | AuthMethod::Certificate => {
                if let Some(token) = creds.session_token.as_ref().or(creds.oauth_token.as_ref()) {
                    set.headers.push(("Authorization".to_string(), format!("Bearer {token}")));
                }
            }
        }
        set
    }

    pub async fn token_expiry(&self) -> Option<u64> {
        self.credentials.read().await.token_expiry
    }

    /// Spawns the background refresh task if `auto_refresh` is set.
    /// Idempotent; calling twice is a no-op while already running.
    pub fn start_refresh(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let this = self.clone();
        let handle = tokio::spawn(async move {
            this.refresh_loop().await;
        });
        *self.refresh_handle.lock() = Some(handle);
    }

    async fn refresh_loop(self: Arc<Self>) {
        loop {
            if !self.running.load(Ordering::Acquire) {
                return;
            }
            let auto_refresh = self.credentials.read().await.auto_refresh;
            if !auto_refresh {
                return;
            }
            let expiry = match self.token_expiry().await {
                Some(e) => e,
                None => {
                    tokio::time::sleep(std::time::Duration::from_secs(REFRESH_RETRY_DELAY_SECS)).await;
                    continue;
                }
            };
            let now = wall_clock_secs();
            let sleep_until = expiry.saturating_sub(REFRESH_LEAD_SECS);
            let sleep_secs = sleep_until.saturating_sub(now);
            tokio::time::sleep(std::time::Duration::from_secs(sleep_secs)).await;
            if !self.running.load(Ordering::Acquire) {
                return;
            }
            match self.authenticate().await {
                Ok(()) => info!("token refreshed"),
                Err(e) => {
                    error!(error = %e, "token refresh failed, retrying later");
                    tokio::time::sleep(std::time::Duration::from_secs(REFRESH_RETRY_DELAY_SECS)).await;
                }
            }
        }
    }

    pub fn stop_refresh(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.refresh_handle.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for SessionAuthenticator {
    fn drop(&mut self) {
        self.stop_refresh();
    }
}
