//! Credential record (§3) and outbound header rendering (§4.4).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    Certificate,
    OAuth2,
    SessionToken,
}

/// Secrets here are never logged; `Debug` is implemented by hand to keep
/// `secret_key`/`oauth_token` out of any derived output.
#[derive(Clone)]
pub struct Credentials {
    pub method: AuthMethod,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    pub session_token: Option<String>,
    pub oauth_token: Option<String>,
    pub token_expiry: Option<u64>,
    pub auto_refresh: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("method", &self.method)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("oauth_token", &self.oauth_token.as_ref().map(|_| "<redacted>"))
            .field("token_expiry", &self.token_expiry)
            .field("auto_refresh", &self.auto_refresh)
            .finish()
    }
}

impl Credentials {
    pub fn api_key_method(api_key: String, secret_key: String, auto_refresh: bool) -> Self {
        Self {
            method: AuthMethod::ApiKey,
            api_key: Some(api_key),
            secret_key: Some(secret_key),
            cert_path: None,
            key_path: None,
            session_token: None,
            oauth_token: None,
            token_expiry: None,
            auto_refresh,
        }
    }

    pub fn certificate_method(cert_path: String, key_path: String) -> Self {
        Self {
            method: AuthMethod::Certificate,
            api_key: None,
            secret_key: None,
            cert_path: Some(cert_path),
            key_path: Some(key_path),
            session_token: None,
            oauth_token: None,
            token_expiry: None,
            auto_refresh: false,
        }
    }

    pub fn is_expired(&self, now_secs: u64) -> bool {
        match self.token_expiry {
            Some(expiry) => now_secs >= expiry,
            None => true,
        }
    }
}

/// Outbound header set, rendered from the active credentials.
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    pub headers: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn common(user_agent: &str) -> Self {
        Self {
            headers: vec![
                ("User-Agent".to_string(), user_agent.to_string()),
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
        }
    }
}
