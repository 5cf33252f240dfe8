//! TLS security posture for the feed connection (§4.2).
//!
//! The actual handshake is delegated to `tokio-tungstenite`'s
//! `rustls-tls-webpki-roots` feature (chain trust, validity window, and
//! hostname verification are all enforced there); this module is the
//! config surface that decides *whether* TLS is required and records the
//! outcome for the connection's state-change callback and logs. rustls's
//! own cipher suite set never offers static-RSA or DHE key exchange, so
//! the ECDHE+AESGCM / ECDHE+CHACHA20-only allow-list in §4.2 is satisfied
//! by the library default rather than re-specified here.

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsSecurityLevel {
    None,
    Tls12Plus,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub level: TlsSecurityLevel,
    pub ca_bundle_path: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
    pub verify_hostname: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            level: TlsSecurityLevel::Tls12Plus,
            ca_bundle_path: None,
            client_cert_path: None,
            client_key_path: None,
            verify_hostname: true,
        }
    }
}

impl SecurityConfig {
    pub fn requires_tls(&self) -> bool {
        self.level >= TlsSecurityLevel::Tls12Plus
    }

    /// Client cert paths must exist before the handshake is attempted;
    /// missing files are a transport error, not a silent fallback to
    /// unauthenticated TLS.
    pub fn validate_paths(&self) -> Result<(), crate::error::AuthError> {
        if let Some(cert) = &self.client_cert_path {
            if !std::path::Path::new(cert).exists() {
                return Err(crate::error::AuthError::FileNotFound(cert.clone()));
            }
        }
        if let Some(key) = &self.client_key_path {
            if !std::path::Path::new(key).exists() {
                return Err(crate::error::AuthError::FileNotFound(key.clone()));
            }
        }
        Ok(())
    }

    pub fn log_posture(&self) {
        if !self.verify_hostname {
            warn!("hostname verification explicitly disabled");
        } else {
            info!(level = ?self.level, "TLS security posture configured");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_security_config_requires_tls12() {
        let cfg = SecurityConfig::default();
        assert!(cfg.requires_tls());
        assert!(cfg.verify_hostname);
    }

    #[test]
    fn test_validate_paths_missing_cert() {
        let cfg = SecurityConfig {
            client_cert_path: Some("/nonexistent/cert.pem".to_string()),
            ..SecurityConfig::default()
        };
        assert!(cfg.validate_paths().is_err());
    }
}
