//! Domain error types.
//!
//! Fallible call-site boundaries return `anyhow::Result`; the enums in this
//! module are the typed errors that get wrapped or matched on by callers
//! that need to distinguish failure modes (e.g. the risk engine's rejection
//! codes, or the wire codec's header validation).

use std::fmt;

/// Header/payload validation failures in the wire codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    InvalidSize { expected_at_least: usize, got: usize },
    UnknownMsgType(u8),
    UnknownExchange(u8),
    LengthOutOfRange { len: usize, min: usize, max: usize },
    ChecksumMismatch,
    TruncatedFrame,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::InvalidSize { expected_at_least, got } => write!(
                f,
                "buffer too small: expected at least {expected_at_least} bytes, got {got}"
            ),
            WireError::UnknownMsgType(t) => write!(f, "unknown msg_type byte: {t}"),
            WireError::UnknownExchange(e) => write!(f, "unknown exchange byte: {e}"),
            WireError::LengthOutOfRange { len, min, max } => {
                write!(f, "msg_length {len} out of range [{min}, {max}]")
            }
            WireError::ChecksumMismatch => write!(f, "checksum mismatch"),
            WireError::TruncatedFrame => write!(f, "truncated frame"),
        }
    }
}

impl std::error::Error for WireError {}

/// Authentication failure modes (§7: authentication errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingCredentials,
    FileNotFound(String),
    HttpStatus(u16),
    MalformedToken,
    TlsHandshake(String),
    CsprngFailure,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "missing credentials"),
            AuthError::FileNotFound(p) => write!(f, "file not found: {p}"),
            AuthError::HttpStatus(s) => write!(f, "unexpected HTTP status: {s}"),
            AuthError::MalformedToken => write!(f, "malformed or missing session token"),
            AuthError::TlsHandshake(reason) => write!(f, "TLS handshake failed: {reason}"),
            AuthError::CsprngFailure => write!(f, "CSPRNG failure during key generation"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Fatal configuration errors — the process refuses to continue (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ProductionPointsAtTestEndpoint(String),
    MissingRequiredKey(String),
    CertificatePathMissing(String),
    EmptySecret(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ProductionPointsAtTestEndpoint(host) => {
                write!(f, "production mode refuses test endpoint: {host}")
            }
            ConfigError::MissingRequiredKey(k) => write!(f, "missing required config key: {k}"),
            ConfigError::CertificatePathMissing(p) => write!(f, "certificate path missing: {p}"),
            ConfigError::EmptySecret(k) => write!(f, "secret field empty: {k}"),
        }
    }
}

impl std::error::Error for ConfigError {}
