//! Error types for address lookups.
//!
//! Every failure is final for the invocation: nothing here is retried. The binary maps each
//! variant to a distinct process exit status (see [`Error::exit_code`]).

use thiserror::Error;

/// Main error type for mutt-ldap operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The configuration file could not be read or is malformed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The directory server could not be reached, initialized or upgraded to TLS
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    /// The bind (simple or GSSAPI) was rejected
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// The search was rejected or failed mid-flight
    #[error("Search failed: {0}")]
    SearchError(String),

    /// A directory operation did not complete in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Results could not be written out
    #[error("Output error: {0}")]
    OutputError(String),
}

/// Specialized result type for mutt-ldap operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ConnectionError(_) => "CONNECTION_ERROR",
            Self::AuthError(_) => "AUTH_ERROR",
            Self::SearchError(_) => "SEARCH_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::OutputError(_) => "OUTPUT_ERROR",
        }
    }

    /// Process exit status for this error, following `sysexits.h`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigError(_) => 78,
            Self::ConnectionError(_) | Self::Timeout(_) => 69,
            Self::AuthError(_) => 77,
            Self::SearchError(_) => 65,
            Self::OutputError(_) => 74,
        }
    }
}

impl From<ini::ParseError> for Error {
    fn from(err: ini::ParseError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(format!("invalid server URL: {err}"))
    }
}
