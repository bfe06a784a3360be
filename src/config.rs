//! IMAP connection parameters

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How the TCP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// TLS from the first byte (IMAPS).
    #[default]
    Tls,
    /// Plaintext connect, upgraded with the STARTTLS command.
    StartTls,
    /// No encryption at all.
    Plain,
}

impl TransportMode {
    /// Conventional port for this transport.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tls => 993,
            Self::StartTls | Self::Plain => 143,
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tls => "tls",
            Self::StartTls => "starttls",
            Self::Plain => "plain",
        })
    }
}

impl FromStr for TransportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" | "imaps" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "plain" | "none" => Ok(Self::Plain),
            other => Err(Error::Config(format!("Unknown transport mode: {other}"))),
        }
    }
}

/// Everything needed to open one IMAP session.
///
/// The password is expected already decrypted; it is held only for the
/// lifetime of the value and never written anywhere.
#[derive(Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub transport: TransportMode,
    /// Upper bound for each network step (connect, command round-trip).
    pub timeout: Option<Duration>,
    /// Skip certificate verification (self-signed servers, bridges).
    pub accept_invalid_certs: bool,
}

impl ConnectionParams {
    /// Parameters with the transport's default port, no timeout and
    /// certificate verification enabled.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        transport: TransportMode,
    ) -> Self {
        Self {
            host: host.into(),
            port: transport.default_port(),
            username: username.into(),
            password: password.into(),
            transport,
            timeout: None,
            accept_invalid_certs: false,
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Load connection parameters from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_HOST`
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_TRANSPORT` (default: `tls`; also `starttls`, `plain`)
    /// - `IMAP_PORT` (default: 993 for TLS, 143 otherwise)
    /// - `IMAP_TIMEOUT_SECS` (default: no timeout)
    /// - `IMAP_ACCEPT_INVALID_CERTS` (default: `false`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required variable is missing or
    /// a value does not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let transport = env::var("IMAP_TRANSPORT")
            .map_or(Ok(TransportMode::default()), |v| v.parse())?;

        let port = match env::var("IMAP_PORT") {
            Ok(v) => v
                .parse()
                .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
            Err(_) => transport.default_port(),
        };

        let timeout = match env::var("IMAP_TIMEOUT_SECS") {
            Ok(v) => Some(Duration::from_secs(v.parse().map_err(|e| {
                Error::Config(format!("Invalid IMAP_TIMEOUT_SECS: {e}"))
            })?)),
            Err(_) => None,
        };

        let accept_invalid_certs = match env::var("IMAP_ACCEPT_INVALID_CERTS") {
            Ok(v) => parse_bool(&v)
                .ok_or_else(|| Error::Config(format!("Invalid IMAP_ACCEPT_INVALID_CERTS: {v}")))?,
            Err(_) => false,
        };

        Ok(Self {
            host: env::var("IMAP_HOST").map_err(|_| Error::Config("IMAP_HOST not set".into()))?,
            port,
            username: env::var("IMAP_USERNAME")
                .map_err(|_| Error::Config("IMAP_USERNAME not set".into()))?,
            password: env::var("IMAP_PASSWORD")
                .map_err(|_| Error::Config("IMAP_PASSWORD not set".into()))?,
            transport,
            timeout,
            accept_invalid_certs,
        })
    }

    /// `host:port` string used for the TCP connect.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("transport", &self.transport)
            .field("timeout", &self.timeout)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
