use async_trait::async_trait;
use lettre::address::AddressError;
use std::fmt;
use thiserror::Error;

mod mock_mailer;
mod smtp_impl;

#[allow(unused_imports)]
pub use mock_mailer::{MockMailer, RecordedEmail};
pub use smtp_impl::SmtpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Error: {0}")]
    Other(String),
    #[error("Invalid Address: {0}")]
    InvalidEmailAddress(String),
    #[error("Send error: {0}")]
    SendError(String),
    #[error("Env Var Missing: {0}")]
    EnvVarMissing(String),
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        MailError::SendError(err.to_string())
    }
}

impl From<std::env::VarError> for MailError {
    fn from(err: std::env::VarError) -> Self {
        MailError::EnvVarMissing(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        MailError::SendError(err.to_string())
    }
}

impl From<AddressError> for MailError {
    fn from(e: AddressError) -> Self {
        MailError::InvalidEmailAddress(e.to_string())
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email_generic(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    StartTls,
    Implicit,
    None,
}

impl TlsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsMode::StartTls => "starttls",
            TlsMode::Implicit => "implicit_tls",
            TlsMode::None => "none",
        }
    }

    /// Unknown values fall back to STARTTLS, or implicit TLS on port 465.
    pub fn from_env_value(value: Option<&str>, port: u16) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("none") | Some("disabled") => TlsMode::None,
            Some("implicit") | Some("implicit_tls") | Some("tls") => TlsMode::Implicit,
            Some("starttls") => TlsMode::StartTls,
            _ if port == 465 => TlsMode::Implicit,
            _ => TlsMode::StartTls,
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub tls_mode: TlsMode,
}

impl SmtpConfig {
    pub fn from_env() -> Result<Self, MailError> {
        let host = std::env::var("SMTP_HOST")?;
        let port: u16 = std::env::var("SMTP_PORT")?
            .parse()
            .map_err(|_| MailError::Other("SMTP_PORT must be a port number".into()))?;
        let tls_mode = TlsMode::from_env_value(std::env::var("SMTP_TLS_MODE").ok().as_deref(), port);

        Ok(Self {
            host,
            port,
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            from: std::env::var("SMTP_FROM")?,
            tls_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_mode_defaults_follow_port() {
        assert_eq!(TlsMode::from_env_value(None, 587), TlsMode::StartTls);
        assert_eq!(TlsMode::from_env_value(None, 465), TlsMode::Implicit);
        assert_eq!(TlsMode::from_env_value(Some("NONE"), 25), TlsMode::None);
        assert_eq!(TlsMode::from_env_value(Some("starttls"), 465), TlsMode::StartTls);
    }
}
