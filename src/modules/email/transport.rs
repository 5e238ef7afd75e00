use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::modules::error::ErrorKind;
use crate::modules::providers::ResolvedCredential;

/// Errors reported by a mail transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid transport configuration: {0}")]
    Configuration(String),

    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("server rejected the connection handshake")]
    HandshakeRejected,

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transport
    }
}

/// Everything a transport needs to reach and authenticate against one server
#[derive(Clone)]
pub struct SmtpEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
}

impl From<ResolvedCredential> for SmtpEndpoint {
    fn from(credential: ResolvedCredential) -> Self {
        Self {
            host: credential.host,
            port: credential.port,
            username: credential.username,
            password: credential.password,
            use_tls: credential.use_tls,
        }
    }
}

impl fmt::Debug for SmtpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

/// Capability to deliver a composed message over SMTP
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Connect, authenticate and transmit `message`
    async fn send(&self, endpoint: &SmtpEndpoint, message: Message) -> Result<(), TransportError>;

    /// Connect and authenticate only; nothing is transmitted
    async fn handshake(&self, endpoint: &SmtpEndpoint) -> Result<(), TransportError>;
}

/// `MailTransport` backed by lettre's tokio SMTP client
pub struct SmtpMailTransport {
    io_timeout: Option<Duration>,
}

impl SmtpMailTransport {
    pub fn new() -> Self {
        Self {
            io_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Socket-level timeout applied inside lettre, independent of the dispatch deadline
    pub fn with_io_timeout(io_timeout: Option<Duration>) -> Self {
        Self { io_timeout }
    }

    fn build(&self, endpoint: &SmtpEndpoint) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
        // use_tls means implicit TLS on connect; otherwise upgrade with STARTTLS when offered
        let builder = if endpoint.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&endpoint.host)?
        } else {
            let parameters = TlsParameters::new(endpoint.host.clone())
                .map_err(|e| TransportError::Configuration(e.to_string()))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&endpoint.host)
                .tls(Tls::Opportunistic(parameters))
        };

        Ok(builder
            .port(endpoint.port)
            .credentials(Credentials::new(
                endpoint.username.clone(),
                endpoint.password.clone(),
            ))
            .timeout(self.io_timeout)
            .build())
    }
}

impl Default for SmtpMailTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, endpoint: &SmtpEndpoint, message: Message) -> Result<(), TransportError> {
        let mailer = self.build(endpoint)?;
        mailer.send(message).await?;
        Ok(())
    }

    async fn handshake(&self, endpoint: &SmtpEndpoint) -> Result<(), TransportError> {
        let mailer = self.build(endpoint)?;
        if mailer.test_connection().await? {
            Ok(())
        } else {
            Err(TransportError::HandshakeRejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(use_tls: bool) -> SmtpEndpoint {
        SmtpEndpoint {
            host: "smtp.example.com".to_string(),
            port: if use_tls { 465 } else { 587 },
            username: "mailer@example.com".to_string(),
            password: "app-password".to_string(),
            use_tls,
        }
    }

    #[tokio::test]
    async fn test_transport_builds_for_both_modes() {
        let transport = SmtpMailTransport::new();
        assert!(transport.build(&endpoint(true)).is_ok());
        assert!(transport.build(&endpoint(false)).is_ok());
    }

    #[test]
    fn test_endpoint_from_credential() {
        let credential = ResolvedCredential {
            name: "primary".to_string(),
            host: "smtp.example.com".to_string(),
            port: 2525,
            username: "user".to_string(),
            password: "secret".to_string(),
            from: None,
            use_tls: true,
        };
        let endpoint = SmtpEndpoint::from(credential);
        assert_eq!(endpoint.port, 2525);
        assert!(endpoint.use_tls);
        assert!(!format!("{:?}", endpoint).contains("secret"));
    }
}
