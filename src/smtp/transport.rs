//! Delivery seam between the handler and the wire.

use super::auth::{Authenticator, LoginAuth, PlainAuth};
use super::session::Session;
use crate::config::{AuthMethod, HandlerConfig};
use crate::error::SmtpError;
use crate::recipients::Recipients;
use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;

/// Envelope addressing for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Bare sender address used in `MAIL FROM`.
    pub from: String,
    pub recipients: Recipients,
}

/// Sends one composed message to every envelope recipient.
///
/// Implementations must be `Send + Sync` so the handler can hold them as
/// `Arc<dyn MailTransport>`; tests substitute a recording mock.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Short name for logs (e.g., "smtp", "stdout").
    fn name(&self) -> &str;

    /// Deliver `message` (headers and body) as a single transaction.
    async fn send(&self, envelope: &Envelope, message: &str) -> Result<(), SmtpError>;
}

impl std::fmt::Debug for dyn MailTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailTransport")
            .field("name", &self.name())
            .finish()
    }
}

/// SMTP delivery over one connection.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    host: String,
    port: u16,
    timeout: Duration,
    tls_skip_verify: bool,
    authenticator: Authenticator,
}

impl SmtpTransport {
    pub fn new(host: impl Into<String>, port: u16, authenticator: Authenticator) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            tls_skip_verify: false,
            authenticator,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls_skip_verify(mut self, skip: bool) -> Self {
        self.tls_skip_verify = skip;
        self
    }

    pub fn from_config(config: &HandlerConfig) -> Self {
        let authenticator = match config.auth_method {
            AuthMethod::None => Authenticator::None,
            AuthMethod::Plain => Authenticator::Plain(PlainAuth::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
                config.smtp_host.clone(),
            )),
            AuthMethod::Login => Authenticator::Login(LoginAuth::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            )),
        };

        Self::new(config.smtp_host.clone(), config.smtp_port, authenticator)
            .with_timeout(config.timeout)
            .with_tls_skip_verify(config.tls_skip_verify)
    }

    async fn converse(
        &self,
        session: &mut Session,
        envelope: &Envelope,
        message: &str,
    ) -> Result<(), SmtpError> {
        session.hello().await?;

        if session.extensions().starttls {
            session.starttls(self.tls_skip_verify).await?;
        } else {
            tracing::debug!(host = %self.host, "Server does not offer STARTTLS");
        }

        if let Some(mechanism) = self.authenticator.mechanism() {
            if session.extensions().supports_auth() {
                session.authenticate(&self.authenticator).await?;
                tracing::debug!(mechanism = mechanism, "Authenticated");
            } else {
                tracing::warn!(
                    mechanism = mechanism,
                    host = %self.host,
                    "Server does not advertise AUTH, sending without authentication"
                );
            }
        }

        session.mail(&envelope.from).await?;
        for recipient in envelope.recipients.iter() {
            session.rcpt(recipient).await?;
        }
        session.data(message).await
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, envelope: &Envelope, message: &str) -> Result<(), SmtpError> {
        let mut session = Session::connect(&self.host, self.port, self.timeout).await?;

        match self.converse(&mut session, envelope, message).await {
            Ok(()) => session.quit().await,
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }
}

/// Dry-run transport: prints the message instead of delivering it.
#[derive(Debug, Default)]
pub struct StdoutTransport;

#[async_trait]
impl MailTransport for StdoutTransport {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, envelope: &Envelope, message: &str) -> Result<(), SmtpError> {
        let mut out = std::io::stdout().lock();
        write_dry_run(&mut out, envelope, message).map_err(|e| SmtpError::Io(e.to_string()))
    }
}

fn write_dry_run(out: &mut impl Write, envelope: &Envelope, message: &str) -> std::io::Result<()> {
    writeln!(out, "MAIL FROM:<{}>", envelope.from)?;
    for recipient in envelope.recipients.iter() {
        writeln!(out, "RCPT TO:<{}>", recipient)?;
    }
    out.write_all(message.as_bytes())?;
    out.flush()
}
