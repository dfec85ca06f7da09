//! One SMTP conversation over a single connection.
//!
//! Every network step is bounded by the session timeout. Callers drive the
//! steps in order (greeting, hello, optional STARTTLS and AUTH, envelope,
//! data, quit) and call [`Session::close`] if any of them fails.

use super::auth::{Authenticator, Handshake, ServerInfo};
use super::reply::{Extensions, Reply, ReplyLine};
use super::stream::SmtpStream;
use crate::error::{AuthError, SmtpError};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

/// Name announced in EHLO/HELO.
const CLIENT_NAME: &str = "localhost";

pub struct Session {
    stream: Option<SmtpStream>,
    host: String,
    timeout: Duration,
    extensions: Extensions,
}

impl Session {
    /// Open the TCP connection and consume the `220` greeting.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, SmtpError> {
        let address = format!("{}:{}", host, port);
        tracing::debug!(address = %address, "Connecting to SMTP server");

        let tcp = tokio::time::timeout(timeout, TcpStream::connect(address.as_str()))
            .await
            .map_err(|_| SmtpError::Timeout("connect"))?
            .map_err(|e| SmtpError::Connect {
                address: address.clone(),
                message: e.to_string(),
            })?;

        let mut session = Self {
            stream: Some(SmtpStream::new(tcp)),
            host: host.to_string(),
            timeout,
            extensions: Extensions::default(),
        };

        match session.read_reply("greeting").await {
            Ok(reply) if reply.code == 220 => {
                tracing::debug!(greeting = %reply.text(), "Connected");
                Ok(session)
            }
            Ok(reply) => {
                session.close().await;
                Err(reply.rejected("greeting"))
            }
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn is_tls(&self) -> bool {
        self.stream.as_ref().is_some_and(SmtpStream::is_tls)
    }

    /// `EHLO`, falling back to `HELO` when the server refuses it.
    pub async fn hello(&mut self) -> Result<(), SmtpError> {
        let reply = self
            .command(&format!("EHLO {}", CLIENT_NAME), "EHLO")
            .await?;
        if reply.code == 250 {
            self.extensions = Extensions::from_ehlo(&reply);
            return Ok(());
        }

        tracing::debug!(code = reply.code, "EHLO refused, falling back to HELO");
        let reply = self
            .command(&format!("HELO {}", CLIENT_NAME), "HELO")
            .await?;
        if reply.code != 250 {
            return Err(reply.rejected("HELO"));
        }
        self.extensions = Extensions::default();
        Ok(())
    }

    /// Upgrade to TLS and repeat the hello.
    pub async fn starttls(&mut self, skip_verify: bool) -> Result<(), SmtpError> {
        let reply = self.command("STARTTLS", "STARTTLS").await?;
        if reply.code != 220 {
            return Err(reply.rejected("STARTTLS"));
        }

        let stream = self.stream.take().ok_or_else(not_connected)?;
        let upgraded = tokio::time::timeout(self.timeout, stream.upgrade(&self.host, skip_verify))
            .await
            .map_err(|_| SmtpError::Timeout("TLS handshake"))??;
        self.stream = Some(upgraded);
        tracing::debug!("STARTTLS negotiated");

        self.hello().await
    }

    /// Run the AUTH exchange for `auth`.
    pub async fn authenticate(&mut self, auth: &Authenticator) -> Result<(), SmtpError> {
        let server = ServerInfo {
            name: &self.host,
            tls: self.is_tls(),
        };
        let Some(handshake) = auth.start(&server)? else {
            return Ok(());
        };

        match handshake {
            Handshake::Plain { initial_response } => {
                let reply = self
                    .send_line(&format!("AUTH PLAIN {}", initial_response), "AUTH PLAIN [redacted]")
                    .await?;
                auth_outcome(reply)
            }
            Handshake::Login(mut exchange) => {
                let mut reply = self.command("AUTH LOGIN", "AUTH").await?;
                loop {
                    match reply.code {
                        235 => return Ok(()),
                        334 => {
                            let challenge = reply.lines.first().map(String::as_str).unwrap_or("");
                            let answer = match exchange.respond_encoded(challenge) {
                                Ok(answer) => answer,
                                Err(e) => {
                                    self.cancel_auth().await;
                                    return Err(e.into());
                                }
                            };
                            reply = self.send_line(&answer, "[redacted]").await?;
                        }
                        code => {
                            return Err(AuthError::Rejected {
                                code,
                                message: reply.text(),
                            }
                            .into());
                        }
                    }
                }
            }
        }
    }

    /// Abort a SASL exchange with `*`; the server's answer is ignored.
    async fn cancel_auth(&mut self) {
        if let Err(e) = self.command("*", "AUTH").await {
            tracing::debug!(error = %e, "Cancelling AUTH exchange failed");
        }
    }

    pub async fn mail(&mut self, from: &str) -> Result<(), SmtpError> {
        check_line(from)?;
        let mut command = format!("MAIL FROM:<{}>", from);
        if self.extensions.eight_bit_mime {
            command.push_str(" BODY=8BITMIME");
        }
        let reply = self.command(&command, "MAIL FROM").await?;
        if reply.code != 250 {
            return Err(reply.rejected("MAIL FROM"));
        }
        Ok(())
    }

    pub async fn rcpt(&mut self, to: &str) -> Result<(), SmtpError> {
        check_line(to)?;
        let reply = self
            .command(&format!("RCPT TO:<{}>", to), "RCPT TO")
            .await?;
        if !reply.is_positive() {
            return Err(reply.rejected("RCPT TO"));
        }
        Ok(())
    }

    /// `DATA`, then the dot-stuffed message and the terminating `.`.
    pub async fn data(&mut self, message: &str) -> Result<(), SmtpError> {
        let reply = self.command("DATA", "DATA").await?;
        if reply.code != 354 {
            return Err(reply.rejected("DATA"));
        }

        let mut payload = dot_stuff(message);
        payload.push_str(".\r\n");
        tracing::debug!(bytes = payload.len(), "smtp >> message body");

        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        with_timeout(timeout, "DATA", async {
            stream.write_all(payload.as_bytes()).await?;
            stream.flush().await
        })
        .await?;

        let reply = self.read_reply("DATA").await?;
        if reply.code != 250 {
            return Err(reply.rejected("DATA"));
        }
        Ok(())
    }

    pub async fn quit(mut self) -> Result<(), SmtpError> {
        let result = self.command("QUIT", "QUIT").await;
        self.stream = None;
        let reply = result?;
        if reply.code != 221 {
            return Err(reply.rejected("QUIT"));
        }
        Ok(())
    }

    /// Release the connection without a QUIT.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await;
        }
    }

    /// Write one command line and read the reply.
    async fn command(&mut self, line: &str, stage: &'static str) -> Result<Reply, SmtpError> {
        self.send_line(line, line).await.map_err(|e| match e {
            SmtpError::Timeout(_) => SmtpError::Timeout(stage),
            other => other,
        })
    }

    /// Like [`Session::command`] but logs `shown` in place of the line.
    async fn send_line(&mut self, line: &str, shown: &str) -> Result<Reply, SmtpError> {
        tracing::debug!(line = %shown, "smtp >>");
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        with_timeout(timeout, "command", async {
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(b"\r\n").await?;
            stream.flush().await
        })
        .await?;
        self.read_reply("reply").await
    }

    async fn read_reply(&mut self, stage: &'static str) -> Result<Reply, SmtpError> {
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        with_timeout(timeout, stage, async {
            let mut lines = Vec::new();
            loop {
                let mut buf = String::new();
                if stream.read_line(&mut buf).await? == 0 {
                    return Err(SmtpError::Io("connection closed by server".to_string()));
                }
                let line = buf.trim_end_matches(['\r', '\n']).to_string();
                tracing::debug!(line = %line, "smtp <<");
                let last = ReplyLine::parse(&line)?.last;
                lines.push(line);
                if last {
                    break;
                }
            }
            Reply::from_lines(&lines)
        })
        .await
    }
}

async fn with_timeout<T, F>(timeout: Duration, stage: &'static str, future: F) -> Result<T, SmtpError>
where
    F: Future<Output = Result<T, SmtpError>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| SmtpError::Timeout(stage))?
}

fn auth_outcome(reply: Reply) -> Result<(), SmtpError> {
    if reply.code == 235 {
        Ok(())
    } else {
        Err(AuthError::Rejected {
            code: reply.code,
            message: reply.text(),
        }
        .into())
    }
}

fn not_connected() -> SmtpError {
    SmtpError::Io("not connected".to_string())
}

/// Reject values that would break out of a command line.
fn check_line(value: &str) -> Result<(), SmtpError> {
    if value.contains(['\r', '\n']) {
        return Err(SmtpError::InvalidLine(value.to_string()));
    }
    Ok(())
}

/// Normalize line endings to CRLF and double every leading dot.
///
/// Stray carriage returns at the end of a line are dropped.
pub fn dot_stuff(message: &str) -> String {
    let mut out = String::with_capacity(message.len() + 32);
    for line in message.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}
