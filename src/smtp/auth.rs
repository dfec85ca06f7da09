//! SMTP authentication mechanisms.
//!
//! An [`Authenticator`] is chosen once from the validated configuration.
//! Starting it against a [`ServerInfo`] yields a [`Handshake`] that the
//! session drives over the wire:
//!
//! - PLAIN sends one initial response with the `AUTH` command.
//! - LOGIN answers the server's `Username:` and `Password:` prompts, in that
//!   order and spelled exactly so; any other prompt aborts the exchange.

use crate::config::SecretString;
use crate::error::AuthError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// What the authenticator knows about the connection it runs on.
#[derive(Debug, Clone, Copy)]
pub struct ServerInfo<'a> {
    /// Host name the client connected to.
    pub name: &'a str,
    /// Whether the connection is TLS-protected.
    pub tls: bool,
}

#[derive(Debug, Clone)]
pub enum Authenticator {
    None,
    Plain(PlainAuth),
    Login(LoginAuth),
}

impl Authenticator {
    /// SASL mechanism name, `None` when no AUTH step is wanted.
    pub fn mechanism(&self) -> Option<&'static str> {
        match self {
            Authenticator::None => None,
            Authenticator::Plain(_) => Some("PLAIN"),
            Authenticator::Login(_) => Some("LOGIN"),
        }
    }

    /// Begin an exchange; `Ok(None)` for [`Authenticator::None`].
    pub fn start(&self, server: &ServerInfo<'_>) -> Result<Option<Handshake<'_>>, AuthError> {
        match self {
            Authenticator::None => Ok(None),
            Authenticator::Plain(plain) => plain.start(server).map(Some),
            Authenticator::Login(login) => Ok(Some(Handshake::Login(login.exchange()))),
        }
    }
}

/// An exchange in progress.
#[derive(Debug)]
pub enum Handshake<'a> {
    /// Single-step mechanism; the value is already base64-encoded.
    Plain { initial_response: String },
    Login(LoginExchange<'a>),
}

#[derive(Debug, Clone)]
pub struct PlainAuth {
    username: String,
    password: SecretString,
    host: String,
}

impl PlainAuth {
    pub fn new(username: impl Into<String>, password: SecretString, host: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password,
            host: host.into(),
        }
    }

    fn start(&self, server: &ServerInfo<'_>) -> Result<Handshake<'_>, AuthError> {
        if !server.tls && !is_localhost(server.name) {
            return Err(AuthError::InsecureConnection);
        }
        if server.name != self.host {
            tracing::debug!(expected = %self.host, actual = %server.name, "Server name differs from configured host");
        }
        let payload = format!("\0{}\0{}", self.username, self.password.expose());
        Ok(Handshake::Plain {
            initial_response: STANDARD.encode(payload.as_bytes()),
        })
    }
}

fn is_localhost(name: &str) -> bool {
    matches!(name, "localhost" | "127.0.0.1" | "::1")
}

#[derive(Debug, Clone)]
pub struct LoginAuth {
    username: String,
    password: SecretString,
}

impl LoginAuth {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    pub fn exchange(&self) -> LoginExchange<'_> {
        LoginExchange {
            auth: self,
            state: LoginState::AwaitingUsername,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    AwaitingUsername,
    AwaitingPassword,
    Done,
}

/// LOGIN prompt/answer state machine.
#[derive(Debug)]
pub struct LoginExchange<'a> {
    auth: &'a LoginAuth,
    state: LoginState,
}

impl<'a> LoginExchange<'a> {
    pub fn state(&self) -> LoginState {
        self.state
    }

    /// Answer a decoded `334` challenge.
    pub fn respond(&mut self, challenge: &str) -> Result<&'a str, AuthError> {
        let auth = self.auth;
        match (self.state, challenge) {
            (LoginState::AwaitingUsername, "Username:") => {
                self.state = LoginState::AwaitingPassword;
                Ok(auth.username.as_str())
            }
            (LoginState::AwaitingPassword, "Password:") => {
                self.state = LoginState::Done;
                Ok(auth.password.expose())
            }
            _ => Err(AuthError::UnexpectedChallenge(challenge.to_string())),
        }
    }

    /// Decode a base64 challenge and answer it, returning the encoded reply.
    pub fn respond_encoded(&mut self, challenge: &str) -> Result<String, AuthError> {
        let decoded = STANDARD
            .decode(challenge.trim())
            .map_err(|_| AuthError::MalformedChallenge(challenge.to_string()))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::MalformedChallenge(challenge.to_string()))?;
        self.respond(&decoded).map(|answer| STANDARD.encode(answer))
    }
}
