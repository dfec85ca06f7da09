//! Centralized error types for incident-mailer using thiserror.
//!
//! Each concern (configuration, event input, templating, SMTP delivery)
//! has its own enum; `HandlerError` aggregates them at the invocation
//! boundary so a run always ends with exactly one terminal error.

use thiserror::Error;

/// Errors detected while resolving and validating configuration.
///
/// All of these are raised before any network activity.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("missing smtp host")]
    MissingHost,
    #[error("smtp port is out of range")]
    PortOutOfRange(u64),
    #[error("missing destination email address")]
    MissingRecipients,
    #[error("from email is empty")]
    MissingFrom,
    #[error("invalid from address '{address}': {message}")]
    InvalidFrom { address: String, message: String },
    #[error("{0} is not a valid auth method")]
    InvalidAuthMethod(String),
    #[error("smtp username is empty")]
    MissingUsername,
    #[error("smtp password is empty")]
    MissingPassword,
    #[error("--{first} and --{second} are mutually exclusive")]
    Conflict {
        first: &'static str,
        second: &'static str,
    },
    #[error("failed to read specified template file {path}: {message}")]
    BodyTemplateFile { path: String, message: String },
    #[error("invalid value for annotation '{key}': {message}")]
    InvalidAnnotation { key: String, message: String },
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors related to the incoming event record.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("failed to parse event: {0}")]
    InvalidJson(String),
    #[error("event does not contain {0}")]
    Missing(&'static str),
}

/// Errors related to template rendering.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("{name} template render failed: {message}")]
    RenderFailed { name: String, message: String },
}

/// Errors raised by an authenticator during the AUTH exchange.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("authentication rejected ({code}): {message}")]
    Rejected { code: u16, message: String },
    /// The server sent a challenge the mechanism does not understand.
    #[error("unknown response ({0}) from server when attempting to use login auth")]
    UnexpectedChallenge(String),
    #[error("malformed authentication challenge: {0}")]
    MalformedChallenge(String),
    #[error("refusing to send credentials over an unencrypted connection")]
    InsecureConnection,
}

/// Errors related to the SMTP session.
#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("connection to {address} failed: {message}")]
    Connect { address: String, message: String },
    #[error("timed out during {0}")]
    Timeout(&'static str),
    #[error("i/o error: {0}")]
    Io(String),
    #[error("STARTTLS failed: {0}")]
    Tls(String),
    #[error("{stage} rejected ({code}): {message}")]
    Rejected {
        stage: &'static str,
        code: u16,
        message: String,
    },
    #[error("malformed server reply: {0}")]
    MalformedReply(String),
    #[error("address contains CR or LF: {0:?}")]
    InvalidLine(String),
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
}

/// Terminal error of one handler invocation.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("event error: {0}")]
    Event(#[from] EventError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("delivery failed: {0}")]
    Delivery(#[from] SmtpError),
}
