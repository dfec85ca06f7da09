// src/lib.rs
//! incident-mailer - render a monitoring event through templates and
//! deliver it over SMTP, once per invocation.

pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod message;
pub mod recipients;
pub mod smtp;
pub mod template;

// Re-export commonly used types
pub use cli::LogFormat;
pub use config::{HandlerConfig, HandlerOptions};
pub use error::HandlerError;
pub use event::Event;
pub use handler::{EmailHandler, dispatch, dispatch_with};
pub use message::{ContentType, compose};
pub use recipients::Recipients;
pub use smtp::{MailTransport, SmtpTransport, StdoutTransport};
pub use template::{RenderedMessage, TemplateEngine};
