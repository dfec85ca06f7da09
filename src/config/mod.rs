//! Configuration loading and validation for incident-mailer.
//!
//! Options are gathered in layers (built-in defaults, optional YAML file,
//! command-line flags and environment, event annotations), then validated
//! once into an immutable [`HandlerConfig`].

mod annotations;
mod env;
mod secret;
mod types;
mod validation;

pub use annotations::ANNOTATION_KEYSPACE;
pub use env::{read_body_template_file, resolve_env_vars};
pub use secret::SecretString;
pub use types::{
    AuthMethod, DEFAULT_BODY_TEMPLATE, DEFAULT_SMTP_PORT, DEFAULT_SUBJECT_TEMPLATE,
    DEFAULT_TIMEOUT_SECS, HOOKOUT_BODY_TEMPLATE, HandlerConfig, HandlerOptions,
    INSECURE_SMTP_PORT,
};
