//! Option and configuration types.

use super::env::resolve_env_vars;
use super::secret::SecretString;
use crate::error::ConfigError;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default SMTP submission port.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Port forced by the deprecated `insecure` option.
pub const INSECURE_SMTP_PORT: u16 = 25;

/// Default per-step network timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_SUBJECT_TEMPLATE: &str =
    "Sensu Alert - {{ Entity.Name }}/{{ Check.Name }}: {{ Check.State }}";

pub const DEFAULT_BODY_TEMPLATE: &str = "{{ Check.Output }}";

/// Body used with `--hookout`: check output followed by every hook.
pub const HOOKOUT_BODY_TEMPLATE: &str = "{{ Check.Output }}\n\
{% for hook in Check.Hooks %}Hook Name:  {{ hook.Name }}\n\
Hook Command:  {{ hook.Command }}\n\n\
{{ hook.Output }}\n\n\
{% endfor %}";

/// SMTP authentication method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    None,
    #[default]
    Plain,
    Login,
}

impl FromStr for AuthMethod {
    type Err = ConfigError;

    /// Names are lowercase only. An empty string selects the default (`plain`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "plain" => Ok(AuthMethod::Plain),
            "none" => Ok(AuthMethod::None),
            "login" => Ok(AuthMethod::Login),
            _ => Err(ConfigError::InvalidAuthMethod(s.to_string())),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthMethod::None => "none",
            AuthMethod::Plain => "plain",
            AuthMethod::Login => "login",
        })
    }
}

/// Raw handler options as gathered from one source (file, flags,
/// annotations). Unset values are `None` so that layers can be merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct HandlerOptions {
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub smtp_port: Option<u64>,
    #[serde(deserialize_with = "one_or_many")]
    pub to_email: Vec<String>,
    pub from_email: Option<String>,
    pub tls_skip_verify: bool,
    pub auth_method: Option<String>,
    pub hookout: bool,
    pub body_template_file: Option<String>,
    pub subject_template: Option<String>,
    /// Deprecated: port 25, no auth, no certificate verification.
    pub insecure: bool,
    /// Deprecated: same as `authMethod: login`.
    pub enable_login_auth: bool,
    /// Per-step network timeout in seconds.
    pub timeout: Option<u64>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

impl HandlerOptions {
    /// Load options from a YAML file.
    ///
    /// `${VAR}` references in `smtpUsername` and `smtpPassword` are
    /// substituted from the environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadError`] if the file cannot be read or
    /// parsed, [`ConfigError::ValidationError`] for undefined variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        let mut options: HandlerOptions = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        if let Some(username) = options.smtp_username.take() {
            options.smtp_username = Some(resolve_env_vars(&username)?);
        }
        if let Some(password) = options.smtp_password.take() {
            options.smtp_password = Some(SecretString::new(resolve_env_vars(password.expose())?));
        }

        tracing::debug!(path = %path.display(), "Loaded options file");
        Ok(options)
    }

    /// Layer `upper` on top of `self`.
    ///
    /// Values set in `upper` win; recipient lists are replaced when `upper`
    /// has any; boolean switches stay on once any layer enables them.
    pub fn overlay(self, upper: HandlerOptions) -> HandlerOptions {
        HandlerOptions {
            smtp_host: upper.smtp_host.or(self.smtp_host),
            smtp_username: upper.smtp_username.or(self.smtp_username),
            smtp_password: upper.smtp_password.or(self.smtp_password),
            smtp_port: upper.smtp_port.or(self.smtp_port),
            to_email: if upper.to_email.is_empty() {
                self.to_email
            } else {
                upper.to_email
            },
            from_email: upper.from_email.or(self.from_email),
            tls_skip_verify: upper.tls_skip_verify || self.tls_skip_verify,
            auth_method: upper.auth_method.or(self.auth_method),
            hookout: upper.hookout || self.hookout,
            body_template_file: upper.body_template_file.or(self.body_template_file),
            subject_template: upper.subject_template.or(self.subject_template),
            insecure: upper.insecure || self.insecure,
            enable_login_auth: upper.enable_login_auth || self.enable_login_auth,
            timeout: upper.timeout.or(self.timeout),
        }
    }
}

/// Fully resolved configuration handed to the handler core.
///
/// Built only by [`HandlerOptions::validate`]; read-only afterwards.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub auth_method: AuthMethod,
    pub tls_skip_verify: bool,
    /// Bare address for the envelope.
    pub from_email: String,
    /// Mailbox form (display name and address) for the `From` header.
    pub from_header: String,
    /// Raw recipient tokens, normalized at send time.
    pub to_email: Vec<String>,
    pub subject_template: String,
    pub body_template: String,
    pub timeout: Duration,
}
