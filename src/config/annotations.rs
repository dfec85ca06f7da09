//! Per-event option overrides carried in entity and check annotations.
//!
//! An annotation `sensu.io/plugins/email/config/<longName>` overrides the
//! option of the same long name. Check annotations take precedence over
//! entity annotations. The password cannot be set this way.

use super::types::HandlerOptions;
use crate::error::ConfigError;
use crate::event::Event;
use std::collections::BTreeMap;

/// Prefix of every configuration annotation key.
pub const ANNOTATION_KEYSPACE: &str = "sensu.io/plugins/email/config";

fn lookup<'a>(event: &'a Event, option: &str) -> Option<(String, &'a str)> {
    let key = format!("{}/{}", ANNOTATION_KEYSPACE, option);
    let find = |annotations: Option<&'a BTreeMap<String, String>>| {
        annotations
            .and_then(|a| a.get(&key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    };
    let value = find(event.check_annotations()).or_else(|| find(event.entity_annotations()))?;
    Some((key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value
        .trim()
        .parse::<bool>()
        .map_err(|_| ConfigError::InvalidAnnotation {
            key: key.to_string(),
            message: format!("expected true or false, got '{}'", value),
        })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidAnnotation {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// A JSON array of strings, or a single (possibly comma-joined) token.
fn parse_list(key: &str, value: &str) -> Result<Vec<String>, ConfigError> {
    if value.trim_start().starts_with('[') {
        serde_json::from_str(value).map_err(|e| ConfigError::InvalidAnnotation {
            key: key.to_string(),
            message: e.to_string(),
        })
    } else {
        Ok(vec![value.to_string()])
    }
}

impl HandlerOptions {
    /// Override options from the event's annotations.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidAnnotation`] for values that do not
    /// parse as the option's type.
    pub fn apply_annotations(&mut self, event: &Event) -> Result<(), ConfigError> {
        let mut applied = Vec::new();

        macro_rules! string_option {
            ($name:literal, $target:expr) => {
                if let Some((_, value)) = lookup(event, $name) {
                    $target = Some(value.to_string());
                    applied.push($name);
                }
            };
        }
        macro_rules! bool_option {
            ($name:literal, $target:expr) => {
                if let Some((key, value)) = lookup(event, $name) {
                    $target = parse_bool(&key, value)?;
                    applied.push($name);
                }
            };
        }
        macro_rules! u64_option {
            ($name:literal, $target:expr) => {
                if let Some((key, value)) = lookup(event, $name) {
                    $target = Some(parse_u64(&key, value)?);
                    applied.push($name);
                }
            };
        }

        string_option!("smtpHost", self.smtp_host);
        string_option!("smtpUsername", self.smtp_username);
        u64_option!("smtpPort", self.smtp_port);
        if let Some((key, value)) = lookup(event, "toEmail") {
            self.to_email = parse_list(&key, value)?;
            applied.push("toEmail");
        }
        string_option!("fromEmail", self.from_email);
        bool_option!("tlsSkipVerify", self.tls_skip_verify);
        string_option!("authMethod", self.auth_method);
        bool_option!("hookout", self.hookout);
        string_option!("bodyTemplateFile", self.body_template_file);
        string_option!("subjectTemplate", self.subject_template);
        bool_option!("insecure", self.insecure);
        bool_option!("enableLoginAuth", self.enable_login_auth);
        u64_option!("timeout", self.timeout);

        if lookup(event, "smtpPassword").is_some() {
            tracing::warn!("Ignoring smtpPassword annotation, secrets cannot be set from annotations");
        }
        if !applied.is_empty() {
            tracing::debug!(options = ?applied, "Applied annotation overrides");
        }
        Ok(())
    }
}
