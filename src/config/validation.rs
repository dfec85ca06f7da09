//! Validation of layered options into a [`HandlerConfig`].

use super::env::read_body_template_file;
use super::types::{
    AuthMethod, DEFAULT_BODY_TEMPLATE, DEFAULT_SMTP_PORT, DEFAULT_SUBJECT_TEMPLATE,
    DEFAULT_TIMEOUT_SECS, HOOKOUT_BODY_TEMPLATE, HandlerConfig, HandlerOptions,
    INSECURE_SMTP_PORT,
};
use crate::error::ConfigError;
use lettre::message::Mailbox;
use std::path::Path;
use std::time::Duration;

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

impl HandlerOptions {
    /// Check the options and resolve them into an immutable configuration.
    ///
    /// Checks run in a fixed order and the first failure is returned.
    /// Nothing here touches the network; the body template file is read.
    pub fn validate(&self) -> Result<HandlerConfig, ConfigError> {
        let smtp_host = self.smtp_host.as_deref().unwrap_or_default().trim();
        if smtp_host.is_empty() {
            return Err(ConfigError::MissingHost);
        }

        let mut smtp_port = match self.smtp_port {
            None => DEFAULT_SMTP_PORT,
            Some(port) => u16::try_from(port).map_err(|_| ConfigError::PortOutOfRange(port))?,
        };

        if self.to_email.iter().all(|token| token.trim().is_empty()) {
            return Err(ConfigError::MissingRecipients);
        }

        if is_blank(&self.from_email) {
            return Err(ConfigError::MissingFrom);
        }

        if self.insecure && self.enable_login_auth {
            return Err(ConfigError::Conflict {
                first: "insecure",
                second: "enableLoginAuth",
            });
        }

        let mut auth_method = self.auth_method.clone().unwrap_or_default();
        let mut tls_skip_verify = self.tls_skip_verify;
        if self.enable_login_auth {
            tracing::warn!("enableLoginAuth is deprecated, use authMethod login");
            auth_method = AuthMethod::Login.to_string();
        }
        if self.insecure {
            tracing::warn!("insecure is deprecated, use smtpPort 25, authMethod none and tlsSkipVerify");
            smtp_port = INSECURE_SMTP_PORT;
            auth_method = AuthMethod::None.to_string();
            tls_skip_verify = true;
        }

        let auth_method: AuthMethod = auth_method.parse()?;

        let smtp_username = self.smtp_username.clone().unwrap_or_default();
        let smtp_password = self.smtp_password.clone().unwrap_or_default();
        if auth_method != AuthMethod::None {
            if smtp_username.is_empty() {
                return Err(ConfigError::MissingUsername);
            }
            if smtp_password.is_empty() {
                return Err(ConfigError::MissingPassword);
            }
        }

        if self.hookout && !is_blank(&self.body_template_file) {
            return Err(ConfigError::Conflict {
                first: "hookout",
                second: "bodyTemplateFile",
            });
        }

        let body_template = match self.body_template_file.as_deref().map(str::trim) {
            _ if self.hookout => HOOKOUT_BODY_TEMPLATE.to_string(),
            Some(path) if !path.is_empty() => read_body_template_file(Path::new(path))?,
            _ => DEFAULT_BODY_TEMPLATE.to_string(),
        };

        let subject_template = match self.subject_template.as_deref() {
            Some(subject) if !subject.is_empty() => subject.to_string(),
            _ => DEFAULT_SUBJECT_TEMPLATE.to_string(),
        };

        let from = self.from_email.as_deref().unwrap_or_default().trim();
        let mailbox: Mailbox = from.parse().map_err(|e: lettre::address::AddressError| {
            ConfigError::InvalidFrom {
                address: from.to_string(),
                message: e.to_string(),
            }
        })?;

        let timeout_secs = self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeout must be at least 1 second".to_string(),
            ));
        }

        let config = HandlerConfig {
            smtp_host: smtp_host.to_string(),
            smtp_port,
            smtp_username,
            smtp_password,
            auth_method,
            tls_skip_verify,
            from_email: mailbox.email.to_string(),
            from_header: mailbox.to_string(),
            to_email: self.to_email.clone(),
            subject_template,
            body_template,
            timeout: Duration::from_secs(timeout_secs),
        };

        tracing::debug!(
            smtp_host = %config.smtp_host,
            smtp_port = config.smtp_port,
            auth_method = %config.auth_method,
            tls_skip_verify = config.tls_skip_verify,
            recipients = config.to_email.len(),
            "Configuration validated"
        );
        Ok(config)
    }
}
