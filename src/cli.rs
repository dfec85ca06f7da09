//! Command-line interface for incident-mailer using clap.
//!
//! Long flag names match the YAML keys and annotation names
//! (`--smtpHost`, `smtpHost`, `sensu.io/plugins/email/config/smtpHost`).

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{HandlerOptions, SecretString};
use crate::error::ConfigError;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format for log aggregation.
    Json,
}

/// Send a monitoring event read from stdin as an email.
#[derive(Parser, Debug)]
#[command(name = "incident-mailer")]
#[command(version)]
#[command(about = "Send a monitoring event read from stdin as an email")]
pub struct Cli {
    /// SMTP server host.
    #[arg(short = 's', long = "smtpHost")]
    pub smtp_host: Option<String>,

    /// SMTP username.
    #[arg(short = 'u', long = "smtpUsername", env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    /// SMTP password.
    #[arg(
        short = 'p',
        long = "smtpPassword",
        env = "SMTP_PASSWORD",
        hide_env_values = true
    )]
    pub smtp_password: Option<String>,

    /// SMTP server port [default: 587].
    #[arg(short = 'P', long = "smtpPort")]
    pub smtp_port: Option<u64>,

    /// Destination address; repeat the flag or join addresses with commas.
    #[arg(short = 't', long = "toEmail")]
    pub to_email: Vec<String>,

    /// Sender, either `user@host` or `Name <user@host>`.
    #[arg(short = 'f', long = "fromEmail")]
    pub from_email: Option<String>,

    /// Do not verify the server certificate after STARTTLS.
    #[arg(short = 'k', long = "tlsSkipVerify")]
    pub tls_skip_verify: bool,

    /// Authentication method: none, plain or login [default: plain].
    #[arg(short = 'a', long = "authMethod")]
    pub auth_method: Option<String>,

    /// Append the output of every check hook to the body.
    #[arg(short = 'H', long = "hookout")]
    pub hookout: bool,

    /// File holding the body template.
    #[arg(short = 'T', long = "bodyTemplateFile")]
    pub body_template_file: Option<String>,

    /// Subject template.
    #[arg(short = 'S', long = "subjectTemplate")]
    pub subject_template: Option<String>,

    /// Deprecated: port 25, no authentication, no certificate verification.
    #[arg(short = 'i', long = "insecure")]
    pub insecure: bool,

    /// Deprecated: use `--authMethod login`.
    #[arg(short = 'l', long = "enableLoginAuth")]
    pub enable_login_auth: bool,

    /// Per-step network timeout in seconds [default: 30].
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Optional YAML file with the same options.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log format: text or json.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Print the composed message to stdout instead of sending it.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

impl Cli {
    /// The options set on the command line or through the environment.
    pub fn to_options(&self) -> HandlerOptions {
        HandlerOptions {
            smtp_host: self.smtp_host.clone(),
            smtp_username: self.smtp_username.clone(),
            smtp_password: self.smtp_password.clone().map(SecretString::new),
            smtp_port: self.smtp_port,
            to_email: self.to_email.clone(),
            from_email: self.from_email.clone(),
            tls_skip_verify: self.tls_skip_verify,
            auth_method: self.auth_method.clone(),
            hookout: self.hookout,
            body_template_file: self.body_template_file.clone(),
            subject_template: self.subject_template.clone(),
            insecure: self.insecure,
            enable_login_auth: self.enable_login_auth,
            timeout: self.timeout,
        }
    }

    /// Options from the config file (if any) with the command line on top.
    pub fn resolve_options(&self) -> Result<HandlerOptions, ConfigError> {
        let flags = self.to_options();
        match &self.config {
            Some(path) => Ok(HandlerOptions::load(path)?.overlay(flags)),
            None => Ok(flags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["incident-mailer"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    // ===================================================================
    // Flags
    // ===================================================================

    #[test]
    #[serial]
    fn cli_short_flags() {
        temp_env::with_vars(
            [("SMTP_USERNAME", None::<&str>), ("SMTP_PASSWORD", None)],
            || {
                let cli = parse(&[
                    "-s", "smtp.example.com", "-u", "mailer", "-p", "secret", "-P", "2525",
                    "-t", "a@example.com", "-t", "b@example.com", "-f", "alerts@example.com",
                    "-k", "-a", "login", "-H", "-S", "subject", "-i", "-l",
                ]);
                assert_eq!(cli.smtp_host.as_deref(), Some("smtp.example.com"));
                assert_eq!(cli.smtp_username.as_deref(), Some("mailer"));
                assert_eq!(cli.smtp_password.as_deref(), Some("secret"));
                assert_eq!(cli.smtp_port, Some(2525));
                assert_eq!(cli.to_email, ["a@example.com", "b@example.com"]);
                assert_eq!(cli.from_email.as_deref(), Some("alerts@example.com"));
                assert!(cli.tls_skip_verify);
                assert_eq!(cli.auth_method.as_deref(), Some("login"));
                assert!(cli.hookout);
                assert_eq!(cli.subject_template.as_deref(), Some("subject"));
                assert!(cli.insecure);
                assert!(cli.enable_login_auth);
            },
        );
    }

    #[test]
    fn cli_long_flags() {
        let cli = parse(&[
            "--smtpHost",
            "smtp.example.com",
            "--smtpPort",
            "465",
            "--toEmail",
            "a@example.com,b@example.com",
            "--bodyTemplateFile",
            "body.html",
            "--authMethod",
            "none",
            "--timeout",
            "5",
        ]);
        assert_eq!(cli.smtp_host.as_deref(), Some("smtp.example.com"));
        assert_eq!(cli.smtp_port, Some(465));
        assert_eq!(cli.to_email, ["a@example.com,b@example.com"]);
        assert_eq!(cli.body_template_file.as_deref(), Some("body.html"));
        assert_eq!(cli.timeout, Some(5));
    }

    #[test]
    fn cli_template_file_short_flag() {
        let cli = parse(&["-T", "/etc/mailer/body.html"]);
        assert_eq!(cli.body_template_file.as_deref(), Some("/etc/mailer/body.html"));
    }

    #[test]
    fn cli_port_must_be_numeric() {
        let result = Cli::try_parse_from(["incident-mailer", "--smtpPort", "smtp"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_port_range_is_checked_at_validation() {
        let cli = parse(&["--smtpPort", "70000"]);
        assert_eq!(cli.smtp_port, Some(70000));
    }

    #[test]
    fn cli_dry_run_flag() {
        let cli = parse(&["--dry-run"]);
        assert!(cli.dry_run);
    }

    // ===================================================================
    // Environment fallback
    // ===================================================================

    #[test]
    #[serial]
    fn cli_credentials_from_env() {
        temp_env::with_vars(
            [
                ("SMTP_USERNAME", Some("env-user")),
                ("SMTP_PASSWORD", Some("env-secret")),
            ],
            || {
                let cli = parse(&[]);
                assert_eq!(cli.smtp_username.as_deref(), Some("env-user"));
                assert_eq!(cli.smtp_password.as_deref(), Some("env-secret"));
            },
        );
    }

    #[test]
    #[serial]
    fn cli_flag_overrides_env() {
        temp_env::with_var("SMTP_USERNAME", Some("env-user"), || {
            let cli = parse(&["-u", "flag-user"]);
            assert_eq!(cli.smtp_username.as_deref(), Some("flag-user"));
        });
    }

    #[test]
    #[serial]
    fn cli_log_format_default() {
        temp_env::with_var("LOG_FORMAT", None::<&str>, || {
            let cli = parse(&[]);
            assert!(matches!(cli.log_format, LogFormat::Text));
        });
    }

    #[test]
    #[serial]
    fn cli_log_format_from_env() {
        temp_env::with_var("LOG_FORMAT", Some("json"), || {
            let cli = parse(&[]);
            assert!(matches!(cli.log_format, LogFormat::Json));
        });
    }

    #[test]
    #[serial]
    fn cli_log_format_flag_overrides_env() {
        temp_env::with_var("LOG_FORMAT", Some("json"), || {
            let cli = parse(&["--log-format", "text"]);
            assert!(matches!(cli.log_format, LogFormat::Text));
        });
    }

    #[test]
    fn cli_log_format_invalid_rejected() {
        let result = Cli::try_parse_from(["incident-mailer", "--log-format", "invalid"]);
        assert!(result.is_err(), "Invalid log format should be rejected");
    }

    // ===================================================================
    // Option resolution
    // ===================================================================

    #[test]
    #[serial]
    fn to_options_wraps_password() {
        temp_env::with_vars(
            [("SMTP_USERNAME", None::<&str>), ("SMTP_PASSWORD", None)],
            || {
                let options = parse(&["-p", "secret"]).to_options();
                assert_eq!(
                    options.smtp_password.as_ref().map(SecretString::expose),
                    Some("secret")
                );
                assert!(!format!("{:?}", options).contains("secret"));
            },
        );
    }

    #[test]
    #[serial]
    fn flags_override_config_file() {
        temp_env::with_vars(
            [
                ("MAILER_SMTP_USER", Some("file-user")),
                ("MAILER_SMTP_PASSWORD", Some("file-secret")),
                ("SMTP_USERNAME", None),
                ("SMTP_PASSWORD", None),
            ],
            || {
                let config = fixture("options.yaml");
                let cli = parse(&[
                    "-c",
                    config.to_str().unwrap(),
                    "--smtpHost",
                    "flag.example.com",
                ]);
                let options = cli.resolve_options().unwrap();

                assert_eq!(options.smtp_host.as_deref(), Some("flag.example.com"));
                assert_eq!(options.smtp_port, Some(2525));
                assert_eq!(options.smtp_username.as_deref(), Some("file-user"));
                assert_eq!(options.auth_method.as_deref(), Some("login"));
            },
        );
    }

    #[test]
    #[serial]
    fn env_credentials_override_config_file() {
        temp_env::with_vars(
            [
                ("MAILER_SMTP_USER", Some("file-user")),
                ("MAILER_SMTP_PASSWORD", Some("file-secret")),
                ("SMTP_USERNAME", Some("env-user")),
                ("SMTP_PASSWORD", None),
            ],
            || {
                let config = fixture("options.yaml");
                let cli = parse(&["-c", config.to_str().unwrap()]);
                let options = cli.resolve_options().unwrap();
                assert_eq!(options.smtp_username.as_deref(), Some("env-user"));
                assert_eq!(
                    options.smtp_password.as_ref().map(SecretString::expose),
                    Some("file-secret")
                );
            },
        );
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = parse(&["-c", "/nonexistent/incident-mailer.yaml"]);
        assert!(matches!(
            cli.resolve_options(),
            Err(ConfigError::LoadError(_))
        ));
    }

    #[test]
    #[serial]
    fn no_config_file_means_flags_only() {
        temp_env::with_vars(
            [("SMTP_USERNAME", None::<&str>), ("SMTP_PASSWORD", None)],
            || {
                let options = parse(&["-s", "smtp.example.com"]).resolve_options().unwrap();
                assert_eq!(options.smtp_host.as_deref(), Some("smtp.example.com"));
                assert!(options.to_email.is_empty());
            },
        );
    }
}
