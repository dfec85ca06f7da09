//! Secret string wrapper that never appears in logs.

use serde::Deserialize;

/// Credential that prints as `[REDACTED]`.
///
/// Used for the SMTP password so that `Debug` output of the options, the
/// resolved configuration and the authenticators never carries it.
///
/// # Example
///
/// ```
/// use incident_mailer::config::SecretString;
///
/// let secret = SecretString::new("hunter2".to_string());
/// assert_eq!(format!("{:?}", secret), "[REDACTED]");
/// assert_eq!(secret.expose(), "hunter2");
/// ```
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        SecretString(s)
    }

    /// Exposes the underlying secret value.
    ///
    /// Only the authenticators should call this; never pass the result to
    /// logging.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SecretString::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_string_redacts_in_debug_and_display() {
        let secret = SecretString::new("smtp-app-password".to_string());

        let debug_output = format!("{:?}", secret);
        assert!(!debug_output.contains("smtp-app-password"));
        assert!(debug_output.contains("[REDACTED]"));

        let display_output = format!("{}", secret);
        assert!(!display_output.contains("smtp-app-password"));
        assert!(display_output.contains("[REDACTED]"));

        assert_eq!(secret.expose(), "smtp-app-password");
    }

    #[test]
    fn secret_string_emptiness() {
        assert!(SecretString::default().is_empty());
        assert!(!SecretString::new("x".to_string()).is_empty());
    }

    #[test]
    fn secret_string_deserializes_from_yaml() {
        let secret: SecretString = serde_yaml::from_str("\"p@ss w0rd\"").unwrap();
        assert_eq!(secret.expose(), "p@ss w0rd");
    }

    #[test]
    fn no_password_leaked_in_nested_formats() {
        let password = SecretString::new("correct-horse-battery-staple".to_string());

        let representations = [
            format!("{:?}", password),
            format!("{}", password),
            format!("{:?}", Some(&password)),
            format!("{:?}", vec![&password]),
        ];

        for repr in &representations {
            assert!(
                !repr.contains("horse"),
                "password leaked in output: {}",
                repr
            );
        }
    }
}
