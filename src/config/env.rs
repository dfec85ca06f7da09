//! Environment variable substitution and body template file loading.

use crate::error::ConfigError;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Maximum size for the body template file (1MB).
const MAX_BODY_TEMPLATE_SIZE: u64 = 1024 * 1024;

static ENV_VAR_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

/// Resolves `${VAR_NAME}` patterns in a string.
///
/// Every undefined variable is reported in a single error.
pub fn resolve_env_vars(value: &str) -> Result<String, ConfigError> {
    let mut missing = Vec::new();

    let resolved = ENV_VAR_REF.replace_all(value, |caps: &regex::Captures| {
        let name = &caps[1];
        std::env::var(name).unwrap_or_else(|_| {
            missing.push(name.to_string());
            String::new()
        })
    });

    if missing.is_empty() {
        Ok(resolved.into_owned())
    } else {
        Err(ConfigError::ValidationError(format!(
            "undefined environment variable{}: {}",
            if missing.len() > 1 { "s" } else { "" },
            missing.join(", ")
        )))
    }
}

/// Read a body template file: at most 1MB of UTF-8.
pub fn read_body_template_file(path: &Path) -> Result<String, ConfigError> {
    let fail = |message: String| ConfigError::BodyTemplateFile {
        path: path.display().to_string(),
        message,
    };

    let metadata = std::fs::metadata(path).map_err(|e| fail(e.to_string()))?;
    if metadata.len() > MAX_BODY_TEMPLATE_SIZE {
        return Err(fail(format!(
            "exceeds maximum size of 1MB ({} bytes)",
            metadata.len()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            fail("must be valid UTF-8".to_string())
        } else {
            fail(e.to_string())
        }
    })?;

    tracing::debug!(path = %path.display(), bytes = content.len(), "Body template loaded from file");
    Ok(content)
}
