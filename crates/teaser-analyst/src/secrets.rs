//! API key resolution from configuration.
//!
//! A key may be given in three ways, checked in this order:
//!
//! 1. **Direct value** - `apiKey: "sk-..."` for quick local runs
//! 2. **File reference** - `apiKeyFile: /run/secrets/openai` for mounted secrets
//! 3. **Env var reference** - `apiKeyEnvVar: OPENAI_API_KEY` (the default)

use secrecy::SecretString;
use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source.
///
/// File contents and env values are trimmed. An env var that is set but
/// blank counts as not set.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return fs::read_to_string(&expanded)
            .map(|content| SecretString::from(content.trim().to_string()))
            .map_err(|source| SecretError::FileReadError {
                path: expanded,
                source,
            });
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value.trim())),
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but a key that simply isn't there is `None`.
///
/// Missing sources and unset env vars are not errors: without a key the
/// analysis stage is skipped. An unreadable key file still fails.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) | Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` to the current user's home directory.
///
/// `~user/path` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("TEASER_TEST_KEY_1", "env_value");
        let result = resolve_secret(Some("direct_value"), None, Some("TEASER_TEST_KEY_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("TEASER_TEST_KEY_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "  sk-from-file  ").unwrap();

        std::env::set_var("TEASER_TEST_KEY_2", "env_value");
        let result = resolve_secret(
            None,
            Some(temp_file.path().to_str().unwrap()),
            Some("TEASER_TEST_KEY_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "sk-from-file");
        std::env::remove_var("TEASER_TEST_KEY_2");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback() {
        std::env::set_var("TEASER_TEST_KEY_3", "env_value\n");
        let result = resolve_secret(Some(""), Some(""), Some("TEASER_TEST_KEY_3")).unwrap();
        assert_eq!(result.expose_secret(), "env_value");
        std::env::remove_var("TEASER_TEST_KEY_3");
    }

    #[test]
    fn test_file_not_found_error() {
        let result = resolve_secret(None, Some("/nonexistent/path/to/key"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    #[serial]
    fn test_optional_missing_key_is_none() {
        assert!(resolve_secret_optional(None, None, None).unwrap().is_none());

        std::env::remove_var("TEASER_TEST_KEY_UNSET");
        let result = resolve_secret_optional(None, None, Some("TEASER_TEST_KEY_UNSET")).unwrap();
        assert!(result.is_none());

        std::env::set_var("TEASER_TEST_KEY_BLANK", "   ");
        let result = resolve_secret_optional(None, None, Some("TEASER_TEST_KEY_BLANK")).unwrap();
        assert!(result.is_none());
        std::env::remove_var("TEASER_TEST_KEY_BLANK");
    }

    #[test]
    fn test_optional_unreadable_file_still_fails() {
        let result = resolve_secret_optional(None, Some("/nonexistent/key"), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/absolute/path"), "/absolute/path");
        assert_eq!(expand_home("relative/path"), "relative/path");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home("~/key"),
                format!("{}/key", home.to_string_lossy())
            );
        }
    }
}
