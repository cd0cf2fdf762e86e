//! API key resolution for the parser backend.
//!
//! A key can be given inline, read from a file (Docker secrets) or taken
//! from an environment variable. The first configured source wins, in that
//! order.

use std::path::PathBuf;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source configured (set a value, a file or an env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Where to look for a secret. Empty strings count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub direct: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn new(direct: Option<&'a str>, file: Option<&'a str>, env_var: Option<&'a str>) -> Self {
        Self {
            direct: non_empty(direct),
            file: non_empty(file),
            env_var: non_empty(env_var),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.direct.is_some() || self.file.is_some() || self.env_var.is_some()
    }

    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        if let Some(value) = self.direct {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = self.file {
            let expanded = expand_home(path).to_string_lossy().into_owned();
            let content = std::fs::read_to_string(&expanded).map_err(|e| SecretError::FileRead {
                path: expanded.clone(),
                source: e,
            })?;
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Err(SecretError::EmptyFile { path: expanded });
            }
            return Ok(SecretString::from(trimmed.to_string()));
        }

        if let Some(name) = self.env_var {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }

    /// Like [`resolve`](Self::resolve), but an unconfigured source yields `None`.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>, SecretError> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub fn resolve_secret(
    direct: Option<&str>,
    file: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString, SecretError> {
    SecretSource::new(direct, file, env_var).resolve()
}

pub fn resolve_secret_optional(
    direct: Option<&str>,
    file: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>, SecretError> {
    SecretSource::new(direct, file, env_var).resolve_optional()
}

pub fn has_secret_source(direct: Option<&str>, file: Option<&str>, env_var: Option<&str>) -> bool {
    SecretSource::new(direct, file, env_var).is_configured()
}

/// Expands a leading `~` or `~/` to the home directory. `~user` is left alone.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
