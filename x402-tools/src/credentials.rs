//! Private key resolution for the x402 signing wallet
//!
//! Sources are tried in order:
//! 1. Local JSON config file (`{ "private_key": "..." }`)
//! 2. `X402_PRIVATE_KEY` from the process environment
//! 3. `X402_PRIVATE_KEY` from the env file (`.env`)
//!
//! A missing config file falls through to the environment. A config file that
//! exists but can't be read or parsed is an error and does not fall through.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs, io};
use thiserror::Error;

use crate::config::env_vars;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{var} is required (set it in the environment, the env file, or `private_key` in the config file)")]
    Missing { var: String },

    #[error("Failed to load config file {}: {source}", .path.display())]
    MalformedConfig {
        path: PathBuf,
        #[source]
        source: ConfigFileError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    private_key: Option<String>,
}

/// Resolves the signing key fresh on every call. Nothing is cached.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    config_path: PathBuf,
    env_file: PathBuf,
    env_var: String,
}

impl CredentialResolver {
    pub fn new(config_path: impl AsRef<Path>, env_file: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            env_file: env_file.as_ref().to_path_buf(),
            env_var: env_vars::PRIVATE_KEY.to_string(),
        }
    }

    /// Look up a different variable name in the environment and env file
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Resolve the private key, normalized to a `0x`-prefixed string
    pub fn resolve(&self) -> Result<String, CredentialError> {
        if let Some(key) = self.read_config_file()? {
            log::debug!(
                "[CREDENTIALS] Using private key from {}",
                self.config_path.display()
            );
            return Ok(normalize_private_key(&key));
        }

        if let Some(key) = self.read_environment() {
            return Ok(normalize_private_key(&key));
        }

        Err(CredentialError::Missing {
            var: self.env_var.clone(),
        })
    }

    /// `Ok(None)` when the file is absent or carries no key
    fn read_config_file(&self) -> Result<Option<String>, CredentialError> {
        let contents = match fs::read_to_string(&self.config_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.malformed(e.into())),
        };

        let file: CredentialFile =
            serde_json::from_str(&contents).map_err(|e| self.malformed(e.into()))?;

        Ok(file.private_key.and_then(non_empty))
    }

    fn read_environment(&self) -> Option<String> {
        if let Some(key) = env::var(&self.env_var).ok().and_then(non_empty) {
            log::debug!("[CREDENTIALS] Using private key from ${}", self.env_var);
            return Some(key);
        }
        self.read_env_file()
    }

    /// Scans the env file without touching the process environment
    fn read_env_file(&self) -> Option<String> {
        let entries = match dotenvy::from_path_iter(&self.env_file) {
            Ok(entries) => entries,
            Err(e) => {
                if !e.not_found() {
                    log::warn!(
                        "[CREDENTIALS] Could not read env file {}: {}",
                        self.env_file.display(),
                        e
                    );
                }
                return None;
            }
        };

        for entry in entries {
            match entry {
                Ok((name, value)) if name == self.env_var => {
                    log::debug!(
                        "[CREDENTIALS] Using private key from {}",
                        self.env_file.display()
                    );
                    return non_empty(value);
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!(
                        "[CREDENTIALS] Skipping bad line in {}: {}",
                        self.env_file.display(),
                        e
                    );
                }
            }
        }
        None
    }

    fn malformed(&self, source: ConfigFileError) -> CredentialError {
        CredentialError::MalformedConfig {
            path: self.config_path.clone(),
            source,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Prefix with `0x` unless already present
pub fn normalize_private_key(key: &str) -> String {
    let key = key.trim();
    if key.starts_with("0x") {
        key.to_string()
    } else {
        format!("0x{}", key)
    }
}
