use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::CredentialResolver;

/// Environment variable names
pub mod env_vars {
    pub const PRIVATE_KEY: &str = "X402_PRIVATE_KEY";
    pub const CONFIG_PATH: &str = "X402_CONFIG_PATH";
    pub const ENV_FILE: &str = "X402_ENV_FILE";
    pub const BASE_URL: &str = "X402_AGENTS_BASE_URL";
}

/// 402box agent gateway
pub const DEFAULT_BASE_URL: &str = "https://agents.402box.io";

/// Paid agents can take minutes to research a query
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_CONFIG_PATH: &str = "x402.config.json";
pub const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub timeout: Duration,
    pub config_path: PathBuf,
    pub env_file: PathBuf,
    /// Variable holding the key in the environment and env file
    pub private_key_var: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var(env_vars::BASE_URL)
                .ok()
                .filter(|url| !url.trim().is_empty())
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            config_path: env::var(env_vars::CONFIG_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
            env_file: env::var(env_vars::ENV_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_ENV_FILE)),
            private_key_var: env_vars::PRIVATE_KEY.to_string(),
        }
    }

    /// Resolver over this config's file and env sources. Built per call so
    /// key changes on disk are picked up without a restart.
    pub fn credential_resolver(&self) -> CredentialResolver {
        CredentialResolver::new(&self.config_path, &self.env_file)
            .with_env_var(&self.private_key_var)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            private_key_var: env_vars::PRIVATE_KEY.to_string(),
        }
    }
}
