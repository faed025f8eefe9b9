//! Environment-driven client configuration.

use std::env;
use std::path::PathBuf;

/// Base URL used when `ADMIN_API_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

pub const BASE_URL_ENV: &str = "ADMIN_API_URL";
pub const TOKEN_FILE_ENV: &str = "ADMIN_TOKEN_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    /// Where `FileTokenStore` keeps the token pair. `None` when no config
    /// directory could be determined.
    pub token_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let base_url = get(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let token_file = get(TOKEN_FILE_ENV)
            .map(PathBuf::from)
            .or_else(default_token_file);
        Self {
            base_url,
            token_file,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_file: default_token_file(),
        }
    }
}

fn default_token_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("admin-console").join("tokens.json"))
}
