//! Persisted access/refresh token pair.
//!
//! # Design
//! The store is the single source of the bearer token: the client reads it
//! every time it builds a request, and only the session writes it. Two
//! fixed keys hold the pair. Clearing never fails from the caller's point of
//! view; a store that cannot delete logs the problem and moves on.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::ApiError;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "admin_token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "admin_refresh_token";

/// Access/refresh token pair issued by `/accounts/token/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Shared, synchronously mutable token storage.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn store(&self, pair: &TokenPair) -> Result<(), ApiError>;
    fn clear(&self);
}

/// In-process store. Tokens are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: &TokenPair) -> Self {
        let store = Self::new();
        store.insert(pair);
        store
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn insert(&self, pair: &TokenPair) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(ACCESS_TOKEN_KEY.to_string(), pair.access.clone());
        entries.insert(REFRESH_TOKEN_KEY.to_string(), pair.refresh.clone());
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY)
    }

    fn store(&self, pair: &TokenPair) -> Result<(), ApiError> {
        self.insert(pair);
        Ok(())
    }

    fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(ACCESS_TOKEN_KEY);
        entries.remove(REFRESH_TOKEN_KEY);
    }
}

/// On-disk store: a JSON object keyed by `ACCESS_TOKEN_KEY` and
/// `REFRESH_TOKEN_KEY`. The file is re-read on every access so several
/// processes see each other's logins and logouts.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> HashMap<String, String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token file unreadable");
                return HashMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "token file is not valid JSON");
            HashMap::new()
        })
    }

    /// Write through an owner-only (0600 on unix) temp file in the same
    /// directory, then rename it over the target.
    fn write_entries(&self, entries: &HashMap<String, String>) -> Result<(), ApiError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| ApiError::Storage(e.to_string()))?;
        let raw =
            serde_json::to_string_pretty(entries).map_err(|e| ApiError::Storage(e.to_string()))?;

        let mut file =
            NamedTempFile::new_in(dir).map_err(|e| ApiError::Storage(e.to_string()))?;
        file.write_all(raw.as_bytes())
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        file.persist(&self.path)
            .map_err(|e| ApiError::Storage(e.error.to_string()))?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<String> {
        self.read_entries().remove(ACCESS_TOKEN_KEY)
    }

    fn refresh_token(&self) -> Option<String> {
        self.read_entries().remove(REFRESH_TOKEN_KEY)
    }

    fn store(&self, pair: &TokenPair) -> Result<(), ApiError> {
        let mut entries = self.read_entries();
        entries.insert(ACCESS_TOKEN_KEY.to_string(), pair.access.clone());
        entries.insert(REFRESH_TOKEN_KEY.to_string(), pair.refresh.clone());
        self.write_entries(&entries)
    }

    fn clear(&self) {
        let mut entries = self.read_entries();
        let had_tokens = entries.remove(ACCESS_TOKEN_KEY).is_some()
            | entries.remove(REFRESH_TOKEN_KEY).is_some();
        if !had_tokens {
            return;
        }
        if let Err(e) = self.write_entries(&entries) {
            warn!(path = %self.path.display(), error = %e, "failed to clear tokens");
        }
    }
}
