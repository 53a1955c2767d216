//! Secret retrieval capabilities.
//!
//! The HMAC key is stored as hexadecimal text outside the application: a file on
//! disk, an environment variable, or anything else behind [`SecretStore`].

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::error::{PayboxError, Result};

/// Source of secret material.
///
/// `key` identifies the secret within the store: a file path for
/// [`FileSecretStore`], a variable name for [`EnvSecretStore`].
pub trait SecretStore: Send + Sync {
    /// Loads the secret text stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::SecretUnavailable`] when the secret cannot be read.
    fn get(&self, key: &str) -> Result<String>;
}

impl<S: SecretStore + ?Sized> SecretStore for &S {
    fn get(&self, key: &str) -> Result<String> {
        (**self).get(key)
    }
}

impl<S: SecretStore + ?Sized> SecretStore for Box<S> {
    fn get(&self, key: &str) -> Result<String> {
        (**self).get(key)
    }
}

/// Reads secrets from files.
///
/// Relative keys are resolved against the optional base directory.
#[derive(Debug, Clone, Default)]
pub struct FileSecretStore {
    base_dir: Option<PathBuf>,
}

impl FileSecretStore {
    /// Creates a store resolving keys as paths relative to the working directory.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_dir: None }
    }

    /// Creates a store resolving relative keys against `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: Some(base_dir.into()) }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let path = Path::new(key);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<String> {
        let path = self.resolve(key);
        fs::read_to_string(&path).map_err(|e| {
            PayboxError::SecretUnavailable(format!("cannot read '{}': {e}", path.display()))
        })
    }
}

/// Reads secrets from environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, key: &str) -> Result<String> {
        std::env::var(key).map_err(|e| {
            PayboxError::SecretUnavailable(format!("environment variable '{key}': {e}"))
        })
    }
}

/// In-memory secrets, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret under `key`.
    #[must_use]
    pub fn with_secret(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), secret.into());
        self
    }
}

impl SecretStore for StaticSecretStore {
    fn get(&self, key: &str) -> Result<String> {
        self.secrets.get(key).cloned().ok_or_else(|| {
            PayboxError::SecretUnavailable(format!("no secret stored under '{key}'"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_store_returns_secret() {
        let store = StaticSecretStore::new().with_secret("hmac", "736563726574");
        assert_eq!(store.get("hmac").unwrap(), "736563726574");
    }

    #[test]
    fn test_static_store_missing_key() {
        let store = StaticSecretStore::new();
        assert!(matches!(store.get("hmac"), Err(PayboxError::SecretUnavailable(_))));
    }

    #[test]
    fn test_file_store_reads_relative_to_base_dir() {
        let dir = std::env::temp_dir().join(format!("paybox-secret-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("hmac.key"), "736563726574\n").unwrap();

        let store = FileSecretStore::with_base_dir(&dir);
        assert_eq!(store.get("hmac.key").unwrap(), "736563726574\n");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_store_missing_file() {
        let store = FileSecretStore::new();
        let result = store.get("/nonexistent/paybox/hmac.key");
        assert!(matches!(result, Err(PayboxError::SecretUnavailable(_))));
    }

    #[test]
    fn test_env_store_missing_variable() {
        let result = EnvSecretStore.get("PAYBOX_GATEWAY_TEST_UNSET_VARIABLE");
        assert!(matches!(result, Err(PayboxError::SecretUnavailable(_))));
    }

    #[test]
    fn test_store_behind_reference() {
        let store = StaticSecretStore::new().with_secret("k", "00");
        let by_ref: &dyn SecretStore = &store;
        assert_eq!(by_ref.get("k").unwrap(), "00");
    }
}
