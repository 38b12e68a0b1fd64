use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use client_core::ClientError;

/// Bearer token persisted between CLI invocations.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| {
                format!("failed to read token file '{}'", self.path.display())
            }),
        }
    }

    pub fn save(&self, token: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create token directory '{}'", parent.display())
            })?;
        }
        fs::write(&self.path, token)
            .with_context(|| format!("failed to write token file '{}'", self.path.display()))
    }

    /// Returns whether a token was removed.
    pub fn clear(&self) -> anyhow::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| {
                format!("failed to remove token file '{}'", self.path.display())
            }),
        }
    }

    /// Drops the stored token when the backend refused it. Returns whether
    /// the caller has to sign in again.
    pub fn discard_if_rejected(&self, err: &ClientError) -> anyhow::Result<bool> {
        if !err.requires_reauth() {
            return Ok(false);
        }
        self.clear()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use shared::error::ApiError;

    use super::*;

    fn temp_root(label: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        env::temp_dir().join(format!("coursefinder_{label}_{suffix}"))
    }

    #[test]
    fn save_load_clear_cycle() {
        let temp_root = temp_root("token_test");
        let store = TokenStore::new(temp_root.join("nested").join("token"));

        assert_eq!(store.load().expect("load missing"), None);
        store.save("abc123\n").expect("save");
        assert_eq!(store.load().expect("load").as_deref(), Some("abc123"));
        assert!(store.clear().expect("clear"));
        assert!(!store.clear().expect("clear again"));

        fs::remove_dir_all(temp_root).expect("cleanup");
    }

    #[test]
    fn rejected_token_is_discarded() {
        let temp_root = temp_root("token_reject");
        let store = TokenStore::new(temp_root.join("token"));
        store.save("stale").expect("save");

        let unavailable = ClientError::from(ApiError::from_status(503, "Service Unavailable"));
        assert!(!store.discard_if_rejected(&unavailable).expect("keep"));
        assert_eq!(store.load().expect("load").as_deref(), Some("stale"));

        let unauthorized = ClientError::from(ApiError::from_status(401, "Unauthorized"));
        assert!(store.discard_if_rejected(&unauthorized).expect("discard"));
        assert_eq!(store.load().expect("load"), None);

        fs::remove_dir_all(temp_root).expect("cleanup");
    }
}
