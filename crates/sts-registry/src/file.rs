//! File-backed registries.
//!
//! Both registries keep their state in memory and write the whole state to a
//! JSON file after every change. Writes go to a sibling temporary file that is
//! then renamed over the target, so a crash never leaves a half-written file.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{RegistryError, RegistryResult};
use crate::revocation::RevocationRegistry;
use crate::token::{RegisteredToken, TokenRegistry};

fn load<T: DeserializeOwned + Default>(path: &Path) -> RegistryResult<T> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(T::default()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(RegistryError::io(path.display(), &err)),
    }
}

fn store<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(|err| RegistryError::io(tmp.display(), &err))?;
    fs::rename(&tmp, path).map_err(|err| RegistryError::io(path.display(), &err))
}

fn ensure_parent(path: &Path) -> RegistryResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| RegistryError::io(parent.display(), &err))
        }
        _ => Ok(()),
    }
}

/// Token registry persisted to a JSON file.
#[derive(Debug)]
pub struct FileTokenRegistry {
    path: PathBuf,
    tokens: Mutex<HashMap<String, RegisteredToken>>,
}

impl FileTokenRegistry {
    /// Opens the registry at `path`, loading existing entries.
    ///
    /// ## Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> RegistryResult<Self> {
        let path = path.into();
        ensure_parent(&path)?;
        let tokens: HashMap<String, RegisteredToken> = load(&path)?;
        tracing::info!(
            path = %path.display(),
            tokens = tokens.len(),
            "opened file token registry"
        );
        Ok(Self {
            path,
            tokens: Mutex::new(tokens),
        })
    }

    /// Returns the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenRegistry for FileTokenRegistry {
    fn add_token(&self, id: &str, token: RegisteredToken) -> RegistryResult<()> {
        let mut tokens = self.tokens.lock();
        let previous = tokens.insert(id.to_string(), token);
        if let Err(err) = store(&self.path, &*tokens) {
            // Keep memory and file in step.
            match previous {
                Some(previous) => tokens.insert(id.to_string(), previous),
                None => tokens.remove(id),
            };
            return Err(err);
        }
        Ok(())
    }

    fn get_token(&self, id: &str) -> Option<RegisteredToken> {
        self.tokens.lock().get(id).cloned()
    }

    fn remove_token(&self, id: &str) -> RegistryResult<()> {
        let mut tokens = self.tokens.lock();
        let Some(previous) = tokens.remove(id) else {
            return Ok(());
        };
        if let Err(err) = store(&self.path, &*tokens) {
            tokens.insert(id.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }

    fn remove_expired(&self, now: DateTime<Utc>) -> RegistryResult<Vec<RegisteredToken>> {
        let mut tokens = self.tokens.lock();
        let expired: Vec<String> = tokens
            .values()
            .filter(|token| token.is_expired(now))
            .map(|token| token.id.clone())
            .collect();
        if expired.is_empty() {
            return Ok(Vec::new());
        }

        let removed: Vec<(String, RegisteredToken)> = expired
            .into_iter()
            .filter_map(|id| tokens.remove(&id).map(|token| (id, token)))
            .collect();
        if let Err(err) = store(&self.path, &*tokens) {
            tokens.extend(removed);
            return Err(err);
        }
        Ok(removed.into_iter().map(|(_, token)| token).collect())
    }

    fn len(&self) -> usize {
        self.tokens.lock().len()
    }
}

/// Revocation registry persisted to a JSON file.
#[derive(Debug)]
pub struct FileRevocationRegistry {
    path: PathBuf,
    revoked: Mutex<BTreeSet<(String, String)>>,
}

impl FileRevocationRegistry {
    /// Opens the registry at `path`, loading existing entries.
    ///
    /// ## Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> RegistryResult<Self> {
        let path = path.into();
        ensure_parent(&path)?;
        let revoked: BTreeSet<(String, String)> = load(&path)?;
        tracing::info!(
            path = %path.display(),
            revoked = revoked.len(),
            "opened file revocation registry"
        );
        Ok(Self {
            path,
            revoked: Mutex::new(revoked),
        })
    }
}

impl RevocationRegistry for FileRevocationRegistry {
    fn revoke_token(&self, token_type: &str, id: &str) -> RegistryResult<()> {
        let mut revoked = self.revoked.lock();
        let key = (token_type.to_string(), id.to_string());
        if !revoked.insert(key.clone()) {
            return Ok(());
        }
        if let Err(err) = store(&self.path, &*revoked) {
            revoked.remove(&key);
            return Err(err);
        }
        tracing::debug!(token_type, token_id = id, "token revoked");
        Ok(())
    }

    fn is_revoked(&self, token_type: &str, id: &str) -> bool {
        self.revoked
            .lock()
            .contains(&(token_type.to_string(), id.to_string()))
    }
}
