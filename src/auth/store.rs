use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::CredentialPair;
use crate::error::{AuthError, Result};

const CREDENTIAL_FILE_NAME: &str = "credentials.toml";
const CREDENTIAL_FILE_VERSION: u32 = 1;

/// Durable holder for the current credential pair.
///
/// Reads are synchronous: the gateway consults the store before every
/// outgoing request. `set` overwrites whatever was stored before and
/// `clear` is idempotent.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<CredentialPair>>;
    fn set(&self, pair: &CredentialPair) -> Result<()>;
    fn clear(&self) -> Result<()>;

    fn has_credentials(&self) -> bool {
        matches!(self.get(), Ok(Some(_)))
    }
}

/// File-backed credential store using a TOML file.
///
/// The file holds the access and refresh tokens under two keys and survives
/// process restarts.
///
/// # Example
/// ```no_run
/// use authkeep::auth::{CredentialPair, CredentialStore, FileCredentialStore};
///
/// let store = FileCredentialStore::new("/tmp/authkeep");
/// store.set(&CredentialPair::new("access", "refresh"))?;
/// assert!(store.has_credentials());
/// # Ok::<(), authkeep::error::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: base_dir.into().join(CREDENTIAL_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<CredentialPair>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err)),
        };
        let file: CredentialFile = toml::from_str(&raw)?;
        if file.version != CREDENTIAL_FILE_VERSION {
            return Err(AuthError::Configuration(format!(
                "Unsupported credentials file version {} at {}",
                file.version,
                self.path.display()
            )));
        }
        Ok(Some(CredentialPair::new(file.access_token, file.refresh_token)))
    }

    fn set(&self, pair: &CredentialPair) -> Result<()> {
        let file = CredentialFile {
            version: CREDENTIAL_FILE_VERSION,
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            saved_at: Utc::now(),
        };
        let serialized = toml::to_string(&file)?;
        write_private(&self.path, serialized.as_bytes(), "credentials")
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CredentialFile {
    version: u32,
    access_token: String,
    refresh_token: String,
    saved_at: DateTime<Utc>,
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<CredentialPair>> {
        Ok(self.pair.read().map_err(poisoned)?.clone())
    }

    fn set(&self, pair: &CredentialPair) -> Result<()> {
        *self.pair.write().map_err(poisoned)? = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.pair.write().map_err(poisoned)? = None;
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> AuthError {
    AuthError::Configuration("credential store lock poisoned".to_string())
}

/// Replace `path` with `data` so readers only ever see a complete file.
///
/// The bytes are staged next to the target under a random name, created
/// owner-only, then renamed over it. `label` names the file in errors.
pub(crate) fn write_private(path: &Path, data: &[u8], label: &str) -> Result<()> {
    let context = |err: std::io::Error| {
        AuthError::Io(std::io::Error::new(
            err.kind(),
            format!("failed to write {label} to {}: {err}", path.display()),
        ))
    };

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(context)?;
    }

    let name = path.file_name().ok_or_else(|| {
        AuthError::Configuration(format!("{label} path {} has no file name", path.display()))
    })?;
    let staging = path.with_file_name(format!(
        ".{}.{}.staging",
        name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    ));

    stage_private(&staging, data)
        .and_then(|()| fs::rename(&staging, path))
        .map_err(|err| {
            let _ = fs::remove_file(&staging);
            context(err)
        })
}

fn stage_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}
