//! Profile Document Storage
//!
//! Reads and writes the profile document at `~/.hostlink.json`. Every
//! mutation is a full read-modify-write of the document so the sibling
//! collection is never disturbed. Writes go through a `.tmp` file and a
//! rename, after copying the previous document to a `.bak` sidecar.
//!
//! An in-process mutex serializes read-modify-write cycles between the CLI
//! ops and relay tasks. Writers in *other* processes are not coordinated;
//! last write wins, which the single-operator assumption accepts.

use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use super::model::{ConnectionProfile, ProfileDocument, ProfileKind};

pub const DOCUMENT_FILE_NAME: &str = ".hostlink.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("home directory could not be resolved")]
    NoHomeDir,

    #[error("document io: {0}")]
    Io(#[from] std::io::Error),

    #[error("profile document corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no {kind} profile named '{name}'")]
    NotFound { kind: ProfileKind, name: String },

    #[error("a {kind} profile named '{name}' already exists")]
    AlreadyExists { kind: ProfileKind, name: String },

    #[error("invalid profile: {0}")]
    Validation(#[from] crate::validate::ValidationError),
}

/// Profile document storage manager
pub struct ProfileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ProfileStore {
    /// Store at the default location (`~/.hostlink.json`).
    pub fn new() -> Result<Self, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
        Ok(Self::with_path(home.join(DOCUMENT_FILE_NAME)))
    }

    /// Store at a custom path (for testing).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut os = self.path.as_os_str().to_os_string();
        os.push(suffix);
        PathBuf::from(os)
    }

    /// Path of the `.bak` sidecar written before each save.
    pub fn backup_path(&self) -> PathBuf {
        self.sibling(".bak")
    }

    /// Load the full document. A missing file is an empty registry; a
    /// document that fails to parse is an error, never silently replaced.
    pub fn load(&self) -> Result<ProfileDocument, StoreError> {
        let _guard = self.lock.lock();
        self.load_unlocked()
    }

    fn load_unlocked(&self) -> Result<ProfileDocument, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(ProfileDocument::default())
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn save_unlocked(&self, doc: &ProfileDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Best-effort backup of the last good document. Failure is logged
        // and the write proceeds.
        if self.path.exists() {
            let backup = self.backup_path();
            if let Err(e) = std::fs::copy(&self.path, &backup) {
                warn!("failed to write backup sidecar {:?}: {}", backup, e);
            }
        }

        // Write to a temp file, fsync, restrict to owner, then rename over
        // the document so a failed write leaves the prior document intact.
        let temp_path = self.sibling(".tmp");
        let json = serde_json::to_string_pretty(doc)?;

        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// One serialized read-modify-write cycle: load the document, apply the
    /// closure, and persist only if the closure succeeds.
    pub fn update<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut ProfileDocument) -> Result<T, StoreError>,
    {
        let _guard = self.lock.lock();
        let mut doc = self.load_unlocked()?;
        let out = f(&mut doc)?;
        self.save_unlocked(&doc)?;
        Ok(out)
    }

    /// All profiles of one kind, in name order.
    pub fn get(
        &self,
        kind: ProfileKind,
    ) -> Result<std::collections::BTreeMap<String, ConnectionProfile>, StoreError> {
        let doc = self.load()?;
        let map = match kind {
            ProfileKind::Ssh => doc
                .ssh
                .into_iter()
                .map(|(n, p)| (n, ConnectionProfile::Ssh(p)))
                .collect(),
            ProfileKind::Rdp => doc
                .rdp
                .into_iter()
                .map(|(n, p)| (n, ConnectionProfile::Rdp(p)))
                .collect(),
        };
        Ok(map)
    }

    /// One profile by kind and name.
    pub fn get_one(&self, kind: ProfileKind, name: &str) -> Result<ConnectionProfile, StoreError> {
        self.load()?
            .get(kind, name)
            .ok_or_else(|| StoreError::NotFound {
                kind,
                name: name.to_string(),
            })
    }

    /// Insert or replace a profile; the profile's kind selects the collection.
    pub fn put(&self, name: &str, profile: ConnectionProfile) -> Result<(), StoreError> {
        self.update(|doc| {
            match profile {
                ConnectionProfile::Ssh(p) => {
                    doc.ssh.insert(name.to_string(), p);
                }
                ConnectionProfile::Rdp(p) => {
                    doc.rdp.insert(name.to_string(), p);
                }
            }
            Ok(())
        })
    }

    /// Remove one profile; NotFound when the name is absent, with the
    /// document left untouched.
    pub fn delete(&self, kind: ProfileKind, name: &str) -> Result<(), StoreError> {
        self.update(|doc| {
            doc.remove(kind, name)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound {
                    kind,
                    name: name.to_string(),
                })
        })
    }
}
