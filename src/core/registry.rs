//! Durable set of watched job ids.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::core::error::RegistryError;

pub const DEFAULT_REGISTRY_FILE: &str = "JobDatabase.json";

/// Job ids persisted as a JSON array, rewritten whole on every change.
#[derive(Debug)]
pub struct JobRegistry {
    path: PathBuf,
    ids: BTreeSet<String>,
}

impl JobRegistry {
    /// Loads the registry at `path`; a missing file is an empty registry.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let ids = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeSet::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| RegistryError::Json {
                    path: path.display().to_string(),
                    source,
                })?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeSet::new(),
            Err(source) => {
                return Err(RegistryError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        tracing::debug!(path = %path.display(), count = ids.len(), "loaded job registry");
        Ok(Self { path, ids })
    }

    /// Records `id`. Returns `Ok(true)` once the id is durably on disk for the
    /// first time, `Ok(false)` if it was already known.
    pub fn register(&mut self, id: &str) -> Result<bool, RegistryError> {
        if self.ids.contains(id) {
            return Ok(false);
        }

        self.ids.insert(id.to_string());
        if let Err(err) = self.persist() {
            self.ids.remove(id);
            return Err(err);
        }
        Ok(true)
    }

    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn persist(&self) -> Result<(), RegistryError> {
        let io_err = |source| RegistryError::Io {
            path: self.path.display().to_string(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let json = serde_json::to_vec_pretty(&self.ids).map_err(|source| RegistryError::Json {
            path: self.path.display().to_string(),
            source,
        })?;

        // Same directory as the target so the rename never crosses filesystems.
        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        // NamedTempFile is created owner-only; keep whatever mode the registry already had.
        if let Ok(existing) = fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(existing.permissions())
                .map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path)
            .map_err(|err| RegistryError::Persist {
                path: self.path.display().to_string(),
                message: err.error.to_string(),
            })?;
        Ok(())
    }
}
