//! Persistence of completed sessions
//!
//! The tracking engine never touches storage; the application hands the
//! [`SnowboardSession`] returned by `stop` to a [`SessionStore`].

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::models::SnowboardSession;

/// Keyed collection of completed sessions
pub trait SessionStore {
    /// Insert or replace the session with the same id
    fn save(&mut self, session: &SnowboardSession) -> Result<()>;

    /// Look up a session, `None` when the id is unknown
    fn get(&self, id: &str) -> Result<Option<SnowboardSession>>;

    /// All stored sessions in insertion order
    fn list(&self) -> Result<Vec<SnowboardSession>>;

    /// Remove a session; unknown ids are ignored
    fn delete(&mut self, id: &str) -> Result<()>;
}

/// All sessions kept as one JSON array in a single file.
///
/// A missing file reads as an empty collection. Every write rewrites the whole
/// file through a sibling temporary file and a rename.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<SnowboardSession>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                }
                .into())
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            StorageError::Corrupted {
                path: self.path.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn persist(&self, sessions: &[SnowboardSession]) -> Result<()> {
        let io_error = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = serde_json::to_string_pretty(sessions).map_err(StorageError::from)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(io_error)?;
        fs::rename(&staging, &self.path).map_err(io_error)?;

        debug!(path = %self.path.display(), sessions = sessions.len(), "Session file written");
        Ok(())
    }
}

impl SessionStore for JsonSessionStore {
    fn save(&mut self, session: &SnowboardSession) -> Result<()> {
        let mut sessions = self.load()?;
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }
        self.persist(&sessions)?;

        info!(id = %session.id, total = sessions.len(), "Session saved");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<SnowboardSession>> {
        Ok(self.load()?.into_iter().find(|s| s.id == id))
    }

    fn list(&self) -> Result<Vec<SnowboardSession>> {
        self.load()
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let mut sessions = self.load()?;
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() != before {
            self.persist(&sessions)?;
            info!(id, "Session deleted");
        }
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    order: Vec<String>,
    sessions: BTreeMap<String, SnowboardSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&mut self, session: &SnowboardSession) -> Result<()> {
        if self
            .sessions
            .insert(session.id.clone(), session.clone())
            .is_none()
        {
            self.order.push(session.id.clone());
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<SnowboardSession>> {
        Ok(self.sessions.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<SnowboardSession>> {
        Ok(self
            .order
            .iter()
            .filter_map(|id| self.sessions.get(id).cloned())
            .collect())
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        if self.sessions.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
        }
        Ok(())
    }
}
