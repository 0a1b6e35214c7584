//! Saved session storage

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{MemoriaError, Result};

use super::id::extract_session_id;

const FILE_PREFIX: &str = "chat-";
const FILE_EXTENSION: &str = "yaml";

/// One persisted session: its turn log and derived context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    #[serde(default)]
    pub turns: Vec<String>,
    #[serde(default)]
    pub context: Vec<String>,
}

impl SavedSession {
    pub fn new(turns: Vec<String>, context: Vec<String>) -> Self {
        Self { turns, context }
    }
}

/// Persistence backend for sessions.
///
/// Mapping a session id to a storage identifier is the store's concern;
/// `list` returns identifiers that `load` accepts.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a session under `session_id`, replacing any earlier save
    async fn save(&self, session_id: &str, turns: &[String], context: &[String]) -> Result<()>;

    /// Load a session by identifier (or bare session id)
    async fn load(&self, identifier: &str) -> Result<SavedSession>;

    /// Saved identifiers, newest first
    async fn list(&self) -> Result<Vec<String>>;
}

/// Stores each session as `chat-<id>.yaml` in one directory
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the session files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name used for `session_id`
    pub fn file_name(session_id: &str) -> String {
        format!("{}{}.{}", FILE_PREFIX, session_id, FILE_EXTENSION)
    }

    fn path_for(&self, identifier: &str) -> Result<PathBuf> {
        let name = Path::new(identifier)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MemoriaError::Storage(format!("Invalid session identifier: {}", identifier))
            })?;

        if name.ends_with(&format!(".{}", FILE_EXTENSION)) {
            return Ok(self.dir.join(name));
        }

        // A bare id (or anything carrying one) maps onto the canonical file name
        let id = extract_session_id(name).ok_or_else(|| {
            MemoriaError::Storage(format!("Invalid session identifier: {}", identifier))
        })?;
        Ok(self.dir.join(Self::file_name(&id)))
    }

    fn is_session_file(name: &str) -> bool {
        name.starts_with(FILE_PREFIX) && name.ends_with(&format!(".{}", FILE_EXTENSION))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, session_id: &str, turns: &[String], context: &[String]) -> Result<()> {
        if session_id.is_empty() || session_id.contains(['/', '\\']) || session_id.contains("..")
        {
            return Err(MemoriaError::Storage(format!(
                "Invalid session id: {}",
                session_id
            )));
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let saved = SavedSession::new(turns.to_vec(), context.to_vec());
        let yaml = serde_yaml::to_string(&saved)?;

        // Write then rename, so a crash never leaves a truncated session behind
        let path = self.dir.join(Self::file_name(session_id));
        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(session_id, path = %path.display(), turns = turns.len(), "Saved session");
        Ok(())
    }

    async fn load(&self, identifier: &str) -> Result<SavedSession> {
        let path = self.path_for(identifier)?;
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            MemoriaError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let saved: SavedSession = serde_yaml::from_str(&content)?;

        debug!(path = %path.display(), turns = saved.turns.len(), "Loaded session");
        Ok(saved)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found: Vec<(SystemTime, String)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !Self::is_session_file(&name) {
                continue;
            }
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, name));
        }

        // Newest first: ids are creation timestamps, modification time breaks ties
        found.sort_by(|(a_time, a_name), (b_time, b_name)| {
            session_order(b_name)
                .cmp(&session_order(a_name))
                .then(b_time.cmp(a_time))
                .then(b_name.cmp(a_name))
        });

        Ok(found.into_iter().map(|(_, name)| name).collect())
    }
}

fn session_order(identifier: &str) -> u128 {
    extract_session_id(identifier)
        .and_then(|id| id.parse().ok())
        .unwrap_or(0)
}

/// In-process store, for tests and offline runs
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SavedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Saved session for `session_id`, if any
    pub async fn get(&self, session_id: &str) -> Option<SavedSession> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session_id: &str, turns: &[String], context: &[String]) -> Result<()> {
        self.sessions.write().await.insert(
            session_id.to_string(),
            SavedSession::new(turns.to_vec(), context.to_vec()),
        );
        Ok(())
    }

    async fn load(&self, identifier: &str) -> Result<SavedSession> {
        let sessions = self.sessions.read().await;
        if let Some(saved) = sessions.get(identifier) {
            return Ok(saved.clone());
        }
        extract_session_id(identifier)
            .and_then(|id| sessions.get(&id).cloned())
            .ok_or_else(|| MemoriaError::Storage(format!("Session not found: {}", identifier)))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort_by(|a, b| session_order(b).cmp(&session_order(a)).then(b.cmp(a)));
        Ok(ids)
    }
}
