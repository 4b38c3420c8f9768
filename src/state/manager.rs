//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::types::{State, StreamState};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// State manager for persisting and loading state
#[derive(Debug)]
pub struct StateManager {
    /// Path to the state file
    path: PathBuf,
    /// Current state (cached)
    state: Arc<RwLock<State>>,
    /// Whether to auto-save on every update
    auto_save: bool,
}

impl StateManager {
    /// Create a new state manager with the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_state(path.as_ref().to_path_buf(), State::new(), true)
    }

    /// Create a state manager with auto-save disabled
    pub fn without_auto_save(path: impl AsRef<Path>) -> Self {
        Self::with_state(path.as_ref().to_path_buf(), State::new(), false)
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self::with_state(PathBuf::new(), State::new(), false)
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse_state(&contents, "state file")?
        } else {
            State::new()
        };

        Ok(Self::with_state(path, state, true))
    }

    /// Create a state manager from inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let state = parse_state(json, "state JSON")?;
        Ok(Self::with_state(PathBuf::new(), state, false))
    }

    fn with_state(path: PathBuf, state: State, auto_save: bool) -> Self {
        Self {
            path,
            state: Arc::new(RwLock::new(state)),
            auto_save,
        }
    }

    /// Save state to a specific file path
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = self.to_json_pretty().await?;
        write_atomic(path.as_ref(), &contents).await
    }

    /// Load state from file
    pub async fn load(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
        let loaded_state = parse_state(&contents, "state file")?;

        let mut state = self.state.write().await;
        *state = loaded_state;

        Ok(())
    }

    /// Save current state to file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }
        self.save_to_file(&self.path).await
    }

    /// Get a read lock on the current state
    pub async fn state(&self) -> tokio::sync::RwLockReadGuard<'_, State> {
        self.state.read().await
    }

    /// Get a write lock on the current state
    pub async fn state_mut(&self) -> tokio::sync::RwLockWriteGuard<'_, State> {
        self.state.write().await
    }

    /// Export state as JSON string
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Snapshot of a stream's state (empty if the stream has none)
    pub async fn stream_state(&self, stream: &str) -> StreamState {
        let state = self.state.read().await;
        state.get_stream(stream).cloned().unwrap_or_default()
    }

    /// Replace a stream's state
    pub async fn set_stream_state(&self, stream: &str, stream_state: StreamState) -> Result<()> {
        {
            let mut state = self.state.write().await;
            *state.get_stream_mut(stream) = stream_state;
        }

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    /// Get the bookmark for a stream
    pub async fn get_bookmark(&self, stream: &str) -> Option<DateTime<Utc>> {
        self.state.read().await.get_bookmark(stream)
    }

    /// Get the watermark for a stream
    pub async fn get_watermark(&self, stream: &str) -> Option<DateTime<Utc>> {
        self.state.read().await.get_watermark(stream)
    }

    /// Clear all state
    pub async fn clear(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            *state = State::new();
        }

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    /// Clear state for a specific stream
    pub async fn clear_stream(&self, stream: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.streams.remove(stream);
        }

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            state: Arc::clone(&self.state),
            auto_save: self.auto_save,
        }
    }
}

fn parse_state(contents: &str, source: &str) -> Result<State> {
    serde_json::from_str(contents).map_err(|e| Error::state(format!("Failed to parse {source}: {e}")))
}

/// Write to a temp file first, then rename over the target
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, contents)
        .await
        .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

    Ok(())
}
