use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::models::User;

/// Session file name in the data directory
const SESSION_FILE: &str = "club-session.json";

/// The signed-in member, persisted as JSON.
///
/// Read once at startup with [`load`](Self::load), written on every change
/// after that.
pub struct SessionStore {
    dir: PathBuf,
    user: Option<User>,
    initialized: bool,
}

impl SessionStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            user: None,
            initialized: false,
        }
    }

    /// Restore the session from disk. Resolves no sooner than `min_latency`
    /// after the call so the startup screen does not flash.
    ///
    /// Unparsable content is discarded and treated as "no session".
    pub async fn load(&mut self, min_latency: Duration) -> Result<Option<&User>> {
        let started = tokio::time::Instant::now();

        self.user = self.read()?;

        let remaining = min_latency.saturating_sub(started.elapsed());
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
        self.initialized = true;
        debug!(signed_in = self.user.is_some(), "Session loaded");
        Ok(self.user.as_ref())
    }

    fn read(&self) -> Result<Option<User>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read(&path).context("Failed to read session file")?;
        match serde_json::from_slice(&contents) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Discarding corrupt session file");
                std::fs::remove_file(&path).context("Failed to remove corrupt session file")?;
                Ok(None)
            }
        }
    }

    /// Replace the current user and persist the change. `None` signs out.
    pub fn set_user(&mut self, user: Option<User>) -> Result<()> {
        let path = self.session_path();
        match &user {
            Some(user) => {
                std::fs::create_dir_all(&self.dir).context("Failed to create session directory")?;
                let contents = serde_json::to_string_pretty(user)?;
                std::fs::write(&path, contents).context("Failed to write session file")?;
            }
            None => {
                if path.exists() {
                    std::fs::remove_file(&path).context("Failed to remove session file")?;
                }
            }
        }
        self.user = user;
        Ok(())
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Whether the initial [`load`](Self::load) has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}
