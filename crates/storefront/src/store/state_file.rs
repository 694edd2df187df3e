//! Local persistence of the session snapshot.
//!
//! A small JSON document mirrors the signed-in user to disk so a restarted
//! process can render the account area before the live-session probe
//! reconciles. The file is advisory: anything unreadable means starting
//! signed out, and every write is best-effort.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::CurrentUser;

/// Namespace key stamped into every snapshot document.
///
/// Bump the version segment when the snapshot shape changes; old files are
/// then ignored instead of misread.
pub const SESSION_STATE_KEY: &str = "velour.session.v1";

#[derive(Debug, Error)]
enum StateFileError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state file key {found:?} is not {SESSION_STATE_KEY:?}")]
    WrongKey { found: String },
}

/// On-disk envelope for the session snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    key: String,
    user: Option<CurrentUser>,
}

/// Handle to the session snapshot file.
///
/// Writes are sequenced: every call takes a ticket from a monotonic counter,
/// and a write that finds a newer ticket outstanding skips its disk I/O so
/// the last state handed to [`StateFile::persist`] is the one that lands.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    write_seq: AtomicU64,
    write_lock: Mutex<()>,
}

impl StateFile {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_seq: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// Read the persisted user snapshot.
    ///
    /// Missing, corrupt, or differently-keyed files all yield `None`; the
    /// caller starts unauthenticated and the live probe takes it from there.
    pub async fn load(&self) -> Option<CurrentUser> {
        match self.read_snapshot().await {
            Ok(user) => user,
            Err(StateFileError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring session snapshot");
                None
            }
        }
    }

    /// Write the user snapshot, or remove the file when `user` is `None`.
    ///
    /// Failures are logged at debug and swallowed; persistence never blocks
    /// a session transition.
    pub async fn persist(&self, user: Option<CurrentUser>) {
        let ticket = self.write_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = self.write_lock.lock().await;

        // A later persist call supersedes this one
        if self.write_seq.load(Ordering::SeqCst) != ticket {
            return;
        }

        let result = match user {
            Some(user) => self.write_snapshot(user).await,
            None => self.remove().await,
        };
        if let Err(e) = result {
            debug!(path = %self.path.display(), error = %e, "could not persist session snapshot");
        }
    }

    async fn read_snapshot(&self) -> Result<Option<CurrentUser>, StateFileError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        if snapshot.key != SESSION_STATE_KEY {
            return Err(StateFileError::WrongKey {
                found: snapshot.key,
            });
        }
        Ok(snapshot.user)
    }

    async fn write_snapshot(&self, user: CurrentUser) -> Result<(), StateFileError> {
        let snapshot = Snapshot {
            key: SESSION_STATE_KEY.to_string(),
            user: Some(user),
        };
        let raw = serde_json::to_string(&snapshot)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }

    async fn remove(&self) -> Result<(), StateFileError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
