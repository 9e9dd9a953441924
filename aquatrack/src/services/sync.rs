//! Local/remote reconciliation
//!
//! At session start the local slot and the remote document are compared
//! by `last_modified` and the later one wins (last write wins). The winner
//! is copied to whichever side is stale. When the stamps are equal the
//! remote copy wins.
//!
//! Remote failures never surface as errors here: a failed lookup or read
//! is treated as "remote absent" and the session carries on with the best
//! local data.
//!
//! After start, pushes run on a single background worker fed by a
//! latest-value channel, so bursts of mutations coalesce into one upload.

use crate::models::{SessionIdentity, StoredSnapshot};
use crate::services::session::SessionEvent;
use crate::storage::{FileHandle, LocalStore, RemoteStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Which side supplied the session's snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Both present, local was newer; remote was overwritten
    LocalWon,
    /// Both present, remote was newer or equal; local was overwritten
    RemoteWon,
    /// Only local data existed; it was pushed to the remote
    LocalOnly,
    /// Only remote data existed; it was saved locally
    RemoteOnly,
    /// Neither side had data; a fresh snapshot was created on both
    Initialized,
}

/// Result of reconciliation
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub snapshot: StoredSnapshot,
    /// Remote document, when known
    pub handle: Option<FileHandle>,
    pub outcome: SyncOutcome,
}

/// Decides the authoritative snapshot at session start
pub struct SyncEngine {
    local: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl SyncEngine {
    pub fn new(local: LocalStore, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self { local, remote }
    }

    /// Load both sides, pick the winner and repair the stale side
    pub async fn reconcile(&self, identity: &SessionIdentity, now: DateTime<Utc>) -> Reconciled {
        tracing::info!("Reconciling data for {}", identity.email);

        let (handle, remote) = self.fetch_remote().await;
        let local = self.local.load(identity);

        let (snapshot, outcome) = match (local, remote) {
            (Some(local), Some(remote)) => {
                if local.last_modified > remote.last_modified {
                    (local, SyncOutcome::LocalWon)
                } else {
                    (remote, SyncOutcome::RemoteWon)
                }
            }
            (Some(local), None) => (local, SyncOutcome::LocalOnly),
            (None, Some(remote)) => (remote, SyncOutcome::RemoteOnly),
            (None, None) => (StoredSnapshot::empty(now), SyncOutcome::Initialized),
        };

        let save_local = matches!(
            outcome,
            SyncOutcome::RemoteWon | SyncOutcome::RemoteOnly | SyncOutcome::Initialized
        );
        if save_local {
            if let Err(e) = self.local.save(identity, &snapshot) {
                tracing::error!("Failed to write reconciled snapshot locally: {}", e);
            }
        }

        let push_remote = matches!(
            outcome,
            SyncOutcome::LocalWon | SyncOutcome::LocalOnly | SyncOutcome::Initialized
        );
        let handle = match (&self.remote, push_remote) {
            (Some(remote), true) => push(remote.as_ref(), handle, &snapshot).await,
            _ => handle,
        };

        tracing::info!(
            "Reconciliation finished: {:?} (modified {})",
            outcome,
            snapshot.last_modified
        );

        Reconciled {
            snapshot,
            handle,
            outcome,
        }
    }

    /// Look up and read the remote document, absorbing failures
    async fn fetch_remote(&self) -> (Option<FileHandle>, Option<StoredSnapshot>) {
        let Some(remote) = &self.remote else {
            tracing::debug!("No remote store configured");
            return (None, None);
        };

        let handle = match remote.find().await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                tracing::info!("No remote snapshot yet");
                return (None, None);
            }
            Err(e) => {
                tracing::warn!("Remote lookup failed, continuing with local data: {}", e);
                return (None, None);
            }
        };

        match remote.read(&handle).await {
            Ok(snapshot) => (Some(handle), Some(snapshot)),
            Err(e) => {
                tracing::warn!("Failed to read remote snapshot {}: {}", handle.id, e);
                (Some(handle), None)
            }
        }
    }
}

/// Upload `snapshot`, creating the remote document when needed.
///
/// Returns the handle to use for the next push. Failures are logged and
/// leave the previous handle in place.
pub async fn push(
    remote: &dyn RemoteStore,
    handle: Option<FileHandle>,
    snapshot: &StoredSnapshot,
) -> Option<FileHandle> {
    let handle = match handle {
        Some(handle) => Some(handle),
        None => match remote.find().await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Remote lookup before push failed: {}", e);
                return None;
            }
        },
    };

    match handle {
        Some(handle) => match remote.update(&handle, snapshot).await {
            Ok(updated) => Some(updated),
            Err(e) => {
                tracing::warn!("Failed to update remote snapshot {}: {}", handle.id, e);
                Some(handle)
            }
        },
        None => match remote.create(snapshot).await {
            Ok(created) => Some(created),
            Err(e) => {
                tracing::warn!("Failed to create remote snapshot: {}", e);
                None
            }
        },
    }
}

/// Background uploader for snapshots produced after session start
pub struct PushWorker {
    pending: watch::Sender<Option<StoredSnapshot>>,
    task: JoinHandle<()>,
}

impl PushWorker {
    pub fn spawn(
        remote: Arc<dyn RemoteStore>,
        handle: Option<FileHandle>,
        syncing: Arc<AtomicBool>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (pending, mut rx) = watch::channel::<Option<StoredSnapshot>>(None);

        let task = tokio::spawn(async move {
            let mut handle = handle;

            // Ends once the sender is dropped and the last value is taken
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                let Some(snapshot) = next else {
                    continue;
                };

                syncing.store(true, Ordering::SeqCst);
                let _ = events.send(SessionEvent::SyncStateChanged { syncing: true });

                handle = push(remote.as_ref(), handle, &snapshot).await;

                syncing.store(false, Ordering::SeqCst);
                let _ = events.send(SessionEvent::SyncStateChanged { syncing: false });
            }

            tracing::debug!("Push worker finished");
        });

        Self { pending, task }
    }

    /// Queue `snapshot` for upload, replacing any not yet uploaded
    pub fn submit(&self, snapshot: StoredSnapshot) {
        self.pending.send_replace(Some(snapshot));
    }

    /// Upload whatever is still queued, then stop
    pub async fn shutdown(self) {
        drop(self.pending);
        if let Err(e) = self.task.await {
            tracing::error!("Push worker ended abnormally: {}", e);
        }
    }
}
