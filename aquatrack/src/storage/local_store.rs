//! Local persistent store
//!
//! Holds one JSON snapshot slot per signed-in user. The slot file name is
//! the SHA-256 of the normalized identity so e-mail characters never reach
//! the filesystem.
//!
//! Example: "ana@example.com" is stored at "slots/3f1c...e9.json"
//!
//! Writes go to a temp file first and are renamed into place, so a slot is
//! always either the previous or the new document, never a torn mix.

use crate::error::Result;
use crate::models::{SessionIdentity, StoredSnapshot};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Per-user snapshot slots on local disk
#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at the given directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the slot directory if needed
    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        tracing::info!("Local store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Load the snapshot for `identity`.
    ///
    /// A missing slot is `None`. A slot that cannot be read or parsed is
    /// cleared and also reported as `None`.
    pub fn load(&self, identity: &SessionIdentity) -> Option<StoredSnapshot> {
        let path = self.slot_path(identity);

        if !path.exists() {
            tracing::debug!("No local slot for {}", identity.email);
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read local slot {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_str::<StoredSnapshot>(&content) {
            Ok(snapshot) => {
                tracing::debug!(
                    "Loaded local slot for {} (modified {})",
                    identity.email,
                    snapshot.last_modified
                );
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!("Local slot for {} is malformed, clearing it: {}", identity.email, e);
                if let Err(e) = self.clear(identity) {
                    tracing::error!("Failed to clear malformed slot: {}", e);
                }
                None
            }
        }
    }

    /// Replace the slot for `identity` with `snapshot`
    pub fn save(&self, identity: &SessionIdentity, snapshot: &StoredSnapshot) -> Result<()> {
        let path = self.slot_path(identity);
        let data = serde_json::to_vec(snapshot)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to temp file first (atomic replace)
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;

        fs::rename(temp_path, &path)?;

        tracing::debug!("Wrote local slot for {} ({} bytes)", identity.email, data.len());

        Ok(())
    }

    /// Remove the slot for `identity`
    pub fn clear(&self, identity: &SessionIdentity) -> Result<()> {
        let path = self.slot_path(identity);

        if !path.exists() {
            return Ok(()); // Nothing stored
        }

        fs::remove_file(&path)?;

        tracing::info!("Cleared local slot for {}", identity.email);

        Ok(())
    }

    /// Whether a slot exists for `identity`
    pub fn exists(&self, identity: &SessionIdentity) -> bool {
        self.slot_path(identity).exists()
    }

    /// Get file path for an identity
    fn slot_path(&self, identity: &SessionIdentity) -> PathBuf {
        self.root.join(format!("{}.json", slot_key(identity)))
    }

    /// Get local store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// SHA-256 of the trimmed, lowercased e-mail
fn slot_key(identity: &SessionIdentity) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.email.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}
