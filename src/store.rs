// src/store.rs
//
// Message content storage. The engine only keeps metadata (UIDs, flags,
// dates); raw RFC 5322 bytes live behind the MessageStore trait.

use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Opaque handle to stored message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId(pub u64);

/// Durable content storage consumed by the engine.
///
/// Implementations may block. Calls are made while the lock of the mailbox
/// being changed is held, and while the hierarchy lock is held when a delete
/// releases a mailbox's content. They must not call back into the engine.
pub trait MessageStore: Send + Sync {
    /// Persist content and return its handle.
    fn save(&self, content: &[u8]) -> Result<BlobId>;

    /// Load content previously saved.
    fn load(&self, id: BlobId) -> Result<Arc<Vec<u8>>>;

    /// Forget content. Removing an unknown id is not an error.
    fn remove(&self, id: BlobId) -> Result<()>;
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<BlobId, Arc<Vec<u8>>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageStore for MemoryStore {
    fn save(&self, content: &[u8]) -> Result<BlobId> {
        let id = BlobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.blobs.write()?.insert(id, Arc::new(content.to_vec()));
        Ok(id)
    }

    fn load(&self, id: BlobId) -> Result<Arc<Vec<u8>>> {
        self.blobs
            .read()?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Store(format!("blob {} not found", id.0)))
    }

    fn remove(&self, id: BlobId) -> Result<()> {
        self.blobs.write()?.remove(&id);
        Ok(())
    }
}

/// One file per message under a root directory.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    next_id: AtomicU64,
}

impl FsStore {
    /// Opens (creating if needed) a store rooted at `root`. Numbering resumes
    /// after the highest existing blob file.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let mut highest = 0;
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name();
            let stem = name.to_string_lossy();
            if let Some(n) = stem.strip_suffix(".eml").and_then(|s| s.parse::<u64>().ok()) {
                highest = highest.max(n + 1);
            }
        }
        debug!("Opened message store at {} (next blob {})", root.display(), highest);
        Ok(Self {
            root: root.to_path_buf(),
            next_id: AtomicU64::new(highest),
        })
    }

    /// Default location under the platform data directory.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("imap-mailstore")
            .join("blobs")
    }

    fn path_for(&self, id: BlobId) -> PathBuf {
        self.root.join(format!("{}.eml", id.0))
    }
}

impl MessageStore for FsStore {
    fn save(&self, content: &[u8]) -> Result<BlobId> {
        let id = BlobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        fs::write(self.path_for(id), content)?;
        Ok(id)
    }

    fn load(&self, id: BlobId) -> Result<Arc<Vec<u8>>> {
        let path = self.path_for(id);
        fs::read(&path)
            .map(Arc::new)
            .map_err(|e| Error::Store(format!("failed to read {}: {}", path.display(), e)))
    }

    fn remove(&self, id: BlobId) -> Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("Failed to remove blob {}: {}", id.0, e);
                Err(e.into())
            }
        }
    }
}
