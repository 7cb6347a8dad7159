//! Artifact storage: the only state shared between pipeline stages.
//!
//! Every partition and every analysis result is one artifact with exactly one
//! writer. Discovery relies on the naming convention below, so it is part of
//! the on-disk contract even though the byte format is not:
//!
//! | Artifact | File name |
//! |----------|-----------|
//! | raw partition `i` | `partition_{i:05}.json.gz` |
//! | analysis result `i` | `result_{i:05}.json.gz` |
//!
//! Listing parses names back into indices and sorts numerically, so the
//! order stays correct past 99,999 partitions even though the zero padding
//! no longer lines up lexicographically.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pam_core::{PamError, PamResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ARTIFACT_SUFFIX: &str = ".json.gz";

/// The two artifact families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Partition,
    Result,
}

impl ArtifactKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Partition => "partition",
            ArtifactKind::Result => "result",
        }
    }
}

/// Artifact address: family plus partition index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId {
    pub kind: ArtifactKind,
    pub index: usize,
}

impl ArtifactId {
    pub fn partition(index: usize) -> Self {
        Self {
            kind: ArtifactKind::Partition,
            index,
        }
    }

    pub fn result(index: usize) -> Self {
        Self {
            kind: ArtifactKind::Result,
            index,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}_{:05}{}", self.kind.prefix(), self.index, ARTIFACT_SUFFIX)
    }

    /// Inverse of [`ArtifactId::file_name`]; `None` for anything else.
    pub fn parse(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(ARTIFACT_SUFFIX)?;
        let (prefix, digits) = stem.rsplit_once('_')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let kind = match prefix {
            "partition" => ArtifactKind::Partition,
            "result" => ArtifactKind::Result,
            _ => return None,
        };
        Some(Self {
            kind,
            index: digits.parse().ok()?,
        })
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Byte-level artifact storage.
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `id`, replacing any previous artifact. Returns a
    /// locator (a path for filesystem stores) for logs and manifests.
    fn put(&self, id: ArtifactId, bytes: &[u8]) -> PamResult<String>;

    /// Fetch the artifact; [`PamError::NotFound`] if it does not exist.
    fn get(&self, id: ArtifactId) -> PamResult<Vec<u8>>;

    /// Sorted indices of every stored artifact of `kind`.
    fn list_ids(&self, kind: ArtifactKind) -> PamResult<Vec<usize>>;

    fn contains(&self, id: ArtifactId) -> PamResult<bool> {
        Ok(self.list_ids(id.kind)?.binary_search(&id.index).is_ok())
    }
}

/// Directory-backed store.
///
/// The directory is created on the first `put`. Writes go to a hidden
/// temporary file that is renamed into place, so a concurrent reader sees
/// either the old artifact or the complete new one.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, id: ArtifactId) -> PathBuf {
        self.root.join(id.file_name())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, id: ArtifactId, bytes: &[u8]) -> PamResult<String> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_of(id);
        let tmp = self.root.join(format!(".{}.tmp", id.file_name()));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!(artifact = %path.display(), bytes = bytes.len(), "stored artifact");
        Ok(path.display().to_string())
    }

    fn get(&self, id: ArtifactId) -> PamResult<Vec<u8>> {
        let path = self.path_of(id);
        fs::read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => {
                PamError::NotFound(format!("artifact '{}'", path.display()))
            }
            _ => PamError::Io(err),
        })
    }

    fn list_ids(&self, kind: ArtifactKind) -> PamResult<Vec<usize>> {
        if !self.root.is_dir() {
            return Err(PamError::NotFound(format!(
                "artifact directory '{}'",
                self.root.display()
            )));
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(ArtifactId::parse) {
                if id.kind == kind {
                    ids.push(id.index);
                }
            }
        }
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn contains(&self, id: ArtifactId) -> PamResult<bool> {
        Ok(self.path_of(id).is_file())
    }
}

/// In-process store for tests and single-process pipelines.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<BTreeMap<ArtifactId, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ArtifactId, Vec<u8>>> {
        // a panicking writer cannot leave a half-inserted entry behind
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, id: ArtifactId, bytes: &[u8]) -> PamResult<String> {
        self.lock().insert(id, bytes.to_vec());
        Ok(format!("memory://{}", id.file_name()))
    }

    fn get(&self, id: ArtifactId) -> PamResult<Vec<u8>> {
        self.lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| PamError::NotFound(format!("artifact '{id}'")))
    }

    fn list_ids(&self, kind: ArtifactKind) -> PamResult<Vec<usize>> {
        Ok(self
            .lock()
            .keys()
            .filter(|id| id.kind == kind)
            .map(|id| id.index)
            .collect())
    }
}
