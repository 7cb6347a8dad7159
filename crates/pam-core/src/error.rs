//! Unified error type for the partition–analyze–merge pipeline.
//!
//! Every library crate in the workspace reports failures as [`PamError`] at
//! public API boundaries. Algorithm-internal errors (for example the
//! min-cut partitioner's `PartitionError`) stay local: the partitioner
//! recovers from them instead of surfacing them.
//!
//! # Example
//!
//! ```ignore
//! use pam_core::{PamError, PamResult};
//!
//! fn load(dir: &Path) -> PamResult<Vec<PartitionResult<NodeId>>> {
//!     let store = FsArtifactStore::new(dir);
//!     ResultsMerger::default().load_all(&store)
//! }
//! ```

use thiserror::Error;

/// Unified error type for all pipeline operations.
#[derive(Error, Debug)]
pub enum PamError {
    /// I/O errors (file access, directory listing, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required artifact, directory, or node does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An operation that needs at least one input received none
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Artifacts that exist but do not belong together
    #[error("Artifact mismatch: {0}")]
    Mismatch(String),

    /// Per-partition analysis errors
    #[error("Analysis error: {0}")]
    Analysis(String),
}

/// Convenience type alias for Results using PamError.
pub type PamResult<T> = Result<T, PamError>;

impl PamError {
    /// True for the "missing input" family: callers use it to distinguish
    /// an incomplete artifact set from a corrupt one.
    pub fn is_not_found(&self) -> bool {
        match self {
            PamError::NotFound(_) => true,
            PamError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for PamError {
    fn from(err: serde_json::Error) -> Self {
        PamError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PamError::NotFound("results directory '/nonexistent'".into());
        assert!(err.to_string().contains("Not found"));
        assert!(err.to_string().contains("/nonexistent"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let pam_err: PamError = io_err.into();
        assert!(matches!(pam_err, PamError::Io(_)));
        assert!(pam_err.is_not_found());
    }

    #[test]
    fn test_empty_input_is_not_not_found() {
        let err = PamError::EmptyInput("no partition results".into());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> PamResult<()> {
            Err(PamError::Analysis("test".into()))
        }

        fn outer() -> PamResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
