pub mod fs;

use crate::app::Result;
use crate::domain::{JobId, SummaryArtifact};

pub use fs::FsResultStore;

/// Persisted results keyed by job id.
///
/// Existence of an artifact is the only completion signal the rest of the
/// system trusts.
pub trait ResultStore: Send + Sync {
    fn persist(&self, artifact: &SummaryArtifact) -> Result<()>;
    fn exists(&self, id: &JobId) -> bool;
    fn read(&self, id: &JobId) -> Result<Option<SummaryArtifact>>;
    fn list_ids(&self) -> Result<Vec<JobId>>;
}
