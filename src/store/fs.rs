use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app::Result;
use crate::domain::{JobId, SummaryArtifact};
use crate::store::ResultStore;

const EXTENSION: &str = "json";

/// One pretty-printed JSON file per job id in a flat directory
pub struct FsResultStore {
    dir: PathBuf,
}

impl FsResultStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &JobId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, EXTENSION))
    }
}

impl ResultStore for FsResultStore {
    fn persist(&self, artifact: &SummaryArtifact) -> Result<()> {
        let path = self.path_for(&artifact.id);
        let tmp = self.dir.join(format!(".{}.tmp", artifact.id));

        // Write aside and rename so a visible artifact is always complete
        let json = serde_json::to_vec_pretty(artifact)?;
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;

        debug!(id = %artifact.id, path = %path.display(), "Persisted artifact");
        Ok(())
    }

    fn exists(&self, id: &JobId) -> bool {
        self.path_for(id).is_file()
    }

    fn read(&self, id: &JobId) -> Result<Option<SummaryArtifact>> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn list_ids(&self) -> Result<Vec<JobId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| JobId::new(s).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}
