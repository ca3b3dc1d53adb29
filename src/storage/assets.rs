use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub const ASSET_EXTENSION: &str = "png";

/// Generated images keyed by subject id: `<root>/<subject_id>.png`.
///
/// Writes for distinct subjects never collide. Concurrent writes for the same
/// subject are last-writer-wins; callers serialize per-subject regeneration.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic path for `subject_id`. Ids that could escape the root are rejected.
    pub fn path_for(&self, subject_id: &str) -> io::Result<PathBuf> {
        let valid = !subject_id.is_empty()
            && subject_id != "."
            && subject_id != ".."
            && !subject_id.contains(['/', '\\', '\0']);
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid subject id {subject_id:?}"),
            ));
        }
        Ok(self.root.join(format!("{subject_id}.{ASSET_EXTENSION}")))
    }

    pub async fn existing(&self, subject_id: &str) -> io::Result<Option<PathBuf>> {
        let path = self.path_for(subject_id)?;
        let exists = fs::try_exists(&path).await?;
        debug!(path = %path.display(), exists, "checked for existing asset");
        Ok(exists.then_some(path))
    }

    /// Write via a sibling temp file and rename, creating the root if needed.
    ///
    /// The temp name is fixed-length, so any id whose final name fits also fits here.
    pub async fn write(&self, subject_id: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(subject_id)?;
        fs::create_dir_all(&self.root).await?;

        let tmp = self
            .root
            .join(format!(".{:016x}.tmp", rand::random::<u64>()));
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }

        info!(path = %path.display(), bytes = bytes.len(), "saved generated asset");
        Ok(path)
    }

    /// Remove the asset for `subject_id`. Returns whether a file was removed.
    pub async fn delete(&self, subject_id: &str) -> io::Result<bool> {
        let path = self.path_for(subject_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "deleted asset");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
