use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::SceneError;
use crate::math::Vector3;

use super::naming::hull_children;
use super::{ObjectId, Scene};

/// Host FBX exporter, restricted to a selection of objects.
pub trait FbxExporter {
    /// Writes `objects` to `path`.
    ///
    /// # Errors
    ///
    /// Returns the exporter's own message on failure.
    fn export(&mut self, path: &Path, objects: &[ObjectId]) -> Result<(), String>;
}

/// Exports a source together with its hull children as `<dir>/<source>.fbx`.
///
/// The source is moved to the origin for the duration of the export so the
/// file is authored around it, then put back where it was.
pub struct ExportWithCollision {
    source: ObjectId,
    dir: PathBuf,
}

impl ExportWithCollision {
    /// Creates a new `ExportWithCollision` operation.
    #[must_use]
    pub fn new(source: ObjectId, dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            dir: dir.into(),
        }
    }

    /// Executes the export, returning the written path.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::Export`] if the exporter fails, or a scene error
    /// for a stale source handle. The source location is restored either way.
    pub fn execute<S, E>(&self, scene: &mut S, exporter: &mut E) -> Result<PathBuf, SceneError>
    where
        S: Scene + ?Sized,
        E: FbxExporter + ?Sized,
    {
        let name = scene.object_name(self.source)?.to_string();
        let path = self.dir.join(format!("{name}.fbx"));

        let mut selection = vec![self.source];
        selection.extend(hull_children(scene, self.source)?);

        let location = scene.location(self.source)?;
        scene.set_location(self.source, Vector3::zeros())?;
        let exported = exporter.export(&path, &selection);
        scene.set_location(self.source, location)?;

        match exported {
            Ok(()) => {
                info!(path = %path.display(), objects = selection.len(), "exported with collision hulls");
                Ok(path)
            }
            Err(reason) => {
                warn!(path = %path.display(), %reason, "export failed");
                Err(SceneError::Export(reason))
            }
        }
    }
}
