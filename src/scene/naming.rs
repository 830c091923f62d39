use tracing::info;

use crate::error::SceneError;

use super::{ObjectId, Scene};

/// Marker the FBX importer uses to recognize collision geometry.
pub const HULL_TOKEN: &str = "ConvexHull";

/// Minimum digit count of the hull index; shorter indices are zero-padded.
const INDEX_WIDTH: usize = 1;

/// Name of hull `index` of the object `source`: `<source>_ConvexHull<index>`.
///
/// A pure function of its arguments, so re-running a decomposition reproduces
/// the same names.
#[must_use]
pub fn hull_name(source: &str, index: usize) -> String {
    format!("{source}_{HULL_TOKEN}{index:0INDEX_WIDTH$}")
}

/// Inverse of [`hull_name`]: the hull index if `name` is a hull of `source`.
#[must_use]
pub fn hull_index(name: &str, source: &str) -> Option<usize> {
    let digits = name
        .strip_prefix(source)?
        .strip_prefix('_')?
        .strip_prefix(HULL_TOKEN)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Returns the hull children of `source`, ordered by hull index.
///
/// # Errors
///
/// Returns [`SceneError::ObjectNotFound`] if `source` does not exist.
pub fn hull_children<S: Scene + ?Sized>(scene: &S, source: ObjectId) -> Result<Vec<ObjectId>, SceneError> {
    let source_name = scene.object_name(source)?.to_string();
    let mut hulls: Vec<(usize, ObjectId)> = scene
        .children(source)?
        .into_iter()
        .filter_map(|child| {
            let name = scene.object_name(child).ok()?;
            hull_index(name, &source_name).map(|i| (i, child))
        })
        .collect();
    hulls.sort_by_key(|(i, _)| *i);
    Ok(hulls.into_iter().map(|(_, id)| id).collect())
}

/// Removes every object named like a hull of `source`.
///
/// The pipeline never purges on its own; callers that want re-runs to
/// replace earlier hulls invoke this first.
pub struct PurgeHulls {
    source: ObjectId,
}

impl PurgeHulls {
    /// Creates a new `PurgeHulls` operation.
    #[must_use]
    pub fn new(source: ObjectId) -> Self {
        Self { source }
    }

    /// Executes the purge, returning how many objects were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` does not exist.
    pub fn execute<S: Scene + ?Sized>(&self, scene: &mut S) -> Result<usize, SceneError> {
        let source_name = scene.object_name(self.source)?.to_string();
        let stale: Vec<ObjectId> = scene
            .objects()
            .into_iter()
            .filter(|&id| {
                scene
                    .object_name(id)
                    .is_ok_and(|name| hull_index(name, &source_name).is_some())
            })
            .collect();
        for &id in &stale {
            scene.remove_object(id)?;
        }
        info!(source = %source_name, removed = stale.len(), "purged stale hulls");
        Ok(stale.len())
    }
}
