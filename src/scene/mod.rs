//! Host scene surface and the operations that place hulls into it.

mod appearance;
mod export;
mod materialize;
mod naming;
mod store;

pub use appearance::{HullAppearance, SetHullAlpha};
pub use export::{ExportWithCollision, FbxExporter};
pub use materialize::Materialize;
pub use naming::{hull_children, hull_index, hull_name, PurgeHulls, HULL_TOKEN};
pub use store::SceneStore;

use crate::error::SceneError;
use crate::math::{Point3, Vector3};
use crate::mesh::SourceMesh;

slotmap::new_key_type! {
    /// Handle to an object in the host scene.
    pub struct ObjectId;
}

slotmap::new_key_type! {
    /// Handle to a grouping collection in the host scene.
    pub struct CollectionId;
}

/// RGBA display colour, components in `0.0..=1.0`.
pub type Rgba = [f32; 4];

/// The part of the host scene API the pipeline reads and writes.
///
/// Implementations must keep object names unique.
pub trait Scene {
    /// Returns the name of an object.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ObjectNotFound`] for a stale handle.
    fn object_name(&self, id: ObjectId) -> Result<&str, SceneError>;

    /// Looks an object up by name.
    fn find_object(&self, name: &str) -> Option<ObjectId>;

    /// All objects in the scene.
    fn objects(&self) -> Vec<ObjectId>;

    /// Returns the object's mesh with vertices transformed into world space.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist or carries no mesh.
    fn world_mesh(&self, id: ObjectId) -> Result<SourceMesh, SceneError>;

    /// Creates an unparented mesh object with an identity transform.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NameCollision`] if `name` is taken.
    fn create_mesh_object(
        &mut self,
        name: &str,
        vertices: &[Point3],
        triangles: &[[u32; 3]],
    ) -> Result<ObjectId, SceneError>;

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ObjectNotFound`] for a stale handle.
    fn remove_object(&mut self, id: ObjectId) -> Result<(), SceneError>;

    /// Parents `child` to `parent`, keeping the child's world placement and
    /// leaving the parent untouched.
    ///
    /// # Errors
    ///
    /// Returns an error for stale handles or if parenting would form a cycle.
    fn set_parent(&mut self, child: ObjectId, parent: ObjectId) -> Result<(), SceneError>;

    /// Direct children of an object.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ObjectNotFound`] for a stale handle.
    fn children(&self, id: ObjectId) -> Result<Vec<ObjectId>, SceneError>;

    /// Looks a collection up by name.
    fn find_collection(&self, name: &str) -> Option<CollectionId>;

    /// Creates a collection linked to the scene root.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::CollectionExists`] if `name` is taken.
    fn create_collection(&mut self, name: &str) -> Result<CollectionId, SceneError>;

    /// Deletes a collection; its objects stay in the scene.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::CollectionNotFound`] for a stale handle.
    fn remove_collection(&mut self, id: CollectionId) -> Result<(), SceneError>;

    /// Moves an object into `collection`, unlinking it from any other.
    ///
    /// # Errors
    ///
    /// Returns an error for stale handles.
    fn link_exclusive(&mut self, object: ObjectId, collection: CollectionId) -> Result<(), SceneError>;

    /// Sets the viewport display colour of an object.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ObjectNotFound`] for a stale handle.
    fn set_display_color(&mut self, id: ObjectId, color: Rgba) -> Result<(), SceneError>;

    /// Returns the viewport display colour, if one was set.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ObjectNotFound`] for a stale handle.
    fn display_color(&self, id: ObjectId) -> Result<Option<Rgba>, SceneError>;

    /// Returns the object's location relative to its parent.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ObjectNotFound`] for a stale handle.
    fn location(&self, id: ObjectId) -> Result<Vector3, SceneError>;

    /// Sets the object's location relative to its parent.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::ObjectNotFound`] for a stale handle.
    fn set_location(&mut self, id: ObjectId, location: Vector3) -> Result<(), SceneError>;
}

/// One hull object created by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneArtifact {
    pub object: ObjectId,
    pub name: String,
    pub parent: ObjectId,
    pub collection: CollectionId,
}
