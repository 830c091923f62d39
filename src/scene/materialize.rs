use tracing::{debug, info, warn};

use crate::error::SceneError;
use crate::mesh::ConvexHull;

use super::appearance::HullAppearance;
use super::naming::hull_name;
use super::{CollectionId, ObjectId, Scene, SceneArtifact};

/// Places parsed hulls into the scene as children of their source object.
///
/// Either every hull ends up in the scene or none does: on failure, objects
/// created so far are deleted again, along with the collection if this
/// operation created it.
pub struct Materialize<'a> {
    source: ObjectId,
    hulls: &'a [ConvexHull],
    collection_name: &'a str,
    appearance: HullAppearance,
}

impl<'a> Materialize<'a> {
    /// Creates a new `Materialize` operation.
    #[must_use]
    pub fn new(
        source: ObjectId,
        hulls: &'a [ConvexHull],
        collection_name: &'a str,
        appearance: HullAppearance,
    ) -> Self {
        Self {
            source,
            hulls,
            collection_name,
            appearance,
        }
    }

    /// Executes the materialization, returning one artifact per hull in hull
    /// order.
    ///
    /// # Errors
    ///
    /// Returns the first scene error; the scene is rolled back before
    /// returning.
    pub fn execute<S: Scene + ?Sized>(&self, scene: &mut S) -> Result<Vec<SceneArtifact>, SceneError> {
        let source_name = scene.object_name(self.source)?.to_string();

        let (collection, created_collection) = match scene.find_collection(self.collection_name) {
            Some(id) => (id, false),
            None => (scene.create_collection(self.collection_name)?, true),
        };

        let mut created = Vec::with_capacity(self.hulls.len());
        for hull in self.hulls {
            match self.place(scene, &source_name, hull, collection, &mut created) {
                Ok(artifact) => {
                    debug!(name = %artifact.name, "hull placed");
                }
                Err(e) => {
                    warn!(source = %source_name, index = hull.index, error = %e, "rolling back hull placement");
                    rollback(scene, &created, created_collection.then_some(collection));
                    return Err(e);
                }
            }
        }

        info!(source = %source_name, hulls = created.len(), collection = self.collection_name, "hulls materialized");
        Ok(created)
    }

    fn place<S: Scene + ?Sized>(
        &self,
        scene: &mut S,
        source_name: &str,
        hull: &ConvexHull,
        collection: CollectionId,
        created: &mut Vec<SceneArtifact>,
    ) -> Result<SceneArtifact, SceneError> {
        let name = hull_name(source_name, hull.index);
        let object = scene.create_mesh_object(&name, &hull.vertices, &hull.triangles)?;
        let artifact = SceneArtifact {
            object,
            name,
            parent: self.source,
            collection,
        };
        // Track before the fallible steps so rollback sees the new object.
        created.push(artifact.clone());

        scene.link_exclusive(object, collection)?;
        scene.set_display_color(object, self.appearance.color_for(hull.index))?;
        scene.set_parent(object, self.source)?;
        Ok(artifact)
    }
}

fn rollback<S: Scene + ?Sized>(scene: &mut S, created: &[SceneArtifact], collection: Option<CollectionId>) {
    for artifact in created.iter().rev() {
        if let Err(e) = scene.remove_object(artifact.object) {
            warn!(name = %artifact.name, error = %e, "failed to remove hull during rollback");
        }
    }
    if let Some(collection) = collection {
        if let Err(e) = scene.remove_collection(collection) {
            warn!(error = %e, "failed to remove collection during rollback");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{Matrix4, Point3, Vector3};
    use crate::scene::{hull_children, SceneStore};
    use approx::assert_relative_eq;

    fn tetra(index: usize, offset: f64) -> ConvexHull {
        ConvexHull {
            index,
            vertices: vec![
                Point3::new(offset, 0.0, 0.0),
                Point3::new(offset + 1.0, 0.0, 0.0),
                Point3::new(offset, 1.0, 0.0),
                Point3::new(offset, 0.0, 1.0),
            ],
            triangles: vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        }
    }

    fn scene_with_crate() -> (SceneStore, ObjectId) {
        let mut scene = SceneStore::new();
        let source = scene
            .create_mesh_object("Crate", &tetra(0, 0.0).vertices, &tetra(0, 0.0).triangles)
            .unwrap();
        scene
            .set_transform(source, Matrix4::new_translation(&Vector3::new(0.0, 0.0, 2.0)))
            .unwrap();
        (scene, source)
    }

    #[test]
    fn three_hulls_become_named_children_in_one_collection() {
        let (mut scene, source) = scene_with_crate();
        let source_transform = scene.world_matrix(source).unwrap();
        let hulls = [tetra(0, 0.0), tetra(1, 2.0), tetra(2, 4.0)];

        let artifacts = Materialize::new(source, &hulls, "convex hulls", HullAppearance::default())
            .execute(&mut scene)
            .unwrap();

        let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Crate_ConvexHull0", "Crate_ConvexHull1", "Crate_ConvexHull2"]);
        let collection = scene.find_collection("convex hulls").unwrap();
        for artifact in &artifacts {
            assert_eq!(artifact.parent, source);
            assert_eq!(artifact.collection, collection);
            assert!(scene.display_color(artifact.object).unwrap().is_some());
        }
        assert_eq!(scene.collection_objects(collection).len(), 3);
        assert_eq!(hull_children(&scene, source).unwrap().len(), 3);

        // Hull vertices are world space already; parenting must not move them.
        let placed = scene.world_mesh(artifacts[1].object).unwrap();
        assert_relative_eq!(placed.vertices[0].x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(placed.vertices[0].z, 0.0, epsilon = 1e-12);
        assert_relative_eq!(scene.world_matrix(source).unwrap(), source_transform);
    }

    #[test]
    fn existing_collection_is_reused() {
        let (mut scene, source) = scene_with_crate();
        let existing = scene.create_collection("convex hulls").unwrap();
        let artifacts = Materialize::new(source, &[tetra(0, 0.0)], "convex hulls", HullAppearance::default())
            .execute(&mut scene)
            .unwrap();
        assert_eq!(artifacts[0].collection, existing);
        assert_eq!(scene.collection_count(), 1);
    }

    #[test]
    fn failure_midway_rolls_back_everything() {
        let (mut scene, source) = scene_with_crate();
        let blocker = scene
            .create_mesh_object("Crate_ConvexHull1", &tetra(0, 0.0).vertices, &tetra(0, 0.0).triangles)
            .unwrap();
        let before = scene.object_count();
        let hulls = [tetra(0, 0.0), tetra(1, 2.0), tetra(2, 4.0)];

        let err = Materialize::new(source, &hulls, "convex hulls", HullAppearance::default())
            .execute(&mut scene)
            .unwrap_err();

        assert!(matches!(err, SceneError::NameCollision(ref n) if n == "Crate_ConvexHull1"));
        assert_eq!(scene.object_count(), before);
        assert!(scene.find_object("Crate_ConvexHull0").is_none());
        assert!(scene.find_collection("convex hulls").is_none());
        assert!(scene.object_name(blocker).is_ok());
    }

    #[test]
    fn rollback_keeps_preexisting_collection() {
        let (mut scene, source) = scene_with_crate();
        scene.create_collection("convex hulls").unwrap();
        scene
            .create_mesh_object("Crate_ConvexHull0", &tetra(0, 0.0).vertices, &tetra(0, 0.0).triangles)
            .unwrap();

        let result = Materialize::new(source, &[tetra(0, 0.0)], "convex hulls", HullAppearance::default())
            .execute(&mut scene);

        assert!(result.is_err());
        assert!(scene.find_collection("convex hulls").is_some());
    }
}
