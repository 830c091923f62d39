use slotmap::SlotMap;

use crate::error::SceneError;
use crate::math::{Matrix4, Point3, Vector3};
use crate::mesh::SourceMesh;

use super::{CollectionId, ObjectId, Rgba, Scene};

/// Data associated with a scene object.
#[derive(Debug, Clone)]
pub struct ObjectData {
    pub name: String,
    pub mesh: Option<SourceMesh>,
    /// Transform relative to the parent.
    pub local: Matrix4,
    pub parent: Option<ObjectId>,
    /// Inverse of the parent's world transform at parenting time.
    pub parent_inverse: Matrix4,
    pub color: Option<Rgba>,
    pub collections: Vec<CollectionId>,
}

impl ObjectData {
    fn new(name: &str, mesh: Option<SourceMesh>) -> Self {
        Self {
            name: name.to_string(),
            mesh,
            local: Matrix4::identity(),
            parent: None,
            parent_inverse: Matrix4::identity(),
            color: None,
            collections: Vec::new(),
        }
    }
}

/// Data associated with a grouping collection.
#[derive(Debug, Clone)]
pub struct CollectionData {
    pub name: String,
}

/// In-memory scene graph implementing [`Scene`].
///
/// Objects and collections live in arenas addressed by generational keys,
/// so handles to deleted entities fail cleanly instead of aliasing.
#[derive(Debug, Default)]
pub struct SceneStore {
    objects: SlotMap<ObjectId, ObjectData>,
    collections: SlotMap<CollectionId, CollectionData>,
}

impl SceneStore {
    /// Creates a new, empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mesh object with polygonal faces and an identity transform.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NameCollision`] if `name` is taken.
    pub fn add_mesh_object(&mut self, name: &str, mesh: SourceMesh) -> Result<ObjectId, SceneError> {
        self.ensure_free(name)?;
        Ok(self.objects.insert(ObjectData::new(name, Some(mesh))))
    }

    /// Returns a reference to the object data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn object(&self, id: ObjectId) -> Result<&ObjectData, SceneError> {
        self.objects
            .get(id)
            .ok_or_else(|| SceneError::ObjectNotFound(format!("{id:?}")))
    }

    /// Returns a mutable reference to the object data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut ObjectData, SceneError> {
        self.objects
            .get_mut(id)
            .ok_or_else(|| SceneError::ObjectNotFound(format!("{id:?}")))
    }

    /// Replaces the object's local transform.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn set_transform(&mut self, id: ObjectId, local: Matrix4) -> Result<(), SceneError> {
        self.object_mut(id)?.local = local;
        Ok(())
    }

    /// Computes the object's world transform.
    ///
    /// # Errors
    ///
    /// Returns an error if the object or one of its ancestors is missing.
    pub fn world_matrix(&self, id: ObjectId) -> Result<Matrix4, SceneError> {
        let data = self.object(id)?;
        match data.parent {
            None => Ok(data.local),
            Some(parent) => Ok(self.world_matrix(parent)? * data.parent_inverse * data.local),
        }
    }

    /// Objects linked into a collection.
    #[must_use]
    pub fn collection_objects(&self, id: CollectionId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, o)| o.collections.contains(&id))
            .map(|(k, _)| k)
            .collect()
    }

    /// Number of objects in the scene.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of collections in the scene.
    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    fn ensure_free(&self, name: &str) -> Result<(), SceneError> {
        if self.find_object(name).is_some() {
            return Err(SceneError::NameCollision(name.to_string()));
        }
        Ok(())
    }

    fn is_ancestor(&self, candidate: ObjectId, of: ObjectId) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.objects.get(id).and_then(|o| o.parent);
        }
        false
    }
}

impl Scene for SceneStore {
    fn object_name(&self, id: ObjectId) -> Result<&str, SceneError> {
        Ok(&self.object(id)?.name)
    }

    fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, o)| o.name == name)
            .map(|(k, _)| k)
    }

    fn objects(&self) -> Vec<ObjectId> {
        self.objects.keys().collect()
    }

    fn world_mesh(&self, id: ObjectId) -> Result<SourceMesh, SceneError> {
        let data = self.object(id)?;
        let mesh = data
            .mesh
            .as_ref()
            .ok_or_else(|| SceneError::NoMesh(data.name.clone()))?;
        let world = self.world_matrix(id)?;
        Ok(SourceMesh {
            vertices: mesh
                .vertices
                .iter()
                .map(|p| world.transform_point(p))
                .collect(),
            faces: mesh.faces.clone(),
        })
    }

    fn create_mesh_object(
        &mut self,
        name: &str,
        vertices: &[Point3],
        triangles: &[[u32; 3]],
    ) -> Result<ObjectId, SceneError> {
        self.add_mesh_object(name, SourceMesh::from_triangles(vertices.to_vec(), triangles))
    }

    fn remove_object(&mut self, id: ObjectId) -> Result<(), SceneError> {
        let removed = self
            .objects
            .remove(id)
            .ok_or_else(|| SceneError::ObjectNotFound(format!("{id:?}")))?;
        // Orphans keep their world placement.
        let orphans: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(_, o)| o.parent == Some(id))
            .map(|(k, _)| k)
            .collect();
        let parent_world = match removed.parent {
            Some(p) => self.world_matrix(p)? * removed.parent_inverse * removed.local,
            None => removed.local,
        };
        for orphan in orphans {
            let data = self.object_mut(orphan)?;
            data.local = parent_world * data.parent_inverse * data.local;
            data.parent = None;
            data.parent_inverse = Matrix4::identity();
        }
        Ok(())
    }

    fn set_parent(&mut self, child: ObjectId, parent: ObjectId) -> Result<(), SceneError> {
        self.object(child)?;
        if self.is_ancestor(child, parent) {
            return Err(SceneError::ParentCycle {
                child: self.object(child)?.name.clone(),
                parent: self.object(parent)?.name.clone(),
            });
        }
        let parent_world = self.world_matrix(parent)?;
        let inverse = parent_world.try_inverse().unwrap_or_else(Matrix4::identity);
        // Fold any existing parenting into the local transform first.
        let child_world = self.world_matrix(child)?;
        let data = self.object_mut(child)?;
        data.local = child_world;
        data.parent = Some(parent);
        data.parent_inverse = inverse;
        Ok(())
    }

    fn children(&self, id: ObjectId) -> Result<Vec<ObjectId>, SceneError> {
        self.object(id)?;
        Ok(self
            .objects
            .iter()
            .filter(|(_, o)| o.parent == Some(id))
            .map(|(k, _)| k)
            .collect())
    }

    fn find_collection(&self, name: &str) -> Option<CollectionId> {
        self.collections
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(k, _)| k)
    }

    fn create_collection(&mut self, name: &str) -> Result<CollectionId, SceneError> {
        if self.find_collection(name).is_some() {
            return Err(SceneError::CollectionExists(name.to_string()));
        }
        Ok(self.collections.insert(CollectionData {
            name: name.to_string(),
        }))
    }

    fn remove_collection(&mut self, id: CollectionId) -> Result<(), SceneError> {
        self.collections
            .remove(id)
            .ok_or_else(|| SceneError::CollectionNotFound(format!("{id:?}")))?;
        for (_, object) in &mut self.objects {
            object.collections.retain(|&c| c != id);
        }
        Ok(())
    }

    fn link_exclusive(&mut self, object: ObjectId, collection: CollectionId) -> Result<(), SceneError> {
        if !self.collections.contains_key(collection) {
            return Err(SceneError::CollectionNotFound(format!("{collection:?}")));
        }
        let data = self.object_mut(object)?;
        data.collections.clear();
        data.collections.push(collection);
        Ok(())
    }

    fn set_display_color(&mut self, id: ObjectId, color: Rgba) -> Result<(), SceneError> {
        self.object_mut(id)?.color = Some(color);
        Ok(())
    }

    fn display_color(&self, id: ObjectId) -> Result<Option<Rgba>, SceneError> {
        Ok(self.object(id)?.color)
    }

    fn location(&self, id: ObjectId) -> Result<Vector3, SceneError> {
        let local = &self.object(id)?.local;
        Ok(Vector3::new(local[(0, 3)], local[(1, 3)], local[(2, 3)]))
    }

    fn set_location(&mut self, id: ObjectId, location: Vector3) -> Result<(), SceneError> {
        let local = &mut self.object_mut(id)?.local;
        local[(0, 3)] = location.x;
        local[(1, 3)] = location.y;
        local[(2, 3)] = location.z;
        Ok(())
    }
}
