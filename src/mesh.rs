use crate::error::MeshError;
use crate::math::Point3;

/// Read-only snapshot of a host mesh handed to the solver.
///
/// Faces are polygons given as index lists into `vertices`; they are
/// triangulated on serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMesh {
    /// Vertex positions, in world space.
    pub vertices: Vec<Point3>,
    /// Polygonal faces (each at least three indices).
    pub faces: Vec<Vec<u32>>,
}

impl SourceMesh {
    /// Creates a mesh from vertices and polygonal faces.
    #[must_use]
    pub fn new(vertices: Vec<Point3>, faces: Vec<Vec<u32>>) -> Self {
        Self { vertices, faces }
    }

    /// Creates a mesh from vertices and triangles.
    #[must_use]
    pub fn from_triangles(vertices: Vec<Point3>, triangles: &[[u32; 3]]) -> Self {
        Self {
            vertices,
            faces: triangles.iter().map(|t| t.to_vec()).collect(),
        }
    }

    /// Checks that the mesh has faces and that every face is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::EmptyMesh`] for a mesh without faces,
    /// [`MeshError::DegenerateFace`] for faces with fewer than three
    /// indices and [`MeshError::IndexOutOfRange`] for dangling indices.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.faces.is_empty() {
            return Err(MeshError::EmptyMesh);
        }
        for (face_idx, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(MeshError::DegenerateFace(face_idx));
            }
            if let Some(&index) = face.iter().find(|&&i| i as usize >= self.vertices.len()) {
                return Err(MeshError::IndexOutOfRange {
                    face: face_idx,
                    index,
                    count: self.vertices.len(),
                });
            }
        }
        Ok(())
    }
}

/// One convex piece of a decomposition result.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHull {
    /// 0-based position in solver output; drives the hull's name.
    pub index: usize,
    /// Hull vertex positions.
    pub vertices: Vec<Point3>,
    /// Triangles indexing into `vertices`.
    pub triangles: Vec<[u32; 3]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let mesh = SourceMesh::new(tri(), Vec::new());
        assert!(matches!(mesh.validate(), Err(MeshError::EmptyMesh)));
    }

    #[test]
    fn dangling_index_is_rejected() {
        let mesh = SourceMesh::new(tri(), vec![vec![0, 1, 5]]);
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::IndexOutOfRange { face: 0, index: 5, count: 3 })
        ));
    }

    #[test]
    fn two_index_face_is_rejected() {
        let mesh = SourceMesh::new(tri(), vec![vec![0, 1, 2], vec![0, 1]]);
        assert!(matches!(mesh.validate(), Err(MeshError::DegenerateFace(1))));
    }

    #[test]
    fn triangle_mesh_is_valid() {
        let mesh = SourceMesh::from_triangles(tri(), &[[0, 1, 2]]);
        assert!(mesh.validate().is_ok());
    }
}
