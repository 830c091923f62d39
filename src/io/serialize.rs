use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use obj::{Group, IndexTuple, ObjData, Object, SimplePolygon};
use tracing::debug;

use crate::error::MeshError;
use crate::math::Point3;
use crate::mesh::SourceMesh;

use super::triangulate_polygon;

/// Object name written into the solver input file.
const INPUT_OBJECT_NAME: &str = "source";

/// Writes a [`SourceMesh`] as a triangulated Wavefront OBJ file.
///
/// The file carries positions and triangle faces only; both solvers accept
/// nothing richer. Positions are narrowed to `f32`, so the solver sees
/// single-precision input however precise the source mesh is.
pub struct WriteObj<'a> {
    mesh: &'a SourceMesh,
    path: PathBuf,
}

impl<'a> WriteObj<'a> {
    /// Creates a new `WriteObj` operation.
    #[must_use]
    pub fn new(mesh: &'a SourceMesh, path: impl Into<PathBuf>) -> Self {
        Self {
            mesh,
            path: path.into(),
        }
    }

    /// Executes the serialization, creating exactly one file.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh has no faces, contains malformed faces,
    /// or the destination cannot be written.
    #[allow(clippy::cast_possible_truncation)]
    pub fn execute(&self) -> Result<(), MeshError> {
        self.mesh.validate()?;

        let polys: Vec<SimplePolygon> = self
            .mesh
            .faces
            .iter()
            .flat_map(|face| triangulate_polygon(&self.mesh.vertices, face))
            .map(|tri| {
                SimplePolygon(
                    tri.iter()
                        .map(|&i| IndexTuple(i as usize, None, None))
                        .collect(),
                )
            })
            .collect();
        debug!(
            path = %self.path.display(),
            vertices = self.mesh.vertices.len(),
            triangles = polys.len(),
            "writing solver input"
        );

        let data = ObjData {
            position: self
                .mesh
                .vertices
                .iter()
                .map(|v| [v.x as f32, v.y as f32, v.z as f32])
                .collect(),
            objects: vec![Object {
                name: INPUT_OBJECT_NAME.to_string(),
                groups: vec![Group {
                    name: INPUT_OBJECT_NAME.to_string(),
                    index: 0,
                    material: None,
                    polys,
                }],
            }],
            ..Default::default()
        };

        let io_err = |source| MeshError::Io {
            path: self.path.clone(),
            source,
        };
        let file = File::create(&self.path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        data.write_to_buf(&mut writer).map_err(|e| MeshError::Obj {
            path: self.path.clone(),
            reason: format!("{e:?}"),
        })?;
        writer.flush().map_err(io_err)
    }
}

/// Reads a solver input file back into a [`SourceMesh`].
///
/// This is the reader for the format [`WriteObj`] produces and is used as a
/// structural check of serialized input.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not valid OBJ.
pub fn read_obj(path: &Path) -> Result<SourceMesh, MeshError> {
    let file = File::open(path).map_err(|source| MeshError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let data = ObjData::load_buf(BufReader::new(file)).map_err(|e| MeshError::Obj {
        path: path.to_path_buf(),
        reason: format!("{e:?}"),
    })?;

    let vertices = data
        .position
        .iter()
        .map(|p| Point3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2])))
        .collect();
    let mut faces = Vec::new();
    for poly in data
        .objects
        .iter()
        .flat_map(|o| &o.groups)
        .flat_map(|g| &g.polys)
    {
        let face = poly
            .0
            .iter()
            .map(|t| u32::try_from(t.0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MeshError::Obj {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        faces.push(face);
    }

    Ok(SourceMesh::new(vertices, faces))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("convex-decomp-ser-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    /// Unit cube with quad faces, outward winding.
    fn cube() -> SourceMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let faces = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![1, 2, 6, 5],
            vec![2, 3, 7, 6],
            vec![3, 0, 4, 7],
        ];
        SourceMesh::new(vertices, faces)
    }

    #[test]
    fn round_trip_recovers_counts() {
        let path = scratch("src.obj");
        let mesh = cube();
        WriteObj::new(&mesh, &path).execute().unwrap();

        let back = read_obj(&path).unwrap();
        assert_eq!(back.vertices.len(), 8);
        assert_eq!(back.faces.len(), 12);
        assert!(back.faces.iter().all(|f| f.len() == 3));
        for (a, b) in mesh.vertices.iter().zip(&back.vertices) {
            assert!((a - b).norm() < 1e-6);
        }
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn positions_are_written_in_single_precision() {
        let path = scratch("src.obj");
        let mut mesh = cube();
        mesh.vertices[6] = Point3::new(1.0 + 1e-12, 0.1, 1.0);
        WriteObj::new(&mesh, &path).execute().unwrap();

        let back = read_obj(&path).unwrap();
        assert_eq!(back.vertices[6], Point3::new(1.0, f64::from(0.1f32), 1.0));
        assert_ne!(back.vertices[6].y, 0.1);
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn mesh_without_faces_is_rejected() {
        let path = scratch("empty.obj");
        let mesh = SourceMesh::new(cube().vertices, Vec::new());
        let err = WriteObj::new(&mesh, &path).execute().unwrap_err();
        assert!(matches!(err, MeshError::EmptyMesh));
        assert!(!path.exists());
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn unwritable_destination_is_io_error() {
        let path = std::env::temp_dir()
            .join(format!("convex-decomp-missing-{}", uuid::Uuid::new_v4()))
            .join("src.obj");
        let err = WriteObj::new(&cube(), &path).execute().unwrap_err();
        assert!(matches!(err, MeshError::Io { .. }));
    }
}
