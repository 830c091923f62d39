use std::collections::HashMap;

use spade::handles::{FixedFaceHandle, InnerTag};
use spade::{ConstrainedDelaunayTriangulation, Point2 as SpadePoint2, Triangulation};
use tracing::debug;

use crate::math::polygon::{newell_normal, PlaneFrame};
use crate::math::{Point3, Vector3};

type Cdt = ConstrainedDelaunayTriangulation<SpadePoint2<f64>>;

/// Splits a polygonal face into triangles.
///
/// Triangles pass through unchanged. Larger polygons are flattened onto their
/// Newell plane and triangulated with a constrained Delaunay triangulation so
/// concave faces come out right; degenerate or self-intersecting polygons fall
/// back to a fan. Output winding follows the polygon's winding.
///
/// `polygon` must only contain indices valid for `vertices`.
#[must_use]
pub fn triangulate_polygon(vertices: &[Point3], polygon: &[u32]) -> Vec<[u32; 3]> {
    match polygon.len() {
        0..=2 => Vec::new(),
        3 => vec![[polygon[0], polygon[1], polygon[2]]],
        _ => triangulate_cdt(vertices, polygon).unwrap_or_else(|| {
            debug!(vertices = polygon.len(), "falling back to fan triangulation");
            fan(polygon)
        }),
    }
}

fn fan(polygon: &[u32]) -> Vec<[u32; 3]> {
    (1..polygon.len() - 1)
        .map(|i| [polygon[0], polygon[i], polygon[i + 1]])
        .collect()
}

fn triangulate_cdt(vertices: &[Point3], polygon: &[u32]) -> Option<Vec<[u32; 3]>> {
    let points: Vec<Point3> = polygon.iter().map(|&i| vertices[i as usize]).collect();
    let normal = newell_normal(&points);
    let frame = PlaneFrame::new(points[0], &normal)?;

    let mut cdt = Cdt::new();
    let mut handles = Vec::with_capacity(points.len());
    let mut corner_of: HashMap<usize, u32> = HashMap::new();
    for (p, &corner) in points.iter().zip(polygon) {
        let q = frame.project(p);
        let handle = cdt.insert(SpadePoint2::new(q.x, q.y)).ok()?;
        // Coincident corners would merge into one CDT vertex.
        if corner_of.insert(handle.index(), corner).is_some() {
            return None;
        }
        handles.push(handle);
    }

    for i in 0..handles.len() {
        let from = handles[i];
        let to = handles[(i + 1) % handles.len()];
        if !cdt.can_add_constraint(from, to) {
            return None;
        }
        cdt.add_constraint(from, to);
    }

    let inside = constraint_parity(&cdt);
    let triangles = cdt
        .inner_faces()
        .filter(|face| inside.get(&face.fix().index()).copied().unwrap_or(false))
        .map(|face| {
            let [a, b, c] = face.vertices().map(|v| corner_of.get(&v.fix().index()).copied());
            Some(orient(vertices, [a?, b?, c?], &normal))
        })
        .collect::<Option<Vec<_>>>()?;

    (triangles.len() == polygon.len() - 2).then_some(triangles)
}

fn orient(vertices: &[Point3], tri: [u32; 3], normal: &Vector3) -> [u32; 3] {
    let [a, b, c] = tri.map(|i| vertices[i as usize]);
    if (b - a).cross(&(c - a)).dot(normal) < 0.0 {
        [tri[0], tri[2], tri[1]]
    } else {
        tri
    }
}

/// Even-odd parity of every inner face, keyed by face index.
///
/// A face is inside the constraint loop when reaching it from the outer face
/// crosses an odd number of constraint edges. Constraints never cross each
/// other here, so the parity does not depend on the path taken.
fn constraint_parity(cdt: &Cdt) -> HashMap<usize, bool> {
    let outer = cdt.outer_face().fix();

    let mut pending: Vec<(FixedFaceHandle<InnerTag>, bool)> = cdt
        .directed_edges()
        .filter(|edge| edge.face().fix() == outer)
        .filter_map(|edge| {
            let crossed = cdt.is_constraint_edge(edge.as_undirected().fix());
            Some((edge.rev().face().as_inner()?.fix(), crossed))
        })
        .collect();

    let mut parity = HashMap::new();
    while let Some((face, inside)) = pending.pop() {
        if parity.insert(face.index(), inside).is_some() {
            continue;
        }
        for edge in cdt.face(face).adjacent_edges() {
            if let Some(next) = edge.rev().face().as_inner() {
                if !parity.contains_key(&next.fix().index()) {
                    pending.push((next.fix(), inside ^ cdt.is_constraint_edge(edge.as_undirected().fix())));
                }
            }
        }
    }
    parity
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn area(vertices: &[Point3], tris: &[[u32; 3]]) -> f64 {
        tris.iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| vertices[i as usize]);
                (b - a).cross(&(c - a)).norm() * 0.5
            })
            .sum()
    }

    #[test]
    fn triangle_passes_through() {
        let verts = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)];
        assert_eq!(triangulate_polygon(&verts, &[2, 0, 1]), vec![[2, 0, 1]]);
    }

    #[test]
    fn quad_becomes_two_triangles() {
        let verts = [
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
        ];
        let tris = triangulate_polygon(&verts, &[0, 1, 2, 3]);
        assert_eq!(tris.len(), 2);
        assert!((area(&verts, &tris) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn concave_polygon_stays_inside() {
        // L-shape in the XZ plane, area 3.
        let verts = [
            p(0.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(2.0, 0.0, 1.0),
            p(1.0, 0.0, 1.0),
            p(1.0, 0.0, 2.0),
            p(0.0, 0.0, 2.0),
        ];
        let polygon = [0, 1, 2, 3, 4, 5];
        let tris = triangulate_polygon(&verts, &polygon);
        assert_eq!(tris.len(), 4);
        assert!((area(&verts, &tris) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn notch_of_concave_loop_is_outside() {
        // The notch of the L is a CDT face outside the constraint loop.
        let mut cdt = Cdt::new();
        let corners = [(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)];
        let handles: Vec<_> = corners
            .iter()
            .map(|&(x, y)| cdt.insert(SpadePoint2::new(x, y)).unwrap())
            .collect();
        for i in 0..handles.len() {
            cdt.add_constraint(handles[i], handles[(i + 1) % handles.len()]);
        }

        let parity = constraint_parity(&cdt);
        assert_eq!(parity.len(), cdt.num_inner_faces());
        assert_eq!(parity.values().filter(|&&inside| inside).count(), 4);
        assert_eq!(parity.values().filter(|&&inside| !inside).count(), 1);
    }

    #[test]
    fn winding_follows_polygon() {
        let verts = [
            p(0.0, 0.0, 0.0),
            p(0.0, 1.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(1.0, 0.0, 0.0),
        ];
        // Clockwise seen from +Z, so every triangle normal must point down.
        for t in triangulate_polygon(&verts, &[0, 1, 2, 3]) {
            let [a, b, c] = t.map(|i| verts[i as usize]);
            assert!((b - a).cross(&(c - a)).z < 0.0);
        }
    }

    #[test]
    fn collapsed_polygon_falls_back_to_fan() {
        let verts = [
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(3.0, 0.0, 0.0),
        ];
        assert_eq!(
            triangulate_polygon(&verts, &[0, 1, 2, 3]),
            vec![[0, 1, 2], [0, 2, 3]]
        );
    }
}
