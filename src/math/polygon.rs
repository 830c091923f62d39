use super::{Point2, Point3, Vector3, TOLERANCE};

/// Computes the (unnormalized) polygon normal with Newell's method.
///
/// Robust for non-planar and concave polygons; the magnitude is twice the
/// projected area, so a near-zero result means the polygon is degenerate.
#[must_use]
pub fn newell_normal(points: &[Point3]) -> Vector3 {
    let mut normal = Vector3::zeros();
    let n = points.len();
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// An orthonormal 2D frame embedded in 3D, used to flatten a polygon.
#[derive(Debug, Clone, Copy)]
pub struct PlaneFrame {
    origin: Point3,
    u_dir: Vector3,
    v_dir: Vector3,
}

impl PlaneFrame {
    /// Builds a frame through `origin` perpendicular to `normal`.
    ///
    /// Returns `None` if `normal` has (near) zero length.
    #[must_use]
    pub fn new(origin: Point3, normal: &Vector3) -> Option<Self> {
        let len = normal.norm();
        if len < TOLERANCE {
            return None;
        }
        let n = normal / len;
        // Seed with the world axis least aligned with the normal.
        let seed = if n.x.abs() <= n.y.abs() && n.x.abs() <= n.z.abs() {
            Vector3::x()
        } else if n.y.abs() <= n.z.abs() {
            Vector3::y()
        } else {
            Vector3::z()
        };
        let u_dir = n.cross(&seed).normalize();
        let v_dir = n.cross(&u_dir);
        Some(Self {
            origin,
            u_dir,
            v_dir,
        })
    }

    /// Projects a 3D point into frame coordinates.
    #[must_use]
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(&self.u_dir), d.dot(&self.v_dir))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn newell_normal_of_ccw_square_points_up() {
        let square = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let n = newell_normal(&square);
        assert_relative_eq!(n.x, 0.0);
        assert_relative_eq!(n.y, 0.0);
        assert_relative_eq!(n.z, 2.0);
    }

    #[test]
    fn frame_rejects_zero_normal() {
        assert!(PlaneFrame::new(Point3::origin(), &Vector3::zeros()).is_none());
    }

    #[test]
    fn frame_projection_preserves_distances() {
        let frame = PlaneFrame::new(Point3::origin(), &Vector3::new(0.0, 0.0, 3.0)).unwrap();
        let a = frame.project(&Point3::new(1.0, 0.0, 0.0));
        let b = frame.project(&Point3::new(0.0, 1.0, 0.0));
        assert_relative_eq!((a - b).norm(), 2.0_f64.sqrt(), epsilon = 1e-12);
    }
}
