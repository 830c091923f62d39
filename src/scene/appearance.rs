use tracing::debug;

use crate::error::{ConfigError, SceneError};

use super::naming::hull_children;
use super::{ObjectId, Rgba, Scene};

/// Hue advance between consecutive hulls, in turns (golden ratio conjugate).
const HUE_STEP: f32 = 0.618_034;
const SATURATION: f32 = 0.65;
const VALUE: f32 = 0.9;

/// Viewport appearance of generated hulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HullAppearance {
    alpha: u8,
}

impl Default for HullAppearance {
    fn default() -> Self {
        Self { alpha: 90 }
    }
}

impl HullAppearance {
    /// Creates an appearance with a transparency percentage in `0..=100`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for values above 100.
    pub fn new(alpha: u8) -> Result<Self, ConfigError> {
        if alpha > 100 {
            return Err(ConfigError::OutOfRange {
                option: "alpha",
                value: f64::from(alpha),
                min: 0.0,
                max: 100.0,
            });
        }
        Ok(Self { alpha })
    }

    /// Transparency percentage; 0 is opaque, 100 fully transparent.
    #[must_use]
    pub fn alpha(&self) -> u8 {
        self.alpha
    }

    /// Colour alpha component for the configured transparency.
    #[must_use]
    pub fn opacity(&self) -> f32 {
        f32::from(100 - self.alpha) / 100.0
    }

    /// Display colour of hull `index`. Deterministic in `index`.
    #[must_use]
    pub fn color_for(&self, index: usize) -> Rgba {
        #[allow(clippy::cast_precision_loss)]
        let hue = (index as f32 * HUE_STEP).fract();
        let [r, g, b] = hsv_to_rgb(hue, SATURATION, VALUE);
        [r, g, b, self.opacity()]
    }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let sector = h * 6.0;
    let f = sector.fract();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let segment = sector as u32 % 6;
    match segment {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Changes the transparency of every hull child of a source, keeping hues.
pub struct SetHullAlpha {
    source: ObjectId,
    appearance: HullAppearance,
}

impl SetHullAlpha {
    /// Creates a new `SetHullAlpha` operation.
    #[must_use]
    pub fn new(source: ObjectId, appearance: HullAppearance) -> Self {
        Self { source, appearance }
    }

    /// Executes the update, returning the number of hulls touched.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` does not exist.
    pub fn execute<S: Scene + ?Sized>(&self, scene: &mut S) -> Result<usize, SceneError> {
        let hulls = hull_children(scene, self.source)?;
        let opacity = self.appearance.opacity();
        for &hull in &hulls {
            let color = match scene.display_color(hull)? {
                Some([r, g, b, _]) => [r, g, b, opacity],
                None => [1.0, 1.0, 1.0, opacity],
            };
            scene.set_display_color(hull, color)?;
        }
        debug!(hulls = hulls.len(), opacity, "updated hull transparency");
        Ok(hulls.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::scene::{hull_name, SceneStore};
    use approx::assert_relative_eq;

    #[test]
    fn alpha_maps_to_opacity() {
        assert_relative_eq!(HullAppearance::new(0).unwrap().opacity(), 1.0);
        assert_relative_eq!(HullAppearance::new(100).unwrap().opacity(), 0.0);
        assert_relative_eq!(HullAppearance::default().opacity(), 0.1);
        assert!(HullAppearance::new(101).is_err());
    }

    #[test]
    fn colors_are_deterministic_and_distinct() {
        let appearance = HullAppearance::default();
        assert_eq!(appearance.color_for(3), appearance.color_for(3));
        assert_ne!(appearance.color_for(0), appearance.color_for(1));
        for i in 0..32 {
            let c = appearance.color_for(i);
            assert!(c.iter().all(|x| (0.0..=1.0).contains(x)));
        }
    }

    #[test]
    fn set_hull_alpha_keeps_hue() {
        let tri = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut scene = SceneStore::new();
        let source = scene.create_mesh_object("Crate", &tri, &[[0, 1, 2]]).unwrap();
        let before = HullAppearance::default().color_for(0);
        let hull = scene.create_mesh_object(&hull_name("Crate", 0), &tri, &[[0, 1, 2]]).unwrap();
        scene.set_display_color(hull, before).unwrap();
        scene.set_parent(hull, source).unwrap();

        let touched = SetHullAlpha::new(source, HullAppearance::new(0).unwrap())
            .execute(&mut scene)
            .unwrap();
        assert_eq!(touched, 1);
        let after = scene.display_color(hull).unwrap().unwrap();
        assert_eq!(after[..3], before[..3]);
        assert_relative_eq!(after[3], 1.0);
    }
}
