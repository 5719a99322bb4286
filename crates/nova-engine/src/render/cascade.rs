//! Cascaded shadow map fitting.
//!
//! The camera frustum is cut into slices at fixed fractions of its far
//! distance. Each slice is wrapped in a bounding sphere and covered by an
//! orthographic light camera whose position is snapped to whole shadow-map
//! texels so that shadow edges stay still while the viewer moves.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

use crate::camera::Camera;
use crate::config::ShadowSettings;
use crate::EngineError;

/// Light-camera near plane.
const LIGHT_NEAR: f32 = 0.1;

/// One fitted cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cascade {
    /// World to light clip space.
    pub view_projection: Mat4,
    /// Fraction of the camera far distance covered up to this cascade.
    pub split_fraction: f32,
    /// Far bound of the slice in view-space depth.
    pub far: f32,
    /// Half extent of the orthographic light volume.
    pub half_extent: f32,
    /// Texel-snapped center of the slice's bounding sphere.
    pub center: Vec3,
}

// ---------------------------------------------------------------------------
// Frustum helpers
// ---------------------------------------------------------------------------

/// The 8 world-space corners of the volume mapped to clip space by the
/// matrix whose inverse is given. Near plane first.
pub fn frustum_corners(inverse_view_projection: Mat4) -> [Vec3; 8] {
    const NDC: [Vec4; 8] = [
        Vec4::new(-1.0, 1.0, 0.0, 1.0),
        Vec4::new(1.0, 1.0, 0.0, 1.0),
        Vec4::new(-1.0, -1.0, 0.0, 1.0),
        Vec4::new(1.0, -1.0, 0.0, 1.0),
        Vec4::new(-1.0, 1.0, 1.0, 1.0),
        Vec4::new(1.0, 1.0, 1.0, 1.0),
        Vec4::new(-1.0, -1.0, 1.0, 1.0),
        Vec4::new(1.0, -1.0, 1.0, 1.0),
    ];
    NDC.map(|corner| {
        let world = inverse_view_projection * corner;
        world.xyz() / world.w
    })
}

/// Centroid of the points and the largest distance from it.
pub fn bounding_sphere(points: &[Vec3]) -> (Vec3, f32) {
    if points.is_empty() {
        return (Vec3::ZERO, 0.0);
    }
    let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
    let radius = points
        .iter()
        .map(|p| p.distance(center))
        .fold(0.0_f32, f32::max);
    (center, radius)
}

// ---------------------------------------------------------------------------
// CascadeCalculator
// ---------------------------------------------------------------------------

/// Fits cascades for a camera and a directional light.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeCalculator {
    pub cascade_count: usize,
    pub split_fractions: Vec<f32>,
    /// Shadow-map layer size in texels.
    pub resolution: u32,
    /// Distance from the slice center back toward the light.
    pub light_distance: f32,
    pub ortho_far: f32,
}

impl Default for CascadeCalculator {
    fn default() -> Self {
        Self::from_settings(&ShadowSettings::default())
    }
}

impl CascadeCalculator {
    pub fn from_settings(settings: &ShadowSettings) -> Self {
        Self {
            cascade_count: settings.cascade_count,
            split_fractions: settings.split_fractions.clone(),
            resolution: settings.resolution,
            light_distance: settings.light_distance,
            ortho_far: settings.ortho_far,
        }
    }

    /// Fit one cascade per split fraction.
    ///
    /// `light_dir` points from the scene toward the light.
    ///
    /// # Errors
    ///
    /// [`EngineError::Argument`] if the number of split fractions differs
    /// from `cascade_count`.
    pub fn compute(&self, camera: &Camera, light_dir: Vec3) -> Result<Vec<Cascade>, EngineError> {
        if self.split_fractions.len() != self.cascade_count {
            return Err(EngineError::Argument(format!(
                "wrong number of cascade split fractions: expected {}, got {}",
                self.cascade_count,
                self.split_fractions.len()
            )));
        }
        let light_dir = light_dir.normalize_or(Vec3::Y);
        let view = camera.view();

        let mut cascades = Vec::with_capacity(self.cascade_count);
        let mut prev_far = camera.near;
        for &fraction in &self.split_fractions {
            let level_far = camera.far * fraction;
            let slice = camera.projection_range(prev_far, level_far) * view;
            let corners = frustum_corners(slice.inverse());
            let (center, radius) = bounding_sphere(&corners);

            let snapped = self.snap_to_texels(center, radius, light_dir);
            let light = self.light_camera(light_dir, snapped, radius);

            cascades.push(Cascade {
                view_projection: light.view_projection(),
                split_fraction: fraction,
                far: level_far,
                half_extent: radius,
                center: snapped,
            });
            prev_far = level_far;
        }
        tracing::trace!(count = cascades.len(), "fitted shadow cascades");
        Ok(cascades)
    }

    /// Orthographic camera covering a sphere around `center`.
    pub fn light_camera(&self, light_dir: Vec3, center: Vec3, radius: f32) -> Camera {
        Camera::orthographic(
            center + light_dir * self.light_distance,
            -light_dir,
            radius,
            radius,
            LIGHT_NEAR,
            self.ortho_far,
        )
    }

    /// Size of one shadow-map texel for a cascade of the given radius.
    pub fn texel_size(&self, radius: f32) -> f32 {
        radius / self.resolution.max(1) as f32 * 2.0
    }

    /// Quantize `center` in the light's view space, which is anchored at the
    /// world origin so the grid does not move with the camera.
    fn snap_to_texels(&self, center: Vec3, radius: f32, light_dir: Vec3) -> Vec3 {
        let texel = self.texel_size(radius);
        if texel <= 0.0 {
            return center;
        }
        let anchor = self.light_camera(light_dir, Vec3::ZERO, radius).view();
        let mut light_space = anchor * center.extend(1.0);
        light_space.x -= light_space.x % texel;
        light_space.y -= light_space.y % texel;
        (anchor.inverse() * light_space).xyz()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_sphere_of_unit_cube_corners() {
        let corners: Vec<Vec3> = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -1.0 } else { 1.0 },
                    if i & 2 == 0 { -1.0 } else { 1.0 },
                    if i & 4 == 0 { -1.0 } else { 1.0 },
                )
            })
            .collect();
        let (center, radius) = bounding_sphere(&corners);
        assert!(center.abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!((radius - 3.0_f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn snapped_center_stays_within_a_texel() {
        let calc = CascadeCalculator::default();
        let light = Vec3::new(0.3, 1.0, 0.2).normalize();
        let center = Vec3::new(12.345, 0.5, -7.891);
        let radius = 20.0;
        let snapped = calc.snap_to_texels(center, radius, light);
        let texel = calc.texel_size(radius);
        // Only the two light-plane axes move, each by less than one texel.
        assert!(snapped.distance(center) < texel * 2.0_f32.sqrt() + 1e-3);
    }

    #[test]
    fn snapping_is_stable_under_sub_texel_motion() {
        let calc = CascadeCalculator::default();
        let light = Vec3::Y;
        let radius = 20.48;
        let texel = calc.texel_size(radius);
        let base = Vec3::new(4.0 * texel + texel * 0.25, 0.0, 8.0 * texel + texel * 0.25);
        let a = calc.snap_to_texels(base, radius, light);
        let b = calc.snap_to_texels(base + Vec3::new(texel * 0.5, 0.0, texel * 0.5), radius, light);
        assert!(a.abs_diff_eq(b, 1e-4));
    }

    #[test]
    fn cascade_centers_lie_inside_the_light_volume() {
        let camera = Camera::default();
        let calc = CascadeCalculator::default();
        let cascades = calc.compute(&camera, Vec3::new(0.2, 1.0, 0.1)).unwrap();
        for cascade in &cascades {
            let clip = cascade.view_projection * cascade.center.extend(1.0);
            assert!(clip.x.abs() <= 1.0 + 1e-3 && clip.y.abs() <= 1.0 + 1e-3);
            assert!(clip.z > 0.0 && clip.z < 1.0);
        }
    }
}
