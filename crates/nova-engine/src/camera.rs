//! Camera value type.
//!
//! A [`Camera`] is plain data: an eye position, an orthonormal basis, clip
//! distances and a [`Projection`]. View and projection matrices are pure
//! functions of that state. All matrices are left-handed (+Z forward) with
//! clip-space depth in `[0, 1]`.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Projection kind and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective { fov_y_degrees: f32, aspect: f32 },
    Orthographic { half_width: f32, half_height: f32 },
}

/// Pick an up vector that is not parallel to `forward`.
pub fn stable_up(forward: Vec3) -> Vec3 {
    if forward.dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    /// Unit view direction.
    pub forward: Vec3,
    /// Unit up vector, orthogonal to `forward`.
    pub up: Vec3,
    pub near: f32,
    pub far: f32,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(Vec3::new(0.0, 4.0, -10.0), Vec3::Z, 60.0, 16.0 / 9.0, 0.1, 100.0)
    }
}

impl Camera {
    pub fn perspective(
        position: Vec3,
        forward: Vec3,
        fov_y_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self::with_basis(
            position,
            forward,
            near,
            far,
            Projection::Perspective {
                fov_y_degrees,
                aspect,
            },
        )
    }

    pub fn orthographic(
        position: Vec3,
        forward: Vec3,
        half_width: f32,
        half_height: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self::with_basis(
            position,
            forward,
            near,
            far,
            Projection::Orthographic {
                half_width,
                half_height,
            },
        )
    }

    fn with_basis(position: Vec3, forward: Vec3, near: f32, far: f32, projection: Projection) -> Self {
        let forward = forward.normalize_or(Vec3::Z);
        let up = orthogonal_up(forward, stable_up(forward));
        Self {
            position,
            forward,
            up,
            near,
            far,
            projection,
        }
    }

    /// Camera placed by a world matrix: position from the translation,
    /// forward and up from the +Z and +Y axes.
    pub fn from_matrix(matrix: Mat4, near: f32, far: f32, projection: Projection) -> Self {
        let position = matrix.w_axis.truncate();
        let forward = matrix.z_axis.truncate().normalize_or(Vec3::Z);
        let hint = matrix.y_axis.truncate().normalize_or(stable_up(forward));
        Self {
            position,
            forward,
            up: orthogonal_up(forward, hint),
            near,
            far,
            projection,
        }
    }

    /// Same camera turned to face `target`.
    pub fn looking_at(mut self, target: Vec3) -> Self {
        let forward = (target - self.position).normalize_or(self.forward);
        self.forward = forward;
        self.up = orthogonal_up(forward, stable_up(forward));
        self
    }

    /// Same camera with a new perspective aspect ratio.
    pub fn with_aspect(mut self, aspect: f32) -> Self {
        if let Projection::Perspective { fov_y_degrees, .. } = self.projection {
            self.projection = Projection::Perspective {
                fov_y_degrees,
                aspect,
            };
        }
        self
    }

    pub fn right(&self) -> Vec3 {
        self.up.cross(self.forward)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_lh(self.position, self.forward, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        self.projection_range(self.near, self.far)
    }

    /// Projection with the clip planes replaced, used to slice the frustum.
    pub fn projection_range(&self, near: f32, far: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective {
                fov_y_degrees,
                aspect,
            } => Mat4::perspective_lh(fov_y_degrees.to_radians(), aspect, near, far),
            Projection::Orthographic {
                half_width,
                half_height,
            } => Mat4::orthographic_lh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                near,
                far,
            ),
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Distance along the view axis, as compared against cascade bounds.
    pub fn view_depth(&self, world: Vec3) -> f32 {
        (world - self.position).dot(self.forward)
    }
}

/// Gram-Schmidt `hint` against `forward`.
fn orthogonal_up(forward: Vec3, hint: Vec3) -> Vec3 {
    let up = hint - forward * hint.dot(forward);
    up.normalize_or(stable_up(forward))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec4Swizzles};

    #[test]
    fn point_ahead_lands_in_front_of_camera() {
        let camera = Camera::perspective(Vec3::ZERO, Vec3::Z, 90.0, 1.0, 0.1, 100.0);
        let clip = camera.view_projection() * Vec3::new(0.0, 0.0, 10.0).extend(1.0);
        let ndc = clip.xyz() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn near_and_far_map_to_zero_and_one() {
        let camera = Camera::perspective(Vec3::ZERO, Vec3::Z, 60.0, 1.0, 1.0, 50.0);
        let proj = camera.projection();
        let near = proj * Vec3::new(0.0, 0.0, 1.0).extend(1.0);
        let far = proj * Vec3::new(0.0, 0.0, 50.0).extend(1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn looking_straight_down_uses_z_up() {
        let camera = Camera::orthographic(Vec3::Y * 10.0, Vec3::NEG_Y, 5.0, 5.0, 0.1, 20.0);
        assert_eq!(camera.up, Vec3::Z);
        assert!(camera.view().is_finite());
    }

    #[test]
    fn from_matrix_reads_axes() {
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let matrix = Mat4::from_rotation_translation(rotation, Vec3::new(1.0, 2.0, 3.0));
        let camera = Camera::from_matrix(
            matrix,
            0.1,
            100.0,
            Projection::Perspective {
                fov_y_degrees: 60.0,
                aspect: 1.0,
            },
        );
        assert!(camera.position.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
        assert!(camera.forward.abs_diff_eq(Vec3::X, 1e-6));
        assert!(camera.up.abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn view_depth_follows_forward() {
        let camera = Camera::default().looking_at(Vec3::new(0.0, 4.0, 0.0));
        assert!((camera.view_depth(Vec3::new(0.0, 4.0, 0.0)) - 10.0).abs() < 1e-5);
    }

    #[test]
    fn with_aspect_keeps_fov() {
        let camera = Camera::default().with_aspect(2.0);
        assert_eq!(
            camera.projection,
            Projection::Perspective {
                fov_y_degrees: 60.0,
                aspect: 2.0
            }
        );
    }
}
