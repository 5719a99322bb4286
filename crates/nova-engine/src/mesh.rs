//! CPU-side mesh data and primitive generators.
//!
//! Triangles are emitted so that they read counter-clockwise on screen when
//! seen from outside the surface, matching the left-handed clip space used
//! by [`Camera`](crate::camera::Camera).

use std::f32::consts::PI;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Vertex
// ---------------------------------------------------------------------------

/// Interleaved vertex as uploaded to the GPU (32-byte stride).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "renderer",
    derive(bytemuck_derive::Pod, bytemuck_derive::Zeroable)
)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

// ---------------------------------------------------------------------------
// MeshData
// ---------------------------------------------------------------------------

/// Indexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned cube centered on the origin with the given edge length.
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        let mut mesh = Self::empty();
        // (normal, tangent u, tangent v)
        let faces = [
            (Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::X, Vec3::Y),
        ];
        for (normal, u, v) in faces {
            let center = normal * h;
            let corners = [
                (center - u * h - v * h, Vec2::new(0.0, 1.0)),
                (center + u * h - v * h, Vec2::new(1.0, 1.0)),
                (center + u * h + v * h, Vec2::new(1.0, 0.0)),
                (center - u * h + v * h, Vec2::new(0.0, 0.0)),
            ];
            let base = mesh.vertices.len() as u32;
            for (p, uv) in corners {
                mesh.vertices.push(Vertex::new(p, normal, uv));
            }
            mesh.push_triangle(base, base + 1, base + 2);
            mesh.push_triangle(base, base + 2, base + 3);
        }
        mesh
    }

    /// The clip-space volume: x and y in -1..1, z in 0..1. Transformed by an
    /// inverse view-projection it outlines that camera's frustum.
    pub fn ndc_cube() -> Self {
        let mut mesh = Self::cube(2.0);
        for vertex in &mut mesh.vertices {
            vertex.position[2] = (vertex.position[2] + 1.0) * 0.5;
        }
        mesh
    }

    /// Horizontal square in the XZ plane facing +Y.
    pub fn plane(size: f32) -> Self {
        let h = size * 0.5;
        let mut mesh = Self::empty();
        let corners = [
            (Vec3::new(-h, 0.0, -h), Vec2::new(0.0, 1.0)),
            (Vec3::new(h, 0.0, -h), Vec2::new(1.0, 1.0)),
            (Vec3::new(h, 0.0, h), Vec2::new(1.0, 0.0)),
            (Vec3::new(-h, 0.0, h), Vec2::new(0.0, 0.0)),
        ];
        for (p, uv) in corners {
            mesh.vertices.push(Vertex::new(p, Vec3::Y, uv));
        }
        mesh.push_triangle(0, 1, 2);
        mesh.push_triangle(0, 2, 3);
        mesh
    }

    /// Latitude/longitude sphere. `segments` around, `rings` pole to pole.
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut mesh = Self::empty();

        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();
            for seg in 0..=segments {
                let theta = 2.0 * PI * seg as f32 / segments as f32;
                let (sin_theta, cos_theta) = theta.sin_cos();
                let normal = Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta);
                let uv = Vec2::new(seg as f32 / segments as f32, ring as f32 / rings as f32);
                mesh.vertices.push(Vertex::new(normal * radius, normal, uv));
            }
        }

        for ring in 0..rings {
            for seg in 0..segments {
                let current = ring * (segments + 1) + seg;
                let next = current + segments + 1;
                if ring != 0 {
                    mesh.push_triangle(current, next, current + 1);
                }
                if ring != rings - 1 {
                    mesh.push_triangle(current + 1, next, next + 1);
                }
            }
        }
        mesh
    }

    /// Append a triangle, flipping it if needed so it faces along the
    /// average of its vertex normals.
    fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        let va = self.vertices[a as usize];
        let vb = self.vertices[b as usize];
        let vc = self.vertices[c as usize];
        let face = (vb.position() - va.position()).cross(vc.position() - va.position());
        let normal = va.normal() + vb.normal() + vc.normal();
        // Left-handed: a screen-CCW triangle has its raw cross product
        // pointing away from the viewer.
        if face.dot(normal) > 0.0 {
            self.indices.extend_from_slice(&[a, c, b]);
        } else {
            self.indices.extend_from_slice(&[a, b, c]);
        }
    }
}

// ---------------------------------------------------------------------------
// MeshLibrary
// ---------------------------------------------------------------------------

/// Index into a [`MeshLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeshHandle(u32);

impl MeshHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owns mesh data; components refer to it by [`MeshHandle`].
#[derive(Debug, Default)]
pub struct MeshLibrary {
    meshes: Vec<MeshData>,
}

impl MeshLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mesh: MeshData) -> MeshHandle {
        let handle = MeshHandle(self.meshes.len() as u32);
        tracing::debug!(
            handle = handle.0,
            vertices = mesh.vertices.len(),
            triangles = mesh.triangle_count(),
            "added mesh"
        );
        self.meshes.push(mesh);
        handle
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&MeshData> {
        self.meshes.get(handle.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshHandle, &MeshData)> {
        self.meshes
            .iter()
            .enumerate()
            .map(|(i, m)| (MeshHandle(i as u32), m))
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_front_facing(mesh: &MeshData) {
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize]);
            let face = (b.position() - a.position()).cross(c.position() - a.position());
            let n = a.normal() + b.normal() + c.normal();
            assert!(face.dot(n) <= 1e-6, "triangle {tri:?} faces inward");
        }
    }

    #[test]
    fn vertex_stride_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn cube_has_24_vertices_and_12_triangles() {
        let cube = MeshData::cube(2.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        for v in &cube.vertices {
            assert!(v.position().abs().max_element() <= 1.0 + 1e-6);
        }
        assert_front_facing(&cube);
    }

    #[test]
    fn ndc_cube_spans_clip_space() {
        let cube = MeshData::ndc_cube();
        let (min, max) = cube.vertices.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(min, max), v| (min.min(v.position()), max.max(v.position())),
        );
        assert_eq!(min, Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(max, Vec3::new(1.0, 1.0, 1.0));
        assert_front_facing(&cube);
    }

    #[test]
    fn plane_faces_up() {
        let plane = MeshData::plane(10.0);
        assert_eq!(plane.triangle_count(), 2);
        assert_front_facing(&plane);
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let sphere = MeshData::uv_sphere(2.0, 16, 8);
        for v in &sphere.vertices {
            assert!((v.position().length() - 2.0).abs() < 1e-4);
        }
        assert_eq!(sphere.triangle_count(), 16 * (8 - 1) * 2);
        assert_front_facing(&sphere);
    }

    #[test]
    fn library_hands_out_sequential_handles() {
        let mut lib = MeshLibrary::new();
        let a = lib.add(MeshData::cube(1.0));
        let b = lib.add(MeshData::plane(1.0));
        assert_ne!(a, b);
        assert_eq!(lib.get(b).unwrap().triangle_count(), 2);
        assert_eq!(lib.len(), 2);
        assert!(lib.get(MeshHandle(7)).is_none());
    }
}
