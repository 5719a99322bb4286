//! Lazy upload of [`MeshLibrary`] entries.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::mesh::{MeshHandle, MeshLibrary, Vertex};

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

/// Vertex buffer layout for [`Vertex`].
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// GPU copies of library meshes, created the first time a frame sees them.
#[derive(Debug, Default)]
pub struct MeshCache {
    meshes: HashMap<MeshHandle, GpuMesh>,
}

impl MeshCache {
    /// Upload every library mesh not seen before. Returns how many were
    /// uploaded. Empty meshes are never uploaded.
    pub fn sync(&mut self, device: &wgpu::Device, library: &MeshLibrary) -> usize {
        let mut uploaded = 0;
        for (handle, mesh) in library.iter() {
            if self.meshes.contains_key(&handle) || mesh.indices.is_empty() {
                continue;
            }
            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_vertices"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            self.meshes.insert(
                handle,
                GpuMesh {
                    vertex_buffer,
                    index_buffer,
                    index_count: mesh.indices.len() as u32,
                },
            );
            uploaded += 1;
        }
        if uploaded > 0 {
            tracing::debug!(uploaded, total = self.meshes.len(), "uploaded meshes");
        }
        uploaded
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
