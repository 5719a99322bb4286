//! Growable uniform array addressed with dynamic offsets.

use std::marker::PhantomData;

use super::uniforms::{pack_strided, UNIFORM_STRIDE};

/// One uniform of type `T` per draw, bound once and selected per draw with
/// [`dynamic_offset`](super::uniforms::dynamic_offset).
///
/// The buffer grows to the next power of two when a frame needs more slots;
/// the bind group is recreated with it.
#[derive(Debug)]
pub struct DynamicUniforms<T> {
    label: &'static str,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> DynamicUniforms<T> {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &'static str,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        let (buffer, bind_group) = Self::allocate(device, layout, label, capacity);
        Self {
            label,
            buffer,
            bind_group,
            capacity,
            _marker: PhantomData,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &'static str,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity as u64 * UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<T>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Upload `items`, growing the buffer first if needed.
    pub fn write(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        items: &[T],
    ) {
        if items.is_empty() {
            return;
        }
        if items.len() > self.capacity {
            let capacity = items.len().next_power_of_two();
            tracing::debug!(
                buffer = self.label,
                from = self.capacity,
                to = capacity,
                "growing uniform buffer"
            );
            self.buffer.destroy();
            let (buffer, bind_group) = Self::allocate(device, layout, self.label, capacity);
            self.buffer = buffer;
            self.bind_group = bind_group;
            self.capacity = capacity;
        }
        queue.write_buffer(&self.buffer, 0, &pack_strided(items));
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
