//! Entity picking from the G-buffer position target.

use std::sync::mpsc;

use nova_ecs::entity::EntityId;

use super::targets::RenderTargets;
use crate::EngineError;

/// Bytes per copied row. One texel, padded to the copy alignment.
const ROW_BYTES: u64 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64;

/// Entity stored in a position texel, `None` for background.
pub fn decode_entity(texel: [f32; 4]) -> Option<EntityId> {
    let id = texel[3];
    if !id.is_finite() || id < 0.0 {
        return None;
    }
    Some(EntityId::from_raw(id.round() as u32))
}

/// Reads single texels back from the position target.
#[derive(Debug)]
pub struct Picker {
    readback: wgpu::Buffer,
}

impl Picker {
    pub fn new(device: &wgpu::Device) -> Self {
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("picking_readback"),
            size: ROW_BYTES,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self { readback }
    }

    /// Entity covering pixel `(x, y)`. Blocks until the GPU has finished the
    /// copy.
    pub fn read(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        targets: &RenderTargets,
        x: u32,
        y: u32,
    ) -> Result<Option<EntityId>, EngineError> {
        if x >= targets.width() || y >= targets.height() {
            return Ok(None);
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("picking_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &targets.position.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(ROW_BYTES as u32),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = self.readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| EngineError::ResourceCreation(format!("picking readback lost: {e}")))?
            .map_err(|e| EngineError::ResourceCreation(format!("picking readback failed: {e}")))?;

        let texel = {
            let data = slice.get_mapped_range();
            bytemuck::pod_read_unaligned::<[f32; 4]>(&data[..16])
        };
        self.readback.unmap();

        let entity = decode_entity(texel);
        tracing::debug!(x, y, ?entity, "picked");
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_none() {
        assert_eq!(decode_entity([0.0, 0.0, 0.0, -1.0]), None);
        assert_eq!(decode_entity([0.0, 0.0, 0.0, f32::NAN]), None);
    }

    #[test]
    fn stored_id_round_trips() {
        assert_eq!(
            decode_entity([1.0, 2.0, 3.0, 17.0]),
            Some(EntityId::from_raw(17))
        );
        assert_eq!(decode_entity([0.0; 4]), Some(EntityId::from_raw(0)));
    }
}
