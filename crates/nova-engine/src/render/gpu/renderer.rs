//! The deferred renderer.

use wgpu::util::DeviceExt;

use nova_ecs::entity::EntityId;

use super::buffers::DynamicUniforms;
use super::context::GpuContext;
use super::geometry::{Draw, GeometryPass};
use super::lighting::LightingPass;
use super::mesh_cache::MeshCache;
use super::occlusion::OcclusionPass;
use super::picking::Picker;
use super::post::PostPass;
use super::shadow::ShadowPass;
use super::targets::{RenderTargets, ShadowMap};
use super::uniforms::{dynamic_offset, CameraUniform, LightingUniform, ObjectUniform, PostUniform};
use super::SharedLayouts;
use crate::config::{GraphicsSettings, ShadowSettings};
use crate::mesh::MeshLibrary;
use crate::render::frame::{FramePacket, FrameRenderer, PassKind};
use crate::EngineError;

/// Initial object uniform slots.
const INITIAL_OBJECTS: usize = 256;

/// Draws a [`FramePacket`] through geometry, shadow, ambient occlusion,
/// lighting, tone mapping and present passes.
///
/// Windowed contexts present to the surface; the final image is always
/// available through [`final_color_view`](Self::final_color_view) for
/// embedding in another view.
pub struct DeferredRenderer {
    gpu: GpuContext,
    layouts: SharedLayouts,
    targets: RenderTargets,
    shadow_map: ShadowMap,
    shadow_settings: ShadowSettings,
    meshes: MeshCache,
    camera_buffer: wgpu::Buffer,
    camera_group: wgpu::BindGroup,
    objects: DynamicUniforms<ObjectUniform>,
    geometry: GeometryPass,
    shadow: ShadowPass,
    occlusion: OcclusionPass,
    lighting: LightingPass,
    post: PostPass,
    picker: Picker,
}

impl DeferredRenderer {
    /// Build every pipeline and target for a `width` x `height` image.
    pub fn new(
        gpu: GpuContext,
        width: u32,
        height: u32,
        graphics: &GraphicsSettings,
    ) -> Result<Self, EngineError> {
        graphics.validate()?;
        let device = &gpu.device;
        let layouts = SharedLayouts::new(device);
        let targets = RenderTargets::new(device, width, height);
        let shadow_map = ShadowMap::new(
            device,
            graphics.shadows.resolution,
            graphics.shadows.cascade_count as u32,
        );

        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera_uniform"),
            contents: bytemuck::bytes_of(&<CameraUniform as bytemuck::Zeroable>::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &layouts.camera,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });
        let objects = DynamicUniforms::new(device, &layouts.object, "object_uniforms", INITIAL_OBJECTS);

        let geometry = GeometryPass::new(device, &layouts);
        let shadow = ShadowPass::new(device, &layouts, &graphics.shadows);
        let occlusion = OcclusionPass::new(
            device,
            &gpu.queue,
            &layouts,
            &targets,
            &graphics.ambient_occlusion,
        );
        let lighting = LightingPass::new(device, &layouts, &targets, &shadow_map);
        let post = PostPass::new(device, &layouts, &targets, gpu.surface_format());
        let picker = Picker::new(device);

        tracing::info!(width, height, "deferred renderer ready");
        Ok(Self {
            layouts,
            targets,
            shadow_map,
            shadow_settings: graphics.shadows.clone(),
            meshes: MeshCache::default(),
            camera_buffer,
            camera_group,
            objects,
            geometry,
            shadow,
            occlusion,
            lighting,
            post,
            picker,
            gpu,
        })
    }

    /// The tone-mapped image of the last frame.
    pub fn final_color_view(&self) -> &wgpu::TextureView {
        &self.targets.final_color.view
    }

    pub fn final_color_texture(&self) -> &wgpu::Texture {
        &self.targets.final_color.texture
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn size(&self) -> (u32, u32) {
        (self.targets.width(), self.targets.height())
    }

    /// Pick up changed shadow or occlusion settings.
    fn sync_settings(&mut self, graphics: &GraphicsSettings) {
        let device = &self.gpu.device;
        if graphics.shadows != self.shadow_settings {
            tracing::debug!("shadow settings changed, rebuilding shadow resources");
            self.shadow_map.texture.destroy();
            self.shadow_map = ShadowMap::new(
                device,
                graphics.shadows.resolution,
                graphics.shadows.cascade_count as u32,
            );
            self.shadow = ShadowPass::new(device, &self.layouts, &graphics.shadows);
            self.lighting.rebind_shadow_map(device, &self.shadow_map);
            self.shadow_settings = graphics.shadows.clone();
        }
        self.occlusion.update_settings(
            device,
            &self.gpu.queue,
            &self.targets,
            &graphics.ambient_occlusion,
        );
    }
}

impl FrameRenderer for DeferredRenderer {
    fn render(
        &mut self,
        packet: &FramePacket,
        meshes: &MeshLibrary,
        graphics: &GraphicsSettings,
    ) -> Result<(), EngineError> {
        self.sync_settings(graphics);
        self.meshes.sync(&self.gpu.device, meshes);

        // Uploads. Each buffer is written once, before the single submit.
        let queue = &self.gpu.queue;
        let camera = CameraUniform::new(
            &packet.camera,
            self.targets.width(),
            self.targets.height(),
        );
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&camera));
        let object_uniforms: Vec<ObjectUniform> =
            packet.targets.iter().map(ObjectUniform::new).collect();
        self.objects
            .write(&self.gpu.device, queue, &self.layouts.object, &object_uniforms);
        if packet.runs(PassKind::Shadow) {
            self.shadow
                .prepare(&self.gpu.device, queue, &packet.cascades);
        }
        self.lighting.prepare(
            queue,
            &LightingUniform::new(packet, graphics, self.shadow_map.resolution),
        );
        self.post.prepare(queue, &PostUniform::new(graphics));

        let draws: Vec<Draw<'_>> = packet
            .targets
            .iter()
            .enumerate()
            .filter_map(|(index, target)| {
                let mesh = self.meshes.get(target.mesh);
                if mesh.is_none() {
                    tracing::trace!(entity = %target.entity, mesh = target.mesh.index(), "mesh not uploaded, skipping");
                }
                mesh.map(|mesh| Draw {
                    mesh,
                    object_offset: dynamic_offset(index),
                    casts_shadow: target.material.casts_shadow(),
                    wireframe: target.material.wireframe,
                })
            })
            .collect();

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        let mut surface_frame = None;

        for &pass in &packet.passes {
            match pass {
                PassKind::Cull => {}
                PassKind::Geometry => self.geometry.encode(
                    &mut encoder,
                    &self.targets,
                    &self.camera_group,
                    &self.objects,
                    &draws,
                ),
                PassKind::Shadow => self.shadow.encode(
                    &mut encoder,
                    &self.shadow_map,
                    self.objects.bind_group(),
                    packet.cascades.len().min(self.shadow_map.layers()),
                    &draws,
                ),
                PassKind::AmbientOcclusion => {
                    self.occlusion
                        .encode_occlusion(&mut encoder, &self.targets, &self.camera_group)
                }
                PassKind::AmbientOcclusionBlur => {
                    self.occlusion.encode_blur(&mut encoder, &self.targets)
                }
                PassKind::Lighting => {
                    self.lighting
                        .encode(&mut encoder, &self.targets, &self.camera_group)
                }
                PassKind::ToneMapping => {
                    self.post
                        .encode_tonemap(&mut encoder, &self.targets, &self.camera_group)
                }
                PassKind::Present => {
                    if let Some(frame) = self.gpu.acquire()? {
                        let view = frame
                            .texture
                            .create_view(&wgpu::TextureViewDescriptor::default());
                        self.post.encode_present(&mut encoder, &view);
                        surface_frame = Some(frame);
                    }
                }
            }
            tracing::trace!(pass = pass.name(), "encoded pass");
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        if let Some(frame) = surface_frame {
            frame.present();
        }
        Ok(())
    }

    /// Destroy and recreate the screen-sized targets, then rebind every pass
    /// that reads them.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::Argument(format!(
                "render target size must be non-zero, got {width}x{height}"
            )));
        }
        if (width, height) == self.size() {
            return Ok(());
        }
        let device = &self.gpu.device;
        self.targets.destroy();
        self.targets = RenderTargets::new(device, width, height);
        self.occlusion.rebind(device, &self.targets);
        self.lighting.rebind_targets(device, &self.targets);
        self.post.rebind(device, &self.targets);
        self.gpu.resize_surface(width, height);
        tracing::debug!(width, height, "render targets recreated");
        Ok(())
    }

    fn read_entity_id(&mut self, x: u32, y: u32) -> Result<Option<EntityId>, EngineError> {
        self.picker
            .read(&self.gpu.device, &self.gpu.queue, &self.targets, x, y)
    }
}

impl std::fmt::Debug for DeferredRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredRenderer")
            .field("size", &self.size())
            .field("meshes", &self.meshes.len())
            .field("shadow_resolution", &self.shadow_map.resolution)
            .finish_non_exhaustive()
    }
}
