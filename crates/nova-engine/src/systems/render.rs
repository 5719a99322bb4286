//! Render system: gathers the frame and hands it to a renderer.

use nova_ecs::prelude::*;

use super::{System, SystemContext};
use crate::components::{DirectionalLight, Model, PointLight};
use crate::context::Viewport;
use crate::render::cascade::CascadeCalculator;
use crate::render::frame::{
    collect_directional_lights, collect_point_lights, cull, FramePacket, FrameRenderer,
};
use crate::EngineError;

/// Builds a [`FramePacket`] from models, lights and the published camera
/// each frame, and draws it with the attached [`FrameRenderer`].
///
/// Without a renderer the packet is still built, which keeps the whole
/// gathering path testable headless.
#[derive(Default)]
pub struct RenderSystem {
    renderer: Option<Box<dyn FrameRenderer>>,
    last_packet: Option<FramePacket>,
    size: Option<Viewport>,
}

impl RenderSystem {
    pub const MODELS: Signature = Signature::new().with_component::<Model>();
    pub const POINT_LIGHTS: Signature = Signature::new().with_component::<PointLight>();
    pub const DIRECTIONAL_LIGHTS: Signature = Signature::new().with_component::<DirectionalLight>();

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renderer(renderer: Box<dyn FrameRenderer>) -> Self {
        Self {
            renderer: Some(renderer),
            ..Self::default()
        }
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn FrameRenderer>) {
        self.renderer = Some(renderer);
        self.size = None;
    }

    pub fn renderer_mut(&mut self) -> Option<&mut (dyn FrameRenderer + 'static)> {
        self.renderer.as_deref_mut()
    }

    /// Packet built by the most recent update, if a camera was available.
    pub fn last_packet(&self) -> Option<&FramePacket> {
        self.last_packet.as_ref()
    }

    /// Entity visible at pixel `(x, y)` of the last frame.
    ///
    /// `Ok(None)` for background pixels, out-of-range coordinates or when
    /// no renderer is attached.
    pub fn read_entity_id(&mut self, x: u32, y: u32) -> Result<Option<EntityId>, EngineError> {
        match self.renderer.as_deref_mut() {
            Some(renderer) => renderer.read_entity_id(x, y),
            None => Ok(None),
        }
    }

    fn sync_size(&mut self, viewport: Viewport) -> Result<(), EngineError> {
        if self.size == Some(viewport) {
            return Ok(());
        }
        if let Some(renderer) = self.renderer.as_deref_mut() {
            tracing::debug!(
                width = viewport.width,
                height = viewport.height,
                "resizing render targets"
            );
            renderer.resize(viewport.width, viewport.height)?;
        }
        self.size = Some(viewport);
        Ok(())
    }
}

impl System for RenderSystem {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("render", SystemPhase::Render)
            .require(Self::MODELS)
            .require(Self::POINT_LIGHTS)
            .require(Self::DIRECTIONAL_LIGHTS)
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        self.sync_size(ctx.app.viewport())?;

        let Some(camera) = ctx.app.camera().copied() else {
            tracing::trace!("no camera published, skipping frame");
            self.last_packet = None;
            return Ok(());
        };

        let targets = cull(ctx.world, ctx.members_matching(Self::MODELS)?)?;
        let directional =
            collect_directional_lights(ctx.world, ctx.members_matching(Self::DIRECTIONAL_LIGHTS)?)?;
        let point = collect_point_lights(ctx.world, ctx.members_matching(Self::POINT_LIGHTS)?)?;

        let calculator = CascadeCalculator::from_settings(&ctx.app.graphics.shadows);
        let packet = FramePacket::assemble(
            camera,
            targets,
            directional,
            point,
            &calculator,
            &ctx.app.graphics,
        )?;

        if let Some(renderer) = self.renderer.as_deref_mut() {
            renderer.render(&packet, &ctx.app.meshes, &ctx.app.graphics)?;
        }
        self.last_packet = Some(packet);
        Ok(())
    }
}

impl std::fmt::Debug for RenderSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSystem")
            .field("has_renderer", &self.renderer.is_some())
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
