//! Nova Engine -- frame loop, scene systems and deferred renderer on top of
//! [`nova_ecs`].
//!
//! The [`Engine`](engine::Engine) owns a [`World`](nova_ecs::world::World), an
//! [`AppContext`](context::AppContext) and a list of systems. Each call to
//! [`Engine::frame`](engine::Engine::frame) delivers pending membership events
//! to system hooks and then updates every system in phase order
//! (Physics, Logic, Render).
//!
//! The GPU pipeline lives behind the `renderer` feature. Everything it
//! consumes (the per-frame [`FramePacket`](render::frame::FramePacket),
//! cascade fitting, SSAO kernels) is plain data and works headless.
//!
//! # Quick Start
//!
//! ```
//! use nova_engine::prelude::*;
//! use glam::Vec3;
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.add_system(PhysicsSystem::default()).unwrap();
//! engine.add_system(DeathTimerSystem::default()).unwrap();
//!
//! let ball = engine.world_mut().create_entity().unwrap();
//! engine.world_mut()
//!     .get_component_mut::<Transform>(ball)
//!     .unwrap()
//!     .set_position(Vec3::new(0.0, 10.0, 0.0));
//! engine.world_mut().insert_component(ball, RigidBody::default()).unwrap();
//! engine.world_mut().insert_component(ball, DeathTimer::new(0.5)).unwrap();
//!
//! engine.run_frames(60, 1.0 / 60.0).unwrap();
//! assert_eq!(engine.frame_count(), 60);
//! assert!(!engine.world().is_alive(ball));
//! ```

#![deny(unsafe_code)]

pub mod camera;
pub mod components;
pub mod config;
pub mod context;
pub mod engine;
pub mod logging;
pub mod mesh;
pub mod render;
pub mod systems;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use nova_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Ecs(#[from] nova_ecs::EcsError),

    /// Misuse of an engine API.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// A GPU resource (device, texture, pipeline) could not be created.
    #[error("failed to create resource: {0}")]
    ResourceCreation(String),

    /// The presentation surface was lost or misconfigured.
    #[error("surface error: {0}")]
    Surface(String),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the ECS prelude.
    pub use nova_ecs::prelude::*;

    pub use crate::camera::{Camera, Projection};
    pub use crate::components::{
        CameraComponent, ComponentKind, DeathTimer, DebugKind, DebugShape, DirectionalLight,
        FpsControl, Material, Model, PointLight, RigidBody,
    };
    pub use crate::config::{EngineConfig, GraphicsSettings};
    pub use crate::context::{AppContext, Key};
    pub use crate::engine::{Engine, FrameDiagnostics};
    pub use crate::mesh::{MeshData, MeshHandle, MeshLibrary, Vertex};
    pub use crate::render::cascade::{Cascade, CascadeCalculator};
    pub use crate::render::frame::{FramePacket, FrameRenderer, PassKind};
    pub use crate::systems::{
        CameraSystem, DebugSystem, DeathTimerSystem, FpsControlSystem, LightSystem, PhysicsSystem,
        RenderSystem, System, SystemContext,
    };
    pub use crate::EngineError;
}
