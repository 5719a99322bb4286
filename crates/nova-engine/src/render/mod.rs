//! Deferred rendering.
//!
//! The headless half (cascade fitting, SSAO sample tables, the per-frame
//! [`FramePacket`](frame::FramePacket)) always compiles. The wgpu pipeline
//! and the winit runner are feature-gated behind `renderer`; without the
//! feature they compile to nothing.

pub mod cascade;
pub mod frame;
pub mod ssao;

#[cfg(feature = "renderer")]
pub mod app;

#[cfg(feature = "renderer")]
pub mod gpu;

#[cfg(feature = "renderer")]
pub use app::run_windowed;

#[cfg(feature = "renderer")]
pub use gpu::DeferredRenderer;
