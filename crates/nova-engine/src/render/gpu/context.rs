//! Device, queue and (optionally) the window surface.

use std::sync::Arc;

use crate::EngineError;

struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    window: Arc<winit::window::Window>,
}

/// The wgpu device a [`DeferredRenderer`](super::DeferredRenderer) draws with.
///
/// A windowed context presents to the window's surface. A headless context
/// has no surface; the final image stays in the renderer's offscreen
/// target, as an editor viewport would use it.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    surface: Option<SurfaceState>,
}

impl GpuContext {
    /// Create a device able to present to `window`.
    ///
    /// This is async because adapter and device selection are. Call it with
    /// `pollster::block_on`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Surface`] if the surface cannot be created and
    /// [`EngineError::ResourceCreation`] if no adapter or device is available.
    pub async fn windowed(
        window: Arc<winit::window::Window>,
        vsync: bool,
    ) -> Result<Self, EngineError> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| EngineError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| EngineError::ResourceCreation("no suitable GPU adapter found".into()))?;
        let (device, queue) = Self::request_device(&adapter).await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| EngineError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        tracing::info!(
            adapter = %adapter.get_info().name,
            ?format,
            width,
            height,
            "gpu context created"
        );

        Ok(Self {
            device,
            queue,
            surface: Some(SurfaceState {
                surface,
                config,
                window,
            }),
        })
    }

    /// Create a device without a surface.
    pub async fn headless() -> Result<Self, EngineError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| EngineError::ResourceCreation("no suitable GPU adapter found".into()))?;
        let (device, queue) = Self::request_device(&adapter).await?;
        tracing::info!(adapter = %adapter.get_info().name, "headless gpu context created");
        Ok(Self {
            device,
            queue,
            surface: None,
        })
    }

    async fn request_device(
        adapter: &wgpu::Adapter,
    ) -> Result<(wgpu::Device, wgpu::Queue), EngineError> {
        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("nova_device"),
                    // Wireframe materials use line polygon mode where available.
                    required_features: adapter.features() & wgpu::Features::POLYGON_MODE_LINE,
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| EngineError::ResourceCreation(e.to_string()))
    }

    /// Format of the window surface, if any.
    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.surface.as_ref().map(|s| s.config.format)
    }

    pub fn window(&self) -> Option<&winit::window::Window> {
        self.surface.as_ref().map(|s| s.window.as_ref())
    }

    /// Reconfigure the surface. Zero sizes are ignored.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(state) = self.surface.as_mut() {
            state.config.width = width;
            state.config.height = height;
            state.surface.configure(&self.device, &state.config);
        }
    }

    /// Next surface texture to draw into.
    ///
    /// `Ok(None)` when there is no surface or the frame should be skipped
    /// (a lost or outdated surface is reconfigured first).
    ///
    /// # Errors
    ///
    /// [`EngineError::Surface`] when the GPU is out of memory.
    pub fn acquire(&mut self) -> Result<Option<wgpu::SurfaceTexture>, EngineError> {
        let Some(state) = self.surface.as_mut() else {
            return Ok(None);
        };
        match state.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost, reconfiguring");
                state.surface.configure(&self.device, &state.config);
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                Err(EngineError::Surface("GPU out of memory".into()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "surface error, skipping frame");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("surface_format", &self.surface_format())
            .finish_non_exhaustive()
    }
}
