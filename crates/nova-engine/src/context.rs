//! Application context shared by systems.
//!
//! One [`AppContext`] is built per engine and handed to every system hook by
//! reference. It carries the input snapshot, viewport size and resize
//! listeners, frame timing, the camera published for this frame, the mesh
//! library and the graphics settings.

use std::collections::HashSet;
use std::fmt;

use glam::Vec2;

use crate::camera::Camera;
use crate::config::{EngineConfig, GraphicsSettings};
use crate::mesh::MeshLibrary;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Keys the built-in systems react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
    C,
    Left,
    Right,
    Up,
    Down,
    Shift,
    Control,
    Space,
    Escape,
    Tab,
}

/// Keyboard and mouse state for the current frame.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    held: HashSet<Key>,
    released: HashSet<Key>,
    mouse_delta: Vec2,
    mouse_enabled: bool,
}

impl InputState {
    pub fn set_key(&mut self, key: Key, pressed: bool) {
        if pressed {
            self.held.insert(key);
        } else if self.held.remove(&key) {
            self.released.insert(key);
        }
    }

    pub fn key(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Released during the current frame.
    pub fn key_up(&self, key: Key) -> bool {
        self.released.contains(&key)
    }

    pub fn add_mouse_delta(&mut self, delta: Vec2) {
        self.mouse_delta += delta;
    }

    /// Accumulated motion since the frame began, zero while mouse look is off.
    pub fn mouse_delta(&self) -> Vec2 {
        if self.mouse_enabled {
            self.mouse_delta
        } else {
            Vec2::ZERO
        }
    }

    pub fn mouse_enabled(&self) -> bool {
        self.mouse_enabled
    }

    pub fn set_mouse_enabled(&mut self, enabled: bool) {
        self.mouse_enabled = enabled;
    }

    fn end_frame(&mut self) {
        self.released.clear();
        self.mouse_delta = Vec2::ZERO;
    }
}

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

pub type ResizeCallback = Box<dyn FnMut(u32, u32)>;

// ---------------------------------------------------------------------------
// AppContext
// ---------------------------------------------------------------------------

pub struct AppContext {
    pub input: InputState,
    pub meshes: MeshLibrary,
    pub graphics: GraphicsSettings,
    viewport: Viewport,
    resize_callbacks: Vec<ResizeCallback>,
    delta_time: f32,
    elapsed: f64,
    camera: Option<Camera>,
}

impl AppContext {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            input: InputState::default(),
            meshes: MeshLibrary::new(),
            graphics: config.graphics.clone(),
            viewport: Viewport {
                width: config.window.width.max(1),
                height: config.window.height.max(1),
            },
            resize_callbacks: Vec::new(),
            delta_time: 0.0,
            elapsed: 0.0,
            camera: None,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Register a listener for viewport size changes.
    pub fn on_resize(&mut self, callback: impl FnMut(u32, u32) + 'static) {
        self.resize_callbacks.push(Box::new(callback));
    }

    /// Record a new viewport size and notify listeners.
    ///
    /// Zero-sized (minimized) and unchanged sizes are ignored.
    pub fn notify_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            tracing::debug!(width, height, "ignoring zero-sized viewport");
            return;
        }
        let size = Viewport { width, height };
        if size == self.viewport {
            return;
        }
        tracing::debug!(width, height, "viewport resized");
        self.viewport = size;
        for callback in &mut self.resize_callbacks {
            callback(width, height);
        }
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Seconds of simulated time since the engine started.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Camera published by the camera system this frame.
    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn set_camera(&mut self, camera: Option<Camera>) {
        self.camera = camera;
    }

    pub(crate) fn begin_frame(&mut self, dt: f32) {
        self.delta_time = dt;
        self.elapsed += f64::from(dt);
    }

    pub(crate) fn end_frame(&mut self) {
        self.input.end_frame();
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("viewport", &self.viewport)
            .field("delta_time", &self.delta_time)
            .field("camera", &self.camera)
            .field("meshes", &self.meshes.len())
            .field("resize_callbacks", &self.resize_callbacks.len())
            .finish_non_exhaustive()
    }
}
