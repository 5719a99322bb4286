//! Windowed application runner.
//!
//! Provides [`run_windowed`], which takes ownership of an [`Engine`] and
//! drives it inside a winit event loop. Window and device events feed the
//! engine's [`AppContext`](crate::context::AppContext); each
//! `RedrawRequested` event runs one [`Engine::frame`] with the measured
//! delta time, and the render system draws through a [`DeferredRenderer`]
//! attached at startup.
//!
//! Controls beyond the input the systems read: Tab toggles mouse look,
//! Escape quits.
//!
//! This module is feature-gated behind `renderer`.

use std::sync::Arc;

use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowAttributes, WindowId};

use super::gpu::{DeferredRenderer, GpuContext};
use crate::config::WindowConfig;
use crate::context::Key;
use crate::engine::Engine;
use crate::systems::RenderSystem;
use crate::EngineError;

/// Delta time of the very first frame, before there is a measurement.
const FIRST_FRAME_DT: f32 = 1.0 / 60.0;

/// Run `engine` in a window until it is closed.
///
/// A [`RenderSystem`] is added if the engine has none; either way the
/// system gets a [`DeferredRenderer`] presenting to the window.
///
/// # Errors
///
/// Returns an error if the event loop, window or renderer cannot be
/// created, or if a frame fails.
pub fn run_windowed(engine: Engine, window: &WindowConfig) -> Result<(), anyhow::Error> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let mut app = App {
        state: AppState::Pending {
            engine,
            config: window.clone(),
        },
        failure: None,
    };
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Map a physical key to the engine's key set.
pub fn map_key(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyC => Key::C,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
        KeyCode::Space => Key::Space,
        KeyCode::Escape => Key::Escape,
        KeyCode::Tab => Key::Tab,
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Internal state machine
// ---------------------------------------------------------------------------

/// Winit 0.30 creates windows inside `resumed`, so the engine waits in
/// `Pending` until then.
enum AppState {
    Pending {
        engine: Engine,
        config: WindowConfig,
    },
    Running {
        engine: Engine,
        window: Arc<Window>,
    },
    /// Temporary placeholder used during state transitions.
    Transitioning,
}

struct App {
    state: AppState,
    /// First fatal error, returned once the loop exits.
    failure: Option<anyhow::Error>,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        tracing::error!(error = %error, "fatal error, exiting");
        self.failure.get_or_insert(error);
        event_loop.exit();
    }
}

/// Create the device and renderer for `window` and hand the renderer to the
/// engine's render system.
fn attach_renderer(
    engine: &mut Engine,
    window: Arc<Window>,
    config: &WindowConfig,
) -> Result<(), EngineError> {
    let size = window.inner_size();
    let (width, height) = (size.width.max(1), size.height.max(1));
    let gpu = pollster::block_on(GpuContext::windowed(window, config.vsync))?;
    let renderer = DeferredRenderer::new(gpu, width, height, &engine.app().graphics)?;

    engine.app_mut().notify_resize(width, height);
    match engine.system_mut::<RenderSystem>() {
        Some(system) => system.set_renderer(Box::new(renderer)),
        None => {
            engine.add_system(RenderSystem::with_renderer(Box::new(renderer)))?;
        }
    }
    Ok(())
}

fn set_mouse_look(window: &Window, enabled: bool) {
    let grab = if enabled {
        window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
    } else {
        window.set_cursor_grab(CursorGrabMode::None)
    };
    if let Err(e) = grab {
        tracing::warn!(error = %e, "cursor grab not supported");
    }
    window.set_cursor_visible(!enabled);
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let state = std::mem::replace(&mut self.state, AppState::Transitioning);
        match state {
            AppState::Pending { mut engine, config } => {
                let attrs = WindowAttributes::default()
                    .with_title(config.title.clone())
                    .with_inner_size(winit::dpi::PhysicalSize::new(config.width, config.height));
                let window = match event_loop.create_window(attrs) {
                    Ok(window) => Arc::new(window),
                    Err(e) => {
                        self.state = AppState::Pending { engine, config };
                        self.fail(event_loop, e.into());
                        return;
                    }
                };
                if let Err(e) = attach_renderer(&mut engine, window.clone(), &config) {
                    self.state = AppState::Pending { engine, config };
                    self.fail(event_loop, e.into());
                    return;
                }
                tracing::info!(
                    width = config.width,
                    height = config.height,
                    "window created"
                );
                // Kick off the first frame on backends that send no initial
                // RedrawRequested.
                window.request_redraw();
                self.state = AppState::Running { engine, window };
            }
            running @ AppState::Running { .. } => self.state = running,
            AppState::Transitioning => {
                tracing::warn!("resumed called during state transition");
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let AppState::Running { engine, window } = &mut self.state else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!(frames = engine.frame_count(), "window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                engine.app_mut().notify_resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                let Some(key) = map_key(code) else {
                    return;
                };
                let pressed = state == ElementState::Pressed;
                let input = &mut engine.app_mut().input;
                input.set_key(key, pressed);
                match key {
                    Key::Escape if pressed => event_loop.exit(),
                    Key::Tab if pressed => {
                        let enabled = !input.mouse_enabled();
                        input.set_mouse_enabled(enabled);
                        set_mouse_look(window, enabled);
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                let result = engine.frame_timed(FIRST_FRAME_DT);
                window.request_redraw();
                if let Err(e) = result {
                    self.fail(event_loop, e.into());
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let (AppState::Running { engine, .. }, DeviceEvent::MouseMotion { delta }) =
            (&mut self.state, event)
        {
            engine
                .app_mut()
                .input
                .add_mouse_delta(Vec2::new(delta.0 as f32, delta.1 as f32));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_modifiers_map_to_one_key() {
        assert_eq!(map_key(KeyCode::ShiftLeft), Some(Key::Shift));
        assert_eq!(map_key(KeyCode::ShiftRight), Some(Key::Shift));
        assert_eq!(map_key(KeyCode::ControlRight), Some(Key::Control));
        assert_eq!(map_key(KeyCode::KeyW), Some(Key::W));
        assert_eq!(map_key(KeyCode::F5), None);
    }
}
