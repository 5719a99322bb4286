//! Variable-timestep frame loop.
//!
//! The [`Engine`] drives the scene forward one frame at a time. Each frame:
//!
//! 1. The frame's delta time is published to the [`AppContext`].
//! 2. Systems update in phase order (Physics, Logic, Render), registration
//!    order within a phase. Before each update, pending membership events
//!    are delivered to the `on_entity_added` / `on_entity_removed` hooks of
//!    the systems they concern.
//! 3. Per-frame input state is cleared and the frame counter advances.
//!
//! An error from any hook or update aborts the rest of the frame and is
//! returned to the caller.
//!
//! # Example
//!
//! ```
//! use nova_engine::prelude::*;
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.add_system(DeathTimerSystem::default()).unwrap();
//!
//! let e = engine.world_mut().create_entity().unwrap();
//! engine.world_mut().insert_component(e, DeathTimer::new(0.05)).unwrap();
//!
//! engine.frame(0.1).unwrap();
//! assert!(!engine.world().is_alive(e));
//! assert_eq!(engine.system::<DeathTimerSystem>().unwrap().destroyed(), 1);
//! ```

use std::time::{Duration, Instant};

use nova_ecs::prelude::*;

use crate::components;
use crate::config::EngineConfig;
use crate::context::AppContext;
use crate::systems::{AnySystem, System, SystemContext};
use crate::EngineError;

// ---------------------------------------------------------------------------
// FrameDiagnostics
// ---------------------------------------------------------------------------

/// Timing for the last completed frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDiagnostics {
    /// Wall-clock time per system update, in execution order.
    pub system_times: Vec<(String, Duration)>,
    /// Time spent in membership hooks.
    pub hook_time: Duration,
    pub total_time: Duration,
    /// Membership events delivered this frame.
    pub events_delivered: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct RegisteredSystem {
    id: SystemId,
    name: String,
    phase: SystemPhase,
    system: Box<dyn AnySystem>,
}

/// World, context and systems, stepped one frame at a time.
pub struct Engine {
    world: World,
    app: AppContext,
    /// Kept sorted by phase, registration order within a phase.
    systems: Vec<RegisteredSystem>,
    frame_counter: u64,
    last_diagnostics: FrameDiagnostics,
    last_instant: Option<Instant>,
}

impl Engine {
    /// An engine with a fresh world and every engine component registered.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let mut world = World::new();
        components::register_all(&mut world)?;
        Ok(Self::with_world(world, &config))
    }

    /// Wrap an existing world. Engine components must already be registered
    /// if the built-in systems are used.
    pub fn with_world(world: World, config: &EngineConfig) -> Self {
        Self {
            world,
            app: AppContext::new(config),
            systems: Vec::new(),
            frame_counter: 0,
            last_diagnostics: FrameDiagnostics::default(),
            last_instant: None,
        }
    }

    /// Register `system` with the world, run its `init` hook and schedule it.
    ///
    /// Entities that already match are reported through `on_entity_added`
    /// at the start of the next frame.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateSystem`] if a system with the same name exists,
    /// or whatever `init` returns. A failed `init` withdraws the registration,
    /// so the name stays free.
    pub fn add_system<S: System>(&mut self, mut system: S) -> Result<SystemId, EngineError> {
        let descriptor = system.descriptor();
        let name = descriptor.name.clone();
        let phase = descriptor.phase;
        let id = self.world.register_system(descriptor)?;

        let mut ctx = SystemContext {
            id,
            world: &mut self.world,
            app: &mut self.app,
        };
        if let Err(error) = system.init(&mut ctx) {
            tracing::warn!(system = %name, %error, "system init failed, withdrawing registration");
            self.world.unregister_system(id)?;
            return Err(error);
        }

        let slot = self.systems.partition_point(|s| s.phase <= phase);
        self.systems.insert(
            slot,
            RegisteredSystem {
                id,
                name: name.clone(),
                phase,
                system: Box::new(system),
            },
        );
        tracing::info!(system = %name, ?phase, "added system");
        Ok(id)
    }

    /// Run one frame with the given delta time in seconds.
    pub fn frame(&mut self, dt: f32) -> Result<(), EngineError> {
        let frame_start = Instant::now();
        let mut diagnostics = FrameDiagnostics::default();
        self.app.begin_frame(dt);

        for slot in 0..self.systems.len() {
            let hooks_start = Instant::now();
            diagnostics.events_delivered += self.dispatch_events()?;
            diagnostics.hook_time += hooks_start.elapsed();

            let entry = &mut self.systems[slot];
            let mut ctx = SystemContext {
                id: entry.id,
                world: &mut self.world,
                app: &mut self.app,
            };
            let start = Instant::now();
            if let Err(error) = entry.system.update(&mut ctx) {
                tracing::error!(
                    system = %entry.name,
                    frame = self.frame_counter,
                    %error,
                    "system failed, aborting frame"
                );
                return Err(error);
            }
            diagnostics
                .system_times
                .push((entry.name.clone(), start.elapsed()));
        }

        self.app.end_frame();
        self.frame_counter += 1;
        diagnostics.total_time = frame_start.elapsed();
        self.last_diagnostics = diagnostics;
        Ok(())
    }

    /// Run a frame with the wall-clock time since the previous call.
    ///
    /// The first call uses `fallback_dt`.
    pub fn frame_timed(&mut self, fallback_dt: f32) -> Result<(), EngineError> {
        let now = Instant::now();
        let dt = self
            .last_instant
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(fallback_dt);
        self.last_instant = Some(now);
        self.frame(dt)
    }

    /// Run `count` frames with a fixed delta time.
    pub fn run_frames(&mut self, count: u64, dt: f32) -> Result<(), EngineError> {
        for _ in 0..count {
            self.frame(dt)?;
        }
        Ok(())
    }

    /// Deliver queued membership events until none remain. Returns how many
    /// were delivered.
    fn dispatch_events(&mut self) -> Result<usize, EngineError> {
        let mut delivered = 0;
        loop {
            let events = self.world.drain_membership_events();
            if events.is_empty() {
                return Ok(delivered);
            }
            for event in events {
                let Some(entry) = self.systems.iter_mut().find(|s| s.id == event.system()) else {
                    // Registered with the world directly, no hooks to call.
                    continue;
                };
                let mut ctx = SystemContext {
                    id: entry.id,
                    world: &mut self.world,
                    app: &mut self.app,
                };
                match event {
                    MembershipEvent::Added { entity, .. } => {
                        // The entity may have left again before delivery.
                        if ctx.world.systems().contains(entry.id, entity) {
                            entry.system.on_entity_added(&mut ctx, entity)?;
                            delivered += 1;
                        }
                    }
                    MembershipEvent::Removed { entity, .. } => {
                        entry.system.on_entity_removed(&mut ctx, entity)?;
                        delivered += 1;
                    }
                }
            }
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn app(&self) -> &AppContext {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut AppContext {
        &mut self.app
    }

    /// World and context together, for setup code that needs both.
    pub fn parts_mut(&mut self) -> (&mut World, &mut AppContext) {
        (&mut self.world, &mut self.app)
    }

    /// The first scheduled system of type `S`.
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems
            .iter()
            .find_map(|s| s.system.as_any().downcast_ref::<S>())
    }

    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems
            .iter_mut()
            .find_map(|s| s.system.as_any_mut().downcast_mut::<S>())
    }

    /// Run `f` with mutable access to a system of type `S` and the world.
    pub fn with_system<S: System, R>(
        &mut self,
        f: impl FnOnce(&mut S, &mut World, &mut AppContext) -> R,
    ) -> Option<R> {
        let system = self
            .systems
            .iter_mut()
            .find_map(|s| s.system.as_any_mut().downcast_mut::<S>())?;
        Some(f(system, &mut self.world, &mut self.app))
    }

    /// System names in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn last_diagnostics(&self) -> &FrameDiagnostics {
        &self.last_diagnostics
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("frame_counter", &self.frame_counter)
            .field("systems", &self.system_names())
            .field("entities", &self.world.entity_count())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        phase: SystemPhase,
        log: Log,
        fail: bool,
        fail_init: bool,
    }

    impl Recorder {
        fn new(name: &'static str, phase: SystemPhase, log: &Log) -> Self {
            Self {
                name,
                phase,
                log: Rc::clone(log),
                fail: false,
                fail_init: false,
            }
        }
    }

    impl System for Recorder {
        fn descriptor(&self) -> SystemDescriptor {
            SystemDescriptor::new(self.name, self.phase).require(Signature::new())
        }

        fn init(&mut self, _ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
            if self.fail_init {
                return Err(EngineError::Argument("init failure".into()));
            }
            Ok(())
        }

        fn on_entity_added(
            &mut self,
            _ctx: &mut SystemContext<'_>,
            entity: EntityId,
        ) -> Result<(), EngineError> {
            self.log.borrow_mut().push(format!("{}+{}", self.name, entity.to_raw()));
            Ok(())
        }

        fn on_entity_removed(
            &mut self,
            _ctx: &mut SystemContext<'_>,
            entity: EntityId,
        ) -> Result<(), EngineError> {
            self.log.borrow_mut().push(format!("{}-{}", self.name, entity.to_raw()));
            Ok(())
        }

        fn update(&mut self, _ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
            self.log.borrow_mut().push(self.name.to_owned());
            if self.fail {
                return Err(EngineError::Argument("update failure".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn systems_run_in_phase_order() {
        let log = Log::default();
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.add_system(Recorder::new("render", SystemPhase::Render, &log)).unwrap();
        engine.add_system(Recorder::new("logic_a", SystemPhase::Logic, &log)).unwrap();
        engine.add_system(Recorder::new("physics", SystemPhase::Physics, &log)).unwrap();
        engine.add_system(Recorder::new("logic_b", SystemPhase::Logic, &log)).unwrap();

        engine.frame(0.016).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["physics", "logic_a", "logic_b", "render"]
        );
        assert_eq!(engine.frame_count(), 1);
        assert_eq!(engine.last_diagnostics().system_times.len(), 4);
    }

    #[test]
    fn hooks_fire_before_the_next_update() {
        let log = Log::default();
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.add_system(Recorder::new("p", SystemPhase::Physics, &log)).unwrap();
        let e = engine.world_mut().create_entity().unwrap();

        engine.frame(0.016).unwrap();
        engine.world_mut().destroy_entity(e).unwrap();
        engine.frame(0.016).unwrap();

        let raw = e.to_raw();
        assert_eq!(
            *log.borrow(),
            vec![format!("p+{raw}"), "p".into(), format!("p-{raw}"), "p".into()]
        );
    }

    #[test]
    fn added_then_destroyed_before_delivery_skips_the_add() {
        let log = Log::default();
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.add_system(Recorder::new("p", SystemPhase::Logic, &log)).unwrap();
        let e = engine.world_mut().create_entity().unwrap();
        engine.world_mut().destroy_entity(e).unwrap();
        engine.frame(0.016).unwrap();
        assert_eq!(*log.borrow(), vec![format!("p-{}", e.to_raw()), "p".into()]);
    }

    #[test]
    fn failing_system_aborts_the_frame() {
        let log = Log::default();
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let mut bad = Recorder::new("bad", SystemPhase::Physics, &log);
        bad.fail = true;
        engine.add_system(bad).unwrap();
        engine.add_system(Recorder::new("after", SystemPhase::Logic, &log)).unwrap();

        assert!(engine.frame(0.016).is_err());
        assert_eq!(*log.borrow(), vec!["bad"]);
        assert_eq!(engine.frame_count(), 0);
    }

    #[test]
    fn duplicate_system_is_rejected() {
        let log = Log::default();
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.add_system(Recorder::new("p", SystemPhase::Logic, &log)).unwrap();
        let err = engine
            .add_system(Recorder::new("p", SystemPhase::Render, &log))
            .unwrap_err();
        assert!(matches!(err, EngineError::Ecs(EcsError::DuplicateSystem { .. })));
        assert_eq!(engine.system_count(), 1);
    }

    #[test]
    fn failed_init_leaves_the_name_free() {
        let log = Log::default();
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let e = engine.world_mut().create_entity().unwrap();
        let mut failing = Recorder::new("failing", SystemPhase::Logic, &log);
        failing.fail_init = true;

        assert!(matches!(
            engine.add_system(failing),
            Err(EngineError::Argument(_))
        ));
        assert_eq!(engine.system_count(), 0);
        assert!(engine.world().systems().is_empty());

        let id = engine
            .add_system(Recorder::new("failing", SystemPhase::Logic, &log))
            .unwrap();
        assert_eq!(engine.world().system_members(id).unwrap(), vec![e]);

        engine.frame(0.016).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![format!("failing+{}", e.to_raw()), "failing".to_owned()]
        );
    }

    #[test]
    fn system_lookup_by_type() {
        let log = Log::default();
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.add_system(Recorder::new("p", SystemPhase::Logic, &log)).unwrap();
        engine.system_mut::<Recorder>().unwrap().fail = true;
        assert!(engine.system::<Recorder>().unwrap().fail);
        assert!(engine.system::<crate::systems::PhysicsSystem>().is_none());
    }
}
