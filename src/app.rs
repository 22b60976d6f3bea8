//! Windowed runtime
//!
//! [`SketchApp`] owns the winit event loop, the wgpu backend and the frame
//! [`Clock`]. A [`Sketch`] configures its programs, camera and scene in
//! [`Sketch::setup`] and subscribes its render callback to
//! [`TICK`](crate::time::TICK). Every later hook also receives the clock, so a
//! sketch can [`stop`](Clock::stop) and [`start`](Clock::start) it:
//!
//! ```no_run
//! use sketch_engine::prelude::*;
//!
//! struct Empty;
//!
//! impl Sketch for Empty {
//!     fn setup(&mut self, engine: &Engine, clock: &mut Clock) -> anyhow::Result<()> {
//!         let engine = engine.clone();
//!         clock.on(TICK, move || engine.clear());
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     SketchApp::new(AppConfig::default(), Empty).run()
//! }
//! ```

use std::{path::PathBuf, rc::Rc, sync::Arc};

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    assets::FileSource,
    engine::{Engine, EngineConfig},
    gfx::backend::WgpuBackend,
    logging::{init_logging, LoggingConfig},
    time::Clock,
};

/// Window and runtime settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Default: `"sketch"`
    pub title: String,
    /// Initial inner width in logical pixels. Default: 1200
    pub width: u32,
    /// Initial inner height in logical pixels. Default: 800
    pub height: u32,
    /// Default: true
    pub vsync: bool,
    /// Directory asset paths are resolved against. Default: `"assets"`
    pub asset_root: PathBuf,
    /// Stop the clock while the window is unfocused. Default: false
    pub pause_on_blur: bool,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "sketch".to_string(),
            width: 1200,
            height: 800,
            vsync: true,
            asset_root: PathBuf::from("assets"),
            pause_on_blur: false,
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// A program driven by [`SketchApp`]
pub trait Sketch {
    /// Called once the window and GPU are ready
    ///
    /// Returning an error stops the application.
    fn setup(&mut self, engine: &Engine, clock: &mut Clock) -> anyhow::Result<()>;

    /// Called after the canvas has been resized, before the next tick
    ///
    /// Recompute projections and resize pickers here.
    fn resized(&mut self, _engine: &Engine, _clock: &mut Clock, _width: u32, _height: u32) {}

    /// Window events the runtime does not consume itself, such as pointer input
    /// and focus changes
    fn window_event(&mut self, _engine: &Engine, _clock: &mut Clock, _event: &WindowEvent) {}
}

pub struct SketchApp<S: Sketch> {
    state: AppState<S>,
}

struct Gpu {
    window: Arc<Window>,
    backend: Rc<WgpuBackend>,
    engine: Engine,
}

struct AppState<S: Sketch> {
    config: AppConfig,
    sketch: S,
    clock: Clock,
    gpu: Option<Gpu>,
    error: Option<anyhow::Error>,
}

impl<S: Sketch> SketchApp<S> {
    pub fn new(config: AppConfig, sketch: S) -> Self {
        Self {
            state: AppState {
                config,
                sketch,
                clock: Clock::new(),
                gpu: None,
                error: None,
            },
        }
    }

    /// Runs the event loop until the window closes or setup fails
    pub fn run(mut self) -> anyhow::Result<()> {
        init_logging(self.state.config.logging.clone());

        let event_loop = EventLoop::new().context("failed to create event loop")?;
        event_loop.set_control_flow(ControlFlow::Wait);
        event_loop
            .run_app(&mut self.state)
            .context("event loop terminated abnormally")?;

        match self.state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<S: Sketch> AppState<S> {
    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attributes = WindowAttributes::default()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.width,
                self.config.height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("failed to create window")?,
        );

        let (width, height) = window.inner_size().into();
        let backend = Rc::new(pollster::block_on(WgpuBackend::new(
            window.clone(),
            width,
            height,
            self.config.vsync,
        ))?);

        let assets = Rc::new(FileSource::new(self.config.asset_root.clone()));
        let engine = Engine::new(backend.clone(), assets, self.config.engine.clone());

        self.sketch
            .setup(&engine, &mut self.clock)
            .context("sketch setup failed")?;

        window.request_redraw();
        self.gpu = Some(Gpu {
            window,
            backend,
            engine,
        });
        Ok(())
    }

    /// Hands an event the runtime did not consume to the sketch
    fn forward(&mut self, engine: &Engine, event: &WindowEvent) {
        if let (true, WindowEvent::Focused(focused)) = (self.config.pause_on_blur, event) {
            if *focused {
                self.clock.start();
            } else {
                self.clock.stop();
            }
        }
        self.sketch.window_event(engine, &mut self.clock, event);
    }
}

impl<S: Sketch> ApplicationHandler for AppState<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }

        if let Err(e) = self.init_gpu(event_loop) {
            log::error!("{:#}", e);
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    winit::event::KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                gpu.backend.resize(width, height);
                self.sketch.resized(&gpu.engine, &mut self.clock, width, height);
            }
            WindowEvent::RedrawRequested => {
                self.clock.refresh();
                gpu.backend.present();
                gpu.window.request_redraw();
            }
            other => {
                let engine = gpu.engine.clone();
                self.forward(&engine, &other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{assets::MemorySource, time::TICK};

    /// Pauses on blur and resumes on focus
    struct Pausing;

    impl Sketch for Pausing {
        fn setup(&mut self, _engine: &Engine, _clock: &mut Clock) -> anyhow::Result<()> {
            Ok(())
        }

        fn window_event(&mut self, _engine: &Engine, clock: &mut Clock, event: &WindowEvent) {
            match event {
                WindowEvent::Focused(false) => clock.stop(),
                WindowEvent::Focused(true) => clock.start(),
                _ => {}
            }
        }
    }

    /// Ignores every event
    struct Idle;

    impl Sketch for Idle {
        fn setup(&mut self, _engine: &Engine, _clock: &mut Clock) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn ticks(state: &mut AppState<impl Sketch>) -> Rc<Cell<u32>> {
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        state.clock.on(TICK, move || counter.set(counter.get() + 1));
        count
    }

    fn engine() -> Engine {
        Engine::headless(Rc::new(MemorySource::new()), EngineConfig::default()).0
    }

    #[test]
    fn test_sketch_can_stop_and_start_clock() {
        let mut app = SketchApp::new(AppConfig::default(), Pausing);
        let engine = engine();
        let count = ticks(&mut app.state);

        app.state.clock.refresh();
        assert_eq!(count.get(), 1);

        app.state.forward(&engine, &WindowEvent::Focused(false));
        assert!(!app.state.clock.is_running());
        app.state.clock.refresh();
        assert_eq!(count.get(), 1);

        app.state.forward(&engine, &WindowEvent::Focused(true));
        app.state.clock.refresh();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_pause_on_blur_config() {
        let config = AppConfig {
            pause_on_blur: true,
            ..Default::default()
        };
        let mut app = SketchApp::new(config, Idle);
        let engine = engine();
        let count = ticks(&mut app.state);

        app.state.forward(&engine, &WindowEvent::Focused(false));
        app.state.clock.refresh();
        assert_eq!(count.get(), 0);

        app.state.forward(&engine, &WindowEvent::Focused(true));
        app.state.clock.refresh();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_blur_keeps_clock_running_by_default() {
        let mut app = SketchApp::new(AppConfig::default(), Idle);
        let engine = engine();
        let count = ticks(&mut app.state);

        app.state.forward(&engine, &WindowEvent::Focused(false));
        app.state.clock.refresh();
        assert_eq!(count.get(), 1);
    }
}
