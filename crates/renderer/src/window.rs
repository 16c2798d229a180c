use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info, trace, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::Key as WinitKey;
use winit::window::{Window, WindowBuilder};

use crate::gpu::GpuState;
use crate::runtime::{time_source_for, FrameScheduler};
use crate::sketch::{DitherSketch, Key, Sketch, SurfaceSize};
use crate::types::RendererConfig;

/// Everything the event loop owns.
///
/// Field order matters: the GPU state holds a surface created from the
/// window's raw handles and must drop first.
struct WindowState {
    gpu: GpuState,
    sketch: DitherSketch,
    scheduler: FrameScheduler,
    window: Arc<Window>,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let mut gpu = GpuState::new(window.as_ref(), window.inner_size(), config)
            .context("failed to initialise GPU renderer")?;

        let mut sketch = DitherSketch::new(config.sketch.clone(), time_source_for(config));
        sketch
            .on_load(&mut gpu)
            .context("failed to load sketch")?;

        let size = gpu.size();
        sketch
            .on_setup(&mut gpu, SurfaceSize::new(size.width, size.height))
            .context("failed to set up sketch")?;

        let fps = gpu
            .take_frame_rate_request()
            .unwrap_or(config.sketch.frame_rate);
        Ok(Self {
            gpu,
            sketch,
            scheduler: FrameScheduler::new(fps),
            window,
        })
    }

    fn redraw(&mut self) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        self.gpu.begin_frame();
        self.sketch.on_frame(&mut self.gpu);
        let result = self.gpu.end_frame();
        if result.is_ok() {
            self.scheduler.mark_rendered(now);
        }
        if let Some(fps) = self.gpu.take_frame_rate_request() {
            debug!(fps, "frame rate changed");
            self.scheduler.set_target_fps(fps);
        }
        result
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.sketch
            .on_resize(&mut self.gpu, SurfaceSize::new(size.width, size.height));
    }

    fn key_pressed(&mut self, key: Key) {
        match self.sketch.on_key_press(&mut self.gpu, &key) {
            Ok(Some(path)) => info!(path = %path.display(), "saved snapshot"),
            Ok(None) => trace!(?key, "key ignored"),
            Err(err) => {
                let report = anyhow::Error::new(err);
                error!("{report:#}");
            }
        }
    }
}

/// Translates a winit logical key into the sketch's key type.
///
/// Text keys carry their produced character; keys producing more than one
/// character (compose sequences) and dead keys are dropped.
pub(crate) fn map_key(key: &WinitKey) -> Option<Key> {
    match key {
        WinitKey::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(character), None) => Some(Key::Character(character)),
                _ => None,
            }
        }
        WinitKey::Named(named) => Some(Key::Named(format!("{named:?}"))),
        _ => None,
    }
}

/// Opens the sketch window and drives it until the window closes.
pub(crate) fn run_window(config: RendererConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create sketch window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, &config)?;
    info!(
        size = %SurfaceSize::new(state.gpu.size().width, state.gpu.size().height),
        interval_ms = state.scheduler.interval().as_millis(),
        "sketch window ready"
    );
    state.window.request_redraw();

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                    WindowEvent::Resized(new_size) => state.resize(new_size),
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state == ElementState::Pressed && !event.repeat {
                            if let Some(key) = map_key(&event.logical_key) {
                                state.key_pressed(key);
                            }
                        }
                    }
                    WindowEvent::RedrawRequested => match state.redraw() {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            debug!("surface lost or outdated; reconfiguring");
                            state.gpu.reconfigure();
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("surface out of memory; exiting");
                            elwt.exit();
                        }
                        Err(wgpu::SurfaceError::Timeout) => {
                            warn!("surface timeout; retrying next frame");
                        }
                        Err(other) => {
                            warn!(error = ?other, "surface error; retrying next frame");
                        }
                    },
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = Instant::now();
                if state.scheduler.ready_for_frame(now) {
                    trace!("scheduler: issuing redraw now");
                    state.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = state.scheduler.next_deadline() {
                    trace!(
                        deadline_ms = deadline.saturating_duration_since(now).as_millis(),
                        "scheduler: waiting until next frame"
                    );
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
