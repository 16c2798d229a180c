//! Sketch lifecycle and the dithering frame driver.
//!
//! A sketch is driven through five callbacks: `on_load` once before anything
//! is shown, `on_setup` once the window exists, `on_frame` on every scheduled
//! redraw, and `on_resize`/`on_key_press` as window events arrive. Every
//! callback receives a [`SketchHost`], the drawing surface the sketch issues
//! commands against. The windowed runtime passes the wgpu-backed host; tests
//! pass a recording double.
//!
//! ```text
//!   Uninitialized ──on_load ok──▶ Loaded ──on_setup──▶ Running ◀─┐
//!         │                                              │      │
//!         └──on_load err──▶ Failed                       └──────┘
//!                                               on_resize / on_key_press
//! ```
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::runtime::BoxedTimeSource;
use crate::types::SketchSettings;

/// Uniform carrying the drawable size in pixels.
pub const RESOLUTION_UNIFORM: &str = "u_resolution";
/// Uniform carrying seconds elapsed since setup.
pub const TIME_UNIFORM: &str = "u_time";

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Drawable size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, as reported for minimised windows.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Opaque reference to a compiled shader program owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(usize);

impl ProgramHandle {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Opaque reference to a decoded texture owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    index: usize,
    width: u32,
    height: u32,
}

impl TextureHandle {
    pub fn new(index: usize, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Vec2([f32; 2]),
    Float(f32),
    Texture(TextureHandle),
}

/// Logical key delivered to [`Sketch::on_key_press`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// A key that produces text, with case and layout already applied.
    Character(char),
    /// Any other key, by name (`"Escape"`, `"ArrowUp"`, ...).
    Named(String),
}

#[derive(Debug, Error)]
pub enum SketchError {
    #[error("failed to load {resource}")]
    Load {
        resource: String,
        #[source]
        source: BoxError,
    },

    #[error("sketch resources are not loaded")]
    NotLoaded,

    #[error("failed to save snapshot")]
    Snapshot {
        #[source]
        source: BoxError,
    },
}

impl SketchError {
    pub fn load(resource: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Load {
            resource: resource.into(),
            source: source.into(),
        }
    }

    pub fn snapshot(source: impl Into<BoxError>) -> Self {
        Self::Snapshot {
            source: source.into(),
        }
    }
}

/// Drawing surface a sketch issues commands against.
pub trait SketchHost {
    /// Compiles and links a vertex/fragment shader pair.
    fn load_program(&mut self, vertex: &Path, fragment: &Path)
        -> Result<ProgramHandle, SketchError>;
    /// Decodes an image file into a texture.
    fn load_texture(&mut self, path: &Path) -> Result<TextureHandle, SketchError>;
    /// Creates the shader-capable canvas at `size`.
    ///
    /// Returns the size actually allocated, which is smaller than `size` when
    /// it exceeds the device limits.
    fn create_surface(&mut self, size: SurfaceSize) -> SurfaceSize;
    /// Disables outline stroking of subsequent shapes.
    fn no_stroke(&mut self);
    fn set_frame_rate(&mut self, fps: f32);
    /// Resizes the canvas; returns the allocated size like
    /// [`SketchHost::create_surface`].
    fn resize_surface(&mut self, size: SurfaceSize) -> SurfaceSize;
    /// Clears the canvas to an opaque gray level.
    fn background(&mut self, gray: u8);
    fn bind_program(&mut self, program: ProgramHandle);
    fn set_uniform(&mut self, name: &str, value: UniformValue);
    /// Draws an axis-aligned rectangle with the bound program, in pixels from
    /// the top-left corner.
    fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    /// Writes the current canvas to disk using the default naming scheme.
    fn save_snapshot(&mut self) -> Result<PathBuf, SketchError>;
}

/// Lifecycle callbacks driven by the window runtime.
pub trait Sketch {
    fn on_load(&mut self, host: &mut dyn SketchHost) -> Result<(), SketchError>;
    fn on_setup(&mut self, host: &mut dyn SketchHost, size: SurfaceSize)
        -> Result<(), SketchError>;
    fn on_frame(&mut self, host: &mut dyn SketchHost);
    fn on_resize(&mut self, host: &mut dyn SketchHost, size: SurfaceSize);
    /// Returns the snapshot path when the key triggered an export.
    fn on_key_press(
        &mut self,
        host: &mut dyn SketchHost,
        key: &Key,
    ) -> Result<Option<PathBuf>, SketchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SketchState {
    Uninitialized,
    Loaded,
    Running,
    Failed,
}

struct Resources {
    program: ProgramHandle,
    textures: Vec<(String, TextureHandle)>,
}

enum Phase {
    Uninitialized,
    Loaded(Resources),
    Running(Resources),
    Failed,
}

/// Frame driver for the dithering sketch.
///
/// Owns the program and texture handles, the current surface size, and the
/// clock feeding `u_time`. Every frame clears the canvas, binds the program,
/// sets `u_resolution`, `u_time`, and each texture uniform, then covers the
/// canvas with one rectangle.
pub struct DitherSketch {
    settings: SketchSettings,
    clock: BoxedTimeSource,
    phase: Phase,
    /// Drawable size, as allocated by the host.
    size: SurfaceSize,
    /// Last window size the sketch was asked to fill.
    requested: SurfaceSize,
    last_time: f32,
}

impl DitherSketch {
    pub fn new(settings: SketchSettings, clock: BoxedTimeSource) -> Self {
        Self {
            settings,
            clock,
            phase: Phase::Uninitialized,
            size: SurfaceSize::new(0, 0),
            requested: SurfaceSize::new(0, 0),
            last_time: 0.0,
        }
    }

    pub fn state(&self) -> SketchState {
        match self.phase {
            Phase::Uninitialized => SketchState::Uninitialized,
            Phase::Loaded(_) => SketchState::Loaded,
            Phase::Running(_) => SketchState::Running,
            Phase::Failed => SketchState::Failed,
        }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    fn load_resources(&self, host: &mut dyn SketchHost) -> Result<Resources, SketchError> {
        let program =
            host.load_program(&self.settings.vertex_shader, &self.settings.fragment_shader)?;
        let mut textures = Vec::with_capacity(self.settings.textures.len());
        for binding in &self.settings.textures {
            let handle = host.load_texture(&binding.path)?;
            debug!(
                uniform = %binding.name,
                path = %binding.path.display(),
                width = handle.width,
                height = handle.height,
                "loaded sketch texture"
            );
            textures.push((binding.name.clone(), handle));
        }
        Ok(Resources { program, textures })
    }
}

impl Sketch for DitherSketch {
    fn on_load(&mut self, host: &mut dyn SketchHost) -> Result<(), SketchError> {
        match self.phase {
            Phase::Uninitialized => {}
            Phase::Failed => return Err(SketchError::NotLoaded),
            Phase::Loaded(_) | Phase::Running(_) => {
                debug!("sketch resources already loaded");
                return Ok(());
            }
        }

        match self.load_resources(host) {
            Ok(resources) => {
                info!(
                    textures = resources.textures.len(),
                    "sketch resources loaded"
                );
                self.phase = Phase::Loaded(resources);
                Ok(())
            }
            Err(err) => {
                self.phase = Phase::Failed;
                Err(err)
            }
        }
    }

    fn on_setup(
        &mut self,
        host: &mut dyn SketchHost,
        size: SurfaceSize,
    ) -> Result<(), SketchError> {
        let resources = match std::mem::replace(&mut self.phase, Phase::Failed) {
            Phase::Loaded(resources) => resources,
            Phase::Running(resources) => {
                self.phase = Phase::Running(resources);
                debug!("sketch already set up");
                return Ok(());
            }
            other => {
                self.phase = other;
                return Err(SketchError::NotLoaded);
            }
        };

        self.requested = size;
        self.size = host.create_surface(size);
        host.no_stroke();
        host.set_frame_rate(self.settings.frame_rate);
        self.clock.reset();
        self.last_time = 0.0;
        self.phase = Phase::Running(resources);
        info!(size = %self.size, fps = self.settings.frame_rate, "sketch running");
        Ok(())
    }

    fn on_frame(&mut self, host: &mut dyn SketchHost) {
        let Phase::Running(resources) = &self.phase else {
            return;
        };

        let sample = self.clock.sample();
        let seconds = sample.seconds.max(self.last_time);
        self.last_time = seconds;

        let width = self.size.width as f32;
        let height = self.size.height as f32;

        host.background(self.settings.background);
        host.bind_program(resources.program);
        host.set_uniform(RESOLUTION_UNIFORM, UniformValue::Vec2([width, height]));
        host.set_uniform(TIME_UNIFORM, UniformValue::Float(seconds));
        for (name, texture) in &resources.textures {
            host.set_uniform(name, UniformValue::Texture(*texture));
        }
        host.draw_rect(0.0, 0.0, width, height);
    }

    fn on_resize(&mut self, host: &mut dyn SketchHost, size: SurfaceSize) {
        if size.is_empty() {
            debug!(%size, "ignoring empty resize");
            return;
        }
        if size == self.requested {
            return;
        }
        self.requested = size;
        self.size = if matches!(self.phase, Phase::Running(_)) {
            host.resize_surface(size)
        } else {
            size
        };
        if self.size != size {
            debug!(requested = %size, allocated = %self.size, "surface smaller than window");
        }
    }

    fn on_key_press(
        &mut self,
        host: &mut dyn SketchHost,
        key: &Key,
    ) -> Result<Option<PathBuf>, SketchError> {
        if *key != Key::Character(self.settings.snapshot_key) {
            return Ok(None);
        }
        if !matches!(self.phase, Phase::Running(_)) {
            warn!("snapshot requested before the sketch is running");
            return Ok(None);
        }
        host.save_snapshot().map(Some)
    }
}
