//! Renderer crate for dithersketch.
//!
//! Glues the sketch lifecycle, the winit window, the `wgpu` backend, and the
//! GLSL wrapper together. The overall flow is:
//!
//! ```text
//!   CLI / dithersketch
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ DitherSketch::on_frame
//!                                                              │
//!                                          SketchHost commands ▼
//!                                                          GpuState ──▶ canvas ──▶ swapchain
//! ```
//!
//! [`DitherSketch`] decides *what* is drawn each frame and talks to the GPU
//! only through the [`SketchHost`] trait, so its behaviour can be tested with
//! a recording host. The sketch shaders are written in the browser GLSL
//! dialect and wrapped at load time so they compile as Vulkan GLSL with the
//! expected uniform and texture bindings.

mod compile;
mod gpu;
pub mod runtime;
pub mod sketch;
pub mod snapshot;
pub mod types;
mod window;

use anyhow::Result;

pub use runtime::{FixedTimeSource, FrameScheduler, SystemTimeSource, TimeSample, TimeSource};
pub use sketch::{
    DitherSketch, Key, ProgramHandle, Sketch, SketchError, SketchHost, SketchState, SurfaceSize,
    TextureHandle, UniformValue,
};
pub use types::{
    default_texture_bindings, Antialiasing, ColorSpaceMode, RendererConfig, ShaderCompiler,
    SketchSettings, TextureBinding,
};

/// High-level entry point that owns the configuration.
#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    /// Builds a renderer for the supplied configuration.
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Opens the sketch window and blocks until it is closed.
    ///
    /// Fails before the first frame when the GPU cannot be initialised or any
    /// sketch resource fails to load.
    pub fn run(self) -> Result<()> {
        tracing::info!(
            vertex = %self.config.sketch.vertex_shader.display(),
            fragment = %self.config.sketch.fragment_shader.display(),
            compiler = %self.config.shader_compiler,
            "starting sketch"
        );
        window::run_window(self.config)
    }
}
