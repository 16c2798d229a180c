use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, trace, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::compile::wrap_program;
use crate::sketch::{
    ProgramHandle, SketchError, SketchHost, SurfaceSize, TextureHandle, UniformValue,
    RESOLUTION_UNIFORM, TIME_UNIFORM,
};
use crate::snapshot::next_snapshot_path;
use crate::types::{RendererConfig, ShaderCompiler};

use super::canvas::{CanvasTarget, Presenter};
use super::capture::capture_texture;
use super::context::GpuContext;
use super::pipeline::{PipelineLayouts, ShaderProgram};
use super::textures::{create_placeholder_texture, load_texture, SketchTexture};
use super::uniforms::{gray_to_clear_color, SketchUniforms};

/// A linked program and the texture bound to each of its samplers.
struct ProgramEntry {
    program: ShaderProgram,
    slots: Vec<Option<usize>>,
}

type BindGroupKey = (usize, Vec<Option<usize>>);

/// Frames-per-second bookkeeping for the periodic stats log.
#[derive(Debug)]
pub(crate) struct RenderStats {
    window_start: Instant,
    frames_in_window: u32,
    total_frames: u64,
}

impl RenderStats {
    pub(crate) const WINDOW: Duration = Duration::from_secs(1);

    pub(crate) fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames_in_window: 0,
            total_frames: 0,
        }
    }

    /// Counts a presented frame; returns the measured rate once per window.
    pub(crate) fn record(&mut self, now: Instant) -> Option<f32> {
        self.frames_in_window += 1;
        self.total_frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Self::WINDOW {
            return None;
        }
        let fps = self.frames_in_window as f32 / elapsed.as_secs_f32();
        self.window_start = now;
        self.frames_in_window = 0;
        Some(fps)
    }

    pub(crate) fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

/// wgpu-backed [`SketchHost`].
///
/// Commands recorded between [`GpuState::begin_frame`] and
/// [`GpuState::end_frame`] render into the offscreen canvas; `end_frame`
/// presents the canvas to the window.
pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PipelineLayouts,
    presenter: Presenter,
    canvas: CanvasTarget,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: SketchUniforms,
    shader_compiler: ShaderCompiler,
    programs: Vec<ProgramEntry>,
    textures: Vec<SketchTexture>,
    placeholder: SketchTexture,
    bind_groups: HashMap<BindGroupKey, wgpu::BindGroup>,
    bound_program: Option<usize>,
    pending_clear: Option<wgpu::Color>,
    encoder: Option<wgpu::CommandEncoder>,
    warned: HashSet<String>,
    snapshot_dir: PathBuf,
    frame_rate_request: Option<f32>,
    stats: RenderStats,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        config: &RendererConfig,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(
            target,
            initial_size,
            config.antialiasing,
            config.color_space,
        )?;
        let layouts = PipelineLayouts::new(&context.device);
        let presenter = Presenter::new(
            &context.device,
            context.surface_format,
            context.sample_count,
        );
        let canvas = presenter.create_canvas(
            &context.device,
            (context.size.width, context.size.height),
        );

        let uniforms = SketchUniforms::new(context.size.width, context.size.height);
        let uniform_buffer = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sketch uniform buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("sketch uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });
        let placeholder = create_placeholder_texture(&context.device, &context.queue);

        Ok(Self {
            context,
            layouts,
            presenter,
            canvas,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
            shader_compiler: config.shader_compiler,
            programs: Vec::new(),
            textures: Vec::new(),
            placeholder,
            bind_groups: HashMap::new(),
            bound_program: None,
            pending_clear: None,
            encoder: None,
            warned: HashSet::new(),
            snapshot_dir: config.snapshot_dir.clone(),
            frame_rate_request: None,
            stats: RenderStats::new(Instant::now()),
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    /// Frame rate most recently requested by the sketch, if not yet taken.
    pub(crate) fn take_frame_rate_request(&mut self) -> Option<f32> {
        self.frame_rate_request.take()
    }

    /// Re-applies the swapchain configuration after a lost or outdated
    /// surface.
    pub(crate) fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    pub(crate) fn begin_frame(&mut self) {
        if self.encoder.is_none() {
            self.encoder = Some(self.create_encoder());
        }
    }

    /// Submits the frame's canvas work and presents the canvas.
    ///
    /// Canvas work is submitted even when the swapchain image cannot be
    /// acquired, so snapshots always see the latest frame.
    pub(crate) fn end_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        if let Some(color) = self.pending_clear.take() {
            let mut encoder = self.take_encoder();
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sketch clear pass"),
                color_attachments: &[Some(
                    self.canvas.color_attachment(wgpu::LoadOp::Clear(color)),
                )],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.encoder = Some(encoder);
        }

        let mut encoder = self.take_encoder();
        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                self.context.queue.submit(std::iter::once(encoder.finish()));
                return Err(err);
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.presenter.present(&mut encoder, &self.canvas, &view);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        if let Some(fps) = self.stats.record(Instant::now()) {
            debug!(
                fps = fps.round(),
                frame_count = self.stats.total_frames(),
                time = self.uniforms.time,
                size = ?self.context.size,
                "render stats"
            );
        }
        Ok(())
    }

    fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sketch frame encoder"),
            })
    }

    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        match self.encoder.take() {
            Some(encoder) => encoder,
            None => self.create_encoder(),
        }
    }

    fn warn_once(&mut self, key: String, message: &str) {
        if self.warned.insert(key.clone()) {
            warn!(uniform = %key, "{message}");
        }
    }

    /// Resizes the swapchain and canvas; returns the canvas size, which the
    /// device limits may clamp below `size`.
    fn resize_canvas(&mut self, size: SurfaceSize) -> SurfaceSize {
        if !size.is_empty() {
            self.context
                .resize(PhysicalSize::new(size.width, size.height));
        }
        let dimensions = (self.context.size.width, self.context.size.height);
        if self.canvas.dimensions() != dimensions {
            self.canvas = self
                .presenter
                .create_canvas(&self.context.device, dimensions);
            debug!(width = dimensions.0, height = dimensions.1, "recreated canvas");
        }
        let (width, height) = self.canvas.dimensions();
        SurfaceSize::new(width, height)
    }

    fn texture_bind_group(&mut self, program: usize) -> Result<wgpu::BindGroup> {
        let entry = self
            .programs
            .get(program)
            .context("bound program no longer exists")?;
        let key = (program, entry.slots.clone());
        if let Some(bind_group) = self.bind_groups.get(&key) {
            return Ok(bind_group.clone());
        }

        let textures: Vec<&SketchTexture> = entry
            .slots
            .iter()
            .map(|slot| {
                slot.and_then(|index| self.textures.get(index))
                    .unwrap_or(&self.placeholder)
            })
            .collect();
        let bind_group = entry
            .program
            .bind_textures(&self.context.device, &textures)?;
        self.bind_groups.insert(key, bind_group.clone());
        Ok(bind_group)
    }

    fn load_program_inner(&mut self, vertex: &Path, fragment: &Path) -> Result<usize> {
        let vertex_source = std::fs::read_to_string(vertex)
            .with_context(|| format!("failed to read vertex shader {}", vertex.display()))?;
        let fragment_source = std::fs::read_to_string(fragment)
            .with_context(|| format!("failed to read fragment shader {}", fragment.display()))?;
        let wrapped = wrap_program(&vertex_source, &fragment_source)?;
        let program = ShaderProgram::new(
            &self.context.device,
            &self.layouts,
            &wrapped,
            self.presenter.format(),
            self.presenter.sample_count(),
            self.shader_compiler,
        )?;
        let slots = vec![None; program.samplers.len()];
        debug!(
            samplers = ?program.samplers,
            compiler = %self.shader_compiler,
            "linked sketch program"
        );
        self.programs.push(ProgramEntry { program, slots });
        Ok(self.programs.len() - 1)
    }

    fn write_snapshot(&mut self) -> Result<PathBuf> {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
        let image = capture_texture(
            &self.context.device,
            &self.context.queue,
            self.canvas.texture(),
        )?;
        std::fs::create_dir_all(&self.snapshot_dir).with_context(|| {
            format!(
                "failed to create snapshot directory {}",
                self.snapshot_dir.display()
            )
        })?;
        let path = next_snapshot_path(&self.snapshot_dir, chrono::Local::now());
        image
            .save(&path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        Ok(path)
    }
}

impl SketchHost for GpuState {
    fn load_program(
        &mut self,
        vertex: &Path,
        fragment: &Path,
    ) -> Result<ProgramHandle, SketchError> {
        self.load_program_inner(vertex, fragment)
            .map(ProgramHandle::new)
            .map_err(|err| {
                SketchError::load(
                    format!("program {} + {}", vertex.display(), fragment.display()),
                    err,
                )
            })
    }

    fn load_texture(&mut self, path: &Path) -> Result<TextureHandle, SketchError> {
        let texture = load_texture(
            &self.context.device,
            &self.context.queue,
            path,
            self.context.max_texture_dimension,
        )
        .map_err(|err| SketchError::load(path.display().to_string(), err))?;
        let handle = TextureHandle::new(self.textures.len(), texture.width, texture.height);
        self.textures.push(texture);
        Ok(handle)
    }

    fn create_surface(&mut self, size: SurfaceSize) -> SurfaceSize {
        self.resize_canvas(size)
    }

    fn no_stroke(&mut self) {
        trace!("rectangles are drawn without outlines");
    }

    fn set_frame_rate(&mut self, fps: f32) {
        self.frame_rate_request = Some(fps);
    }

    fn resize_surface(&mut self, size: SurfaceSize) -> SurfaceSize {
        self.resize_canvas(size)
    }

    fn background(&mut self, gray: u8) {
        self.pending_clear = Some(gray_to_clear_color(gray, self.context.color_space));
    }

    fn bind_program(&mut self, program: ProgramHandle) {
        if program.index() < self.programs.len() {
            self.bound_program = Some(program.index());
        } else {
            warn!(program = program.index(), "ignoring unknown program handle");
        }
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        match (name, value) {
            (RESOLUTION_UNIFORM, UniformValue::Vec2(resolution)) => {
                self.uniforms.set_resolution(resolution);
            }
            (TIME_UNIFORM, UniformValue::Float(seconds)) => self.uniforms.set_time(seconds),
            (_, UniformValue::Texture(texture)) => {
                let Some(program) = self.bound_program else {
                    self.warn_once(name.to_string(), "texture uniform set with no program bound");
                    return;
                };
                let Some(entry) = self.programs.get_mut(program) else {
                    return;
                };
                let slot = entry.program.samplers.iter().position(|sampler| sampler == name);
                match slot {
                    Some(slot) => entry.slots[slot] = Some(texture.index()),
                    None => {
                        self.warn_once(name.to_string(), "program does not declare this sampler")
                    }
                }
            }
            _ => self.warn_once(name.to_string(), "unsupported uniform or value type"),
        }
    }

    fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let Some(program) = self.bound_program else {
            self.warn_once("<none>".to_string(), "draw_rect called with no program bound");
            return;
        };
        let bind_group = match self.texture_bind_group(program) {
            Ok(bind_group) => bind_group,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "skipping rectangle");
                return;
            }
        };

        self.uniforms
            .set_rect(self.canvas.dimensions(), x, y, width, height);
        let staging = self
            .context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sketch uniform staging"),
                contents: bytemuck::bytes_of(&self.uniforms),
                usage: wgpu::BufferUsages::COPY_SRC,
            });

        let load = match self.pending_clear.take() {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        let mut encoder = self.take_encoder();
        encoder.copy_buffer_to_buffer(
            &staging,
            0,
            &self.uniform_buffer,
            0,
            std::mem::size_of::<SketchUniforms>() as u64,
        );
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sketch rect pass"),
                color_attachments: &[Some(self.canvas.color_attachment(load))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.programs[program].program.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &bind_group, &[]);
            pass.set_vertex_buffer(0, self.layouts.rect_vertices.slice(..));
            pass.draw(0..6, 0..1);
        }
        self.encoder = Some(encoder);
    }

    fn save_snapshot(&mut self) -> Result<PathBuf, SketchError> {
        self.write_snapshot().map_err(SketchError::snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_report_once_per_window() {
        let start = Instant::now();
        let mut stats = RenderStats::new(start);
        for frame in 1..30 {
            let now = start + Duration::from_millis(frame * 33);
            assert_eq!(stats.record(now), None);
        }
        let fps = stats
            .record(start + Duration::from_millis(1000))
            .expect("window elapsed");
        assert!((fps - 30.0).abs() < 0.01, "{fps}");
        assert_eq!(stats.total_frames(), 30);
        assert_eq!(stats.record(start + Duration::from_millis(1033)), None);
    }
}
