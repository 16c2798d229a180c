use bytemuck::{Pod, Zeroable};

use super::context::SurfaceColorSpace;

pub(crate) type Mat4 = [[f32; 4]; 4];

pub(crate) const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// CPU mirror of the `SketchParams` block injected by `compile.rs`.
///
/// Matrices are column-major, as GLSL expects.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SketchUniforms {
    pub projection: Mat4,
    pub model_view: Mat4,
    pub resolution: [f32; 2],
    pub time: f32,
    pub _padding0: f32,
}

unsafe impl Zeroable for SketchUniforms {}
unsafe impl Pod for SketchUniforms {}

impl SketchUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            projection: IDENTITY,
            model_view: IDENTITY,
            resolution: [width as f32, height as f32],
            time: 0.0,
            _padding0: 0.0,
        }
    }

    pub fn set_resolution(&mut self, resolution: [f32; 2]) {
        self.resolution = resolution;
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.time = seconds;
    }

    /// Positions the unit-rectangle geometry at `(x, y, width, height)` on a
    /// canvas of `canvas` pixels.
    pub fn set_rect(&mut self, canvas: (u32, u32), x: f32, y: f32, width: f32, height: f32) {
        let (projection, model_view) = rect_matrices(canvas, x, y, width, height);
        self.projection = projection;
        self.model_view = model_view;
    }
}

/// Projection and model-view matrices for a pixel-space rectangle.
///
/// The model-view scales the unit square to `width x height` and moves it to
/// `(x, y)`; the projection maps canvas pixels (origin top-left, y down) onto
/// clip space.
pub(crate) fn rect_matrices(
    canvas: (u32, u32),
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) -> (Mat4, Mat4) {
    let canvas_w = canvas.0.max(1) as f32;
    let canvas_h = canvas.1.max(1) as f32;
    let projection = [
        [2.0 / canvas_w, 0.0, 0.0, 0.0],
        [0.0, -2.0 / canvas_h, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [-1.0, 1.0, 0.0, 1.0],
    ];
    let model_view = [
        [width, 0.0, 0.0, 0.0],
        [0.0, height, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [x, y, 0.0, 1.0],
    ];
    (projection, model_view)
}

/// Clear colour for an opaque gray `background(level)` call.
///
/// sRGB surfaces encode on write, so the level is converted to linear first
/// to land on the same stored byte as a gamma surface.
pub(crate) fn gray_to_clear_color(level: u8, color_space: SurfaceColorSpace) -> wgpu::Color {
    let encoded = f64::from(level) / 255.0;
    let value = match color_space {
        SurfaceColorSpace::Gamma => encoded,
        SurfaceColorSpace::Linear => srgb_to_linear(encoded),
    };
    wgpu::Color {
        r: value,
        g: value,
        b: value,
        a: 1.0,
    }
}

fn srgb_to_linear(value: f64) -> f64 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}
