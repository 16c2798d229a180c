//! wgpu backend behind the [`SketchHost`](crate::sketch::SketchHost) trait.
//!
//! - `context` owns the instance, surface, device, and queue, and picks the
//!   MSAA sample count and surface encoding.
//! - `textures` decodes sketch images into nearest-sampled, repeating
//!   textures.
//! - `pipeline` links wrapped GLSL into render pipelines over a shared
//!   unit-rectangle vertex buffer.
//! - `uniforms` mirrors the injected std140 parameter block.
//! - `canvas` keeps the persistent offscreen canvas and presents it.
//! - `capture` reads the canvas back for snapshots.
//! - `state` glues everything together as `GpuState`, used by `window`.

mod canvas;
mod capture;
mod context;
mod pipeline;
mod state;
mod textures;
mod uniforms;

pub(crate) use state::GpuState;
