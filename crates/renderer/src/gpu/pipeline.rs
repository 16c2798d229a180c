use anyhow::{bail, Result};
use bytemuck::{Pod, Zeroable};
use wgpu::naga::ShaderStage;
use wgpu::util::DeviceExt;

use crate::compile::{compile_stage, WrappedProgram};
use crate::types::ShaderCompiler;

use super::textures::SketchTexture;

/// One corner of the unit rectangle: `aPosition` then `aTexCoord`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RectVertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
}

unsafe impl Zeroable for RectVertex {}
unsafe impl Pod for RectVertex {}

const fn corner(x: f32, y: f32) -> RectVertex {
    RectVertex {
        position: [x, y, 0.0],
        tex_coord: [x, y],
    }
}

/// Two triangles spanning `[0, 1]` in both axes, texture coordinates equal to
/// positions.
pub(crate) const UNIT_RECT: [RectVertex; 6] = [
    corner(0.0, 0.0),
    corner(1.0, 0.0),
    corner(1.0, 1.0),
    corner(0.0, 0.0),
    corner(1.0, 1.0),
    corner(0.0, 1.0),
];

const RECT_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

fn rect_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<RectVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &RECT_ATTRIBUTES,
    }
}

/// Layouts and geometry shared by every program.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub rect_vertices: wgpu::Buffer,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sketch uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let rect_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("unit rectangle"),
            contents: bytemuck::cast_slice(&UNIT_RECT),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            uniform_layout,
            rect_vertices,
        }
    }
}

/// A linked sketch program: render pipeline plus the sampler names bound at
/// set 1, in binding order.
pub(crate) struct ShaderProgram {
    pub pipeline: wgpu::RenderPipeline,
    pub texture_layout: wgpu::BindGroupLayout,
    pub samplers: Vec<String>,
}

impl ShaderProgram {
    pub fn new(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        program: &WrappedProgram,
        target_format: wgpu::TextureFormat,
        sample_count: u32,
        compiler: ShaderCompiler,
    ) -> Result<Self> {
        let vertex_module = compile_stage(
            device,
            "sketch vertex shader",
            &program.vertex,
            ShaderStage::Vertex,
            compiler,
        )?;
        let fragment_module = compile_stage(
            device,
            "sketch fragment shader",
            &program.fragment,
            ShaderStage::Fragment,
            compiler,
        )?;

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sketch texture layout"),
            entries: &build_texture_layout_entries(program.samplers.len()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sketch pipeline layout"),
            bind_group_layouts: &[&layouts.uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sketch pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[rect_vertex_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            bail!("failed to link sketch program: {error}");
        }

        Ok(Self {
            pipeline,
            texture_layout,
            samplers: program.samplers.clone(),
        })
    }

    /// Builds the set 1 bind group from one texture per sampler, in binding
    /// order.
    pub fn bind_textures(
        &self,
        device: &wgpu::Device,
        textures: &[&SketchTexture],
    ) -> Result<wgpu::BindGroup> {
        if textures.len() != self.samplers.len() {
            bail!(
                "program declares {} samplers but {} textures were supplied",
                self.samplers.len(),
                textures.len()
            );
        }
        let entries = build_texture_entries(textures);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sketch texture bind group"),
            layout: &self.texture_layout,
            entries: &entries,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            bail!("failed to bind sketch textures: {error}");
        }
        Ok(bind_group)
    }
}

pub(crate) fn build_texture_entries<'a>(
    textures: &[&'a SketchTexture],
) -> Vec<wgpu::BindGroupEntry<'a>> {
    let mut entries = Vec::with_capacity(textures.len() * 2);
    for (index, texture) in textures.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2,
            resource: wgpu::BindingResource::TextureView(&texture.view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2 + 1,
            resource: wgpu::BindingResource::Sampler(&texture.sampler),
        });
    }
    entries
}

pub(crate) fn build_texture_layout_entries(count: usize) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(count * 2);
    for index in 0..count as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2 + 1,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_vertices_are_tightly_packed() {
        assert_eq!(std::mem::size_of::<RectVertex>(), 20);
        assert_eq!(rect_vertex_layout().array_stride, 20);
        assert_eq!(RECT_ATTRIBUTES[1].offset, 12);
        assert_eq!(RECT_ATTRIBUTES[1].shader_location, 1);
    }

    #[test]
    fn unit_rect_covers_the_unit_square() {
        for vertex in UNIT_RECT {
            assert_eq!(&vertex.position[..2], &vertex.tex_coord[..]);
        }
        let corners: Vec<[f32; 2]> = UNIT_RECT.iter().map(|vertex| vertex.tex_coord).collect();
        for expected in [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]] {
            assert!(corners.contains(&expected), "missing corner {expected:?}");
        }
    }

    #[test]
    fn texture_layout_pairs_views_and_samplers() {
        let entries = build_texture_layout_entries(3);
        let bindings: Vec<u32> = entries.iter().map(|entry| entry.binding).collect();
        assert_eq!(bindings, vec![0, 1, 2, 3, 4, 5]);
        assert!(matches!(entries[4].ty, wgpu::BindingType::Texture { .. }));
        assert!(matches!(entries[5].ty, wgpu::BindingType::Sampler(_)));
        assert!(build_texture_layout_entries(0).is_empty());
    }
}
