use std::path::PathBuf;

/// A sampler uniform and the image that backs it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureBinding {
    /// `uniform sampler2D` name declared by the fragment shader.
    pub name: String,
    /// Image file decoded into the texture at load time.
    pub path: PathBuf,
}

impl TextureBinding {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// The three threshold maps the stock dithering shader samples.
pub fn default_texture_bindings() -> Vec<TextureBinding> {
    vec![
        TextureBinding::new("bayer8x8", "images/bayer8.png"),
        TextureBinding::new("bayer16x16", "images/bayer16.png"),
        TextureBinding::new("blueNoise64x64", "images/blue_noise64.png"),
    ]
}

/// What the sketch loads and how each frame is drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct SketchSettings {
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// Textures bound by uniform name every frame, in this order.
    pub textures: Vec<TextureBinding>,
    /// Target frames per second.
    pub frame_rate: f32,
    /// Gray level the surface is cleared to before drawing.
    pub background: u8,
    /// Character that triggers a snapshot export.
    pub snapshot_key: char,
}

impl Default for SketchSettings {
    fn default() -> Self {
        Self {
            vertex_shader: PathBuf::from("shader.vert"),
            fragment_shader: PathBuf::from("shader.frag"),
            textures: default_texture_bindings(),
            frame_rate: 30.0,
            background: 51,
            snapshot_key: 's',
        }
    }
}

/// Shader compilation backend requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderCompiler {
    /// Compile wrapped GLSL through shaderc into SPIR-V.
    Shaderc,
    /// Hand GLSL to naga's built-in frontend.
    NagaGlsl,
}

impl Default for ShaderCompiler {
    fn default() -> Self {
        if cfg!(feature = "shaderc") {
            ShaderCompiler::Shaderc
        } else {
            ShaderCompiler::NagaGlsl
        }
    }
}

impl std::fmt::Display for ShaderCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderCompiler::Shaderc => f.write_str("shaderc"),
            ShaderCompiler::NagaGlsl => f.write_str("naga"),
        }
    }
}

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Match browser canvas behaviour (gamma-encoded swapchain).
    #[default]
    Auto,
    /// Treat shader outputs/textures as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and use sRGB swapchains/textures for conversion.
    Linear,
}

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the canvas target.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Window title.
    pub title: String,
    /// Initial window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Shader pair, textures, and frame parameters.
    pub sketch: SketchSettings,
    /// Anti-aliasing mode requested by the caller.
    pub antialiasing: Antialiasing,
    /// Shader compiler that should be used for wrapped GLSL.
    pub shader_compiler: ShaderCompiler,
    /// Desired color handling for swapchain/textures.
    pub color_space: ColorSpaceMode,
    /// Directory snapshots are written into.
    pub snapshot_dir: PathBuf,
    /// Freeze `u_time` at this value instead of following the wall clock.
    pub fixed_time: Option<f32>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: String::from("dithersketch"),
            surface_size: (800, 600),
            sketch: SketchSettings::default(),
            antialiasing: Antialiasing::default(),
            shader_compiler: ShaderCompiler::default(),
            color_space: ColorSpaceMode::default(),
            snapshot_dir: PathBuf::from("."),
            fixed_time: None,
        }
    }
}
