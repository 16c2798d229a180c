//! Turns sketch-dialect GLSL into Vulkan-flavoured GLSL 450 and compiles it.
//!
//! Sketch shaders are written against the browser dialect: `attribute` and
//! `varying` declarations, `precision` statements, `gl_FragColor`,
//! `texture2D`, and free-standing `uniform` declarations. The wrapper rewrites
//! those declarations line by line and prepends a header that routes the
//! built-in uniforms through a std140 block and every `sampler2D` through a
//! texture/sampler pair:
//!
//! ```text
//!   set 0, binding 0      SketchParams (projection, model-view, u_resolution, u_time)
//!   set 1, binding 2i     texture2D for sampler i
//!   set 1, binding 2i+1   sampler  for sampler i
//! ```
//!
//! Rewritten declarations stay on their original line so compiler messages
//! keep pointing at the user's source.
use std::borrow::Cow;

use anyhow::{anyhow, bail, Context, Result};
use wgpu::naga::ShaderStage;

use crate::types::ShaderCompiler;

/// Uniforms the std140 block provides, with the GLSL type they must be
/// declared as.
const BUILTIN_UNIFORMS: [(&str, &str); 4] = [
    ("u_resolution", "vec2"),
    ("u_time", "float"),
    ("uProjectionMatrix", "mat4"),
    ("uModelViewMatrix", "mat4"),
];

/// Vertex attributes the unit-rectangle buffer supplies.
const ATTRIBUTES: [(&str, &str, u32); 2] = [("aPosition", "vec3", 0), ("aTexCoord", "vec2", 1)];

const PRECISION_QUALIFIERS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Vertex and fragment sources ready for compilation.
#[derive(Debug, Clone)]
pub(crate) struct WrappedProgram {
    pub vertex: String,
    pub fragment: String,
    /// Sampler uniforms in binding order.
    pub samplers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Vertex,
    Fragment,
}

/// A parsed `keyword [precision] type name[, name...];` statement.
struct Declaration<'a> {
    ty: &'a str,
    names: Vec<&'a str>,
}

/// Rewrites a sketch shader pair into self-contained GLSL 450 sources.
pub(crate) fn wrap_program(vertex: &str, fragment: &str) -> Result<WrappedProgram> {
    let mut samplers = Vec::new();
    collect_samplers(vertex, &mut samplers).context("vertex shader")?;
    collect_samplers(fragment, &mut samplers).context("fragment shader")?;

    let mut varyings: Vec<(String, String)> = Vec::new();
    let vertex_body =
        rewrite_stage(vertex, Stage::Vertex, &mut varyings).context("vertex shader")?;
    let fragment_body =
        rewrite_stage(fragment, Stage::Fragment, &mut varyings).context("fragment shader")?;

    let declarations = shared_header(&samplers);
    let vertex = format!("{declarations}\n#line 1\n{vertex_body}");
    let fragment =
        format!("{declarations}{FRAGMENT_HEADER}\n#line 1\n{fragment_body}{FRAGMENT_FOOTER}");

    Ok(WrappedProgram {
        vertex,
        fragment,
        samplers,
    })
}

fn collect_samplers(source: &str, samplers: &mut Vec<String>) -> Result<()> {
    for line in source.lines() {
        let Some(declaration) = parse_declaration(line, "uniform")? else {
            continue;
        };
        if declaration.ty != "sampler2D" {
            continue;
        }
        for name in declaration.names {
            if !samplers.iter().any(|existing| existing == name) {
                samplers.push(name.to_string());
            }
        }
    }
    Ok(())
}

fn rewrite_stage(
    source: &str,
    stage: Stage,
    varyings: &mut Vec<(String, String)>,
) -> Result<String> {
    let mut output = String::with_capacity(source.len());
    for (index, line) in source.lines().enumerate() {
        let rewritten = rewrite_line(line, stage, varyings)
            .with_context(|| format!("line {}: `{}`", index + 1, line.trim()))?;
        match rewritten {
            Some(replacement) => output.push_str(&replacement),
            None => output.push_str(line),
        }
        output.push('\n');
    }
    Ok(output)
}

/// Returns the replacement for a declaration line, or `None` to keep it.
fn rewrite_line(
    line: &str,
    stage: Stage,
    varyings: &mut Vec<(String, String)>,
) -> Result<Option<String>> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("#version") || trimmed.starts_with("precision ") {
        return Ok(Some(String::new()));
    }

    if let Some(declaration) = parse_declaration(line, "uniform")? {
        for name in &declaration.names {
            check_uniform(declaration.ty, name)?;
        }
        return Ok(Some(String::new()));
    }

    if let Some(declaration) = parse_declaration(line, "attribute")? {
        if stage == Stage::Fragment {
            bail!("attributes are only valid in the vertex shader");
        }
        let mut replacement = String::new();
        for name in declaration.names {
            let location = attribute_location(declaration.ty, name)?;
            replacement.push_str(&format!(
                "layout(location = {location}) in {} {name};",
                declaration.ty
            ));
        }
        return Ok(Some(replacement));
    }

    if let Some(declaration) = parse_declaration(line, "varying")? {
        let mut replacement = String::new();
        for name in declaration.names {
            let location = match stage {
                Stage::Vertex => {
                    varyings.push((name.to_string(), declaration.ty.to_string()));
                    varyings.len() - 1
                }
                Stage::Fragment => varyings
                    .iter()
                    .position(|(existing, ty)| existing == name && ty == declaration.ty)
                    .ok_or_else(|| {
                        anyhow!(
                            "varying {} {name} is not declared by the vertex shader",
                            declaration.ty
                        )
                    })?,
            };
            let direction = match stage {
                Stage::Vertex => "out",
                Stage::Fragment => "in",
            };
            replacement.push_str(&format!(
                "layout(location = {location}) {direction} {} {name};",
                declaration.ty
            ));
        }
        return Ok(Some(replacement));
    }

    Ok(None)
}

fn check_uniform(ty: &str, name: &str) -> Result<()> {
    if ty == "sampler2D" {
        return Ok(());
    }
    match BUILTIN_UNIFORMS.iter().find(|(builtin, _)| *builtin == name) {
        Some((_, expected)) if *expected == ty => Ok(()),
        Some((_, expected)) => bail!("uniform {name} must be declared as {expected}, not {ty}"),
        None => bail!("uniform {ty} {name} is not provided by the sketch"),
    }
}

fn attribute_location(ty: &str, name: &str) -> Result<u32> {
    match ATTRIBUTES.iter().find(|(attribute, _, _)| *attribute == name) {
        Some((_, expected, location)) if *expected == ty => Ok(*location),
        Some((_, expected, _)) => bail!("attribute {name} must be declared as {expected}, not {ty}"),
        None => bail!("attribute {ty} {name} is not supplied by the rectangle geometry"),
    }
}

/// Parses `keyword [qualifier] type name[, name...];` from a single line.
///
/// Returns `Ok(None)` when the line is not a declaration for `keyword`.
fn parse_declaration<'a>(line: &'a str, keyword: &str) -> Result<Option<Declaration<'a>>> {
    let code = line.split("//").next().unwrap_or_default().trim();
    let Some(rest) = code.strip_prefix(keyword) else {
        return Ok(None);
    };
    if !rest.starts_with(char::is_whitespace) {
        return Ok(None);
    }
    let Some(body) = rest.trim().strip_suffix(';') else {
        bail!("{keyword} declarations must fit on one line and end with ';'");
    };

    let mut tokens = body
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .filter(|token| !PRECISION_QUALIFIERS.contains(token));
    let ty = tokens
        .next()
        .ok_or_else(|| anyhow!("{keyword} declaration is missing a type"))?;
    let names: Vec<&str> = tokens.collect();
    if names.is_empty() {
        bail!("{keyword} declaration is missing a name");
    }
    for name in &names {
        if !is_identifier(name) {
            bail!("unsupported {keyword} name `{name}`");
        }
    }
    Ok(Some(Declaration { ty, names }))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Declarations shared by both stages so their bind group layouts agree.
fn shared_header(samplers: &[String]) -> String {
    let mut header = String::from(PARAMS_HEADER);
    for (index, name) in samplers.iter().enumerate() {
        let texture_binding = index * 2;
        let sampler_binding = texture_binding + 1;
        header.push_str(&format!(
            "layout(set = 1, binding = {texture_binding}) uniform texture2D sketch_{name}_texture;\n\
             layout(set = 1, binding = {sampler_binding}) uniform sampler sketch_{name}_sampler;\n\
             #define {name} sampler2D(sketch_{name}_texture, sketch_{name}_sampler)\n"
        ));
    }
    header.push_str("#define texture2D texture\n");
    header
}

/// The block layout must match `SketchUniforms` in `gpu/uniforms.rs`.
const PARAMS_HEADER: &str = r"#version 450
layout(std140, set = 0, binding = 0) uniform SketchParams {
    mat4 _uProjectionMatrix;
    mat4 _uModelViewMatrix;
    vec2 _u_resolution;
    float _u_time;
    float _padding0;
} sketch_params;

#define uProjectionMatrix sketch_params._uProjectionMatrix
#define uModelViewMatrix sketch_params._uModelViewMatrix
#define u_resolution sketch_params._u_resolution
#define u_time sketch_params._u_time
";

const FRAGMENT_HEADER: &str = r"
layout(location = 0) out vec4 sketch_FragColor;
#define gl_FragColor sketch_FragColor

vec4 sketch_gl_FragCoord;
#define gl_FragCoord sketch_gl_FragCoord
#define main sketch_main
";

/// Flips `gl_FragCoord` to a bottom-left origin before running the user's
/// `main`.
const FRAGMENT_FOOTER: &str = r"
#undef main
#undef gl_FragCoord
void main() {
    sketch_gl_FragCoord = vec4(gl_FragCoord.x, u_resolution.y - gl_FragCoord.y, gl_FragCoord.zw);
    sketch_main();
}
";

/// Compiles one wrapped stage into a shader module.
///
/// Validation errors are captured through an error scope so a bad shader
/// surfaces as an `Err` instead of the device's uncaptured-error panic.
pub(crate) fn compile_stage(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
    compiler: ShaderCompiler,
) -> Result<wgpu::ShaderModule> {
    let source = match compiler {
        ShaderCompiler::NagaGlsl => wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_string()),
            stage,
            defines: &[],
        },
        ShaderCompiler::Shaderc => {
            wgpu::ShaderSource::SpirV(Cow::Owned(compile_with_shaderc(label, source, stage)?))
        }
    };

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source,
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        bail!("{label} failed to compile: {error}");
    }
    Ok(module)
}

#[cfg(feature = "shaderc")]
fn compile_with_shaderc(label: &str, source: &str, stage: ShaderStage) -> Result<Vec<u32>> {
    let kind = match stage {
        ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
        ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
        other => bail!("shaderc path does not support {other:?} shaders"),
    };
    let compiler = shaderc::Compiler::new().context("failed to initialise shaderc")?;
    let mut options =
        shaderc::CompileOptions::new().context("failed to create shaderc options")?;
    options.set_source_language(shaderc::SourceLanguage::GLSL);
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    let artifact = compiler
        .compile_into_spirv(source, kind, label, "main", Some(&options))
        .map_err(|err| anyhow!("{label} failed to compile: {err}"))?;
    if artifact.get_num_warnings() > 0 {
        tracing::warn!(label, warnings = %artifact.get_warning_messages(), "shaderc warnings");
    }
    Ok(artifact.as_binary().to_vec())
}

#[cfg(not(feature = "shaderc"))]
fn compile_with_shaderc(_label: &str, _source: &str, _stage: ShaderStage) -> Result<Vec<u32>> {
    bail!("shaderc support is not enabled in this build")
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "\
#ifdef GL_ES
precision mediump float;
#endif
attribute vec3 aPosition;
attribute vec2 aTexCoord;
varying vec2 vTexCoord;
void main() {
  vTexCoord = aTexCoord;
  vec4 positionVec4 = vec4(aPosition, 1.0);
  positionVec4.xy = positionVec4.xy * 2.0 - 1.0;
  gl_Position = positionVec4;
}
";

    const FRAGMENT: &str = "\
precision mediump float;
varying vec2 vTexCoord;
uniform vec2 u_resolution;
uniform float u_time;
uniform sampler2D bayer8x8;
uniform sampler2D bayer16x16, blueNoise64x64; // two at once
void main() {
  gl_FragColor = texture2D(bayer8x8, gl_FragCoord.xy / 8.0);
}
";

    #[test]
    fn strips_dialect_declarations() {
        let wrapped = wrap_program(VERTEX, FRAGMENT).unwrap();
        assert!(!wrapped.fragment.contains("uniform vec2 u_resolution"));
        assert!(!wrapped.fragment.contains("uniform float u_time"));
        assert!(!wrapped.fragment.contains("uniform sampler2D"));
        assert!(!wrapped.fragment.contains("precision mediump"));
        assert!(!wrapped.vertex.contains("attribute "));
        assert!(wrapped.vertex.contains("#ifdef GL_ES"));
    }

    #[test]
    fn assigns_sampler_bindings_in_declaration_order() {
        let wrapped = wrap_program(VERTEX, FRAGMENT).unwrap();
        assert_eq!(
            wrapped.samplers,
            vec!["bayer8x8", "bayer16x16", "blueNoise64x64"]
        );
        for source in [&wrapped.vertex, &wrapped.fragment] {
            assert!(source.contains(
                "layout(set = 1, binding = 2) uniform texture2D sketch_bayer16x16_texture;"
            ));
            assert!(source
                .contains("layout(set = 1, binding = 5) uniform sampler sketch_blueNoise64x64_sampler;"));
            assert!(source.contains(
                "#define bayer8x8 sampler2D(sketch_bayer8x8_texture, sketch_bayer8x8_sampler)"
            ));
        }
    }

    #[test]
    fn links_attributes_and_varyings_by_location() {
        let wrapped = wrap_program(VERTEX, FRAGMENT).unwrap();
        assert!(wrapped
            .vertex
            .contains("layout(location = 0) in vec3 aPosition;"));
        assert!(wrapped
            .vertex
            .contains("layout(location = 1) in vec2 aTexCoord;"));
        assert!(wrapped
            .vertex
            .contains("layout(location = 0) out vec2 vTexCoord;"));
        assert!(wrapped
            .fragment
            .contains("layout(location = 0) in vec2 vTexCoord;"));
    }

    #[test]
    fn keeps_user_line_numbers() {
        let wrapped = wrap_program(VERTEX, FRAGMENT).unwrap();
        let body = wrapped.fragment.split("#line 1\n").nth(1).unwrap();
        let main_line = body.lines().position(|line| line.starts_with("void main()"));
        assert_eq!(main_line, Some(6));
    }

    #[test]
    fn fragment_footer_flips_frag_coord() {
        let wrapped = wrap_program(VERTEX, FRAGMENT).unwrap();
        assert!(wrapped.fragment.contains("#define main sketch_main"));
        assert!(wrapped.fragment.contains("u_resolution.y - gl_FragCoord.y"));
        assert!(wrapped.fragment.trim_end().ends_with('}'));
        assert!(!wrapped.vertex.contains("sketch_main"));
    }

    #[test]
    fn rejects_unknown_uniform() {
        let fragment = "uniform float u_mouse;\nvoid main() {}\n";
        let err = wrap_program(VERTEX, fragment).unwrap_err();
        assert!(format!("{err:#}").contains("u_mouse"), "{err:#}");
    }

    #[test]
    fn rejects_mistyped_builtin_uniform() {
        let fragment = "uniform vec3 u_resolution;\nvoid main() {}\n";
        let err = wrap_program(VERTEX, fragment).unwrap_err();
        assert!(format!("{err:#}").contains("must be declared as vec2"), "{err:#}");
    }

    #[test]
    fn rejects_unlinked_varying() {
        let fragment = "varying vec3 vNormal;\nvoid main() {}\n";
        let err = wrap_program(VERTEX, fragment).unwrap_err();
        assert!(format!("{err:#}").contains("vNormal"), "{err:#}");
    }

    #[test]
    fn rejects_unsupported_attribute() {
        let vertex = "attribute vec3 aNormal;\nvoid main() {}\n";
        let err = wrap_program(vertex, "void main() {}\n").unwrap_err();
        assert!(format!("{err:#}").contains("aNormal"), "{err:#}");
    }

    #[test]
    fn ignores_identifiers_that_merely_start_with_keywords() {
        let fragment = "void main() {\n  float uniformity = 1.0;\n  gl_FragColor = vec4(uniformity);\n}\n";
        let wrapped = wrap_program(VERTEX, fragment).unwrap();
        assert!(wrapped.fragment.contains("float uniformity = 1.0;"));
        assert!(wrapped.samplers.is_empty());
    }
}
