use std::borrow::Cow;

use wgpu::naga;

use crate::effects::EffectKind;
use crate::types::PipelineError;

/// Full-screen triangle shared by every post effect; prepended to each
/// effect's fragment source so one module carries both entry points.
pub(crate) const FULLSCREEN_VERTEX_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -3.0),
        vec2<f32>(3.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let pos = positions[index];
    var output: VertexOutput;
    output.position = vec4<f32>(pos, 0.0, 1.0);
    output.uv = pos * 0.5 + vec2<f32>(0.5);
    return output;
}
"#;

pub(crate) const SCENE_WGSL: &str = r#"
struct MaterialUniforms {
    model: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    resolution: vec4<f32>,
    time: f32,
    progress: f32,
    padding: vec2<f32>,
};

@group(0) @binding(0) var t_image: texture_2d<f32>;
@group(0) @binding(1) var s_image: sampler;
@group(0) @binding(2) var<uniform> material: MaterialUniforms;

struct PlaneInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

struct PlaneOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(plane: PlaneInput) -> PlaneOutput {
    var output: PlaneOutput;
    output.clip = material.view_proj * material.model * vec4<f32>(plane.position, 1.0);
    output.uv = plane.uv;
    return output;
}

@fragment
fn fs_main(frag: PlaneOutput) -> @location(0) vec4<f32> {
    let fit = (frag.uv - vec2<f32>(0.5)) * material.resolution.zw + vec2<f32>(0.5);
    return textureSample(t_image, s_image, vec2<f32>(fit.x, 1.0 - fit.y));
}
"#;

/// Complete WGSL module for a post effect.
pub(crate) fn effect_module_source(kind: EffectKind) -> String {
    format!("{FULLSCREEN_VERTEX_WGSL}\n{}", kind.fragment_wgsl())
}

/// Parses and validates WGSL with naga so malformed sources fail before any
/// pipeline is created.
pub(crate) fn validate_wgsl(label: &str, source: &str) -> Result<naga::Module, PipelineError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| {
        PipelineError::ShaderCompilation {
            label: label.to_string(),
            message: err.emit_to_string(source),
        }
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| PipelineError::ShaderCompilation {
        label: label.to_string(),
        message: format!("{err:?}"),
    })?;
    Ok(module)
}

/// Validates then compiles a WGSL module, catching any error the device
/// reports while creating it.
pub(crate) fn compile_wgsl(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, PipelineError> {
    validate_wgsl(label, source)?;
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_string())),
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(PipelineError::ShaderCompilation {
            label: label.to_string(),
            message: err.to_string(),
        });
    }
    tracing::debug!(label, "compiled shader module");
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_modules_validate() {
        for kind in EffectKind::ALL {
            let source = effect_module_source(kind);
            let module = validate_wgsl(kind.name(), &source)
                .unwrap_or_else(|err| panic!("{kind} failed validation: {err}"));
            let entry_points: Vec<_> = module
                .entry_points
                .iter()
                .map(|entry| entry.name.as_str())
                .collect();
            assert!(entry_points.contains(&"vs_fullscreen"));
            assert!(entry_points.contains(&"fs_main"));
        }
    }

    #[test]
    fn scene_module_validates() {
        validate_wgsl("scene", SCENE_WGSL).expect("scene shader");
    }

    #[test]
    fn malformed_source_reports_shader_compilation() {
        let source = format!("{FULLSCREEN_VERTEX_WGSL}\n@fragment fn fs_main( -> {{}}");
        let err = validate_wgsl("broken", &source).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ShaderCompilation { ref label, .. } if label == "broken"
        ));
    }

    #[test]
    fn type_errors_are_caught_by_validation() {
        let source = format!(
            "{FULLSCREEN_VERTEX_WGSL}\n@fragment fn fs_main() -> @location(0) vec4<f32> {{ return 1.0; }}"
        );
        assert!(validate_wgsl("mistyped", &source).is_err());
    }
}
