//! Built-in fallback shader, used when the on-disk source cannot be read.
//! Binding interface must match `assets/shaders/draw.wgsl`.

pub const VOLUME_SHADER: &str = r#"
struct Uniforms {
    inv_view_proj: mat4x4<f32>,
    density: f32,
    time: f32,
    _pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var volume_sampler: sampler;
@group(0) @binding(2) var volume: texture_3d<f32>;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let x = f32(index % 2u) * 4.0 - 1.0;
    let y = f32(index / 2u) * 4.0 - 1.0;
    var out: VertexOutput;
    out.position = vec4<f32>(x, y, 0.0, 1.0);
    out.ndc = vec2<f32>(x, y);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    // Flat magenta wash so a broken asset pipeline is unmistakable.
    let fade = 0.5 + 0.25 * sin(uniforms.time);
    return vec4<f32>(fade, 0.0, fade, 0.4);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_declares_both_entry_points() {
        assert!(VOLUME_SHADER.contains("fn vs_main"));
        assert!(VOLUME_SHADER.contains("fn fs_main"));
    }

    #[test]
    fn fallback_matches_the_bind_group_interface() {
        for binding in ["@binding(0)", "@binding(1)", "@binding(2)"] {
            assert!(VOLUME_SHADER.contains(binding), "missing {binding}");
        }
    }
}
