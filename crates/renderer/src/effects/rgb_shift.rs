use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::TextureSampler;

pub const RGB_SHIFT_AMOUNT: f32 = 0.0015;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RgbShiftParams {
    pub amount: f32,
    pub angle: f32,
    pub padding: [f32; 2],
}

pub fn channel_offset(amount: f32, angle: f32) -> Vec2 {
    amount * Vec2::new(angle.cos(), angle.sin())
}

impl RgbShiftParams {
    pub(crate) fn shade<S: TextureSampler + ?Sized>(&self, input: &S, uv: Vec2) -> [f32; 4] {
        let offset = channel_offset(self.amount, self.angle);
        let red = input.sample(uv + offset);
        let center = input.sample(uv);
        let blue = input.sample(uv - offset);
        [red[0], center[1], blue[2], center[3]]
    }
}

pub(crate) const FRAGMENT_WGSL: &str = r#"
struct RgbShiftParams {
    amount: f32,
    angle: f32,
    padding: vec2<f32>,
};

@group(0) @binding(0) var t_diffuse: texture_2d<f32>;
@group(0) @binding(1) var s_diffuse: sampler;
@group(0) @binding(2) var<uniform> params: RgbShiftParams;

fn sample_diffuse(uv: vec2<f32>) -> vec4<f32> {
    return textureSample(t_diffuse, s_diffuse, vec2<f32>(uv.x, 1.0 - uv.y));
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let offset = params.amount * vec2<f32>(cos(params.angle), sin(params.angle));
    let cr = sample_diffuse(frag.uv + offset);
    let cga = sample_diffuse(frag.uv);
    let cb = sample_diffuse(frag.uv - offset);
    return vec4<f32>(cr.r, cga.g, cb.b, cga.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    /// Horizontal ramp: red grows with x, blue shrinks with x.
    struct Ramp;

    impl TextureSampler for Ramp {
        fn sample(&self, uv: Vec2) -> [f32; 4] {
            [uv.x, 0.5, 1.0 - uv.x, uv.y]
        }
    }

    #[test]
    fn default_angle_offsets_horizontally() {
        let offset = channel_offset(RGB_SHIFT_AMOUNT, 0.0);
        assert_eq!(offset, Vec2::new(RGB_SHIFT_AMOUNT, 0.0));
    }

    #[test]
    fn channels_are_sampled_at_their_offsets() {
        let params = RgbShiftParams {
            amount: 0.1,
            angle: 0.0,
            padding: [0.0; 2],
        };
        let color = params.shade(&Ramp, Vec2::new(0.5, 0.25));
        assert!((color[0] - 0.6).abs() < 1e-6);
        assert_eq!(color[1], 0.5);
        // blue reads x = 0.4, where the ramp's blue channel is 1 - 0.4
        assert!((color[2] - 0.6).abs() < 1e-6);
        assert_eq!(color[3], 0.25);
    }

    #[test]
    fn zero_amount_is_passthrough() {
        let params = RgbShiftParams {
            amount: 0.0,
            angle: 1.0,
            padding: [0.0; 2],
        };
        let uv = Vec2::new(0.3, 0.7);
        assert_eq!(params.shade(&Ramp, uv), Ramp.sample(uv));
    }
}
