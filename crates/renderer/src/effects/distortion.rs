use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::TextureSampler;

/// `(k, f, phase)` for each cosine step, applied in order.
pub const PERTURBATIONS: [(f32, f32, [f32; 2]); 4] = [
    (4.0, 1.0, [1.2, 3.4]),
    (3.7, 1.4, [2.2, 3.4]),
    (6.7, 2.6, [4.1, 1.4]),
    (5.7, 3.6, [10.2, 3.4]),
];

const AMPLITUDE: f32 = 0.1;

/// Uniform block of the distortion pass (`DistortionParams` in WGSL).
///
/// `angle` and `center` are part of the contract but the warp ignores them.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DistortionParams {
    pub time: f32,
    pub progress: f32,
    pub scale: f32,
    pub angle: f32,
    pub center: [f32; 2],
    pub padding: [f32; 2],
}

/// Runs the four cosine perturbations over `p = 2uv - 1`.
pub fn perturb(uv: Vec2, time: f32, scale: f32) -> Vec2 {
    let mut p = uv * 2.0 - Vec2::ONE;
    for (k, f, phase) in PERTURBATIONS {
        let arg = scale * k * Vec2::new(p.y, p.x) + Vec2::splat(f * time) + Vec2::from(phase);
        p += AMPLITUDE * Vec2::new(arg.x.cos(), arg.y.cos());
    }
    p
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Maps an output UV to the UV the input texture is sampled at.
pub fn warp_uv(uv: Vec2, time: f32, scale: f32, progress: f32) -> Vec2 {
    let p = perturb(uv, time, scale);
    let mut warped = uv + p * Vec2::new(1.0, 0.0);
    warped.x = mix(uv.x, p.length(), progress);
    warped.y = mix(uv.y, 0.5, progress);
    warped
}

impl DistortionParams {
    pub(crate) fn shade<S: TextureSampler + ?Sized>(&self, input: &S, uv: Vec2) -> [f32; 4] {
        input.sample(warp_uv(uv, self.time, self.scale, self.progress))
    }
}

pub(crate) const FRAGMENT_WGSL: &str = r#"
struct DistortionParams {
    time: f32,
    progress: f32,
    scale: f32,
    angle: f32,
    center: vec2<f32>,
    padding: vec2<f32>,
};

@group(0) @binding(0) var t_diffuse: texture_2d<f32>;
@group(0) @binding(1) var s_diffuse: sampler;
@group(0) @binding(2) var<uniform> params: DistortionParams;

fn sample_diffuse(uv: vec2<f32>) -> vec4<f32> {
    return textureSample(t_diffuse, s_diffuse, vec2<f32>(uv.x, 1.0 - uv.y));
}

@fragment
fn fs_main(frag: VertexOutput) -> @location(0) vec4<f32> {
    let uv = frag.uv;
    let t = vec2<f32>(params.time);
    var p = 2.0 * uv - vec2<f32>(1.0);
    p = p + 0.1 * cos(params.scale * 4.0 * p.yx + 1.0 * t + vec2<f32>(1.2, 3.4));
    p = p + 0.1 * cos(params.scale * 3.7 * p.yx + 1.4 * t + vec2<f32>(2.2, 3.4));
    p = p + 0.1 * cos(params.scale * 6.7 * p.yx + 2.6 * t + vec2<f32>(4.1, 1.4));
    p = p + 0.1 * cos(params.scale * 5.7 * p.yx + 3.6 * t + vec2<f32>(10.2, 3.4));

    var warped = uv + p * vec2<f32>(1.0, 0.0);
    warped.x = mix(uv.x, length(p), params.progress);
    warped.y = mix(uv.y, 0.5, params.progress);
    return sample_diffuse(warped);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    /// Straight f64 transcription used as an independent reference.
    fn reference_p(uv: (f64, f64), time: f64, scale: f64) -> (f64, f64) {
        let steps = [
            (4.0, 1.0, 1.2, 3.4),
            (3.7, 1.4, 2.2, 3.4),
            (6.7, 2.6, 4.1, 1.4),
            (5.7, 3.6, 10.2, 3.4),
        ];
        let (mut x, mut y) = (2.0 * uv.0 - 1.0, 2.0 * uv.1 - 1.0);
        for (k, f, px, py) in steps {
            let nx = x + 0.1 * (scale * k * y + f * time + px).cos();
            let ny = y + 0.1 * (scale * k * x + f * time + py).cos();
            x = nx;
            y = ny;
        }
        (x, y)
    }

    fn grid() -> Vec<Vec2> {
        let mut points = Vec::new();
        for i in 0..=8 {
            for j in 0..=8 {
                points.push(Vec2::new(i as f32 / 8.0, j as f32 / 8.0));
            }
        }
        points
    }

    #[test]
    fn zero_progress_is_identity() {
        for uv in grid() {
            for (time, scale) in [(0.0, 2.0), (13.7, 0.1), (250.0, 10.0)] {
                assert_eq!(warp_uv(uv, time, scale, 0.0), uv);
            }
        }
    }

    #[test]
    fn full_progress_collapses_to_length_and_half() {
        for uv in grid() {
            let (time, scale) = (3.25, 2.0);
            let warped = warp_uv(uv, time, scale, 1.0);
            let (x, y) = reference_p((uv.x as f64, uv.y as f64), time as f64, scale as f64);
            let expected = (x * x + y * y).sqrt();
            assert!(
                (warped.x as f64 - expected).abs() < 1e-4,
                "uv {uv:?}: {} vs {expected}",
                warped.x
            );
            assert_eq!(warped.y, 0.5);
        }
    }

    #[test]
    fn perturbation_uses_previous_step_snapshot() {
        let uv = Vec2::new(0.3, 0.8);
        let p = perturb(uv, 1.0, 2.0);
        let (x, y) = reference_p((0.3, 0.8), 1.0, 2.0);
        assert!((p.x as f64 - x).abs() < 1e-5);
        assert!((p.y as f64 - y).abs() < 1e-5);
    }

    #[test]
    fn shader_steps_match_cpu_constants_in_order() {
        let mut rest = FRAGMENT_WGSL;
        for (k, f, [px, py]) in PERTURBATIONS {
            let step = format!(
                "p = p + {AMPLITUDE:?} * cos(params.scale * {k:?} * p.yx + {f:?} * t + vec2<f32>({px:?}, {py:?}));"
            );
            let at = rest
                .find(&step)
                .unwrap_or_else(|| panic!("missing or out of order: {step}"));
            rest = &rest[at + step.len()..];
        }
        assert!(!rest.contains("p = p +"), "extra perturbation step in shader");
        let blend_x = rest
            .find("warped.x = mix(uv.x, length(p), params.progress);")
            .expect("x blend");
        let blend_y = rest
            .find("warped.y = mix(uv.y, 0.5, params.progress);")
            .expect("y blend");
        assert!(blend_x < blend_y);
    }

    #[test]
    fn intermediate_progress_blends_linearly() {
        let uv = Vec2::new(0.2, 0.9);
        let start = warp_uv(uv, 0.5, 2.0, 0.0);
        let end = warp_uv(uv, 0.5, 2.0, 1.0);
        let mid = warp_uv(uv, 0.5, 2.0, 0.5);
        assert!((mid - (start + end) * 0.5).length() < 1e-6);
    }
}
