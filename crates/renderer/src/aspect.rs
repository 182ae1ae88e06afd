//! UV correction factors that keep image textures undistorted.
//!
//! The correction is written into the scene material's `resolution` uniform
//! as `(width, height, correction_x, correction_y)`; the post passes never see
//! it.

use crate::types::Viewport;

/// Height / width ratio of the source images.
pub const DEFAULT_TARGET_ASPECT: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectCorrection {
    pub width: f32,
    pub height: f32,
    pub correction_x: f32,
    pub correction_y: f32,
}

impl AspectCorrection {
    /// Recomputes the correction from scratch for a viewport.
    pub fn compute(viewport: Viewport, target_aspect: f32) -> Self {
        let width = viewport.width as f32;
        let height = viewport.height as f32;
        let (correction_x, correction_y) = if height / width > target_aspect {
            ((width / height) * target_aspect, 1.0)
        } else {
            (1.0, (height / width) * target_aspect)
        };
        Self {
            width,
            height,
            correction_x,
            correction_y,
        }
    }

    pub fn as_vec4(&self) -> [f32; 4] {
        [self.width, self.height, self.correction_x, self.correction_y]
    }
}
