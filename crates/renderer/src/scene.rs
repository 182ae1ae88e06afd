//! Camera, planes, and the material state shared by every mesh.

use glam::{Mat4, Vec3};

use crate::aspect::AspectCorrection;
use crate::types::Viewport;

pub const PLANE_WIDTH: f32 = 1.0;
pub const PLANE_HEIGHT: f32 = 1.4;
pub const DEFAULT_MESH_SPACING: f32 = 2.0;

/// Interleaved plane vertex: position then GL-style uv.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PlaneVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Two triangles covering a `PLANE_WIDTH` x `PLANE_HEIGHT` plane centred on the origin.
pub fn plane_geometry() -> ([PlaneVertex; 4], [u16; 6]) {
    let hw = PLANE_WIDTH * 0.5;
    let hh = PLANE_HEIGHT * 0.5;
    let vertices = [
        PlaneVertex {
            position: [-hw, -hh, 0.0],
            uv: [0.0, 0.0],
        },
        PlaneVertex {
            position: [hw, -hh, 0.0],
            uv: [1.0, 0.0],
        },
        PlaneVertex {
            position: [hw, hh, 0.0],
            uv: [1.0, 1.0],
        },
        PlaneVertex {
            position: [-hw, hh, 0.0],
            uv: [0.0, 1.0],
        },
    ];
    (vertices, [0, 1, 2, 0, 2, 3])
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.001,
            far: 1000.0,
            position: Vec3::new(0.0, 0.0, 2.0),
            aspect: 1.0,
        }
    }
}

impl Camera {
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.aspect = viewport.width as f32 / viewport.height as f32;
    }

    pub fn view_projection(&self) -> Mat4 {
        let projection = Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        );
        let view = Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y);
        projection * view
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mesh {
    /// Index into the image list the plane samples.
    pub texture: usize,
    pub position: Vec3,
    /// Rotation about the view axis, in radians.
    pub rotation_z: f32,
}

impl Mesh {
    pub fn model(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_rotation_z(self.rotation_z)
    }
}

/// Everything the scene pass needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub camera: Camera,
    pub meshes: Vec<Mesh>,
    pub resolution: AspectCorrection,
    pub time: f32,
    pub progress: f32,
}

impl Scene {
    /// Lays out `count` planes along x, `spacing` apart and centred on the origin.
    pub fn new(count: usize, spacing: f32, viewport: Viewport, target_aspect: f32) -> Self {
        let offset = (count.saturating_sub(1)) as f32 * spacing * 0.5;
        let meshes = (0..count)
            .map(|index| Mesh {
                texture: index,
                position: Vec3::new(index as f32 * spacing - offset, 0.0, 0.0),
                rotation_z: 0.0,
            })
            .collect();
        let mut camera = Camera::default();
        camera.set_viewport(viewport);
        Self {
            camera,
            meshes,
            resolution: AspectCorrection::compute(viewport, target_aspect),
            time: 0.0,
            progress: 0.0,
        }
    }

    /// Recomputes the camera aspect and the material `resolution`.
    pub fn set_viewport(&mut self, viewport: Viewport, target_aspect: f32) {
        self.camera.set_viewport(viewport);
        self.resolution = AspectCorrection::compute(viewport, target_aspect);
    }

    pub fn set_rotation(&mut self, radians: f32) {
        for mesh in &mut self.meshes {
            mesh.rotation_z = radians;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(width: u32, height: u32) -> Viewport {
        Viewport::new(width, height).expect("viewport")
    }

    #[test]
    fn three_planes_sit_at_minus_two_zero_two() {
        let scene = Scene::new(3, DEFAULT_MESH_SPACING, viewport(1920, 1080), 1.0);
        let xs: Vec<f32> = scene.meshes.iter().map(|mesh| mesh.position.x).collect();
        assert_eq!(xs, vec![-2.0, 0.0, 2.0]);
        assert_eq!(scene.meshes[2].texture, 2);
    }

    #[test]
    fn viewport_change_updates_camera_and_resolution() {
        let mut scene = Scene::new(1, DEFAULT_MESH_SPACING, viewport(1920, 1080), 1.0);
        scene.set_viewport(viewport(1080, 1920), 1.0);
        assert!((scene.camera.aspect - 0.5625).abs() < 1e-6);
        assert!((scene.resolution.correction_x - 0.5625).abs() < 1e-6);
        assert_eq!(scene.resolution.correction_y, 1.0);
    }

    #[test]
    fn rotation_applies_to_every_mesh() {
        let mut scene = Scene::new(3, DEFAULT_MESH_SPACING, viewport(800, 600), 1.0);
        scene.set_rotation(std::f32::consts::FRAC_PI_2);
        assert!(scene
            .meshes
            .iter()
            .all(|mesh| mesh.rotation_z == std::f32::consts::FRAC_PI_2));
    }

    #[test]
    fn centre_plane_projects_to_screen_centre() {
        let scene = Scene::new(1, DEFAULT_MESH_SPACING, viewport(800, 800), 1.0);
        let clip = scene.camera.view_projection() * scene.meshes[0].model() * glam::Vec4::W;
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
    }

    #[test]
    fn plane_geometry_spans_expected_extent() {
        let (vertices, indices) = plane_geometry();
        let max_y = vertices
            .iter()
            .map(|vertex| vertex.position[1])
            .fold(f32::MIN, f32::max);
        assert!((max_y - PLANE_HEIGHT * 0.5).abs() < 1e-6);
        assert_eq!(indices.len(), 6);
        assert_eq!(std::mem::size_of::<PlaneVertex>(), 20);
    }
}
