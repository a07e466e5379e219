use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::camera::Camera;
use crate::transform::{Transforms, Viewport};

/// Host-side mirror of the WGSL `Uniforms` struct at `@group(0) @binding(0)`.
///
/// Field names follow the shader: `u_mvp`, `u_camPos`, `u_camDir`,
/// `u_resolution`. Matrices are column-major.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub mvp: [[f32; 4]; 4],
    pub cam_pos: [f32; 4],
    pub cam_dir: [f32; 4],
    pub resolution: [f32; 2],
    pub _pad: [f32; 2],
}

impl FrameUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    fn base(viewport: Viewport) -> Self {
        Self {
            mvp: Mat4::IDENTITY.to_cols_array_2d(),
            cam_pos: [0.0; 4],
            cam_dir: [0.0; 4],
            resolution: [viewport.width as f32, viewport.height as f32],
            _pad: [0.0; 2],
        }
    }

    /// Resolution plus camera position and direction for the raymarcher.
    pub fn raymarch(camera: &Camera, viewport: Viewport) -> Self {
        Self {
            cam_pos: camera.position().extend(1.0).to_array(),
            cam_dir: camera.forward().extend(0.0).to_array(),
            ..Self::base(viewport)
        }
    }

    /// Resolution plus the combined model-view-projection matrix.
    pub fn mesh(transforms: &Transforms, viewport: Viewport) -> Self {
        Self {
            mvp: transforms.mvp.to_cols_array_2d(),
            ..Self::base(viewport)
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn layout_matches_wgsl_struct() {
        // mat4x4 (64) + vec4 (16) + vec4 (16) + vec2 padded to 16.
        assert_eq!(FrameUniforms::SIZE, 112);
    }

    #[test]
    fn raymarch_uniforms_carry_camera_vectors() {
        let camera = Camera::with_orientation(Vec3::new(1.0, 2.0, 3.0), Vec3::X, 0.1);
        let uniforms = FrameUniforms::raymarch(&camera, Viewport::new(640, 480));
        assert_eq!(uniforms.resolution, [640.0, 480.0]);
        assert_eq!(&uniforms.cam_pos[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&uniforms.cam_dir[..3], &[1.0, 0.0, 0.0]);
        assert_eq!(uniforms.mvp, Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn mesh_uniforms_carry_mvp() {
        let viewport = Viewport::new(800, 600);
        let transforms = Transforms::compute(&Camera::default(), viewport);
        let uniforms = FrameUniforms::mesh(&transforms, viewport);
        assert_eq!(uniforms.mvp, transforms.mvp.to_cols_array_2d());
        assert_eq!(uniforms.cam_pos, [0.0; 4]);
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), 112);
    }
}
