use glam::Mat4;

use crate::camera::Camera;

pub const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

/// Framebuffer size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; 1.0 for a zero-height viewport.
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Per-frame matrix chain. Recomputed every frame, never cached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub mvp: Mat4,
}

impl Transforms {
    pub fn compute(camera: &Camera, viewport: Viewport) -> Self {
        let model = Mat4::IDENTITY;
        let position = camera.position();
        let view = Mat4::look_at_rh(position, position + camera.forward(), camera.up());
        // wgpu clip space uses a [0, 1] depth range.
        let projection = Mat4::perspective_rh(
            FIELD_OF_VIEW_DEGREES.to_radians(),
            viewport.aspect().max(0.01),
            NEAR_PLANE,
            FAR_PLANE,
        );
        Self {
            model,
            view,
            projection,
            mvp: projection * view * model,
        }
    }
}
