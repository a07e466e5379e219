use log::debug;

use crate::camera::Camera;
use crate::config::{RenderMode, ViewerConfig};
use crate::input::{InputQueue, KeyAction, KeyBindings, KeyEvent};
use crate::render::FrameUniforms;
use crate::transform::{Transforms, Viewport};

/// Per-run state owned by the render loop: camera, viewport, pending input
/// and the close flag. Passed explicitly to whatever needs it.
#[derive(Debug)]
pub struct RenderContext {
    camera: Camera,
    viewport: Viewport,
    input: InputQueue,
    bindings: KeyBindings,
    raymarch: bool,
    close_requested: bool,
}

/// Values produced by one frame update and consumed by the draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUpdate {
    pub viewport: Viewport,
    pub uniforms: FrameUniforms,
}

impl RenderContext {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            camera: Camera::new(config.speed),
            viewport: Viewport::new(config.width, config.height),
            input: InputQueue::new(),
            bindings: config.bindings.clone(),
            raymarch: matches!(config.mode, RenderMode::Raymarch),
            close_requested: false,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_raymarch(&self) -> bool {
        self.raymarch
    }

    /// Queues a key event for the next frame.
    pub fn push_key(&mut self, event: KeyEvent) {
        self.input.push(event);
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Drains queued key events and applies their actions. Returns the number
    /// of camera impulses applied.
    pub fn dispatch_input(&mut self) -> usize {
        let mut applied = 0;
        for event in self.input.drain() {
            match self.bindings.resolve(&event) {
                Some(KeyAction::Camera(impulse)) => {
                    self.camera.apply(impulse);
                    applied += 1;
                }
                Some(KeyAction::Close) => self.close_requested = true,
                None => {}
            }
        }
        if applied > 0 {
            debug!(
                "camera at {:?} facing {:?}",
                self.camera.position(),
                self.camera.forward()
            );
        }
        applied
    }

    /// Runs the CPU half of a frame: input dispatch, viewport read and
    /// uniform computation for the active mode.
    pub fn update(&mut self) -> FrameUpdate {
        self.dispatch_input();
        let viewport = self.viewport;
        let uniforms = if self.raymarch {
            FrameUniforms::raymarch(&self.camera, viewport)
        } else {
            FrameUniforms::mesh(&Transforms::compute(&self.camera, viewport), viewport)
        };
        FrameUpdate { viewport, uniforms }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use glam::{Mat4, Vec3};

    use super::*;
    use crate::input::{KeyCode, NamedKey};

    fn mesh_config() -> ViewerConfig {
        ViewerConfig {
            mode: RenderMode::Mesh {
                path: PathBuf::from("cube.obj"),
            },
            ..ViewerConfig::default()
        }
    }

    #[test]
    fn key_presses_move_camera_on_next_update() {
        let mut ctx = RenderContext::new(&ViewerConfig::default());
        ctx.push_key(KeyEvent::pressed(KeyCode::Character('W')));
        ctx.push_key(KeyEvent::released(KeyCode::Character('W')));
        assert_eq!(ctx.camera().position(), Vec3::new(0.0, 0.0, 3.0));

        let frame = ctx.update();
        let expected = Vec3::new(0.0, 0.0, 2.9);
        assert!(ctx.camera().position().abs_diff_eq(expected, 1e-6));
        assert!(Vec3::from_slice(&frame.uniforms.cam_pos[..3]).abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn escape_sets_close_flag() {
        let mut ctx = RenderContext::new(&ViewerConfig::default());
        ctx.push_key(KeyEvent::pressed(KeyCode::Named(NamedKey::Escape)));
        assert!(!ctx.should_close());
        assert_eq!(ctx.dispatch_input(), 0);
        assert!(ctx.should_close());
    }

    #[test]
    fn reset_key_restores_pose() {
        let mut ctx = RenderContext::new(&ViewerConfig::default());
        for key in ['A', 'A', 'E', 'W'] {
            ctx.push_key(KeyEvent::pressed(KeyCode::Character(key)));
        }
        ctx.push_key(KeyEvent::pressed(KeyCode::Character('R')));
        assert_eq!(ctx.dispatch_input(), 5);
        assert_eq!(ctx.camera().position(), Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(ctx.camera().forward(), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn mesh_mode_uploads_mvp_for_current_viewport() {
        let mut ctx = RenderContext::new(&mesh_config());
        assert!(!ctx.is_raymarch());
        ctx.set_viewport(1024, 512);
        let frame = ctx.update();
        assert_eq!(frame.viewport, Viewport::new(1024, 512));
        assert_eq!(frame.uniforms.resolution, [1024.0, 512.0]);
        let expected = Transforms::compute(ctx.camera(), frame.viewport).mvp;
        assert_eq!(Mat4::from_cols_array_2d(&frame.uniforms.mvp), expected);
    }

    #[test]
    fn raymarch_mode_uploads_camera_vectors() {
        let mut ctx = RenderContext::new(&ViewerConfig::default());
        let frame = ctx.update();
        assert_eq!(frame.uniforms.resolution, [800.0, 600.0]);
        assert_eq!(frame.uniforms.cam_dir[..3], [0.0, 0.0, -1.0]);
        assert_eq!(frame.uniforms.mvp, Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn zero_height_viewport_still_updates() {
        let mut ctx = RenderContext::new(&mesh_config());
        ctx.set_viewport(640, 0);
        let frame = ctx.update();
        assert!(Mat4::from_cols_array_2d(&frame.uniforms.mvp).is_finite());
    }
}
