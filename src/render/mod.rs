mod program;
mod renderer;
mod uniforms;

pub use program::{LinkOptions, ShaderProgram};
pub use renderer::Renderer;
pub use uniforms::FrameUniforms;

/// Vertices in the full-screen quad generated by the raymarch vertex stage.
pub const QUAD_VERTEX_COUNT: u32 = 6;

/// Shader location of the mesh position attribute.
pub const POSITION_LOCATION: u32 = 0;

/// The draw call a frame issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    /// Full-screen quad from `vertex_index`, no vertex buffer bound.
    Quad,
    /// Indexed triangle list over the uploaded mesh.
    Indexed { index_count: u32 },
    /// Plain vertex list (mesh without faces, drawn as points).
    Vertices { vertex_count: u32 },
    /// Nothing to draw.
    Skip,
}

impl DrawCall {
    pub fn plan(raymarch: bool, vertex_count: u32, index_count: u32) -> Self {
        if raymarch {
            Self::Quad
        } else if vertex_count == 0 {
            Self::Skip
        } else if index_count > 0 {
            Self::Indexed { index_count }
        } else {
            Self::Vertices { vertex_count }
        }
    }

    /// Number of vertices the call submits.
    pub fn vertices(&self) -> u32 {
        match *self {
            Self::Quad => QUAD_VERTEX_COUNT,
            Self::Indexed { index_count } => index_count,
            Self::Vertices { vertex_count } => vertex_count,
            Self::Skip => 0,
        }
    }
}

pub(crate) struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    pub(crate) const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    pub(crate) fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }

    pub(crate) fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raymarch_always_draws_quad() {
        assert_eq!(DrawCall::plan(true, 0, 0), DrawCall::Quad);
        assert_eq!(DrawCall::plan(true, 0, 0).vertices(), 6);
    }

    #[test]
    fn empty_mesh_skips_draw() {
        let call = DrawCall::plan(false, 0, 0);
        assert_eq!(call, DrawCall::Skip);
        assert_eq!(call.vertices(), 0);
    }

    #[test]
    fn mesh_prefers_indices() {
        assert_eq!(
            DrawCall::plan(false, 8, 36),
            DrawCall::Indexed { index_count: 36 }
        );
        assert_eq!(
            DrawCall::plan(false, 8, 0),
            DrawCall::Vertices { vertex_count: 8 }
        );
    }
}
