use crate::shader::{check_interface, CompiledStage, ProgramInterface, ShaderError};

use super::DepthBuffer;

/// Fixed-function state the program is linked against.
pub struct LinkOptions<'a> {
    pub layout: &'a wgpu::PipelineLayout,
    pub color_format: wgpu::TextureFormat,
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub topology: wgpu::PrimitiveTopology,
    pub depth: bool,
    /// Size of the uniform buffer bound at `@group(0) @binding(0)`.
    pub uniform_size: u64,
}

impl LinkOptions<'_> {
    fn vertex_locations(&self) -> Vec<u32> {
        self.vertex_buffers
            .iter()
            .flat_map(|buffer| buffer.attributes.iter().map(|attribute| attribute.shader_location))
            .collect()
    }
}

/// Linked vertex + fragment program. Owns the render pipeline; the shader
/// modules it was built from are released once linking finishes.
pub struct ShaderProgram {
    pipeline: wgpu::RenderPipeline,
}

impl ShaderProgram {
    /// Links two compiled stages. Both stages are consumed whether or not
    /// linking succeeds. Validation errors raised by the device while the
    /// modules and pipeline are created are returned as link errors.
    pub async fn link(
        device: &wgpu::Device,
        vertex: CompiledStage,
        fragment: CompiledStage,
        options: &LinkOptions<'_>,
    ) -> Result<Self, ShaderError> {
        let vertex_locations = options.vertex_locations();
        let interface = ProgramInterface {
            vertex_inputs: &vertex_locations,
            uniform_size: options.uniform_size,
        };
        check_interface(&vertex, &fragment, &interface)?;

        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("vertex-stage"),
            source: wgpu::ShaderSource::Wgsl(vertex.source().into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fragment-stage"),
            source: wgpu::ShaderSource::Wgsl(fragment.source().into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("viewer-pipeline"),
            layout: Some(options.layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(vertex.entry_point()),
                compilation_options: Default::default(),
                buffers: options.vertex_buffers,
            },
            primitive: wgpu::PrimitiveState {
                topology: options.topology,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: options.depth.then(|| wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(fragment.entry_point()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: options.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview_mask: None,
            cache: None,
        });

        match scope.pop().await {
            Some(err) => Err(ShaderError::Link {
                log: err.to_string(),
            }),
            None => Ok(Self { pipeline }),
        }
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }
}
