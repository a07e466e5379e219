use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::geometry::Geometry;
use crate::shader::ProgramStages;
use crate::transform::Viewport;

use super::{DepthBuffer, DrawCall, FrameUniforms, LinkOptions, ShaderProgram, POSITION_LOCATION};

/// wgpu renderer for a single window, drawing either the raymarched quad or
/// one uploaded mesh.
///
/// Fields drop in declaration order: program, geometry buffers, uniform and
/// depth resources, surface, device, and the window last.
pub struct Renderer {
    program: Option<ShaderProgram>,
    mesh: Option<MeshBuffers>,
    depth: Option<DepthBuffer>,
    uniform_bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    raymarch: bool,
    size: PhysicalSize<u32>,
    config: wgpu::SurfaceConfiguration,
    surface: wgpu::Surface<'static>,
    queue: wgpu::Queue,
    device: wgpu::Device,
    window: Arc<Window>,
}

impl Renderer {
    /// Initializes the GPU for `window` and uploads everything the render loop
    /// needs. A missing `stages` (or a link failure) leaves the renderer
    /// without a program; frames are then cleared but nothing is drawn.
    pub async fn new(
        window: Arc<Window>,
        raymarch: bool,
        geometry: &Geometry,
        stages: Option<ProgramStages>,
    ) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        let adapter_info = adapter.get_info();
        info!(
            "using adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("viewer-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| *mode == wgpu::PresentMode::Mailbox)
                .unwrap_or(wgpu::PresentMode::Fifo),
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        info!(
            "surface configured: {:?} {}x{}",
            surface_format, size.width, size.height
        );

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(FrameUniforms::SIZE),
                },
                count: None,
            }],
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame-uniforms"),
            size: FrameUniforms::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform-bind-group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("viewer-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout],
            immediate_size: 0,
        });

        let mesh = if raymarch {
            None
        } else {
            MeshBuffers::from_geometry(&device, geometry)
        };
        let depth = (!raymarch).then(|| DepthBuffer::create(&device, size.width, size.height));

        let topology = if raymarch || geometry.index_count() > 0 {
            wgpu::PrimitiveTopology::TriangleList
        } else {
            wgpu::PrimitiveTopology::PointList
        };
        let position_layout = [wgpu::VertexBufferLayout {
            array_stride: MeshBuffers::STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 0,
                shader_location: POSITION_LOCATION,
            }],
        }];
        let vertex_buffers: &[wgpu::VertexBufferLayout] =
            if raymarch { &[] } else { &position_layout };

        let program = match stages {
            Some(stages) => {
                let options = LinkOptions {
                    layout: &pipeline_layout,
                    color_format: surface_format,
                    vertex_buffers,
                    topology,
                    depth: !raymarch,
                    uniform_size: FrameUniforms::SIZE,
                };
                ShaderProgram::link(&device, stages.vertex, stages.fragment, &options)
                    .await
                    .inspect_err(|err| error!("{err}"))
                    .ok()
            }
            None => None,
        };
        if program.is_none() {
            error!("no usable shader program; frames will be cleared only");
        }

        Ok(Self {
            program,
            mesh,
            depth,
            uniform_bind_group,
            uniform_buffer,
            raymarch,
            size,
            config,
            surface,
            queue,
            device,
            window,
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Current drawable size as a [`Viewport`].
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.size.width, self.size.height)
    }

    /// The draw call the next frame will issue.
    pub fn draw_call(&self) -> DrawCall {
        let (vertex_count, index_count) = self
            .mesh
            .as_ref()
            .map(|mesh| (mesh.vertex_count, mesh.index_count()))
            .unwrap_or((0, 0));
        DrawCall::plan(self.raymarch, vertex_count, index_count)
    }

    /// Reconfigures the surface (and depth buffer) for a new size. Zero-area
    /// sizes are ignored until the window is restored.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        debug!("resizing surface to {}x{}", new_size.width, new_size.height);
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        if self.depth.is_some() {
            self.depth = Some(DepthBuffer::create(
                &self.device,
                new_size.width,
                new_size.height,
            ));
        }
    }

    /// Reconfigures the surface at its current size.
    pub fn reconfigure(&mut self) {
        self.resize(self.window.inner_size());
    }

    /// Records and presents one frame.
    pub fn render(&mut self, uniforms: &FrameUniforms) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        // Queue writes are ordered before the submission below.
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let draw = self.draw_call();
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.03,
                            g: 0.03,
                            b: 0.05,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: self.depth.as_ref().map(|depth| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view: depth.view(),
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(program) = self.program.as_ref() {
                pass.set_pipeline(program.pipeline());
                pass.set_viewport(
                    0.0,
                    0.0,
                    self.size.width as f32,
                    self.size.height as f32,
                    0.0,
                    1.0,
                );
                pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                match (draw, self.mesh.as_ref()) {
                    (DrawCall::Quad, _) => pass.draw(0..draw.vertices(), 0..1),
                    (DrawCall::Indexed { index_count }, Some(mesh)) => {
                        if let Some(index) = mesh.index.as_ref() {
                            pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                            pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                            pass.draw_indexed(0..index_count, 0, 0..1);
                        }
                    }
                    (DrawCall::Vertices { vertex_count }, Some(mesh)) => {
                        pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                        pass.draw(0..vertex_count, 0..1);
                    }
                    _ => {}
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        debug!(
            "releasing GPU resources (program: {}, mesh: {})",
            self.program.is_some(),
            self.mesh.is_some()
        );
    }
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: Option<wgpu::Buffer>,
    vertex_count: u32,
}

impl MeshBuffers {
    const STRIDE: u64 = (3 * std::mem::size_of::<f32>()) as u64;

    /// Uploads geometry once. Empty geometry uploads nothing.
    fn from_geometry(device: &wgpu::Device, geometry: &Geometry) -> Option<Self> {
        if geometry.is_empty() {
            return None;
        }
        let positions = geometry.position_data();
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh-vertices"),
            contents: bytemuck::cast_slice(&positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = (geometry.index_count() > 0).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh-indices"),
                contents: bytemuck::cast_slice(&geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });
        Some(Self {
            vertex,
            index,
            vertex_count: geometry.vertex_count(),
        })
    }

    fn index_count(&self) -> u32 {
        self.index
            .as_ref()
            .map(|index| (index.size() / std::mem::size_of::<u32>() as u64) as u32)
            .unwrap_or(0)
    }
}
