use freelook_common::{Rgba, Viewport};
use freelook_render::{
    Frame, FrameCommand, GraphicsBackend, LinkedProgram, MeshData, RenderError, ShaderCompileError, ShaderStage,
};
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Pipeline plus the uniform buffer and bind group it reads, if the linked
/// pair declares a uniform block.
pub struct WgpuProgram {
    pipeline: wgpu::RenderPipeline,
    uniforms: Option<UniformBinding>,
}

struct UniformBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Static vertex and index buffers for one mesh.
pub struct WgpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// wgpu-backed graphics context bound to one window surface.
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    pending: Option<wgpu::SurfaceTexture>,
}

impl WgpuBackend {
    /// Create the device and configure the window's surface.
    pub fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let size = window.inner_size();
        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::ContextUnavailable(format!("create surface: {e}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| RenderError::ContextUnavailable("no compatible adapter".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("freelook_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| RenderError::ContextUnavailable(format!("request device: {e}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| RenderError::Surface("surface reports no formats".into()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_texture(&device, config.width, config.height);

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            format = ?surface_format,
            "GPU initialized"
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            pending: None,
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Present the image rendered by the last `execute`, if any.
    pub fn present(&mut self) {
        if let Some(output) = self.pending.take() {
            output.present();
        }
    }

    fn reconfigure(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_texture(&self.device, self.config.width, self.config.height);
        tracing::debug!(width = self.config.width, height = self.config.height, "surface reconfigured");
    }

    /// Run `f` inside a validation error scope and map a captured error to `stage`.
    fn scoped<T>(&self, stage: ShaderStage, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, ShaderCompileError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(ShaderCompileError::new(stage, err.to_string())),
            None => Ok(value),
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    type Program = WgpuProgram;
    type Geometry = WgpuGeometry;

    fn create_program(&mut self, linked: &LinkedProgram) -> Result<WgpuProgram, RenderError> {
        let iface = &linked.interface;
        let vertex_format = vertex_format(iface.position_components).ok_or_else(|| {
            ShaderCompileError::new(
                ShaderStage::Link,
                format!("unsupported position width {}", iface.position_components),
            )
        })?;

        let vertex_module = self.scoped(ShaderStage::Vertex, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("vertex_shader"),
                source: wgpu::ShaderSource::Wgsl(linked.vertex_source.as_str().into()),
            })
        })?;
        let fragment_module = self.scoped(ShaderStage::Fragment, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("fragment_shader"),
                source: wgpu::ShaderSource::Wgsl(linked.fragment_source.as_str().into()),
            })
        })?;

        let mut bind_group_layouts = Vec::new();
        let uniforms = match uniform_buffer_size(iface.uniforms.size) {
            Some(size) => {
                let (layout, binding) = self.scoped(ShaderStage::Link, |device| create_uniform_binding(device, size))?;
                bind_group_layouts.push(layout);
                Some(binding)
            }
            None => {
                tracing::debug!("program has no uniform block, skipping bind group");
                None
            }
        };

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &bind_group_layouts.iter().collect::<Vec<_>>(),
            push_constant_ranges: &[],
        });

        let attributes = [wgpu::VertexAttribute {
            format: vertex_format,
            offset: 0,
            shader_location: 0,
        }];
        let surface_format = self.config.format;
        let pipeline = self.scoped(ShaderStage::Link, |device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("scene_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some(iface.vertex_entry.as_str()),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: vertex_format.size(),
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some(iface.fragment_entry.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        })?;

        Ok(WgpuProgram { pipeline, uniforms })
    }

    fn upload_geometry(&mut self, mesh: &MeshData) -> Result<WgpuGeometry, RenderError> {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("vertex_buffer"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("index_buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let index_count = u32::try_from(mesh.indices.len())
            .map_err(|_| RenderError::InvalidGeometry("index count exceeds u32".into()))?;
        Ok(WgpuGeometry {
            vertex_buffer,
            index_buffer,
            index_count,
        })
    }

    fn execute(&mut self, frame: &Frame<'_, WgpuProgram, WgpuGeometry>) -> Result<(), RenderError> {
        if let Some(vp) = frame.viewport() {
            if (vp.width(), vp.height()) != (self.config.width, self.config.height) {
                self.reconfigure(vp.width(), vp.height());
            }
        }
        // A frame that was never presented is discarded.
        self.pending = None;

        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                tracing::warn!("surface lost or outdated, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(RenderError::Surface(e.to_string())),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut clear: Option<(Rgba, f32)> = None;
        let mut viewport: Option<Viewport> = None;
        let mut current: Option<&WgpuProgram> = None;
        let mut draws: Vec<(&WgpuProgram, &WgpuGeometry, u32)> = Vec::new();
        for command in &frame.commands {
            match command {
                FrameCommand::Clear { color, depth } => clear = Some((*color, *depth)),
                FrameCommand::SetViewport(vp) => viewport = Some(*vp),
                FrameCommand::UseProgram(p) => current = Some(*p),
                FrameCommand::WriteUniforms(bytes) => match current {
                    Some(WgpuProgram {
                        uniforms: Some(u), ..
                    }) if !bytes.is_empty() => self.queue.write_buffer(&u.buffer, 0, bytes),
                    Some(_) => {}
                    None => tracing::warn!("uniform write without a program, ignored"),
                },
                FrameCommand::DrawIndexed {
                    geometry,
                    index_count,
                } => match current {
                    Some(p) => draws.push((p, *geometry, (*index_count).min(geometry.index_count))),
                    None => tracing::warn!("draw without a program, ignored"),
                },
            }
        }

        let (color_load, depth_load) = match clear {
            Some((color, depth)) => (wgpu::LoadOp::Clear(clear_color(color)), wgpu::LoadOp::Clear(depth)),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            if let Some(vp) = viewport {
                let width = vp.width().min(self.config.width);
                let height = vp.height().min(self.config.height);
                pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            }
            for (program, geometry, index_count) in draws {
                pass.set_pipeline(&program.pipeline);
                if let Some(u) = &program.uniforms {
                    pass.set_bind_group(freelook_render::shader::UNIFORM_GROUP, &u.bind_group, &[]);
                }
                pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.pending = Some(output);
        Ok(())
    }

    fn release_program(&mut self, program: WgpuProgram) {
        if let Some(u) = program.uniforms {
            u.buffer.destroy();
        }
        tracing::debug!("released program");
    }

    fn release_geometry(&mut self, geometry: WgpuGeometry) {
        geometry.vertex_buffer.destroy();
        geometry.index_buffer.destroy();
        tracing::debug!("released geometry");
    }
}

/// Size of the uniform buffer for a reflected block, `None` when there is no block.
fn uniform_buffer_size(block_size: u32) -> Option<wgpu::BufferSize> {
    wgpu::BufferSize::new(u64::from(block_size))
}

fn create_uniform_binding(device: &wgpu::Device, size: wgpu::BufferSize) -> (wgpu::BindGroupLayout, UniformBinding) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("uniform_buffer"),
        size: size.get(),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("uniform_bind_group_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: freelook_render::shader::UNIFORM_BINDING,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: Some(size),
            },
            count: None,
        }],
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("uniform_bind_group"),
        layout: &layout,
        entries: &[wgpu::BindGroupEntry {
            binding: freelook_render::shader::UNIFORM_BINDING,
            resource: buffer.as_entire_binding(),
        }],
    });

    (layout, UniformBinding { buffer, bind_group })
}

/// Vertex format for a float position with `components` entries.
fn vertex_format(components: u32) -> Option<wgpu::VertexFormat> {
    match components {
        2 => Some(wgpu::VertexFormat::Float32x2),
        3 => Some(wgpu::VertexFormat::Float32x3),
        _ => None,
    }
}

fn clear_color(color: Rgba) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(color.r()),
        g: f64::from(color.g()),
        b: f64::from(color.b()),
        a: f64::from(color.a()),
    }
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}
