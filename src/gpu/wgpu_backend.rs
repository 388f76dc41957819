//! wgpu implementation of the binding layer
//!
//! Draws issued during a frame are recorded together with a snapshot of the
//! program's uniform block, then encoded into a single render pass when the
//! frame is presented.

use std::num::NonZeroU64;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::reflect::{self, UniformLayout};
use super::{
    BufferId, BufferKind, GpuBackend, GpuInitError, MAX_TEXTURE_UNITS, PixelFormat, ProgramError,
    ProgramId, Stage, TextureId, TextureImage, UniformValue, VertexArrayId, VertexLayout,
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_UNIFORM_CAPACITY: u64 = 16 * 1024;
const MIN_UNIFORM_BLOCK: usize = 16;

struct Program {
    fill: wgpu::RenderPipeline,
    line: Option<wgpu::RenderPipeline>,
    layout: UniformLayout,
    /// CPU copy of the uniform block, snapshotted on every draw
    staging: Vec<u8>,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

#[derive(Clone, Copy)]
struct VertexArray {
    vertex_buffer: u32,
    index_buffer: u32,
}

#[derive(Debug, Clone, Copy)]
struct DrawCall {
    program: ProgramId,
    vertex_array: VertexArrayId,
    index_count: u32,
    textures: [TextureId; MAX_TEXTURE_UNITS],
    uniform_offset: u32,
    wireframe: bool,
}

/// Per-frame recording, reset on present
#[derive(Default)]
struct FrameState {
    clear: Option<wgpu::Color>,
    uniform_bytes: Vec<u8>,
    draws: SmallVec<[DrawCall; 8]>,
}

/// GPU backend on top of wgpu
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    vertex_layout: VertexLayout,
    uniform_bind_group_layout: wgpu::BindGroupLayout,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    fallback: GpuTexture,
    line_mode_supported: bool,
    uniform_alignment: usize,
    uniform_buffer: wgpu::Buffer,
    uniform_capacity: u64,
    uniform_groups: FxHashMap<u32, wgpu::BindGroup>,
    texture_sets: FxHashMap<[u32; MAX_TEXTURE_UNITS], wgpu::BindGroup>,
    next_id: u32,
    buffers: FxHashMap<u32, wgpu::Buffer>,
    vertex_arrays: FxHashMap<u32, VertexArray>,
    textures: FxHashMap<u32, GpuTexture>,
    programs: FxHashMap<u32, Program>,
    current_program: ProgramId,
    units: [TextureId; MAX_TEXTURE_UNITS],
    wireframe: bool,
    frame: FrameState,
}

impl WgpuBackend {
    /// Create the backend for a window
    ///
    /// `vertex_layout` is the single interleaved layout every pipeline and
    /// vertex array uses.
    ///
    /// # Errors
    ///
    /// Returns an error if no surface, adapter or device can be created
    pub async fn new(
        window: Arc<Window>,
        vsync: bool,
        vertex_layout: VertexLayout,
    ) -> Result<Self, GpuInitError> {
        let size = window.inner_size();
        let size = (size.width.max(1), size.height.max(1));

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuInitError::NoAdapter)?;

        log::info!("Using GPU: {:?}", adapter.get_info().name);

        let line_mode_supported = adapter
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE);
        let required_features = if line_mode_supported {
            wgpu::Features::POLYGON_MODE_LINE
        } else {
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Engine Device"),
                    required_features,
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders write colour values unconverted, like a plain GL framebuffer
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.0,
            height: size.1,
            present_mode,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_view = Self::create_depth_view(&device, size.0, size.1);

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Uniform Block Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Texture Units Layout"),
                entries: &[
                    // Diffuse, normal, specular
                    texture_entry(0),
                    texture_entry(1),
                    texture_entry(2),
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Program Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        // Repeat wrap, trilinear minification, bilinear magnification
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("texture_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let fallback_texture = device.create_texture_with_data(
            &queue,
            &wgpu::TextureDescriptor {
                label: Some("white_texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let fallback = GpuTexture {
            view: fallback_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _texture: fallback_texture,
        };

        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as usize;
        let uniform_buffer = Self::create_uniform_buffer(&device, INITIAL_UNIFORM_CAPACITY);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            vertex_layout,
            uniform_bind_group_layout,
            texture_bind_group_layout,
            pipeline_layout,
            sampler,
            fallback,
            line_mode_supported,
            uniform_alignment,
            uniform_buffer,
            uniform_capacity: INITIAL_UNIFORM_CAPACITY,
            uniform_groups: FxHashMap::default(),
            texture_sets: FxHashMap::default(),
            next_id: 0,
            buffers: FxHashMap::default(),
            vertex_arrays: FxHashMap::default(),
            textures: FxHashMap::default(),
            programs: FxHashMap::default(),
            current_program: ProgramId::NONE,
            units: [TextureId::NONE; MAX_TEXTURE_UNITS],
            wireframe: false,
            frame: FrameState::default(),
        })
    }

    fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn create_stage_module(
        &self,
        stage: Stage,
        source: &str,
    ) -> Result<wgpu::ShaderModule, ProgramError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    Stage::Vertex => "Vertex Stage",
                    Stage::Fragment => "Fragment Stage",
                }),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(ProgramError::Compile {
                stage,
                message: error.to_string(),
            }),
            None => Ok(module),
        }
    }

    fn create_pipeline(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
        polygon_mode: wgpu::PolygonMode,
    ) -> wgpu::RenderPipeline {
        let attributes: Vec<wgpu::VertexAttribute> = self
            .vertex_layout
            .attributes
            .iter()
            .map(|attribute| wgpu::VertexAttribute {
                format: match attribute.components {
                    1 => wgpu::VertexFormat::Float32,
                    2 => wgpu::VertexFormat::Float32x2,
                    3 => wgpu::VertexFormat::Float32x3,
                    _ => wgpu::VertexFormat::Float32x4,
                },
                offset: u64::from(attribute.offset),
                shader_location: attribute.location,
            })
            .collect();

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Program Pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some(Stage::Vertex.entry_point()),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: u64::from(self.vertex_layout.stride),
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some(Stage::Fragment.entry_point()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
                cache: None,
            })
    }

    fn ensure_uniform_group(&mut self, program: ProgramId) {
        if self.uniform_groups.contains_key(&program.raw()) {
            return;
        }
        let Some(entry) = self.programs.get(&program.raw()) else {
            return;
        };
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Block"),
            layout: &self.uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &self.uniform_buffer,
                    offset: 0,
                    size: NonZeroU64::new(entry.staging.len() as u64),
                }),
            }],
        });
        self.uniform_groups.insert(program.raw(), bind_group);
    }

    fn ensure_texture_set(&mut self, units: [TextureId; MAX_TEXTURE_UNITS]) {
        let key = units.map(TextureId::raw);
        if self.texture_sets.contains_key(&key) {
            return;
        }
        let view = |id: TextureId| {
            self.textures
                .get(&id.raw())
                .map_or(&self.fallback.view, |t| &t.view)
        };
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texture Units"),
            layout: &self.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view(units[0])),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view(units[1])),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(view(units[2])),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.texture_sets.insert(key, bind_group);
    }

    fn encode_draw(&self, pass: &mut wgpu::RenderPass<'_>, draw: &DrawCall) {
        let (Some(program), Some(vertex_array)) = (
            self.programs.get(&draw.program.raw()),
            self.vertex_arrays.get(&draw.vertex_array.raw()),
        ) else {
            return;
        };
        let (Some(vertex_buffer), Some(index_buffer)) = (
            self.buffers.get(&vertex_array.vertex_buffer),
            self.buffers.get(&vertex_array.index_buffer),
        ) else {
            return;
        };
        let (Some(uniforms), Some(textures)) = (
            self.uniform_groups.get(&draw.program.raw()),
            self.texture_sets.get(&draw.textures.map(TextureId::raw)),
        ) else {
            return;
        };

        let pipeline = if draw.wireframe {
            program.line.as_ref().unwrap_or(&program.fill)
        } else {
            &program.fill
        };

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, uniforms, &[draw.uniform_offset]);
        pass.set_bind_group(1, textures, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..draw.index_count, 0, 0..1);
    }
}

impl GpuBackend for WgpuBackend {
    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> BufferId {
        if contents.is_empty() {
            return BufferId::NONE;
        }
        let (label, usage) = match kind {
            BufferKind::Vertex => ("Vertex Buffer", wgpu::BufferUsages::VERTEX),
            BufferKind::Index => ("Index Buffer", wgpu::BufferUsages::INDEX),
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });
        let id = self.allocate_id();
        self.buffers.insert(id, buffer);
        BufferId::from_raw(id)
    }

    fn delete_buffer(&mut self, id: BufferId) {
        if let Some(buffer) = self.buffers.remove(&id.raw()) {
            buffer.destroy();
        }
    }

    fn create_vertex_array(
        &mut self,
        vertex_buffer: BufferId,
        index_buffer: BufferId,
        layout: VertexLayout,
    ) -> VertexArrayId {
        if layout != self.vertex_layout {
            log::error!("Vertex layout does not match the pipeline layout");
            return VertexArrayId::NONE;
        }
        if !self.buffers.contains_key(&vertex_buffer.raw())
            || !self.buffers.contains_key(&index_buffer.raw())
        {
            log::error!("Vertex array needs one vertex buffer and one index buffer");
            return VertexArrayId::NONE;
        }
        let id = self.allocate_id();
        self.vertex_arrays.insert(
            id,
            VertexArray {
                vertex_buffer: vertex_buffer.raw(),
                index_buffer: index_buffer.raw(),
            },
        );
        VertexArrayId::from_raw(id)
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        self.vertex_arrays.remove(&id.raw());
    }

    fn create_texture(&mut self, image: &TextureImage) -> TextureId {
        let (format, texel_bytes) = upload_format(image.format);

        let levels: Vec<std::borrow::Cow<'_, [u8]>> = image
            .levels
            .iter()
            .map(|data| match image.format {
                PixelFormat::Rgb => std::borrow::Cow::Owned(
                    data.chunks_exact(3)
                        .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                        .collect(),
                ),
                _ => std::borrow::Cow::Borrowed(data.as_slice()),
            })
            .collect();

        let well_formed = !levels.is_empty()
            && levels.iter().enumerate().all(|(level, data)| {
                let (w, h) = image.level_size(level);
                data.len() == (w * h * texel_bytes) as usize
            });
        if image.width == 0 || image.height == 0 || !well_formed {
            log::error!(
                "Malformed texture upload: {}x{} with {} levels",
                image.width,
                image.height,
                image.levels.len()
            );
            return TextureId::NONE;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Texture"),
            size: wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, data) in levels.iter().enumerate() {
            let (width, height) = image.level_size(level);
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(width * texel_bytes),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = self.allocate_id();
        self.textures.insert(
            id,
            GpuTexture {
                _texture: texture,
                view,
            },
        );
        TextureId::from_raw(id)
    }

    fn delete_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id.raw()).is_none() {
            return;
        }
        self.texture_sets.retain(|key, _| !key.contains(&id.raw()));
        for unit in &mut self.units {
            if *unit == id {
                *unit = TextureId::NONE;
            }
        }
    }

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, ProgramError> {
        let layout = reflect::link(vertex_source, fragment_source)?;
        let vertex = self.create_stage_module(Stage::Vertex, vertex_source)?;
        let fragment = self.create_stage_module(Stage::Fragment, fragment_source)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let fill = self.create_pipeline(&vertex, &fragment, wgpu::PolygonMode::Fill);
        let line = self
            .line_mode_supported
            .then(|| self.create_pipeline(&vertex, &fragment, wgpu::PolygonMode::Line));
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ProgramError::Link(error.to_string()));
        }

        let staging = vec![0; (layout.size() as usize).max(MIN_UNIFORM_BLOCK)];
        let id = self.allocate_id();
        self.programs.insert(
            id,
            Program {
                fill,
                line,
                layout,
                staging,
            },
        );
        Ok(ProgramId::from_raw(id))
    }

    fn delete_program(&mut self, id: ProgramId) {
        self.programs.remove(&id.raw());
        self.uniform_groups.remove(&id.raw());
        if self.current_program == id {
            self.current_program = ProgramId::NONE;
        }
    }

    fn use_program(&mut self, id: ProgramId) {
        self.current_program = id;
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: UniformValue) {
        let Some(entry) = self.programs.get_mut(&program.raw()) else {
            return;
        };
        let Some(field) = entry.layout.find(name) else {
            log::trace!("Uniform `{name}` not found in program {}", program.raw());
            return;
        };
        if field.kind != value.kind() {
            log::trace!("Uniform `{name}` set with mismatched type");
            return;
        }
        let offset = field.offset as usize;
        value.write_to(&mut entry.staging[offset..]);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if let Some(slot) = self.units.get_mut(unit as usize) {
            *slot = texture;
        }
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayId, index_count: u32) {
        if index_count == 0 || !self.vertex_arrays.contains_key(&vertex_array.raw()) {
            return;
        }
        let Some(program) = self.programs.get(&self.current_program.raw()) else {
            return;
        };

        let uniform_offset = self.frame.uniform_bytes.len();
        self.frame.uniform_bytes.extend_from_slice(&program.staging);
        let padded = self
            .frame
            .uniform_bytes
            .len()
            .next_multiple_of(self.uniform_alignment);
        self.frame.uniform_bytes.resize(padded, 0);

        self.frame.draws.push(DrawCall {
            program: self.current_program,
            vertex_array,
            index_count,
            textures: self.units,
            uniform_offset: uniform_offset as u32,
            wireframe: self.wireframe,
        });
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.frame.clear = Some(wgpu::Color {
            r: f64::from(color[0]),
            g: f64::from(color[1]),
            b: f64::from(color[2]),
            a: f64::from(color[3]),
        });
    }

    fn set_wireframe(&mut self, enabled: bool) {
        if enabled && !self.line_mode_supported {
            log::warn!("Wireframe requested but the adapter has no line polygon mode");
        }
        self.wireframe = enabled;
    }

    fn present(&mut self) {
        let frame = std::mem::take(&mut self.frame);

        let needed = frame.uniform_bytes.len() as u64;
        if needed > self.uniform_capacity {
            self.uniform_capacity = needed.next_power_of_two();
            self.uniform_buffer = Self::create_uniform_buffer(&self.device, self.uniform_capacity);
            self.uniform_groups.clear();
        }
        if !frame.uniform_bytes.is_empty() {
            self.queue
                .write_buffer(&self.uniform_buffer, 0, &frame.uniform_bytes);
        }
        for draw in &frame.draws {
            self.ensure_uniform_group(draw.program);
            self.ensure_texture_set(draw.textures);
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: frame.clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: if frame.clear.is_some() {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &frame.draws {
                self.encode_draw(&mut pass, draw);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = Self::create_depth_view(&self.device, width, height);

            log::debug!("Resized to {}x{}", width, height);
        }
    }
}

/// GPU format and bytes per texel for an upload
///
/// Texels are sampled as stored, with no sRGB decode, since normal and
/// specular maps hold data rather than colour. RGB is widened to RGBA with
/// opaque alpha because no 24-bit format exists.
fn upload_format(format: PixelFormat) -> (wgpu::TextureFormat, u32) {
    match format {
        PixelFormat::Red => (wgpu::TextureFormat::R8Unorm, 1),
        PixelFormat::Rgb | PixelFormat::Rgba => (wgpu::TextureFormat::Rgba8Unorm, 4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploads_skip_srgb_decode() {
        for format in [PixelFormat::Red, PixelFormat::Rgb, PixelFormat::Rgba] {
            let (texture_format, _) = upload_format(format);
            assert!(!texture_format.is_srgb(), "{format:?} uploads as {texture_format:?}");
        }
        assert_eq!(upload_format(PixelFormat::Rgb).1, 4);
        assert_eq!(upload_format(PixelFormat::Red).1, 1);
    }
}
