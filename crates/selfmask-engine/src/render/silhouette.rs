use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::model::{MeshHandle, MeshLibrary};
use crate::scene::DrawList;

use super::common::{depth_stencil_state, shader_module, uniform_entry};
use super::target::{Attachment, RenderTarget, TargetError, ROBOT_MARKER};

/// Background quad sits at this fraction of the far plane.
const BACKGROUND_DEPTH_FACTOR: f32 = 0.99;

/// Per-frame camera inputs for the silhouette pass.
#[derive(Debug, Copy, Clone)]
pub struct SilhouetteView {
    pub clip_from_camera: Mat4,
    pub near: f32,
    pub far: f32,
}

impl SilhouetteView {
    /// Linear and NDC depth of the background quad.
    pub fn background_depth(&self) -> (f32, f32) {
        let d = self.far * BACKGROUND_DEPTH_FACTOR;
        let c = self.clip_from_camera * glam::Vec4::new(0.0, 0.0, d, 1.0);
        (d, c.z / c.w)
    }
}

struct GpuMesh {
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
    index_count: u32,
}

/// Renders the robot silhouette into the scratch attachment.
///
/// Output, per pixel:
/// - scratch `r`: linear depth of the front-most surface (background quad where nothing else)
/// - scratch `g`: 1 where robot geometry won the depth test
/// - stencil: `ROBOT_MARKER` exactly where `g` is 1
#[derive(Default)]
pub struct SilhouetteRenderer {
    mesh_pipeline: Option<wgpu::RenderPipeline>,
    background_pipeline: Option<wgpu::RenderPipeline>,

    link_bgl: Option<wgpu::BindGroupLayout>,
    frame_ubo: Option<wgpu::Buffer>,
    frame_bind_group: Option<wgpu::BindGroup>,

    link_ubo: Option<wgpu::Buffer>,
    link_bind_group: Option<wgpu::BindGroup>,
    link_capacity: usize,
    link_stride: u64,

    meshes: Vec<Option<GpuMesh>>,
    link_scratch: Vec<u8>,
}

impl SilhouetteRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the silhouette pass. Clears scratch, depth and stencil first.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        view: &SilhouetteView,
        draws: &DrawList,
        library: &MeshLibrary,
    ) -> Result<(), TargetError> {
        self.ensure_pipelines(device);

        for d in draws.items() {
            self.ensure_mesh(device, library, d.mesh);
        }
        let visible: Vec<(usize, MeshHandle)> = draws
            .items()
            .iter()
            .enumerate()
            .filter(|(_, d)| self.mesh(d.mesh).is_some())
            .map(|(i, d)| (i, d.mesh))
            .collect();

        self.write_frame_uniform(queue, view);
        self.ensure_link_capacity(device, draws.len().max(1));
        self.write_link_uniforms(queue, draws);

        let Some(mesh_pipeline) = self.mesh_pipeline.as_ref() else { return Ok(()) };
        let Some(background_pipeline) = self.background_pipeline.as_ref() else { return Ok(()) };
        let Some(frame_bg) = self.frame_bind_group.as_ref() else { return Ok(()) };
        let Some(link_bg) = self.link_bind_group.as_ref() else { return Ok(()) };

        let mut rpass = target.begin_pass(
            encoder,
            "selfmask silhouette pass",
            Attachment::Scratch,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            wgpu::LoadOp::Clear(1.0),
            wgpu::LoadOp::Clear(0),
        )?;

        rpass.set_pipeline(background_pipeline);
        rpass.set_bind_group(0, frame_bg, &[]);
        rpass.draw(0..3, 0..1);

        rpass.set_pipeline(mesh_pipeline);
        rpass.set_stencil_reference(ROBOT_MARKER);
        rpass.set_bind_group(0, frame_bg, &[]);
        for (slot, handle) in visible {
            let Some(mesh) = self.mesh(handle) else { continue };
            let offset = (slot as u64 * self.link_stride) as wgpu::DynamicOffset;
            rpass.set_bind_group(1, link_bg, &[offset]);
            rpass.set_vertex_buffer(0, mesh.vbo.slice(..));
            rpass.set_index_buffer(mesh.ibo.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        Ok(())
    }

    fn mesh(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(handle.index()).and_then(Option::as_ref)
    }

    fn ensure_mesh(&mut self, device: &wgpu::Device, library: &MeshLibrary, handle: MeshHandle) {
        if self.mesh(handle).is_some() {
            return;
        }
        let Some(data) = library.get(handle) else {
            log::debug!("silhouette: unknown mesh handle {handle:?}");
            return;
        };
        if data.is_empty() {
            return;
        }

        let vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("selfmask mesh vbo"),
            contents: bytemuck::cast_slice(&data.positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("selfmask mesh ibo"),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        if self.meshes.len() <= handle.index() {
            self.meshes.resize_with(handle.index() + 1, || None);
        }
        self.meshes[handle.index()] = Some(GpuMesh {
            vbo,
            ibo,
            index_count: data.indices.len() as u32,
        });
    }

    fn ensure_pipelines(&mut self, device: &wgpu::Device) {
        if self.mesh_pipeline.is_some() && self.background_pipeline.is_some() {
            return;
        }

        let shader = shader_module(device, "selfmask silhouette shader", include_str!("shaders/silhouette.wgsl"));

        let frame_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("selfmask silhouette frame bgl"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                false,
            )],
        });
        let link_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("selfmask silhouette link bgl"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX, true)],
        });

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("selfmask silhouette mesh layout"),
            bind_group_layouts: &[&frame_bgl, &link_bgl],
            immediate_size: 0,
        });
        let background_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("selfmask silhouette background layout"),
            bind_group_layouts: &[&frame_bgl],
            immediate_size: 0,
        });

        let target = [Some(wgpu::ColorTargetState {
            format: Attachment::Scratch.format(),
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let primitive = wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        };

        let mesh_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("selfmask silhouette mesh pipeline"),
            layout: Some(&mesh_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_mesh"),
                compilation_options: Default::default(),
                buffers: &[MeshVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_mesh"),
                compilation_options: Default::default(),
                targets: &target,
            }),
            primitive,
            // Every rasterised robot fragment that wins the depth test is tagged.
            depth_stencil: Some(depth_stencil_state(
                true,
                wgpu::CompareFunction::Less,
                wgpu::CompareFunction::Always,
                wgpu::StencilOperation::Replace,
                0xff,
            )),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let background_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("selfmask silhouette background pipeline"),
            layout: Some(&background_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_background"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_background"),
                compilation_options: Default::default(),
                targets: &target,
            }),
            primitive,
            // Stencil writes disabled: the background never tags a pixel.
            depth_stencil: Some(depth_stencil_state(
                true,
                wgpu::CompareFunction::Less,
                wgpu::CompareFunction::Always,
                wgpu::StencilOperation::Keep,
                0x00,
            )),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let frame_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("selfmask silhouette frame ubo"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("selfmask silhouette frame bind group"),
            layout: &frame_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_ubo.as_entire_binding(),
            }],
        });

        let align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let size = std::mem::size_of::<LinkUniform>() as u64;
        self.link_stride = size.div_ceil(align) * align;

        self.mesh_pipeline = Some(mesh_pipeline);
        self.background_pipeline = Some(background_pipeline);
        self.link_bgl = Some(link_bgl);
        self.frame_ubo = Some(frame_ubo);
        self.frame_bind_group = Some(frame_bind_group);

        self.link_ubo = None;
        self.link_bind_group = None;
        self.link_capacity = 0;
    }

    fn ensure_link_capacity(&mut self, device: &wgpu::Device, required: usize) {
        if required <= self.link_capacity && self.link_bind_group.is_some() {
            return;
        }
        let Some(bgl) = self.link_bgl.as_ref() else { return };

        let capacity = required.next_power_of_two().max(16);
        let link_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("selfmask silhouette link ubo"),
            size: capacity as u64 * self.link_stride,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let link_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("selfmask silhouette link bind group"),
            layout: bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &link_ubo,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<LinkUniform>() as u64),
                }),
            }],
        });

        self.link_ubo = Some(link_ubo);
        self.link_bind_group = Some(link_bind_group);
        self.link_capacity = capacity;
    }

    fn write_frame_uniform(&self, queue: &wgpu::Queue, view: &SilhouetteView) {
        let Some(ubo) = self.frame_ubo.as_ref() else { return };
        let (linear, ndc) = view.background_depth();
        let u = FrameUniform {
            clip_from_camera: view.clip_from_camera.to_cols_array_2d(),
            background: [ndc, linear, 0.0, 0.0],
        };
        queue.write_buffer(ubo, 0, bytemuck::bytes_of(&u));
    }

    fn write_link_uniforms(&mut self, queue: &wgpu::Queue, draws: &DrawList) {
        let Some(ubo) = self.link_ubo.as_ref() else { return };
        if draws.is_empty() {
            return;
        }

        let stride = self.link_stride as usize;
        self.link_scratch.clear();
        self.link_scratch.resize(draws.len() * stride, 0);
        for (i, d) in draws.items().iter().enumerate() {
            let u = LinkUniform {
                camera_from_mesh: d.camera_from_mesh_f32().to_cols_array_2d(),
            };
            let bytes = bytemuck::bytes_of(&u);
            self.link_scratch[i * stride..i * stride + bytes.len()].copy_from_slice(bytes);
        }
        queue.write_buffer(ubo, 0, &self.link_scratch);
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FrameUniform {
    clip_from_camera: [[f32; 4]; 4],
    background: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct LinkUniform {
    camera_from_mesh: [[f32; 4]; 4],
}

struct MeshVertex;

impl MeshVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![
        0 => Float32x3 // position
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 3]>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}
