use glam::UVec2;

use super::binding_builder::{BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc};
use super::device::Device;
use super::shader::{ShaderLibrary, SHADER_ENTRY_POINT_NAME};

/// Dispatch domain and workgroup size of a kernel.
#[derive(Clone, Copy)]
pub struct ComputeSize {
    pub work_size: [u32; 3],
    pub local_size: [u32; 3],
}

impl ComputeSize {
    /// 2D grid dispatch with the 8x8 workgroups every grid kernel uses.
    pub fn grid(size: UVec2) -> ComputeSize {
        ComputeSize {
            work_size: [size.x, size.y, 1],
            local_size: [8, 8, 1],
        }
    }

    /// 1D dispatch with 256-wide workgroups (particles, buffers).
    pub fn linear(count: u32) -> ComputeSize {
        ComputeSize {
            work_size: [count, 1, 1],
            local_size: [256, 1, 1],
        }
    }

    pub fn workgroups(&self) -> [u32; 3] {
        [
            self.work_size[0].div_ceil(self.local_size[0]),
            self.work_size[1].div_ceil(self.local_size[1]),
            self.work_size[2].div_ceil(self.local_size[2]),
        ]
    }
}

/// Resource slot handed to `Work::bind`. The variant must match the binding
/// type declared for the slot; a mismatch is a programming error.
pub enum WorkResource<'a> {
    Buffer(&'a wgpu::Buffer),
    Uniform(&'a wgpu::Buffer),
    Texture(&'a wgpu::TextureView),
    StorageTexture(&'a wgpu::TextureView),
}

pub struct WorkDesc<'a> {
    pub label: &'static str,
    pub shader: &'static str,
    pub size: ComputeSize,
    pub bindings: &'a [wgpu::BindingType],
    /// Size of the push constant range, 0 for none.
    pub push_constant_bytes: u32,
}

/// A compile-once compute kernel: pipeline + layout + workgroup size.
/// Binding resources yields a `Bound` that can be recorded any number of
/// times, directly or with an indirect workgroup count.
pub struct Work {
    label: &'static str,
    pipeline: wgpu::ComputePipeline,
    layout: BindGroupLayoutWithDesc,
    size: ComputeSize,
}

impl Work {
    pub fn new(device: &Device, shaders: &ShaderLibrary, desc: WorkDesc) -> Work {
        let mut layout_builder = BindGroupLayoutBuilder::new();
        for ty in desc.bindings {
            layout_builder = layout_builder.next_binding_compute(*ty);
        }
        let layout = layout_builder.create(device, desc.label);

        let push_constant_ranges = if desc.push_constant_bytes > 0 {
            vec![wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::COMPUTE,
                range: 0..desc.push_constant_bytes,
            }]
        } else {
            vec![]
        };

        let pipeline_layout = device
            .device()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &[&layout.layout],
                push_constant_ranges: &push_constant_ranges,
            });

        let pipeline = device
            .device()
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&pipeline_layout),
                module: shaders.get(desc.shader),
                entry_point: Some(SHADER_ENTRY_POINT_NAME),
                compilation_options: Default::default(),
                cache: None,
            });

        Work {
            label: desc.label,
            pipeline,
            layout,
            size: desc.size,
        }
    }

    /// Binds `resources` in layout order, using the dispatch domain from
    /// construction.
    pub fn bind(&self, device: &Device, resources: &[WorkResource]) -> Bound {
        self.bind_sized(device, self.size, resources)
    }

    /// Binds with an explicit dispatch domain (multigrid levels and reductions
    /// re-bind the same kernels at several sizes).
    pub fn bind_sized(&self, device: &Device, size: ComputeSize, resources: &[WorkResource]) -> Bound {
        assert_eq!(
            resources.len(),
            self.layout.entries.len(),
            "{}: bound {} resources, layout has {}",
            self.label,
            resources.len(),
            self.layout.entries.len()
        );

        let mut builder = BindGroupBuilder::new(&self.layout);
        for (slot, resource) in resources.iter().enumerate() {
            let expected = &self.layout.entries[slot].ty;
            match (resource, expected) {
                (WorkResource::Buffer(buffer), wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Storage { .. }, .. }) => {
                    builder = builder.buffer(buffer);
                }
                (WorkResource::Uniform(buffer), wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Uniform, .. }) => {
                    builder = builder.buffer(buffer);
                }
                (WorkResource::Texture(view), wgpu::BindingType::Texture { .. }) => {
                    builder = builder.texture(view);
                }
                (WorkResource::StorageTexture(view), wgpu::BindingType::StorageTexture { .. }) => {
                    builder = builder.texture(view);
                }
                _ => panic!("{}: resource {} does not match layout {:?}", self.label, slot, expected),
            }
        }
        let bind_group = builder.create(device, self.label);

        Bound {
            pipeline: self.pipeline.clone(),
            bind_group,
            size,
        }
    }
}

/// A kernel with its resources attached, ready to record.
#[derive(Clone)]
pub struct Bound {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    size: ComputeSize,
}

impl Bound {
    // Push constants require the pipeline to be bound first, so they are only
    // settable as part of a dispatch.
    fn prepare(&self, pass: &mut wgpu::ComputePass<'_>, push: Option<&[u8]>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        if let Some(data) = push {
            pass.set_push_constants(0, data);
        }
    }

    pub fn record(&self, pass: &mut wgpu::ComputePass<'_>) {
        self.prepare(pass, None);
        let groups = self.size.workgroups();
        pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
    }

    pub fn record_pushed(&self, pass: &mut wgpu::ComputePass<'_>, push: &[u8]) {
        self.prepare(pass, Some(push));
        let groups = self.size.workgroups();
        pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
    }

    /// Dispatch with the workgroup count sourced from the `work_size` field of
    /// a dispatch-parameters buffer (see `DispatchParams`).
    pub fn record_indirect(&self, pass: &mut wgpu::ComputePass<'_>, params: &wgpu::Buffer) {
        self.prepare(pass, None);
        pass.dispatch_workgroups_indirect(params, DISPATCH_PARAMS_WORK_SIZE_OFFSET);
    }

    pub fn record_indirect_pushed(&self, pass: &mut wgpu::ComputePass<'_>, params: &wgpu::Buffer, push: &[u8]) {
        self.prepare(pass, Some(push));
        pass.dispatch_workgroups_indirect(params, DISPATCH_PARAMS_WORK_SIZE_OFFSET);
    }
}

/// GPU-updated dispatch parameters: live element count plus the workgroup
/// triple indirect dispatches read.
#[repr(C)]
#[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DispatchParams {
    pub count: u32,
    pub work_size: [u32; 3],
}

impl DispatchParams {
    pub fn for_count(count: u32) -> DispatchParams {
        DispatchParams {
            count,
            work_size: [count.div_ceil(256), 1, 1],
        }
    }
}

/// Byte offset of `work_size` inside `DispatchParams`.
pub const DISPATCH_PARAMS_WORK_SIZE_OFFSET: u64 = 4;
