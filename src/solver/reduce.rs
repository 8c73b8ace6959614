use glam::UVec2;

use crate::renderer::{Bound, ComputeSize, Device, ShaderLibrary, Work, WorkDesc, WorkResource};
use crate::renderer::binding_types as bt;

const REDUCE_LOCAL_SIZE: u32 = 256;

/// Tree reduction over `n = size.x * size.y` elements down to a single one.
///
/// Each dispatch collapses 256 elements per workgroup into one partial,
/// ping-ponging between two scratch buffers owned by the reducer until a
/// single element lands in the caller's output buffer.
struct Reduce {
    work: Work,
    scratch: [wgpu::Buffer; 2],
    n: u32,
}

impl Reduce {
    fn new(device: &Device, shaders: &ShaderLibrary, shader: &'static str, label: &'static str, size: UVec2, element_size: u64) -> Reduce {
        let n = size.x * size.y;
        let scratch_len = (n.div_ceil(REDUCE_LOCAL_SIZE)).max(1) as u64;
        let scratch = [
            device.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{} scratch 0", label)),
                size: scratch_len * element_size,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            }),
            device.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{} scratch 1", label)),
                size: (scratch_len.div_ceil(REDUCE_LOCAL_SIZE as u64)).max(1) * element_size,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            }),
        ];

        let work = Work::new(
            device,
            shaders,
            WorkDesc {
                label,
                shader,
                size: ComputeSize::linear(n),
                bindings: &[bt::buffer(true), bt::buffer(false)],
                push_constant_bytes: 4,
            },
        );

        Reduce { work, scratch, n }
    }

    fn bind(&self, device: &Device, input: &wgpu::Buffer, output: &wgpu::Buffer) -> ReduceBound {
        let mut levels = Vec::new();
        let mut remaining = self.n;
        let mut level = 0;
        loop {
            let src = if level == 0 { input } else { &self.scratch[(level - 1) % 2] };
            let next = remaining.div_ceil(REDUCE_LOCAL_SIZE);
            let dst = if next <= 1 { output } else { &self.scratch[level % 2] };
            levels.push((
                self.work.bind_sized(
                    device,
                    ComputeSize::linear(remaining),
                    &[WorkResource::Buffer(src), WorkResource::Buffer(dst)],
                ),
                remaining,
            ));
            if next <= 1 {
                break;
            }
            remaining = next;
            level += 1;
        }
        ReduceBound { levels }
    }
}

pub struct ReduceBound {
    levels: Vec<(Bound, u32)>,
}

impl ReduceBound {
    pub fn record(&self, pass: &mut wgpu::ComputePass<'_>) {
        for (bound, n) in &self.levels {
            bound.record_pushed(pass, bytemuck::bytes_of(n));
        }
    }
}

pub struct ReduceSum(Reduce);

impl ReduceSum {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2) -> ReduceSum {
        ReduceSum(Reduce::new(device, shaders, "reduce_sum", "reduce sum", size, 4))
    }

    pub fn bind(&self, device: &Device, input: &wgpu::Buffer, output: &wgpu::Buffer) -> ReduceBound {
        self.0.bind(device, input, output)
    }
}

/// Reduces to the maximum *magnitude* of the inputs.
pub struct ReduceMax(Reduce);

impl ReduceMax {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2) -> ReduceMax {
        ReduceMax(Reduce::new(device, shaders, "reduce_max", "reduce max", size, 4))
    }

    pub fn bind(&self, device: &Device, input: &wgpu::Buffer, output: &wgpu::Buffer) -> ReduceBound {
        self.0.bind(device, input, output)
    }
}

/// Reduction over `(force.x, force.y, torque, 0)` quadruples, used to gather
/// the pressure force a rigid body receives.
pub struct ReduceSumJ(Reduce);

impl ReduceSumJ {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2) -> ReduceSumJ {
        ReduceSumJ(Reduce::new(device, shaders, "reduce_sum_j", "reduce sum j", size, 16))
    }

    pub fn bind(&self, device: &Device, input: &wgpu::Buffer, output: &wgpu::Buffer) -> ReduceBound {
        self.0.bind(device, input, output)
    }
}
