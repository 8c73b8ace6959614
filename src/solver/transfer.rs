use glam::UVec2;

use crate::renderer::binding_types as bt;
use crate::renderer::{Bound, ComputeSize, Device, ShaderLibrary, Work, WorkDesc, WorkResource};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Push {
    fine_width: u32,
    fine_height: u32,
    coarse_width: u32,
    coarse_height: u32,
}

/// Inter-grid operators for the multigrid hierarchy.
///
/// Restriction is full weighting, `(1,3,3,1) ⊗ (1,3,3,1) / 64`, each fine
/// contribution scaled by the fine/coarse diagonal ratio so the coarse system
/// stays solvable; prolongation applies the transpose `(9,3,3,1) / 16`
/// stencil and accumulates into the fine unknown.
pub struct Transfer {
    prolongate_work: Work,
    restrict_work: Work,
    prolongate_bounds: Vec<Option<(Bound, Push)>>,
    restrict_bounds: Vec<Option<(Bound, Push)>>,
}

impl Transfer {
    pub fn new(device: &Device, shaders: &ShaderLibrary) -> Transfer {
        let buffer_bindings = &[
            bt::buffer(false),
            bt::buffer(true),
            bt::buffer(true),
            bt::buffer(true),
        ];
        Transfer {
            prolongate_work: Work::new(
                device,
                shaders,
                WorkDesc {
                    label: "transfer prolongate",
                    shader: "transfer_prolongate",
                    size: ComputeSize::linear(1),
                    bindings: buffer_bindings,
                    push_constant_bytes: 16,
                },
            ),
            restrict_work: Work::new(
                device,
                shaders,
                WorkDesc {
                    label: "transfer restrict",
                    shader: "transfer_restrict",
                    size: ComputeSize::linear(1),
                    bindings: buffer_bindings,
                    push_constant_bytes: 16,
                },
            ),
            prolongate_bounds: Vec::new(),
            restrict_bounds: Vec::new(),
        }
    }

    fn slot<T>(bounds: &mut Vec<Option<T>>, level: usize) -> &mut Option<T> {
        if bounds.len() <= level {
            bounds.resize_with(level + 1, || None);
        }
        &mut bounds[level]
    }

    /// `fine_x += P(coarse_x)` for the given level.
    pub fn init_prolongate(
        &mut self,
        device: &Device,
        level: usize,
        fine_size: UVec2,
        fine_x: &wgpu::Buffer,
        fine_diagonal: &wgpu::Buffer,
        coarse_x: &wgpu::Buffer,
        coarse_diagonal: &wgpu::Buffer,
    ) {
        let coarse_size = coarse_size_of(fine_size);
        let push = Push {
            fine_width: fine_size.x,
            fine_height: fine_size.y,
            coarse_width: coarse_size.x,
            coarse_height: coarse_size.y,
        };
        let bound = self.prolongate_work.bind_sized(
            device,
            ComputeSize::linear(fine_size.x * fine_size.y),
            &[
                WorkResource::Buffer(fine_x),
                WorkResource::Buffer(fine_diagonal),
                WorkResource::Buffer(coarse_x),
                WorkResource::Buffer(coarse_diagonal),
            ],
        );
        *Self::slot(&mut self.prolongate_bounds, level) = Some((bound, push));
    }

    /// `coarse_b = R(fine_r)` for the given level.
    pub fn init_restrict(
        &mut self,
        device: &Device,
        level: usize,
        fine_size: UVec2,
        fine_r: &wgpu::Buffer,
        fine_diagonal: &wgpu::Buffer,
        coarse_b: &wgpu::Buffer,
        coarse_diagonal: &wgpu::Buffer,
    ) {
        let coarse_size = coarse_size_of(fine_size);
        let push = Push {
            fine_width: fine_size.x,
            fine_height: fine_size.y,
            coarse_width: coarse_size.x,
            coarse_height: coarse_size.y,
        };
        let bound = self.restrict_work.bind_sized(
            device,
            ComputeSize::linear(coarse_size.x * coarse_size.y),
            &[
                WorkResource::Buffer(coarse_b),
                WorkResource::Buffer(coarse_diagonal),
                WorkResource::Buffer(fine_r),
                WorkResource::Buffer(fine_diagonal),
            ],
        );
        *Self::slot(&mut self.restrict_bounds, level) = Some((bound, push));
    }

    pub fn prolongate(&self, pass: &mut wgpu::ComputePass<'_>, level: usize) {
        let (bound, push) = self.prolongate_bounds[level]
            .as_ref()
            .expect("prolongate before init");
        bound.record_pushed(pass, bytemuck::bytes_of(push));
    }

    pub fn restrict(&self, pass: &mut wgpu::ComputePass<'_>, level: usize) {
        let (bound, push) = self.restrict_bounds[level].as_ref().expect("restrict before init");
        bound.record_pushed(pass, bytemuck::bytes_of(push));
    }
}

/// Size of the next-coarser level for a given fine size.
pub fn coarse_size_of(fine: UVec2) -> UVec2 {
    UVec2::new(fine.x / 2 + 1, fine.y / 2 + 1)
}
