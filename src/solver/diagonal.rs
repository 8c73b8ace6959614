use glam::UVec2;

use super::{Preconditioner, SystemSlice};
use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{Bound, ComputeSize, Device, ShaderLibrary, Work, WorkDesc, WorkResource};

/// Jacobi preconditioner. The simplest of the lot, mostly useful to verify
/// that the preconditioned solver machinery works.
pub struct Diagonal {
    work: Work,
    bound: Option<Bound>,
    n: u32,
}

impl Diagonal {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2) -> Diagonal {
        let n = size.x * size.y;
        Diagonal {
            work: Work::new(
                device,
                shaders,
                WorkDesc {
                    label: "diagonal preconditioner",
                    shader: "diagonal",
                    size: ComputeSize::linear(n),
                    bindings: &[bt::buffer(true), bt::buffer(true), bt::buffer(false)],
                    push_constant_bytes: 4,
                },
            ),
            bound: None,
            n,
        }
    }
}

impl Preconditioner for Diagonal {
    fn bind(&mut self, device: &Device, system: SystemSlice) {
        self.bound = Some(self.work.bind(
            device,
            &[
                WorkResource::Buffer(system.diagonal),
                WorkResource::Buffer(system.b),
                WorkResource::Buffer(system.x),
            ],
        ));
    }

    fn record(&self, encoder: &mut wgpu::CommandEncoder) {
        let bound = self.bound.as_ref().expect("record before bind");
        let mut pass = compute_pass(encoder, "diagonal preconditioner");
        bound.record_pushed(&mut pass, bytemuck::bytes_of(&self.n));
    }
}
