use glam::UVec2;
use log::debug;

use super::reduce::{ReduceBound, ReduceMax, ReduceSum};
use super::{LinearSolverData, Parameters, Preconditioner, SystemSlice};
use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{Bound, Buffer, ComputeSize, Device, ShaderLibrary, Work, WorkDesc, WorkResource};

/// How many iterations run between residual readbacks. The final iteration
/// always performs an exact check.
const ERROR_CHECK_FREQUENCY: u32 = 4;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GridPush {
    n: u32,
    width: u32,
}

/// Preconditioned conjugate gradient over the variational pressure system.
///
/// All vectors and scalars stay GPU-resident; the host only reads the reduced
/// residual back between iteration batches to decide termination.
pub struct ConjugateGradient {
    device: Device,
    n: u32,
    push: GridPush,

    r: Buffer<f32>,
    z: Buffer<f32>,
    p: Buffer<f32>,
    q: Buffer<f32>,
    scratch: Buffer<f32>,
    rho: Buffer<f32>,
    rho_new: Buffer<f32>,
    sigma: Buffer<f32>,
    residual: Buffer<f32>,

    init_work: Work,
    apply_matrix_work: Work,
    update_xr_work: Work,
    update_p_work: Work,
    multiply_work: Work,
    reduce_sum: ReduceSum,
    reduce_max: ReduceMax,

    bounds: Option<CgBounds>,
}

struct CgBounds {
    init: Bound,
    residual_reduce: ReduceBound,
    apply_matrix: Bound,
    sigma_reduce: ReduceBound,
    update_xr: Bound,
    rz_multiply: Bound,
    rho_init_reduce: ReduceBound,
    rho_new_reduce: ReduceBound,
    update_p: Bound,
}

impl ConjugateGradient {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2) -> ConjugateGradient {
        let n = size.x * size.y;

        let init_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "cg init",
                shader: "cg_init",
                size: ComputeSize::linear(n),
                bindings: &[bt::buffer(true), bt::buffer(false), bt::buffer(false), bt::buffer(false)],
                push_constant_bytes: 8,
            },
        );
        let apply_matrix_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "cg apply matrix",
                shader: "cg_apply_matrix",
                size: ComputeSize::linear(n),
                bindings: &[
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(false),
                    bt::buffer(false),
                ],
                push_constant_bytes: 8,
            },
        );
        let update_xr_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "cg update x and r",
                shader: "cg_update_xr",
                size: ComputeSize::linear(n),
                bindings: &[
                    bt::buffer(false),
                    bt::buffer(false),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(false),
                ],
                push_constant_bytes: 8,
            },
        );
        let update_p_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "cg update search",
                shader: "cg_update_p",
                size: ComputeSize::linear(n),
                bindings: &[bt::buffer(false), bt::buffer(true), bt::buffer(true), bt::buffer(true)],
                push_constant_bytes: 8,
            },
        );
        let multiply_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "cg multiply",
                shader: "multiply",
                size: ComputeSize::linear(n),
                bindings: &[bt::buffer(true), bt::buffer(true), bt::buffer(false)],
                push_constant_bytes: 4,
            },
        );

        ConjugateGradient {
            device: device.clone(),
            n,
            push: GridPush { n, width: size.x },

            r: Buffer::new(device, "cg residual", n as usize),
            z: Buffer::new(device, "cg auxiliary", n as usize),
            p: Buffer::new(device, "cg search", n as usize),
            q: Buffer::new(device, "cg A*search", n as usize),
            scratch: Buffer::new(device, "cg scratch", n as usize),
            rho: Buffer::new(device, "cg rho", 1),
            rho_new: Buffer::new(device, "cg rho'", 1),
            sigma: Buffer::new(device, "cg sigma", 1),
            residual: Buffer::new(device, "cg max residual", 1),

            init_work,
            apply_matrix_work,
            update_xr_work,
            update_p_work,
            multiply_work,
            reduce_sum: ReduceSum::new(device, shaders, size),
            reduce_max: ReduceMax::new(device, shaders, size),

            bounds: None,
        }
    }

    /// Binds the solver to a system for plain (un-preconditioned) CG.
    pub fn init(&mut self, device: &Device, data: &LinearSolverData) {
        let bounds = CgBounds {
            init: self.init_work.bind(
                device,
                &[
                    WorkResource::Buffer(data.b.raw()),
                    WorkResource::Buffer(data.x.raw()),
                    WorkResource::Buffer(self.r.raw()),
                    WorkResource::Buffer(self.scratch.raw()),
                ],
            ),
            residual_reduce: self.reduce_max.bind(device, self.scratch.raw(), self.residual.raw()),
            apply_matrix: self.apply_matrix_work.bind(
                device,
                &[
                    WorkResource::Buffer(data.diagonal.raw()),
                    WorkResource::Buffer(data.lower.raw()),
                    WorkResource::Buffer(self.p.raw()),
                    WorkResource::Buffer(self.q.raw()),
                    WorkResource::Buffer(self.scratch.raw()),
                ],
            ),
            sigma_reduce: self.reduce_sum.bind(device, self.scratch.raw(), self.sigma.raw()),
            update_xr: self.update_xr_work.bind(
                device,
                &[
                    WorkResource::Buffer(data.x.raw()),
                    WorkResource::Buffer(self.r.raw()),
                    WorkResource::Buffer(self.p.raw()),
                    WorkResource::Buffer(self.q.raw()),
                    WorkResource::Buffer(self.rho.raw()),
                    WorkResource::Buffer(self.sigma.raw()),
                    WorkResource::Buffer(self.scratch.raw()),
                ],
            ),
            rz_multiply: self.multiply_work.bind(
                device,
                &[
                    WorkResource::Buffer(self.r.raw()),
                    WorkResource::Buffer(self.z.raw()),
                    WorkResource::Buffer(self.scratch.raw()),
                ],
            ),
            rho_init_reduce: self.reduce_sum.bind(device, self.scratch.raw(), self.rho.raw()),
            rho_new_reduce: self.reduce_sum.bind(device, self.scratch.raw(), self.rho_new.raw()),
            update_p: self.update_p_work.bind(
                device,
                &[
                    WorkResource::Buffer(self.p.raw()),
                    WorkResource::Buffer(self.z.raw()),
                    WorkResource::Buffer(self.rho.raw()),
                    WorkResource::Buffer(self.rho_new.raw()),
                ],
            ),
        };
        self.bounds = Some(bounds);
    }

    /// Binds the solver and a preconditioner. The preconditioner is aliased to
    /// the solver's residual (as rhs) and auxiliary vector (as unknown).
    pub fn init_preconditioned(&mut self, device: &Device, data: &LinearSolverData, precond: &mut dyn Preconditioner) {
        self.init(device, data);
        precond.bind(
            device,
            SystemSlice {
                diagonal: data.diagonal.raw(),
                lower: data.lower.raw(),
                b: self.r.raw(),
                x: self.z.raw(),
            },
        );
    }

    /// Plain conjugate gradient (`z` is just a copy of `r`).
    pub fn normal_solve(&mut self, params: &mut Parameters) {
        self.solve_impl(None, params);
    }

    /// Preconditioned conjugate gradient.
    pub fn solve(&mut self, precond: &dyn Preconditioner, params: &mut Parameters) {
        self.solve_impl(Some(precond), params);
    }

    fn read_error(&self) -> f32 {
        self.residual.read(&self.device)[0].sqrt()
    }

    fn solve_impl(&mut self, precond: Option<&dyn Preconditioner>, params: &mut Parameters) {
        let bounds = self.bounds.as_ref().expect("solve before init");
        let device = self.device.clone();
        let push = self.push;

        // x := 0, r := b, residual := max(r^2)
        device.execute_once(|encoder| {
            let mut pass = compute_pass(encoder, "cg init");
            bounds.init.record_pushed(&mut pass, bytemuck::bytes_of(&push));
            bounds.residual_reduce.record(&mut pass);
        });

        let initial_error = self.read_error();
        if initial_error < params.error_tolerance {
            // Zero (or already-solved) right-hand side: x stays zeroed.
            params.out_iterations = 0;
            params.out_error = initial_error;
            return;
        }

        // z := M⁻¹ r, p := z, rho := <r, z>
        {
            let mut encoder = device
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("cg setup") });
            match precond {
                Some(precond) => precond.record(&mut encoder),
                None => encoder.copy_buffer_to_buffer(self.r.raw(), 0, self.z.raw(), 0, self.r.size_in_bytes()),
            }
            {
                let mut pass = compute_pass(&mut encoder, "cg rho");
                bounds.rz_multiply.record_pushed(&mut pass, bytemuck::bytes_of(&push.n));
                bounds.rho_init_reduce.record(&mut pass);
            }
            encoder.copy_buffer_to_buffer(self.z.raw(), 0, self.p.raw(), 0, self.z.size_in_bytes());
            device.queue().submit(Some(encoder.finish()));
        }

        params.out_iterations = params.max_iterations;
        params.out_error = initial_error;

        for i in 0..params.max_iterations {
            let mut encoder = device
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("cg iteration") });
            {
                let mut pass = compute_pass(&mut encoder, "cg alpha and update");
                bounds.apply_matrix.record_pushed(&mut pass, bytemuck::bytes_of(&push));
                bounds.sigma_reduce.record(&mut pass);
                bounds.update_xr.record_pushed(&mut pass, bytemuck::bytes_of(&push));
                bounds.residual_reduce.record(&mut pass);
            }
            match precond {
                Some(precond) => precond.record(&mut encoder),
                None => encoder.copy_buffer_to_buffer(self.r.raw(), 0, self.z.raw(), 0, self.r.size_in_bytes()),
            }
            {
                let mut pass = compute_pass(&mut encoder, "cg beta and search update");
                bounds.rz_multiply.record_pushed(&mut pass, bytemuck::bytes_of(&push.n));
                bounds.rho_new_reduce.record(&mut pass);
                bounds.update_p.record_pushed(&mut pass, bytemuck::bytes_of(&push));
            }
            encoder.copy_buffer_to_buffer(self.rho_new.raw(), 0, self.rho.raw(), 0, 4);
            device.queue().submit(Some(encoder.finish()));

            let iterations_done = i + 1;
            if iterations_done % ERROR_CHECK_FREQUENCY == 0 || iterations_done == params.max_iterations {
                let error = self.read_error();
                params.out_error = error;
                if error < params.error_tolerance {
                    params.out_iterations = iterations_done;
                    break;
                }
            }
        }

        debug!(
            "cg finished: {} iterations, error {}",
            params.out_iterations, params.out_error
        );
    }
}
