use glam::UVec2;
use log::debug;

use super::reduce::{ReduceBound, ReduceMax};
use super::{Parameters, Preconditioner, SystemSlice};
use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{Bound, Buffer, ComputeSize, Device, ShaderLibrary, Work, WorkDesc, WorkResource};

const ERROR_CHECK_FREQUENCY: u32 = 4;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Push {
    n: u32,
    width: u32,
    red: u32,
    w: f32,
}

/// Multi-colour (red/black) Gauss–Seidel / SOR.
///
/// Used standalone as a baseline solver and, with a fixed iteration count,
/// as a smoother / preconditioner.
pub struct GaussSeidel {
    device: Device,
    work: Work,
    residual_work: Work,
    reduce_max: ReduceMax,
    scratch: Buffer<f32>,
    residual: Buffer<f32>,

    bound: Option<Bound>,
    residual_bound: Option<Bound>,
    residual_reduce: Option<ReduceBound>,
    x: Option<wgpu::Buffer>,

    push: Push,
    preconditioner_iterations: u32,
}

impl GaussSeidel {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2) -> GaussSeidel {
        let n = size.x * size.y;
        // Optimal SOR relaxation for the Poisson stencil on this grid.
        let w = 2.0 / (1.0 + (std::f32::consts::PI / (n as f32).sqrt()).sin());

        GaussSeidel {
            device: device.clone(),
            work: Work::new(
                device,
                shaders,
                WorkDesc {
                    label: "gauss-seidel",
                    shader: "gauss_seidel",
                    size: ComputeSize::linear(n),
                    bindings: &[bt::buffer(true), bt::buffer(true), bt::buffer(true), bt::buffer(false)],
                    push_constant_bytes: 16,
                },
            ),
            residual_work: Work::new(
                device,
                shaders,
                WorkDesc {
                    label: "gauss-seidel residual",
                    shader: "residual",
                    size: ComputeSize::linear(n),
                    bindings: &[
                        bt::buffer(true),
                        bt::buffer(true),
                        bt::buffer(true),
                        bt::buffer(true),
                        bt::buffer(false),
                    ],
                    push_constant_bytes: 8,
                },
            ),
            reduce_max: ReduceMax::new(device, shaders, size),
            scratch: Buffer::new(device, "gauss-seidel scratch", n as usize),
            residual: Buffer::new(device, "gauss-seidel max residual", 1),

            bound: None,
            residual_bound: None,
            residual_reduce: None,
            x: None,

            push: Push {
                n,
                width: size.x,
                red: 0,
                w,
            },
            preconditioner_iterations: 8,
        }
    }

    pub fn set_w(&mut self, w: f32) {
        self.push.w = w;
    }

    pub fn set_preconditioner_iterations(&mut self, iterations: u32) {
        self.preconditioner_iterations = iterations;
    }

    /// One red sweep followed by one black sweep.
    pub fn record_sweep(&self, pass: &mut wgpu::ComputePass<'_>) {
        let bound = self.bound.as_ref().expect("record before bind");
        let mut push = self.push;
        push.red = 1;
        bound.record_pushed(pass, bytemuck::bytes_of(&push));
        push.red = 0;
        bound.record_pushed(pass, bytemuck::bytes_of(&push));
    }

    /// Standalone SOR solve, iterating until the residual ∞-norm drops below
    /// the tolerance or the iteration bound is hit.
    pub fn solve(&mut self, params: &mut Parameters) {
        let x = self.x.clone().expect("solve before bind");
        let device = self.device.clone();

        device.execute_once(|encoder| {
            encoder.clear_buffer(&x, 0, None);
        });

        params.out_iterations = params.max_iterations;
        for i in 0..params.max_iterations {
            let mut encoder = self
                .device
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("gauss-seidel iteration"),
                });
            {
                let mut pass = compute_pass(&mut encoder, "gauss-seidel sweep");
                self.record_sweep(&mut pass);
            }
            self.device.queue().submit(Some(encoder.finish()));

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
            "gauss-seidel finished: {} iterations, error {}",
            params.out_iterations, params.out_error
        );
    }

    fn read_error(&self) -> f32 {
        let bound = self.residual_bound.as_ref().expect("error read before bind");
        let reduce = self.residual_reduce.as_ref().expect("error read before bind");
        let push = [self.push.n, self.push.width];
        self.device.execute_once(|encoder| {
            let mut pass = compute_pass(encoder, "gauss-seidel residual");
            bound.record_pushed(&mut pass, bytemuck::bytes_of(&push));
            reduce.record(&mut pass);
        });
        self.residual.read(&self.device)[0]
    }
}

impl Preconditioner for GaussSeidel {
    fn bind(&mut self, device: &Device, system: SystemSlice) {
        self.bound = Some(self.work.bind(
            device,
            &[
                WorkResource::Buffer(system.diagonal),
                WorkResource::Buffer(system.lower),
                WorkResource::Buffer(system.b),
                WorkResource::Buffer(system.x),
            ],
        ));
        self.residual_bound = Some(self.residual_work.bind(
            device,
            &[
                WorkResource::Buffer(system.diagonal),
                WorkResource::Buffer(system.lower),
                WorkResource::Buffer(system.b),
                WorkResource::Buffer(system.x),
                WorkResource::Buffer(self.scratch.raw()),
            ],
        ));
        self.residual_reduce = Some(self.reduce_max.bind(device, self.scratch.raw(), self.residual.raw()));
        self.x = Some(system.x.clone());
    }

    fn record(&self, encoder: &mut wgpu::CommandEncoder) {
        let x = self.x.as_ref().expect("record before bind");
        encoder.clear_buffer(x, 0, None);
        let mut pass = compute_pass(encoder, "gauss-seidel preconditioner");
        for _ in 0..self.preconditioner_iterations {
            self.record_sweep(&mut pass);
        }
    }
}
