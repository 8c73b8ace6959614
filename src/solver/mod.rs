pub mod conjugate_gradient;
pub mod diagonal;
pub mod gauss_seidel;
pub mod incomplete_poisson;
pub mod multigrid;
pub mod reduce;
pub mod transfer;

use glam::{UVec2, Vec2};

use crate::renderer::{Buffer, Device};

pub use conjugate_gradient::ConjugateGradient;
pub use diagonal::Diagonal;
pub use gauss_seidel::GaussSeidel;
pub use incomplete_poisson::IncompletePoisson;
pub use multigrid::Multigrid;
pub use reduce::{ReduceMax, ReduceSum, ReduceSumJ};
pub use transfer::Transfer;

/// The sparse SPD system assembled by the pressure module.
///
/// Only the strict lower triangle is stored: `lower[k].x` is the coefficient
/// towards cell `k-1`, `lower[k].y` towards cell `k-W`; the matrix is
/// symmetric so the upper entries are read from the neighbours' rows.
pub struct LinearSolverData {
    pub diagonal: Buffer<f32>,
    pub lower: Buffer<Vec2>,
    pub b: Buffer<f32>,
    pub x: Buffer<f32>,
}

impl LinearSolverData {
    pub fn new(device: &Device, size: UVec2) -> LinearSolverData {
        let n = (size.x * size.y) as usize;
        LinearSolverData {
            diagonal: Buffer::new(device, "solver diagonal", n),
            lower: Buffer::new(device, "solver lower", n),
            b: Buffer::new(device, "solver rhs", n),
            x: Buffer::new(device, "solver pressure", n),
        }
    }
}

/// Solver run bounds and results.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Parameters {
    pub max_iterations: u32,
    pub error_tolerance: f32,
    pub out_iterations: u32,
    pub out_error: f32,
}

impl Parameters {
    pub fn new(max_iterations: u32, error_tolerance: f32) -> Parameters {
        Parameters {
            max_iterations,
            error_tolerance,
            out_iterations: 0,
            out_error: 0.0,
        }
    }
}

/// Borrowed view of the buffers a preconditioner applies itself to.
/// The conjugate-gradient driver aliases `b` to its residual and `x` to the
/// auxiliary vector, so preconditioners never see the outer system's rhs.
#[derive(Clone, Copy)]
pub struct SystemSlice<'a> {
    pub diagonal: &'a wgpu::Buffer,
    pub lower: &'a wgpu::Buffer,
    pub b: &'a wgpu::Buffer,
    pub x: &'a wgpu::Buffer,
}

/// The narrow contract shared by all preconditioners: bind to a system, then
/// record the application `x := M⁻¹ b` into a command encoder.
pub trait Preconditioner {
    fn bind(&mut self, device: &Device, system: SystemSlice);
    fn record(&self, encoder: &mut wgpu::CommandEncoder);
}
