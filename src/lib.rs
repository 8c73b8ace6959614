//! Real-time 2D incompressible fluid simulation on the GPU.
//!
//! Two regimes share one numerical core: a smoke-like field carried by a
//! continuous velocity grid, and a free-surface liquid represented by
//! particles plus a signed distance field, both coupled to rigid bodies that
//! exchange momentum with the fluid. Everything heavy runs as wgpu compute
//! kernels; the host records command buffers, keeps state GPU-resident and
//! drives the iterative pressure solver.

pub use glam;
pub use wgpu;

pub mod advection;
pub mod density;
pub mod extrapolation;
pub mod level_set;
pub mod particles;
pub mod prefix_scan;
pub mod pressure;
pub mod renderer;
pub mod rigidbody;
pub mod solver;
pub mod splat;
pub mod world;

pub use advection::Advection;
pub use density::Density;
pub use extrapolation::Extrapolation;
pub use level_set::LevelSet;
pub use particles::{Particle, Particles, PARTICLES_PER_CELL};
pub use prefix_scan::PrefixScan;
pub use pressure::Pressure;
pub use renderer::{Buffer, CommandBuffer, Device, DispatchParams, DoubleBuffered, InitError, ShaderLibrary, Texture};
pub use rigidbody::{Rigidbody, RigidbodyForces, RigidbodyShape, RigidbodyVelocity};
pub use solver::{
    ConjugateGradient, Diagonal, GaussSeidel, IncompletePoisson, LinearSolverData, Multigrid, Parameters,
    Preconditioner, ReduceMax, ReduceSum, SystemSlice, Transfer,
};
pub use splat::{Splat, SplatOp, SplatShape};
pub use world::{PreconditionerKind, World};
