use glam::UVec2;

use super::gauss_seidel::GaussSeidel;
use super::transfer::{coarse_size_of, Transfer};
use super::{LinearSolverData, Preconditioner, SystemSlice};
use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{Bound, Buffer, ComputeSize, Device, ShaderLibrary, Texture, Work, WorkDesc, WorkResource};

const PRE_SMOOTH_SWEEPS: u32 = 2;
const POST_SMOOTH_SWEEPS: u32 = 2;
const COARSEST_SWEEPS: u32 = 32;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GridPush {
    n: u32,
    width: u32,
}

/// One coarse level of the hierarchy: its own system, level sets and smoother.
struct Level {
    size: UVec2,
    data: LinearSolverData,
    liquid_phi: Texture,
    solid_phi: Texture,
    smoother: GaussSeidel,
    residual: Buffer<f32>,
    residual_bound: Option<Bound>,
    build_matrix_bound: Option<Bound>,
    downsample_bounds: Option<(Bound, Bound)>,
}

/// Geometric multigrid V-cycle preconditioner.
///
/// The finest level lives in the caller's system; every coarser level holds
/// restricted level sets and a matrix re-assembled from them, so the coarse
/// operators see the same free surface and obstacles the fine one does.
pub struct Multigrid {
    device: Device,
    transfer: Transfer,
    residual_work: Work,
    downsample_work: Work,
    build_matrix_work: Work,
    finest_smoother: GaussSeidel,
    levels: Vec<Level>,
    finest_size: UVec2,
    dt: f32,

    finest_residual: Buffer<f32>,
    finest_residual_bound: Option<Bound>,
    finest_x: Option<wgpu::Buffer>,
}

impl Multigrid {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2, dt: f32) -> Multigrid {
        let depth = (size.x.min(size.y) as f32).log2() as u32 - 2;
        let coarse_levels = depth.saturating_sub(1).max(1);

        let residual_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "multigrid residual",
                shader: "residual",
                size: ComputeSize::linear(size.x * size.y),
                bindings: &[
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(false),
                ],
                push_constant_bytes: 8,
            },
        );
        let downsample_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "multigrid phi downsample",
                shader: "phi_downsample",
                size: ComputeSize::grid(size),
                bindings: &[bt::texture2d(), bt::image2d(wgpu::TextureFormat::R32Float)],
                push_constant_bytes: 0,
            },
        );
        let build_matrix_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "multigrid build matrix",
                shader: "build_matrix",
                size: ComputeSize::grid(size),
                bindings: &[
                    bt::texture2d(),
                    bt::texture2d(),
                    bt::buffer(false),
                    bt::buffer(false),
                ],
                push_constant_bytes: 4,
            },
        );

        let mut levels = Vec::new();
        let mut level_size = size;
        for l in 0..coarse_levels {
            level_size = coarse_size_of(level_size);
            let mut smoother = GaussSeidel::new(device, shaders, level_size);
            smoother.set_w(1.0);
            levels.push(Level {
                size: level_size,
                data: LinearSolverData::new(device, level_size),
                liquid_phi: Texture::new(
                    device,
                    &format!("multigrid liquid phi {}", l),
                    level_size,
                    wgpu::TextureFormat::R32Float,
                ),
                solid_phi: Texture::new(
                    device,
                    &format!("multigrid solid phi {}", l),
                    level_size,
                    wgpu::TextureFormat::R32Float,
                ),
                smoother,
                residual: Buffer::new(device, "multigrid level residual", (level_size.x * level_size.y) as usize),
                residual_bound: None,
                build_matrix_bound: None,
                downsample_bounds: None,
            });
        }

        Multigrid {
            device: device.clone(),
            transfer: Transfer::new(device, shaders),
            residual_work,
            downsample_work,
            build_matrix_work,
            finest_smoother: {
                let mut smoother = GaussSeidel::new(device, shaders, size);
                smoother.set_w(1.0);
                smoother
            },
            levels,
            finest_size: size,
            dt,

            finest_residual: Buffer::new(device, "multigrid finest residual", (size.x * size.y) as usize),
            finest_residual_bound: None,
            finest_x: None,
        }
    }

    /// Attaches the finest-level fields and wires the per-level rebuild and
    /// transfer bindings. Call once; `build_hierarchies` does the per-frame
    /// rebuild.
    pub fn build_hierarchies_init(&mut self, device: &Device, solid_phi: &Texture, liquid_phi: &Texture) {
        for l in 0..self.levels.len() {
            let (fine_liquid, fine_solid) = if l == 0 {
                (liquid_phi.clone(), solid_phi.clone())
            } else {
                (self.levels[l - 1].liquid_phi.clone(), self.levels[l - 1].solid_phi.clone())
            };

            let level = &self.levels[l];
            let size = level.size;
            let downsample_liquid = self.downsample_work.bind_sized(
                device,
                ComputeSize::grid(size),
                &[
                    WorkResource::Texture(fine_liquid.view()),
                    WorkResource::StorageTexture(level.liquid_phi.view()),
                ],
            );
            let downsample_solid = self.downsample_work.bind_sized(
                device,
                ComputeSize::grid(size),
                &[
                    WorkResource::Texture(fine_solid.view()),
                    WorkResource::StorageTexture(level.solid_phi.view()),
                ],
            );
            let build_matrix = self.build_matrix_work.bind_sized(
                device,
                ComputeSize::grid(size),
                &[
                    WorkResource::Texture(level.liquid_phi.view()),
                    WorkResource::Texture(level.solid_phi.view()),
                    WorkResource::Buffer(level.data.diagonal.raw()),
                    WorkResource::Buffer(level.data.lower.raw()),
                ],
            );
            let residual_bound = self.residual_work.bind_sized(
                device,
                ComputeSize::linear(size.x * size.y),
                &[
                    WorkResource::Buffer(level.data.diagonal.raw()),
                    WorkResource::Buffer(level.data.lower.raw()),
                    WorkResource::Buffer(level.data.b.raw()),
                    WorkResource::Buffer(level.data.x.raw()),
                    WorkResource::Buffer(level.residual.raw()),
                ],
            );

            let level = &mut self.levels[l];
            level.downsample_bounds = Some((downsample_liquid, downsample_solid));
            level.build_matrix_bound = Some(build_matrix);
            level.residual_bound = Some(residual_bound);

            // Smoothers bind to their own level's system.
            let Level { data, smoother, .. } = &mut self.levels[l];
            let slice = SystemSlice {
                diagonal: data.diagonal.raw(),
                lower: data.lower.raw(),
                b: data.b.raw(),
                x: data.x.raw(),
            };
            smoother.bind(device, slice);
        }

        // Inter-level transfers between consecutive coarse levels. Slot 0 of
        // the transfer tables is finest <-> first coarse, bound in `bind`
        // since the finest buffers belong to the outer solver.
        for l in 1..self.levels.len() {
            let (fine, coarse) = {
                let (a, b) = self.levels.split_at(l);
                (&a[l - 1], &b[0])
            };
            self.transfer.init_restrict(
                device,
                l,
                fine.size,
                fine.residual.raw(),
                fine.data.diagonal.raw(),
                coarse.data.b.raw(),
                coarse.data.diagonal.raw(),
            );
            self.transfer.init_prolongate(
                device,
                l,
                fine.size,
                fine.data.x.raw(),
                fine.data.diagonal.raw(),
                coarse.data.x.raw(),
                coarse.data.diagonal.raw(),
            );
        }
    }

    /// Rebuilds every level's level sets and matrix. Run whenever the fine
    /// level sets changed (once per step).
    pub fn build_hierarchies(&self) {
        let dt = self.dt;
        self.device.execute_once(|encoder| {
            let mut pass = compute_pass(encoder, "multigrid build hierarchies");
            for level in &self.levels {
                let (liquid, solid) = level.downsample_bounds.as_ref().expect("build before init");
                liquid.record(&mut pass);
                solid.record(&mut pass);
                let build = level.build_matrix_bound.as_ref().expect("build before init");
                build.record_pushed(&mut pass, bytemuck::bytes_of(&dt));
            }
        });
    }

    fn record_level_residual(&self, pass: &mut wgpu::ComputePass<'_>, level: &Level) {
        let bound = level.residual_bound.as_ref().expect("record before init");
        let push = GridPush {
            n: level.size.x * level.size.y,
            width: level.size.x,
        };
        bound.record_pushed(pass, bytemuck::bytes_of(&push));
    }
}

impl Preconditioner for Multigrid {
    fn bind(&mut self, device: &Device, system: SystemSlice) {
        self.finest_smoother.bind(device, system);
        self.finest_residual_bound = Some(self.residual_work.bind_sized(
            device,
            ComputeSize::linear(self.finest_size.x * self.finest_size.y),
            &[
                WorkResource::Buffer(system.diagonal),
                WorkResource::Buffer(system.lower),
                WorkResource::Buffer(system.b),
                WorkResource::Buffer(system.x),
                WorkResource::Buffer(self.finest_residual.raw()),
            ],
        ));
        self.finest_x = Some(system.x.clone());

        if let Some(first) = self.levels.first() {
            self.transfer.init_restrict(
                device,
                0,
                self.finest_size,
                self.finest_residual.raw(),
                system.diagonal,
                first.data.b.raw(),
                first.data.diagonal.raw(),
            );
            self.transfer.init_prolongate(
                device,
                0,
                self.finest_size,
                system.x,
                system.diagonal,
                first.data.x.raw(),
                first.data.diagonal.raw(),
            );
        }
    }

    fn record(&self, encoder: &mut wgpu::CommandEncoder) {
        let finest_x = self.finest_x.as_ref().expect("record before bind");
        encoder.clear_buffer(finest_x, 0, None);
        for level in &self.levels {
            encoder.clear_buffer(level.data.x.raw(), 0, None);
        }

        let mut pass = compute_pass(encoder, "multigrid v-cycle");

        // Downstroke: smooth, measure the residual, push it down a level.
        for _ in 0..PRE_SMOOTH_SWEEPS {
            self.finest_smoother.record_sweep(&mut pass);
        }
        let finest_bound = self.finest_residual_bound.as_ref().expect("record before bind");
        let push = GridPush {
            n: self.finest_size.x * self.finest_size.y,
            width: self.finest_size.x,
        };
        finest_bound.record_pushed(&mut pass, bytemuck::bytes_of(&push));
        self.transfer.restrict(&mut pass, 0);

        for l in 0..self.levels.len().saturating_sub(1) {
            let level = &self.levels[l];
            for _ in 0..PRE_SMOOTH_SWEEPS {
                level.smoother.record_sweep(&mut pass);
            }
            self.record_level_residual(&mut pass, level);
            self.transfer.restrict(&mut pass, l + 1);
        }

        // Coarsest level gets enough sweeps to act as a direct-ish solve.
        if let Some(coarsest) = self.levels.last() {
            for _ in 0..COARSEST_SWEEPS {
                coarsest.smoother.record_sweep(&mut pass);
            }
        }

        // Upstroke: pull the correction up and smooth it in.
        for l in (0..self.levels.len().saturating_sub(1)).rev() {
            self.transfer.prolongate(&mut pass, l + 1);
            let level = &self.levels[l];
            for _ in 0..POST_SMOOTH_SWEEPS {
                level.smoother.record_sweep(&mut pass);
            }
        }
        self.transfer.prolongate(&mut pass, 0);
        for _ in 0..POST_SMOOTH_SWEEPS {
            self.finest_smoother.record_sweep(&mut pass);
        }
    }
}
