use glam::{IVec2, UVec2, Vec2};
use log::debug;

use crate::advection::Advection;
use crate::density::Density;
use crate::extrapolation::Extrapolation;
use crate::level_set::LevelSet;
use crate::particles::Particles;
use crate::pressure::Pressure;
use crate::renderer::{Buffer, CommandBuffer, Device, DoubleBuffered, ShaderLibrary, Texture};
use crate::rigidbody::{Rigidbody, RigidbodyShape};
use crate::solver::{ConjugateGradient, Diagonal, GaussSeidel, IncompletePoisson, LinearSolverData, Multigrid, Parameters, Preconditioner};
use crate::splat::{Splat, SplatOp, SplatShape};

/// Which preconditioner drives the pressure solve. Fixed set, chosen at
/// construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreconditionerKind {
    Diagonal,
    IncompletePoisson,
    GaussSeidel,
    Multigrid,
}

enum WorldPreconditioner {
    Diagonal(Diagonal),
    IncompletePoisson(IncompletePoisson),
    GaussSeidel(GaussSeidel),
    Multigrid(Multigrid),
}

impl WorldPreconditioner {
    fn as_dyn_mut(&mut self) -> &mut dyn Preconditioner {
        match self {
            WorldPreconditioner::Diagonal(p) => p,
            WorldPreconditioner::IncompletePoisson(p) => p,
            WorldPreconditioner::GaussSeidel(p) => p,
            WorldPreconditioner::Multigrid(p) => p,
        }
    }

    fn as_dyn(&self) -> &dyn Preconditioner {
        match self {
            WorldPreconditioner::Diagonal(p) => p,
            WorldPreconditioner::IncompletePoisson(p) => p,
            WorldPreconditioner::GaussSeidel(p) => p,
            WorldPreconditioner::Multigrid(p) => p,
        }
    }
}

/// Owns every GPU resource of one simulation domain and composes the
/// components into the smoke (`solve_static`) and liquid (`solve_dynamic`)
/// step scripts. All allocation happens here, at construction; stepping
/// re-records and resubmits but never allocates.
pub struct World {
    device: Device,
    size: UVec2,
    dt: f32,

    velocity: DoubleBuffered,
    // Referenced only by recorded transfer commands after construction.
    #[allow(dead_code)]
    velocity_prev: Texture,
    solid_phi: LevelSet,
    static_solid_phi: Texture,
    liquid_phi: LevelSet,
    solid_velocity: DoubleBuffered,
    #[allow(dead_code)]
    valid: Buffer<IVec2>,
    density: Density,

    data: LinearSolverData,
    pressure: Pressure,
    solver: ConjugateGradient,
    preconditioner: WorldPreconditioner,
    particles: Particles,
    advection: Advection,
    extrapolation: Extrapolation,
    rigidbodies: Vec<Rigidbody>,

    velocity_sources: Option<CommandBuffer>,
    density_sources: Option<CommandBuffer>,
    clear_velocity_cmd: CommandBuffer,
    clear_solid_velocity: Splat,

    /// Results of the most recent pressure solve.
    pub last_solve: Parameters,
}

impl World {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2, dt: f32, kind: PreconditionerKind) -> World {
        let velocity = DoubleBuffered::new(device, "velocity", size, wgpu::TextureFormat::Rg32Float);
        let velocity_prev = Texture::new(device, "velocity (transfer snapshot)", size, wgpu::TextureFormat::Rg32Float);
        let solid_phi = LevelSet::new(device, shaders, "solid phi", size);
        let static_solid_phi = Texture::new(device, "static solid phi", size, wgpu::TextureFormat::R32Float);
        let mut liquid_phi = LevelSet::new(device, shaders, "liquid phi", size);
        let solid_velocity = DoubleBuffered::new(device, "solid velocity", size, wgpu::TextureFormat::Rg32Float);
        let valid: Buffer<IVec2> = Buffer::new(device, "valid faces", (size.x * size.y) as usize);
        let density = Density::new(device, size);

        let data = LinearSolverData::new(device, size);
        let pressure = Pressure::new(
            device,
            shaders,
            dt,
            size,
            &data,
            &velocity,
            solid_phi.phi(),
            liquid_phi.phi(),
            solid_velocity.front(),
            &valid,
        );

        let mut solver = ConjugateGradient::new(device, shaders, size);
        let mut preconditioner = match kind {
            PreconditionerKind::Diagonal => WorldPreconditioner::Diagonal(Diagonal::new(device, shaders, size)),
            PreconditionerKind::IncompletePoisson => {
                WorldPreconditioner::IncompletePoisson(IncompletePoisson::new(device, shaders, size))
            }
            PreconditionerKind::GaussSeidel => WorldPreconditioner::GaussSeidel(GaussSeidel::new(device, shaders, size)),
            PreconditionerKind::Multigrid => {
                let mut multigrid = Multigrid::new(device, shaders, size, dt);
                multigrid.build_hierarchies_init(device, solid_phi.phi(), liquid_phi.phi());
                WorldPreconditioner::Multigrid(multigrid)
            }
        };
        solver.init_preconditioned(device, &data, preconditioner.as_dyn_mut());

        let mut particles = Particles::new(device, shaders, size);
        particles.phi_init(device, &liquid_phi);
        particles.transfer_init(device, &velocity, &velocity_prev);

        let mut advection = Advection::new(device, shaders, size, dt, &velocity);
        advection.advect_init(device, &density);
        advection.advect_particles_init(
            device,
            particles.particle_buffer().raw(),
            particles.dispatch_params(),
            solid_phi.phi(),
        );

        let extrapolation = Extrapolation::new(
            device,
            shaders,
            size,
            &valid,
            &velocity,
            solid_phi.phi(),
            solid_velocity.front(),
        );

        liquid_phi.extrapolate_bind(device, solid_phi.phi());

        let whole_domain = SplatShape::Rect {
            min: Vec2::ZERO,
            max: Vec2::new(size.x as f32, size.y as f32),
        };
        let clear_velocity_splat = Splat::velocity(device, shaders, &velocity, whole_domain, SplatOp::Set, Vec2::ZERO);
        let mut clear_velocity_cmd = CommandBuffer::new(device, "clear velocity");
        clear_velocity_cmd.record(move |encoder| clear_velocity_splat.record(encoder));
        let clear_solid_velocity =
            Splat::velocity(device, shaders, &solid_velocity, whole_domain, SplatOp::Set, Vec2::ZERO);

        World {
            device: device.clone(),
            size,
            dt,

            velocity,
            velocity_prev,
            solid_phi,
            static_solid_phi,
            liquid_phi,
            solid_velocity,
            valid,
            density,

            data,
            pressure,
            solver,
            preconditioner,
            particles,
            advection,
            extrapolation,
            rigidbodies: Vec::new(),

            velocity_sources: None,
            density_sources: None,
            clear_velocity_cmd,
            clear_solid_velocity,

            last_solve: Parameters::new(0, 0.0),
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn velocity(&self) -> &DoubleBuffered {
        &self.velocity
    }

    pub fn density(&self) -> &Density {
        &self.density
    }

    pub fn liquid_phi(&self) -> &LevelSet {
        &self.liquid_phi
    }

    pub fn solid_phi(&self) -> &LevelSet {
        &self.solid_phi
    }

    pub fn particles(&self) -> &Particles {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut Particles {
        &mut self.particles
    }

    pub fn pressure_solution(&self) -> &LinearSolverData {
        &self.data
    }

    /// Snapshot the currently authored solid field as the static obstacle
    /// layer rigid bodies are composited over each step.
    pub fn commit_static_solid_phi(&self) {
        self.device.execute_once(|encoder| {
            self.static_solid_phi.copy_from(encoder, self.solid_phi.phi());
        });
    }

    /// Velocity sources submitted at the head of every step (forces, inflow).
    pub fn set_velocity_sources(&mut self, splats: Vec<Splat>) {
        let mut cmd = CommandBuffer::new(&self.device, "velocity sources");
        cmd.record(move |encoder| {
            for splat in &splats {
                splat.record(encoder);
            }
        });
        self.velocity_sources = Some(cmd);
    }

    /// Dye sources submitted after the velocity sources in the smoke step.
    pub fn set_density_sources(&mut self, splats: Vec<Splat>) {
        let mut cmd = CommandBuffer::new(&self.device, "density sources");
        cmd.record(move |encoder| {
            for splat in &splats {
                splat.record(encoder);
            }
        });
        self.density_sources = Some(cmd);
    }

    pub fn add_rigidbody(&mut self, shaders: &ShaderLibrary, shape: RigidbodyShape) -> usize {
        self.rigidbodies.push(Rigidbody::new(
            &self.device,
            shaders,
            self.size,
            self.dt,
            shape,
            self.solid_phi.field(),
            &self.solid_velocity,
            &self.data,
        ));
        self.rigidbodies.len() - 1
    }

    pub fn rigidbody(&self, index: usize) -> &Rigidbody {
        &self.rigidbodies[index]
    }

    pub fn rigidbody_mut(&mut self, index: usize) -> &mut Rigidbody {
        &mut self.rigidbodies[index]
    }

    /// Re-rasterise rigid bodies over the static obstacle layer and refresh
    /// the solid velocity field.
    fn update_rigidbodies(&self) {
        if self.rigidbodies.is_empty() {
            return;
        }
        self.device.execute_once(|encoder| {
            self.solid_phi.field().front().copy_from(encoder, &self.static_solid_phi);
            self.clear_solid_velocity.record(encoder);
            for body in &self.rigidbodies {
                body.record_phi(encoder, self.solid_phi.field());
                body.record_velocity(encoder, &self.solid_velocity);
            }
        });
    }

    /// Integrate the pressure reaction on every body after a solve.
    fn reduce_rigidbody_forces(&self) {
        if self.rigidbodies.is_empty() {
            return;
        }
        self.device.execute_once(|encoder| {
            for body in &self.rigidbodies {
                body.record_force(encoder, self.size);
            }
        });
    }

    fn project(&mut self, mut params: Parameters) {
        if let WorldPreconditioner::Multigrid(multigrid) = &self.preconditioner {
            multigrid.build_hierarchies();
        }

        let mut encoder = self
            .device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("pressure build") });
        self.pressure.record_build(&mut encoder);
        self.device.queue().submit(Some(encoder.finish()));

        self.solver.solve(self.preconditioner.as_dyn(), &mut params);
        self.last_solve = params;

        let mut encoder = self
            .device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("pressure project") });
        self.pressure.record_project(&mut encoder);
        self.device.queue().submit(Some(encoder.finish()));
    }

    /// One smoke step: sources, projection, velocity and dye advection.
    pub fn solve_static(&mut self) {
        if let Some(sources) = &self.velocity_sources {
            sources.submit();
        }
        if let Some(sources) = &self.density_sources {
            sources.submit();
        }

        self.update_rigidbodies();
        self.project(Parameters::new(300, 1e-3));
        self.reduce_rigidbody_forces();

        self.extrapolation.extrapolate();
        self.extrapolation.constrain_velocity();

        self.advection.advect_velocity();
        self.advection.advect();

        debug!("smoke step: solve {} iterations", self.last_solve.out_iterations);
    }

    /// One liquid step: rebucket and spawn particles, rebuild the liquid
    /// surface, transfer to the grid, project, transfer back, advect.
    pub fn solve_dynamic(&mut self) {
        self.particles.scan();
        self.particles.phi();

        self.particles.transfer_to_grid();

        if let Some(sources) = &self.velocity_sources {
            sources.submit();
        }

        self.update_rigidbodies();
        self.liquid_phi.extrapolate();

        self.project(Parameters::new(1000, 1e-5));
        self.reduce_rigidbody_forces();

        self.extrapolation.extrapolate();
        self.extrapolation.constrain_velocity();

        self.particles.transfer_from_grid();

        self.advection.advect_particles();
        self.particles.count();
        self.clear_velocity_cmd.submit();

        debug!("liquid step: solve {} iterations", self.last_solve.out_iterations);
    }

    /// Blocks until all queued GPU work completed. Call before tearing down.
    pub fn wait_idle(&self) {
        self.device.wait_idle();
    }
}
