use glam::{IVec2, UVec2, Vec2};
use log::warn;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::level_set::LevelSet;
use crate::prefix_scan::{PrefixScan, PrefixScanBound};
use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{Buffer, CommandBuffer, ComputeSize, Device, DispatchParams, DoubleBuffered, ShaderLibrary, Texture, Work, WorkDesc, WorkResource};

/// Per-cell particle capacity; the packed buffer holds `8 * W * H` entries.
pub const PARTICLES_PER_CELL: u32 = 8;

/// A liquid marker particle. Velocities live in a parallel buffer so the
/// packed position stream stays lean for rendering and advection.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Particle {
    pub position: Vec2,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GridPush {
    width: u32,
    height: u32,
}

/// The liquid's particle set: counting, rebucketing (with seeded spawning of
/// missing particles), the liquid level set, and the PIC/FLIP transfers.
///
/// The per-cell `count` grid doubles as the spawn target: `count()` rewrites
/// it with live counts, splats may then raise or lower per-cell targets, and
/// `scan()` rebuckets live particles up to the target and spawns the deficit.
pub struct Particles {
    device: Device,
    size: UVec2,

    particles: Buffer<Particle>,
    velocities: Buffer<Vec2>,
    // The scan stage's rebucketing targets; only recorded commands touch them
    // after construction, but they must live as long as those commands.
    #[allow(dead_code)]
    new_particles: Buffer<Particle>,
    #[allow(dead_code)]
    new_velocities: Buffer<Vec2>,
    count: Buffer<i32>,
    index: Buffer<i32>,
    #[allow(dead_code)]
    slots: Buffer<i32>,
    seeds: Buffer<IVec2>,
    dispatch_params: Buffer<DispatchParams>,
    #[allow(dead_code)]
    new_dispatch_params: Buffer<DispatchParams>,

    #[allow(dead_code)]
    prefix_scan: PrefixScan,
    count_cmd: CommandBuffer,
    scan_cmd: CommandBuffer,
    phi_work: Work,
    phi_cmd: Option<CommandBuffer>,
    to_grid_work: Work,
    to_grid_cmd: Option<CommandBuffer>,
    from_grid_work: Work,
    from_grid_cmd: Option<CommandBuffer>,

    rng: SmallRng,
}

impl Particles {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2) -> Particles {
        let cells = (size.x * size.y) as usize;
        let capacity = cells * PARTICLES_PER_CELL as usize;

        let particles: Buffer<Particle> = Buffer::with_usage(
            device,
            "particles",
            capacity,
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::VERTEX,
        );
        let velocities: Buffer<Vec2> = Buffer::new(device, "particle velocities", capacity);
        let new_particles: Buffer<Particle> = Buffer::new(device, "particles (rebucketed)", capacity);
        let new_velocities: Buffer<Vec2> = Buffer::new(device, "particle velocities (rebucketed)", capacity);
        let count: Buffer<i32> = Buffer::new(device, "particle count grid", cells);
        let index: Buffer<i32> = Buffer::new(device, "particle index grid", cells);
        let slots: Buffer<i32> = Buffer::new(device, "particle bucket slots", cells);
        let seeds: Buffer<IVec2> = Buffer::new(device, "particle spawn seeds", 4);
        let params_usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::INDIRECT;
        let dispatch_params: Buffer<DispatchParams> =
            Buffer::with_usage(device, "particle dispatch params", 1, params_usage);
        let new_dispatch_params: Buffer<DispatchParams> =
            Buffer::with_usage(device, "particle dispatch params (new)", 1, params_usage);

        let count_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "particle count",
                shader: "particle_count",
                size: ComputeSize::linear(capacity as u32),
                bindings: &[bt::buffer(true), bt::buffer(true), bt::buffer(false)],
                push_constant_bytes: 8,
            },
        );
        let bucket_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "particle bucket",
                shader: "particle_bucket",
                size: ComputeSize::linear(capacity as u32),
                bindings: &[
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(false),
                    bt::buffer(false),
                    bt::buffer(false),
                ],
                push_constant_bytes: 8,
            },
        );
        let spawn_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "particle spawn",
                shader: "particle_spawn",
                size: ComputeSize::grid(size),
                bindings: &[
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(false),
                    bt::buffer(false),
                ],
                push_constant_bytes: 8,
            },
        );
        let phi_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "particle phi",
                shader: "particle_phi",
                size: ComputeSize::grid(size),
                bindings: &[
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::image2d(wgpu::TextureFormat::R32Float),
                ],
                push_constant_bytes: 8,
            },
        );
        let to_grid_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "particles to grid",
                shader: "particle_to_grid",
                size: ComputeSize::grid(size),
                bindings: &[
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::buffer(true),
                    bt::image2d(wgpu::TextureFormat::Rg32Float),
                    bt::image2d(wgpu::TextureFormat::Rg32Float),
                ],
                push_constant_bytes: 8,
            },
        );
        let from_grid_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "particles from grid",
                shader: "particle_from_grid",
                size: ComputeSize::linear(capacity as u32),
                bindings: &[
                    bt::buffer(true),
                    bt::buffer(false),
                    bt::buffer(true),
                    bt::texture2d(),
                    bt::texture2d(),
                ],
                push_constant_bytes: 0,
            },
        );

        let push = GridPush {
            width: size.x,
            height: size.y,
        };

        let count_bound = count_work.bind(
            device,
            &[
                WorkResource::Buffer(particles.raw()),
                WorkResource::Buffer(dispatch_params.raw()),
                WorkResource::Buffer(count.raw()),
            ],
        );
        let mut count_cmd = CommandBuffer::new(device, "particle count");
        {
            let count_buffer = count.raw().clone();
            let params = dispatch_params.raw().clone();
            count_cmd.record(move |encoder| {
                encoder.clear_buffer(&count_buffer, 0, None);
                let mut pass = compute_pass(encoder, "particle count");
                count_bound.record_indirect_pushed(&mut pass, &params, bytemuck::bytes_of(&push));
            });
        }

        let prefix_scan = PrefixScan::new(device, shaders, size);
        let scan_bound: PrefixScanBound = prefix_scan.bind(device, &count, &index, &new_dispatch_params);
        let bucket_bound = bucket_work.bind(
            device,
            &[
                WorkResource::Buffer(particles.raw()),
                WorkResource::Buffer(velocities.raw()),
                WorkResource::Buffer(dispatch_params.raw()),
                WorkResource::Buffer(count.raw()),
                WorkResource::Buffer(index.raw()),
                WorkResource::Buffer(slots.raw()),
                WorkResource::Buffer(new_particles.raw()),
                WorkResource::Buffer(new_velocities.raw()),
            ],
        );
        let spawn_bound = spawn_work.bind(
            device,
            &[
                WorkResource::Buffer(count.raw()),
                WorkResource::Buffer(index.raw()),
                WorkResource::Buffer(slots.raw()),
                WorkResource::Buffer(seeds.raw()),
                WorkResource::Buffer(new_particles.raw()),
                WorkResource::Buffer(new_velocities.raw()),
            ],
        );

        let mut scan_cmd = CommandBuffer::new(device, "particle scan");
        {
            let slots_buffer = slots.raw().clone();
            let old_params = dispatch_params.raw().clone();
            let particles_dst = particles.raw().clone();
            let particles_src = new_particles.raw().clone();
            let velocities_dst = velocities.raw().clone();
            let velocities_src = new_velocities.raw().clone();
            let params_dst = dispatch_params.raw().clone();
            let params_src = new_dispatch_params.raw().clone();
            let particle_bytes = particles.size_in_bytes();
            let velocity_bytes = velocities.size_in_bytes();
            scan_cmd.record(move |encoder| {
                encoder.clear_buffer(&slots_buffer, 0, None);
                {
                    let mut pass = compute_pass(encoder, "particle scan");
                    scan_bound.record(&mut pass);
                    bucket_bound.record_indirect_pushed(&mut pass, &old_params, bytemuck::bytes_of(&push));
                    spawn_bound.record_pushed(&mut pass, bytemuck::bytes_of(&push));
                }
                encoder.copy_buffer_to_buffer(&particles_src, 0, &particles_dst, 0, particle_bytes);
                encoder.copy_buffer_to_buffer(&velocities_src, 0, &velocities_dst, 0, velocity_bytes);
                encoder.copy_buffer_to_buffer(&params_src, 0, &params_dst, 0, 16);
            });
        }

        Particles {
            device: device.clone(),
            size,

            particles,
            velocities,
            new_particles,
            new_velocities,
            count,
            index,
            slots,
            seeds,
            dispatch_params,
            new_dispatch_params,

            prefix_scan,
            count_cmd,
            scan_cmd,
            phi_work,
            phi_cmd: None,
            to_grid_work,
            to_grid_cmd: None,
            from_grid_work,
            from_grid_cmd: None,

            rng: SmallRng::seed_from_u64(0x5eed),
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn particle_buffer(&self) -> &Buffer<Particle> {
        &self.particles
    }

    pub fn count_grid(&self) -> &Buffer<i32> {
        &self.count
    }

    pub fn dispatch_params(&self) -> &Buffer<DispatchParams> {
        &self.dispatch_params
    }

    /// Replaces the particle set with host data. Velocities reset to zero.
    pub fn set_particles(&mut self, particles: &[Particle]) {
        let capacity = self.particles.len();
        let count = if particles.len() > capacity {
            warn!("dropping {} particles over capacity {}", particles.len() - capacity, capacity);
            capacity
        } else {
            particles.len()
        };
        self.particles.write(&self.device, 0, &particles[..count]);
        self.velocities.write(&self.device, 0, &vec![Vec2::ZERO; count]);
        self.dispatch_params
            .write(&self.device, 0, &[DispatchParams::for_count(count as u32)]);
    }

    /// The number of live particles after the last `scan` or `set_particles`.
    pub fn live_count(&self) -> u32 {
        self.dispatch_params.read(&self.device)[0].count
    }

    /// Rewrites the count grid with live per-cell counts (capped at the cell
    /// capacity).
    pub fn count(&self) {
        self.count_cmd.submit();
    }

    /// Rebuckets particles by cell, spawns up to each cell's desired count
    /// with freshly seeded positions, drops overflow, and publishes the new
    /// live count for indirect dispatches.
    pub fn scan(&mut self) {
        let seeds: [IVec2; 4] = std::array::from_fn(|_| {
            IVec2::new(self.rng.gen_range(1..1_000_000), self.rng.gen_range(1..1_000_000))
        });
        self.seeds.write(&self.device, 0, &seeds);
        self.scan_cmd.submit();
    }

    /// Attach the liquid level set rebuilt from the bucketed particles.
    pub fn phi_init(&mut self, device: &Device, level_set: &LevelSet) {
        let push = GridPush {
            width: self.size.x,
            height: self.size.y,
        };
        let bound = self.phi_work.bind(
            device,
            &[
                WorkResource::Buffer(self.particles.raw()),
                WorkResource::Buffer(self.count.raw()),
                WorkResource::Buffer(self.index.raw()),
                WorkResource::StorageTexture(level_set.phi().view()),
            ],
        );
        let mut cmd = CommandBuffer::new(device, "particle phi");
        cmd.record(move |encoder| {
            let mut pass = compute_pass(encoder, "particle phi");
            bound.record_pushed(&mut pass, bytemuck::bytes_of(&push));
        });
        self.phi_cmd = Some(cmd);
    }

    /// Rebuilds the liquid level set as a union of particle balls over the
    /// bucketed neighbourhood.
    pub fn phi(&self) {
        self.phi_cmd.as_ref().expect("phi before phi_init").submit();
    }

    /// Attach the velocity grid for the PIC/FLIP transfers; `velocity_prev`
    /// receives the pre-projection snapshot the FLIP delta is taken against.
    pub fn transfer_init(&mut self, device: &Device, velocity: &DoubleBuffered, velocity_prev: &Texture) {
        let push = GridPush {
            width: self.size.x,
            height: self.size.y,
        };

        let to_grid_bound = self.to_grid_work.bind(
            device,
            &[
                WorkResource::Buffer(self.particles.raw()),
                WorkResource::Buffer(self.velocities.raw()),
                WorkResource::Buffer(self.count.raw()),
                WorkResource::Buffer(self.index.raw()),
                WorkResource::StorageTexture(velocity.front().view()),
                WorkResource::StorageTexture(velocity_prev.view()),
            ],
        );
        let mut to_grid_cmd = CommandBuffer::new(device, "particles to grid");
        to_grid_cmd.record(move |encoder| {
            let mut pass = compute_pass(encoder, "particles to grid");
            to_grid_bound.record_pushed(&mut pass, bytemuck::bytes_of(&push));
        });
        self.to_grid_cmd = Some(to_grid_cmd);

        let from_grid_bound = self.from_grid_work.bind(
            device,
            &[
                WorkResource::Buffer(self.particles.raw()),
                WorkResource::Buffer(self.velocities.raw()),
                WorkResource::Buffer(self.dispatch_params.raw()),
                WorkResource::Texture(velocity.front().view()),
                WorkResource::Texture(velocity_prev.view()),
            ],
        );
        let mut from_grid_cmd = CommandBuffer::new(device, "particles from grid");
        let params = self.dispatch_params.raw().clone();
        from_grid_cmd.record(move |encoder| {
            let mut pass = compute_pass(encoder, "particles from grid");
            from_grid_bound.record_indirect(&mut pass, &params);
        });
        self.from_grid_cmd = Some(from_grid_cmd);
    }

    /// Splat particle momenta onto the staggered grid (bilinear weights) and
    /// snapshot the result for the FLIP delta.
    pub fn transfer_to_grid(&self) {
        self.to_grid_cmd
            .as_ref()
            .expect("transfer before transfer_init")
            .submit();
    }

    /// Update particle velocities from the projected grid: PIC/FLIP blend of
    /// the interpolated new velocity and the per-particle delta.
    pub fn transfer_from_grid(&self) {
        self.from_grid_cmd
            .as_ref()
            .expect("transfer before transfer_init")
            .submit();
    }

    /// Host copy of the packed particle buffer (only the first `live_count`
    /// entries are meaningful).
    pub fn read_particles(&self) -> Vec<Particle> {
        self.particles.read(&self.device)
    }

    /// Host copy of the per-cell count grid.
    pub fn read_counts(&self) -> Vec<i32> {
        self.count.read(&self.device)
    }
}
