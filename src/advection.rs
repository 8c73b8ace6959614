use glam::UVec2;

use crate::density::Density;
use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{Buffer, CommandBuffer, ComputeSize, Device, DispatchParams, DoubleBuffered, ShaderLibrary, Texture, Work, WorkDesc, WorkResource};

/// Semi-Lagrangian advection of the velocity field and auxiliary fields, and
/// Runge-Kutta advection of the liquid particles.
pub struct Advection {
    dt: f32,
    velocity: DoubleBuffered,
    advect_velocity_cmd: CommandBuffer,
    advect_work: Work,
    advect_cmd: Option<CommandBuffer>,
    advect_particles_work: Work,
    advect_particles_cmd: Option<CommandBuffer>,
}

impl Advection {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2, dt: f32, velocity: &DoubleBuffered) -> Advection {
        let advect_velocity_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "advect velocity",
                shader: "advect_velocity",
                size: ComputeSize::grid(size),
                bindings: &[bt::texture2d(), bt::image2d(wgpu::TextureFormat::Rg32Float)],
                push_constant_bytes: 4,
            },
        );
        let advect_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "advect field",
                shader: "advect_field",
                size: ComputeSize::grid(size),
                bindings: &[bt::texture2d(), bt::texture2d(), bt::image2d(wgpu::TextureFormat::Rgba8Unorm)],
                push_constant_bytes: 4,
            },
        );
        let advect_particles_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "advect particles",
                shader: "advect_particles",
                size: ComputeSize::linear(1),
                bindings: &[
                    bt::buffer(false),
                    bt::buffer(true),
                    bt::texture2d(),
                    bt::texture2d(),
                ],
                push_constant_bytes: 4,
            },
        );

        let bound = advect_velocity_work.bind(
            device,
            &[
                WorkResource::Texture(velocity.front().view()),
                WorkResource::StorageTexture(velocity.back().view()),
            ],
        );
        let mut advect_velocity_cmd = CommandBuffer::new(device, "advect velocity");
        {
            let velocity = velocity.clone();
            advect_velocity_cmd.record(move |encoder| {
                {
                    let mut pass = compute_pass(encoder, "advect velocity");
                    bound.record_pushed(&mut pass, bytemuck::bytes_of(&dt));
                }
                velocity.copy_back(encoder);
            });
        }

        Advection {
            dt,
            velocity: velocity.clone(),
            advect_velocity_cmd,
            advect_work,
            advect_cmd: None,
            advect_particles_work,
            advect_particles_cmd: None,
        }
    }

    /// Self-advect the velocity field (RK2 backtrace, bilinear staggered
    /// samples) and republish it.
    pub fn advect_velocity(&self) {
        self.advect_velocity_cmd.submit();
    }

    /// Attach the dye field advected by `advect`.
    pub fn advect_init(&mut self, device: &Device, field: &Density) {
        let bound = self.advect_work.bind(
            device,
            &[
                WorkResource::Texture(self.velocity.front().view()),
                WorkResource::Texture(field.field().front().view()),
                WorkResource::StorageTexture(field.field().back().view()),
            ],
        );
        let mut cmd = CommandBuffer::new(device, "advect field");
        let dt = self.dt;
        let target = field.field().clone();
        cmd.record(move |encoder| {
            {
                let mut pass = compute_pass(encoder, "advect field");
                bound.record_pushed(&mut pass, bytemuck::bytes_of(&dt));
            }
            target.copy_back(encoder);
        });
        self.advect_cmd = Some(cmd);
    }

    pub fn advect(&self) {
        self.advect_cmd.as_ref().expect("advect before advect_init").submit();
    }

    /// Attach the particle buffer advected by `advect_particles`.
    pub fn advect_particles_init(
        &mut self,
        device: &Device,
        particles: &wgpu::Buffer,
        dispatch_params: &Buffer<DispatchParams>,
        solid_phi: &Texture,
    ) {
        let bound = self.advect_particles_work.bind(
            device,
            &[
                WorkResource::Buffer(particles),
                WorkResource::Buffer(dispatch_params.raw()),
                WorkResource::Texture(self.velocity.front().view()),
                WorkResource::Texture(solid_phi.view()),
            ],
        );
        let mut cmd = CommandBuffer::new(device, "advect particles");
        let dt = self.dt;
        let params = dispatch_params.raw().clone();
        cmd.record(move |encoder| {
            let mut pass = compute_pass(encoder, "advect particles");
            bound.record_indirect_pushed(&mut pass, &params, bytemuck::bytes_of(&dt));
        });
        self.advect_particles_cmd = Some(cmd);
    }

    /// RK3 particle advection over the live particle range, keeping particles
    /// out of solids.
    pub fn advect_particles(&self) {
        self.advect_particles_cmd
            .as_ref()
            .expect("advect_particles before advect_particles_init")
            .submit();
    }
}
