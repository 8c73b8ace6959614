use glam::{UVec2, Vec2};

use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{Bound, Buffer, ComputeSize, Device, DoubleBuffered, ShaderLibrary, UniformBuffer, Work, WorkDesc, WorkResource};
use crate::solver::reduce::{ReduceBound, ReduceSumJ};
use crate::solver::LinearSolverData;

/// Body outline in local coordinates, evaluated analytically on the grid.
#[derive(Clone, Copy, Debug)]
pub enum RigidbodyShape {
    Circle { radius: f32 },
    Box { half_extents: Vec2 },
}

/// Linear and angular velocity consumed from the dynamics engine.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigidbodyVelocity {
    pub linear: Vec2,
    pub angular: f32,
}

/// Pressure reaction produced for the dynamics engine.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigidbodyForces {
    pub force: Vec2,
    pub torque: f32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct RigidbodyParams {
    position: Vec2,
    cos_sin: Vec2,
    linear_velocity: Vec2,
    angular_velocity: f32,
    kind: u32,
    shape: Vec2,
    _pad: Vec2,
}

/// GPU side of one rigid body: rasterises its signed distance and velocity
/// into the shared solid fields and integrates the pressure force and torque
/// it receives back.
///
/// The dynamics themselves live in an external 2D physics engine; coupling is
/// one-way per direction (transforms and velocities in, forces out).
pub struct Rigidbody {
    shape: RigidbodyShape,
    position: Vec2,
    angle: f32,
    velocity: RigidbodyVelocity,
    dt: f32,

    uniform: UniformBuffer<RigidbodyParams>,
    phi_bound: Bound,
    velocity_bound: Bound,
    force_bound: Bound,
    #[allow(dead_code)]
    reduce: ReduceSumJ,
    force_reduce: ReduceBound,
    #[allow(dead_code)]
    j: Buffer<[f32; 4]>,
    force_out: Buffer<[f32; 4]>,
}

impl Rigidbody {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        device: &Device,
        shaders: &ShaderLibrary,
        size: UVec2,
        dt: f32,
        shape: RigidbodyShape,
        solid_phi: &DoubleBuffered,
        solid_velocity: &DoubleBuffered,
        data: &LinearSolverData,
    ) -> Rigidbody {
        let phi_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "rigidbody phi",
                shader: "rigidbody_phi",
                size: ComputeSize::grid(size),
                bindings: &[bt::uniform(), bt::texture2d(), bt::image2d(wgpu::TextureFormat::R32Float)],
                push_constant_bytes: 0,
            },
        );
        let velocity_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "rigidbody velocity",
                shader: "rigidbody_velocity",
                size: ComputeSize::grid(size),
                bindings: &[bt::uniform(), bt::texture2d(), bt::image2d(wgpu::TextureFormat::Rg32Float)],
                push_constant_bytes: 0,
            },
        );
        let force_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "rigidbody force",
                shader: "rigidbody_force",
                size: ComputeSize::grid(size),
                bindings: &[bt::uniform(), bt::buffer(true), bt::buffer(false)],
                push_constant_bytes: 8,
            },
        );

        let uniform = UniformBuffer::new(device);
        let j: Buffer<[f32; 4]> = Buffer::new(device, "rigidbody j", (size.x * size.y) as usize);
        let force_out: Buffer<[f32; 4]> = Buffer::new(device, "rigidbody force", 1);
        let reduce = ReduceSumJ::new(device, shaders, size);
        let force_reduce = reduce.bind(device, j.raw(), force_out.raw());

        let body = Rigidbody {
            shape,
            position: Vec2::ZERO,
            angle: 0.0,
            velocity: RigidbodyVelocity::default(),
            dt,

            phi_bound: phi_work.bind(
                device,
                &[
                    WorkResource::Uniform(uniform.raw()),
                    WorkResource::Texture(solid_phi.front().view()),
                    WorkResource::StorageTexture(solid_phi.back().view()),
                ],
            ),
            velocity_bound: velocity_work.bind(
                device,
                &[
                    WorkResource::Uniform(uniform.raw()),
                    WorkResource::Texture(solid_velocity.front().view()),
                    WorkResource::StorageTexture(solid_velocity.back().view()),
                ],
            ),
            force_bound: force_work.bind(
                device,
                &[
                    WorkResource::Uniform(uniform.raw()),
                    WorkResource::Buffer(data.x.raw()),
                    WorkResource::Buffer(j.raw()),
                ],
            ),
            reduce,
            force_reduce,
            j,
            force_out,
            uniform,
        };
        body.update_uniform(device);
        body
    }

    fn params(&self) -> RigidbodyParams {
        let (kind, shape) = match self.shape {
            RigidbodyShape::Circle { radius } => (0, Vec2::new(radius, 0.0)),
            RigidbodyShape::Box { half_extents } => (1, half_extents),
        };
        RigidbodyParams {
            position: self.position,
            cos_sin: Vec2::new(self.angle.cos(), self.angle.sin()),
            linear_velocity: self.velocity.linear,
            angular_velocity: self.velocity.angular,
            kind,
            shape,
            _pad: Vec2::ZERO,
        }
    }

    fn update_uniform(&self, device: &Device) {
        self.uniform.update_content(device, self.params());
    }

    /// Pose from the dynamics engine, in grid coordinates / radians.
    pub fn set_transform(&mut self, device: &Device, position: Vec2, angle: f32) {
        self.position = position;
        self.angle = angle;
        self.update_uniform(device);
    }

    pub fn set_velocities(&mut self, device: &Device, velocity: RigidbodyVelocity) {
        self.velocity = velocity;
        self.update_uniform(device);
    }

    pub fn velocities(&self) -> RigidbodyVelocity {
        self.velocity
    }

    /// Union the body's signed distance into the solid field.
    pub(crate) fn record_phi(&self, encoder: &mut wgpu::CommandEncoder, solid_phi: &DoubleBuffered) {
        {
            let mut pass = compute_pass(encoder, "rigidbody phi");
            self.phi_bound.record(&mut pass);
        }
        solid_phi.copy_back(encoder);
    }

    /// Write the body's velocity field where the body sits.
    pub(crate) fn record_velocity(&self, encoder: &mut wgpu::CommandEncoder, solid_velocity: &DoubleBuffered) {
        {
            let mut pass = compute_pass(encoder, "rigidbody velocity");
            self.velocity_bound.record(&mut pass);
        }
        solid_velocity.copy_back(encoder);
    }

    /// Integrate pressure force and torque over the body surface.
    pub(crate) fn record_force(&self, encoder: &mut wgpu::CommandEncoder, size: UVec2) {
        let push = [size.x, size.y];
        let mut pass = compute_pass(encoder, "rigidbody force");
        self.force_bound.record_pushed(&mut pass, bytemuck::bytes_of(&push));
        self.force_reduce.record(&mut pass);
    }

    /// Reads back the reduced force. The pressure unknown carries a factor of
    /// dt, so the reduction is an impulse; dividing by dt restores a force.
    pub fn forces(&self, device: &Device) -> RigidbodyForces {
        let j = self.force_out.read(device)[0];
        RigidbodyForces {
            force: Vec2::new(j[0], j[1]) / self.dt,
            torque: j[2] / self.dt,
        }
    }
}

#[cfg(feature = "rapier")]
mod rapier {
    use super::*;
    use rapier2d::prelude::RigidBody as RapierBody;

    impl Rigidbody {
        /// Pulls pose and velocity from a rapier body. `scale` converts from
        /// physics units to grid cells.
        pub fn sync_from_rapier(&mut self, device: &Device, body: &RapierBody, scale: f32) {
            let translation = body.translation();
            self.set_transform(
                device,
                Vec2::new(translation.x * scale, translation.y * scale),
                body.rotation().angle(),
            );
            let linvel = body.linvel();
            self.set_velocities(
                device,
                RigidbodyVelocity {
                    linear: Vec2::new(linvel.x * scale, linvel.y * scale),
                    angular: body.angvel(),
                },
            );
        }

        /// Applies the reduced pressure reaction to a rapier body.
        pub fn apply_to_rapier(&self, device: &Device, body: &mut RapierBody, scale: f32) {
            let forces = self.forces(device);
            body.add_force(rapier2d::na::Vector2::new(forces.force.x / scale, forces.force.y / scale), true);
            body.add_torque(forces.torque / (scale * scale), true);
        }
    }
}
