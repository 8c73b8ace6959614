use glam::{IVec2, UVec2};

use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{Buffer, CommandBuffer, ComputeSize, Device, DoubleBuffered, ShaderLibrary, Texture, Work, WorkDesc, WorkResource};

const EXTRAPOLATE_SWEEPS: u32 = 8;

/// Extends projected velocities into not-yet-valid faces and enforces the
/// solid boundary condition afterwards.
pub struct Extrapolation {
    extrapolate_cmd: CommandBuffer,
    constrain_cmd: CommandBuffer,
}

impl Extrapolation {
    pub fn new(
        device: &Device,
        shaders: &ShaderLibrary,
        size: UVec2,
        valid: &Buffer<IVec2>,
        velocity: &DoubleBuffered,
        solid_phi: &Texture,
        solid_velocity: &Texture,
    ) -> Extrapolation {
        let n = (size.x * size.y) as usize;
        let valid_back: Buffer<IVec2> = Buffer::new(device, "valid (back)", n);

        let extrapolate_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "extrapolate velocity",
                shader: "extrapolate_velocity",
                size: ComputeSize::grid(size),
                bindings: &[
                    bt::texture2d(),
                    bt::buffer(true),
                    bt::image2d(wgpu::TextureFormat::Rg32Float),
                    bt::buffer(false),
                ],
                push_constant_bytes: 0,
            },
        );
        let constrain_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "constrain velocity",
                shader: "constrain_velocity",
                size: ComputeSize::grid(size),
                bindings: &[
                    bt::texture2d(),
                    bt::texture2d(),
                    bt::texture2d(),
                    bt::image2d(wgpu::TextureFormat::Rg32Float),
                ],
                push_constant_bytes: 0,
            },
        );

        // Sweeps ping-pong both the velocity pair and the valid mask; an even
        // sweep count lands the result back in the fronts.
        let forward = extrapolate_work.bind(
            device,
            &[
                WorkResource::Texture(velocity.front().view()),
                WorkResource::Buffer(valid.raw()),
                WorkResource::StorageTexture(velocity.back().view()),
                WorkResource::Buffer(valid_back.raw()),
            ],
        );
        let backward = extrapolate_work.bind(
            device,
            &[
                WorkResource::Texture(velocity.back().view()),
                WorkResource::Buffer(valid_back.raw()),
                WorkResource::StorageTexture(velocity.front().view()),
                WorkResource::Buffer(valid.raw()),
            ],
        );

        let mut extrapolate_cmd = CommandBuffer::new(device, "extrapolate velocity");
        extrapolate_cmd.record(move |encoder| {
            let mut pass = compute_pass(encoder, "extrapolate velocity");
            for sweep in 0..EXTRAPOLATE_SWEEPS {
                if sweep % 2 == 0 {
                    forward.record(&mut pass);
                } else {
                    backward.record(&mut pass);
                }
            }
        });

        let constrain_bound = constrain_work.bind(
            device,
            &[
                WorkResource::Texture(solid_phi.view()),
                WorkResource::Texture(solid_velocity.view()),
                WorkResource::Texture(velocity.front().view()),
                WorkResource::StorageTexture(velocity.back().view()),
            ],
        );
        let mut constrain_cmd = CommandBuffer::new(device, "constrain velocity");
        {
            let velocity = velocity.clone();
            constrain_cmd.record(move |encoder| {
                {
                    let mut pass = compute_pass(encoder, "constrain velocity");
                    constrain_bound.record(&mut pass);
                }
                velocity.copy_back(encoder);
            });
        }

        Extrapolation {
            extrapolate_cmd,
            constrain_cmd,
        }
    }

    /// Eight sweeps of valid-neighbour averaging over the face validity mask.
    pub fn extrapolate(&self) {
        self.extrapolate_cmd.submit();
    }

    /// Closed faces take the solid's velocity component.
    pub fn constrain_velocity(&self) {
        self.constrain_cmd.submit();
    }
}
