use glam::{IVec2, UVec2};

use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{Bound, Buffer, ComputeSize, Device, DoubleBuffered, ShaderLibrary, Texture, Work, WorkDesc, WorkResource};
use crate::solver::LinearSolverData;

/// Assembles the variational pressure system from the level sets and applies
/// the solved pressure gradient back onto the velocity field.
///
/// Face weights are ghost-fluid fractional areas: solid φ carves partial
/// faces, liquid φ places the free surface inside cells. Air and boundary
/// cells become identity rows so the system stays regular.
pub struct Pressure {
    build_matrix_bound: Bound,
    build_div_bound: Bound,
    project_bound: Bound,
    velocity: DoubleBuffered,
    dt: f32,
}

impl Pressure {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &Device,
        shaders: &ShaderLibrary,
        dt: f32,
        size: UVec2,
        data: &LinearSolverData,
        velocity: &DoubleBuffered,
        solid_phi: &Texture,
        liquid_phi: &Texture,
        solid_velocity: &Texture,
        valid: &Buffer<IVec2>,
    ) -> Pressure {
        let build_matrix_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "pressure build matrix",
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
        let build_div_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "pressure build divergence",
                shader: "build_div",
                size: ComputeSize::grid(size),
                bindings: &[
                    bt::texture2d(),
                    bt::texture2d(),
                    bt::texture2d(),
                    bt::texture2d(),
                    bt::buffer(false),
                ],
                push_constant_bytes: 0,
            },
        );
        let project_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "pressure project",
                shader: "project",
                size: ComputeSize::grid(size),
                bindings: &[
                    bt::texture2d(),
                    bt::texture2d(),
                    bt::texture2d(),
                    bt::buffer(true),
                    bt::image2d(wgpu::TextureFormat::Rg32Float),
                    bt::buffer(false),
                ],
                push_constant_bytes: 0,
            },
        );

        Pressure {
            build_matrix_bound: build_matrix_work.bind(
                device,
                &[
                    WorkResource::Texture(liquid_phi.view()),
                    WorkResource::Texture(solid_phi.view()),
                    WorkResource::Buffer(data.diagonal.raw()),
                    WorkResource::Buffer(data.lower.raw()),
                ],
            ),
            build_div_bound: build_div_work.bind(
                device,
                &[
                    WorkResource::Texture(liquid_phi.view()),
                    WorkResource::Texture(solid_phi.view()),
                    WorkResource::Texture(velocity.front().view()),
                    WorkResource::Texture(solid_velocity.view()),
                    WorkResource::Buffer(data.b.raw()),
                ],
            ),
            project_bound: project_work.bind(
                device,
                &[
                    WorkResource::Texture(liquid_phi.view()),
                    WorkResource::Texture(solid_phi.view()),
                    WorkResource::Texture(velocity.front().view()),
                    WorkResource::Buffer(data.x.raw()),
                    WorkResource::StorageTexture(velocity.back().view()),
                    WorkResource::Buffer(valid.raw()),
                ],
            ),
            velocity: velocity.clone(),
            dt,
        }
    }

    /// Fills diagonal, lower and rhs from the current fields.
    pub fn record_build(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = compute_pass(encoder, "pressure build");
        self.build_matrix_bound.record_pushed(&mut pass, bytemuck::bytes_of(&self.dt));
        self.build_div_bound.record(&mut pass);
    }

    /// Subtracts the pressure gradient at fluid faces, marks them valid and
    /// republishes the velocity front.
    pub fn record_project(&self, encoder: &mut wgpu::CommandEncoder) {
        {
            let mut pass = compute_pass(encoder, "pressure project");
            self.project_bound.record(&mut pass);
        }
        self.velocity.copy_back(encoder);
    }
}
