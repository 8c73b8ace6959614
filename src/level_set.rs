use glam::UVec2;

use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{CommandBuffer, ComputeSize, Device, DoubleBuffered, ShaderLibrary, Texture, Work, WorkDesc, WorkResource};

/// A signed distance field with redistancing and one-cell extrapolation into
/// solids. Negative inside, positive outside, distances in cell units.
pub struct LevelSet {
    field: DoubleBuffered,
    phi0: Texture,
    extrapolate_work: Work,
    extrapolate_cmd: Option<CommandBuffer>,
    reinitialise_cmd: CommandBuffer,
    size: UVec2,
}

impl LevelSet {
    pub fn new(device: &Device, shaders: &ShaderLibrary, label: &'static str, size: UVec2) -> LevelSet {
        Self::with_iterations(device, shaders, label, size, 100)
    }

    pub fn with_iterations(
        device: &Device,
        shaders: &ShaderLibrary,
        label: &'static str,
        size: UVec2,
        reinitialise_iterations: u32,
    ) -> LevelSet {
        let field = DoubleBuffered::new(device, label, size, wgpu::TextureFormat::R32Float);
        let phi0 = Texture::new(device, &format!("{} phi0", label), size, wgpu::TextureFormat::R32Float);

        let redistance_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "level set redistance",
                shader: "redistance",
                size: ComputeSize::grid(size),
                bindings: &[bt::texture2d(), bt::texture2d(), bt::image2d(wgpu::TextureFormat::R32Float)],
                push_constant_bytes: 0,
            },
        );
        let extrapolate_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "level set extrapolate",
                shader: "extrapolate_phi",
                size: ComputeSize::grid(size),
                bindings: &[bt::texture2d(), bt::texture2d(), bt::image2d(wgpu::TextureFormat::R32Float)],
                push_constant_bytes: 0,
            },
        );

        // Front -> back and back -> front steps, both measuring against the
        // unmodified phi0 snapshot so the zero isosurface stays anchored.
        let forward = redistance_work.bind(
            device,
            &[
                WorkResource::Texture(phi0.view()),
                WorkResource::Texture(field.front().view()),
                WorkResource::StorageTexture(field.back().view()),
            ],
        );
        let backward = redistance_work.bind(
            device,
            &[
                WorkResource::Texture(phi0.view()),
                WorkResource::Texture(field.back().view()),
                WorkResource::StorageTexture(field.front().view()),
            ],
        );

        // An even pass count keeps the result in the front texture.
        let iterations = reinitialise_iterations + reinitialise_iterations % 2;

        let mut reinitialise_cmd = CommandBuffer::new(device, "level set reinitialise");
        {
            let field = field.clone();
            let phi0 = phi0.clone();
            reinitialise_cmd.record(move |encoder| {
                phi0.copy_from(encoder, field.front());
                let mut pass = compute_pass(encoder, "redistance");
                for i in 0..iterations {
                    if i % 2 == 0 {
                        forward.record(&mut pass);
                    } else {
                        backward.record(&mut pass);
                    }
                }
            });
        }

        LevelSet {
            field,
            phi0,
            extrapolate_work,
            extrapolate_cmd: None,
            reinitialise_cmd,
            size,
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// The readable field.
    pub fn phi(&self) -> &Texture {
        self.field.front()
    }

    /// Front/back pair, for passes that rewrite the field.
    pub fn field(&self) -> &DoubleBuffered {
        &self.field
    }

    /// Iterated Godunov redistancing: restores |∇φ| = 1 while keeping the
    /// zero crossing in place to first order.
    pub fn reinitialise(&self) {
        self.reinitialise_cmd.submit();
    }

    /// Attach the solid field this level set extrapolates into.
    pub fn extrapolate_bind(&mut self, device: &Device, solid_phi: &Texture) {
        let bound = self.extrapolate_work.bind(
            device,
            &[
                WorkResource::Texture(solid_phi.view()),
                WorkResource::Texture(self.field.front().view()),
                WorkResource::StorageTexture(self.field.back().view()),
            ],
        );
        let mut cmd = CommandBuffer::new(device, "level set extrapolate");
        let field = self.field.clone();
        cmd.record(move |encoder| {
            {
                let mut pass = compute_pass(encoder, "extrapolate");
                bound.record(&mut pass);
            }
            field.copy_back(encoder);
        });
        self.extrapolate_cmd = Some(cmd);
    }

    /// Single-cell extrapolation into the solid band, so interpolation near
    /// obstacles stays defined.
    pub fn extrapolate(&self) {
        self.extrapolate_cmd
            .as_ref()
            .expect("extrapolate before extrapolate_bind")
            .submit();
    }

    /// Uploads a field authored on the host.
    pub fn write(&self, device: &Device, data: &[f32]) {
        self.field.front().write(device, data);
    }

    pub fn read(&self, device: &Device) -> Vec<f32> {
        self.field.front().read(device)
    }
}
