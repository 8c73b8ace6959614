use glam::{UVec2, Vec2, Vec4};

use crate::renderer::binding_types as bt;
use crate::renderer::command_buffer::compute_pass;
use crate::renderer::{Bound, Buffer, ComputeSize, Device, DoubleBuffered, ShaderLibrary, UniformBuffer, Work, WorkDesc, WorkResource};

/// Region a splat covers, in grid coordinates.
#[derive(Clone, Copy, Debug)]
pub enum SplatShape {
    Rect { min: Vec2, max: Vec2 },
    Circle { centre: Vec2, radius: f32 },
}

/// Whether the splat overwrites the field or accumulates into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplatOp {
    Set,
    Add,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SplatParams {
    min: Vec2,
    max: Vec2,
    value: Vec4,
    mode: u32,
    width: u32,
    height: u32,
    _pad: u32,
}

fn encode(shape: SplatShape, op: SplatOp, value: Vec4, size: UVec2) -> SplatParams {
    let (min, max, circle) = match shape {
        SplatShape::Rect { min, max } => (min, max, 0),
        SplatShape::Circle { centre, radius } => (centre, Vec2::new(radius, 0.0), 1),
    };
    SplatParams {
        min,
        max,
        value,
        mode: circle * 2 + if op == SplatOp::Add { 1 } else { 0 },
        width: size.x,
        height: size.y,
        _pad: 0,
    }
}

/// A recorded field source: writes a constant into a rectangular or circular
/// region of a field. The replacement for the drawn shape sources of a
/// rasterising renderer; everything here stays in compute.
pub struct Splat {
    uniform: UniformBuffer<SplatParams>,
    bound: Bound,
    target: Option<DoubleBuffered>,
    params: SplatParams,
}

impl Splat {
    /// Splat into a single-channel float field (level sets).
    pub fn float(
        device: &Device,
        shaders: &ShaderLibrary,
        target: &DoubleBuffered,
        shape: SplatShape,
        op: SplatOp,
        value: f32,
    ) -> Splat {
        Self::texture_splat(
            device,
            shaders,
            "splat_float",
            wgpu::TextureFormat::R32Float,
            target,
            shape,
            op,
            Vec4::new(value, 0.0, 0.0, 0.0),
        )
    }

    /// Splat into the velocity field (forces, inflows).
    pub fn velocity(
        device: &Device,
        shaders: &ShaderLibrary,
        target: &DoubleBuffered,
        shape: SplatShape,
        op: SplatOp,
        value: Vec2,
    ) -> Splat {
        Self::texture_splat(
            device,
            shaders,
            "splat_velocity",
            wgpu::TextureFormat::Rg32Float,
            target,
            shape,
            op,
            Vec4::new(value.x, value.y, 0.0, 0.0),
        )
    }

    /// Splat into the dye field.
    pub fn dye(
        device: &Device,
        shaders: &ShaderLibrary,
        target: &DoubleBuffered,
        shape: SplatShape,
        op: SplatOp,
        value: Vec4,
    ) -> Splat {
        Self::texture_splat(
            device,
            shaders,
            "splat_dye",
            wgpu::TextureFormat::Rgba8Unorm,
            target,
            shape,
            op,
            value,
        )
    }

    /// Splat a desired particle count into the per-cell count grid.
    pub fn count(
        device: &Device,
        shaders: &ShaderLibrary,
        count: &Buffer<i32>,
        size: UVec2,
        shape: SplatShape,
        op: SplatOp,
        value: i32,
    ) -> Splat {
        let work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "splat count",
                shader: "splat_count",
                size: ComputeSize::grid(size),
                bindings: &[bt::uniform(), bt::buffer(false)],
                push_constant_bytes: 0,
            },
        );
        let params = encode(shape, op, Vec4::new(value as f32, 0.0, 0.0, 0.0), size);
        let uniform = UniformBuffer::new(device);
        uniform.update_content(device, params);
        let bound = work.bind(
            device,
            &[
                WorkResource::Uniform(uniform.raw()),
                WorkResource::Buffer(count.raw()),
            ],
        );
        Splat {
            uniform,
            bound,
            target: None,
            params,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn texture_splat(
        device: &Device,
        shaders: &ShaderLibrary,
        shader: &'static str,
        format: wgpu::TextureFormat,
        target: &DoubleBuffered,
        shape: SplatShape,
        op: SplatOp,
        value: Vec4,
    ) -> Splat {
        let size = target.front().size();
        let work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: shader,
                shader,
                size: ComputeSize::grid(size),
                bindings: &[bt::uniform(), bt::texture2d(), bt::image2d(format)],
                push_constant_bytes: 0,
            },
        );
        let params = encode(shape, op, value, size);
        let uniform = UniformBuffer::new(device);
        uniform.update_content(device, params);
        let bound = work.bind(
            device,
            &[
                WorkResource::Uniform(uniform.raw()),
                WorkResource::Texture(target.front().view()),
                WorkResource::StorageTexture(target.back().view()),
            ],
        );
        Splat {
            uniform,
            bound,
            target: Some(target.clone()),
            params,
        }
    }

    /// Moves the splat region (sources that follow an emitter).
    pub fn set_shape(&mut self, device: &Device, shape: SplatShape) {
        let size = UVec2::new(self.params.width, self.params.height);
        let op = if self.params.mode % 2 == 1 { SplatOp::Add } else { SplatOp::Set };
        self.params = encode(shape, op, self.params.value, size);
        self.uniform.update_content(device, self.params);
    }

    pub fn set_value(&mut self, device: &Device, value: Vec4) {
        self.params.value = value;
        self.uniform.update_content(device, self.params);
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder) {
        {
            let mut pass = compute_pass(encoder, "splat");
            self.bound.record(&mut pass);
        }
        if let Some(target) = &self.target {
            target.copy_back(encoder);
        }
    }
}
