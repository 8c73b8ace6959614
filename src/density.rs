use glam::UVec2;

use crate::renderer::{Device, DoubleBuffered};

/// The smoke dye field: an RGBA8 image advected along the velocity field.
pub struct Density {
    field: DoubleBuffered,
}

impl Density {
    pub fn new(device: &Device, size: UVec2) -> Density {
        Density {
            field: DoubleBuffered::new(device, "density", size, wgpu::TextureFormat::Rgba8Unorm),
        }
    }

    pub fn field(&self) -> &DoubleBuffered {
        &self.field
    }

    /// RGBA8 texels, row-major.
    pub fn write(&self, device: &Device, data: &[[u8; 4]]) {
        self.field.front().write(device, data);
    }

    pub fn read(&self, device: &Device) -> Vec<[u8; 4]> {
        self.field.front().read(device)
    }
}
