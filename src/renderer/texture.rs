use glam::UVec2;

use super::buffer::map_and_read;
use super::device::Device;

fn bytes_per_pixel(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::R32Float => 4,
        wgpu::TextureFormat::Rg32Float => 8,
        wgpu::TextureFormat::Rgba8Unorm => 4,
        _ => unreachable!("unsupported field format {:?}", format),
    }
}

fn round_to_multiple(value: u32, multiple: u32) -> u32 {
    (value + multiple - 1) / multiple * multiple
}

/// A 2D GPU field. Read through sampled bindings (`textureLoad`), written
/// through write-only storage bindings, copied for readback.
#[derive(Clone)]
pub struct Texture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: UVec2,
    format: wgpu::TextureFormat,
}

impl Texture {
    pub fn new(device: &Device, label: &str, size: UVec2, format: wgpu::TextureFormat) -> Texture {
        let texture = device.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());

        Texture {
            texture,
            view,
            size,
            format,
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn raw(&self) -> &wgpu::Texture {
        &self.texture
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.size.x,
            height: self.size.y,
            depth_or_array_layers: 1,
        }
    }

    /// Uploads a full field worth of texels.
    pub fn write<T: bytemuck::Pod>(&self, device: &Device, data: &[T]) {
        debug_assert_eq!(
            data.len() * std::mem::size_of::<T>(),
            (self.size.x * self.size.y * bytes_per_pixel(self.format)) as usize
        );
        device.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(data),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.size.x * bytes_per_pixel(self.format)),
                rows_per_image: Some(self.size.y),
            },
            self.extent(),
        );
    }

    /// Copies the field back to the host, stripping the row padding the copy
    /// alignment rules impose. Blocking; test/readback use only.
    pub fn read<T: bytemuck::Pod>(&self, device: &Device) -> Vec<T> {
        let bpp = bytes_per_pixel(self.format);
        let padded_row = round_to_multiple(self.size.x * bpp, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let staging = device.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("texture readback staging"),
            size: (padded_row * self.size.y) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        device.execute_once(|encoder| {
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: &self.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &staging,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_row),
                        rows_per_image: Some(self.size.y),
                    },
                },
                self.extent(),
            );
        });

        let padded: Vec<u8> = map_and_read(device, &staging);
        let row_bytes = (self.size.x * bpp) as usize;
        let mut packed = Vec::with_capacity(row_bytes * self.size.y as usize);
        for row in 0..self.size.y as usize {
            let start = row * padded_row as usize;
            packed.extend_from_slice(&padded[start..start + row_bytes]);
        }
        bytemuck::cast_slice(&packed).to_vec()
    }

    pub fn copy_from(&self, encoder: &mut wgpu::CommandEncoder, src: &Texture) {
        debug_assert_eq!(self.size, src.size);
        encoder.copy_texture_to_texture(
            src.texture.as_image_copy(),
            self.texture.as_image_copy(),
            self.extent(),
        );
    }
}

/// Front/back pair for fields that are both read and written within one step.
/// Kernels read the front and write the back; `copy_back` republishes the back
/// as the readable front. Keeping a single canonical front means consumers
/// never need two descriptor sets for the same field.
#[derive(Clone)]
pub struct DoubleBuffered {
    front: Texture,
    back: Texture,
}

impl DoubleBuffered {
    pub fn new(device: &Device, label: &str, size: UVec2, format: wgpu::TextureFormat) -> DoubleBuffered {
        DoubleBuffered {
            front: Texture::new(device, &format!("{} (front)", label), size, format),
            back: Texture::new(device, &format!("{} (back)", label), size, format),
        }
    }

    pub fn front(&self) -> &Texture {
        &self.front
    }

    pub fn back(&self) -> &Texture {
        &self.back
    }

    pub fn copy_back(&self, encoder: &mut wgpu::CommandEncoder) {
        self.front.copy_from(encoder, &self.back);
    }
}
