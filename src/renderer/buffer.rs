use std::marker::PhantomData;

use super::device::Device;

/// A typed, device-local storage buffer of `len` elements.
///
/// The element type is shared with the shaders through bytemuck, so it must be
/// `Pod` with the layout the WGSL side expects.
pub struct Buffer<T: bytemuck::Pod> {
    buffer: wgpu::Buffer,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> Buffer<T> {
    pub fn new(device: &Device, label: &str, len: usize) -> Buffer<T> {
        Self::with_usage(
            device,
            label,
            len,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        )
    }

    /// Same as `new` but with extra usages (INDIRECT for dispatch parameters,
    /// VERTEX for renderers that want to consume the particle buffer).
    pub fn with_usage(device: &Device, label: &str, len: usize, usage: wgpu::BufferUsages) -> Buffer<T> {
        let buffer = device.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (len * std::mem::size_of::<T>()) as wgpu::BufferAddress,
            usage,
            mapped_at_creation: false,
        });

        Buffer {
            buffer,
            len,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size_in_bytes(&self) -> wgpu::BufferAddress {
        (self.len * std::mem::size_of::<T>()) as wgpu::BufferAddress
    }

    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }

    /// Uploads `data` starting at element `offset`.
    pub fn write(&self, device: &Device, offset: usize, data: &[T]) {
        debug_assert!(offset + data.len() <= self.len);
        device.queue().write_buffer(
            &self.buffer,
            (offset * std::mem::size_of::<T>()) as wgpu::BufferAddress,
            bytemuck::cast_slice(data),
        );
    }

    /// Copies the whole buffer back to the host. Blocking, meant for tests and
    /// end-of-step readbacks, not for the steady-state path.
    pub fn read(&self, device: &Device) -> Vec<T> {
        let staging = device.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback staging"),
            size: self.size_in_bytes(),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        device.execute_once(|encoder| {
            encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, self.size_in_bytes());
        });

        map_and_read(device, &staging)
    }

    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.buffer, 0, None);
    }

    pub fn copy_from(&self, encoder: &mut wgpu::CommandEncoder, src: &Buffer<T>) {
        debug_assert!(src.len == self.len);
        encoder.copy_buffer_to_buffer(&src.buffer, 0, &self.buffer, 0, self.size_in_bytes());
    }
}

/// Maps `staging` for reading, waits for the map and returns its contents.
pub(crate) fn map_and_read<T: bytemuck::Pod>(device: &Device, staging: &wgpu::Buffer) -> Vec<T> {
    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.wait_idle();
    receiver
        .recv()
        .expect("map_async callback dropped")
        .expect("failed to map readback buffer");

    let data = bytemuck::cast_slice(&slice.get_mapped_range()).to_vec();
    staging.unmap();
    data
}
