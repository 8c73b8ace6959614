use log::info;
use thiserror::Error;

/// Failures that can occur while bringing up the GPU. All of them are fatal:
/// there is no degraded mode without a compute-capable device.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/// Owns the wgpu device and its single submission queue. Everything else in
/// the crate borrows this (cloning is cheap, the handles are refcounted).
#[derive(Clone)]
pub struct Device {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl Device {
    /// Creates a headless device on the first suitable adapter.
    pub fn new() -> Result<Device, InitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|_| InitError::NoAdapter)?;

        info!("using adapter: {:?}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("gyre device"),
            required_features: wgpu::Features::PUSH_CONSTANTS,
            required_limits: wgpu::Limits {
                max_push_constant_size: 32,
                ..wgpu::Limits::default()
            },
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))?;

        Ok(Device { device, queue })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Blocks until all submitted work has completed.
    pub fn wait_idle(&self) {
        let _ = self.device.poll(wgpu::MaintainBase::Wait);
    }

    /// Records a one-shot command buffer, submits it and waits for completion.
    pub fn execute_once(&self, record: impl FnOnce(&mut wgpu::CommandEncoder)) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("execute once"),
        });
        record(&mut encoder);
        self.queue.submit(Some(encoder.finish()));
        self.wait_idle();
    }
}
