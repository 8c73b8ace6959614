use super::device::Device;

/// A reusable unit of GPU work.
///
/// wgpu command buffers are consumed on submission, so re-submittable work is
/// stored as a recording closure and encoded fresh on every `submit`. The
/// closure owns (refcounted) handles to everything it records, which keeps the
/// resource-outlives-commands rule trivially satisfied.
pub struct CommandBuffer {
    device: Device,
    label: &'static str,
    commands: Option<Box<dyn Fn(&mut wgpu::CommandEncoder)>>,
}

impl CommandBuffer {
    pub fn new(device: &Device, label: &'static str) -> CommandBuffer {
        CommandBuffer {
            device: device.clone(),
            label,
            commands: None,
        }
    }

    pub fn record(&mut self, commands: impl Fn(&mut wgpu::CommandEncoder) + 'static) {
        self.commands = Some(Box::new(commands));
    }

    /// Encodes the recorded commands and queues them. Non-blocking.
    pub fn submit(&self) {
        let commands = self
            .commands
            .as_ref()
            .unwrap_or_else(|| panic!("{}: submit before record", self.label));
        let mut encoder = self
            .device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(self.label) });
        commands(&mut encoder);
        self.device.queue().submit(Some(encoder.finish()));
    }

    /// Blocks until previously submitted work completed.
    pub fn wait(&self) {
        self.device.wait_idle();
    }
}

/// Begins a labelled compute pass. Every recorded phase goes through this so
/// captures show up with usable names.
pub fn compute_pass<'a>(encoder: &'a mut wgpu::CommandEncoder, label: &str) -> wgpu::ComputePass<'a> {
    encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    })
}
