use glam::UVec2;

use crate::renderer::{Bound, Buffer, ComputeSize, Device, DispatchParams, ShaderLibrary, Work, WorkDesc, WorkResource};
use crate::renderer::binding_types as bt;

const SCAN_BLOCK_SIZE: u32 = 256;

/// Exclusive prefix sum over `int[W*H]`, plus a dispatch-parameters write so
/// downstream kernels can dispatch over exactly the number of live elements.
///
/// Block-level scan within 256-wide workgroups, a recursive scan of the block
/// sums (the same kernel at a coarser size), then an add-back pass. Supports
/// up to 256^3 elements, which is three levels.
pub struct PrefixScan {
    scan_work: Work,
    add_work: Work,
    params_work: Work,
    sums0: Buffer<i32>,
    sums0_scanned: Buffer<i32>,
    sums1: Buffer<i32>,
    sums1_scanned: Buffer<i32>,
    sums2: Buffer<i32>,
    n: u32,
}

impl PrefixScan {
    pub fn new(device: &Device, shaders: &ShaderLibrary, size: UVec2) -> PrefixScan {
        let n = size.x * size.y;
        assert!(n <= SCAN_BLOCK_SIZE.pow(3), "prefix scan supports at most 256^3 elements");

        let blocks0 = n.div_ceil(SCAN_BLOCK_SIZE).max(1) as usize;
        let blocks1 = (blocks0 as u32).div_ceil(SCAN_BLOCK_SIZE).max(1) as usize;

        let scan_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "prefix scan",
                shader: "prefix_scan",
                size: ComputeSize::linear(n),
                bindings: &[bt::buffer(true), bt::buffer(false), bt::buffer(false)],
                push_constant_bytes: 4,
            },
        );
        let add_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "prefix scan add",
                shader: "prefix_scan_add",
                size: ComputeSize::linear(n),
                bindings: &[bt::buffer(false), bt::buffer(true)],
                push_constant_bytes: 4,
            },
        );
        let params_work = Work::new(
            device,
            shaders,
            WorkDesc {
                label: "prefix scan params",
                shader: "prefix_scan_params",
                size: ComputeSize {
                    work_size: [1, 1, 1],
                    local_size: [1, 1, 1],
                },
                bindings: &[bt::buffer(true), bt::buffer(true), bt::buffer(false)],
                push_constant_bytes: 4,
            },
        );

        PrefixScan {
            scan_work,
            add_work,
            params_work,
            sums0: Buffer::new(device, "scan block sums 0", blocks0),
            sums0_scanned: Buffer::new(device, "scan block sums 0 (scanned)", blocks0),
            sums1: Buffer::new(device, "scan block sums 1", blocks1),
            sums1_scanned: Buffer::new(device, "scan block sums 1 (scanned)", blocks1),
            sums2: Buffer::new(device, "scan block sums 2", 1),
            n,
        }
    }

    pub fn bind(
        &self,
        device: &Device,
        input: &Buffer<i32>,
        output: &Buffer<i32>,
        dispatch_params: &Buffer<DispatchParams>,
    ) -> PrefixScanBound {
        let n = self.n;
        let blocks0 = n.div_ceil(SCAN_BLOCK_SIZE);
        let blocks1 = blocks0.div_ceil(SCAN_BLOCK_SIZE);

        let mut steps = Vec::new();
        steps.push((
            self.scan_work.bind_sized(
                device,
                ComputeSize::linear(n),
                &[
                    WorkResource::Buffer(input.raw()),
                    WorkResource::Buffer(output.raw()),
                    WorkResource::Buffer(self.sums0.raw()),
                ],
            ),
            n,
        ));

        if blocks0 > 1 {
            steps.push((
                self.scan_work.bind_sized(
                    device,
                    ComputeSize::linear(blocks0),
                    &[
                        WorkResource::Buffer(self.sums0.raw()),
                        WorkResource::Buffer(self.sums0_scanned.raw()),
                        WorkResource::Buffer(self.sums1.raw()),
                    ],
                ),
                blocks0,
            ));
            if blocks1 > 1 {
                steps.push((
                    self.scan_work.bind_sized(
                        device,
                        ComputeSize::linear(blocks1),
                        &[
                            WorkResource::Buffer(self.sums1.raw()),
                            WorkResource::Buffer(self.sums1_scanned.raw()),
                            WorkResource::Buffer(self.sums2.raw()),
                        ],
                    ),
                    blocks1,
                ));
                steps.push((
                    self.add_work.bind_sized(
                        device,
                        ComputeSize::linear(blocks0),
                        &[
                            WorkResource::Buffer(self.sums0_scanned.raw()),
                            WorkResource::Buffer(self.sums1_scanned.raw()),
                        ],
                    ),
                    blocks0,
                ));
            }
            steps.push((
                self.add_work.bind_sized(
                    device,
                    ComputeSize::linear(n),
                    &[
                        WorkResource::Buffer(output.raw()),
                        WorkResource::Buffer(self.sums0_scanned.raw()),
                    ],
                ),
                n,
            ));
        }

        steps.push((
            self.params_work.bind(
                device,
                &[
                    WorkResource::Buffer(input.raw()),
                    WorkResource::Buffer(output.raw()),
                    WorkResource::Buffer(dispatch_params.raw()),
                ],
            ),
            n,
        ));

        PrefixScanBound { steps }
    }
}

pub struct PrefixScanBound {
    steps: Vec<(Bound, u32)>,
}

impl PrefixScanBound {
    pub fn record(&self, pass: &mut wgpu::ComputePass<'_>) {
        for (bound, n) in &self.steps {
            bound.record_pushed(pass, bytemuck::bytes_of(n));
        }
    }
}
