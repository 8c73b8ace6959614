mod common;

use gyre::glam::UVec2;
use gyre::wgpu;
use gyre::{Buffer, DispatchParams, PrefixScan};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn check_scan(ctx: &common::TestContext, size: UVec2, input_data: &[i32]) {
    let n = input_data.len();
    let input: Buffer<i32> = Buffer::new(&ctx.device, "scan input", n);
    let output: Buffer<i32> = Buffer::new(&ctx.device, "scan output", n);
    let params: Buffer<DispatchParams> = Buffer::new(&ctx.device, "scan params", 1);
    input.write(&ctx.device, 0, input_data);

    let scan = PrefixScan::new(&ctx.device, &ctx.shaders, size);
    let bound = scan.bind(&ctx.device, &input, &output, &params);
    ctx.device.execute_once(|encoder| {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("scan"),
            timestamp_writes: None,
        });
        bound.record(&mut pass);
    });

    let mut expected = vec![0i32; n];
    for i in 1..n {
        expected[i] = expected[i - 1] + input_data[i - 1];
    }
    assert_eq!(output.read(&ctx.device), expected);

    let total = (expected[n - 1] + input_data[n - 1]) as u32;
    let out_params = params.read(&ctx.device)[0];
    assert_eq!(out_params.count, total);
    assert_eq!(out_params.work_size[0], total.div_ceil(256));
    assert_eq!(out_params.work_size[1], 1);
    assert_eq!(out_params.work_size[2], 1);
}

#[test]
fn prefix_scan_small() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(20, 20);
    let mut rng = SmallRng::seed_from_u64(7);
    let data: Vec<i32> = (0..size.x * size.y).map(|_| rng.gen_range(0..5)).collect();
    check_scan(&ctx, size, &data);
}

#[test]
fn prefix_scan_big() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(100, 100);
    let mut rng = SmallRng::seed_from_u64(13);
    let data: Vec<i32> = (0..size.x * size.y).map(|_| rng.gen_range(0..5)).collect();
    check_scan(&ctx, size, &data);
}

#[test]
fn prefix_scan_three_levels() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    // 512 * 256 elements: block sums themselves need two scan levels.
    let size = UVec2::new(512, 256);
    let mut rng = SmallRng::seed_from_u64(42);
    let data: Vec<i32> = (0..size.x * size.y).map(|_| rng.gen_range(0..3)).collect();
    check_scan(&ctx, size, &data);
}
