mod common;

use gyre::glam::UVec2;
use gyre::wgpu;
use gyre::{Buffer, ReduceMax, ReduceSum};

fn reduce_sum_of(ctx: &common::TestContext, size: UVec2, data: &[f32]) -> f32 {
    let input: Buffer<f32> = Buffer::new(&ctx.device, "reduce input", data.len());
    let output: Buffer<f32> = Buffer::new(&ctx.device, "reduce output", 1);
    input.write(&ctx.device, 0, data);

    let reduce = ReduceSum::new(&ctx.device, &ctx.shaders, size);
    let bound = reduce.bind(&ctx.device, input.raw(), output.raw());
    ctx.device.execute_once(|encoder| {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("reduce"),
            timestamp_writes: None,
        });
        bound.record(&mut pass);
    });

    output.read(&ctx.device)[0]
}

#[test]
fn reduce_sum_small() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(10, 15);
    let data: Vec<f32> = (1..=150).map(|v| v as f32).collect();
    assert_eq!(reduce_sum_of(&ctx, size, &data), 11325.0);
}

#[test]
fn reduce_sum_arithmetic_progression_multi_level() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    // 5000 elements force a second reduction level; the sum stays an exactly
    // representable integer.
    let size = UVec2::new(100, 50);
    let n = (size.x * size.y) as u64;
    let data: Vec<f32> = (1..=n).map(|v| v as f32).collect();
    assert_eq!(reduce_sum_of(&ctx, size, &data), (n * (n + 1) / 2) as f32);
}

#[test]
fn reduce_sum_big() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    // Three reduction levels; all-ones keeps the float sum exact.
    let size = UVec2::new(400, 400);
    let data = vec![1.0f32; (size.x * size.y) as usize];
    assert_eq!(reduce_sum_of(&ctx, size, &data), 160000.0);
}

#[test]
fn reduce_max_magnitude() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(10, 15);
    let data: Vec<f32> = (1..=150).map(|v| -(v as f32)).collect();

    let input: Buffer<f32> = Buffer::new(&ctx.device, "reduce input", data.len());
    let output: Buffer<f32> = Buffer::new(&ctx.device, "reduce output", 1);
    input.write(&ctx.device, 0, &data);

    let reduce = ReduceMax::new(&ctx.device, &ctx.shaders, size);
    let bound = reduce.bind(&ctx.device, input.raw(), output.raw());
    ctx.device.execute_once(|encoder| {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("reduce max"),
            timestamp_writes: None,
        });
        bound.record(&mut pass);
    });

    assert_eq!(output.read(&ctx.device)[0], 150.0);
}
