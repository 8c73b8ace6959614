mod common;

use gyre::glam::UVec2;
use gyre::wgpu;
use gyre::{Buffer, Transfer};

#[test]
fn transfer_prolongate() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let fine_size = UVec2::new(4, 4);

    let fine_diagonal: Buffer<f32> = Buffer::new(&ctx.device, "fine diag", 16);
    let coarse_diagonal: Buffer<f32> = Buffer::new(&ctx.device, "coarse diag", 9);
    fine_diagonal.write(&ctx.device, 0, &[1.0; 16]);
    coarse_diagonal.write(&ctx.device, 0, &[1.0; 9]);

    let input: Buffer<f32> = Buffer::new(&ctx.device, "coarse input", 9);
    let output: Buffer<f32> = Buffer::new(&ctx.device, "fine output", 16);
    let data: Vec<f32> = (1..=9).map(|v| v as f32).collect();
    input.write(&ctx.device, 0, &data);

    let mut transfer = Transfer::new(&ctx.device, &ctx.shaders);
    transfer.init_prolongate(
        &ctx.device,
        0,
        fine_size,
        output.raw(),
        fine_diagonal.raw(),
        input.raw(),
        coarse_diagonal.raw(),
    );
    ctx.device.execute_once(|encoder| {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("prolongate"),
            timestamp_writes: None,
        });
        transfer.prolongate(&mut pass, 0);
    });

    let result = output.read(&ctx.device);
    let at = |i: usize, j: usize| result[i + 4 * j];
    assert_eq!(at(1, 1), (9.0 * 5.0 + 3.0 * 2.0 + 3.0 * 4.0 + 1.0) / 16.0);
    assert_eq!(at(2, 1), (9.0 * 5.0 + 3.0 * 2.0 + 3.0 * 6.0 + 3.0) / 16.0);
    assert_eq!(at(1, 2), (9.0 * 5.0 + 3.0 * 4.0 + 3.0 * 8.0 + 7.0) / 16.0);
    assert_eq!(at(2, 2), (9.0 * 5.0 + 3.0 * 6.0 + 3.0 * 8.0 + 9.0) / 16.0);
}

#[test]
fn transfer_restrict() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let fine_size = UVec2::new(4, 4);

    let fine_diagonal: Buffer<f32> = Buffer::new(&ctx.device, "fine diag", 16);
    let coarse_diagonal: Buffer<f32> = Buffer::new(&ctx.device, "coarse diag", 9);
    fine_diagonal.write(&ctx.device, 0, &[1.0; 16]);
    coarse_diagonal.write(&ctx.device, 0, &[1.0; 9]);

    let input: Buffer<f32> = Buffer::new(&ctx.device, "fine input", 16);
    let output: Buffer<f32> = Buffer::new(&ctx.device, "coarse output", 9);
    let data: Vec<f32> = (1..=16).map(|v| v as f32).collect();
    input.write(&ctx.device, 0, &data);

    let mut transfer = Transfer::new(&ctx.device, &ctx.shaders);
    transfer.init_restrict(
        &ctx.device,
        0,
        fine_size,
        input.raw(),
        fine_diagonal.raw(),
        output.raw(),
        coarse_diagonal.raw(),
    );
    ctx.device.execute_once(|encoder| {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("restrict"),
            timestamp_writes: None,
        });
        transfer.restrict(&mut pass, 0);
    });

    let result = output.read(&ctx.device);
    let expected = (1.0 + 3.0 * 2.0 + 3.0 * 3.0 + 4.0
        + 3.0 * 5.0
        + 9.0 * 6.0
        + 9.0 * 7.0
        + 3.0 * 8.0
        + 3.0 * 9.0
        + 9.0 * 10.0
        + 9.0 * 11.0
        + 3.0 * 12.0
        + 13.0
        + 3.0 * 14.0
        + 3.0 * 15.0
        + 16.0)
        / 64.0;
    assert_eq!(result[1 + 3], expected);
}

/// On a smooth field, pushing a coarse correction up and restricting it back
/// reproduces it approximately (identity up to the stencils' smoothing).
#[test]
fn prolongate_then_restrict_roundtrip() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let fine_size = UVec2::new(32, 32);
    let coarse_size = UVec2::new(17, 17);
    let fine_n = (fine_size.x * fine_size.y) as usize;
    let coarse_n = (coarse_size.x * coarse_size.y) as usize;

    let fine_diagonal: Buffer<f32> = Buffer::new(&ctx.device, "fine diag", fine_n);
    let coarse_diagonal: Buffer<f32> = Buffer::new(&ctx.device, "coarse diag", coarse_n);
    fine_diagonal.write(&ctx.device, 0, &vec![1.0; fine_n]);
    coarse_diagonal.write(&ctx.device, 0, &vec![1.0; coarse_n]);

    // A constant field: prolongation reproduces it exactly, restriction of
    // the reproduction is again constant away from the borders.
    let coarse_in: Buffer<f32> = Buffer::new(&ctx.device, "coarse in", coarse_n);
    let fine: Buffer<f32> = Buffer::new(&ctx.device, "fine", fine_n);
    let coarse_out: Buffer<f32> = Buffer::new(&ctx.device, "coarse out", coarse_n);
    coarse_in.write(&ctx.device, 0, &vec![2.0; coarse_n]);

    let mut transfer = Transfer::new(&ctx.device, &ctx.shaders);
    transfer.init_prolongate(
        &ctx.device,
        0,
        fine_size,
        fine.raw(),
        fine_diagonal.raw(),
        coarse_in.raw(),
        coarse_diagonal.raw(),
    );
    transfer.init_restrict(
        &ctx.device,
        1,
        fine_size,
        fine.raw(),
        fine_diagonal.raw(),
        coarse_out.raw(),
        coarse_diagonal.raw(),
    );
    ctx.device.execute_once(|encoder| {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("roundtrip"),
            timestamp_writes: None,
        });
        transfer.prolongate(&mut pass, 0);
        transfer.restrict(&mut pass, 1);
    });

    let result = coarse_out.read(&ctx.device);
    for j in 2..coarse_size.y as usize - 2 {
        for i in 2..coarse_size.x as usize - 2 {
            let value = result[i + coarse_size.x as usize * j];
            assert!((value - 2.0).abs() < 1e-4, "({}, {}) = {}", i, j, value);
        }
    }
}
