mod common;

use gyre::glam::{UVec2, Vec2};
use gyre::{LevelSet, Texture};

#[test]
fn reinitialise_recovers_distances() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(32, 32);
    let centre = Vec2::new(16.0, 16.0);
    let radius = 8.0;

    // A badly scaled field with the right zero crossing: +/- 10 step.
    let mut phi = Vec::with_capacity((size.x * size.y) as usize);
    for j in 0..size.y {
        for i in 0..size.x {
            let cell = Vec2::new(i as f32 + 0.5, j as f32 + 0.5);
            let inside = cell.distance(centre) < radius;
            phi.push(if inside { -10.0 } else { 10.0 });
        }
    }

    let level_set = LevelSet::new(&ctx.device, &ctx.shaders, "test phi", size);
    level_set.write(&ctx.device, &phi);
    level_set.reinitialise();
    ctx.device.wait_idle();

    let out = level_set.read(&ctx.device);
    let at = |i: u32, j: u32| out[(i + size.x * j) as usize];

    // Signed distance within a cell of truth, sampled around the field.
    for (i, j) in [(16u32, 16u32), (16, 8), (16, 24), (8, 16), (24, 16), (2, 2), (16, 2)] {
        let cell = Vec2::new(i as f32 + 0.5, j as f32 + 0.5);
        let expected = cell.distance(centre) - radius;
        let got = at(i, j);
        assert!(
            (got - expected).abs() <= 1.2,
            "phi({}, {}) = {}, expected about {}",
            i,
            j,
            got,
            expected
        );
    }
}

#[test]
fn extrapolate_fills_solid_band() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(16, 16);
    let n = (size.x * size.y) as usize;

    // Solid occupies the left half; liquid value only defined on the right.
    let mut solid = vec![1.0f32; n];
    let mut liquid = vec![5.0f32; n];
    for j in 0..size.y {
        for i in 0..size.x {
            let index = (i + size.x * j) as usize;
            if i < 8 {
                solid[index] = -1.0;
                liquid[index] = 5.0;
            } else {
                liquid[index] = -2.0;
            }
        }
    }

    let solid_phi = Texture::new(&ctx.device, "solid phi", size, gyre::wgpu::TextureFormat::R32Float);
    solid_phi.write(&ctx.device, &solid);

    let mut level_set = LevelSet::new(&ctx.device, &ctx.shaders, "liquid", size);
    level_set.write(&ctx.device, &liquid);
    level_set.extrapolate_bind(&ctx.device, &solid_phi);
    level_set.extrapolate();
    ctx.device.wait_idle();

    let out = level_set.read(&ctx.device);
    // The solid column adjacent to the liquid took a one-cell extension.
    for j in 1..size.y - 1 {
        let index = (7 + size.x * j) as usize;
        assert_eq!(out[index], -1.0, "row {}", j);
    }
    // Deep solid cells are untouched.
    assert_eq!(out[(2 + size.x * 4) as usize], 5.0);
}
