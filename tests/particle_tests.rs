mod common;

use gyre::glam::{UVec2, Vec2};
use gyre::{Particle, Particles, Splat, SplatOp, SplatShape};

fn cell_of(p: Vec2) -> (i32, i32) {
    (p.x.floor() as i32, p.y.floor() as i32)
}

#[test]
fn particle_count() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(20, 20);
    let mut particles = Particles::new(&ctx.device, &ctx.shaders, size);
    particles.set_particles(&[
        Particle { position: Vec2::new(3.4, 2.3) },
        Particle { position: Vec2::new(3.5, 2.4) },
        Particle { position: Vec2::new(5.4, 6.7) },
    ]);

    particles.count();
    ctx.device.wait_idle();

    let counts = particles.read_counts();
    assert_eq!(counts[3 + 20 * 2], 2);
    assert_eq!(counts[5 + 20 * 6], 1);
    assert_eq!(counts.iter().map(|&c| c as i64).sum::<i64>(), 3);
}

#[test]
fn particle_bucket_keeps_positions() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(20, 20);
    let mut particles = Particles::new(&ctx.device, &ctx.shaders, size);
    let seeded = [
        Particle { position: Vec2::new(3.4, 2.3) },
        Particle { position: Vec2::new(13.4, 16.7) },
        Particle { position: Vec2::new(3.5, 2.4) },
    ];
    particles.set_particles(&seeded);

    particles.count();
    particles.scan();
    ctx.device.wait_idle();

    assert_eq!(particles.live_count(), 3);

    // Same multiset of positions, grouped by cell in ascending index order.
    let out = particles.read_particles();
    let mut live: Vec<Vec2> = out[..3].iter().map(|p| p.position).collect();
    let mut expected: Vec<Vec2> = seeded.iter().map(|p| p.position).collect();
    let key = |v: &Vec2| (v.x.to_bits(), v.y.to_bits());
    live.sort_by_key(key);
    expected.sort_by_key(key);
    assert_eq!(live, expected);

    let cells: Vec<usize> = out[..3]
        .iter()
        .map(|p| {
            let (i, j) = cell_of(p.position);
            (i + 20 * j) as usize
        })
        .collect();
    assert!(cells.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn particle_delete() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(20, 20);
    let mut particles = Particles::new(&ctx.device, &ctx.shaders, size);
    let seeded = [
        Particle { position: Vec2::new(3.4, 2.3) },
        Particle { position: Vec2::new(13.4, 16.7) },
        Particle { position: Vec2::new(3.5, 2.4) },
    ];
    particles.set_particles(&seeded);
    particles.count();
    ctx.device.wait_idle();

    // Paint the cell holding the second particle empty; scan drops it.
    let erase = Splat::count(
        &ctx.device,
        &ctx.shaders,
        particles.count_grid(),
        size,
        SplatShape::Rect {
            min: Vec2::new(13.0, 16.0),
            max: Vec2::new(14.0, 17.0),
        },
        SplatOp::Set,
        0,
    );
    ctx.device.execute_once(|encoder| erase.record(encoder));

    particles.scan();
    ctx.device.wait_idle();

    assert_eq!(particles.live_count(), 2);
    let out = particles.read_particles();
    for p in &out[..2] {
        let (i, j) = cell_of(p.position);
        assert_eq!((i, j), (3, 2));
    }
}

#[test]
fn particle_spawn() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(20, 20);
    let mut particles = Particles::new(&ctx.device, &ctx.shaders, size);
    particles.set_particles(&[]);
    particles.count();
    ctx.device.wait_idle();

    // Ask for four particles in cell (10, 10).
    let spawn = Splat::count(
        &ctx.device,
        &ctx.shaders,
        particles.count_grid(),
        size,
        SplatShape::Rect {
            min: Vec2::new(10.0, 10.0),
            max: Vec2::new(11.0, 11.0),
        },
        SplatOp::Set,
        4,
    );
    ctx.device.execute_once(|encoder| spawn.record(encoder));

    particles.scan();
    ctx.device.wait_idle();

    assert_eq!(particles.live_count(), 4);
    let out = particles.read_particles();
    let mut positions: Vec<(u32, u32)> = Vec::new();
    for p in &out[..4] {
        assert_eq!(cell_of(p.position), (10, 10));
        positions.push((p.position.x.to_bits(), p.position.y.to_bits()));
    }
    positions.sort_unstable();
    positions.dedup();
    assert_eq!(positions.len(), 4, "spawned positions must be distinct");
}

#[test]
fn particle_overflow_is_dropped() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(20, 20);
    let mut particles = Particles::new(&ctx.device, &ctx.shaders, size);
    // Twelve particles crowd one cell; only the per-cell capacity survives.
    let crowded: Vec<Particle> = (0..12)
        .map(|k| Particle {
            position: Vec2::new(4.0 + (k as f32 + 0.5) / 16.0, 4.5),
        })
        .collect();
    particles.set_particles(&crowded);

    particles.count();
    particles.scan();
    ctx.device.wait_idle();

    assert_eq!(particles.live_count(), 8);
    let out = particles.read_particles();
    for p in &out[..8] {
        assert_eq!(cell_of(p.position), (4, 4));
    }
}
