//! Shared fixture: a headless device (tests skip when the machine has no
//! adapter) plus CPU reference implementations the GPU results are checked
//! against.
#![allow(dead_code)]

use gyre::glam::{UVec2, Vec2};
use gyre::{Device, ShaderLibrary};

pub struct TestContext {
    pub device: Device,
    pub shaders: ShaderLibrary,
}

impl TestContext {
    /// Returns `None` (after logging) when no GPU adapter is available, so
    /// suites stay green on headless machines without compute devices.
    pub fn new() -> Option<TestContext> {
        let _ = env_logger::builder().is_test(true).try_init();
        match Device::new() {
            Ok(device) => {
                let shaders = ShaderLibrary::new(&device);
                Some(TestContext { device, shaders })
            }
            Err(err) => {
                eprintln!("skipping GPU test: {}", err);
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CPU reference: the variational pressure system on a circular-boundary scene.

pub fn fraction_inside(a: f32, b: f32) -> f32 {
    if a < 0.0 && b < 0.0 {
        1.0
    } else if a < 0.0 {
        a / (a - b)
    } else if b < 0.0 {
        b / (b - a)
    } else {
        0.0
    }
}

/// The classic test scene: a circular open domain with liquid filling the
/// right half, velocity seeded with a uniform downward pull.
pub struct Scene {
    pub size: UVec2,
    pub solid_phi: Vec<f32>,
    pub liquid_phi: Vec<f32>,
    pub velocity: Vec<Vec2>,
}

impl Scene {
    pub fn circle(size: UVec2) -> Scene {
        let w = size.x as f32;
        let centre = Vec2::new(0.5 * w, 0.5 * w);
        let radius = 0.4 * w;

        let mut solid_phi = Vec::with_capacity((size.x * size.y) as usize);
        let mut liquid_phi = Vec::with_capacity((size.x * size.y) as usize);
        let mut velocity = Vec::with_capacity((size.x * size.y) as usize);
        for j in 0..size.y {
            for i in 0..size.x {
                let node = Vec2::new(i as f32, j as f32);
                // Open inside the circle, solid outside.
                solid_phi.push(radius - node.distance(centre));
                // Liquid in the right half of the circle.
                let cell = Vec2::new(i as f32 + 0.5, j as f32 + 0.5);
                let circle = cell.distance(centre) - radius;
                let half = 0.5 * w - cell.x;
                liquid_phi.push(circle.max(half));
                velocity.push(Vec2::new(0.0, -0.098));
            }
        }

        Scene {
            size,
            solid_phi,
            liquid_phi,
            velocity,
        }
    }

    fn at(&self, i: i32, j: i32) -> usize {
        let i = i.clamp(0, self.size.x as i32 - 1);
        let j = j.clamp(0, self.size.y as i32 - 1);
        (i + self.size.x as i32 * j) as usize
    }

    fn solid(&self, i: i32, j: i32) -> f32 {
        self.solid_phi[self.at(i, j)]
    }

    fn liquid(&self, i: i32, j: i32) -> f32 {
        self.liquid_phi[self.at(i, j)]
    }

    pub fn u_weight(&self, i: i32, j: i32) -> f32 {
        (1.0 - fraction_inside(self.solid(i, j), self.solid(i, j + 1))).clamp(0.0, 1.0)
    }

    pub fn v_weight(&self, i: i32, j: i32) -> f32 {
        (1.0 - fraction_inside(self.solid(i, j), self.solid(i + 1, j))).clamp(0.0, 1.0)
    }
}

/// Matrix and rhs in the same layout the GPU assembles: identity rows for
/// air/solid/border cells, lower triangle split into the -x and -y couplings.
pub struct CpuSystem {
    pub diagonal: Vec<f32>,
    pub lower: Vec<Vec2>,
    pub b: Vec<f32>,
}

pub fn build_cpu_system(scene: &Scene, dt: f32) -> CpuSystem {
    let (w, h) = (scene.size.x as i32, scene.size.y as i32);
    let n = (w * h) as usize;
    let mut diagonal = vec![1.0f32; n];
    let mut lower = vec![Vec2::ZERO; n];
    let mut b = vec![0.0f32; n];

    for j in 1..h - 1 {
        for i in 1..w - 1 {
            let index = (i + w * j) as usize;
            let phi_c = scene.liquid(i, j);
            if phi_c >= 0.0 {
                continue;
            }

            let mut diag = 0.0f32;
            let mut low = Vec2::ZERO;

            // Left u-face.
            {
                let term = scene.u_weight(i, j) * dt;
                let phi_n = scene.liquid(i - 1, j);
                if phi_n < 0.0 {
                    diag += term;
                    if i > 1 {
                        low.x = -term;
                    }
                } else {
                    diag += term / fraction_inside(phi_c, phi_n).clamp(0.01, 1.0);
                }
            }
            // Right u-face.
            {
                let term = scene.u_weight(i + 1, j) * dt;
                let phi_n = scene.liquid(i + 1, j);
                if phi_n < 0.0 {
                    diag += term;
                } else {
                    diag += term / fraction_inside(phi_c, phi_n).clamp(0.01, 1.0);
                }
            }
            // Bottom v-face.
            {
                let term = scene.v_weight(i, j) * dt;
                let phi_n = scene.liquid(i, j - 1);
                if phi_n < 0.0 {
                    diag += term;
                    if j > 1 {
                        low.y = -term;
                    }
                } else {
                    diag += term / fraction_inside(phi_c, phi_n).clamp(0.01, 1.0);
                }
            }
            // Top v-face.
            {
                let term = scene.v_weight(i, j + 1) * dt;
                let phi_n = scene.liquid(i, j + 1);
                if phi_n < 0.0 {
                    diag += term;
                } else {
                    diag += term / fraction_inside(phi_c, phi_n).clamp(0.01, 1.0);
                }
            }

            if diag == 0.0 {
                diag = 1.0;
                low = Vec2::ZERO;
            }

            let vel = |i: i32, j: i32| scene.velocity[scene.at(i, j)];
            let div = scene.u_weight(i + 1, j) * vel(i + 1, j).x - scene.u_weight(i, j) * vel(i, j).x
                + scene.v_weight(i, j + 1) * vel(i, j + 1).y
                - scene.v_weight(i, j) * vel(i, j).y;

            diagonal[index] = diag;
            lower[index] = low;
            b[index] = -div;
        }
    }

    CpuSystem { diagonal, lower, b }
}

/// Reference conjugate gradient in f64, using the same symmetric 5-point
/// structure as the GPU kernels.
pub fn cpu_solve(system: &CpuSystem, size: UVec2, tolerance: f64, max_iterations: usize) -> Vec<f32> {
    let n = system.diagonal.len();
    let w = size.x as usize;

    let apply = |x: &[f64], out: &mut [f64]| {
        for i in 0..n {
            let mut sum = system.diagonal[i] as f64 * x[i];
            if i % w != 0 {
                sum += system.lower[i].x as f64 * x[i - 1];
            }
            if i >= w {
                sum += system.lower[i].y as f64 * x[i - w];
            }
            if i + 1 < n && (i + 1) % w != 0 {
                sum += system.lower[i + 1].x as f64 * x[i + 1];
            }
            if i + w < n {
                sum += system.lower[i + w].y as f64 * x[i + w];
            }
            out[i] = sum;
        }
    };

    let mut x = vec![0.0f64; n];
    let mut r: Vec<f64> = system.b.iter().map(|&v| v as f64).collect();
    let mut p = r.clone();
    let mut q = vec![0.0f64; n];
    let mut rho: f64 = r.iter().map(|v| v * v).sum();

    for _ in 0..max_iterations {
        let max_r = r.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        if max_r < tolerance {
            break;
        }
        apply(&p, &mut q);
        let sigma: f64 = p.iter().zip(&q).map(|(a, b)| a * b).sum();
        if sigma == 0.0 {
            break;
        }
        let alpha = rho / sigma;
        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * q[i];
        }
        let rho_new: f64 = r.iter().map(|v| v * v).sum();
        let beta = rho_new / rho;
        for i in 0..n {
            p[i] = r[i] + beta * p[i];
        }
        rho = rho_new;
    }

    x.iter().map(|&v| v as f32).collect()
}
