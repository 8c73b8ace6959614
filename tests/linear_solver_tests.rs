mod common;

use common::{build_cpu_system, cpu_solve, CpuSystem, Scene};
use gyre::glam::UVec2;
use gyre::{
    ConjugateGradient, Diagonal, GaussSeidel, IncompletePoisson, LinearSolverData, Multigrid, Parameters,
    Preconditioner, Texture,
};

const DT: f32 = 1.0;

fn upload(ctx: &common::TestContext, data: &LinearSolverData, system: &CpuSystem) {
    data.diagonal.write(&ctx.device, 0, &system.diagonal);
    data.lower.write(&ctx.device, 0, &system.lower);
    data.b.write(&ctx.device, 0, &system.b);
}

fn check_pressure(size: UVec2, gpu: &[f32], reference: &[f32], tolerance: f32) {
    for j in 0..size.y as usize {
        for i in 0..size.x as usize {
            let index = i + size.x as usize * j;
            assert!(
                (gpu[index] - reference[index]).abs() < tolerance,
                "mismatch at ({}, {}): {} vs {}",
                i,
                j,
                gpu[index],
                reference[index]
            );
        }
    }
}

fn reference_pressure(system: &CpuSystem, size: UVec2) -> Vec<f32> {
    cpu_solve(system, size, 1e-10, 10_000)
}

#[test]
fn simple_cg() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(50, 50);
    let scene = Scene::circle(size);
    let system = build_cpu_system(&scene, DT);
    let reference = reference_pressure(&system, size);

    let data = LinearSolverData::new(&ctx.device, size);
    upload(&ctx, &data, &system);

    let mut solver = ConjugateGradient::new(&ctx.device, &ctx.shaders, size);
    solver.init(&ctx.device, &data);

    let mut params = Parameters::new(1000, 1e-5);
    solver.normal_solve(&mut params);

    assert!(params.out_iterations > 0);
    check_pressure(size, &data.x.read(&ctx.device), &reference, 2e-3);
}

#[test]
fn diagonal_pcg() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(50, 50);
    let scene = Scene::circle(size);
    let system = build_cpu_system(&scene, DT);
    let reference = reference_pressure(&system, size);

    let data = LinearSolverData::new(&ctx.device, size);
    upload(&ctx, &data, &system);

    let mut preconditioner = Diagonal::new(&ctx.device, &ctx.shaders, size);
    let mut solver = ConjugateGradient::new(&ctx.device, &ctx.shaders, size);
    solver.init_preconditioned(&ctx.device, &data, &mut preconditioner);

    let mut params = Parameters::new(1000, 1e-5);
    solver.solve(&preconditioner, &mut params);

    check_pressure(size, &data.x.read(&ctx.device), &reference, 2e-3);
}

#[test]
fn incomplete_poisson_pcg() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(50, 50);
    let scene = Scene::circle(size);
    let system = build_cpu_system(&scene, DT);
    let reference = reference_pressure(&system, size);

    let data = LinearSolverData::new(&ctx.device, size);
    upload(&ctx, &data, &system);

    let mut preconditioner = IncompletePoisson::new(&ctx.device, &ctx.shaders, size);
    let mut solver = ConjugateGradient::new(&ctx.device, &ctx.shaders, size);
    solver.init_preconditioned(&ctx.device, &data, &mut preconditioner);

    let mut params = Parameters::new(1000, 1e-5);
    solver.solve(&preconditioner, &mut params);

    check_pressure(size, &data.x.read(&ctx.device), &reference, 2e-3);
}

#[test]
fn gauss_seidel_pcg() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(50, 50);
    let scene = Scene::circle(size);
    let system = build_cpu_system(&scene, DT);
    let reference = reference_pressure(&system, size);

    let data = LinearSolverData::new(&ctx.device, size);
    upload(&ctx, &data, &system);

    let mut preconditioner = GaussSeidel::new(&ctx.device, &ctx.shaders, size);
    preconditioner.set_w(1.0);
    preconditioner.set_preconditioner_iterations(8);
    let mut solver = ConjugateGradient::new(&ctx.device, &ctx.shaders, size);
    solver.init_preconditioned(&ctx.device, &data, &mut preconditioner);

    let mut params = Parameters::new(1000, 1e-5);
    solver.solve(&preconditioner, &mut params);

    check_pressure(size, &data.x.read(&ctx.device), &reference, 2e-3);
}

#[test]
fn gauss_seidel_standalone() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(50, 50);
    let scene = Scene::circle(size);
    let system = build_cpu_system(&scene, DT);
    let reference = reference_pressure(&system, size);

    let data = LinearSolverData::new(&ctx.device, size);
    upload(&ctx, &data, &system);

    let mut solver = GaussSeidel::new(&ctx.device, &ctx.shaders, size);
    solver.bind(
        &ctx.device,
        gyre::SystemSlice {
            diagonal: data.diagonal.raw(),
            lower: data.lower.raw(),
            b: data.b.raw(),
            x: data.x.raw(),
        },
    );

    let mut params = Parameters::new(2000, 1e-5);
    solver.solve(&mut params);

    check_pressure(size, &data.x.read(&ctx.device), &reference, 1e-2);
}

#[test]
fn multigrid_pcg() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(64, 64);
    let scene = Scene::circle(size);
    let system = build_cpu_system(&scene, DT);
    let reference = reference_pressure(&system, size);

    let solid_phi = Texture::new(&ctx.device, "solid phi", size, gyre::wgpu::TextureFormat::R32Float);
    let liquid_phi = Texture::new(&ctx.device, "liquid phi", size, gyre::wgpu::TextureFormat::R32Float);
    solid_phi.write(&ctx.device, &scene.solid_phi);
    liquid_phi.write(&ctx.device, &scene.liquid_phi);

    let data = LinearSolverData::new(&ctx.device, size);
    upload(&ctx, &data, &system);

    let mut preconditioner = Multigrid::new(&ctx.device, &ctx.shaders, size, DT);
    preconditioner.build_hierarchies_init(&ctx.device, &solid_phi, &liquid_phi);

    let mut solver = ConjugateGradient::new(&ctx.device, &ctx.shaders, size);
    solver.init_preconditioned(&ctx.device, &data, &mut preconditioner);

    preconditioner.build_hierarchies();

    let mut params = Parameters::new(1000, 1e-5);
    solver.solve(&preconditioner, &mut params);

    check_pressure(size, &data.x.read(&ctx.device), &reference, 2e-3);
}

#[test]
fn zero_rhs_cg() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(50, 50);
    let data = LinearSolverData::new(&ctx.device, size);

    let mut solver = ConjugateGradient::new(&ctx.device, &ctx.shaders, size);
    solver.init(&ctx.device, &data);

    let mut params = Parameters::new(1000, 1e-5);
    solver.normal_solve(&mut params);

    assert_eq!(params.out_iterations, 0);
    assert!(data.x.read(&ctx.device).iter().all(|&v| v == 0.0));
}

#[test]
fn zero_rhs_pcg() {
    let ctx = match common::TestContext::new() {
        Some(ctx) => ctx,
        None => return,
    };

    let size = UVec2::new(50, 50);
    let data = LinearSolverData::new(&ctx.device, size);

    let mut preconditioner = Diagonal::new(&ctx.device, &ctx.shaders, size);
    let mut solver = ConjugateGradient::new(&ctx.device, &ctx.shaders, size);
    solver.init_preconditioned(&ctx.device, &data, &mut preconditioner);

    let mut params = Parameters::new(1000, 1e-5);
    solver.solve(&preconditioner, &mut params);

    assert_eq!(params.out_iterations, 0);
    assert!(data.x.read(&ctx.device).iter().all(|&v| v == 0.0));
}
