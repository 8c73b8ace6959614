use std::collections::HashMap;

use super::device::Device;

// All entry points need to have this name.
// (could make customizable, but forcing this has perks as well)
pub const SHADER_ENTRY_POINT_NAME: &str = "main";

/// Every kernel the crate dispatches, embedded at compile time.
const SHADER_SOURCES: &[(&str, &str)] = &[
    ("reduce_sum", include_str!("../../shaders/reduce_sum.wgsl")),
    ("reduce_max", include_str!("../../shaders/reduce_max.wgsl")),
    ("reduce_sum_j", include_str!("../../shaders/reduce_sum_j.wgsl")),
    ("multiply", include_str!("../../shaders/multiply.wgsl")),
    ("prefix_scan", include_str!("../../shaders/prefix_scan.wgsl")),
    ("prefix_scan_add", include_str!("../../shaders/prefix_scan_add.wgsl")),
    ("prefix_scan_params", include_str!("../../shaders/prefix_scan_params.wgsl")),
    ("cg_init", include_str!("../../shaders/cg_init.wgsl")),
    ("cg_apply_matrix", include_str!("../../shaders/cg_apply_matrix.wgsl")),
    ("cg_update_xr", include_str!("../../shaders/cg_update_xr.wgsl")),
    ("cg_update_p", include_str!("../../shaders/cg_update_p.wgsl")),
    ("residual", include_str!("../../shaders/residual.wgsl")),
    ("diagonal", include_str!("../../shaders/diagonal.wgsl")),
    ("incomplete_poisson", include_str!("../../shaders/incomplete_poisson.wgsl")),
    ("gauss_seidel", include_str!("../../shaders/gauss_seidel.wgsl")),
    ("transfer_prolongate", include_str!("../../shaders/transfer_prolongate.wgsl")),
    ("transfer_restrict", include_str!("../../shaders/transfer_restrict.wgsl")),
    ("phi_downsample", include_str!("../../shaders/phi_downsample.wgsl")),
    ("build_matrix", include_str!("../../shaders/build_matrix.wgsl")),
    ("build_div", include_str!("../../shaders/build_div.wgsl")),
    ("project", include_str!("../../shaders/project.wgsl")),
    ("redistance", include_str!("../../shaders/redistance.wgsl")),
    ("extrapolate_phi", include_str!("../../shaders/extrapolate_phi.wgsl")),
    ("extrapolate_velocity", include_str!("../../shaders/extrapolate_velocity.wgsl")),
    ("constrain_velocity", include_str!("../../shaders/constrain_velocity.wgsl")),
    ("advect_velocity", include_str!("../../shaders/advect_velocity.wgsl")),
    ("advect_field", include_str!("../../shaders/advect_field.wgsl")),
    ("advect_particles", include_str!("../../shaders/advect_particles.wgsl")),
    ("particle_count", include_str!("../../shaders/particle_count.wgsl")),
    ("particle_bucket", include_str!("../../shaders/particle_bucket.wgsl")),
    ("particle_spawn", include_str!("../../shaders/particle_spawn.wgsl")),
    ("particle_phi", include_str!("../../shaders/particle_phi.wgsl")),
    ("particle_to_grid", include_str!("../../shaders/particle_to_grid.wgsl")),
    ("particle_from_grid", include_str!("../../shaders/particle_from_grid.wgsl")),
    ("splat_float", include_str!("../../shaders/splat_float.wgsl")),
    ("splat_velocity", include_str!("../../shaders/splat_velocity.wgsl")),
    ("splat_dye", include_str!("../../shaders/splat_dye.wgsl")),
    ("splat_count", include_str!("../../shaders/splat_count.wgsl")),
    ("rigidbody_phi", include_str!("../../shaders/rigidbody_phi.wgsl")),
    ("rigidbody_velocity", include_str!("../../shaders/rigidbody_velocity.wgsl")),
    ("rigidbody_force", include_str!("../../shaders/rigidbody_force.wgsl")),
];

/// Owns one compiled module per kernel. Modules are created eagerly so that a
/// broken shader fails at startup, not mid-simulation.
pub struct ShaderLibrary {
    modules: HashMap<&'static str, wgpu::ShaderModule>,
}

impl ShaderLibrary {
    pub fn new(device: &Device) -> ShaderLibrary {
        let mut modules = HashMap::with_capacity(SHADER_SOURCES.len());
        for (name, source) in SHADER_SOURCES {
            let module = device.device().create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(source)),
            });
            modules.insert(*name, module);
        }
        ShaderLibrary { modules }
    }

    pub fn get(&self, name: &str) -> &wgpu::ShaderModule {
        self.modules
            .get(name)
            .unwrap_or_else(|| panic!("unknown shader {:?}", name))
    }
}
