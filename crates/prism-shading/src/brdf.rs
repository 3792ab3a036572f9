//! Cook-Torrance metallic/roughness evaluator
//!
//! CPU mirror of `fs_main` in `shader.wgsl`. GGX distribution, Smith
//! geometry with the direct-lighting `k`, Schlick Fresnel and a Lambertian
//! diffuse lobe weighted by `(1 - F)(1 - metallic)`.

use crate::layout::{CameraUniform, LightUniform, MaterialUniform};
use crate::light::{sample_light, LightSample};
use crate::scene::SceneBindings;
use crate::tonemap::{srgb_to_linear, tonemap};
use glam::{Vec3, Vec4, Vec4Swizzles};
use prism_core::Result;
use std::f32::consts::PI;

/// Floor for the specular denominator
pub const BRDF_EPSILON: f32 = 1e-4;

/// Roughness is clamped to `[MIN_ROUGHNESS, 1]`
pub const MIN_ROUGHNESS: f32 = 0.04;

/// Normal-incidence reflectance of dielectrics
pub const DIELECTRIC_F0: f32 = 0.04;

/// Stand-in for indirect light, scaled by albedo and occlusion
pub const AMBIENT_STRENGTH: f32 = 0.001;

/// GGX / Trowbridge-Reitz normal distribution, `alpha = roughness^2`
pub fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * denom * denom)
}

/// Schlick-GGX visibility for one direction
pub fn geometry_schlick_ggx(n_dot_x: f32, k: f32) -> f32 {
    n_dot_x / (n_dot_x * (1.0 - k) + k)
}

/// Smith shadow-masking with the direct-lighting remap `k = (r + 1)^2 / 8`
pub fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = r * r / 8.0;
    geometry_schlick_ggx(n_dot_v, k) * geometry_schlick_ggx(n_dot_l, k)
}

pub fn fresnel_schlick(h_dot_v: f32, f0: Vec3) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - h_dot_v.max(0.0)).powi(5)
}

/// Material inputs after texture decode and factor application
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaterialSample {
    /// Linear base color
    pub albedo: Vec3,
    pub alpha: f32,
    pub metallic: f32,
    /// Already clamped
    pub roughness: f32,
    pub occlusion: f32,
}

impl MaterialSample {
    /// Build from sampled texels. `base_color` is sRGB-encoded; the other
    /// texels are linear. Metallic is read from blue, roughness from green,
    /// occlusion from red.
    pub fn from_texels(
        material: &MaterialUniform,
        base_color: Vec4,
        metallic_roughness: Vec4,
        occlusion: Vec4,
    ) -> Self {
        let factor = Vec4::from_array(material.base_color_factor);
        let albedo = srgb_to_linear(base_color.xyz()) * factor.xyz();
        let metallic = metallic_roughness.z * material.metallic_factor;
        let roughness = (metallic_roughness.y * material.roughness_factor).clamp(MIN_ROUGHNESS, 1.0);
        let occlusion = 1.0 + material.occlusion_strength * (occlusion.x - 1.0);

        Self {
            albedo,
            alpha: base_color.w * factor.w,
            metallic,
            roughness,
            occlusion,
        }
    }

    /// Material with only factors, as if every texture were white
    pub fn from_factors(material: &MaterialUniform) -> Self {
        Self::from_texels(material, Vec4::ONE, Vec4::ONE, Vec4::ONE)
    }

    /// Base reflectance: 0.04 for dielectrics, the albedo for metals
    pub fn f0(&self) -> Vec3 {
        Vec3::splat(DIELECTRIC_F0).lerp(self.albedo, self.metallic)
    }
}

/// Per-light intermediate terms, exposed for diagnostics
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BrdfTerms {
    pub n_dot_l: f32,
    pub n_dot_v: f32,
    pub distribution: f32,
    pub geometry: f32,
    pub fresnel: Vec3,
    pub kd: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    /// Outgoing radiance this light adds
    pub radiance: Vec3,
}

/// Evaluate one light. `None` when the surface faces away from it
/// (`n.l <= 0`), so the light adds nothing.
pub fn evaluate_light(
    normal: Vec3,
    view: Vec3,
    material: &MaterialSample,
    light: &LightUniform,
    sample: &LightSample,
) -> Option<BrdfTerms> {
    let l = sample.direction;
    let n_dot_l = normal.dot(l).max(0.0);
    if n_dot_l <= 0.0 {
        return None;
    }

    let h = (view + l).normalize();
    let n_dot_v = normal.dot(view).max(0.0);
    let n_dot_h = normal.dot(h).max(0.0);

    let distribution = distribution_ggx(n_dot_h, material.roughness);
    let geometry = geometry_smith(n_dot_v, n_dot_l, material.roughness);
    let fresnel = fresnel_schlick(h.dot(view), material.f0());

    let specular = distribution * geometry * fresnel / (4.0 * n_dot_v * n_dot_l).max(BRDF_EPSILON);
    let kd = (Vec3::ONE - fresnel) * (1.0 - material.metallic);
    let diffuse = kd * material.albedo / PI;

    let radiance = (diffuse + specular) * light.color() * light.intensity * sample.attenuation * n_dot_l;

    Some(BrdfTerms {
        n_dot_l,
        n_dot_v,
        distribution,
        geometry,
        fresnel,
        kd,
        diffuse,
        specular,
        radiance,
    })
}

/// Interpolated surface point as the fragment stage sees it
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Surface {
    pub world_position: Vec3,
    /// Interpolated world normal; renormalized here
    pub normal: Vec3,
}

/// Constant ambient term
pub fn ambient(material: &MaterialSample) -> Vec3 {
    AMBIENT_STRENGTH * material.albedo * material.occlusion
}

/// Pre-tonemap radiance leaving `surface` toward the camera
pub fn shade_fragment(
    surface: &Surface,
    material: &MaterialSample,
    camera: &CameraUniform,
    scene: &SceneBindings,
) -> Result<Vec3> {
    let n = surface.normal.normalize();
    let v = (camera.view_position() - surface.world_position).normalize();

    let mut color = Vec3::ZERO;
    for (i, light) in scene.lights.iter().enumerate() {
        let transform = scene.light_transform(i as u32)?;
        let sample = sample_light(light, transform, surface.world_position)?;
        if let Some(terms) = evaluate_light(n, v, material, light, &sample) {
            color += terms.radiance;
        }
    }

    Ok(color + ambient(material))
}

/// `shade_fragment` followed by tone mapping; alpha is the base color alpha
pub fn shade_and_encode(
    surface: &Surface,
    material: &MaterialSample,
    camera: &CameraUniform,
    scene: &SceneBindings,
) -> Result<Vec4> {
    let color = shade_fragment(surface, material, camera, scene)?;
    Ok(tonemap(color).extend(material.alpha))
}
