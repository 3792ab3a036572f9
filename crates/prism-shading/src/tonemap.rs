//! Tone mapping and gamma

use glam::{Vec3, Vec4};

/// Display gamma, also used as the sRGB decode approximation
pub const GAMMA: f32 = 2.2;

/// Approximate sRGB to linear decode
pub fn srgb_to_linear(color: Vec3) -> Vec3 {
    color.powf(GAMMA)
}

/// Reinhard operator: `c / (c + 1)`
pub fn reinhard(color: Vec3) -> Vec3 {
    color / (color + Vec3::ONE)
}

pub fn gamma_encode(color: Vec3) -> Vec3 {
    color.powf(1.0 / GAMMA)
}

/// Linear radiance to display color
pub fn tonemap(color: Vec3) -> Vec3 {
    gamma_encode(reinhard(color))
}

/// Quantize a display color for 8-bit output
pub fn to_rgba8(color: Vec4) -> [u8; 4] {
    let c = color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0 + Vec4::splat(0.5);
    [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
}
