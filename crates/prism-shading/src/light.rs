//! Light table records and the per-kind light model
//!
//! A light is split in two on the device: a `LightUniform` (kind, color,
//! intensity, cutoff) and a transform slot it links to. Position and
//! direction are always derived from that transform.

use crate::layout::{LightKind, LightUniform, TransformUniform};
use glam::{Mat4, Vec3};
use prism_core::Result;

/// Floor for the squared distance in the inverse-square falloff
pub const ATTENUATION_EPSILON: f32 = 1e-4;

/// Host-side light description
#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    Directional {
        direction: Vec3,
        color: Vec3,
        intensity: f32,
    },
    Point {
        position: Vec3,
        color: Vec3,
        intensity: f32,
    },
    Spot {
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        cutoff: f32,
    },
}

impl Light {
    pub fn kind(&self) -> LightKind {
        match self {
            Self::Directional { .. } => LightKind::Directional,
            Self::Point { .. } => LightKind::Point,
            Self::Spot { .. } => LightKind::Spot,
        }
    }

    pub fn to_light_uniform(&self) -> LightUniform {
        match self {
            Self::Directional {
                color, intensity, ..
            }
            | Self::Point {
                color, intensity, ..
            } => LightUniform::new(self.kind(), *color, *intensity, 0.0),
            Self::Spot {
                color,
                intensity,
                cutoff,
                ..
            } => LightUniform::new(self.kind(), *color, *intensity, *cutoff),
        }
    }

    /// Transform whose column 3 is the light position and whose column 2 is
    /// the negated light direction
    pub fn to_transform(&self) -> Mat4 {
        match self {
            Self::Directional { direction, .. } => look_dir(Vec3::ZERO, *direction),
            Self::Point { position, .. } => Mat4::from_translation(*position),
            Self::Spot {
                position,
                direction,
                ..
            } => look_dir(*position, *direction),
        }
    }

    pub fn to_parts(&self) -> (LightUniform, TransformUniform) {
        (
            self.to_light_uniform(),
            TransformUniform::new(self.to_transform()),
        )
    }
}

fn look_dir(position: Vec3, direction: Vec3) -> Mat4 {
    let dir = direction.normalize();
    let up = if dir.abs_diff_eq(Vec3::Y, 1e-3) || dir.abs_diff_eq(-Vec3::Y, 1e-3) {
        Vec3::Z
    } else {
        Vec3::Y
    };

    let right = dir.cross(up).normalize();
    let up = right.cross(dir).normalize();

    Mat4::from_cols(
        right.extend(0.0),
        up.extend(0.0),
        (-dir).extend(0.0),
        position.extend(1.0),
    )
}

/// Uniform per-kind result of the light model
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LightSample {
    /// Unit vector from the surface toward the light
    pub direction: Vec3,
    pub attenuation: f32,
    /// Distance to the light; zero for directional lights
    pub distance: f32,
}

/// Derive direction and attenuation for one light at `world_position`.
///
/// Spot lights currently fall off exactly like point lights: `cutoff` is
/// carried in the record but does not shape a cone.
pub fn sample_light(
    light: &LightUniform,
    transform: &TransformUniform,
    world_position: Vec3,
) -> Result<LightSample> {
    let sample = match light.kind()? {
        LightKind::Directional => LightSample {
            // The light shines along its forward axis, so the surface sees it
            // from the opposite side.
            direction: (-transform.forward()).normalize(),
            attenuation: 1.0,
            distance: 0.0,
        },
        LightKind::Point | LightKind::Spot => {
            let to_light = transform.translation() - world_position;
            let distance_squared = to_light.length_squared();
            let distance = distance_squared.sqrt();
            LightSample {
                direction: to_light.normalize_or_zero(),
                attenuation: 1.0 / distance_squared.max(ATTENUATION_EPSILON),
                distance,
            }
        }
    };
    Ok(sample)
}
