//! Single-fragment shading diagnostics

use anyhow::{bail, Context, Result};
use glam::{Mat4, Vec3};
use prism_shading::brdf::evaluate_light;
use prism_shading::light::sample_light;
use prism_shading::tonemap::to_rgba8;
use prism_shading::{
    shade_and_encode, shade_fragment, CameraUniform, Light, MaterialSample, MaterialUniform,
    SceneData, Surface,
};

pub struct ShadeArgs {
    pub albedo: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub camera: [f32; 3],
    pub lights: Vec<Light>,
}

/// Cone cutoff given to spot lights parsed from the command line
const SPOT_CUTOFF_DEGREES: f32 = 30.0;

/// Parse `directional:DIR`, `point:POS` or `spot:POS:DIR`, each with an
/// optional `@INTENSITY` suffix. Lights are white.
pub fn parse_light(s: &str) -> Result<Light, String> {
    let (body, intensity) = match s.split_once('@') {
        Some((body, intensity)) => (
            body,
            intensity
                .trim()
                .parse::<f32>()
                .map_err(|e| format!("invalid intensity: {}", e))?,
        ),
        None => (s, 1.0),
    };

    let mut parts = body.split(':');
    let kind = parts.next().unwrap_or_default().trim();
    let vectors = parts
        .map(|p| crate::parse_vec3(p).map(Vec3::from_array))
        .collect::<Result<Vec<_>, _>>()?;
    let color = Vec3::ONE;

    let light = match (kind, vectors.as_slice()) {
        ("directional", [direction]) => Light::Directional {
            direction: *direction,
            color,
            intensity,
        },
        ("point", [position]) => Light::Point {
            position: *position,
            color,
            intensity,
        },
        ("spot", [position, direction]) => Light::Spot {
            position: *position,
            direction: *direction,
            color,
            intensity,
            cutoff: SPOT_CUTOFF_DEGREES.to_radians().cos(),
        },
        _ => {
            return Err(format!(
                "expected directional:DIR, point:POS or spot:POS:DIR, got '{}'",
                s
            ))
        }
    };

    match &light {
        Light::Directional { direction, .. } | Light::Spot { direction, .. }
            if direction.length_squared() == 0.0 =>
        {
            Err("light direction must be non-zero".to_string())
        }
        _ => Ok(light),
    }
}

pub fn run(args: ShadeArgs) -> Result<()> {
    let normal = Vec3::from_array(args.normal);
    if normal.length_squared() == 0.0 {
        bail!("surface normal must be non-zero");
    }
    let surface = Surface {
        world_position: Vec3::from_array(args.position),
        normal,
    };

    let uniform = MaterialUniform::from_pbr(
        [args.albedo[0], args.albedo[1], args.albedo[2], 1.0],
        args.metallic,
        args.roughness,
    );
    let material = MaterialSample::from_factors(&uniform);

    let camera = camera_at(Vec3::from_array(args.camera), surface.world_position);

    let lights = if args.lights.is_empty() {
        println!("No --light given; using a white directional light along -normal");
        vec![Light::Directional {
            direction: -normal,
            color: Vec3::ONE,
            intensity: 1.0,
        }]
    } else {
        args.lights
    };

    let mut scene = SceneData::new();
    for light in &lights {
        scene.add_light(light);
    }
    scene.validate().context("Invalid light table")?;
    let bindings = scene.bindings();

    println!(
        "Material: albedo {} metallic {:.3} roughness {:.3} (f0 {})",
        material.albedo,
        material.metallic,
        material.roughness,
        material.f0()
    );

    let n = surface.normal.normalize();
    let v = (camera.view_position() - surface.world_position).normalize();
    for (i, light) in bindings.lights.iter().enumerate() {
        let transform = bindings.light_transform(i as u32)?;
        let sample = sample_light(light, transform, surface.world_position)?;
        println!(
            "Light {} ({:?}): l {} attenuation {:.4}",
            i,
            light.kind()?,
            sample.direction,
            sample.attenuation
        );
        match evaluate_light(n, v, &material, light, &sample) {
            Some(terms) => {
                println!(
                    "  n.l {:.4}  n.v {:.4}  D {:.4}  G {:.4}",
                    terms.n_dot_l, terms.n_dot_v, terms.distribution, terms.geometry
                );
                println!("  F {}  kd {}", terms.fresnel, terms.kd);
                println!("  diffuse {}  specular {}", terms.diffuse, terms.specular);
                println!("  radiance {}", terms.radiance);
            }
            None => println!("  facing away, skipped"),
        }
    }

    let radiance = shade_fragment(&surface, &material, &camera, &bindings)?;
    let encoded = shade_and_encode(&surface, &material, &camera, &bindings)?;
    let [r, g, b, a] = to_rgba8(encoded);
    println!("Radiance: {}", radiance);
    println!("Encoded:  {} (#{:02x}{:02x}{:02x}, alpha {})", encoded, r, g, b, a);

    Ok(())
}

/// Perspective camera at `eye` looking at `target`
fn camera_at(eye: Vec3, target: Vec3) -> CameraUniform {
    let forward = (target - eye).normalize_or_zero();
    let up = if forward.y.abs() > 0.999 { Vec3::Z } else { Vec3::Y };
    let view = Mat4::look_at_rh(eye, target, up);
    let projection = Mat4::perspective_rh(45f32.to_radians(), 1.0, 0.1, 100.0);
    CameraUniform::from_view(eye, view, projection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_light_kind() {
        let light = parse_light("directional:0,0,-1").unwrap();
        assert!(matches!(light, Light::Directional { intensity, .. } if intensity == 1.0));

        let light = parse_light("point:0,2,2@10").unwrap();
        match light {
            Light::Point {
                position,
                intensity,
                ..
            } => {
                assert_eq!(position, Vec3::new(0.0, 2.0, 2.0));
                assert_eq!(intensity, 10.0);
            }
            other => panic!("expected point light, got {:?}", other),
        }

        let light = parse_light("spot:0,2,2:0,-1,-1@5").unwrap();
        assert!(matches!(light, Light::Spot { intensity, .. } if intensity == 5.0));
    }

    #[test]
    fn rejects_malformed_lights() {
        assert!(parse_light("area:0,0,0").is_err());
        assert!(parse_light("point").is_err());
        assert!(parse_light("spot:0,0,0").is_err());
        assert!(parse_light("point:0,0,0@bright").is_err());
        assert!(parse_light("directional:0,0,0").is_err());
    }

    #[test]
    fn run_with_default_light() {
        let args = ShadeArgs {
            albedo: [0.8, 0.2, 0.2],
            metallic: 0.0,
            roughness: 0.5,
            position: [0.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            camera: [0.0, 0.0, 5.0],
            lights: Vec::new(),
        };
        run(args).unwrap();
    }

    #[test]
    fn run_rejects_zero_normal() {
        let args = ShadeArgs {
            albedo: [1.0; 3],
            metallic: 0.0,
            roughness: 0.5,
            position: [0.0; 3],
            normal: [0.0; 3],
            camera: [0.0, 0.0, 5.0],
            lights: Vec::new(),
        };
        assert!(run(args).is_err());
    }
}
