//! Prism CLI - Irradiance baking and shading diagnostics

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{bake, shade};
use prism_core::PrismConfig;
use prism_shading::Light;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prism")]
#[command(about = "PBR shading core and diffuse irradiance baker", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file to load instead of prism.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bake a diffuse irradiance cube from an equirectangular HDR panorama
    Bake {
        /// Path to the panorama (.hdr)
        panorama: PathBuf,

        /// Output directory for the face PNGs
        #[arg(short, long, default_value = "irradiance")]
        output: PathBuf,

        /// Cube face size in texels (default: half the panorama height)
        #[arg(long)]
        face_size: Option<u32>,

        /// Polar samples per texel; azimuth uses twice as many
        #[arg(long)]
        theta_samples: Option<u32>,

        /// Run the convolution on the GPU
        #[arg(long)]
        gpu: bool,

        /// Also write the resampled environment faces
        #[arg(long)]
        environment: bool,
    },

    /// Shade one surface point and print the per-light BRDF terms
    Shade {
        /// Base color (comma-separated r,g,b, linear)
        #[arg(long, value_parser = parse_vec3, default_value = "1,1,1")]
        albedo: [f32; 3],

        /// Metallic factor
        #[arg(long, default_value = "0")]
        metallic: f32,

        /// Roughness factor
        #[arg(long, default_value = "0.5")]
        roughness: f32,

        /// Surface position (comma-separated x,y,z)
        #[arg(long, value_parser = parse_vec3, default_value = "0,0,0")]
        position: [f32; 3],

        /// Surface normal (comma-separated x,y,z)
        #[arg(long, value_parser = parse_vec3, default_value = "0,0,1")]
        normal: [f32; 3],

        /// Camera position (comma-separated x,y,z)
        #[arg(long, value_parser = parse_vec3, default_value = "0,0,5")]
        camera: [f32; 3],

        /// Light, e.g. "directional:0,0,-1", "point:0,2,2@10" or
        /// "spot:0,2,2:0,-1,-1@5". Repeatable.
        #[arg(long = "light", value_parser = shade::parse_light)]
        lights: Vec<Light>,
    },
}

fn parse_vec3(s: &str) -> Result<[f32; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected 3 comma-separated values, got {}", parts.len()));
    }
    let x: f32 = parts[0].trim().parse().map_err(|e| format!("invalid x: {}", e))?;
    let y: f32 = parts[1].trim().parse().map_err(|e| format!("invalid y: {}", e))?;
    let z: f32 = parts[2].trim().parse().map_err(|e| format!("invalid z: {}", e))?;
    Ok([x, y, z])
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PrismConfig::load_from_file(path),
        None => PrismConfig::load(),
    }
    .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log.level.as_str()),
    )
    .init();
    log::debug!("resolved config: {:?}", config);

    match cli.command {
        Commands::Bake {
            panorama,
            output,
            face_size,
            theta_samples,
            gpu,
            environment,
        } => bake::run(
            bake::BakeArgs {
                panorama,
                output,
                face_size,
                theta_samples,
                gpu,
                environment,
            },
            &config,
        ),
        Commands::Shade {
            albedo,
            metallic,
            roughness,
            position,
            normal,
            camera,
            lights,
        } => shade::run(shade::ShadeArgs {
            albedo,
            metallic,
            roughness,
            position,
            normal,
            camera,
            lights,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_vec3_accepts_spaces() {
        assert_eq!(parse_vec3("1, -2.5 ,3").unwrap(), [1.0, -2.5, 3.0]);
    }

    #[test]
    fn parse_vec3_rejects_wrong_arity() {
        assert!(parse_vec3("1,2").is_err());
        assert!(parse_vec3("1,2,x").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn bake_flags_parse() {
        let cli = Cli::try_parse_from([
            "prism",
            "bake",
            "sky.hdr",
            "--face-size",
            "16",
            "--gpu",
        ])
        .unwrap();
        match cli.command {
            Commands::Bake {
                face_size, gpu, theta_samples, ..
            } => {
                assert_eq!(face_size, Some(16));
                assert!(gpu);
                assert_eq!(theta_samples, None);
            }
            _ => panic!("expected bake"),
        }
    }
}
