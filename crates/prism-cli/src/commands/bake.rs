//! Panorama-to-irradiance bake command

use anyhow::{Context, Result};
use glam::Vec3;
use prism_core::PrismConfig;
use prism_shading::irradiance::convolve;
use prism_shading::tonemap::{to_rgba8, tonemap};
use prism_shading::{CubeFace, Cubemap, EquirectImage, HeadlessContext, IrradianceSettings};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub struct BakeArgs {
    pub panorama: PathBuf,
    pub output: PathBuf,
    pub face_size: Option<u32>,
    pub theta_samples: Option<u32>,
    pub gpu: bool,
    pub environment: bool,
}

pub fn run(args: BakeArgs, config: &PrismConfig) -> Result<()> {
    // Command-line flags override the config file
    let mut bake = config.bake.clone();
    if let Some(size) = args.face_size {
        bake.face_size = Some(size);
    }
    if let Some(samples) = args.theta_samples {
        bake.theta_samples = samples;
    }
    bake.use_gpu |= args.gpu;
    let settings = IrradianceSettings::from_config(&bake).context("Invalid bake settings")?;

    let panorama = EquirectImage::load(&args.panorama)
        .with_context(|| format!("Failed to load panorama {}", args.panorama.display()))?;
    println!(
        "Loaded panorama: {} ({}x{})",
        args.panorama.display(),
        panorama.width(),
        panorama.height()
    );

    let face_size = bake
        .face_size
        .unwrap_or_else(|| (panorama.height() / 2).max(1));
    let environment = panorama
        .to_cubemap(face_size)
        .context("Failed to resample panorama into a cube")?;

    let start = Instant::now();
    let irradiance = if bake.use_gpu {
        let ctx = pollster::block_on(HeadlessContext::new())
            .context("Failed to create headless GPU context")?;
        pollster::block_on(ctx.bake_irradiance(&environment, settings))
            .context("GPU irradiance bake failed")?
    } else {
        convolve(&environment, face_size, face_size, &settings)
            .context("CPU irradiance bake failed")?
    };
    println!(
        "Baked {}x{} irradiance on the {} ({}x{} samples) in {:.2?}",
        face_size,
        face_size,
        if bake.use_gpu { "GPU" } else { "CPU" },
        settings.theta_samples(),
        settings.phi_samples(),
        start.elapsed()
    );

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    write_faces(&irradiance, &args.output, "")?;
    if args.environment {
        write_faces(&environment, &args.output, "env_")?;
    }

    Ok(())
}

/// File stem for a face, in `+X -X +Y -Y +Z -Z` order
pub fn face_name(face: CubeFace) -> &'static str {
    match face {
        CubeFace::PositiveX => "px",
        CubeFace::NegativeX => "nx",
        CubeFace::PositiveY => "py",
        CubeFace::NegativeY => "ny",
        CubeFace::PositiveZ => "pz",
        CubeFace::NegativeZ => "nz",
    }
}

/// Tone-mapped 8-bit preview of one face
pub fn face_image(cube: &Cubemap, face: CubeFace) -> image::RgbaImage {
    let mut image = image::RgbaImage::new(cube.width(), cube.height());
    for (texel, pixel) in cube.face(face).iter().zip(image.pixels_mut()) {
        let radiance = Vec3::new(texel[0], texel[1], texel[2]);
        *pixel = image::Rgba(to_rgba8(tonemap(radiance).extend(1.0)));
    }
    image
}

fn write_faces(cube: &Cubemap, dir: &Path, prefix: &str) -> Result<()> {
    for face in CubeFace::ALL {
        let path = dir.join(format!("{}{}.png", prefix, face_name(face)));
        face_image(cube, face)
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::hdr::HdrEncoder;
    use image::Rgb;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("prism_bake_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn face_image_tone_maps() {
        let cube = Cubemap::uniform(2, [1.0, 0.0, 1.0, 1.0]).unwrap();
        let image = face_image(&cube, CubeFace::NegativeZ);
        assert_eq!(image.dimensions(), (2, 2));
        // reinhard(1) = 0.5, 0.5^(1/2.2) ~ 0.73
        let pixel = image.get_pixel(1, 1);
        assert_eq!(pixel[1], 0);
        assert_eq!(pixel[3], 255);
        assert!((185..=188).contains(&pixel[0]));
    }

    #[test]
    fn face_names_are_unique() {
        let mut names: Vec<_> = CubeFace::ALL.iter().map(|&f| face_name(f)).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn cpu_bake_writes_six_faces() {
        let dir = temp_dir();
        let panorama = dir.join("sky.hdr");
        let data = vec![Rgb([1.0f32, 1.0, 1.0]); 8 * 4];
        let mut bytes = Vec::new();
        HdrEncoder::new(&mut bytes).encode(&data, 8, 4).unwrap();
        std::fs::write(&panorama, bytes).unwrap();

        let output = dir.join("out");
        let args = BakeArgs {
            panorama,
            output: output.clone(),
            face_size: None,
            theta_samples: Some(4),
            gpu: false,
            environment: true,
        };
        run(args, &PrismConfig::default()).unwrap();

        for face in CubeFace::ALL {
            let baked = image::open(output.join(format!("{}.png", face_name(face)))).unwrap();
            // Half the panorama height
            assert_eq!((baked.width(), baked.height()), (2, 2));
            assert!(output.join(format!("env_{}.png", face_name(face))).exists());
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn out_of_range_samples_are_rejected() {
        for samples in [0, 3_000_000_000] {
            let args = BakeArgs {
                panorama: PathBuf::from("does-not-matter.hdr"),
                output: PathBuf::from("unused"),
                face_size: None,
                theta_samples: Some(samples),
                gpu: false,
                environment: false,
            };
            assert!(run(args, &PrismConfig::default()).is_err());
        }
    }
}
