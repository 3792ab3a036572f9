//! Equirectangular HDR panoramas
//!
//! Longitude runs along x from `atan2(z, x) = -pi` at the left edge, latitude
//! along y from straight up at the top row.

use crate::cubemap::{face_direction, texel_uv, CubeFace, Cubemap, EnvironmentSampler};
use glam::Vec3;
use prism_core::{PrismError, Result};
use rayon::prelude::*;
use std::f32::consts::PI;
use std::path::Path;

/// Linear RGB panorama
#[derive(Debug, Clone, PartialEq)]
pub struct EquirectImage {
    width: u32,
    height: u32,
    pixels: Vec<Vec3>,
}

impl EquirectImage {
    /// Decode a panorama from disk (`.hdr`, `.exr` or anything `image` reads)
    pub fn load(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .map_err(|e| PrismError::ImageError(format!("{}: {}", path.display(), e)))?;
        let image = Self::from_rgb32f(image.into_rgb32f())?;
        log::debug!(
            "loaded panorama {} ({}x{})",
            path.display(),
            image.width,
            image.height
        );
        Ok(image)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image =
            image::load_from_memory(bytes).map_err(|e| PrismError::ImageError(e.to_string()))?;
        Self::from_rgb32f(image.into_rgb32f())
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Vec3>) -> Result<Self> {
        if width == 0 || height == 0 || pixels.len() != width as usize * height as usize {
            return Err(PrismError::InvalidDimensions(format!(
                "{}x{} panorama with {} pixels",
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    fn from_rgb32f(image: image::Rgb32FImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        let pixels = image.pixels().map(|p| Vec3::from_array(p.0)).collect();
        Self::from_pixels(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Bilinear lookup along `direction`; wraps in longitude, clamps in latitude
    pub fn sample_bilinear(&self, direction: Vec3) -> Vec3 {
        let dir = direction.normalize();
        let u = 0.5 + dir.z.atan2(dir.x) / (2.0 * PI);
        let v = dir.y.clamp(-1.0, 1.0).acos() / PI;

        let px = u * self.width as f32 - 0.5;
        let py = (v * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);

        let x0 = px.floor();
        let y0 = py.floor();
        let fx = px - x0;
        let fy = py - y0;

        let w = self.width as i64;
        let wrap = |x: i64| x.rem_euclid(w) as u32;
        let x0i = wrap(x0 as i64);
        let x1i = wrap(x0 as i64 + 1);
        let y0i = y0 as u32;
        let y1i = (y0i + 1).min(self.height - 1);

        let top = self.pixel(x0i, y0i).lerp(self.pixel(x1i, y0i), fx);
        let bottom = self.pixel(x0i, y1i).lerp(self.pixel(x1i, y1i), fx);
        top.lerp(bottom, fy)
    }

    /// Resample into a cube with `face_size` texel faces
    pub fn to_cubemap(&self, face_size: u32) -> Result<Cubemap> {
        let mut texels = Cubemap::new(face_size, face_size)?.into_texels();
        let face_len = face_size as usize * face_size as usize;

        texels
            .par_chunks_mut(face_len)
            .zip(CubeFace::ALL.par_iter())
            .for_each(|(face_texels, &face)| {
                for (i, texel) in face_texels.iter_mut().enumerate() {
                    let x = i as u32 % face_size;
                    let y = i as u32 / face_size;
                    let dir = face_direction(face, texel_uv(x, y, face_size, face_size));
                    *texel = self.sample_bilinear(dir).extend(1.0).to_array();
                }
            });

        Cubemap::from_texels(face_size, face_size, texels)
    }
}

impl EnvironmentSampler for EquirectImage {
    fn sample(&self, direction: Vec3) -> Vec3 {
        self.sample_bilinear(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::hdr::HdrEncoder;
    use image::Rgb;

    /// Top half `sky`, bottom half `ground`
    fn horizon(width: u32, height: u32, sky: Vec3, ground: Vec3) -> EquirectImage {
        let pixels = (0..width * height)
            .map(|i| if i / width < height / 2 { sky } else { ground })
            .collect();
        EquirectImage::from_pixels(width, height, pixels).unwrap()
    }

    #[test]
    fn uniform_panorama_gives_uniform_cube() {
        let color = Vec3::new(0.5, 1.0, 2.0);
        let image = EquirectImage::from_pixels(8, 4, vec![color; 32]).unwrap();
        let cube = image.to_cubemap(4).unwrap();
        for texel in cube.texels() {
            assert!(Vec3::new(texel[0], texel[1], texel[2]).abs_diff_eq(color, 1e-6));
        }
    }

    #[test]
    fn poles_land_on_vertical_faces() {
        let sky = Vec3::new(1.0, 0.0, 0.0);
        let ground = Vec3::new(0.0, 0.0, 1.0);
        let image = horizon(16, 8, sky, ground);
        let cube = image.to_cubemap(4).unwrap();

        let up = cube.texel(CubeFace::PositiveY, 1, 1);
        let down = cube.texel(CubeFace::NegativeY, 2, 2);
        assert!((up[0] - 1.0).abs() < 1e-6 && up[2].abs() < 1e-6);
        assert!((down[2] - 1.0).abs() < 1e-6 && down[0].abs() < 1e-6);
    }

    #[test]
    fn longitude_wraps_without_seam() {
        let mut pixels = vec![Vec3::ZERO; 8 * 4];
        // Only the two edge columns are lit
        for y in 0..4 {
            pixels[y * 8] = Vec3::ONE;
            pixels[y * 8 + 7] = Vec3::ONE;
        }
        let image = EquirectImage::from_pixels(8, 4, pixels).unwrap();
        // atan2(z, x) = pi: direction -X sits on the wrap line
        assert!(image.sample(Vec3::NEG_X).abs_diff_eq(Vec3::ONE, 1e-5));
    }

    #[test]
    fn decodes_radiance_hdr() {
        let data = vec![Rgb([2.0f32, 1.0, 0.5]); 4 * 2];
        let mut bytes = Vec::new();
        HdrEncoder::new(&mut bytes).encode(&data, 4, 2).unwrap();

        let image = EquirectImage::from_bytes(&bytes).unwrap();
        assert_eq!((image.width(), image.height()), (4, 2));
        assert!(image.pixel(3, 1).abs_diff_eq(Vec3::new(2.0, 1.0, 0.5), 1e-2));
    }

    #[test]
    fn rejects_garbage_and_bad_sizes() {
        assert!(matches!(
            EquirectImage::from_bytes(b"definitely not an image"),
            Err(PrismError::ImageError(_))
        ));
        assert!(EquirectImage::from_pixels(2, 2, vec![Vec3::ZERO; 3]).is_err());
        assert!(EquirectImage::from_pixels(0, 0, vec![]).is_err());
    }
}
