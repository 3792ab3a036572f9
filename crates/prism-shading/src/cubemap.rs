//! Cube addressing and a CPU-side cubemap
//!
//! Face order and per-face axis permutations follow the wgpu/Vulkan cube
//! convention. The same mapping lives in `irradiance.wgsl`; the two must not
//! drift apart or baked cubes show seams along the face edges.

use glam::{Vec2, Vec3};
use prism_core::{PrismError, Result};

/// Reference-up threshold for `tangent_frame`
pub const VERTICAL_EPSILON: f32 = 0.001;

/// Cube face in layer order
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

impl CubeFace {
    pub const COUNT: u32 = 6;
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    /// Principal axis the face center looks along
    pub fn axis(self) -> Vec3 {
        match self {
            Self::PositiveX => Vec3::X,
            Self::NegativeX => Vec3::NEG_X,
            Self::PositiveY => Vec3::Y,
            Self::NegativeY => Vec3::NEG_Y,
            Self::PositiveZ => Vec3::Z,
            Self::NegativeZ => Vec3::NEG_Z,
        }
    }
}

impl TryFrom<u32> for CubeFace {
    type Error = PrismError;

    fn try_from(value: u32) -> Result<Self> {
        CubeFace::ALL
            .get(value as usize)
            .copied()
            .ok_or(PrismError::InvalidCubeFace(value))
    }
}

/// Texel center to `[-1, 1]` face coordinates, Y flipped so +v is up
pub fn texel_uv(x: u32, y: u32, width: u32, height: u32) -> Vec2 {
    let u = (x as f32 + 0.5) / width as f32 * 2.0 - 1.0;
    let v = (y as f32 + 0.5) / height as f32 * 2.0 - 1.0;
    Vec2::new(u, -v)
}

/// Unit direction through `uv` on `face`
pub fn face_direction(face: CubeFace, uv: Vec2) -> Vec3 {
    let dir = match face {
        CubeFace::PositiveX => Vec3::new(1.0, uv.y, -uv.x),
        CubeFace::NegativeX => Vec3::new(-1.0, uv.y, uv.x),
        CubeFace::PositiveY => Vec3::new(uv.x, 1.0, -uv.y),
        CubeFace::NegativeY => Vec3::new(uv.x, -1.0, uv.y),
        CubeFace::PositiveZ => Vec3::new(uv.x, uv.y, 1.0),
        CubeFace::NegativeZ => Vec3::new(-uv.x, uv.y, -1.0),
    };
    dir.normalize()
}

/// Inverse of `face_direction`: pick the major axis, project onto its face
pub fn direction_to_face_uv(dir: Vec3) -> (CubeFace, Vec2) {
    let abs = dir.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        if dir.x > 0.0 {
            (CubeFace::PositiveX, Vec2::new(-dir.z, dir.y) / abs.x)
        } else {
            (CubeFace::NegativeX, Vec2::new(dir.z, dir.y) / abs.x)
        }
    } else if abs.y >= abs.z {
        if dir.y > 0.0 {
            (CubeFace::PositiveY, Vec2::new(dir.x, -dir.z) / abs.y)
        } else {
            (CubeFace::NegativeY, Vec2::new(dir.x, dir.z) / abs.y)
        }
    } else if dir.z > 0.0 {
        (CubeFace::PositiveZ, Vec2::new(dir.x, dir.y) / abs.z)
    } else {
        (CubeFace::NegativeZ, Vec2::new(-dir.x, dir.y) / abs.z)
    }
}

/// Orthonormal `(tangent, bitangent)` around `normal`
pub fn tangent_frame(normal: Vec3) -> (Vec3, Vec3) {
    let up = if normal.y.abs() > 1.0 - VERTICAL_EPSILON {
        Vec3::X
    } else {
        Vec3::Y
    };
    let tangent = up.cross(normal).normalize();
    let bitangent = normal.cross(tangent).normalize();
    (tangent, bitangent)
}

/// Anything the convolver can read radiance from
pub trait EnvironmentSampler {
    fn sample(&self, direction: Vec3) -> Vec3;
}

/// Environment returning the same radiance in every direction
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConstantEnvironment(pub Vec3);

impl EnvironmentSampler for ConstantEnvironment {
    fn sample(&self, _direction: Vec3) -> Vec3 {
        self.0
    }
}

/// Six RGBA32F faces, face-major then row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Cubemap {
    width: u32,
    height: u32,
    texels: Vec<[f32; 4]>,
}

impl Cubemap {
    /// Black cube of the given face size
    pub fn new(width: u32, height: u32) -> Result<Self> {
        check_dimensions(width, height)?;
        let len = texel_count(width, height);
        Ok(Self {
            width,
            height,
            texels: vec![[0.0, 0.0, 0.0, 1.0]; len],
        })
    }

    /// Cube where every texel holds `color`
    pub fn uniform(size: u32, color: [f32; 4]) -> Result<Self> {
        check_dimensions(size, size)?;
        Ok(Self {
            width: size,
            height: size,
            texels: vec![color; texel_count(size, size)],
        })
    }

    pub fn from_texels(width: u32, height: u32, texels: Vec<[f32; 4]>) -> Result<Self> {
        check_dimensions(width, height)?;
        let expected = texel_count(width, height);
        if texels.len() != expected {
            return Err(PrismError::InvalidDimensions(format!(
                "{}x{} cube needs {} texels, got {}",
                width,
                height,
                expected,
                texels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    pub fn into_texels(self) -> Vec<[f32; 4]> {
        self.texels
    }

    pub fn face(&self, face: CubeFace) -> &[[f32; 4]] {
        let face_len = self.width as usize * self.height as usize;
        let start = face.index() as usize * face_len;
        &self.texels[start..start + face_len]
    }

    pub fn texel(&self, face: CubeFace, x: u32, y: u32) -> [f32; 4] {
        self.texels[self.texel_index(face, x, y)]
    }

    pub fn set_texel(&mut self, face: CubeFace, x: u32, y: u32, value: [f32; 4]) {
        let index = self.texel_index(face, x, y);
        self.texels[index] = value;
    }

    /// Nearest-texel lookup along `direction`
    pub fn sample_nearest(&self, direction: Vec3) -> [f32; 4] {
        let (face, uv) = direction_to_face_uv(direction);
        // Undo the Y flip of `texel_uv`
        let s = (uv.x + 1.0) * 0.5;
        let t = (1.0 - uv.y) * 0.5;
        let x = ((s * self.width as f32) as u32).min(self.width - 1);
        let y = ((t * self.height as f32) as u32).min(self.height - 1);
        self.texel(face, x, y)
    }

    fn texel_index(&self, face: CubeFace, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (face.index() as usize * self.height as usize + y as usize) * self.width as usize
            + x as usize
    }
}

impl EnvironmentSampler for Cubemap {
    fn sample(&self, direction: Vec3) -> Vec3 {
        let [r, g, b, _] = self.sample_nearest(direction);
        Vec3::new(r, g, b)
    }
}

/// Cube faces are square and non-empty
fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || width != height {
        return Err(PrismError::InvalidDimensions(format!(
            "cube faces must be square and at least 1x1, got {}x{}",
            width, height
        )));
    }
    Ok(())
}

fn texel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize * CubeFace::COUNT as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_centers_hit_principal_axes() {
        for face in CubeFace::ALL {
            let dir = face_direction(face, Vec2::ZERO);
            assert!((dir.length() - 1.0).abs() < 1e-6);
            assert!(dir.abs_diff_eq(face.axis(), 1e-6), "{:?} -> {:?}", face, dir);
        }
    }

    #[test]
    fn face_centers_pairwise_non_parallel() {
        let dirs: Vec<Vec3> = CubeFace::ALL
            .iter()
            .map(|&f| face_direction(f, Vec2::ZERO))
            .collect();
        for i in 0..dirs.len() {
            for j in (i + 1)..dirs.len() {
                assert!(dirs[i].cross(dirs[j]).length() > 1e-3 || dirs[i].dot(dirs[j]) < 0.0);
                assert!(!dirs[i].abs_diff_eq(dirs[j], 1e-3));
            }
        }
    }

    #[test]
    fn top_row_of_side_faces_looks_up() {
        // Y is flipped: row 0 is the top of the face
        for face in [
            CubeFace::PositiveX,
            CubeFace::NegativeX,
            CubeFace::PositiveZ,
            CubeFace::NegativeZ,
        ] {
            let dir = face_direction(face, texel_uv(4, 0, 8, 8));
            assert!(dir.y > 0.5, "{:?} row 0 points {:?}", face, dir);
        }
    }

    #[test]
    fn inverse_mapping_recovers_face_and_uv() {
        let samples = [
            (CubeFace::PositiveX, Vec2::new(0.3, -0.7)),
            (CubeFace::NegativeY, Vec2::new(-0.9, 0.1)),
            (CubeFace::PositiveZ, Vec2::new(0.5, 0.5)),
            (CubeFace::NegativeZ, Vec2::new(-0.2, 0.8)),
        ];
        for (face, uv) in samples {
            let (back_face, back_uv) = direction_to_face_uv(face_direction(face, uv));
            assert_eq!(back_face, face);
            assert!(back_uv.abs_diff_eq(uv, 1e-5));
        }
    }

    #[test]
    fn adjacent_faces_agree_on_shared_edge() {
        // Right edge of +Z and left edge of +X meet along the same directions
        let on_pz = face_direction(CubeFace::PositiveZ, Vec2::new(1.0, 0.25));
        let on_px = face_direction(CubeFace::PositiveX, Vec2::new(-1.0, 0.25));
        assert!(on_pz.abs_diff_eq(on_px, 1e-6));
    }

    #[test]
    fn tangent_frame_is_orthonormal() {
        for normal in [
            Vec3::X,
            Vec3::new(0.3, 0.4, -0.866).normalize(),
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::new(0.0005, 0.9999, 0.0).normalize(),
        ] {
            let (t, b) = tangent_frame(normal);
            assert!((t.length() - 1.0).abs() < 1e-5);
            assert!((b.length() - 1.0).abs() < 1e-5);
            assert!(t.dot(normal).abs() < 1e-5);
            assert!(b.dot(normal).abs() < 1e-5);
            assert!(t.dot(b).abs() < 1e-5);
        }
    }

    #[test]
    fn nearest_sample_reads_written_texel() {
        let mut cube = Cubemap::new(4, 4).unwrap();
        cube.set_texel(CubeFace::NegativeZ, 1, 2, [5.0, 6.0, 7.0, 1.0]);
        let dir = face_direction(CubeFace::NegativeZ, texel_uv(1, 2, 4, 4));
        assert_eq!(cube.sample(dir), Vec3::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(Cubemap::new(0, 4).is_err());
        assert!(matches!(
            Cubemap::new(4, 2),
            Err(PrismError::InvalidDimensions(_))
        ));
        assert!(Cubemap::from_texels(4, 2, vec![[0.0; 4]; 48]).is_err());
        assert!(Cubemap::from_texels(2, 2, vec![[0.0; 4]; 5]).is_err());
        assert!(CubeFace::try_from(6).is_err());
    }
}
