//! Host/device data layouts
//!
//! Every struct here is mirrored field-for-field by a struct in
//! `shader.wgsl`; padding fields exist to satisfy WGSL alignment rules for
//! uniform and storage arrays.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3, Vec4Swizzles};
use prism_core::{PrismError, Result};

/// Bind group 0: material uniform + five texture/sampler pairs
pub const MATERIAL_GROUP: u32 = 0;
/// Bind group 1: camera uniform
pub const CAMERA_GROUP: u32 = 1;
/// Bind group 2: read-only scene storage arrays
pub const SCENE_GROUP: u32 = 2;

/// Scene group bindings
pub const TRANSFORMS_BINDING: u32 = 0;
pub const NORMALS_BINDING: u32 = 1;
pub const LIGHTS_BINDING: u32 = 2;
pub const LIGHT_TRANSFORM_INDEX_BINDING: u32 = 3;

/// Model-to-world matrix, column-major
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TransformUniform(pub [[f32; 4]; 4]);

impl TransformUniform {
    pub fn new(transform: Mat4) -> Self {
        Self(transform.to_cols_array_2d())
    }

    pub fn identity() -> Self {
        Self(Mat4::IDENTITY.to_cols_array_2d())
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.0)
    }

    /// World position: xyz of column 3
    pub fn translation(&self) -> Vec3 {
        Vec3::from_slice(&self.0[3][..3])
    }

    /// Forward direction: column 2 negated
    pub fn forward(&self) -> Vec3 {
        -Vec3::from_slice(&self.0[2][..3])
    }
}

impl Default for TransformUniform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Inverse-transpose of the model matrix. Only the upper-left 3x3 is read.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct NormalUniform(pub [[f32; 4]; 4]);

impl NormalUniform {
    pub fn new(transform: Mat4) -> Self {
        let normal_matrix = transform.inverse().transpose();
        Self(normal_matrix.to_cols_array_2d())
    }

    pub fn identity() -> Self {
        Self(Mat4::IDENTITY.to_cols_array_2d())
    }

    pub fn to_mat3(&self) -> Mat3 {
        Mat3::from_mat4(Mat4::from_cols_array_2d(&self.0))
    }
}

impl Default for NormalUniform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Light kind tag as stored in `LightUniform::kind`
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

impl TryFrom<u32> for LightKind {
    type Error = PrismError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Directional),
            1 => Ok(Self::Point),
            2 => Ok(Self::Spot),
            other => Err(PrismError::InvalidLightKind(other)),
        }
    }
}

/// One entry of the light table. Position and direction are not stored;
/// they come from the transform slot this light is linked to.
#[repr(C, align(16))]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub color: [f32; 3],
    pub cutoff: f32,
    pub intensity: f32,
    pub kind: u32,
    pub _padding: [u32; 2],
}

impl LightUniform {
    pub fn new(kind: LightKind, color: Vec3, intensity: f32, cutoff: f32) -> Self {
        Self {
            color: color.to_array(),
            cutoff,
            intensity,
            kind: kind as u32,
            _padding: [0; 2],
        }
    }

    pub fn kind(&self) -> Result<LightKind> {
        LightKind::try_from(self.kind)
    }

    pub fn color(&self) -> Vec3 {
        Vec3::from_array(self.color)
    }
}

/// glTF alpha mode, carried through to the device but not evaluated
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque = 0,
    Mask = 1,
    Blend = 2,
}

impl TryFrom<u32> for AlphaMode {
    type Error = PrismError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Opaque),
            1 => Ok(Self::Mask),
            2 => Ok(Self::Blend),
            other => Err(PrismError::InvalidAlphaMode(other)),
        }
    }
}

/// Texture slots of the material bind group, in binding order
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextureSlot {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
}

impl TextureSlot {
    pub const COUNT: u32 = 5;
    pub const ALL: [TextureSlot; 5] = [
        TextureSlot::BaseColor,
        TextureSlot::MetallicRoughness,
        TextureSlot::Normal,
        TextureSlot::Occlusion,
        TextureSlot::Emissive,
    ];

    /// Binding of the texture view; the sampler follows at `+ 1`
    pub fn texture_binding(self) -> u32 {
        self as u32 * 2 + 1
    }

    pub fn sampler_binding(self) -> u32 {
        self as u32 * 2 + 2
    }
}

/// Material uniform buffer data (bind group 0, binding 0)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 3],
    pub _padding0: u32,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub occlusion_strength: f32,
    pub normal_scale: f32,
    pub alpha_cutoff: f32,
    pub alpha_mode: u32,
    pub double_sided: u32,
    pub _padding1: u32,
    /// UV set for base color, metallic-roughness, normal, occlusion
    pub texcoord_sets: [u32; 4],
    pub emissive_texcoord_set: u32,
    pub _padding2: [u32; 3],
}

impl MaterialUniform {
    /// Plain metallic-roughness material with untextured factors
    pub fn from_pbr(base_color: [f32; 4], metallic: f32, roughness: f32) -> Self {
        Self {
            base_color_factor: base_color,
            metallic_factor: metallic,
            roughness_factor: roughness,
            ..Self::default()
        }
    }

    pub fn alpha_mode(&self) -> Result<AlphaMode> {
        AlphaMode::try_from(self.alpha_mode)
    }
}

impl Default for MaterialUniform {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            emissive_factor: [0.0, 0.0, 0.0],
            _padding0: 0,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            occlusion_strength: 1.0,
            normal_scale: 1.0,
            alpha_cutoff: 0.5,
            alpha_mode: AlphaMode::Opaque as u32,
            double_sided: 0,
            _padding1: 0,
            texcoord_sets: [0; 4],
            emissive_texcoord_set: 0,
            _padding2: [0; 3],
        }
    }
}

/// Camera uniform buffer data (bind group 1)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_projection: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    pub inv_projection: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_projection: Mat4::IDENTITY.to_cols_array_2d(),
            inv_view: Mat4::IDENTITY.to_cols_array_2d(),
            inv_projection: Mat4::IDENTITY.to_cols_array_2d(),
        }
    }

    pub fn from_view(position: Vec3, view: Mat4, projection: Mat4) -> Self {
        let mut camera = Self::new();
        camera.update(position, view, projection);
        camera
    }

    pub fn update(&mut self, position: Vec3, view: Mat4, projection: Mat4) {
        self.view_position = position.extend(1.0).to_array();
        self.view_projection = (projection * view).to_cols_array_2d();
        self.inv_view = view.inverse().to_cols_array_2d();
        self.inv_projection = projection.inverse().to_cols_array_2d();
    }

    pub fn view_position(&self) -> Vec3 {
        glam::Vec4::from_array(self.view_position).xyz()
    }

    pub fn view_projection(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_projection)
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}
