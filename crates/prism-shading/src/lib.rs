//! Prism Shading - GPU data contract and shading math for a forward PBR pass
//!
//! This crate defines the byte layouts shared between the host and the WGSL
//! shaders, the instanced Cook-Torrance render pipeline, and the diffuse
//! irradiance bake that turns an HDR environment into a cube map. The
//! shading and convolution math also runs on the CPU so results can be
//! checked without a device.

pub mod brdf;
mod context;
pub mod cubemap;
mod hdr;
pub mod instance;
pub mod irradiance;
pub mod layout;
pub mod light;
mod pipeline;
pub mod scene;
pub mod tonemap;
pub mod vertex;

pub use brdf::{shade_and_encode, shade_fragment, BrdfTerms, MaterialSample, Surface};
pub use context::{HeadlessContext, RenderError};
pub use cubemap::{ConstantEnvironment, CubeFace, Cubemap, EnvironmentSampler};
pub use hdr::EquirectImage;
pub use instance::InstanceRaw;
pub use irradiance::{EnvironmentTexture, IrradiancePipeline, IrradianceSettings, IrradianceTexture};
pub use layout::{
    AlphaMode, CameraUniform, LightKind, LightUniform, MaterialUniform, NormalUniform,
    TextureSlot, TransformUniform,
};
pub use light::{Light, LightSample};
pub use pipeline::{
    create_scene_bind_group_layout, MaterialTexture, ShadingPipeline, DEPTH_FORMAT,
};
pub use scene::{GpuScene, SceneBindings, SceneData};
pub use vertex::{MeshVertex, TexCoord, VertexOutput};
