//! Diffuse irradiance convolution
//!
//! Two implementations of the same kernel: `convolve` runs on the CPU with
//! rayon, `IrradiancePipeline` dispatches `irradiance.wgsl`. Each output
//! texel integrates the environment over the hemisphere around the texel's
//! cube direction with a midpoint rule in (theta, phi).

use crate::cubemap::{face_direction, tangent_frame, texel_uv, CubeFace, Cubemap, EnvironmentSampler};
use glam::Vec3;
use half::f16;
use prism_core::{BakeConfig, PrismError, Result, DEFAULT_THETA_SAMPLES, MAX_THETA_SAMPLES};
use rayon::prelude::*;
use std::collections::HashMap;
use std::f32::consts::PI;

/// Compute workgroup edge; must match `@workgroup_size` in `irradiance.wgsl`
pub const WORKGROUP_SIZE: u32 = 8;

/// Storage format of baked irradiance cubes
pub const IRRADIANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Upload format of environment cubes
pub const ENVIRONMENT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Grey used for the irradiance cube before anything is baked
pub const PLACEHOLDER_IRRADIANCE: f32 = 0.03;

/// Quadrature resolution
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IrradianceSettings {
    /// Polar samples over `[0, pi/2)`, in `1..=MAX_THETA_SAMPLES`
    theta_samples: u32,
}

impl IrradianceSettings {
    pub fn new(theta_samples: u32) -> Result<Self> {
        if !(1..=MAX_THETA_SAMPLES).contains(&theta_samples) {
            return Err(PrismError::ConfigError(format!(
                "irradiance needs between 1 and {} polar samples, got {}",
                MAX_THETA_SAMPLES, theta_samples
            )));
        }
        Ok(Self { theta_samples })
    }

    pub fn from_config(config: &BakeConfig) -> Result<Self> {
        Self::new(config.theta_samples)
    }

    pub fn theta_samples(&self) -> u32 {
        self.theta_samples
    }

    /// Azimuthal samples over `[0, 2pi)`
    pub fn phi_samples(&self) -> u32 {
        self.theta_samples * 2
    }
}

impl Default for IrradianceSettings {
    fn default() -> Self {
        Self {
            theta_samples: DEFAULT_THETA_SAMPLES,
        }
    }
}

/// Workgroups needed to cover every texel of every face
pub fn dispatch_size(width: u32, height: u32) -> [u32; 3] {
    [
        width.div_ceil(WORKGROUP_SIZE),
        height.div_ceil(WORKGROUP_SIZE),
        CubeFace::COUNT,
    ]
}

/// One kernel invocation. `invocation` is `(x, y, face)`; anything outside
/// the destination returns `None`, as the ceiling-rounded grid produces
/// such invocations along the edges.
pub fn convolve_texel<E: EnvironmentSampler + ?Sized>(
    env: &E,
    invocation: [u32; 3],
    width: u32,
    height: u32,
    settings: &IrradianceSettings,
) -> Option<[f32; 4]> {
    let [x, y, face] = invocation;
    if x >= width || y >= height {
        return None;
    }
    let face = CubeFace::try_from(face).ok()?;
    Some(irradiance_at(env, face, x, y, width, height, settings))
}

/// Bake a whole `width` x `height` irradiance cube from `env`
pub fn convolve<E: EnvironmentSampler + Sync + ?Sized>(
    env: &E,
    width: u32,
    height: u32,
    settings: &IrradianceSettings,
) -> Result<Cubemap> {
    let mut texels = Cubemap::new(width, height)?.into_texels();
    let face_len = width as usize * height as usize;

    log::debug!(
        "convolving {}x{} irradiance cube, {}x{} samples per texel",
        width,
        height,
        settings.theta_samples,
        settings.phi_samples()
    );

    texels
        .par_chunks_mut(face_len)
        .zip(CubeFace::ALL.par_iter())
        .for_each(|(face_texels, &face)| {
            for (i, texel) in face_texels.iter_mut().enumerate() {
                let x = (i as u32) % width;
                let y = (i as u32) / width;
                *texel = irradiance_at(env, face, x, y, width, height, settings);
            }
        });

    Cubemap::from_texels(width, height, texels)
}

fn irradiance_at<E: EnvironmentSampler + ?Sized>(
    env: &E,
    face: CubeFace,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    settings: &IrradianceSettings,
) -> [f32; 4] {
    let normal = face_direction(face, texel_uv(x, y, width, height));
    let (tangent, bitangent) = tangent_frame(normal);

    let theta_samples = settings.theta_samples;
    let phi_samples = settings.phi_samples();
    let d_theta = 0.5 * PI / theta_samples as f32;
    let d_phi = 2.0 * PI / phi_samples as f32;

    let mut irradiance = Vec3::ZERO;
    for i in 0..theta_samples {
        let theta = (i as f32 + 0.5) * d_theta;
        let (sin_theta, cos_theta) = theta.sin_cos();
        for j in 0..phi_samples {
            let phi = (j as f32 + 0.5) * d_phi;
            let (sin_phi, cos_phi) = phi.sin_cos();
            let sample = sin_theta * cos_phi * tangent
                + sin_theta * sin_phi * bitangent
                + cos_theta * normal;
            irradiance += env.sample(sample) * cos_theta * sin_theta * d_theta * d_phi;
        }
    }
    irradiance /= PI;

    [irradiance.x, irradiance.y, irradiance.z, 1.0]
}

/// Environment cube uploaded for the compute kernel
pub struct EnvironmentTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl EnvironmentTexture {
    pub fn from_cubemap(device: &wgpu::Device, queue: &wgpu::Queue, cube: &Cubemap) -> Self {
        let (width, height) = (cube.width(), cube.height());
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: CubeFace::COUNT,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Environment Cube Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ENVIRONMENT_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(cube.texels()),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 16),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Environment Cube View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        // Rgba32Float is not filterable without an optional feature
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Environment Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }
}

/// Baked (or placeholder) irradiance cube
pub struct IrradianceTexture {
    pub texture: wgpu::Texture,
    /// Cube view for sampling as an IBL input
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl IrradianceTexture {
    /// Empty destination the compute kernel can write into
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = create_irradiance_texture(device, "Irradiance Cube Texture", width, height);
        Self::wrap(texture, width, height)
    }

    /// 1x1 cube of uniform dim grey, bound before any bake has run. It can
    /// later be baked into like any other destination.
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let texture = create_irradiance_texture(device, "Irradiance Placeholder", 1, 1);

        let texels = placeholder_texels();
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(8),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: CubeFace::COUNT,
            },
        );

        Self::wrap(texture, 1, 1)
    }

    /// Per-layer view the kernel stores into
    pub fn storage_view(&self) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Irradiance Storage View"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            base_array_layer: 0,
            array_layer_count: Some(CubeFace::COUNT),
            ..Default::default()
        })
    }

    fn wrap(texture: wgpu::Texture, width: u32, height: u32) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Irradiance Cube View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        Self {
            texture,
            view,
            width,
            height,
        }
    }
}

/// Usage shared by baked and placeholder cubes
const IRRADIANCE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::STORAGE_BINDING
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

fn create_irradiance_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: CubeFace::COUNT,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: IRRADIANCE_FORMAT,
        usage: IRRADIANCE_USAGE,
        view_formats: &[],
    })
}

fn placeholder_texels() -> Vec<[f16; 4]> {
    let grey = f16::from_f32(PLACEHOLDER_IRRADIANCE);
    vec![[grey, grey, grey, f16::ONE]; CubeFace::COUNT as usize]
}

/// Compute pipeline over `irradiance.wgsl`
pub struct IrradiancePipeline {
    pub pipeline: wgpu::ComputePipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub settings: IrradianceSettings,
}

impl IrradiancePipeline {
    pub fn new(device: &wgpu::Device, settings: IrradianceSettings) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Irradiance Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("irradiance.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Irradiance Bind Group Layout"),
            entries: &[
                // Environment cube
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                // Environment sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
                // Destination faces
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: IRRADIANCE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Irradiance Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let constants = HashMap::from([(
            "THETA_SAMPLES".to_string(),
            settings.theta_samples as f64,
        )]);

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Irradiance Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("irradiance_convolution"),
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: &constants,
                ..Default::default()
            },
            cache: None,
        });

        log::debug!(
            "created irradiance pipeline ({} polar samples)",
            settings.theta_samples
        );

        Self {
            pipeline,
            bind_group_layout,
            settings,
        }
    }

    /// Bake into a new destination the size of the environment
    pub fn bake(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        env: &EnvironmentTexture,
    ) -> IrradianceTexture {
        let destination = IrradianceTexture::new(device, env.width, env.height);
        self.bake_into(device, queue, env, &destination);
        destination
    }

    /// Bake into an existing destination; the grid is sized from it
    pub fn bake_into(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        env: &EnvironmentTexture,
        destination: &IrradianceTexture,
    ) {
        let storage_view = destination.storage_view();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Irradiance Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&env.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&env.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&storage_view),
                },
            ],
        });

        let [groups_x, groups_y, groups_z] = dispatch_size(destination.width, destination.height);
        log::debug!(
            "dispatching irradiance kernel: {}x{}x{} workgroups",
            groups_x,
            groups_y,
            groups_z
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Irradiance Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Irradiance Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, groups_z);
        }
        queue.submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubemap::ConstantEnvironment;

    /// Radiance that only comes from straight up
    struct SkyLight;

    impl EnvironmentSampler for SkyLight {
        fn sample(&self, direction: Vec3) -> Vec3 {
            if direction.y > 0.0 {
                Vec3::ONE
            } else {
                Vec3::ZERO
            }
        }
    }

    #[test]
    fn constant_environment_reproduces_its_radiance() {
        let color = Vec3::new(0.2, 1.5, 4.0);
        let env = ConstantEnvironment(color);
        let cube = convolve(&env, 3, 3, &IrradianceSettings::default()).unwrap();

        for texel in cube.texels() {
            assert!((texel[0] - color.x).abs() < 1e-2 * color.x.max(1.0));
            assert!((texel[1] - color.y).abs() < 1e-2 * color.y.max(1.0));
            assert!((texel[2] - color.z).abs() < 1e-2 * color.z.max(1.0));
            assert_eq!(texel[3], 1.0);
        }
    }

    #[test]
    fn coarse_quadrature_still_converges() {
        let env = ConstantEnvironment(Vec3::ONE);
        let settings = IrradianceSettings::new(8).unwrap();
        let texel = convolve_texel(&env, [0, 0, 2], 1, 1, &settings).unwrap();
        assert!((texel[0] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn out_of_range_invocations_are_discarded() {
        let env = ConstantEnvironment(Vec3::ONE);
        let settings = IrradianceSettings::new(4).unwrap();
        assert!(convolve_texel(&env, [5, 0, 0], 5, 5, &settings).is_none());
        assert!(convolve_texel(&env, [0, 5, 0], 5, 5, &settings).is_none());
        assert!(convolve_texel(&env, [0, 0, 6], 5, 5, &settings).is_none());
        assert!(convolve_texel(&env, [4, 4, 5], 5, 5, &settings).is_some());
    }

    #[test]
    fn upward_face_sees_more_sky_than_downward() {
        let settings = IrradianceSettings::new(8).unwrap();
        // 1x1 faces: each texel sits exactly on its face axis
        let cube = convolve(&SkyLight, 1, 1, &settings).unwrap();
        let up = cube.texel(CubeFace::PositiveY, 0, 0)[0];
        let down = cube.texel(CubeFace::NegativeY, 0, 0)[0];
        let side = cube.texel(CubeFace::PositiveX, 0, 0)[0];
        assert!(up > side && side > down, "up {} side {} down {}", up, side, down);
        assert!(down.abs() < 1e-6);
    }

    #[test]
    fn matches_single_texel_kernel() {
        let settings = IrradianceSettings::new(6).unwrap();
        let cube = convolve(&SkyLight, 4, 4, &settings).unwrap();
        let texel = convolve_texel(&SkyLight, [3, 1, 4], 4, 4, &settings).unwrap();
        assert_eq!(cube.texel(CubeFace::PositiveZ, 3, 1), texel);
    }

    #[test]
    fn convolution_is_idempotent() {
        let settings = IrradianceSettings::new(6).unwrap();
        let a = convolve(&SkyLight, 5, 5, &settings).unwrap();
        let b = convolve(&SkyLight, 5, 5, &settings).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dispatch_rounds_up() {
        assert_eq!(dispatch_size(8, 8), [1, 1, 6]);
        assert_eq!(dispatch_size(9, 17), [2, 3, 6]);
        assert_eq!(dispatch_size(1, 1), [1, 1, 6]);
    }

    #[test]
    fn sample_count_is_bounded() {
        assert!(IrradianceSettings::new(0).is_err());
        assert!(IrradianceSettings::new(3_000_000_000).is_err());
        assert!(IrradianceSettings::new(MAX_THETA_SAMPLES + 1).is_err());

        let widest = IrradianceSettings::new(MAX_THETA_SAMPLES).unwrap();
        assert_eq!(widest.phi_samples(), 2 * MAX_THETA_SAMPLES);
        assert_eq!(IrradianceSettings::default().phi_samples(), 64);
    }

    #[test]
    fn placeholder_is_dim_grey() {
        let texels = placeholder_texels();
        assert_eq!(texels.len(), 6);
        assert!((texels[0][0].to_f32() - 0.03).abs() < 1e-4);
        assert_eq!(texels[5][3].to_f32(), 1.0);
    }

    #[test]
    fn placeholder_can_be_baked_into() {
        assert!(IRRADIANCE_USAGE.contains(wgpu::TextureUsages::STORAGE_BINDING));
        assert!(IRRADIANCE_USAGE.contains(wgpu::TextureUsages::COPY_DST));
        assert!(IRRADIANCE_USAGE.contains(wgpu::TextureUsages::TEXTURE_BINDING));
    }
}
