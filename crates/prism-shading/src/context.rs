//! Headless wgpu context for compute bakes and readback

use crate::cubemap::{CubeFace, Cubemap};
use crate::irradiance::{EnvironmentTexture, IrradiancePipeline, IrradianceSettings};
use half::f16;
use prism_core::PrismError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to get adapter")]
    AdapterNotFound,
    #[error("Failed to create device: {0}")]
    DeviceCreation(String),
    #[error("Failed to read texture back: {0}")]
    BufferReadFailed(String),
    #[error(transparent)]
    Prism(#[from] PrismError),
}

/// Bytes per texel of an `Rgba16Float` texture
const RGBA16F_TEXEL_BYTES: u32 = 8;

/// Device and queue without a window surface
pub struct HeadlessContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl HeadlessContext {
    pub async fn new() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterNotFound)?;

        log::debug!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Prism Headless Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceCreation(e.to_string()))?;

        Ok(Self { device, queue })
    }

    /// Upload `environment`, run the irradiance kernel, read the result back
    pub async fn bake_irradiance(
        &self,
        environment: &Cubemap,
        settings: IrradianceSettings,
    ) -> Result<Cubemap, RenderError> {
        let pipeline = IrradiancePipeline::new(&self.device, settings);
        let env = EnvironmentTexture::from_cubemap(&self.device, &self.queue, environment);
        let irradiance = pipeline.bake(&self.device, &self.queue, &env);
        self.read_cubemap(&irradiance.texture, irradiance.width, irradiance.height)
            .await
    }

    /// Copy a six-layer `Rgba16Float` texture back into a `Cubemap`
    pub async fn read_cubemap(
        &self,
        texture: &wgpu::Texture,
        width: u32,
        height: u32,
    ) -> Result<Cubemap, RenderError> {
        let unpadded_bytes_per_row = width * RGBA16F_TEXEL_BYTES;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let buffer_size = (padded_bytes_per_row * height * CubeFace::COUNT) as u64;
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cubemap Readback Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Cubemap Readback Encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: CubeFace::COUNT,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);

        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| RenderError::BufferReadFailed(e.to_string()))?
            .map_err(|e| RenderError::BufferReadFailed(e.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let texels = unpack_rows(&data, width, height * CubeFace::COUNT, padded_bytes_per_row);
        drop(data);
        staging_buffer.unmap();

        Ok(Cubemap::from_texels(width, height, texels)?)
    }
}

/// Strip row padding and widen f16 texels
fn unpack_rows(data: &[u8], width: u32, rows: u32, padded_bytes_per_row: u32) -> Vec<[f32; 4]> {
    let unpadded = (width * RGBA16F_TEXEL_BYTES) as usize;
    let mut texels = Vec::with_capacity((width * rows) as usize);
    for row in 0..rows {
        let start = (row * padded_bytes_per_row) as usize;
        let halves: Vec<f16> = bytemuck::pod_collect_to_vec(&data[start..start + unpadded]);
        texels.extend(halves.chunks_exact(4).map(|t| {
            [t[0].to_f32(), t[1].to_f32(), t[2].to_f32(), t[3].to_f32()]
        }));
    }
    texels
}
