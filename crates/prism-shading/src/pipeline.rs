//! Lit render pipeline setup
//!
//! The color target must be a non-sRGB format: `fs_main` already applies
//! tone mapping and gamma.

use crate::layout::{
    TextureSlot, CAMERA_GROUP, LIGHTS_BINDING, LIGHT_TRANSFORM_INDEX_BINDING, MATERIAL_GROUP,
    NORMALS_BINDING, SCENE_GROUP, TRANSFORMS_BINDING,
};
use crate::scene::GpuScene;
use crate::vertex::{vertex_buffer_layouts, INSTANCE_BUFFER_SLOT};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// View and sampler bound to one material texture slot
pub struct MaterialTexture<'a> {
    pub view: &'a wgpu::TextureView,
    pub sampler: &'a wgpu::Sampler,
}

/// The lit pipeline and its three bind group layouts
pub struct ShadingPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub material_bind_group_layout: wgpu::BindGroupLayout,
    pub camera_bind_group_layout: wgpu::BindGroupLayout,
    pub scene_bind_group_layout: wgpu::BindGroupLayout,
}

impl ShadingPipeline {
    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat) -> Self {
        if color_format.is_srgb() {
            log::warn!(
                "{:?} is an sRGB target; output will be gamma encoded twice",
                color_format
            );
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Prism Shading Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let material_bind_group_layout = create_material_bind_group_layout(device);
        let camera_bind_group_layout = create_camera_bind_group_layout(device);
        let scene_bind_group_layout = create_scene_bind_group_layout(device);

        let mut bind_group_layouts = [&material_bind_group_layout; 3];
        bind_group_layouts[MATERIAL_GROUP as usize] = &material_bind_group_layout;
        bind_group_layouts[CAMERA_GROUP as usize] = &camera_bind_group_layout;
        bind_group_layouts[SCENE_GROUP as usize] = &scene_bind_group_layout;
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Prism Shading Pipeline Layout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let buffers = vertex_buffer_layouts();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Prism Shading Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        log::debug!("created shading pipeline for {:?}", color_format);

        Self {
            pipeline,
            material_bind_group_layout,
            camera_bind_group_layout,
            scene_bind_group_layout,
        }
    }

    /// Bind a material uniform buffer and its five textures, in
    /// `TextureSlot` order
    pub fn create_material_bind_group(
        &self,
        device: &wgpu::Device,
        uniform_buffer: &wgpu::Buffer,
        textures: &[MaterialTexture; TextureSlot::COUNT as usize],
    ) -> wgpu::BindGroup {
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }];
        for (slot, texture) in TextureSlot::ALL.iter().zip(textures) {
            entries.push(wgpu::BindGroupEntry {
                binding: slot.texture_binding(),
                resource: wgpu::BindingResource::TextureView(texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: slot.sampler_binding(),
                resource: wgpu::BindingResource::Sampler(texture.sampler),
            });
        }

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &self.material_bind_group_layout,
            entries: &entries,
        })
    }

    /// Set the pipeline, its three bind groups and the scene's instance
    /// buffer. Mesh and UV buffers (slots 0..=6) are left to the caller.
    pub fn bind(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        material: &wgpu::BindGroup,
        camera: &wgpu::BindGroup,
        scene: &GpuScene,
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(MATERIAL_GROUP, material, &[]);
        pass.set_bind_group(CAMERA_GROUP, camera, &[]);
        pass.set_bind_group(SCENE_GROUP, &scene.bind_group, &[]);
        pass.set_vertex_buffer(INSTANCE_BUFFER_SLOT, scene.instance_buffer.slice(..));
    }

    pub fn create_camera_bind_group(
        &self,
        device: &wgpu::Device,
        camera_buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &self.camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        })
    }
}

/// Group 0: material uniform + texture/sampler pairs (fragment only)
fn create_material_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        // binding 0: MaterialUniform
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
    ];
    for slot in TextureSlot::ALL {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot.texture_binding(),
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot.sampler_binding(),
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Material Bind Group Layout"),
        entries: &entries,
    })
}

/// Group 1: camera uniform (vertex + fragment)
fn create_camera_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Camera Bind Group Layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Group 2: read-only scene storage
pub fn create_scene_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let storage = |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Scene Bind Group Layout"),
        entries: &[
            // Vertex stage reads model matrices, fragment stage reads light transforms
            storage(
                TRANSFORMS_BINDING,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ),
            storage(NORMALS_BINDING, wgpu::ShaderStages::VERTEX),
            storage(LIGHTS_BINDING, wgpu::ShaderStages::FRAGMENT),
            storage(LIGHT_TRANSFORM_INDEX_BINDING, wgpu::ShaderStages::FRAGMENT),
        ],
    })
}
