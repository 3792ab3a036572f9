//! Host-side scene storage
//!
//! `SceneData` owns the four arrays of bind group 2 plus the per-draw
//! instance table. The transform and normal-matrix arrays grow together, so
//! a node or light gets the same slot in both.

use crate::instance::{
    fetch, resolve, resolve_instance, validate_instances, validate_table, InstanceRaw,
};
use crate::layout::{
    LightUniform, NormalUniform, TransformUniform, LIGHTS_BINDING, LIGHT_TRANSFORM_INDEX_BINDING,
    NORMALS_BINDING, TRANSFORMS_BINDING,
};
use crate::light::Light;
use glam::Mat4;
use prism_core::{PrismError, Result};
use wgpu::util::DeviceExt;

/// Borrowed, read-only view of the scene arrays for one draw
#[derive(Debug, Copy, Clone)]
pub struct SceneBindings<'a> {
    pub transforms: &'a [TransformUniform],
    pub normals: &'a [NormalUniform],
    pub lights: &'a [LightUniform],
    /// Entry `i` is the transform slot of light `i`
    pub light_transform_index: &'a [u32],
}

impl<'a> SceneBindings<'a> {
    /// Check the light relation before the arrays reach a shader
    pub fn validate(&self) -> Result<()> {
        if self.lights.len() != self.light_transform_index.len() {
            return Err(PrismError::InvalidDimensions(format!(
                "{} lights but {} light transform indices",
                self.lights.len(),
                self.light_transform_index.len()
            )));
        }
        validate_table(
            "light transform index",
            self.light_transform_index,
            self.transforms.len(),
        )?;
        for light in self.lights {
            light.kind()?;
        }
        Ok(())
    }

    /// Transform linked to light `light_index`
    pub fn light_transform(&self, light_index: u32) -> Result<&'a TransformUniform> {
        let slot = resolve("light transform index", self.light_transform_index, light_index)?;
        fetch("transforms", self.transforms, slot)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneData {
    transforms: Vec<TransformUniform>,
    normals: Vec<NormalUniform>,
    lights: Vec<LightUniform>,
    light_transform_index: Vec<u32>,
    instances: Vec<InstanceRaw>,
}

impl SceneData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a transform slot (and its normal matrix) for a mesh node
    pub fn add_node(&mut self, model: Mat4) -> InstanceRaw {
        let slot = self.push_transform(model);
        InstanceRaw {
            transform_index: slot,
            normal_index: slot,
        }
    }

    /// Append a draw-local instance to the instance table
    pub fn add_instance(&mut self, instance: InstanceRaw) -> u32 {
        self.instances.push(instance);
        (self.instances.len() - 1) as u32
    }

    /// Allocate a light record and a transform slot, and link them
    pub fn add_light(&mut self, light: &Light) -> u32 {
        let slot = self.push_transform(light.to_transform());
        self.lights.push(light.to_light_uniform());
        self.light_transform_index.push(slot);
        (self.lights.len() - 1) as u32
    }

    /// Replace light `index`, keeping its transform slot
    pub fn set_light(&mut self, index: u32, light: &Light) -> Result<()> {
        let slot = resolve("lights", &self.light_transform_index, index)?;
        self.lights[index as usize] = light.to_light_uniform();
        self.set_transform(slot, light.to_transform())
    }

    /// Refresh a transform slot and its normal matrix
    pub fn set_transform(&mut self, slot: u32, model: Mat4) -> Result<()> {
        fetch("transforms", &self.transforms, slot)?;
        self.transforms[slot as usize] = TransformUniform::new(model);
        self.normals[slot as usize] = NormalUniform::new(model);
        Ok(())
    }

    /// Draw-local instance `ordinal`, with both slots checked
    pub fn instance(&self, ordinal: u32) -> Result<InstanceRaw> {
        resolve_instance(
            &self.instances,
            ordinal,
            self.transforms.len(),
            self.normals.len(),
        )
    }

    pub fn instances(&self) -> &[InstanceRaw] {
        &self.instances
    }

    pub fn transforms(&self) -> &[TransformUniform] {
        &self.transforms
    }

    pub fn normals(&self) -> &[NormalUniform] {
        &self.normals
    }

    pub fn lights(&self) -> &[LightUniform] {
        &self.lights
    }

    pub fn light_transform_index(&self) -> &[u32] {
        &self.light_transform_index
    }

    pub fn bindings(&self) -> SceneBindings<'_> {
        SceneBindings {
            transforms: &self.transforms,
            normals: &self.normals,
            lights: &self.lights,
            light_transform_index: &self.light_transform_index,
        }
    }

    /// Check every index relation before upload
    pub fn validate(&self) -> Result<()> {
        self.bindings().validate()?;
        validate_instances(&self.instances, self.transforms.len(), self.normals.len())
    }

    fn push_transform(&mut self, model: Mat4) -> u32 {
        self.transforms.push(TransformUniform::new(model));
        self.normals.push(NormalUniform::new(model));
        (self.transforms.len() - 1) as u32
    }
}

/// Scene arrays uploaded as read-only storage buffers (bind group 2)
pub struct GpuScene {
    pub transform_buffer: wgpu::Buffer,
    pub normal_buffer: wgpu::Buffer,
    pub light_buffer: wgpu::Buffer,
    pub light_index_buffer: wgpu::Buffer,
    /// Per-instance vertex buffer (slot 7)
    pub instance_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub instance_count: u32,
    counts: [usize; 5],
}

impl GpuScene {
    /// Validate `scene` and upload it
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, scene: &SceneData) -> Result<Self> {
        scene.validate()?;

        let transform_buffer = storage_buffer(device, "Scene Transforms", scene.transforms());
        let normal_buffer = storage_buffer(device, "Scene Normal Matrices", scene.normals());
        let light_buffer = storage_buffer(device, "Scene Lights", scene.lights());
        let light_index_buffer =
            storage_buffer(device, "Scene Light Transform Index", scene.light_transform_index());

        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Instances"),
            contents: bytemuck::cast_slice(&non_empty(scene.instances())),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: TRANSFORMS_BINDING,
                    resource: transform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: NORMALS_BINDING,
                    resource: normal_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: LIGHTS_BINDING,
                    resource: light_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: LIGHT_TRANSFORM_INDEX_BINDING,
                    resource: light_index_buffer.as_entire_binding(),
                },
            ],
        });

        log::debug!(
            "uploaded scene: {} transforms, {} lights, {} instances",
            scene.transforms().len(),
            scene.lights().len(),
            scene.instances().len()
        );

        Ok(Self {
            transform_buffer,
            normal_buffer,
            light_buffer,
            light_index_buffer,
            instance_buffer,
            bind_group,
            instance_count: scene.instances().len() as u32,
            counts: scene_counts(scene),
        })
    }

    /// Rewrite buffer contents in place. Array lengths must not have changed;
    /// a grown scene needs a new `GpuScene`.
    pub fn update(&self, queue: &wgpu::Queue, scene: &SceneData) -> Result<()> {
        if scene_counts(scene) != self.counts {
            return Err(PrismError::InvalidDimensions(
                "scene arrays changed length since upload".to_string(),
            ));
        }
        scene.validate()?;

        queue.write_buffer(&self.transform_buffer, 0, bytemuck::cast_slice(scene.transforms()));
        queue.write_buffer(&self.normal_buffer, 0, bytemuck::cast_slice(scene.normals()));
        queue.write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(scene.lights()));
        queue.write_buffer(
            &self.light_index_buffer,
            0,
            bytemuck::cast_slice(scene.light_transform_index()),
        );
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(scene.instances()));
        Ok(())
    }
}

fn scene_counts(scene: &SceneData) -> [usize; 5] {
    [
        scene.transforms().len(),
        scene.normals().len(),
        scene.lights().len(),
        scene.light_transform_index().len(),
        scene.instances().len(),
    ]
}

/// Zero-sized buffers cannot be bound, so empty arrays upload one zeroed entry
fn non_empty<T: bytemuck::Pod>(items: &[T]) -> Vec<T> {
    if items.is_empty() {
        vec![T::zeroed()]
    } else {
        items.to_vec()
    }
}

fn storage_buffer<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, items: &[T]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&non_empty(items)),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sun() -> Light {
        Light::Directional {
            direction: Vec3::new(0.0, -1.0, -1.0),
            color: Vec3::ONE,
            intensity: 3.0,
        }
    }

    #[test]
    fn nodes_and_lights_share_transform_array() {
        let mut scene = SceneData::new();
        let a = scene.add_node(Mat4::IDENTITY);
        let light = scene.add_light(&sun());
        let b = scene.add_node(Mat4::from_translation(Vec3::X));

        assert_eq!(a.transform_index, 0);
        assert_eq!(scene.light_transform_index(), &[1]);
        assert_eq!(b.transform_index, 2);
        assert_eq!(b.normal_index, 2);
        assert_eq!(light, 0);
        assert_eq!(scene.transforms().len(), scene.normals().len());
    }

    #[test]
    fn light_transform_resolves_through_index() {
        let mut scene = SceneData::new();
        scene.add_node(Mat4::IDENTITY);
        scene.add_light(&Light::Point {
            position: Vec3::new(0.0, 4.0, 0.0),
            color: Vec3::ONE,
            intensity: 1.0,
        });
        let bindings = scene.bindings();
        let transform = bindings.light_transform(0).unwrap();
        assert_eq!(transform.translation(), Vec3::new(0.0, 4.0, 0.0));
        assert!(bindings.light_transform(1).is_err());
    }

    #[test]
    fn set_transform_refreshes_normal_matrix() {
        let mut scene = SceneData::new();
        let node = scene.add_node(Mat4::IDENTITY);
        let model = Mat4::from_scale(Vec3::new(1.0, 4.0, 1.0));
        scene.set_transform(node.transform_index, model).unwrap();
        assert_eq!(scene.normals()[0], NormalUniform::new(model));
        assert!(scene.set_transform(5, model).is_err());
    }

    #[test]
    fn set_light_keeps_slot() {
        let mut scene = SceneData::new();
        let index = scene.add_light(&sun());
        let moved = Light::Point {
            position: Vec3::new(2.0, 0.0, 0.0),
            color: Vec3::ONE,
            intensity: 5.0,
        };
        scene.set_light(index, &moved).unwrap();
        assert_eq!(scene.lights()[0].intensity, 5.0);
        assert_eq!(scene.transforms()[0].translation(), Vec3::new(2.0, 0.0, 0.0));
        assert!(scene.set_light(1, &moved).is_err());
    }

    #[test]
    fn validate_catches_bad_instance() {
        let mut scene = SceneData::new();
        let node = scene.add_node(Mat4::IDENTITY);
        scene.add_instance(node);
        assert!(scene.validate().is_ok());

        scene.add_instance(InstanceRaw {
            transform_index: 0,
            normal_index: 3,
        });
        assert!(matches!(
            scene.validate(),
            Err(PrismError::IndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn validate_catches_dangling_light_link() {
        let transforms = [TransformUniform::identity()];
        let lights = [sun().to_light_uniform()];
        let bindings = SceneBindings {
            transforms: &transforms,
            normals: &[],
            lights: &lights,
            light_transform_index: &[4],
        };
        assert!(bindings.validate().is_err());

        let mismatched = SceneBindings {
            light_transform_index: &[],
            ..bindings
        };
        assert!(matches!(
            mismatched.validate(),
            Err(PrismError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn instances_resolve_by_ordinal() {
        let mut scene = SceneData::new();
        let first = scene.add_node(Mat4::IDENTITY);
        let second = scene.add_node(Mat4::IDENTITY);
        // Drawn in reverse storage order
        scene.add_instance(second);
        scene.add_instance(first);
        assert_eq!(scene.instance(0).unwrap().transform_index, 1);
        assert_eq!(scene.instance(1).unwrap().transform_index, 0);
        assert!(scene.instance(2).is_err());

        scene.add_instance(InstanceRaw {
            transform_index: 5,
            normal_index: 0,
        });
        assert!(matches!(
            scene.instance(2),
            Err(PrismError::IndexOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn empty_arrays_upload_one_entry() {
        let padded = non_empty::<u32>(&[]);
        assert_eq!(padded, vec![0]);
    }
}
