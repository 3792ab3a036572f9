//! Vertex inputs and the lit vertex stage

use crate::instance::{fetch, resolve_instance, InstanceRaw};
use crate::layout::{CameraUniform, TransformUniform};
use crate::scene::SceneBindings;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};
use prism_core::Result;

/// UV sets a mesh may carry
pub const MAX_TEXCOORD_SETS: usize = 6;

/// Uniform scale applied to light-gizmo geometry
pub const GIZMO_SCALE: f32 = 0.25;

/// Vertex buffer slot of the per-instance data
pub const INSTANCE_BUFFER_SLOT: u32 = 1 + MAX_TEXCOORD_SETS as u32;

/// Geometry stream, vertex buffer slot 0
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// xyz tangent, w handedness
    pub tangent: [f32; 4],
}

impl MeshVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,  // position
        1 => Float32x3,  // normal
        2 => Float32x4,  // tangent
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// One UV set, each in its own vertex buffer (slots 1..=6)
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TexCoord {
    pub uv: [f32; 2],
}

static TEXCOORD_ATTRIBS: [[wgpu::VertexAttribute; 1]; MAX_TEXCOORD_SETS] = [
    wgpu::vertex_attr_array![3 => Float32x2],
    wgpu::vertex_attr_array![4 => Float32x2],
    wgpu::vertex_attr_array![5 => Float32x2],
    wgpu::vertex_attr_array![6 => Float32x2],
    wgpu::vertex_attr_array![7 => Float32x2],
    wgpu::vertex_attr_array![8 => Float32x2],
];

impl TexCoord {
    pub fn layouts() -> [wgpu::VertexBufferLayout<'static>; MAX_TEXCOORD_SETS] {
        std::array::from_fn(|set| wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TexCoord>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &TEXCOORD_ATTRIBS[set],
        })
    }
}

/// Every buffer layout of the lit pipeline, in slot order
pub fn vertex_buffer_layouts() -> Vec<wgpu::VertexBufferLayout<'static>> {
    let mut layouts = Vec::with_capacity(2 + MAX_TEXCOORD_SETS);
    layouts.push(MeshVertex::desc());
    layouts.extend(TexCoord::layouts());
    layouts.push(InstanceRaw::desc());
    layouts
}

/// What `vs_main` hands to the rasterizer
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VertexOutput {
    pub clip_position: Vec4,
    pub world_position: Vec3,
    /// Not renormalized; interpolation denormalizes it anyway
    pub world_normal: Vec3,
    pub tangent: Vec4,
    pub view_position: Vec3,
    pub tex_coords: [Vec2; MAX_TEXCOORD_SETS],
}

/// Lit vertex stage for one vertex of draw-local instance `ordinal`.
/// The transform and normal slots come from `instances[ordinal]`, never from
/// the ordinal itself.
pub fn shade_vertex(
    vertex: &MeshVertex,
    tex_coords: &[TexCoord; MAX_TEXCOORD_SETS],
    instances: &[InstanceRaw],
    ordinal: u32,
    scene: &SceneBindings,
    camera: &CameraUniform,
) -> Result<VertexOutput> {
    let instance = resolve_instance(
        instances,
        ordinal,
        scene.transforms.len(),
        scene.normals.len(),
    )?;
    let model = fetch("transforms", scene.transforms, instance.transform_index)?.to_mat4();
    let normal_matrix = fetch("normal matrices", scene.normals, instance.normal_index)?.to_mat3();

    let world = model * Vec3::from_array(vertex.position).extend(1.0);

    Ok(VertexOutput {
        clip_position: camera.view_projection() * world,
        world_position: world.truncate(),
        world_normal: normal_matrix * Vec3::from_array(vertex.normal),
        tangent: Vec4::from_array(vertex.tangent),
        view_position: camera.view_position(),
        tex_coords: tex_coords.map(|t| Vec2::from_array(t.uv)),
    })
}

/// Clip position of a light-gizmo vertex
pub fn gizmo_vertex(position: Vec3, transform: &TransformUniform, camera: &CameraUniform) -> Vec4 {
    let local = (position * GIZMO_SCALE).extend(1.0);
    camera.view_projection() * transform.to_mat4() * local
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneData;
    use glam::Mat4;

    fn vertex(position: [f32; 3], normal: [f32; 3]) -> MeshVertex {
        MeshVertex {
            position,
            normal,
            tangent: [1.0, 0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn world_position_and_clip() {
        let mut scene = SceneData::new();
        let node = scene.add_node(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        scene.add_instance(node);
        let proj = Mat4::from_scale(Vec3::splat(2.0));
        let camera = CameraUniform::from_view(Vec3::new(0.0, 0.0, 9.0), Mat4::IDENTITY, proj);

        let out = shade_vertex(
            &vertex([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            &[TexCoord::default(); MAX_TEXCOORD_SETS],
            scene.instances(),
            0,
            &scene.bindings(),
            &camera,
        )
        .unwrap();

        assert_eq!(out.world_position, Vec3::new(2.0, 2.0, 3.0));
        assert_eq!(out.clip_position, Vec4::new(4.0, 4.0, 6.0, 1.0));
        assert_eq!(out.view_position, Vec3::new(0.0, 0.0, 9.0));
        assert_eq!(out.tangent, Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn normal_uses_inverse_transpose_and_is_not_renormalized() {
        let mut scene = SceneData::new();
        let node = scene.add_node(Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)));
        scene.add_instance(node);
        let out = shade_vertex(
            &vertex([0.0; 3], [1.0, 0.0, 0.0]),
            &[TexCoord::default(); MAX_TEXCOORD_SETS],
            scene.instances(),
            0,
            &scene.bindings(),
            &CameraUniform::default(),
        )
        .unwrap();
        assert!(out.world_normal.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn separate_normal_slot_is_honoured() {
        let mut scene = SceneData::new();
        let a = scene.add_node(Mat4::IDENTITY);
        let b = scene.add_node(Mat4::from_scale(Vec3::splat(4.0)));
        scene.add_instance(InstanceRaw {
            transform_index: a.transform_index,
            normal_index: b.normal_index,
        });
        let out = shade_vertex(
            &vertex([0.0; 3], [0.0, 0.0, 1.0]),
            &[TexCoord::default(); MAX_TEXCOORD_SETS],
            scene.instances(),
            0,
            &scene.bindings(),
            &CameraUniform::default(),
        )
        .unwrap();
        assert!(out.world_normal.abs_diff_eq(Vec3::new(0.0, 0.0, 0.25), 1e-6));
    }

    #[test]
    fn uv_sets_pass_through() {
        let mut scene = SceneData::new();
        let node = scene.add_node(Mat4::IDENTITY);
        scene.add_instance(node);
        let mut uvs = [TexCoord::default(); MAX_TEXCOORD_SETS];
        uvs[4].uv = [0.25, 0.75];
        let out = shade_vertex(
            &vertex([0.0; 3], [0.0, 1.0, 0.0]),
            &uvs,
            scene.instances(),
            0,
            &scene.bindings(),
            &CameraUniform::default(),
        )
        .unwrap();
        assert_eq!(out.tex_coords[4], Vec2::new(0.25, 0.75));
    }

    #[test]
    fn ordinal_goes_through_the_instance_table() {
        let mut scene = SceneData::new();
        let near = scene.add_node(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        scene.add_node(Mat4::from_translation(Vec3::new(0.0, 20.0, 0.0)));
        let far = scene.add_node(Mat4::from_translation(Vec3::new(0.0, 0.0, 30.0)));
        // Sparse and reordered: slot 1 is never drawn, slot 2 is drawn first
        scene.add_instance(far);
        scene.add_instance(near);

        let shade = |ordinal| {
            shade_vertex(
                &vertex([1.0, 1.0, 1.0], [0.0, 1.0, 0.0]),
                &[TexCoord::default(); MAX_TEXCOORD_SETS],
                scene.instances(),
                ordinal,
                &scene.bindings(),
                &CameraUniform::default(),
            )
        };
        assert_eq!(shade(0).unwrap().world_position, Vec3::new(1.0, 1.0, 31.0));
        assert_eq!(shade(1).unwrap().world_position, Vec3::new(11.0, 1.0, 1.0));
        assert!(shade(2).is_err());
    }

    #[test]
    fn bad_slot_is_an_error() {
        let scene = SceneData::new();
        let instances = [InstanceRaw {
            transform_index: 0,
            normal_index: 0,
        }];
        let result = shade_vertex(
            &vertex([0.0; 3], [0.0, 1.0, 0.0]),
            &[TexCoord::default(); MAX_TEXCOORD_SETS],
            &instances,
            0,
            &scene.bindings(),
            &CameraUniform::default(),
        );
        assert!(matches!(
            result,
            Err(prism_core::PrismError::IndexOutOfRange { table: "transforms", .. })
        ));
    }

    #[test]
    fn gizmo_is_quarter_scale() {
        let transform = TransformUniform::new(Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)));
        let clip = gizmo_vertex(Vec3::new(4.0, 0.0, 0.0), &transform, &CameraUniform::default());
        assert_eq!(clip, Vec4::new(1.0, 5.0, 0.0, 1.0));
    }

    #[test]
    fn buffer_layout_locations() {
        let layouts = vertex_buffer_layouts();
        assert_eq!(layouts.len(), 8);
        assert_eq!(layouts[0].array_stride, 40);
        let locations: Vec<u32> = layouts
            .iter()
            .flat_map(|l| l.attributes.iter().map(|a| a.shader_location))
            .collect();
        assert_eq!(locations, (0..=10).collect::<Vec<u32>>());
        assert_eq!(
            layouts[INSTANCE_BUFFER_SLOT as usize].step_mode,
            wgpu::VertexStepMode::Instance
        );
    }
}
