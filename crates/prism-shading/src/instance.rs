//! Instance indirection
//!
//! A draw never indexes the transform arrays by its own instance ordinal.
//! It reads `table[ordinal]` from a per-draw index table, so instances can be
//! drawn sparser than, and in a different order from, their storage order.

use bytemuck::{Pod, Zeroable};
use prism_core::{PrismError, Result};

/// Per-instance vertex data: the global slots one draw-local instance uses
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct InstanceRaw {
    pub transform_index: u32,
    pub normal_index: u32,
}

impl InstanceRaw {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        9 => Uint32,    // transform_index
        10 => Uint32,   // normal_index
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Checked `table[ordinal]`, the one lookup every indirection goes through
pub fn resolve<T: Copy>(name: &'static str, table: &[T], ordinal: u32) -> Result<T> {
    fetch(name, table, ordinal).copied()
}

/// Resolve draw-local instance `ordinal` and check that both of its slots
/// exist in arrays of `transform_count` and `normal_count` entries.
pub fn resolve_instance(
    instances: &[InstanceRaw],
    ordinal: u32,
    transform_count: usize,
    normal_count: usize,
) -> Result<InstanceRaw> {
    let instance = resolve("instances", instances, ordinal)?;
    check_instance(&instance, transform_count, normal_count)?;
    Ok(instance)
}

/// Checked element read from one of the scene arrays
pub fn fetch<'a, T>(name: &'static str, items: &'a [T], index: u32) -> Result<&'a T> {
    items.get(index as usize).ok_or(PrismError::IndexOutOfRange {
        table: name,
        index,
        len: items.len(),
    })
}

/// Validate a whole index table against the array it points into.
/// Run once before upload so the device never sees a bad slot.
pub fn validate_table(name: &'static str, table: &[u32], slot_count: usize) -> Result<()> {
    table
        .iter()
        .try_for_each(|&slot| check_slot(name, slot, slot_count))
}

/// Validate the transform and normal slots of every instance in a draw.
pub fn validate_instances(
    instances: &[InstanceRaw],
    transform_count: usize,
    normal_count: usize,
) -> Result<()> {
    instances
        .iter()
        .try_for_each(|instance| check_instance(instance, transform_count, normal_count))
}

fn check_instance(instance: &InstanceRaw, transform_count: usize, normal_count: usize) -> Result<()> {
    check_slot("transforms", instance.transform_index, transform_count)?;
    check_slot("normal matrices", instance.normal_index, normal_count)
}

fn check_slot(table: &'static str, index: u32, len: usize) -> Result<()> {
    if (index as usize) < len {
        Ok(())
    } else {
        Err(PrismError::IndexOutOfRange { table, index, len })
    }
}
