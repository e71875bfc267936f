//! `MeshManager` (spec §4.J): owns `Vec<MeshBundle>`, each a vertex/index
//! sub-range out of two global `SharedBuffer` pools plus the mesh's bounds
//! (used by `VS-indirect`'s per-model culling). The teacher allocates one
//! `vk::Buffer` per mesh via `vk_mem`; here meshes share two pools so a
//! single vertex/index bind covers every bundle drawn with `VS-indirect` or
//! `MS`.
use crate::{
  error::{TerraError, TerraResult},
  memory::SharedMemoryManager,
  resources::shared_buffer::{SharedBuffer, SharedBufferData},
  staging::StagingBufferManager,
  temporary_data::TemporaryDataBuffer,
  thread_pool::JobPool,
  vertex::Vertex,
};
use ash::{vk, Device};
use std::sync::Arc;
use ultraviolet::Vec3;

/// A registered mesh: sub-ranges into the shared vertex/index pools plus
/// the bounds `VS-indirect`'s compute culling pass tests against (spec
/// §9's Open Question: culling is per-model, but per-model culling still
/// needs the mesh's local bounds to transform into world space).
pub struct MeshBundle {
  pub vertex_range: SharedBufferData,
  pub index_range: SharedBufferData,
  pub index_count: u32,
  /// Task-group count `MS`'s `DrawMeshTasks` issues for this mesh. Meshlet
  /// generation itself is out of scope (spec Non-goals); callers that
  /// never draw this mesh with the `MS` engine can pass `1`.
  pub meshlet_count: u32,
  pub positive_bounds: Vec3,
  pub negative_bounds: Vec3,
}

/// Reinterprets a `Copy` POD slice as bytes for a staging upload. Safe
/// because `T` here is always `#[repr(C)]` and has no padding bytes that
/// matter (the GPU reads the same layout).
fn as_bytes<T: Copy>(slice: &[T]) -> &[u8] {
  unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, std::mem::size_of_val(slice)) }
}

fn bounds_of(vertices: &[Vertex]) -> (Vec3, Vec3) {
  let mut positive = vertices[0].position;
  let mut negative = vertices[0].position;
  for v in &vertices[1..] {
    positive.x = positive.x.max(v.position.x);
    positive.y = positive.y.max(v.position.y);
    positive.z = positive.z.max(v.position.z);
    negative.x = negative.x.min(v.position.x);
    negative.y = negative.y.min(v.position.y);
    negative.z = negative.z.min(v.position.z);
  }
  (positive, negative)
}

pub struct MeshManager {
  vertex_buffer: SharedBuffer,
  index_buffer: SharedBuffer,
  meshes: Vec<MeshBundle>,
}
impl MeshManager {
  pub fn new(
    device: Arc<Device>, memory_manager: SharedMemoryManager, queue_family_indices: Vec<u32>,
    initial_vertex_pool_size: u64, initial_index_pool_size: u64,
  ) -> TerraResult<Self> {
    let vertex_buffer = SharedBuffer::new(
      device.clone(),
      memory_manager.clone(),
      initial_vertex_pool_size,
      vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC,
      vk::MemoryPropertyFlags::DEVICE_LOCAL,
      queue_family_indices.clone(),
    )?;
    let index_buffer = SharedBuffer::new(
      device,
      memory_manager,
      initial_index_pool_size,
      vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC,
      vk::MemoryPropertyFlags::DEVICE_LOCAL,
      queue_family_indices,
    )?;
    Ok(Self {
      vertex_buffer,
      index_buffer,
      meshes: Vec::new(),
    })
  }

  /// `AddMeshBundle` (spec §4.J/N): validates non-empty vertex/index,
  /// reserves sub-ranges in the two shared pools, enqueues both uploads,
  /// and returns a stable `mesh_id`.
  #[allow(clippy::too_many_arguments)]
  pub fn add_mesh_bundle(
    &mut self, vertices: &[Vertex], indices: &[u32], meshlet_count: u32, staging: &mut StagingBufferManager,
    job_pool: &dyn JobPool, temp_data: &mut TemporaryDataBuffer, current_frame: usize,
  ) -> TerraResult<usize> {
    if vertices.is_empty() || indices.is_empty() {
      return Err(TerraError::InvalidArgument("mesh bundle requires non-empty vertex and index data"));
    }

    let (positive_bounds, negative_bounds) = bounds_of(vertices);

    let vertex_size = std::mem::size_of_val(vertices) as u64;
    let vertex_range = self
      .vertex_buffer
      .reserve(vertex_size, std::mem::size_of::<Vertex>() as u64, staging, temp_data, current_frame)?;
    staging.enqueue_buffer_upload(as_bytes(vertices), self.vertex_buffer.handle(), vertex_range.offset, job_pool)?;

    let index_size = std::mem::size_of_val(indices) as u64;
    let index_range = self
      .index_buffer
      .reserve(index_size, std::mem::size_of::<u32>() as u64, staging, temp_data, current_frame)?;
    staging.enqueue_buffer_upload(as_bytes(indices), self.index_buffer.handle(), index_range.offset, job_pool)?;

    self.meshes.push(MeshBundle {
      vertex_range,
      index_range,
      index_count: indices.len() as u32,
      meshlet_count: meshlet_count.max(1),
      positive_bounds,
      negative_bounds,
    });
    Ok(self.meshes.len() - 1)
  }

  pub fn get(&self, mesh_id: usize) -> TerraResult<&MeshBundle> {
    self.meshes.get(mesh_id).ok_or(TerraError::UnknownMesh)
  }

  pub fn vertex_buffer_handle(&self) -> vk::Buffer {
    self.vertex_buffer.handle()
  }

  pub fn index_buffer_handle(&self) -> vk::Buffer {
    self.index_buffer.handle()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bounds_of_single_vertex_are_that_vertex() {
    let v = Vertex {
      position: Vec3::new(1.0, 2.0, 3.0),
      normal: Vec3::new(0.0, 1.0, 0.0),
      uv: ultraviolet::Vec2::new(0.0, 0.0),
    };
    let (positive, negative) = bounds_of(&[v]);
    assert_eq!(positive, v.position);
    assert_eq!(negative, v.position);
  }

  #[test]
  fn bounds_of_quad_spans_all_four_corners() {
    let quad = [
      Vertex { position: Vec3::new(-1.0, -1.0, 0.0), normal: Vec3::unit_y(), uv: ultraviolet::Vec2::new(0.0, 0.0) },
      Vertex { position: Vec3::new(1.0, -1.0, 0.0), normal: Vec3::unit_y(), uv: ultraviolet::Vec2::new(1.0, 0.0) },
      Vertex { position: Vec3::new(1.0, 1.0, 0.0), normal: Vec3::unit_y(), uv: ultraviolet::Vec2::new(1.0, 1.0) },
      Vertex { position: Vec3::new(-1.0, 1.0, 0.0), normal: Vec3::unit_y(), uv: ultraviolet::Vec2::new(0.0, 1.0) },
    ];
    let (positive, negative) = bounds_of(&quad);
    assert_eq!(positive, Vec3::new(1.0, 1.0, 0.0));
    assert_eq!(negative, Vec3::new(-1.0, -1.0, 0.0));
  }
}
