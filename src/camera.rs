//! Per-frame camera uniform (spec §6 `CameraConstant`, supplementing spec
//! §4.N's `Update()`: "refresh camera/dynamic per-frame data (copy into
//! host-visible camera buffer for the current frame)"). One small
//! host-visible uniform buffer per frame slot, grounded on the teacher's
//! `create_cpu_accessible_buffer` pattern (`resources::buffer::Buffer`
//! here) rather than a `SharedBuffer` sub-range, since its size never
//! changes after construction.
use crate::{
  error::TerraResult,
  memory::SharedMemoryManager,
  resources::buffer::Buffer,
  vertex::CameraConstant,
};
use ash::vk;
use std::sync::Arc;
use ultraviolet::Mat4;

pub struct CameraManager {
  buffers: Vec<Buffer>,
  view: Mat4,
  projection: Mat4,
}
impl CameraManager {
  pub fn new(device: Arc<ash::Device>, memory_manager: SharedMemoryManager, buffer_count: u32) -> TerraResult<Self> {
    let size = std::mem::size_of::<CameraConstant>() as u64;
    let mut buffers = Vec::with_capacity(buffer_count as usize);
    for _ in 0..buffer_count {
      buffers.push(Buffer::create(
        device.clone(),
        &memory_manager,
        size,
        vk::BufferUsageFlags::UNIFORM_BUFFER,
        &[],
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
      )?);
    }
    Ok(Self {
      buffers,
      view: Mat4::identity(),
      projection: Mat4::identity(),
    })
  }

  pub fn set_view(&mut self, view: Mat4) {
    self.view = view;
  }

  pub fn set_projection(&mut self, projection: Mat4) {
    self.projection = projection;
  }

  /// Copies the current view/projection into frame `frame_index`'s uniform
  /// buffer (spec §4.N `Update`).
  pub fn update(&self, frame_index: usize) {
    let constant = CameraConstant {
      view: self.view,
      projection: self.projection,
    };
    let bytes = unsafe {
      std::slice::from_raw_parts(&constant as *const CameraConstant as *const u8, std::mem::size_of::<CameraConstant>())
    };
    unsafe { self.buffers[frame_index].write_mapped(0, bytes) };
  }

  pub fn buffer_handle(&self, frame_index: usize) -> vk::Buffer {
    self.buffers[frame_index].handle
  }

  pub fn buffer_size(&self) -> u64 {
    std::mem::size_of::<CameraConstant>() as u64
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn camera_constant_matches_documented_size() {
    assert_eq!(std::mem::size_of::<CameraConstant>(), 128);
  }
}
