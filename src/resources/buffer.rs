//! `Buffer`: a `vk::Buffer` bound to one `MemoryManager` allocation (spec
//! §4.B). Grounded on the teacher's `create_gpu_buffer`/
//! `create_cpu_accessible_buffer` (`renderer/vulkan/vulkan_buffer_image_functions.rs`),
//! generalized from vk_mem's `usage` enum to an explicit property-flags
//! request against [`MemoryManager`].
use crate::{
  error::TerraResult,
  memory::{Allocation, SharedMemoryManager},
};
use ash::{version::DeviceV1_0, vk, Device};
use std::sync::Arc;

/// RAII wrapper binding a `vk::Buffer` to a sub-range of device or
/// host-visible memory. Destroys the handle and returns the allocation to
/// the `MemoryManager` it came from on drop.
pub struct Buffer {
  device: Arc<Device>,
  memory_manager: SharedMemoryManager,
  pub handle: vk::Buffer,
  pub allocation: Allocation,
  pub size: u64,
  mapped_ptr: Option<*mut u8>,
}
// The mapped pointer, when present, points into memory owned by the
// MemoryManager for as long as this Buffer holds its Allocation; all access
// happens from the primary thread per spec §5.
unsafe impl Send for Buffer {}

impl Buffer {
  /// Creates a device buffer of `size` bytes with `usage`, sharing mode
  /// `CONCURRENT` when more than one queue family is given (else
  /// `EXCLUSIVE`), and binds memory satisfying `property_flags`.
  pub fn create(
    device: Arc<Device>, memory_manager: &SharedMemoryManager, size: u64, usage: vk::BufferUsageFlags,
    queue_family_indices: &[u32], property_flags: vk::MemoryPropertyFlags,
  ) -> TerraResult<Self> {
    let sharing_mode = if queue_family_indices.len() > 1 {
      vk::SharingMode::CONCURRENT
    } else {
      vk::SharingMode::EXCLUSIVE
    };

    let mut buffer_ci = vk::BufferCreateInfo::builder()
      .size(size)
      .usage(usage)
      .sharing_mode(sharing_mode);
    if sharing_mode == vk::SharingMode::CONCURRENT {
      buffer_ci = buffer_ci.queue_family_indices(queue_family_indices);
    }
    let handle = unsafe { device.create_buffer(&buffer_ci.build(), None)? };

    let requirements = unsafe { device.get_buffer_memory_requirements(handle) };
    let (allocation, mapped_ptr) = {
      let mut mm = memory_manager.write().expect("MemoryManager lock poisoned");
      let allocation = match mm.allocate(
        requirements.size,
        requirements.alignment,
        requirements.memory_type_bits,
        property_flags,
      ) {
        Ok(allocation) => allocation,
        Err(e) => {
          unsafe { device.destroy_buffer(handle, None) };
          return Err(e);
        }
      };

      unsafe {
        device.bind_buffer_memory(handle, mm.raw_memory(&allocation), allocation.offset)?;
      }
      (allocation, mm.mapped_ptr(&allocation))
    };

    Ok(Self {
      device,
      memory_manager: memory_manager.clone(),
      handle,
      allocation,
      size,
      mapped_ptr,
    })
  }

  /// Host pointer to this buffer's bytes, if it was allocated from a
  /// host-visible memory type.
  pub fn mapped_ptr(&self) -> Option<*mut u8> {
    self.mapped_ptr
  }

  /// Copies `bytes` into the mapped range starting at `dst_offset`. Caller
  /// is responsible for flushing non-coherent memory (spec §5).
  ///
  /// # Safety
  /// `dst_offset + bytes.len()` must not exceed `self.size`, and the
  /// buffer must be host-visible.
  pub unsafe fn write_mapped(&self, dst_offset: u64, bytes: &[u8]) {
    let base = self.mapped_ptr.expect("Buffer is not host-visible");
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), base.add(dst_offset as usize), bytes.len());
  }
}
impl Drop for Buffer {
  fn drop(&mut self) {
    unsafe {
      self.device.destroy_buffer(self.handle, None);
    }
    self
      .memory_manager
      .write()
      .expect("MemoryManager lock poisoned")
      .free(self.allocation);
  }
}
