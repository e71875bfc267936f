//! `MemoryManager`: allocates large blocks of device/host-visible memory and
//! bump-sub-allocates from them, grouped by `{memory_type_index}`. One block
//! is never split across groups and is only freed at manager teardown (spec
//! §4.A's "simple variant").
use crate::{
  config::MemoryConfig,
  error::{TerraError, TerraResult},
};
use ash::{version::DeviceV1_0, vk, Device};
use slotmap::{DefaultKey, SlotMap};
use std::{collections::HashMap, sync::Arc};

/// One `vkAllocateMemory` call. Bump-allocated from the front; never
/// compacted. `cursor` is the offset of the next free byte.
struct MemoryBlock {
  memory: vk::DeviceMemory,
  size: u64,
  memory_type_index: u32,
  mapped_ptr: Option<*mut u8>,
  cursor: u64,
  live_allocations: u32,
}
// `mapped_ptr` points into device-exclusive host-visible memory for the
// block's lifetime; the block (and thus the pointer) is owned by the
// MemoryManager, which is only ever touched from the primary thread.
unsafe impl Send for MemoryBlock {}

/// A live sub-allocation. `block_id` is a weak link back to its
/// `MemoryBlock` (spec §3's "Ownership model" -- the block is owned
/// exclusively by the `MemoryManager`; this is a reference, not a handle).
#[derive(Copy, Clone, Debug)]
pub struct Allocation {
  block_id: DefaultKey,
  pub offset: u64,
  pub size: u64,
  pub alignment: u64,
}

pub fn align_up(value: u64, alignment: u64) -> u64 {
  if alignment == 0 {
    return value;
  }
  (value + alignment - 1) & !(alignment - 1)
}

/// Block size to allocate when no existing block of the right type fits a
/// request of `size` bytes aligned to `alignment`, given a configured
/// `default_block` size. Spec §8 invariant 6: exhausting the default block
/// must yield a new block sized exactly `max(size + alignment, default_block)`.
pub fn required_block_size(default_block: u64, size: u64, alignment: u64) -> u64 {
  (size + alignment).max(default_block)
}

pub struct MemoryManager {
  device: Arc<Device>,
  memory_properties: vk::PhysicalDeviceMemoryProperties,
  config: MemoryConfig,
  blocks: SlotMap<DefaultKey, MemoryBlock>,
  groups: HashMap<u32, Vec<DefaultKey>>,
}
impl MemoryManager {
  pub fn new(
    device: Arc<Device>, memory_properties: vk::PhysicalDeviceMemoryProperties,
    config: MemoryConfig,
  ) -> Self {
    Self {
      device,
      memory_properties,
      config,
      blocks: SlotMap::new(),
      groups: HashMap::new(),
    }
  }

  /// Resolves a memory-type index whose bit is set in `type_mask` and whose
  /// property flags are a superset of `property_flags`, preferring the
  /// lowest index (spec §4.A step 1).
  pub fn resolve_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties, type_mask: u32,
    property_flags: vk::MemoryPropertyFlags,
  ) -> TerraResult<u32> {
    for i in 0..memory_properties.memory_type_count {
      let type_bit_set = (type_mask & (1 << i)) != 0;
      let has_properties = memory_properties.memory_types[i as usize]
        .property_flags
        .contains(property_flags);
      if type_bit_set && has_properties {
        return Ok(i);
      }
    }
    Err(TerraError::UnsupportedType)
  }

  /// Sub-allocates `size` bytes aligned to `alignment` from a block whose
  /// memory-type index satisfies `type_mask`/`property_flags`, growing the
  /// pool with a fresh block if no existing one has room.
  pub fn allocate(
    &mut self, size: u64, alignment: u64, type_mask: u32, property_flags: vk::MemoryPropertyFlags,
  ) -> TerraResult<Allocation> {
    let memory_type_index =
      Self::resolve_memory_type_index(&self.memory_properties, type_mask, property_flags)?;

    if let Some(block_id) = self.find_block_with_room(memory_type_index, size, alignment) {
      return Ok(self.bump_allocate(block_id, size, alignment));
    }

    let host_visible = property_flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE);
    let default_block = if host_visible {
      self.config.default_cpu_block_size
    } else {
      self.config.default_gpu_block_size
    };
    let block_size = required_block_size(default_block, size, alignment);
    let block_id = self.allocate_block(memory_type_index, block_size, host_visible)?;

    Ok(self.bump_allocate(block_id, size, alignment))
  }

  fn find_block_with_room(&self, memory_type_index: u32, size: u64, alignment: u64) -> Option<DefaultKey> {
    let candidates = self.groups.get(&memory_type_index)?;
    candidates.iter().copied().find(|&block_id| {
      let block = &self.blocks[block_id];
      let aligned_cursor = align_up(block.cursor, alignment);
      aligned_cursor + size <= block.size
    })
  }

  fn bump_allocate(&mut self, block_id: DefaultKey, size: u64, alignment: u64) -> Allocation {
    let block = &mut self.blocks[block_id];
    let offset = align_up(block.cursor, alignment);
    block.cursor = offset + size;
    block.live_allocations += 1;

    Allocation {
      block_id,
      offset,
      size,
      alignment,
    }
  }

  fn allocate_block(
    &mut self, memory_type_index: u32, size: u64, host_visible: bool,
  ) -> TerraResult<DefaultKey> {
    let allocate_info = vk::MemoryAllocateInfo::builder()
      .allocation_size(size)
      .memory_type_index(memory_type_index)
      .build();

    let memory = unsafe { self.device.allocate_memory(&allocate_info, None)? };

    let mapped_ptr = if host_visible {
      let ptr = unsafe {
        self
          .device
          .map_memory(memory, 0, size, vk::MemoryMapFlags::empty())?
      };
      Some(ptr as *mut u8)
    } else {
      None
    };

    let block_id = self.blocks.insert(MemoryBlock {
      memory,
      size,
      memory_type_index,
      mapped_ptr,
      cursor: 0,
      live_allocations: 0,
    });
    self.groups.entry(memory_type_index).or_insert_with(Vec::new).push(block_id);
    Ok(block_id)
  }

  /// Returns the range to the block's free-list bookkeeping. Per spec
  /// §4.A, blocks are destroyed only at manager teardown -- this simply
  /// decrements the live-allocation count used for diagnostics.
  pub fn free(&mut self, allocation: Allocation) {
    if let Some(block) = self.blocks.get_mut(allocation.block_id) {
      block.live_allocations = block.live_allocations.saturating_sub(1);
    }
  }

  pub fn raw_memory(&self, allocation: &Allocation) -> vk::DeviceMemory {
    self.blocks[allocation.block_id].memory
  }

  /// Host pointer to the start of `allocation`, if it lives in a
  /// host-visible block.
  pub fn mapped_ptr(&self, allocation: &Allocation) -> Option<*mut u8> {
    let block = &self.blocks[allocation.block_id];
    block
      .mapped_ptr
      .map(|base| unsafe { base.add(allocation.offset as usize) })
  }

  pub fn block_count(&self) -> usize {
    self.blocks.len()
  }
}
impl Drop for MemoryManager {
  fn drop(&mut self) {
    for (_, block) in self.blocks.iter() {
      unsafe {
        if block.mapped_ptr.is_some() {
          self.device.unmap_memory(block.memory);
        }
        self.device.free_memory(block.memory, None);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn memory_properties_with(
    types: &[(vk::MemoryPropertyFlags, u32)],
  ) -> vk::PhysicalDeviceMemoryProperties {
    let mut properties = vk::PhysicalDeviceMemoryProperties::default();
    properties.memory_type_count = types.len() as u32;
    for (i, &(flags, heap_index)) in types.iter().enumerate() {
      properties.memory_types[i] = vk::MemoryType {
        property_flags: flags,
        heap_index,
      };
    }
    properties
  }

  #[test]
  fn resolve_memory_type_index_prefers_lowest_matching_index() {
    let properties = memory_properties_with(&[
      (vk::MemoryPropertyFlags::HOST_VISIBLE, 0),
      (
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        0,
      ),
    ]);

    let index = MemoryManager::resolve_memory_type_index(
      &properties,
      0b11,
      vk::MemoryPropertyFlags::HOST_VISIBLE,
    )
    .unwrap();
    assert_eq!(index, 0);
  }

  #[test]
  fn resolve_memory_type_index_fails_when_no_type_matches() {
    let properties = memory_properties_with(&[(vk::MemoryPropertyFlags::DEVICE_LOCAL, 0)]);
    let result = MemoryManager::resolve_memory_type_index(
      &properties,
      0b1,
      vk::MemoryPropertyFlags::HOST_VISIBLE,
    );
    assert!(matches!(result, Err(TerraError::UnsupportedType)));
  }

  #[test]
  fn align_up_rounds_to_next_multiple() {
    assert_eq!(align_up(0, 256), 0);
    assert_eq!(align_up(1, 256), 256);
    assert_eq!(align_up(256, 256), 256);
    assert_eq!(align_up(257, 256), 512);
  }

  #[test]
  fn required_block_size_is_max_of_request_and_default() {
    assert_eq!(required_block_size(2 * 1024 * 1024, 100, 16), 2 * 1024 * 1024);
    assert_eq!(
      required_block_size(2 * 1024 * 1024, 2 * 1024 * 1024 + 1, 16),
      2 * 1024 * 1024 + 17
    );
  }
}
