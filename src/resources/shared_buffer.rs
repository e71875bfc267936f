//! `SharedBuffer`: a free-list sub-allocator over a single `Buffer` (spec
//! §4.C), backing the global vertex/index/indirect-argument pools. The
//! teacher has no equivalent (it sub-allocates per-draw buffers through
//! `vk_mem` directly); this is new code grounded on the free-list
//! bookkeeping style of `renderer/buffers_and_images.rs`'s slotmap store
//! (small, Vec-backed, linear-scan data structures rather than a tree).
use crate::{
  error::{TerraError, TerraResult},
  memory::SharedMemoryManager,
  resources::buffer::Buffer,
  staging::StagingBufferManager,
  temporary_data::TemporaryDataBuffer,
};
use ash::{vk, Device};
use std::sync::Arc;

/// A sub-range of a `SharedBuffer`. A value token, not an owning handle --
/// releasing it returns the range to the free-list (spec §3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SharedBufferData {
  pub offset: u64,
  pub size: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct FreeRange {
  offset: u64,
  size: u64,
}

/// Pure free-list bookkeeping, kept separate from any GPU state so it is
/// unit-testable without a device.
#[derive(Default)]
struct FreeList {
  ranges: Vec<FreeRange>,
}
impl FreeList {
  fn new(initial_size: u64) -> Self {
    Self {
      ranges: if initial_size > 0 {
        vec![FreeRange {
          offset: 0,
          size: initial_size,
        }]
      } else {
        vec![]
      },
    }
  }

  /// Finds and splits the first range whose aligned sub-range fits `size`.
  fn take(&mut self, size: u64, alignment: u64) -> Option<SharedBufferData> {
    let position = self.ranges.iter().position(|range| {
      let aligned_offset = crate::memory::device_memory::align_up(range.offset, alignment);
      aligned_offset + size <= range.offset + range.size
    })?;

    let range = self.ranges.remove(position);
    let aligned_offset = crate::memory::device_memory::align_up(range.offset, alignment);
    let leading_waste = aligned_offset - range.offset;
    let consumed_end = aligned_offset + size;
    let trailing = (range.offset + range.size) - consumed_end;

    if leading_waste > 0 {
      self.ranges.push(FreeRange {
        offset: range.offset,
        size: leading_waste,
      });
    }
    if trailing > 0 {
      self.ranges.push(FreeRange {
        offset: consumed_end,
        size: trailing,
      });
    }

    Some(SharedBufferData {
      offset: aligned_offset,
      size,
    })
  }

  /// Returns a range to the list, merging with physically-adjacent
  /// ranges (spec §4.C: "simple linear pass").
  fn give(&mut self, data: SharedBufferData) {
    self.ranges.push(FreeRange {
      offset: data.offset,
      size: data.size,
    });
    self.ranges.sort_by_key(|r| r.offset);

    let mut merged: Vec<FreeRange> = Vec::with_capacity(self.ranges.len());
    for range in self.ranges.drain(..) {
      match merged.last_mut() {
        Some(last) if last.offset + last.size == range.offset => {
          last.size += range.size;
        }
        _ => merged.push(range),
      }
    }
    self.ranges = merged;
  }

  fn extend(&mut self, additional_offset: u64, additional_size: u64) {
    self.give(SharedBufferData {
      offset: additional_offset,
      size: additional_size,
    });
  }

  fn total_free(&self) -> u64 {
    self.ranges.iter().map(|r| r.size).sum()
  }
}

/// Sub-allocator owning exactly one GPU `Buffer`. Grows by doubling (or to
/// exactly `current + size` if that's larger) when no free range fits a
/// reservation, copying old contents forward via the staging manager.
pub struct SharedBuffer {
  device: Arc<Device>,
  memory_manager: SharedMemoryManager,
  usage: vk::BufferUsageFlags,
  property_flags: vk::MemoryPropertyFlags,
  queue_family_indices: Vec<u32>,
  buffer: Buffer,
  free_list: FreeList,
}
impl SharedBuffer {
  pub fn new(
    device: Arc<Device>, memory_manager: SharedMemoryManager, initial_size: u64,
    usage: vk::BufferUsageFlags, property_flags: vk::MemoryPropertyFlags, queue_family_indices: Vec<u32>,
  ) -> TerraResult<Self> {
    let buffer = Buffer::create(
      device.clone(),
      &memory_manager,
      initial_size,
      usage,
      &queue_family_indices,
      property_flags,
    )?;
    Ok(Self {
      device,
      memory_manager,
      usage,
      property_flags,
      queue_family_indices,
      free_list: FreeList::new(initial_size),
      buffer,
    })
  }

  pub fn size(&self) -> u64 {
    self.buffer.size
  }

  pub fn handle(&self) -> vk::Buffer {
    self.buffer.handle
  }

  /// Reserves `size` bytes aligned to `alignment`, growing the underlying
  /// buffer (spec §4.C step 2) if no free range fits.
  pub fn reserve(
    &mut self, size: u64, alignment: u64, staging: &mut StagingBufferManager,
    temp_data: &mut TemporaryDataBuffer, current_frame: usize,
  ) -> TerraResult<SharedBufferData> {
    if size == 0 {
      return Err(TerraError::InvalidArgument("reservation size must be non-zero"));
    }

    if let Some(data) = self.free_list.take(size, alignment) {
      return Ok(data);
    }

    self.grow(size, staging, temp_data, current_frame)?;
    self
      .free_list
      .take(size, alignment)
      .ok_or(TerraError::Internal("SharedBuffer grow did not produce enough room"))
  }

  fn grow(
    &mut self, size: u64, staging: &mut StagingBufferManager, temp_data: &mut TemporaryDataBuffer,
    current_frame: usize,
  ) -> TerraResult<()> {
    let old_size = self.buffer.size;
    let new_size = (old_size * 2).max(old_size + size);

    let mut new_buffer = Buffer::create(
      self.device.clone(),
      &self.memory_manager,
      new_size,
      self.usage | vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC,
      &self.queue_family_indices,
      self.property_flags,
    )?;

    staging.enqueue_buffer_copy(self.buffer.handle, new_buffer.handle, 0, 0, old_size);

    std::mem::swap(&mut self.buffer, &mut new_buffer);
    temp_data.hold_gpu(current_frame, Box::new(new_buffer));

    self.free_list.extend(old_size, new_size - old_size);
    Ok(())
  }

  /// Returns `data` to the free-list, merging with adjacent free ranges.
  pub fn release(&mut self, data: SharedBufferData) {
    self.free_list.give(data);
  }

  pub fn total_free(&self) -> u64 {
    self.free_list.total_free()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn take_and_give_restores_original_free_list() {
    let mut list = FreeList::new(1024);
    let data = list.take(256, 16).unwrap();
    assert_eq!(list.total_free(), 1024 - 256);
    list.give(data);
    assert_eq!(list.total_free(), 1024);
    assert_eq!(list.ranges, vec![FreeRange { offset: 0, size: 1024 }]);
  }

  #[test]
  fn take_respects_alignment() {
    let mut list = FreeList::new(1024);
    let _ = list.take(10, 16).unwrap();
    let data = list.take(16, 16).unwrap();
    assert_eq!(data.offset % 16, 0);
  }

  #[test]
  fn take_fails_when_nothing_fits() {
    let mut list = FreeList::new(8);
    assert!(list.take(16, 1).is_none());
  }

  #[test]
  fn merge_joins_adjacent_ranges_after_multiple_releases() {
    let mut list = FreeList::new(300);
    let a = list.take(100, 1).unwrap();
    let b = list.take(100, 1).unwrap();
    let c = list.take(100, 1).unwrap();
    list.give(b);
    list.give(a);
    list.give(c);
    assert_eq!(list.ranges, vec![FreeRange { offset: 0, size: 300 }]);
  }

  #[test]
  fn reserved_plus_free_always_equals_total_size() {
    let mut list = FreeList::new(500);
    let mut reserved = vec![];
    reserved.push(list.take(50, 8).unwrap());
    reserved.push(list.take(120, 8).unwrap());
    let total_reserved: u64 = reserved.iter().map(|r| r.size).sum();
    assert_eq!(total_reserved + list.total_free(), 500);
  }
}
