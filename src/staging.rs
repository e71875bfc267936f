//! `StagingBufferManager` (spec §4.D): batches host→device uploads and the
//! device→device copies `SharedBuffer` growth needs, recording them onto a
//! transfer-queue command buffer with matching release/acquire barriers for
//! the graphics queue. Grounded on the teacher's
//! `VulkanBufferFunctions::{create_staging_buffer, transfer_staging_to_gpu_buffer_or_image,
//! insert_layout_transition_barrier}` (`renderer/vulkan/vulkan_buffer_image_functions.rs`),
//! generalized from "one staging buffer per transfer, waited on immediately"
//! to "batch every upload for this frame, flush once".
use crate::{
  error::TerraResult,
  resources::buffer::Buffer,
  temporary_data::TemporaryDataBuffer,
  thread_pool::JobPool,
};
use ash::{version::DeviceV1_0, vk, Device};
use std::sync::Arc;

/// Raw pointer into the staging arena's mapped memory. `Send` because the
/// byte range each job writes is disjoint and reserved before the job is
/// submitted (spec §5: "its per-pending-copy memcpy jobs touch disjoint
/// byte ranges").
struct StagingWritePtr(*mut u8);
unsafe impl Send for StagingWritePtr {}

struct PendingHostBufferCopy {
  staging_offset: u64,
  size: u64,
  dst_buffer: vk::Buffer,
  dst_offset: u64,
}

struct PendingHostImageCopy {
  staging_offset: u64,
  dst_image: vk::Image,
  extent: vk::Extent2D,
  format: vk::Format,
}

struct PendingDeviceBufferCopy {
  src_buffer: vk::Buffer,
  dst_buffer: vk::Buffer,
  src_offset: u64,
  dst_offset: u64,
  size: u64,
}

/// A simple bump-allocated host-visible arena. Replaced wholesale (not
/// grown in place) when it's too small; nothing has been submitted to the
/// GPU yet at that point so the old buffer can simply be dropped.
struct StagingArena {
  buffer: Buffer,
  cursor: u64,
}
impl StagingArena {
  fn reserve(&mut self, size: u64, alignment: u64) -> Option<u64> {
    let aligned = crate::memory::device_memory::align_up(self.cursor, alignment);
    if aligned + size > self.buffer.size {
      return None;
    }
    self.cursor = aligned + size;
    Some(aligned)
  }
}

/// Collects pending uploads for one frame; `flush` records them onto
/// caller-supplied command buffers but does not submit (the engine owns
/// submission, per spec §4.M step 4).
pub struct StagingBufferManager {
  device: Arc<Device>,
  memory_manager: crate::memory::SharedMemoryManager,
  graphics_queue_family: u32,
  transfer_queue_family: u32,
  arena: StagingArena,
  pending_host_buffer_copies: Vec<PendingHostBufferCopy>,
  pending_host_image_copies: Vec<PendingHostImageCopy>,
  pending_device_buffer_copies: Vec<PendingDeviceBufferCopy>,
}
impl StagingBufferManager {
  pub fn new(
    device: Arc<Device>, memory_manager: crate::memory::SharedMemoryManager, graphics_queue_family: u32,
    transfer_queue_family: u32, initial_arena_size: u64,
  ) -> TerraResult<Self> {
    let queue_family_indices = [transfer_queue_family];
    let buffer = Buffer::create(
      device.clone(),
      &memory_manager,
      initial_arena_size,
      vk::BufferUsageFlags::TRANSFER_SRC,
      &queue_family_indices,
      vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    Ok(Self {
      device,
      memory_manager,
      graphics_queue_family,
      transfer_queue_family,
      arena: StagingArena { buffer, cursor: 0 },
      pending_host_buffer_copies: Vec::new(),
      pending_host_image_copies: Vec::new(),
      pending_device_buffer_copies: Vec::new(),
    })
  }

  fn grow_arena(&mut self, required_additional: u64) -> TerraResult<()> {
    let new_size = (self.arena.buffer.size * 2).max(self.arena.cursor + required_additional);
    let queue_family_indices = [self.transfer_queue_family];
    let mut new_buffer = Buffer::create(
      self.device.clone(),
      &self.memory_manager,
      new_size,
      vk::BufferUsageFlags::TRANSFER_SRC,
      &queue_family_indices,
      vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;

    if let (Some(src), Some(dst)) = (self.arena.buffer.mapped_ptr(), new_buffer.mapped_ptr()) {
      unsafe { std::ptr::copy_nonoverlapping(src, dst, self.arena.cursor as usize) };
    }
    std::mem::swap(&mut self.arena.buffer, &mut new_buffer);
    // `new_buffer` now holds the superseded arena; nothing GPU-side has
    // referenced it yet, so it is safe to drop here rather than defer to
    // TemporaryDataBuffer.
    Ok(())
  }

  /// Enqueues a host→buffer upload (spec's `Enqueue`). The memcpy into the
  /// staging arena runs on `job_pool`; `flush` waits for it before
  /// recording the device-side copy.
  pub fn enqueue_buffer_upload(
    &mut self, bytes: &[u8], dst_buffer: vk::Buffer, dst_offset: u64, job_pool: &dyn JobPool,
  ) -> TerraResult<()> {
    if bytes.is_empty() {
      return Ok(());
    }
    let size = bytes.len() as u64;
    let staging_offset = self.reserve_arena_range(size, 4)?;

    self.pending_host_buffer_copies.push(PendingHostBufferCopy {
      staging_offset,
      size,
      dst_buffer,
      dst_offset,
    });
    self.submit_memcpy_job(staging_offset, bytes.to_vec(), job_pool);
    Ok(())
  }

  /// Enqueues a host→image upload (spec's `EnqueueTexture`).
  pub fn enqueue_texture_upload(
    &mut self, pixels: &[u8], dst_image: vk::Image, extent: vk::Extent2D, format: vk::Format,
    job_pool: &dyn JobPool,
  ) -> TerraResult<()> {
    if pixels.is_empty() {
      return Ok(());
    }
    let size = pixels.len() as u64;
    let staging_offset = self.reserve_arena_range(size, 4)?;

    self.pending_host_image_copies.push(PendingHostImageCopy {
      staging_offset,
      dst_image,
      extent,
      format,
    });
    self.submit_memcpy_job(staging_offset, pixels.to_vec(), job_pool);
    Ok(())
  }

  /// Enqueues a device→device buffer copy, used by [`SharedBuffer`](crate::resources::shared_buffer::SharedBuffer)
  /// growth to carry old contents into a newly grown buffer. No staging
  /// arena involved; recorded alongside the host uploads at `flush`.
  pub fn enqueue_buffer_copy(&mut self, src_buffer: vk::Buffer, dst_buffer: vk::Buffer, src_offset: u64, dst_offset: u64, size: u64) {
    self.pending_device_buffer_copies.push(PendingDeviceBufferCopy {
      src_buffer,
      dst_buffer,
      src_offset,
      dst_offset,
      size,
    });
  }

  fn reserve_arena_range(&mut self, size: u64, alignment: u64) -> TerraResult<u64> {
    if let Some(offset) = self.arena.reserve(size, alignment) {
      return Ok(offset);
    }
    self.grow_arena(size)?;
    Ok(
      self
        .arena
        .reserve(size, alignment)
        .expect("staging arena grow did not produce enough room"),
    )
  }

  fn submit_memcpy_job(&self, staging_offset: u64, bytes: Vec<u8>, job_pool: &dyn JobPool) {
    let base = StagingWritePtr(self.arena.buffer.mapped_ptr().expect("staging arena must be host-visible"));

    job_pool.submit(Box::new(move || {
      let base = base;
      unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), base.0.add(staging_offset as usize), bytes.len());
      }
    }));
  }

  pub fn pending_is_empty(&self) -> bool {
    self.pending_host_buffer_copies.is_empty()
      && self.pending_host_image_copies.is_empty()
      && self.pending_device_buffer_copies.is_empty()
  }

  /// Records every pending copy. Step 1: wait for in-flight memcpy jobs.
  /// Steps 2-4: record transfer-queue copies/transitions then matching
  /// graphics-queue acquire barriers for images (device-to-device buffer
  /// copies need no ownership dance; they stay on the transfer family).
  /// Step 5: clear the pending lists and hand the staging arena to
  /// `temp_data` for this frame, replacing it with a fresh one.
  ///
  /// Returns `true` if anything was recorded (the caller only needs to
  /// submit `transfer_cmd` when this is `true`, per spec §4.M step 4).
  pub fn flush(
    &mut self, transfer_cmd: vk::CommandBuffer, graphics_cmd: vk::CommandBuffer, job_pool: &dyn JobPool,
    temp_data: &mut TemporaryDataBuffer, current_frame: usize,
  ) -> TerraResult<bool> {
    if self.pending_is_empty() {
      return Ok(false);
    }
    job_pool.wait_all();

    let staging_handle = self.arena.buffer.handle;

    unsafe {
      for copy in &self.pending_host_buffer_copies {
        let region = vk::BufferCopy::builder()
          .src_offset(copy.staging_offset)
          .dst_offset(copy.dst_offset)
          .size(copy.size)
          .build();
        self.device.cmd_copy_buffer(transfer_cmd, staging_handle, copy.dst_buffer, &[region]);
      }

      for copy in &self.pending_device_buffer_copies {
        let region = vk::BufferCopy::builder()
          .src_offset(copy.src_offset)
          .dst_offset(copy.dst_offset)
          .size(copy.size)
          .build();
        self.device.cmd_copy_buffer(transfer_cmd, copy.src_buffer, copy.dst_buffer, &[region]);
      }

      for copy in &self.pending_host_image_copies {
        self.transition_image_layout(
          transfer_cmd,
          copy.dst_image,
          vk::ImageLayout::UNDEFINED,
          vk::ImageLayout::TRANSFER_DST_OPTIMAL,
          vk::QUEUE_FAMILY_IGNORED,
          vk::QUEUE_FAMILY_IGNORED,
        );

        let subresource = vk::ImageSubresourceLayers::builder()
          .aspect_mask(vk::ImageAspectFlags::COLOR)
          .mip_level(0)
          .base_array_layer(0)
          .layer_count(1)
          .build();
        let region = vk::BufferImageCopy::builder()
          .buffer_offset(copy.staging_offset)
          .buffer_row_length(0)
          .buffer_image_height(0)
          .image_subresource(subresource)
          .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
          .image_extent(vk::Extent3D {
            width: copy.extent.width,
            height: copy.extent.height,
            depth: 1,
          })
          .build();
        self.device.cmd_copy_buffer_to_image(
          transfer_cmd,
          staging_handle,
          copy.dst_image,
          vk::ImageLayout::TRANSFER_DST_OPTIMAL,
          &[region],
        );

        // Release on the transfer family; the matching acquire barrier is
        // recorded on graphics_cmd below if the families differ.
        let (src_family, dst_family) = if self.graphics_queue_family != self.transfer_queue_family {
          (self.transfer_queue_family, self.graphics_queue_family)
        } else {
          (vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED)
        };
        self.transition_image_layout(
          transfer_cmd,
          copy.dst_image,
          vk::ImageLayout::TRANSFER_DST_OPTIMAL,
          vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
          src_family,
          dst_family,
        );

        if self.graphics_queue_family != self.transfer_queue_family {
          self.transition_image_layout(
            graphics_cmd,
            copy.dst_image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            self.transfer_queue_family,
            self.graphics_queue_family,
          );
        }
      }
    }

    self.pending_host_buffer_copies.clear();
    self.pending_host_image_copies.clear();
    self.pending_device_buffer_copies.clear();

    let spent_arena = {
      let fresh = Buffer::create(
        self.device.clone(),
        &self.memory_manager,
        self.arena.buffer.size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        &[self.transfer_queue_family],
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
      )?;
      self.arena.cursor = 0;
      std::mem::replace(&mut self.arena.buffer, fresh)
    };
    temp_data.hold_gpu(current_frame, Box::new(spent_arena));

    Ok(true)
  }

  unsafe fn transition_image_layout(
    &self, cmd: vk::CommandBuffer, image: vk::Image, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout,
    src_queue_family: u32, dst_queue_family: u32,
  ) {
    let (source_stage, source_access, destination_stage, destination_access) =
      match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
          vk::PipelineStageFlags::TOP_OF_PIPE,
          vk::AccessFlags::empty(),
          vk::PipelineStageFlags::TRANSFER,
          vk::AccessFlags::TRANSFER_WRITE,
        ),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
          vk::PipelineStageFlags::TRANSFER,
          vk::AccessFlags::TRANSFER_WRITE,
          vk::PipelineStageFlags::FRAGMENT_SHADER,
          vk::AccessFlags::SHADER_READ,
        ),
        _ => unreachable!("staging only performs UNDEFINED->TRANSFER_DST->SHADER_READ_ONLY transitions"),
      };

    let subresource_range = vk::ImageSubresourceRange::builder()
      .aspect_mask(vk::ImageAspectFlags::COLOR)
      .base_mip_level(0)
      .level_count(1)
      .base_array_layer(0)
      .layer_count(1)
      .build();
    let barriers = [vk::ImageMemoryBarrier::builder()
      .old_layout(old_layout)
      .new_layout(new_layout)
      .src_queue_family_index(src_queue_family)
      .dst_queue_family_index(dst_queue_family)
      .image(image)
      .subresource_range(subresource_range)
      .src_access_mask(source_access)
      .dst_access_mask(destination_access)
      .build()];
    self.device.cmd_pipeline_barrier(
      cmd,
      source_stage,
      destination_stage,
      vk::DependencyFlags::empty(),
      &[],
      &[],
      &barriers,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn arena_reserve_bumps_cursor_and_respects_alignment() {
    // Exercises the pure bump-allocation logic without a device by
    // constructing the cursor math directly.
    let mut cursor = 0u64;
    let capacity = 128u64;
    let reserve = |cursor: &mut u64, size: u64, alignment: u64| -> Option<u64> {
      let aligned = crate::memory::device_memory::align_up(*cursor, alignment);
      if aligned + size > capacity {
        return None;
      }
      *cursor = aligned + size;
      Some(aligned)
    };

    let a = reserve(&mut cursor, 10, 16).unwrap();
    assert_eq!(a, 0);
    let b = reserve(&mut cursor, 10, 16).unwrap();
    assert_eq!(b, 16);
    assert!(reserve(&mut cursor, 200, 16).is_none());
  }
}
