//! Command pools and buffers: "one pool per (queue-family, frame-slot);
//! reset per-slot each time that slot is reused" (spec §4.K). Grounded on
//! the implicit single command-pool-per-frame pattern in the teacher's
//! `vulkan_renderer.rs` (`command_pool`/`command_buffers` fields),
//! generalized to one pool per queue family since Terra submits to
//! graphics, transfer, and compute queues independently.
use crate::error::TerraResult;
use ash::{version::DeviceV1_0, vk, Device};
use std::sync::Arc;

/// One `vk::CommandPool` plus `count` primary command buffers, one per
/// frame slot. `reset(i)` clears slot `i`'s buffer for re-recording.
pub struct CommandPool {
  device: Arc<Device>,
  pool: vk::CommandPool,
  buffers: Vec<vk::CommandBuffer>,
}
impl CommandPool {
  pub fn new(device: Arc<Device>, queue_family_index: u32, count: usize) -> TerraResult<Self> {
    let pool_ci = vk::CommandPoolCreateInfo::builder()
      .queue_family_index(queue_family_index)
      .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
      .build();
    let pool = unsafe { device.create_command_pool(&pool_ci, None)? };

    let alloc_info = vk::CommandBufferAllocateInfo::builder()
      .command_pool(pool)
      .level(vk::CommandBufferLevel::PRIMARY)
      .command_buffer_count(count as u32)
      .build();
    let buffers = unsafe { device.allocate_command_buffers(&alloc_info)? };

    Ok(Self {
      device,
      pool,
      buffers,
    })
  }

  pub fn get(&self, slot: usize) -> vk::CommandBuffer {
    self.buffers[slot]
  }

  /// Resets slot `i`'s command buffer so it can be recorded again (spec
  /// §4.M step 3).
  pub fn reset(&self, slot: usize) -> TerraResult<()> {
    unsafe {
      self
        .device
        .reset_command_buffer(self.buffers[slot], vk::CommandBufferResetFlags::empty())?;
    }
    Ok(())
  }

  pub fn begin(&self, slot: usize) -> TerraResult<()> {
    let begin_info = vk::CommandBufferBeginInfo::builder()
      .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
      .build();
    unsafe {
      self.device.begin_command_buffer(self.buffers[slot], &begin_info)?;
    }
    Ok(())
  }

  pub fn end(&self, slot: usize) -> TerraResult<()> {
    unsafe { self.device.end_command_buffer(self.buffers[slot])? };
    Ok(())
  }
}
impl Drop for CommandPool {
  fn drop(&mut self) {
    unsafe {
      self.device.destroy_command_pool(self.pool, None);
    }
  }
}

/// Thin wrapper over `vkQueueSubmit`/`vkQueuePresentKHR` (spec §4.K
/// `CommandQueue.Submit`/`Present`). Presentation itself is issued through
/// [`Swapchain::present`](crate::swapchain::Swapchain::present); this type
/// covers the submit half shared by all three queues.
pub struct CommandQueue {
  device: Arc<Device>,
  pub queue: vk::Queue,
}
impl CommandQueue {
  pub fn new(device: Arc<Device>, queue: vk::Queue) -> Self {
    Self { device, queue }
  }

  /// Submits one command buffer, waiting on `waits` at the corresponding
  /// `wait_stages`, signaling `signals`, and signaling `fence` on
  /// completion.
  pub fn submit(
    &self, command_buffer: vk::CommandBuffer, waits: &[vk::Semaphore], wait_stages: &[vk::PipelineStageFlags],
    signals: &[vk::Semaphore], fence: vk::Fence,
  ) -> TerraResult<()> {
    let command_buffers = [command_buffer];
    let submit_info = vk::SubmitInfo::builder()
      .wait_semaphores(waits)
      .wait_dst_stage_mask(wait_stages)
      .command_buffers(&command_buffers)
      .signal_semaphores(signals)
      .build();
    unsafe {
      self.device.queue_submit(self.queue, &[submit_info], fence)?;
    }
    Ok(())
  }

  pub fn wait_idle(&self) -> TerraResult<()> {
    unsafe { self.device.queue_wait_idle(self.queue)? };
    Ok(())
  }
}
