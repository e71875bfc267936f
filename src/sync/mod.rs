//! `CommandQueue`/`CommandBuffer` and the fence/semaphore rings (spec
//! §4.K). See submodule docs for the grounding of each piece.
pub mod command;
pub mod fence_queue;
pub mod semaphore_queue;

pub use command::{CommandPool, CommandQueue};
pub use fence_queue::FenceQueue;
pub use semaphore_queue::SemaphoreQueue;

/// One frame slot's synchronization primitives (spec §3 `FrameSlot`):
/// a fence signaling graphics-queue completion, an image-available
/// semaphore, and a render-finished semaphore. `FrameSync` owns one ring
/// of each, indexed by the current frame slot. `compute_done` has no
/// teacher equivalent either (alongside `transfer_done`) -- `VS-indirect`'s
/// culling dispatch runs on the compute queue ahead of the graphics
/// submission and the graphics submission must wait on it.
pub struct FrameSync {
  pub graphics_fence: FenceQueue,
  pub image_available: SemaphoreQueue,
  pub render_finished: SemaphoreQueue,
  pub transfer_done: SemaphoreQueue,
  pub compute_done: SemaphoreQueue,
}
impl FrameSync {
  pub fn new(
    device: std::sync::Arc<ash::Device>, buffer_count: usize,
  ) -> crate::error::TerraResult<Self> {
    Ok(Self {
      graphics_fence: FenceQueue::new(device.clone(), buffer_count)?,
      image_available: SemaphoreQueue::new(device.clone(), buffer_count)?,
      render_finished: SemaphoreQueue::new(device.clone(), buffer_count)?,
      transfer_done: SemaphoreQueue::new(device.clone(), buffer_count)?,
      compute_done: SemaphoreQueue::new(device, buffer_count)?,
    })
  }

  /// Advances every ring's front index together -- all five rings share one
  /// frame-slot cadence (spec §4.K "Fence queue and Semaphore queue").
  pub fn advance(&mut self) {
    self.graphics_fence.advance();
    self.image_available.advance();
    self.render_finished.advance();
    self.transfer_done.advance();
    self.compute_done.advance();
  }
}
