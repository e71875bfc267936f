//! Fence ring (spec §4.K): "a ring of N objects where N = bufferCount.
//! `WaitForFront()` blocks on the head; `ResetFront()` clears it;
//! `AdvanceInQueue()` rotates." Grounded on the teacher's
//! `draw_synchronization.rs::frame_fences`, generalized from a fixed
//! `MAX_FRAMES_IN_FLIGHT` array to a ring sized by the configured
//! `buffer_count` (spec §8 boundary: bufferCount ∈ {1, 2, 3}).
use crate::error::TerraResult;
use ash::{version::DeviceV1_0, vk, Device};
use std::sync::Arc;

/// Fences created `SIGNALED` so the first `wait_for_front` on an
/// unsubmitted slot does not deadlock (spec §5 "Deadlock avoidance").
pub struct FenceQueue {
  device: Arc<Device>,
  fences: Vec<vk::Fence>,
  front: usize,
}
impl FenceQueue {
  pub fn new(device: Arc<Device>, count: usize) -> TerraResult<Self> {
    let fence_ci = vk::FenceCreateInfo::builder()
      .flags(vk::FenceCreateFlags::SIGNALED)
      .build();
    let mut fences = Vec::with_capacity(count);
    for _ in 0..count {
      fences.push(unsafe { device.create_fence(&fence_ci, None)? });
    }
    Ok(Self {
      device,
      fences,
      front: 0,
    })
  }

  pub fn front(&self) -> vk::Fence {
    self.fences[self.front]
  }

  pub fn wait_for_front(&self) -> TerraResult<()> {
    unsafe {
      self
        .device
        .wait_for_fences(&[self.front()], true, u64::max_value())?;
    }
    Ok(())
  }

  pub fn reset_front(&self) -> TerraResult<()> {
    unsafe { self.device.reset_fences(&[self.front()])? };
    Ok(())
  }

  pub fn advance(&mut self) {
    self.front = (self.front + 1) % self.fences.len();
  }

  pub fn len(&self) -> usize {
    self.fences.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fences.is_empty()
  }
}
impl Drop for FenceQueue {
  fn drop(&mut self) {
    unsafe {
      self
        .device
        .wait_for_fences(&self.fences, true, u64::max_value())
        .ok();
      for &fence in &self.fences {
        self.device.destroy_fence(fence, None);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn advance_wraps_around_ring_length() {
    // Exercise the pure index arithmetic without a device.
    let mut front = 0usize;
    let len = 3usize;
    for expected in [1, 2, 0, 1] {
      front = (front + 1) % len;
      assert_eq!(front, expected);
    }
  }
}
