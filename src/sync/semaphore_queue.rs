//! Semaphore ring, the binary-semaphore sibling of
//! [`FenceQueue`](crate::sync::fence_queue::FenceQueue) (spec §4.K).
//! Grounded on the teacher's `draw_synchronization.rs`
//! `image_available_semaphores`/`render_finished_semaphores` pair,
//! generalized into one reusable ring type used for both roles (and for
//! the transfer-queue-done semaphore the teacher has no equivalent of,
//! needed here for the staging release/acquire ordering guarantee in
//! spec §4.K).
use crate::error::TerraResult;
use ash::{version::DeviceV1_0, vk, Device};
use std::sync::Arc;

pub struct SemaphoreQueue {
  device: Arc<Device>,
  semaphores: Vec<vk::Semaphore>,
  front: usize,
}
impl SemaphoreQueue {
  pub fn new(device: Arc<Device>, count: usize) -> TerraResult<Self> {
    let semaphore_ci = vk::SemaphoreCreateInfo::default();
    let mut semaphores = Vec::with_capacity(count);
    for _ in 0..count {
      semaphores.push(unsafe { device.create_semaphore(&semaphore_ci, None)? });
    }
    Ok(Self {
      device,
      semaphores,
      front: 0,
    })
  }

  pub fn front(&self) -> vk::Semaphore {
    self.semaphores[self.front]
  }

  pub fn advance(&mut self) {
    self.front = (self.front + 1) % self.semaphores.len();
  }

  pub fn len(&self) -> usize {
    self.semaphores.len()
  }

  pub fn is_empty(&self) -> bool {
    self.semaphores.is_empty()
  }
}
impl Drop for SemaphoreQueue {
  fn drop(&mut self) {
    unsafe {
      for &semaphore in &self.semaphores {
        self.device.destroy_semaphore(semaphore, None);
      }
    }
  }
}
