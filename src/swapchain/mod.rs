//! Swapchain negotiation, render pass, and framebuffers (spec §4.L).
//! Grounded on the teacher's `vulkan_renderer/render_targets.rs`
//! (`RenderTargetBundle`) for format/present-mode/extent negotiation and
//! acquire/present, and `vulkan_renderer/pipelines.rs` for framebuffer
//! creation, merged into one owner since Terra's `RenderEngine` always
//! needs both together.
pub mod depth;
pub mod render_pass;

use crate::{
  config::PresentMode,
  error::{TerraError, TerraResult},
  swapchain::depth::DepthAttachment,
  vulkan_core::device::QueueFamilyIndices,
};
use ash::{version::DeviceV1_0, vk, Device, Instance};
use log::warn;
use std::sync::Arc;

/// One swapchain image's view, recreated whenever the swapchain is.
pub struct RenderTarget {
  pub image: vk::Image,
  pub view: vk::ImageView,
}

pub struct Swapchain {
  instance: Arc<Instance>,
  device: Arc<Device>,
  memory_manager: crate::memory::SharedMemoryManager,
  swapchain_functions: ash::extensions::khr::Swapchain,
  surface_functions: ash::extensions::khr::Surface,
  surface: vk::SurfaceKHR,
  physical_device: vk::PhysicalDevice,
  queue_family_indices: QueueFamilyIndices,
  requested_buffer_count: u32,

  pub handle: vk::SwapchainKHR,
  pub format: vk::Format,
  pub extent: vk::Extent2D,
  pub render_targets: Vec<RenderTarget>,
  pub render_pass: vk::RenderPass,
  pub depth_attachment: DepthAttachment,
  pub framebuffers: Vec<vk::Framebuffer>,
}
impl Swapchain {
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    instance: Arc<Instance>, device: Arc<Device>, memory_manager: crate::memory::SharedMemoryManager,
    physical_device: vk::PhysicalDevice, surface_functions: ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR, queue_family_indices: QueueFamilyIndices, requested_width: u32,
    requested_height: u32, requested_present_mode: PresentMode, requested_buffer_count: u32,
  ) -> TerraResult<Self> {
    let swapchain_functions = ash::extensions::khr::Swapchain::new(instance.as_ref(), device.as_ref());

    let (handle, format, extent) = Self::create_swapchain(
      &instance,
      &swapchain_functions,
      &surface_functions,
      surface,
      physical_device,
      &queue_family_indices,
      requested_width,
      requested_height,
      requested_present_mode,
      requested_buffer_count,
      None,
    )?;

    let render_targets =
      Self::create_render_targets(&device, &swapchain_functions, handle, format)?;
    let render_pass = render_pass::create_forward_render_pass(&device, format)?;
    let depth_attachment = DepthAttachment::new(device.clone(), &memory_manager, extent)?;
    let framebuffers =
      Self::create_framebuffers(&device, render_pass, &render_targets, &depth_attachment, extent)?;

    Ok(Self {
      instance,
      device,
      memory_manager,
      swapchain_functions,
      surface_functions,
      surface,
      physical_device,
      queue_family_indices,
      requested_buffer_count,
      handle,
      format,
      extent,
      render_targets,
      render_pass,
      depth_attachment,
      framebuffers,
    })
  }

  /// Acquires the next presentable image, signaling `image_available`.
  /// Returns `(image_index, suboptimal)`; a `SUBOPTIMAL_KHR`/
  /// `ERROR_OUT_OF_DATE_KHR` result surfaces as `TerraError::SwapchainStale`
  /// via `From<vk::Result>` (spec §4.M "Failure handling").
  pub fn acquire_next_image(&self, image_available: vk::Semaphore) -> TerraResult<(u32, bool)> {
    unsafe {
      Ok(self.swapchain_functions.acquire_next_image(
        self.handle,
        u64::max_value(),
        image_available,
        vk::Fence::null(),
      )?)
    }
  }

  /// Presents `image_index`, waiting on `wait_semaphore` (spec §4.K
  /// `CommandQueue.Present`).
  pub fn present(
    &self, presentation_queue: vk::Queue, image_index: u32, wait_semaphore: vk::Semaphore,
  ) -> TerraResult<()> {
    let swapchains = [self.handle];
    let image_indices = [image_index];
    let wait_semaphores = [wait_semaphore];
    let present_info = vk::PresentInfoKHR::builder()
      .wait_semaphores(&wait_semaphores)
      .swapchains(&swapchains)
      .image_indices(&image_indices)
      .build();
    unsafe {
      self
        .swapchain_functions
        .queue_present(presentation_queue, &present_info)?;
    }
    Ok(())
  }

  /// Resize (spec §4.L): wait device idle (caller's responsibility, as
  /// `Renderer::resize` does before calling this), destroy framebuffers /
  /// image views / swapchain / depth, recreate in reverse order.
  pub fn resize(&mut self, width: u32, height: u32, requested_present_mode: PresentMode) -> TerraResult<()> {
    if width == 0 || height == 0 {
      return Err(TerraError::InvalidResizeExtent);
    }

    unsafe {
      for &framebuffer in &self.framebuffers {
        self.device.destroy_framebuffer(framebuffer, None);
      }
      for target in &self.render_targets {
        self.device.destroy_image_view(target.view, None);
      }
    }
    let old_swapchain = self.handle;

    let (handle, format, extent) = Self::create_swapchain(
      &self.instance,
      &self.swapchain_functions,
      &self.surface_functions,
      self.surface,
      self.physical_device,
      &self.queue_family_indices,
      width,
      height,
      requested_present_mode,
      self.requested_buffer_count,
      Some(old_swapchain),
    )?;
    unsafe {
      self.swapchain_functions.destroy_swapchain(old_swapchain, None);
    }

    self.render_targets =
      Self::create_render_targets(&self.device, &self.swapchain_functions, handle, format)?;
    self.depth_attachment = DepthAttachment::new(self.device.clone(), &self.memory_manager, extent)?;
    self.framebuffers = Self::create_framebuffers(
      &self.device,
      self.render_pass,
      &self.render_targets,
      &self.depth_attachment,
      extent,
    )?;

    self.handle = handle;
    self.format = format;
    self.extent = extent;
    Ok(())
  }

  #[allow(clippy::too_many_arguments)]
  fn create_swapchain(
    instance: &Instance, swapchain_functions: &ash::extensions::khr::Swapchain,
    surface_functions: &ash::extensions::khr::Surface, surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice, queue_family_indices: &QueueFamilyIndices,
    requested_width: u32, requested_height: u32, requested_present_mode: PresentMode,
    requested_buffer_count: u32, old_swapchain: Option<vk::SwapchainKHR>,
  ) -> TerraResult<(vk::SwapchainKHR, vk::Format, vk::Extent2D)> {
    let (capabilities, formats, present_modes) = crate::vulkan_core::device::VulkanDevice::query_swap_chain_support(
      instance,
      physical_device,
      surface_functions,
      surface,
    )?;

    let surface_format = Self::choose_surface_format(&formats);
    let present_mode = Self::choose_present_mode(&present_modes, requested_present_mode);
    let extent = Self::choose_extent(&capabilities, requested_width, requested_height);

    let min_image_count = Self::choose_image_count(&capabilities, requested_buffer_count);

    let distinct_families = queue_family_indices.distinct_families();
    let sharing_mode = if distinct_families.len() > 1 {
      vk::SharingMode::CONCURRENT
    } else {
      vk::SharingMode::EXCLUSIVE
    };

    let mut swapchain_ci = vk::SwapchainCreateInfoKHR::builder()
      .surface(surface)
      .min_image_count(min_image_count)
      .image_format(surface_format.format)
      .image_color_space(surface_format.color_space)
      .image_extent(extent)
      .image_array_layers(1)
      .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
      .image_sharing_mode(sharing_mode)
      .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
      .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
      .present_mode(present_mode)
      .clipped(true)
      .old_swapchain(old_swapchain.unwrap_or_else(vk::SwapchainKHR::null));
    if sharing_mode == vk::SharingMode::CONCURRENT {
      swapchain_ci = swapchain_ci.queue_family_indices(&distinct_families);
    }

    let handle = unsafe { swapchain_functions.create_swapchain(&swapchain_ci.build(), None)? };
    Ok((handle, surface_format.format, extent))
  }

  /// Prefers `B8G8R8A8_UNORM`/`SRGB_NONLINEAR` (spec §4.L); falls back to
  /// whatever the surface offers first.
  fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    available
      .iter()
      .find(|f| f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
      .or_else(|| available.iter().find(|f| f.format == vk::Format::B8G8R8A8_SRGB))
      .copied()
      .unwrap_or(available[0])
  }

  /// Prefers `MAILBOX`, falling back to `FIFO` (spec §4.L); `FIFO` is
  /// universally supported so this never fails to find a mode.
  fn choose_present_mode(
    available: &[vk::PresentModeKHR], requested: PresentMode,
  ) -> vk::PresentModeKHR {
    let wanted = match requested {
      PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
      PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
      PresentMode::Fifo => vk::PresentModeKHR::FIFO,
    };
    if available.contains(&wanted) {
      wanted
    } else {
      vk::PresentModeKHR::FIFO
    }
  }

  /// `image count = max(requested buffer count, min supported)` (spec
  /// §4.L), capped by whatever the surface reports as its max (`0` means
  /// unbounded).
  fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, requested_buffer_count: u32) -> u32 {
    let max_image_count = if capabilities.max_image_count == 0 {
      u32::max_value()
    } else {
      capabilities.max_image_count
    };
    requested_buffer_count.max(capabilities.min_image_count).min(max_image_count)
  }

  fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR, requested_width: u32, requested_height: u32,
  ) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::max_value() {
      return capabilities.current_extent;
    }
    let width = requested_width
      .min(capabilities.max_image_extent.width)
      .max(capabilities.min_image_extent.width);
    let height = requested_height
      .min(capabilities.max_image_extent.height)
      .max(capabilities.min_image_extent.height);
    if width != requested_width || height != requested_height {
      warn!(
        "requested swapchain extent {}x{} clamped to {}x{} by surface capabilities",
        requested_width, requested_height, width, height
      );
    }
    vk::Extent2D { width, height }
  }

  fn create_render_targets(
    device: &Device, swapchain_functions: &ash::extensions::khr::Swapchain, handle: vk::SwapchainKHR,
    format: vk::Format,
  ) -> TerraResult<Vec<RenderTarget>> {
    let images = unsafe { swapchain_functions.get_swapchain_images(handle)? };
    let mut render_targets = Vec::with_capacity(images.len());
    for image in images {
      let view_ci = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(vk::ImageSubresourceRange {
          aspect_mask: vk::ImageAspectFlags::COLOR,
          base_mip_level: 0,
          level_count: 1,
          base_array_layer: 0,
          layer_count: 1,
        })
        .build();
      let view = unsafe { device.create_image_view(&view_ci, None)? };
      render_targets.push(RenderTarget { image, view });
    }
    Ok(render_targets)
  }

  fn create_framebuffers(
    device: &Device, render_pass: vk::RenderPass, render_targets: &[RenderTarget],
    depth_attachment: &DepthAttachment, extent: vk::Extent2D,
  ) -> TerraResult<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(render_targets.len());
    for target in render_targets {
      let attachments = [target.view, depth_attachment.view];
      let framebuffer_ci = vk::FramebufferCreateInfo::builder()
        .render_pass(render_pass)
        .attachments(&attachments)
        .width(extent.width)
        .height(extent.height)
        .layers(1)
        .build();
      framebuffers.push(unsafe { device.create_framebuffer(&framebuffer_ci, None)? });
    }
    Ok(framebuffers)
  }

  pub fn image_count(&self) -> usize {
    self.render_targets.len()
  }
}
impl Drop for Swapchain {
  fn drop(&mut self) {
    unsafe {
      for &framebuffer in &self.framebuffers {
        self.device.destroy_framebuffer(framebuffer, None);
      }
      self.device.destroy_render_pass(self.render_pass, None);
      for target in &self.render_targets {
        self.device.destroy_image_view(target.view, None);
      }
      self.swapchain_functions.destroy_swapchain(self.handle, None);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn format(f: vk::Format, cs: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
      format: f,
      color_space: cs,
    }
  }

  #[test]
  fn choose_surface_format_prefers_bgra_unorm_srgb_nonlinear() {
    let formats = vec![
      format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
      format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];
    let chosen = Swapchain::choose_surface_format(&formats);
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
  }

  #[test]
  fn choose_surface_format_falls_back_to_first_when_preferred_absent() {
    let formats = vec![format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
    let chosen = Swapchain::choose_surface_format(&formats);
    assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
  }

  #[test]
  fn choose_present_mode_prefers_mailbox_when_available() {
    let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
    assert_eq!(
      Swapchain::choose_present_mode(&modes, PresentMode::Mailbox),
      vk::PresentModeKHR::MAILBOX
    );
  }

  #[test]
  fn choose_present_mode_falls_back_to_fifo() {
    let modes = vec![vk::PresentModeKHR::FIFO];
    assert_eq!(
      Swapchain::choose_present_mode(&modes, PresentMode::Mailbox),
      vk::PresentModeKHR::FIFO
    );
  }

  #[test]
  fn choose_extent_uses_current_extent_when_fixed() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
      current_extent: vk::Extent2D { width: 800, height: 600 },
      ..Default::default()
    };
    let extent = Swapchain::choose_extent(&capabilities, 1024, 768);
    assert_eq!(extent, vk::Extent2D { width: 800, height: 600 });
  }

  #[test]
  fn choose_extent_clamps_to_capabilities_when_current_extent_is_undefined() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
      current_extent: vk::Extent2D {
        width: u32::max_value(),
        height: u32::max_value(),
      },
      min_image_extent: vk::Extent2D { width: 64, height: 64 },
      max_image_extent: vk::Extent2D { width: 512, height: 512 },
      ..Default::default()
    };
    let extent = Swapchain::choose_extent(&capabilities, 1024, 32);
    assert_eq!(extent, vk::Extent2D { width: 512, height: 64 });
  }

  #[test]
  fn choose_image_count_uses_requested_buffer_count_when_it_exceeds_min_supported() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
      min_image_count: 2,
      max_image_count: 8,
      ..Default::default()
    };
    assert_eq!(Swapchain::choose_image_count(&capabilities, 3), 3);
  }

  #[test]
  fn choose_image_count_falls_back_to_min_supported_when_requested_is_lower() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
      min_image_count: 3,
      max_image_count: 8,
      ..Default::default()
    };
    assert_eq!(Swapchain::choose_image_count(&capabilities, 1), 3);
  }

  #[test]
  fn choose_image_count_is_capped_by_surface_max() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
      min_image_count: 2,
      max_image_count: 4,
      ..Default::default()
    };
    assert_eq!(Swapchain::choose_image_count(&capabilities, 10), 4);
  }

  #[test]
  fn choose_image_count_treats_zero_max_as_unbounded() {
    let capabilities = vk::SurfaceCapabilitiesKHR {
      min_image_count: 2,
      max_image_count: 0,
      ..Default::default()
    };
    assert_eq!(Swapchain::choose_image_count(&capabilities, 100), 100);
  }
}
