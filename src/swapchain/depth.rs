//! Depth attachment (spec §4.L: "optional depth attachment (D32_SFLOAT,
//! CLEAR→DONT_CARE)"). Grounded on the teacher's
//! `renderer/vulkan/vulkan_renderer/render_attachments.rs::DepthAttachment`
//! and `depth_buffer.rs`, re-pointed at [`MemoryManager`] instead of
//! `vk_mem` and fixed to the one format the spec requires rather than
//! probing a list of depth-stencil candidates (no stencil usage in scope).
use crate::{
  error::TerraResult,
  memory::{Allocation, SharedMemoryManager},
};
use ash::{version::DeviceV1_0, vk, Device};
use std::sync::Arc;

pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// One depth image + view, recreated whenever the swapchain extent changes.
pub struct DepthAttachment {
  device: Arc<Device>,
  memory_manager: SharedMemoryManager,
  pub image: vk::Image,
  pub view: vk::ImageView,
  allocation: Allocation,
}
impl DepthAttachment {
  pub fn new(
    device: Arc<Device>, memory_manager: &SharedMemoryManager, extent: vk::Extent2D,
  ) -> TerraResult<Self> {
    let image_ci = vk::ImageCreateInfo::builder()
      .image_type(vk::ImageType::TYPE_2D)
      .format(DEPTH_FORMAT)
      .extent(vk::Extent3D {
        width: extent.width,
        height: extent.height,
        depth: 1,
      })
      .mip_levels(1)
      .array_layers(1)
      .samples(vk::SampleCountFlags::TYPE_1)
      .tiling(vk::ImageTiling::OPTIMAL)
      .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
      .sharing_mode(vk::SharingMode::EXCLUSIVE)
      .initial_layout(vk::ImageLayout::UNDEFINED)
      .build();
    let image = unsafe { device.create_image(&image_ci, None)? };

    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let allocation = {
      let mut mm = memory_manager.write().expect("MemoryManager lock poisoned");
      let allocation = match mm.allocate(
        requirements.size,
        requirements.alignment,
        requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
      ) {
        Ok(allocation) => allocation,
        Err(e) => {
          unsafe { device.destroy_image(image, None) };
          return Err(e);
        }
      };
      unsafe { device.bind_image_memory(image, mm.raw_memory(&allocation), allocation.offset)? };
      allocation
    };

    let view_ci = vk::ImageViewCreateInfo::builder()
      .image(image)
      .view_type(vk::ImageViewType::TYPE_2D)
      .format(DEPTH_FORMAT)
      .subresource_range(vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::DEPTH,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
      })
      .build();
    let view = unsafe { device.create_image_view(&view_ci, None)? };

    Ok(Self {
      device,
      memory_manager: memory_manager.clone(),
      image,
      view,
      allocation,
    })
  }
}
impl Drop for DepthAttachment {
  fn drop(&mut self) {
    unsafe {
      self.device.destroy_image_view(self.view, None);
      self.device.destroy_image(self.image, None);
    }
    self
      .memory_manager
      .write()
      .expect("MemoryManager lock poisoned")
      .free(self.allocation);
  }
}
