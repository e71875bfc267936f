//! The Vulkan handles every other module builds on: driver entry, instance,
//! debug messenger, surface, physical/logical device, and queues. Grounded
//! on `renderer/vulkan/vulkan_renderer/vulkan_core.rs` and the device
//! selection logic inlined in the teacher's older `VulkanRenderer`
//! (`renderer/vulkan/vulkan_renderer.rs`), split into focused submodules the
//! way the teacher's newer `vulkan_renderer/` directory is split.
pub mod debug;
pub mod device;
pub mod instance;

pub use debug::{DebugMessenger, DebugUserData, DebugUserDataCounts};
pub use device::{Queues, QueueFamilyIndices, VulkanDevice};
pub use instance::VulkanCore;

use crate::{
  config::{ApplicationDetails, EngineDetails},
  error::TerraResult,
};
use ash::{version::DeviceV1_0, Device, Instance};
use raw_window_handle::HasRawWindowHandle;
use std::sync::Arc;

/// Bundles [`VulkanCore`] and [`VulkanDevice`] -- everything a [`Renderer`](crate::Renderer)
/// needs before it can build memory managers, swapchains, and engines.
pub struct VulkanContext {
  pub core: VulkanCore,
  pub device: VulkanDevice,
}
impl VulkanContext {
  pub fn new<W: HasRawWindowHandle>(
    window: &W, application_details: ApplicationDetails, engine_details: EngineDetails,
    enable_validation: bool,
  ) -> TerraResult<Self> {
    let core = VulkanCore::new(window, application_details, engine_details, enable_validation, None)?;
    let device = VulkanDevice::new(&core.instance, &core.surface_functions, core.surface)?;
    Ok(Self { core, device })
  }

  pub fn instance(&self) -> &Instance {
    &self.core.instance
  }

  pub fn logical_device(&self) -> &Device {
    &self.device.logical_device
  }

  /// Blocks until the logical device has no outstanding work, required
  /// before tearing down any resource that may still be in flight.
  pub fn wait_idle(&self) -> TerraResult<()> {
    unsafe { self.device.logical_device.device_wait_idle()? };
    Ok(())
  }
}
impl Drop for VulkanContext {
  fn drop(&mut self) {
    unsafe {
      self.device.logical_device.destroy_device(None);
    }
  }
}
