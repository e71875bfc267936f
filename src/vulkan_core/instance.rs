//! Driver loading, instance creation, and surface creation. Grounded on
//! `renderer/vulkan/vulkan_renderer/vulkan_core.rs`'s `VulkanCoreStructures`.
use crate::{
  config::{ApplicationDetails, EngineDetails},
  error::TerraResult,
  vulkan_core::debug::{DebugMessenger, DebugUserData},
};
use ash::{
  extensions::ext::DebugUtils,
  version::{EntryV1_0, InstanceV1_0},
  vk, Entry, Instance,
};
use lazy_static::lazy_static;
use log::info;
use raw_window_handle::HasRawWindowHandle;
use std::{
  ffi::{CStr, CString},
  pin::Pin,
  sync::Arc,
};

lazy_static! {
  static ref VALIDATION_LAYERS: Vec<CString> =
    vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()];
}

/// Base Vulkan handles that outlive everything else Terra owns: the driver
/// loader, the instance, the presentation surface, and (in debug builds) the
/// validation messenger.
pub struct VulkanCore {
  _entry: Entry,
  pub instance: Arc<Instance>,
  pub surface: vk::SurfaceKHR,
  pub surface_functions: ash::extensions::khr::Surface,
  debug_messenger: Option<DebugMessenger>,
}
impl VulkanCore {
  pub fn new<W: HasRawWindowHandle>(
    window: &W, application_details: ApplicationDetails, engine_details: EngineDetails,
    enable_validation: bool, debug_user_data: Option<Pin<Arc<DebugUserData>>>,
  ) -> TerraResult<Self> {
    let entry = Entry::new().expect("Failed to load the Vulkan dynamic library");

    let instance = Self::create_instance(
      &entry,
      window,
      application_details,
      engine_details,
      enable_validation,
    )?;

    let debug_messenger = if enable_validation {
      Some(DebugMessenger::new(&entry, &instance, debug_user_data))
    } else {
      None
    };

    let surface = unsafe { ash_window::create_surface(&entry, instance.as_ref(), window, None)? };
    let surface_functions = ash::extensions::khr::Surface::new(&entry, instance.as_ref());

    Ok(Self {
      _entry: entry,
      instance,
      surface,
      surface_functions,
      debug_messenger,
    })
  }

  fn create_instance<W: HasRawWindowHandle>(
    entry: &Entry, window: &W, application_details: ApplicationDetails,
    engine_details: EngineDetails, enable_validation: bool,
  ) -> TerraResult<Arc<Instance>> {
    let app_info = vk::ApplicationInfo::builder()
      .application_name(CString::new(application_details.name)?.as_c_str())
      .application_version(application_details.version.as_u32())
      .engine_name(CString::new(engine_details.name)?.as_c_str())
      .engine_version(engine_details.version.as_u32())
      .api_version(ash::vk::make_version(1, 2, 131))
      .build();

    let mut layer_names: Vec<_> = Vec::new();
    if enable_validation {
      assert!(
        unsafe { Self::check_validation_layer_support(entry) },
        "The requested Vulkan validation layers are not available on this system"
      );
      layer_names = VALIDATION_LAYERS.iter().map(|name| name.as_ptr()).collect();
    }

    let extension_names = Self::required_extensions(window, enable_validation)?;
    let extension_name_ptrs: Vec<_> = extension_names.iter().map(|&ext| ext.as_ptr()).collect();

    let mut debug_create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
      .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
      .message_type(vk::DebugUtilsMessageTypeFlagsEXT::all())
      .pfn_user_callback(Some(DebugMessenger::debug_callback))
      .build();

    let mut instance_ci = vk::InstanceCreateInfo::builder()
      .application_info(&app_info)
      .enabled_layer_names(&layer_names)
      .enabled_extension_names(&extension_name_ptrs);
    if enable_validation {
      instance_ci = instance_ci.push_next(&mut debug_create_info);
    }

    let instance = unsafe { entry.create_instance(&instance_ci.build(), None) }?;
    Ok(Arc::new(instance))
  }

  fn required_extensions<W: HasRawWindowHandle>(
    window: &W, enable_validation: bool,
  ) -> TerraResult<Vec<&'static CStr>> {
    let mut extensions = ash_window::enumerate_required_extensions(window)?;
    if enable_validation {
      extensions.push(DebugUtils::name());
    }
    Ok(extensions)
  }

  /// Builds a second, independent `Surface` function-table handle --
  /// `Swapchain` needs its own copy to destroy nothing itself cares about,
  /// separate from the one this `VulkanCore` destroys the surface with.
  pub fn clone_surface_functions(&self) -> ash::extensions::khr::Surface {
    ash::extensions::khr::Surface::new(&self._entry, self.instance.as_ref())
  }

  unsafe fn check_validation_layer_support(entry: &Entry) -> bool {
    let available_layers: Vec<_> = entry
      .enumerate_instance_layer_properties()
      .expect("Unable to enumerate instance layers")
      .iter()
      .map(|layer| CStr::from_ptr(layer.layer_name.as_ptr()).to_owned())
      .collect();

    VALIDATION_LAYERS
      .iter()
      .all(|requested| available_layers.contains(requested))
  }
}
impl Drop for VulkanCore {
  fn drop(&mut self) {
    unsafe {
      info!("Destroying surface");
      self.surface_functions.destroy_surface(self.surface, None);

      if let Some(messenger) = &self.debug_messenger {
        info!("Destroying debug messenger");
        messenger
          .debug_utils
          .destroy_debug_utils_messenger(messenger.messenger, None);
      }

      info!("Destroying Vulkan instance");
      self.instance.destroy_instance(None);
    }
  }
}
