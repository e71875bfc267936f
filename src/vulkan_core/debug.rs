//! `VK_EXT_debug_utils` messenger setup, grounded on
//! `renderer/vulkan/debug_utils_ext.rs`: routes validation layer output
//! through the `log` crate and keeps running counts for tests that want to
//! assert "no warnings or errors were logged".
use ash::{extensions::ext::DebugUtils, vk, Entry, Instance};
use log::{debug, error, warn};
use static_assertions::assert_impl_all;
use std::{
  ffi::CStr,
  os::raw::c_void,
  pin::Pin,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
};

#[repr(C)]
pub struct DebugMessenger {
  pub debug_utils: DebugUtils,
  pub messenger: vk::DebugUtilsMessengerEXT,
  pub debug_user_data: Pin<Arc<DebugUserData>>,
}
impl DebugMessenger {
  pub fn new(
    entry: &Entry, instance: &Instance, debug_user_data: Option<Pin<Arc<DebugUserData>>>,
  ) -> Self {
    let debug_user_data = debug_user_data.unwrap_or_else(|| Arc::pin(DebugUserData::new()));

    let debug_user_data_ptr =
      unsafe { Arc::into_raw(Pin::into_inner_unchecked(debug_user_data.clone())) as *mut c_void };

    let debug_utils = DebugUtils::new(entry, instance);
    let messenger_ci = vk::DebugUtilsMessengerCreateInfoEXT::builder()
      .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
      .message_type(vk::DebugUtilsMessageTypeFlagsEXT::all())
      .pfn_user_callback(Some(Self::debug_callback))
      .user_data(debug_user_data_ptr)
      .build();
    let messenger = unsafe {
      debug_utils
        .create_debug_utils_messenger(&messenger_ci, None)
        .expect("Could not create debug utils messenger")
    };

    DebugMessenger {
      debug_utils,
      messenger,
      debug_user_data,
    }
  }

  /// Invariant: `p_user_data` is a `DebugUserData` whenever non-null, set up
  /// by `new` above.
  pub unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT, p_user_data: *mut c_void,
  ) -> u32 {
    if !p_user_data.is_null() {
      let user_data = &mut *(p_user_data as *mut DebugUserData);
      match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
          user_data.error_count.fetch_add(1, Ordering::SeqCst);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
          user_data.warning_count.fetch_add(1, Ordering::SeqCst);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
          user_data.info_count.fetch_add(1, Ordering::SeqCst);
        }
        _ => {}
      }
    }

    let message = CStr::from_ptr((*p_callback_data).p_message as *const i8)
      .to_str()
      .unwrap_or("<non-utf8 validation message>");
    match message_severity {
      vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("Validation error: {}", message),
      vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("Validation warning: {}", message),
      vk::DebugUtilsMessageSeverityFlagsEXT::INFO => debug!("Validation info: {}", message),
      vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => debug!("Validation verbose: {}", message),
      _ => {}
    }

    vk::FALSE
  }
}

assert_impl_all!(DebugUserData: Sync);
#[repr(C)]
pub struct DebugUserData {
  info_count: AtomicUsize,
  warning_count: AtomicUsize,
  error_count: AtomicUsize,
}
impl DebugUserData {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn counts(&self) -> DebugUserDataCounts {
    DebugUserDataCounts {
      info_count: self.info_count.load(Ordering::SeqCst),
      warning_count: self.warning_count.load(Ordering::SeqCst),
      error_count: self.error_count.load(Ordering::SeqCst),
    }
  }
}
impl Default for DebugUserData {
  fn default() -> Self {
    Self {
      info_count: AtomicUsize::new(0),
      warning_count: AtomicUsize::new(0),
      error_count: AtomicUsize::new(0),
    }
  }
}

#[derive(Debug, Copy, Clone)]
pub struct DebugUserDataCounts {
  pub info_count: usize,
  pub warning_count: usize,
  pub error_count: usize,
}
