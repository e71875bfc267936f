use ash::vk;
use std::{error::Error, ffi::NulError, fmt, io};

pub type TerraResult<T> = Result<T, TerraError>;

/// The error taxonomy for every public and internal Terra operation.
///
/// Recoverable API errors are values, never exceptions or panics; only
/// postcondition violations that indicate a Terra bug itself (`Internal`)
/// may be paired with an assert on the way to being constructed.
#[derive(Debug)]
pub enum TerraError {
  /// Bad size, unknown id, zero extent, or any other caller-supplied
  /// argument that fails validation.
  InvalidArgument(&'static str),
  /// `Resize` was asked to make the swapchain unusable.
  InvalidResizeExtent,
  /// A `mesh_id` passed to `AddModelBundle` does not name a registered mesh.
  UnknownMesh,
  /// A `bundle_id`/`texture_id`/descriptor binding does not exist.
  UnknownResource,
  /// A shader file could not be opened.
  ShaderNotFound(String),
  /// A shader file opened but did not produce a valid module.
  ShaderInvalid(String),
  /// The device rejected an allocation request.
  OutOfMemory,
  /// No memory-type index satisfies the requested type mask / properties.
  UnsupportedType,
  /// `Render()` could not proceed because the swapchain is out of date or
  /// suboptimal; caller must call `Resize`.
  SwapchainStale,
  /// The device has been lost. Fatal: the Renderer is now poisoned.
  DeviceLost,
  /// Shader file open/read failure (a strict subset of `ShaderNotFound`
  /// carrying the underlying I/O cause).
  IOError(io::Error),
  /// A postcondition was violated (sub-allocator invariant, etc). Indicative
  /// of a Terra bug, not a caller mistake.
  Internal(&'static str),
  NoSuchDisplay(usize),
  CStrError(NulError),
  VulkanError(vk::Result),
  InstanceError(ash::InstanceError),
}

impl From<vk::Result> for TerraError {
  fn from(e: vk::Result) -> Self {
    match e {
      vk::Result::SUBOPTIMAL_KHR => TerraError::SwapchainStale,
      vk::Result::ERROR_OUT_OF_DATE_KHR => TerraError::SwapchainStale,
      vk::Result::ERROR_DEVICE_LOST => TerraError::DeviceLost,
      vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
        TerraError::OutOfMemory
      }
      e => TerraError::VulkanError(e),
    }
  }
}
impl From<ash::InstanceError> for TerraError {
  fn from(e: ash::InstanceError) -> Self {
    TerraError::InstanceError(e)
  }
}
impl From<NulError> for TerraError {
  fn from(e: NulError) -> Self {
    TerraError::CStrError(e)
  }
}
impl From<io::Error> for TerraError {
  fn from(e: io::Error) -> Self {
    TerraError::IOError(e)
  }
}

impl fmt::Display for TerraError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      TerraError::InvalidArgument(s) => write!(f, "Invalid argument: {}", s),
      TerraError::InvalidResizeExtent => {
        write!(f, "Resize was asked for a zero width or height")
      }
      TerraError::UnknownMesh => write!(f, "Referenced a mesh_id that is not registered"),
      TerraError::UnknownResource => write!(f, "Referenced a resource id that is not registered"),
      TerraError::ShaderNotFound(name) => write!(f, "Shader file not found: {}", name),
      TerraError::ShaderInvalid(name) => write!(f, "Shader module invalid: {}", name),
      TerraError::OutOfMemory => write!(f, "Device rejected the allocation request"),
      TerraError::UnsupportedType => write!(
        f,
        "No memory type index satisfies the requested mask/properties"
      ),
      TerraError::SwapchainStale => write!(
        f,
        "Swapchain is out of date or suboptimal, call Renderer::resize"
      ),
      TerraError::DeviceLost => write!(f, "Device lost, Renderer is now poisoned"),
      TerraError::IOError(e) => write!(f, "I/O error: {}", e),
      TerraError::Internal(s) => write!(f, "Internal invariant violated: {}", s),
      TerraError::NoSuchDisplay(i) => write!(f, "No display at index {}", i),
      TerraError::CStrError(e) => write!(f, "{}", e),
      TerraError::VulkanError(r) => write!(f, "Vulkan error: {}", r),
      TerraError::InstanceError(e) => write!(f, "ash instance error: {}", e),
    }
  }
}

impl Error for TerraError {}
