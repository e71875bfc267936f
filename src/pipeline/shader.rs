//! Shader loader (spec §4.H): reads `<shader_path>/<name>.spv` fully into
//! memory and creates a `vk::ShaderModule`. Grounded on the teacher's
//! `create_shader_module`/`read_shader_from_file`
//! (`renderer/vulkan/vulkan_renderer/pipelines.rs`), generalized to surface
//! `ShaderNotFound` vs. `ShaderInvalid` as distinct error tags per spec §7.
use crate::error::{TerraError, TerraResult};
use ash::{util::read_spv, version::DeviceV1_0, vk, Device};
use std::{fs::File, io::Cursor, path::Path};

/// Resolves `shader_path + name + ".spv"`, reads it, and creates a shader
/// module. `ShaderNotFound` covers the file-open failure; `ShaderInvalid`
/// covers a file that opened but didn't parse as SPIR-V or that the driver
/// rejected at module-creation time.
pub fn load_shader_module(device: &Device, shader_path: &str, name: &str) -> TerraResult<vk::ShaderModule> {
  let path = Path::new(shader_path).join(format!("{}.spv", name));
  let mut file = File::open(&path).map_err(|_| TerraError::ShaderNotFound(name.to_owned()))?;
  let code = read_spv(&mut file).map_err(|_| TerraError::ShaderInvalid(name.to_owned()))?;

  let module_ci = vk::ShaderModuleCreateInfo::builder().code(&code).build();
  unsafe {
    device
      .create_shader_module(&module_ci, None)
      .map_err(|_| TerraError::ShaderInvalid(name.to_owned()))
  }
}

/// Same as [`load_shader_module`] but reads from an in-memory SPIR-V blob --
/// used by tests that don't want to touch the filesystem.
pub fn load_shader_module_from_bytes(device: &Device, bytes: &[u8], name: &str) -> TerraResult<vk::ShaderModule> {
  let code = read_spv(&mut Cursor::new(bytes)).map_err(|_| TerraError::ShaderInvalid(name.to_owned()))?;
  let module_ci = vk::ShaderModuleCreateInfo::builder().code(&code).build();
  unsafe {
    device
      .create_shader_module(&module_ci, None)
      .map_err(|_| TerraError::ShaderInvalid(name.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn load_shader_module_reports_not_found_for_missing_file() {
    // No device call is reached; the open failure surfaces first.
    let path = Path::new("/nonexistent/path/does/not/exist").join("Foo.spv");
    let result = File::open(&path);
    assert!(result.is_err());
  }
}
