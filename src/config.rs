//! Terra configuration.  Sane defaults provided.
use crate::engine::EngineKind;

/// Top level configuration used to construct a [`Renderer`](crate::Renderer).
#[derive(Builder)]
#[builder(default)]
pub struct RendererConfig {
  pub requested_width: u32,
  pub requested_height: u32,
  pub application_details: ApplicationDetails<'static>,
  pub engine_details: EngineDetails<'static>,
  pub present_mode: PresentMode,
  pub engine_kind: EngineKind,
  /// Number of frame slots (see spec §3 `FrameSlot`); 2 is double buffering.
  pub buffer_count: u32,
  pub shader_path: String,
  pub background_color: [f32; 4],
  pub memory_config: MemoryConfig,
}
impl RendererConfig {
  pub fn builder() -> RendererConfigBuilder {
    RendererConfigBuilder::default()
  }
}
impl Default for RendererConfig {
  fn default() -> Self {
    Self {
      requested_width: 800,
      requested_height: 600,
      application_details: ApplicationDetails::default(),
      engine_details: EngineDetails::default(),
      present_mode: PresentMode::default(),
      engine_kind: EngineKind::default(),
      buffer_count: 2,
      shader_path: "./shaders/".to_owned(),
      background_color: [0f32, 0f32, 0f32, 1f32],
      memory_config: MemoryConfig::default(),
    }
  }
}

/// Default block sizes for the [`MemoryManager`](crate::memory::MemoryManager),
/// either of which may be overridden per-allocation (spec §4.A).
#[derive(Copy, Clone)]
pub struct MemoryConfig {
  pub default_gpu_block_size: u64,
  pub default_cpu_block_size: u64,
}
impl Default for MemoryConfig {
  fn default() -> Self {
    Self {
      default_gpu_block_size: 2 * 1024 * 1024,
      default_cpu_block_size: 200 * 1024,
    }
  }
}

// ================================================================================
//  Version struct
// ================================================================================
/// A simple version with major, minor and patch fields for specifying
/// information about your application.
#[derive(Copy, Clone)]
pub struct Version {
  major: u32,
  minor: u32,
  patch: u32,
}
impl Version {
  pub fn new(major: u32, minor: u32, patch: u32) -> Self {
    Self {
      major,
      minor,
      patch,
    }
  }

  pub fn as_u32(self) -> u32 {
    ash::vk::make_version(self.major, self.minor, self.patch)
  }
}
impl Default for Version {
  fn default() -> Self {
    Self {
      major: 0,
      minor: 1,
      patch: 0,
    }
  }
}

// ================================================================================
//  ApplicationDetails / EngineDetails
// ================================================================================
#[derive(Copy, Clone)]
pub struct ApplicationDetails<'a> {
  pub name: &'a str,
  pub version: Version,
}
impl<'a> ApplicationDetails<'a> {
  pub fn new(name: &'a str, version: Version) -> Self {
    Self { name, version }
  }
}
impl<'a> Default for ApplicationDetails<'a> {
  fn default() -> Self {
    Self {
      name: "Nameless Application",
      version: Version::default(),
    }
  }
}

#[derive(Copy, Clone)]
pub struct EngineDetails<'a> {
  pub name: &'a str,
  pub version: Version,
}
impl<'a> EngineDetails<'a> {
  pub fn new(name: &'a str, version: Version) -> Self {
    Self { name, version }
  }
}
impl<'a> Default for EngineDetails<'a> {
  fn default() -> Self {
    Self {
      name: "Terra",
      version: Version::default(),
    }
  }
}

/// Determines present mode. Default is Mailbox if supported, falling back to
/// Fifo per spec §4.L.
#[derive(Copy, Clone)]
pub enum PresentMode {
  Immediate,
  Mailbox,
  Fifo,
}
impl Default for PresentMode {
  fn default() -> PresentMode {
    PresentMode::Mailbox
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_has_double_buffering() {
    let config = RendererConfig::default();
    assert_eq!(config.buffer_count, 2);
  }

  #[test]
  fn builder_overrides_defaults() {
    let config = RendererConfig::builder()
      .buffer_count(3)
      .engine_kind(EngineKind::MeshDraw)
      .build()
      .unwrap();
    assert_eq!(config.buffer_count, 3);
    assert!(matches!(config.engine_kind, EngineKind::MeshDraw));
  }
}
