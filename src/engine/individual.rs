//! VS-individual variant state (spec §4.I row 1). There is no extra
//! per-variant GPU state beyond the shared pipeline/descriptor substrate,
//! so this module is just the binding layout and push-constant shape.
use crate::descriptor::DescriptorBinding;
use ash::vk;

pub const CAMERA_BINDING: u32 = 0;
pub const MODEL_CONSTANTS_BINDING: u32 = 1;
pub const TEXTURE_BINDING: u32 = 2;
pub const MAX_BOUND_TEXTURES: u32 = 256;

/// One push constant: the index into the global model-constant storage
/// buffer at which this bundle's instances start (the buffer is shared
/// across every bundle drawn with this pipeline).
#[repr(C)]
#[derive(Copy, Clone)]
pub struct PushConstants {
  pub constant_base_index: u32,
}

pub fn descriptor_bindings() -> Vec<DescriptorBinding> {
  vec![
    DescriptorBinding {
      binding: CAMERA_BINDING,
      descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
      count: 1,
      stage_flags: vk::ShaderStageFlags::VERTEX,
      binding_flags: vk::DescriptorBindingFlags::empty(),
    },
    DescriptorBinding {
      binding: MODEL_CONSTANTS_BINDING,
      descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
      count: 1,
      stage_flags: vk::ShaderStageFlags::VERTEX,
      binding_flags: vk::DescriptorBindingFlags::empty(),
    },
    DescriptorBinding {
      binding: TEXTURE_BINDING,
      descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
      count: MAX_BOUND_TEXTURES,
      stage_flags: vk::ShaderStageFlags::FRAGMENT,
      binding_flags: vk::DescriptorBindingFlags::UPDATE_AFTER_BIND | vk::DescriptorBindingFlags::PARTIALLY_BOUND,
    },
  ]
}

pub const PUSH_CONSTANT_SIZE: u32 = std::mem::size_of::<PushConstants>() as u32;
