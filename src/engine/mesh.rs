//! MS (mesh-shader) variant state (spec §4.I row 3): storage buffers of
//! vertices/vertex-indices/primitive-indices plus per-model constants, one
//! `DrawMeshTasks` per bundle with a meshlet-count push constant. Reuses
//! `MeshManager`'s vertex/index shared buffers as the storage buffers the
//! mesh shader reads by index instead of fixed-function vertex input.
use crate::{descriptor::DescriptorBinding, pipeline::mesh_shader::MeshShaderFunctions};
use ash::vk;

pub const CAMERA_BINDING: u32 = 0;
pub const MODEL_CONSTANTS_BINDING: u32 = 1;
pub const TEXTURE_BINDING: u32 = 2;
pub const VERTEX_STORAGE_BINDING: u32 = 3;
pub const INDEX_STORAGE_BINDING: u32 = 4;
pub const MAX_BOUND_TEXTURES: u32 = 256;

/// Mesh + task shader push constant: where this bundle's instances start
/// in the model-constant buffer, and how many meshlets its mesh has (the
/// task shader dispatches one task-workgroup per meshlet, per spec §8
/// scenario 5).
#[repr(C)]
#[derive(Copy, Clone)]
pub struct PushConstants {
  pub constant_base_index: u32,
  pub meshlet_count: u32,
}
pub const PUSH_CONSTANT_SIZE: u32 = std::mem::size_of::<PushConstants>() as u32;

pub fn descriptor_bindings() -> Vec<DescriptorBinding> {
  let task_and_mesh = crate::pipeline::mesh_shader::SHADER_STAGE_TASK_NV | crate::pipeline::mesh_shader::SHADER_STAGE_MESH_NV;
  vec![
    DescriptorBinding {
      binding: CAMERA_BINDING,
      descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
      count: 1,
      stage_flags: task_and_mesh,
      binding_flags: vk::DescriptorBindingFlags::empty(),
    },
    DescriptorBinding {
      binding: MODEL_CONSTANTS_BINDING,
      descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
      count: 1,
      stage_flags: task_and_mesh,
      binding_flags: vk::DescriptorBindingFlags::empty(),
    },
    DescriptorBinding {
      binding: TEXTURE_BINDING,
      descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
      count: MAX_BOUND_TEXTURES,
      stage_flags: vk::ShaderStageFlags::FRAGMENT,
      binding_flags: vk::DescriptorBindingFlags::UPDATE_AFTER_BIND | vk::DescriptorBindingFlags::PARTIALLY_BOUND,
    },
    DescriptorBinding {
      binding: VERTEX_STORAGE_BINDING,
      descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
      count: 1,
      stage_flags: crate::pipeline::mesh_shader::SHADER_STAGE_MESH_NV,
      binding_flags: vk::DescriptorBindingFlags::empty(),
    },
    DescriptorBinding {
      binding: INDEX_STORAGE_BINDING,
      descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
      count: 1,
      stage_flags: crate::pipeline::mesh_shader::SHADER_STAGE_MESH_NV,
      binding_flags: vk::DescriptorBindingFlags::empty(),
    },
  ]
}

/// Holds the manually-loaded `vkCmdDrawMeshTasksNV` entry point; nothing
/// else is variant-specific (the shared vertex/index `SharedBuffer`s double
/// as this variant's storage buffers).
pub struct MeshState {
  pub functions: MeshShaderFunctions,
}
