//! MS (mesh-shader) graphics pipeline (spec §4.I): task + mesh + fragment
//! stages, storage buffers of vertices/vertex-indices/primitive-indices plus
//! per-model constants, one `DrawMeshTasks` per model bundle with a
//! meshlet-count push constant. `ash` 0.30 has no native `VK_NV_mesh_shader`
//! bindings, so the `vkCmdDrawMeshTasksNV` entry point is loaded manually
//! the way the teacher loads `vkGetPhysicalDeviceSurfaceSupportKHR`-style
//! extension functions implicitly through `ash::extensions::khr::*` wrapper
//! structs (`vulkan_core.rs`) -- here there is no wrapper struct to reach
//! for, so the function pointer is fetched directly via
//! `vkGetDeviceProcAddr` and the two new shader-stage bits
//! (`VK_SHADER_STAGE_TASK_BIT_NV` = `0x40`, `VK_SHADER_STAGE_MESH_BIT_NV` =
//! `0x80`) are constructed with `vk::ShaderStageFlags::from_raw`.
use crate::{
  error::{TerraError, TerraResult},
  pipeline::{layout::PipelineLayout, shader, vs_individual::build_common},
};
use ash::{version::DeviceV1_0, vk, Device, Instance};
use std::{ffi::CStr, ffi::CString};

/// `VK_SHADER_STAGE_TASK_BIT_NV`, not present in `ash::vk::ShaderStageFlags`
/// as of the version Terra depends on.
pub const SHADER_STAGE_TASK_NV: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(0x0000_0040);
/// `VK_SHADER_STAGE_MESH_BIT_NV`.
pub const SHADER_STAGE_MESH_NV: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(0x0000_0080);

type PfnCmdDrawMeshTasksNV = unsafe extern "system" fn(command_buffer: vk::CommandBuffer, task_count: u32, first_task: u32);

fn entry_point() -> &'static CStr {
  CStr::from_bytes_with_nul(b"main\0").unwrap()
}

/// Manually-loaded `VK_NV_mesh_shader` device entry point. Loaded once at
/// engine construction and reused for every `DrawMeshTasks` call.
pub struct MeshShaderFunctions {
  cmd_draw_mesh_tasks_nv: PfnCmdDrawMeshTasksNV,
}
impl MeshShaderFunctions {
  pub fn load(instance: &Instance, device: &Device) -> TerraResult<Self> {
    let name = CString::new("vkCmdDrawMeshTasksNV").expect("static string has no interior nul");
    let proc = unsafe { (instance.fp_v1_0().get_device_proc_addr)(device.handle(), name.as_ptr()) };
    let proc = proc.ok_or(TerraError::Internal(
      "VK_NV_mesh_shader not supported by this device: vkCmdDrawMeshTasksNV unavailable",
    ))?;
    // Safety: `vkGetDeviceProcAddr` for "vkCmdDrawMeshTasksNV" returns a
    // function pointer matching the Vulkan spec's published signature.
    let cmd_draw_mesh_tasks_nv = unsafe { std::mem::transmute::<_, PfnCmdDrawMeshTasksNV>(proc) };
    Ok(Self { cmd_draw_mesh_tasks_nv })
  }

  /// Records `vkCmdDrawMeshTasksNV(command_buffer, task_count, first_task)`.
  ///
  /// # Safety
  /// `command_buffer` must be in the recording state with a pipeline bound
  /// that was created with task/mesh shader stages.
  pub unsafe fn cmd_draw_mesh_tasks_nv(&self, command_buffer: vk::CommandBuffer, task_count: u32, first_task: u32) {
    (self.cmd_draw_mesh_tasks_nv)(command_buffer, task_count, first_task)
  }
}

/// Builds the MS graphics pipeline for one fragment shader name.
/// `MeshShaderTSIndividual.spv` (task) and `MeshShaderMSIndividual.spv`
/// (mesh) are fixed per spec §6. There is no vertex input state -- mesh
/// shaders source geometry from storage buffers bound through the
/// descriptor set, not fixed-function vertex attributes.
pub fn create_pipeline(
  device: &Device, shader_path: &str, fragment_shader_name: &str, pipeline_layout: &PipelineLayout,
  render_pass: vk::RenderPass, extent: vk::Extent2D,
) -> TerraResult<vk::Pipeline> {
  let task_module = shader::load_shader_module(device, shader_path, "MeshShaderTSIndividual")?;
  let mesh_module = match shader::load_shader_module(device, shader_path, "MeshShaderMSIndividual") {
    Ok(module) => module,
    Err(e) => {
      unsafe { device.destroy_shader_module(task_module, None) };
      return Err(e);
    }
  };
  let fragment_module = match shader::load_shader_module(device, shader_path, fragment_shader_name) {
    Ok(module) => module,
    Err(e) => {
      unsafe {
        device.destroy_shader_module(task_module, None);
        device.destroy_shader_module(mesh_module, None);
      }
      return Err(e);
    }
  };

  let stages = [
    vk::PipelineShaderStageCreateInfo::builder()
      .stage(SHADER_STAGE_TASK_NV)
      .module(task_module)
      .name(entry_point())
      .build(),
    vk::PipelineShaderStageCreateInfo::builder()
      .stage(SHADER_STAGE_MESH_NV)
      .module(mesh_module)
      .name(entry_point())
      .build(),
    vk::PipelineShaderStageCreateInfo::builder()
      .stage(vk::ShaderStageFlags::FRAGMENT)
      .module(fragment_module)
      .name(entry_point())
      .build(),
  ];

  // No vertex attributes: the mesh shader reads its geometry from bound
  // storage buffers, so the vertex input state is empty.
  let vertex_input_ci = vk::PipelineVertexInputStateCreateInfo::builder().build();

  let pipeline = build_common(device, &stages, &vertex_input_ci, pipeline_layout, render_pass, extent);

  unsafe {
    device.destroy_shader_module(task_module, None);
    device.destroy_shader_module(mesh_module, None);
    device.destroy_shader_module(fragment_module, None);
  }
  pipeline
}

/// Records one `DrawMeshTasks` call per bundle (spec §4.I table): pushes
/// the model-offset/mesh-id push constants, then asks the task shader to
/// dispatch one workgroup per meshlet. `meshlet_count` is the bundle's
/// mesh's meshlet count; task-shader-side culling narrows which meshlets
/// actually emit mesh-shader invocations.
pub fn record_draw(
  functions: &MeshShaderFunctions, device: &Device, cmd: vk::CommandBuffer, pipeline_layout: &PipelineLayout,
  push_constants: &[u8], meshlet_count: u32,
) {
  unsafe {
    if !push_constants.is_empty() {
      device.cmd_push_constants(
        cmd,
        pipeline_layout.handle,
        SHADER_STAGE_TASK_NV,
        0,
        push_constants,
      );
    }
    functions.cmd_draw_mesh_tasks_nv(cmd, meshlet_count, 0);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn task_and_mesh_stage_bits_do_not_collide_with_known_stages() {
    assert!(!vk::ShaderStageFlags::VERTEX.contains(SHADER_STAGE_TASK_NV));
    assert!(!vk::ShaderStageFlags::FRAGMENT.contains(SHADER_STAGE_MESH_NV));
    assert_ne!(SHADER_STAGE_TASK_NV, SHADER_STAGE_MESH_NV);
  }
}
