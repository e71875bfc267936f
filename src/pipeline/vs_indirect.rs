//! VS-indirect graphics + compute pipelines (spec §4.I): per-vertex
//! attributes plus a storage buffer of per-model constants, an
//! indirect-argument buffer, and a counter buffer written by a
//! compute-frustum-culling pass; draw call is one
//! `DrawIndexedIndirectCount` per bundle. Grounded on the same
//! `create_base_graphics_pipeline` shape as
//! [`crate::pipeline::vs_individual`], generalized with a compute pipeline
//! the teacher has no equivalent of (`sarekt` never culls) -- the compute
//! side is new code following the graphics-pipeline builder's structure
//! (`vk::ComputePipelineCreateInfo` mirrors `vk::GraphicsPipelineCreateInfo`'s
//! single-stage + layout shape).
use crate::{
  error::TerraResult,
  pipeline::{layout::PipelineLayout, shader, vs_individual::build_common},
  vertex::Vertex,
};
use ash::{extensions::khr::DrawIndirectCount, version::DeviceV1_0, vk, Device};
use std::ffi::CStr;

fn entry_point() -> &'static CStr {
  CStr::from_bytes_with_nul(b"main\0").unwrap()
}

/// Builds the VS-indirect graphics pipeline for one fragment shader name.
pub fn create_pipeline(
  device: &Device, shader_path: &str, fragment_shader_name: &str, pipeline_layout: &PipelineLayout,
  render_pass: vk::RenderPass, extent: vk::Extent2D,
) -> TerraResult<vk::Pipeline> {
  let vertex_module = shader::load_shader_module(device, shader_path, "VertexShaderIndirect")?;
  let fragment_module = match shader::load_shader_module(device, shader_path, fragment_shader_name) {
    Ok(module) => module,
    Err(e) => {
      unsafe { device.destroy_shader_module(vertex_module, None) };
      return Err(e);
    }
  };

  let stages = [
    vk::PipelineShaderStageCreateInfo::builder()
      .stage(vk::ShaderStageFlags::VERTEX)
      .module(vertex_module)
      .name(entry_point())
      .build(),
    vk::PipelineShaderStageCreateInfo::builder()
      .stage(vk::ShaderStageFlags::FRAGMENT)
      .module(fragment_module)
      .name(entry_point())
      .build(),
  ];

  let binding_descriptions = [Vertex::binding_description()];
  let attribute_descriptions = Vertex::attribute_descriptions();
  let vertex_input_ci = vk::PipelineVertexInputStateCreateInfo::builder()
    .vertex_binding_descriptions(&binding_descriptions)
    .vertex_attribute_descriptions(&attribute_descriptions)
    .build();

  let pipeline = build_common(device, &stages, &vertex_input_ci, pipeline_layout, render_pass, extent);

  unsafe {
    device.destroy_shader_module(vertex_module, None);
    device.destroy_shader_module(fragment_module, None);
  }
  pipeline
}

/// Records one `DrawIndexedIndirectCount` call (spec §4.I table): the
/// indirect-argument buffer and counter buffer were populated by the
/// culling compute pass this same frame. Binds the bundle's global
/// vertex/index buffers at offset 0 -- `firstIndex`/`vertexOffset` per draw
/// come from the indirect command entries the compute shader wrote, not
/// from a CPU-side offset here.
#[allow(clippy::too_many_arguments)]
pub fn record_draw(
  device: &Device, draw_indirect_count: &DrawIndirectCount, cmd: vk::CommandBuffer, vertex_buffer: vk::Buffer,
  index_buffer: vk::Buffer, indirect_buffer: vk::Buffer, indirect_offset: u64, count_buffer: vk::Buffer,
  count_offset: u64, max_draw_count: u32,
) {
  unsafe {
    device.cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer], &[0]);
    device.cmd_bind_index_buffer(cmd, index_buffer, 0, vk::IndexType::UINT32);
    draw_indirect_count.cmd_draw_indexed_indirect_count(
      cmd,
      indirect_buffer,
      indirect_offset,
      count_buffer,
      count_offset,
      max_draw_count,
      std::mem::size_of::<vk::DrawIndexedIndirectCommand>() as u32,
    );
  }
}

/// Builds the frustum-culling compute pipeline (`ComputeShader.spv`, spec
/// §6) that writes the indirect-argument buffer and counter buffer
/// `create_pipeline`'s draw call reads. Culling is per-model (spec §9 Open
/// Question, resolved in DESIGN.md).
pub fn create_culling_pipeline(
  device: &Device, shader_path: &str, pipeline_layout: &PipelineLayout,
) -> TerraResult<vk::Pipeline> {
  let compute_module = shader::load_shader_module(device, shader_path, "ComputeShader")?;

  let stage = vk::PipelineShaderStageCreateInfo::builder()
    .stage(vk::ShaderStageFlags::COMPUTE)
    .module(compute_module)
    .name(entry_point())
    .build();
  let pipeline_ci = vk::ComputePipelineCreateInfo::builder()
    .stage(stage)
    .layout(pipeline_layout.handle)
    .build();

  let result = unsafe {
    device
      .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_ci], None)
      .map_err(|(_, e)| e)
  };
  unsafe { device.destroy_shader_module(compute_module, None) };
  Ok(result?[0])
}
