//! VS-individual graphics pipeline (spec §4.I): vertex + fragment shaders,
//! per-vertex attributes, one `DrawIndexed` per model. Grounded on the
//! teacher's `create_base_graphics_pipeline`
//! (`renderer/vulkan/vulkan_renderer/pipelines.rs`), generalized to take a
//! per-bundle fragment shader name instead of one fixed default fragment
//! shader.
use crate::{
  error::TerraResult,
  pipeline::{layout::PipelineLayout, shader},
  vertex::Vertex,
};
use ash::{version::DeviceV1_0, vk, Device};
use std::ffi::CStr;

fn entry_point() -> &'static CStr {
  CStr::from_bytes_with_nul(b"main\0").unwrap()
}

/// Builds the VS-individual graphics pipeline for one fragment shader name.
/// `VertexShaderIndividual.spv` is fixed per spec §6; `fragment_shader_name`
/// is per-bundle and pipelines with identical names are coalesced by the
/// caller ([`crate::model::model_manager::ModelManager`]) before this is
/// invoked.
#[allow(clippy::too_many_arguments)]
pub fn create_pipeline(
  device: &Device, shader_path: &str, fragment_shader_name: &str, pipeline_layout: &PipelineLayout,
  render_pass: vk::RenderPass, extent: vk::Extent2D,
) -> TerraResult<vk::Pipeline> {
  let vertex_module = shader::load_shader_module(device, shader_path, "VertexShaderIndividual")?;
  let fragment_module = shader::load_shader_module(device, shader_path, fragment_shader_name);
  let fragment_module = match fragment_module {
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

/// Records one `DrawIndexed` call (spec §4.I table): binds the mesh's
/// vertex/index sub-ranges out of the global shared buffers, pushes
/// `push_constants` at offset 0, and draws `index_count` indices,
/// `instance_count` times (one instance per model in the bundle; the
/// vertex shader indexes into the bound model-constant storage buffer with
/// `gl_InstanceIndex`). The caller (`ModelManager::render`) has already
/// bound the pipeline, pipeline layout, and descriptor set for this frame.
#[allow(clippy::too_many_arguments)]
pub fn record_draw(
  device: &Device, cmd: vk::CommandBuffer, vertex_buffer: vk::Buffer, index_buffer: vk::Buffer,
  vertex_offset: u64, index_offset: u64, index_count: u32, instance_count: u32, pipeline_layout: &PipelineLayout,
  push_constants: &[u8],
) {
  unsafe {
    device.cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer], &[vertex_offset]);
    device.cmd_bind_index_buffer(cmd, index_buffer, index_offset, vk::IndexType::UINT32);
    if !push_constants.is_empty() {
      device.cmd_push_constants(cmd, pipeline_layout.handle, vk::ShaderStageFlags::VERTEX, 0, push_constants);
    }
    device.cmd_draw_indexed(cmd, index_count, instance_count, 0, 0, 0);
  }
}

/// The viewport/rasterization/multisample/depth/blend state shared by every
/// graphics pipeline variant (spec §4.I table); only the shader stages and
/// vertex input state differ between variants.
pub(super) fn build_common(
  device: &Device, stages: &[vk::PipelineShaderStageCreateInfo],
  vertex_input_ci: &vk::PipelineVertexInputStateCreateInfo, pipeline_layout: &PipelineLayout,
  render_pass: vk::RenderPass, extent: vk::Extent2D,
) -> TerraResult<vk::Pipeline> {
  let input_assembly_ci = vk::PipelineInputAssemblyStateCreateInfo::builder()
    .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
    .primitive_restart_enable(false)
    .build();

  // Viewport and scissor are dynamic state (crate::display::ViewportAndScissor
  // sets them per-frame via cmd_set_viewport/cmd_set_scissor), so only the
  // counts matter here; `extent` is unused once the dynamic state lands but
  // is kept as a parameter so callers don't need to special-case the first
  // pipeline built before any resize.
  let _ = extent;
  let viewport_state_ci = vk::PipelineViewportStateCreateInfo::builder()
    .viewport_count(1)
    .scissor_count(1)
    .build();
  let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
  let dynamic_state_ci = vk::PipelineDynamicStateCreateInfo::builder()
    .dynamic_states(&dynamic_states)
    .build();

  let raster_state_ci = vk::PipelineRasterizationStateCreateInfo::builder()
    .depth_clamp_enable(false)
    .rasterizer_discard_enable(false)
    .polygon_mode(vk::PolygonMode::FILL)
    .line_width(1.0)
    .cull_mode(vk::CullModeFlags::BACK)
    .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
    .depth_bias_enable(false)
    .build();

  let multisample_state_ci = vk::PipelineMultisampleStateCreateInfo::builder()
    .sample_shading_enable(false)
    .rasterization_samples(vk::SampleCountFlags::TYPE_1)
    .min_sample_shading(1.0)
    .build();

  let depth_stencil_ci = vk::PipelineDepthStencilStateCreateInfo::builder()
    .depth_test_enable(true)
    .depth_write_enable(true)
    .depth_compare_op(vk::CompareOp::LESS)
    .depth_bounds_test_enable(false)
    .min_depth_bounds(0.0)
    .max_depth_bounds(1.0)
    .stencil_test_enable(false)
    .build();

  let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
    .color_write_mask(vk::ColorComponentFlags::all())
    .blend_enable(false)
    .build();
  let color_blend_attachments = [color_blend_attachment];
  let color_blend_ci = vk::PipelineColorBlendStateCreateInfo::builder()
    .logic_op_enable(false)
    .logic_op(vk::LogicOp::COPY)
    .attachments(&color_blend_attachments)
    .build();

  let pipeline_ci = vk::GraphicsPipelineCreateInfo::builder()
    .stages(stages)
    .vertex_input_state(vertex_input_ci)
    .input_assembly_state(&input_assembly_ci)
    .viewport_state(&viewport_state_ci)
    .rasterization_state(&raster_state_ci)
    .multisample_state(&multisample_state_ci)
    .depth_stencil_state(&depth_stencil_ci)
    .color_blend_state(&color_blend_ci)
    .dynamic_state(&dynamic_state_ci)
    .layout(pipeline_layout.handle)
    .render_pass(render_pass)
    .subpass(0)
    .build();

  let pipelines = unsafe {
    device
      .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_ci], None)
      .map_err(|(_, e)| e)?
  };
  Ok(pipelines[0])
}
