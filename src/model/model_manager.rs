//! `ModelManager` (spec §4.J): owns `Vec<ModelBundle>`, coalesces bundles
//! with identical fragment-shader names into one pipeline (spec §4.I "MUST
//! coalesce"), and drives the generic `Render` algorithm shared by all
//! three draw-path variants. Variant-specific behavior (which pipeline gets
//! built, which draw call gets issued) is injected by the caller
//! ([`crate::engine`]) rather than branched on here, so this file has no
//! knowledge of `IndividualDraw`/`IndirectDraw`/`MeshDraw`.
use crate::{
  descriptor::DescriptorBuffer,
  error::{TerraError, TerraResult},
  memory::SharedMemoryManager,
  model::mesh_manager::{MeshBundle, MeshManager},
  pipeline::layout::PipelineLayout,
  resources::shared_buffer::{SharedBuffer, SharedBufferData},
  staging::StagingBufferManager,
  temporary_data::TemporaryDataBuffer,
  thread_pool::JobPool,
  vertex::ModelConstant,
};
use ash::{version::DeviceV1_0, vk, Device};
use std::sync::Arc;
use ultraviolet::Mat4;

/// One instance within a bundle (spec §6 `ModelConstant`, minus std140
/// padding -- the padding is reintroduced when the instance is written
/// into the constant buffer).
#[derive(Copy, Clone, Debug)]
pub struct ModelInstance {
  pub model_matrix: Mat4,
  pub uv_info: [f32; 4],
  pub texture_index: u32,
  pub model_offset: ultraviolet::Vec3,
}

/// A group of model instances sharing one mesh and one fragment shader
/// (spec §3 `ModelBundle`).
pub struct ModelBundle {
  pub models: Vec<ModelInstance>,
  pub mesh_id: usize,
  pub fragment_shader_name: String,
  pub pipeline_index: usize,
  pub constant_range: SharedBufferData,
}

/// Builds the graphics pipeline for one fragment shader name. Every
/// variant's `create_pipeline` (`vs_individual`, `vs_indirect`,
/// `mesh_shader`) shares this exact signature, so `ModelManager` can stay
/// agnostic to which one it was constructed with.
pub type PipelineFactory =
  fn(&Device, &str, &str, &PipelineLayout, vk::RenderPass, vk::Extent2D) -> TerraResult<vk::Pipeline>;

pub struct ModelManager {
  device: Arc<Device>,
  shader_path: String,
  pipeline_factory: PipelineFactory,
  pipelines: Vec<vk::Pipeline>,
  pipeline_names: Vec<String>,
  bundles: Vec<ModelBundle>,
  constant_buffer: SharedBuffer,
}
impl ModelManager {
  pub fn new(
    device: Arc<Device>, memory_manager: SharedMemoryManager, queue_family_indices: Vec<u32>,
    initial_constant_pool_size: u64, shader_path: String, pipeline_factory: PipelineFactory,
  ) -> TerraResult<Self> {
    let constant_buffer = SharedBuffer::new(
      device.clone(),
      memory_manager,
      initial_constant_pool_size,
      vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC,
      vk::MemoryPropertyFlags::DEVICE_LOCAL,
      queue_family_indices,
    )?;
    Ok(Self {
      device,
      shader_path,
      pipeline_factory,
      pipelines: Vec::new(),
      pipeline_names: Vec::new(),
      bundles: Vec::new(),
      constant_buffer,
    })
  }

  pub fn constant_buffer_handle(&self) -> vk::Buffer {
    self.constant_buffer.handle()
  }

  fn resolve_pipeline_index(
    &mut self, fragment_shader_name: &str, pipeline_layout: &PipelineLayout, render_pass: vk::RenderPass,
    extent: vk::Extent2D,
  ) -> TerraResult<usize> {
    if let Some(index) = self.pipeline_names.iter().position(|name| name == fragment_shader_name) {
      return Ok(index);
    }
    let pipeline = (self.pipeline_factory)(
      &self.device,
      &self.shader_path,
      fragment_shader_name,
      pipeline_layout,
      render_pass,
      extent,
    )?;
    self.pipelines.push(pipeline);
    self.pipeline_names.push(fragment_shader_name.to_owned());
    Ok(self.pipelines.len() - 1)
  }

  /// `AddModelBundle` (spec §4.J): reserves and uploads the constant
  /// buffer range, coalesces the pipeline, and registers the bundle.
  /// Per spec §4.I's edge case, a shader load failure leaves the bundle
  /// un-registered and surfaces the error rather than registering a
  /// non-drawable bundle -- callers can retry with a corrected
  /// `shader_path`/name.
  #[allow(clippy::too_many_arguments)]
  pub fn add_model_bundle(
    &mut self, models: Vec<ModelInstance>, fragment_shader_name: &str, mesh_id: usize, mesh_manager: &MeshManager,
    pipeline_layout: &PipelineLayout, render_pass: vk::RenderPass, extent: vk::Extent2D,
    staging: &mut StagingBufferManager, job_pool: &dyn JobPool, temp_data: &mut TemporaryDataBuffer,
    current_frame: usize,
  ) -> TerraResult<usize> {
    if models.is_empty() {
      return Err(TerraError::InvalidArgument("model bundle requires at least one instance"));
    }
    mesh_manager.get(mesh_id)?;

    let pipeline_index = self.resolve_pipeline_index(fragment_shader_name, pipeline_layout, render_pass, extent)?;

    let constant_size = (models.len() * std::mem::size_of::<ModelConstant>()) as u64;
    // Aligning to the full element size (not just `align_of`) keeps every
    // reservation's offset an exact multiple of `size_of::<ModelConstant>()`,
    // so engines can recover a model-constant array index as
    // `offset / size_of::<ModelConstant>()` for push constants instead of
    // threading a separate element index through `ModelBundle`.
    let constant_range = self.constant_buffer.reserve(
      constant_size,
      std::mem::size_of::<ModelConstant>() as u64,
      staging,
      temp_data,
      current_frame,
    )?;

    let mesh = mesh_manager.get(mesh_id)?;
    let constants: Vec<ModelConstant> = models
      .iter()
      .map(|m| {
        ModelConstant::new(
          m.uv_info,
          m.model_matrix,
          m.texture_index,
          m.model_offset,
          mesh.positive_bounds,
          mesh.negative_bounds,
        )
      })
      .collect();
    let bytes = unsafe {
      std::slice::from_raw_parts(constants.as_ptr() as *const u8, std::mem::size_of_val(constants.as_slice()))
    };
    staging.enqueue_buffer_upload(bytes, self.constant_buffer.handle(), constant_range.offset, job_pool)?;

    self.bundles.push(ModelBundle {
      models,
      mesh_id,
      fragment_shader_name: fragment_shader_name.to_owned(),
      pipeline_index,
      constant_range,
    });
    Ok(self.bundles.len() - 1)
  }

  /// Iterates every bundle outside of an active render pass instance, for
  /// engine variants whose per-bundle work (`vkCmdDispatch` culling) is
  /// illegal to record between `vkCmdBeginRenderPass`/`vkCmdEndRenderPass`.
  /// `VS-indirect`'s culling pre-pass is the only current caller.
  pub fn for_each_bundle<F>(&self, mesh_manager: &MeshManager, mut visit: F) -> TerraResult<()>
  where
    F: FnMut(usize, &ModelBundle, &MeshBundle),
  {
    for (bundle_id, bundle) in self.bundles.iter().enumerate() {
      let mesh = mesh_manager.get(bundle.mesh_id)?;
      visit(bundle_id, bundle, mesh);
    }
    Ok(())
  }

  /// `Render(cmd, frame_index)` (spec §4.J): for each pipeline, binds it
  /// plus the frame's descriptor set once, then for each bundle assigned
  /// to that pipeline hands the bundle and its mesh to `draw_bundle`,
  /// which records the variant's draw call (`vs_individual::record_draw`,
  /// `vs_indirect::record_draw`, or `mesh_shader::record_draw`).
  pub fn render<F>(
    &self, device: &Device, cmd: vk::CommandBuffer, frame_index: usize, pipeline_layout: &PipelineLayout,
    descriptor_buffer: &DescriptorBuffer, mesh_manager: &MeshManager, mut draw_bundle: F,
  ) -> TerraResult<()>
  where
    F: FnMut(&Device, vk::CommandBuffer, usize, &ModelBundle, &MeshBundle),
  {
    let set = descriptor_buffer.set(frame_index)?;
    for (pipeline_index, &pipeline) in self.pipelines.iter().enumerate() {
      unsafe {
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
        device.cmd_bind_descriptor_sets(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline_layout.handle, 0, &[set], &[]);
      }
      for (bundle_id, bundle) in self.bundles.iter().enumerate().filter(|(_, b)| b.pipeline_index == pipeline_index) {
        let mesh = mesh_manager.get(bundle.mesh_id)?;
        draw_bundle(device, cmd, bundle_id, bundle, mesh);
      }
    }
    Ok(())
  }
}
impl Drop for ModelManager {
  fn drop(&mut self) {
    unsafe {
      for &pipeline in &self.pipelines {
        self.device.destroy_pipeline(pipeline, None);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pipeline_names_with_identical_fragment_shader_coalesce() {
    // `resolve_pipeline_index` is exercised indirectly through
    // `add_model_bundle` in integration coverage (requires a device); here
    // we verify the pure lookup logic it relies on in isolation.
    let names = vec!["Opaque".to_owned(), "Glass".to_owned()];
    assert_eq!(names.iter().position(|n| n == "Opaque"), Some(0));
    assert_eq!(names.iter().position(|n| n == "Glass"), Some(1));
    assert_eq!(names.iter().position(|n| n == "Missing"), None);
  }
}
