//! `PipelineLayout` (spec §4.G): aggregates descriptor-set layouts and
//! push-constant ranges, the latter accumulated contiguously -- each
//! `add_push_constant_range` call appends `(stage, current_offset, size)`
//! and advances `current_offset += size` (spec §8 invariant 5). Grounded on
//! the teacher's `create_pipeline_layout`
//! (`renderer/vulkan/vulkan_renderer/pipelines.rs`), which builds a single
//! fixed layout inline; here it's a reusable builder since three engine
//! variants each need a different push-constant shape.
use crate::error::TerraResult;
use ash::{version::DeviceV1_0, vk, Device};
use std::sync::Arc;

/// Accumulates push-constant ranges before a `PipelineLayout` is built.
#[derive(Default)]
pub struct PipelineLayoutBuilder {
  descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
  ranges: Vec<vk::PushConstantRange>,
  current_offset: u32,
}
impl PipelineLayoutBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_descriptor_set_layout(mut self, layout: vk::DescriptorSetLayout) -> Self {
    self.descriptor_set_layouts.push(layout);
    self
  }

  /// Appends `(stage, current_offset, size)` and advances `current_offset`
  /// by `size` (spec §4.G). Returns the offset assigned to this range so
  /// callers can record it for use in push-constant writes.
  pub fn add_push_constant_range(&mut self, stage: vk::ShaderStageFlags, size: u32) -> u32 {
    let offset = self.current_offset;
    self.ranges.push(
      vk::PushConstantRange::builder()
        .stage_flags(stage)
        .offset(offset)
        .size(size)
        .build(),
    );
    self.current_offset += size;
    offset
  }

  pub fn build(self, device: Arc<Device>) -> TerraResult<PipelineLayout> {
    let layout_ci = vk::PipelineLayoutCreateInfo::builder()
      .set_layouts(&self.descriptor_set_layouts)
      .push_constant_ranges(&self.ranges)
      .build();
    let handle = unsafe { device.create_pipeline_layout(&layout_ci, None)? };
    Ok(PipelineLayout {
      device,
      handle,
      ranges: self.ranges,
    })
  }
}

/// One `vk::PipelineLayout`, destroyed on drop.
pub struct PipelineLayout {
  device: Arc<Device>,
  pub handle: vk::PipelineLayout,
  pub ranges: Vec<vk::PushConstantRange>,
}
impl Drop for PipelineLayout {
  fn drop(&mut self) {
    unsafe {
      self.device.destroy_pipeline_layout(self.handle, None);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn push_constant_ranges_are_contiguous() {
    let mut builder = PipelineLayoutBuilder::new();
    let offset_a = builder.add_push_constant_range(vk::ShaderStageFlags::VERTEX, 16);
    let offset_b = builder.add_push_constant_range(vk::ShaderStageFlags::FRAGMENT, 8);
    let offset_c = builder.add_push_constant_range(vk::ShaderStageFlags::COMPUTE, 4);

    assert_eq!(offset_a, 0);
    assert_eq!(offset_b, 16);
    assert_eq!(offset_c, 24);
    assert_eq!(builder.current_offset, 28);

    for window in builder.ranges.windows(2) {
      assert_eq!(window[1].offset, window[0].offset + window[0].size);
    }
  }
}
