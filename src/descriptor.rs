//! `DescriptorSetLayout` and `DescriptorBuffer` (spec §4.F). The teacher
//! writes descriptors directly at draw-call sites
//! (`renderer/vulkan/vulkan_renderer/mod.rs`'s
//! `create_default_descriptor_set_layouts`/update calls inlined into
//! pipeline creation); here that's pulled out into its own reusable type
//! since three engine variants share the same binding model. Per spec §9's
//! Open Question, follows the `library/` variant: a `DescriptorBuffer`
//! that owns one physical descriptor pool + one set per frame slot (the
//! classic-descriptor-set implementation choice spec §4.F explicitly
//! allows), not the newer `VK_EXT_descriptor_buffer` extension.
use crate::error::{TerraError, TerraResult};
use ash::{version::DeviceV1_0, vk, Device};
use std::sync::Arc;

/// One binding: `(binding_index, descriptor_type, count, stage_flags,
/// binding_flags)` (spec §4.F).
#[derive(Copy, Clone, Debug)]
pub struct DescriptorBinding {
  pub binding: u32,
  pub descriptor_type: vk::DescriptorType,
  pub count: u32,
  pub stage_flags: vk::ShaderStageFlags,
  pub binding_flags: vk::DescriptorBindingFlags,
}

/// A sequence of bindings, created once per render-engine variant.
pub struct DescriptorSetLayout {
  device: Arc<Device>,
  pub handle: vk::DescriptorSetLayout,
  pub bindings: Vec<DescriptorBinding>,
}
impl DescriptorSetLayout {
  pub fn new(device: Arc<Device>, bindings: Vec<DescriptorBinding>) -> TerraResult<Self> {
    let vk_bindings: Vec<_> = bindings
      .iter()
      .map(|b| {
        vk::DescriptorSetLayoutBinding::builder()
          .binding(b.binding)
          .descriptor_type(b.descriptor_type)
          .descriptor_count(b.count)
          .stage_flags(b.stage_flags)
          .build()
      })
      .collect();
    let binding_flags: Vec<_> = bindings.iter().map(|b| b.binding_flags).collect();

    let mut flags_ci = vk::DescriptorSetLayoutBindingFlagsCreateInfo::builder()
      .binding_flags(&binding_flags)
      .build();
    let layout_flags = Self::layout_flags_for(&bindings);
    let layout_ci = vk::DescriptorSetLayoutCreateInfo::builder()
      .bindings(&vk_bindings)
      .flags(layout_flags)
      .push_next(&mut flags_ci)
      .build();

    let handle = unsafe { device.create_descriptor_set_layout(&layout_ci, None)? };
    Ok(Self {
      device,
      handle,
      bindings,
    })
  }

  /// VUID-VkDescriptorSetLayoutCreateInfo-flags-03000: the layout must carry
  /// `UPDATE_AFTER_BIND_POOL` whenever any of its bindings does, since
  /// allocating from `DescriptorBuffer`'s `UPDATE_AFTER_BIND` pool (below)
  /// requires the layout flag to match.
  fn layout_flags_for(bindings: &[DescriptorBinding]) -> vk::DescriptorSetLayoutCreateFlags {
    if bindings
      .iter()
      .any(|b| b.binding_flags.contains(vk::DescriptorBindingFlags::UPDATE_AFTER_BIND))
    {
      vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL
    } else {
      vk::DescriptorSetLayoutCreateFlags::empty()
    }
  }
}
impl Drop for DescriptorSetLayout {
  fn drop(&mut self) {
    unsafe {
      self.device.destroy_descriptor_set_layout(self.handle, None);
    }
  }
}

/// One descriptor pool + one set per frame slot, bound against one
/// [`DescriptorSetLayout`]. "Bindings with `UPDATE_AFTER_BIND_BIT` may be
/// rewritten between frames; non-variable bindings are written once" (spec
/// §4.F invariant).
pub struct DescriptorBuffer {
  device: Arc<Device>,
  pool: vk::DescriptorPool,
  pub sets: Vec<vk::DescriptorSet>,
}
impl DescriptorBuffer {
  pub fn new(device: Arc<Device>, layout: &DescriptorSetLayout, frame_slot_count: u32) -> TerraResult<Self> {
    let pool_sizes: Vec<_> = layout
      .bindings
      .iter()
      .map(|b| {
        vk::DescriptorPoolSize::builder()
          .ty(b.descriptor_type)
          .descriptor_count(b.count * frame_slot_count)
          .build()
      })
      .collect();

    let pool_ci = vk::DescriptorPoolCreateInfo::builder()
      .pool_sizes(&pool_sizes)
      .max_sets(frame_slot_count)
      .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
      .build();
    let pool = unsafe { device.create_descriptor_pool(&pool_ci, None)? };

    let layouts = vec![layout.handle; frame_slot_count as usize];
    let alloc_info = vk::DescriptorSetAllocateInfo::builder()
      .descriptor_pool(pool)
      .set_layouts(&layouts)
      .build();
    let sets = unsafe { device.allocate_descriptor_sets(&alloc_info)? };

    Ok(Self { device, pool, sets })
  }

  pub fn set(&self, frame_index: usize) -> TerraResult<vk::DescriptorSet> {
    self.sets.get(frame_index).copied().ok_or(TerraError::UnknownResource)
  }

  pub fn frame_slot_count(&self) -> usize {
    self.sets.len()
  }

  /// Binds a buffer range to `binding`/`array_index` in every frame slot's
  /// set (non-variable bindings are written once per spec §4.F).
  pub fn bind_buffer_all_frames(
    &self, binding: u32, array_index: u32, descriptor_type: vk::DescriptorType, buffer: vk::Buffer,
    offset: u64, range: u64,
  ) {
    let buffer_info = vk::DescriptorBufferInfo::builder()
      .buffer(buffer)
      .offset(offset)
      .range(range)
      .build();
    let buffer_infos = [buffer_info];
    for &set in &self.sets {
      let write = vk::WriteDescriptorSet::builder()
        .dst_set(set)
        .dst_binding(binding)
        .dst_array_element(array_index)
        .descriptor_type(descriptor_type)
        .buffer_info(&buffer_infos)
        .build();
      unsafe { self.device.update_descriptor_sets(&[write], &[]) };
    }
  }

  /// Binds one frame slot's buffer range, for per-frame resources like the
  /// camera uniform (spec §4.F `BindBuffer`).
  pub fn bind_buffer(
    &self, frame_index: usize, binding: u32, array_index: u32, descriptor_type: vk::DescriptorType,
    buffer: vk::Buffer, offset: u64, range: u64,
  ) -> TerraResult<()> {
    let set = self.set(frame_index)?;
    let buffer_info = vk::DescriptorBufferInfo::builder()
      .buffer(buffer)
      .offset(offset)
      .range(range)
      .build();
    let buffer_infos = [buffer_info];
    let write = vk::WriteDescriptorSet::builder()
      .dst_set(set)
      .dst_binding(binding)
      .dst_array_element(array_index)
      .descriptor_type(descriptor_type)
      .buffer_info(&buffer_infos)
      .build();
    unsafe { self.device.update_descriptor_sets(&[write], &[]) };
    Ok(())
  }

  /// Binds an image view + sampler into a variable-count (bindless-style)
  /// texture array binding (spec §4.F `BindImage`); `UPDATE_AFTER_BIND_BIT`
  /// makes it safe to rewrite between frames without waiting for idle.
  pub fn bind_image(
    &self, frame_index: usize, binding: u32, array_index: u32, image_view: vk::ImageView,
    sampler: vk::Sampler,
  ) -> TerraResult<()> {
    let set = self.set(frame_index)?;
    let image_info = vk::DescriptorImageInfo::builder()
      .image_view(image_view)
      .sampler(sampler)
      .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
      .build();
    let image_infos = [image_info];
    let write = vk::WriteDescriptorSet::builder()
      .dst_set(set)
      .dst_binding(binding)
      .dst_array_element(array_index)
      .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
      .image_info(&image_infos)
      .build();
    unsafe { self.device.update_descriptor_sets(&[write], &[]) };
    Ok(())
  }

  /// Binds an image view + sampler into `binding`/`array_index` in every
  /// frame slot's set. Used for the bindless texture array, whose contents
  /// are identical across frame slots (spec §4.N `AddTexture`: the new
  /// texture must be visible to whichever frame slot renders next).
  pub fn bind_image_all_frames(
    &self, binding: u32, array_index: u32, image_view: vk::ImageView, sampler: vk::Sampler,
  ) {
    let image_info = vk::DescriptorImageInfo::builder()
      .image_view(image_view)
      .sampler(sampler)
      .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
      .build();
    let image_infos = [image_info];
    for &set in &self.sets {
      let write = vk::WriteDescriptorSet::builder()
        .dst_set(set)
        .dst_binding(binding)
        .dst_array_element(array_index)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(&image_infos)
        .build();
      unsafe { self.device.update_descriptor_sets(&[write], &[]) };
    }
  }
}
impl Drop for DescriptorBuffer {
  fn drop(&mut self) {
    unsafe {
      self.device.destroy_descriptor_pool(self.pool, None);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn binding(binding_flags: vk::DescriptorBindingFlags) -> DescriptorBinding {
    DescriptorBinding {
      binding: 0,
      descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
      count: 1,
      stage_flags: vk::ShaderStageFlags::VERTEX,
      binding_flags,
    }
  }

  #[test]
  fn layout_flags_carry_update_after_bind_pool_when_any_binding_needs_it() {
    let bindings = vec![
      binding(vk::DescriptorBindingFlags::empty()),
      binding(vk::DescriptorBindingFlags::UPDATE_AFTER_BIND | vk::DescriptorBindingFlags::PARTIALLY_BOUND),
    ];
    assert_eq!(
      DescriptorSetLayout::layout_flags_for(&bindings),
      vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL
    );
  }

  #[test]
  fn layout_flags_are_empty_when_no_binding_uses_update_after_bind() {
    let bindings = vec![binding(vk::DescriptorBindingFlags::empty())];
    assert_eq!(
      DescriptorSetLayout::layout_flags_for(&bindings),
      vk::DescriptorSetLayoutCreateFlags::empty()
    );
  }
}
