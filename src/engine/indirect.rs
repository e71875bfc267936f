//! VS-indirect variant state (spec §4.I row 2): a compute-frustum-culling
//! pass writes an indirect-argument buffer and a counter buffer, which
//! `vkCmdDrawIndexedIndirectCount` consumes once per bundle. Per spec §9's
//! Open Question, culling is per-model.
use crate::{
  descriptor::DescriptorBinding, error::TerraResult, memory::SharedMemoryManager, resources::buffer::Buffer,
};
use ash::{extensions::khr::DrawIndirectCount, version::DeviceV1_0, vk, Device};
use std::sync::Arc;

pub const CAMERA_BINDING: u32 = 0;
pub const MODEL_CONSTANTS_BINDING: u32 = 1;
pub const TEXTURE_BINDING: u32 = 2;
pub const INDIRECT_ARGS_BINDING: u32 = 3;
pub const COUNTER_BINDING: u32 = 4;
pub const MAX_BOUND_TEXTURES: u32 = 256;

/// How many bundles can be culled independently in one frame. Every
/// bundle drawn through `VS-indirect` is assigned a slot (`bundle_id %
/// MAX_BUNDLES`); bundles beyond this count alias a slot already in use,
/// which is safe (culling and the matching indirect draw for a slot always
/// run back-to-back before the next bundle touches it) but wastes the
/// aliased slot's capacity.
pub const MAX_BUNDLES: u32 = 64;
/// Minimum storage-buffer offset alignment assumed for `counter_buffer`'s
/// per-slot regions; real hardware may allow a tighter stride but 256 is
/// always a multiple of `VkPhysicalDeviceLimits::minStorageBufferOffsetAlignment`.
pub const COUNTER_STRIDE: vk::DeviceSize = 256;

/// Per-compute-dispatch push constant: how many models to test this
/// dispatch (one bundle's instance count), where its indirect commands
/// land (`bundle_slot`), and the base index into the model-constant buffer
/// from which that bundle's instances start. Culling runs once per bundle,
/// before the render pass that eventually draws it.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct PushConstants {
  pub constant_base_index: u32,
  pub model_count: u32,
  pub bundle_slot: u32,
}
pub const PUSH_CONSTANT_SIZE: u32 = std::mem::size_of::<PushConstants>() as u32;

pub fn descriptor_bindings() -> Vec<DescriptorBinding> {
  let compute_and_vertex = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::COMPUTE;
  vec![
    DescriptorBinding {
      binding: CAMERA_BINDING,
      descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
      count: 1,
      stage_flags: compute_and_vertex,
      binding_flags: vk::DescriptorBindingFlags::empty(),
    },
    DescriptorBinding {
      binding: MODEL_CONSTANTS_BINDING,
      descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
      count: 1,
      stage_flags: compute_and_vertex,
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
      binding: INDIRECT_ARGS_BINDING,
      descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
      count: 1,
      stage_flags: vk::ShaderStageFlags::COMPUTE,
      binding_flags: vk::DescriptorBindingFlags::empty(),
    },
    DescriptorBinding {
      binding: COUNTER_BINDING,
      descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
      count: 1,
      stage_flags: vk::ShaderStageFlags::COMPUTE,
      binding_flags: vk::DescriptorBindingFlags::empty(),
    },
  ]
}

/// The buffers a culling dispatch writes and `DrawIndexedIndirectCount`
/// reads, plus the compute pipeline and the manually-loaded
/// `VK_KHR_draw_indirect_count` entry points.
pub struct IndirectState {
  device: Arc<Device>,
  pub compute_pipeline: vk::Pipeline,
  pub indirect_buffer: Buffer,
  pub counter_buffer: Buffer,
  pub draw_indirect_count: DrawIndirectCount,
  pub max_draw_count: u32,
}
impl IndirectState {
  /// `max_draw_count` is the per-bundle capacity: the indirect buffer
  /// actually allocated holds `max_draw_count * MAX_BUNDLES` commands, one
  /// contiguous region per bundle slot, and the counter buffer holds one
  /// `COUNTER_STRIDE`-aligned `u32` per slot.
  pub fn new(
    instance: &ash::Instance, device: Arc<Device>, memory_manager: SharedMemoryManager, compute_pipeline: vk::Pipeline,
    max_draw_count: u32, queue_family_indices: &[u32],
  ) -> TerraResult<Self> {
    let indirect_buffer = Buffer::create(
      device.clone(),
      &memory_manager,
      (max_draw_count as u64) * (MAX_BUNDLES as u64) * std::mem::size_of::<vk::DrawIndexedIndirectCommand>() as u64,
      vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER,
      queue_family_indices,
      vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    let counter_buffer = Buffer::create(
      device.clone(),
      &memory_manager,
      (MAX_BUNDLES as u64) * COUNTER_STRIDE,
      vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
      queue_family_indices,
      vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    let draw_indirect_count = DrawIndirectCount::new(instance, device.as_ref());
    Ok(Self {
      device,
      compute_pipeline,
      indirect_buffer,
      counter_buffer,
      draw_indirect_count,
      max_draw_count,
    })
  }

  /// Records the culling dispatch for one bundle's slot: zeroes that slot's
  /// counter region, then dispatches one workgroup per 64 models (spec §8
  /// scenario 4's "counter buffer equals the number of models inside the
  /// frustum"). `push_constants.bundle_slot` selects which region of
  /// `indirect_buffer`/`counter_buffer` this dispatch writes into -- the
  /// caller is responsible for deriving matching offsets for the later
  /// `vs_indirect::record_draw` call.
  pub fn dispatch_culling(
    &self, device: &Device, cmd: vk::CommandBuffer, pipeline_layout: &crate::pipeline::PipelineLayout,
    descriptor_set: vk::DescriptorSet, push_constants: PushConstants,
  ) {
    const WORKGROUP_SIZE: u32 = 64;
    let counter_offset = (push_constants.bundle_slot as vk::DeviceSize) * COUNTER_STRIDE;
    unsafe {
      device.cmd_fill_buffer(cmd, self.counter_buffer.handle, counter_offset, std::mem::size_of::<u32>() as u64, 0);
      let barrier = vk::BufferMemoryBarrier::builder()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE)
        .buffer(self.counter_buffer.handle)
        .offset(counter_offset)
        .size(std::mem::size_of::<u32>() as u64)
        .build();
      device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::COMPUTE_SHADER,
        vk::DependencyFlags::empty(),
        &[],
        &[barrier],
        &[],
      );

      device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, self.compute_pipeline);
      device.cmd_bind_descriptor_sets(
        cmd,
        vk::PipelineBindPoint::COMPUTE,
        pipeline_layout.handle,
        0,
        &[descriptor_set],
        &[],
      );
      let bytes = std::slice::from_raw_parts(
        &push_constants as *const PushConstants as *const u8,
        std::mem::size_of::<PushConstants>(),
      );
      device.cmd_push_constants(cmd, pipeline_layout.handle, vk::ShaderStageFlags::COMPUTE, 0, bytes);

      let group_count = (push_constants.model_count + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
      device.cmd_dispatch(cmd, group_count.max(1), 1, 1);

      let barrier = vk::BufferMemoryBarrier::builder()
        .src_access_mask(vk::AccessFlags::SHADER_WRITE)
        .dst_access_mask(vk::AccessFlags::INDIRECT_COMMAND_READ)
        .buffer(self.indirect_buffer.handle)
        .size(vk::WHOLE_SIZE)
        .build();
      let counter_barrier = vk::BufferMemoryBarrier::builder()
        .src_access_mask(vk::AccessFlags::SHADER_WRITE)
        .dst_access_mask(vk::AccessFlags::INDIRECT_COMMAND_READ)
        .buffer(self.counter_buffer.handle)
        .size(vk::WHOLE_SIZE)
        .build();
      device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::COMPUTE_SHADER,
        vk::PipelineStageFlags::DRAW_INDIRECT,
        vk::DependencyFlags::empty(),
        &[],
        &[barrier, counter_barrier],
        &[],
      );
    }
  }
}
impl Drop for IndirectState {
  fn drop(&mut self) {
    unsafe {
      self.device.destroy_pipeline(self.compute_pipeline, None);
    }
  }
}
