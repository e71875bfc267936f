//! Forward render pass: one color attachment (swapchain format,
//! CLEAR→STORE, UNDEFINED→PRESENT_SRC) plus one depth attachment
//! (D32_SFLOAT, CLEAR→DONT_CARE), one subpass, one external dependency
//! (spec §4.L). Grounded on the teacher's
//! `vulkan_renderer/pipelines.rs::create_forward_render_pass`.
use crate::{error::TerraResult, swapchain::depth::DEPTH_FORMAT};
use ash::{version::DeviceV1_0, vk, Device};

pub fn create_forward_render_pass(device: &Device, color_format: vk::Format) -> TerraResult<vk::RenderPass> {
  let color_attachment = vk::AttachmentDescription::builder()
    .format(color_format)
    .samples(vk::SampleCountFlags::TYPE_1)
    .load_op(vk::AttachmentLoadOp::CLEAR)
    .store_op(vk::AttachmentStoreOp::STORE)
    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
    .initial_layout(vk::ImageLayout::UNDEFINED)
    .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
    .build();
  let color_attachment_ref = vk::AttachmentReference::builder()
    .attachment(0)
    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
    .build();
  let color_attachment_refs = [color_attachment_ref];

  let depth_attachment = vk::AttachmentDescription::builder()
    .format(DEPTH_FORMAT)
    .samples(vk::SampleCountFlags::TYPE_1)
    .load_op(vk::AttachmentLoadOp::CLEAR)
    .store_op(vk::AttachmentStoreOp::DONT_CARE)
    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
    .initial_layout(vk::ImageLayout::UNDEFINED)
    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
    .build();
  let depth_attachment_ref = vk::AttachmentReference::builder()
    .attachment(1)
    .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
    .build();

  let attachments = [color_attachment, depth_attachment];

  let subpass = vk::SubpassDescription::builder()
    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
    .color_attachments(&color_attachment_refs)
    .depth_stencil_attachment(&depth_attachment_ref)
    .build();
  let subpasses = [subpass];

  let dependency = vk::SubpassDependency::builder()
    .src_subpass(vk::SUBPASS_EXTERNAL)
    .dst_subpass(0)
    .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
    .src_access_mask(vk::AccessFlags::empty())
    .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
    .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
    .build();
  let dependencies = [dependency];

  let render_pass_ci = vk::RenderPassCreateInfo::builder()
    .attachments(&attachments)
    .subpasses(&subpasses)
    .dependencies(&dependencies)
    .build();

  Ok(unsafe { device.create_render_pass(&render_pass_ci, None)? })
}
