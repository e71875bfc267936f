//! Per-vertex and per-frame wire formats (spec §6), laid out exactly as
//! GLSL's std140/std430 rules expect so they can be copied byte-for-byte
//! into a mapped buffer. Grounded on the teacher's `Vertex2D`/`Vertex3D`
//! structs and its `offset_of!`-based `vk::VertexInputAttributeDescription`
//! construction (`renderer/vulkan/vulkan_vertex_bindings.rs`).
use ash::vk;
use ultraviolet::{Mat4, Vec2, Vec3};

/// `{ position: vec3, normal: vec3, uv: vec2 }`, 32 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct Vertex {
  pub position: Vec3,
  pub normal: Vec3,
  pub uv: Vec2,
}
static_assertions::const_assert_eq!(std::mem::size_of::<Vertex>(), 32);

impl Vertex {
  pub fn binding_description() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription::builder()
      .binding(0)
      .stride(std::mem::size_of::<Vertex>() as u32)
      .input_rate(vk::VertexInputRate::VERTEX)
      .build()
  }

  pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
    [
      vk::VertexInputAttributeDescription::builder()
        .binding(0)
        .location(0)
        .format(vk::Format::R32G32B32_SFLOAT)
        .offset(offset_of!(Vertex, position) as u32)
        .build(),
      vk::VertexInputAttributeDescription::builder()
        .binding(0)
        .location(1)
        .format(vk::Format::R32G32B32_SFLOAT)
        .offset(offset_of!(Vertex, normal) as u32)
        .build(),
      vk::VertexInputAttributeDescription::builder()
        .binding(0)
        .location(2)
        .format(vk::Format::R32G32_SFLOAT)
        .offset(offset_of!(Vertex, uv) as u32)
        .build(),
    ]
  }
}

/// `{ view: mat4x4, projection: mat4x4 }`, tightly packed, 128 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct CameraConstant {
  pub view: Mat4,
  pub projection: Mat4,
}
static_assertions::const_assert_eq!(std::mem::size_of::<CameraConstant>(), 128);

/// Per-model constant buffer entry, laid out per std140 vec3->vec4
/// promotion rules (spec §6).
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct ModelConstant {
  pub uv_info: [f32; 4],
  pub model_matrix: Mat4,
  pub texture_index: u32,
  _padding_0: [f32; 3],
  pub model_offset: Vec3,
  _padding_1: f32,
  pub positive_bounds: Vec3,
  _padding_2: f32,
  pub negative_bounds: Vec3,
  _padding_3: f32,
}
impl ModelConstant {
  pub fn new(
    uv_info: [f32; 4], model_matrix: Mat4, texture_index: u32, model_offset: Vec3,
    positive_bounds: Vec3, negative_bounds: Vec3,
  ) -> Self {
    Self {
      uv_info,
      model_matrix,
      texture_index,
      _padding_0: [0.0; 3],
      model_offset,
      _padding_1: 0.0,
      positive_bounds,
      _padding_2: 0.0,
      negative_bounds,
      _padding_3: 0.0,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn model_constant_matches_std140_size() {
    assert_eq!(std::mem::size_of::<ModelConstant>(), 144);
  }
}
