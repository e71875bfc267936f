//! Pipeline construction (spec §4.G-I): a reusable push-constant/descriptor
//! layout builder, the `.spv` loader, and one module per draw-path variant
//! (VS-individual, VS-indirect, MS).
pub mod layout;
pub mod mesh_shader;
pub mod shader;
pub mod vs_individual;
pub mod vs_indirect;

pub use layout::{PipelineLayout, PipelineLayoutBuilder};
