//! Terra is a Vulkan rendering runtime.
//!
//! Application code supplies model bundles, mesh data, texture pixels, and
//! per-frame camera state; Terra owns frame scheduling, GPU memory
//! management, staging/upload coordination, and presentation across three
//! interchangeable draw-path engines (indirect vertex, individual vertex,
//! mesh-shader).
//!
//! Entry point: [`create_terra_instance`].
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate memoffset;

pub mod camera;
pub mod config;
pub mod descriptor;
pub mod display;
pub mod engine;
pub mod error;
pub mod event;
pub mod image_data;
pub mod memory;
pub mod model;
pub mod pipeline;
pub mod renderer;
pub mod resources;
pub mod staging;
pub mod sync;
pub mod swapchain;
pub mod temporary_data;
pub mod thread_pool;
pub mod vertex;
pub mod vulkan_core;

pub use config::RendererConfig;
pub use engine::EngineKind;
pub use error::{TerraError, TerraResult};
pub use renderer::{create_terra_instance, Renderer};
