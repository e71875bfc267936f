//! `Renderer` and [`create_terra_instance`] (spec §4.N / §6): the public
//! entry point applications hold onto. Grounded on the teacher's top-level
//! `VulkanRenderer` (`renderer/vulkan/vulkan_renderer.rs`), which owned the
//! same stack (core, device, swapchain, draw state) behind one struct;
//! split here so each piece (`VulkanContext`, `Swapchain`, `RenderEngine`)
//! owns its own construction/teardown, with `Renderer` only sequencing them.
use crate::{
  config::RendererConfig,
  display::DisplayManager,
  engine::{RenderEngine, RenderEngineConfig},
  error::TerraResult,
  event::{TerraEvent, TerraEventType},
  image_data::ImageData,
  memory::{device_memory::MemoryManager, SharedMemoryManager},
  model::model_manager::ModelInstance,
  resources::texture::TextureHandle,
  thread_pool::{JobPool, RayonJobPool},
  vertex::Vertex,
  vulkan_core::VulkanContext,
};
use ash::version::InstanceV1_0;
use raw_window_handle::HasRawWindowHandle;
use std::sync::{Arc, RwLock};
use ultraviolet::Mat4;

/// Everything an application needs to drive one Vulkan rendering surface:
/// swapchain presentation, a [`RenderEngine`] for the configured draw path,
/// and the CPU-side job pool uploads run on (spec §4.N).
///
/// Field order matters: Rust drops struct fields top to bottom, and
/// `VulkanContext::drop` calls `vkDestroyDevice`, so every field whose own
/// `Drop` touches the device (`engine`, `swapchain`, `memory_manager`) must
/// be declared -- and therefore destroyed -- before `context`.
pub struct Renderer {
  engine: RenderEngine,
  swapchain: crate::swapchain::Swapchain,
  memory_manager: SharedMemoryManager,
  job_pool: Arc<dyn JobPool>,
  display_manager: DisplayManager,
  present_mode: crate::config::PresentMode,
  requested_width: u32,
  requested_height: u32,
  context: VulkanContext,
}
impl Renderer {
  fn new<W: HasRawWindowHandle>(
    window: &W, config: RendererConfig, job_pool: Arc<dyn JobPool>,
  ) -> TerraResult<Self> {
    let context = VulkanContext::new(
      window,
      config.application_details,
      config.engine_details,
      cfg!(debug_assertions),
    )?;

    let memory_properties = unsafe {
      context
        .instance()
        .get_physical_device_memory_properties(context.device.physical_device)
    };
    let memory_manager: SharedMemoryManager = Arc::new(RwLock::new(MemoryManager::new(
      context.device.logical_device.clone(),
      memory_properties,
      config.memory_config,
    )));

    let swapchain = crate::swapchain::Swapchain::new(
      context.core.instance.clone(),
      context.device.logical_device.clone(),
      memory_manager.clone(),
      context.device.physical_device,
      context.core.clone_surface_functions(),
      context.core.surface,
      context.device.queue_family_indices,
      config.requested_width,
      config.requested_height,
      config.present_mode,
      config.buffer_count,
    )?;

    let engine_config = RenderEngineConfig {
      engine_kind: config.engine_kind,
      shader_path: config.shader_path.clone(),
      buffer_count: config.buffer_count,
      initial_constant_pool_size: 1024 * 1024,
      initial_vertex_pool_size: 4 * 1024 * 1024,
      initial_index_pool_size: 1024 * 1024,
      initial_staging_arena_size: 4 * 1024 * 1024,
      indirect_max_draw_count: 1024,
    };
    let engine = RenderEngine::new(
      context.device.logical_device.clone(),
      context.core.instance.clone(),
      memory_manager.clone(),
      job_pool.clone(),
      context.device.queue_family_indices,
      context.device.queues.clone(),
      swapchain.render_pass,
      swapchain.extent,
      config.background_color,
      engine_config,
    )?;

    let display_manager = DisplayManager::new(
      context.instance(),
      context.device.physical_device,
      (config.requested_width, config.requested_height),
    );

    Ok(Self {
      engine,
      swapchain,
      memory_manager,
      job_pool,
      display_manager,
      present_mode: config.present_mode,
      requested_width: config.requested_width,
      requested_height: config.requested_height,
      context,
    })
  }

  /// `SetBackgroundColor` (spec §4.N).
  pub fn set_background_color(&mut self, color: [f32; 4]) {
    self.engine.set_background_color(color);
  }

  /// `SetCameraView`/`SetCameraProjection` (spec §4.N).
  pub fn set_camera_view(&mut self, view: Mat4) {
    self.engine.set_camera_view(view);
  }
  pub fn set_camera_projection(&mut self, projection: Mat4) {
    self.engine.set_camera_projection(projection);
  }

  /// Registers a callback invoked whenever `event_type` fires (spec §4.N
  /// event subscription). Returns a listener id, currently unused for
  /// removal -- matching spec §9's Open Question, listeners live for the
  /// `Renderer`'s lifetime.
  pub fn register_event_listener<F>(&mut self, event_type: TerraEventType, callback: F) -> usize
  where
    F: FnMut(&TerraEvent) + Send + 'static,
  {
    self.engine.register_event_listener(event_type, callback)
  }

  /// `AddMeshBundle` (spec §4.N).
  pub fn add_mesh_bundle(&mut self, vertices: &[Vertex], indices: &[u32], meshlet_count: u32) -> TerraResult<usize> {
    self.engine.add_mesh_bundle(vertices, indices, meshlet_count)
  }

  /// `AddModelBundle` (spec §4.N).
  pub fn add_model_bundle(
    &mut self, models: Vec<ModelInstance>, fragment_shader_name: &str, mesh_id: usize,
  ) -> TerraResult<usize> {
    self
      .engine
      .add_model_bundle(models, fragment_shader_name, mesh_id, self.swapchain.render_pass, self.swapchain.extent)
  }

  /// `AddTexture` (spec §4.N).
  pub fn add_texture(&mut self, pixels: impl ImageData) -> TerraResult<TextureHandle> {
    self.engine.add_texture(pixels)
  }

  /// `WaitForAsyncTasks` (spec §4.N): blocks until every queue this
  /// `Renderer` owns, and every outstanding CPU job, has drained. Needed
  /// before tearing the `Renderer` down and before a caller that wants a
  /// synchronous snapshot of GPU state (e.g. screenshot tooling).
  pub fn wait_for_async_tasks(&self) -> TerraResult<()> {
    self.engine.wait_idle()
  }

  /// `GetFirstDisplayResolution` (spec §4.N / §4.P).
  pub fn get_first_display_resolution(&self) -> (u32, u32) {
    self.display_manager.get_first_display_resolution()
  }

  pub fn display_count(&self) -> usize {
    self.display_manager.display_count()
  }

  pub fn get_display_resolution(&self, index: usize) -> TerraResult<(u32, u32)> {
    self.display_manager.get_display_resolution(index)
  }

  /// `Resize` (spec §4.L): waits the device idle, then recreates the
  /// swapchain and notifies the engine of the new extent. `width`/`height`
  /// of zero (e.g. a minimized window) is rejected by
  /// [`Swapchain::resize`](crate::swapchain::Swapchain::resize) rather than
  /// torn down -- callers should simply retry once the window is restored.
  pub fn resize(&mut self, width: u32, height: u32) -> TerraResult<()> {
    self.context.wait_idle()?;
    self.swapchain.resize(width, height, self.present_mode)?;
    self.engine.resize(self.swapchain.extent);
    self.requested_width = width;
    self.requested_height = height;
    Ok(())
  }

  /// `Render` (spec §4.M): acquires the next swapchain image, records and
  /// submits one frame against it, and presents. A stale swapchain
  /// (`TerraError::SwapchainStale`) is surfaced to the caller rather than
  /// handled here -- per spec §4.M's failure-handling note, recovering means
  /// calling `Resize` with the application's current window extent, which
  /// only the application knows.
  pub fn render(&mut self) -> TerraResult<()> {
    let image_available = self.acquire_image_available_semaphore();
    let (image_index, _suboptimal) = self.swapchain.acquire_next_image(image_available)?;

    let framebuffer = self.swapchain.framebuffers[image_index as usize];
    let render_finished = self.engine.render_frame(
      framebuffer,
      self.swapchain.render_pass,
      self.swapchain.extent,
      image_available,
    )?;

    self
      .swapchain
      .present(self.context.device.queues.presentation_queue, image_index, render_finished)?;
    Ok(())
  }

  /// `vkAcquireNextImageKHR` needs a semaphore to signal before the engine
  /// knows which frame slot's fence it will be waiting on, so this borrows
  /// the slot's `image_available` semaphore the same way
  /// [`RenderEngine::render_frame`] will borrow the rest of that slot's
  /// synchronization state. `RenderEngine` owns the ring; exposing the
  /// front value keeps `Renderer` from needing its own copy of the frame
  /// index.
  fn acquire_image_available_semaphore(&self) -> ash::vk::Semaphore {
    self.engine.image_available_semaphore()
  }
}
impl Drop for Renderer {
  fn drop(&mut self) {
    let _ = self.engine.wait_idle();
    let _ = self.context.wait_idle();
  }
}

/// Creates a [`Renderer`] bound to `window` (spec §6 entry point). The
/// window need only implement [`HasRawWindowHandle`]; Terra never reads
/// platform-specific state beyond what `ash-window` needs to create a
/// surface. `thread_pool` is the external collaborator spec §6 passes in by
/// contract (`submit(job)`) rather than one `Renderer` constructs for
/// itself -- pass `None` to fall back to a [`RayonJobPool`] sized to the
/// host's logical CPUs, the default the teacher's own demos use.
pub fn create_terra_instance<W: HasRawWindowHandle>(
  window: &W, config: RendererConfig, thread_pool: Option<Arc<dyn JobPool>>,
) -> TerraResult<Renderer> {
  let job_pool = thread_pool.unwrap_or_else(|| Arc::new(RayonJobPool::default()));
  Renderer::new(window, config, job_pool)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_renderer_config_has_a_positive_requested_extent() {
    let config = RendererConfig::default();
    assert!(config.requested_width > 0);
    assert!(config.requested_height > 0);
  }
}
