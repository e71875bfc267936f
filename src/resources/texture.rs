//! `Texture`: an image + view bound to one `MemoryManager` allocation (spec
//! §4.B), plus a slotmap-backed store whose handles self-remove on drop --
//! the same RAII-handle-over-a-shared-store pattern as the teacher's
//! `BufferImageStore`/`BufferImageHandle` (`renderer/buffers_and_images.rs`),
//! specialized to textures since `AddTexture` needs a stable, droppable id.
use crate::{
  error::{TerraError, TerraResult},
  image_data::ImageData,
  memory::{Allocation, SharedMemoryManager},
  staging::StagingBufferManager,
  thread_pool::JobPool,
};
use ash::{version::DeviceV1_0, vk, Device};
use log::warn;
use slotmap::{DefaultKey, SlotMap};
use std::sync::{Arc, RwLock};

/// One GPU image + view, always `R8G8B8A8_SRGB`, `SAMPLED | TRANSFER_DST`.
pub struct Texture {
  device: Arc<Device>,
  memory_manager: SharedMemoryManager,
  pub image: vk::Image,
  pub view: vk::ImageView,
  pub format: vk::Format,
  pub extent: vk::Extent2D,
  pub layout: vk::ImageLayout,
  allocation: Allocation,
}
impl Texture {
  pub fn create_2d(
    device: Arc<Device>, memory_manager: &SharedMemoryManager, width: u32, height: u32,
  ) -> TerraResult<Self> {
    if width == 0 || height == 0 {
      return Err(TerraError::InvalidArgument("texture extent must be non-zero"));
    }

    let format = vk::Format::R8G8B8A8_SRGB;
    let image_ci = vk::ImageCreateInfo::builder()
      .image_type(vk::ImageType::TYPE_2D)
      .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
      .extent(vk::Extent3D {
        width,
        height,
        depth: 1,
      })
      .mip_levels(1)
      .array_layers(1)
      .format(format)
      .tiling(vk::ImageTiling::OPTIMAL)
      .initial_layout(vk::ImageLayout::UNDEFINED)
      .sharing_mode(vk::SharingMode::EXCLUSIVE)
      .samples(vk::SampleCountFlags::TYPE_1)
      .build();
    let image = unsafe { device.create_image(&image_ci, None)? };

    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let allocation = {
      let mut mm = memory_manager.write().expect("MemoryManager lock poisoned");
      let allocation = match mm.allocate(
        requirements.size,
        requirements.alignment,
        requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
      ) {
        Ok(allocation) => allocation,
        Err(e) => {
          unsafe { device.destroy_image(image, None) };
          return Err(e);
        }
      };
      unsafe { device.bind_image_memory(image, mm.raw_memory(&allocation), allocation.offset)? };
      allocation
    };

    let view_ci = vk::ImageViewCreateInfo::builder()
      .image(image)
      .view_type(vk::ImageViewType::TYPE_2D)
      .format(format)
      .subresource_range(vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
      })
      .build();
    let view = unsafe { device.create_image_view(&view_ci, None)? };

    Ok(Self {
      device,
      memory_manager: memory_manager.clone(),
      image,
      view,
      format,
      extent: vk::Extent2D { width, height },
      layout: vk::ImageLayout::UNDEFINED,
      allocation,
    })
  }
}
impl Drop for Texture {
  fn drop(&mut self) {
    unsafe {
      self.device.destroy_image_view(self.view, None);
      self.device.destroy_image(self.image, None);
    }
    self
      .memory_manager
      .write()
      .expect("MemoryManager lock poisoned")
      .free(self.allocation);
  }
}

/// `texture_id` returned by `Renderer::add_texture`. Dropping the last
/// handle removes and destroys the texture.
pub struct TextureHandle {
  inner_key: DefaultKey,
  store: Arc<RwLock<TextureStore>>,
}
impl Drop for TextureHandle {
  fn drop(&mut self) {
    let mut store = self.store.write().expect("TextureStore lock poisoned");
    if let Err(e) = store.destroy(self.inner_key) {
      warn!("texture not destroyed, maybe it was already? {:?}", e);
    }
  }
}

pub struct TextureStore {
  device: Arc<Device>,
  memory_manager: SharedMemoryManager,
  textures: SlotMap<DefaultKey, Texture>,
}
impl TextureStore {
  pub fn new(device: Arc<Device>, memory_manager: SharedMemoryManager) -> Self {
    Self {
      device,
      memory_manager,
      textures: SlotMap::new(),
    }
  }

  /// Creates the 2D image and enqueues its pixel upload onto `staging`
  /// (spec §4.N `AddTexture`: "validates w,h>0, pixel-size matches format"
  /// then uploads). The upload lands in the same frame's staging flush as
  /// everything else queued before the next `Render()`.
  pub fn add(
    this: &Arc<RwLock<Self>>, pixels: impl ImageData, staging: &mut StagingBufferManager, job_pool: &dyn JobPool,
  ) -> TerraResult<TextureHandle> {
    let (width, height) = pixels.dimensions();
    if width == 0 || height == 0 {
      return Err(TerraError::InvalidArgument("texture extent must be non-zero"));
    }
    let bytes = pixels.into_rgba_32();
    if bytes.len() as u64 != width as u64 * height as u64 * 4 {
      return Err(TerraError::InvalidArgument("pixel buffer size does not match width*height*4"));
    }

    let mut store = this.write().expect("TextureStore lock poisoned");
    let texture = Texture::create_2d(store.device.clone(), &store.memory_manager.clone(), width, height)?;
    staging.enqueue_texture_upload(&bytes, texture.image, texture.extent, texture.format, job_pool)?;
    let inner_key = store.textures.insert(texture);
    Ok(TextureHandle {
      inner_key,
      store: this.clone(),
    })
  }

  pub fn get(&self, handle: &TextureHandle) -> TerraResult<&Texture> {
    self.textures.get(handle.inner_key).ok_or(TerraError::UnknownResource)
  }

  fn destroy(&mut self, inner_key: DefaultKey) -> TerraResult<()> {
    self.textures.remove(inner_key).map(|_| ()).ok_or(TerraError::UnknownResource)
  }
}
