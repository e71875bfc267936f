//! Buffer/Texture/SharedBuffer primitives (spec §4.B, §4.C). Grounded on
//! the teacher's `renderer/buffers_and_images.rs` handle-store pattern
//! (slotmap key + RAII drop handle), re-pointed at
//! [`MemoryManager`](crate::memory::MemoryManager) instead of `vk_mem`.
pub mod buffer;
pub mod shared_buffer;
pub mod texture;

pub use buffer::Buffer;
pub use shared_buffer::{SharedBuffer, SharedBufferData};
pub use texture::Texture;
