//! `TemporaryDataBuffer` (spec §4.E): keeps resources that have been
//! logically replaced alive until the frame still referencing them retires.
//! Grounded on `original_source/library/includes/TemporaryDataBuffer.hpp`'s
//! `shared_ptr<void>` entries, translated to `Box<dyn Any + Send>` -- the
//! idiomatic Rust equivalent of "destructor runs, type doesn't matter".
use std::any::Any;

type GpuEntry = Box<dyn Any + Send>;

/// One frame-stamped GPU entry. Stamped when the frame that replaced it was
/// submitted (`SetUsed`); dropped when that frame's slot's fence signals
/// (`Clear`).
struct StampedEntry {
  frame_index: Option<usize>,
  value: GpuEntry,
}

/// Two arenas: a CPU arena for host-side blobs used only while preparing an
/// upload (cleared unconditionally every `SetUsed`), and a GPU arena for
/// device objects a frame may still be reading from (cleared only when that
/// frame's slot retires).
#[derive(Default)]
pub struct TemporaryDataBuffer {
  cpu_arena: Vec<Box<dyn Any + Send>>,
  gpu_arena: Vec<StampedEntry>,
}
impl TemporaryDataBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a host-side blob that only needs to survive until the next
  /// `SetUsed` call (e.g. a `Vec<u8>` being memcpy'd into a staging buffer).
  pub fn hold_cpu(&mut self, value: Box<dyn Any + Send>) {
    self.cpu_arena.push(value);
  }

  /// Registers a GPU-owning value (e.g. a `Buffer` a `SharedBuffer` just
  /// grew out of) that must not be dropped until frame `frame_index`'s slot
  /// has retired. Unstamped until the next `SetUsed(frame_index)` call.
  pub fn hold_gpu(&mut self, frame_index: usize, value: GpuEntry) {
    let _ = frame_index;
    self.gpu_arena.push(StampedEntry {
      frame_index: None,
      value,
    });
  }

  /// Stamps every currently-unstamped GPU entry with `frame_index` -- called
  /// once the frame that will consume them has been submitted -- and clears
  /// the CPU arena, whose entries never outlive one frame's preparation.
  pub fn set_used(&mut self, frame_index: usize) {
    for entry in self.gpu_arena.iter_mut() {
      if entry.frame_index.is_none() {
        entry.frame_index = Some(frame_index);
      }
    }
    self.cpu_arena.clear();
  }

  /// Drops every GPU entry stamped `frame_index` -- called once that frame
  /// slot's fence has signaled.
  pub fn clear(&mut self, frame_index: usize) {
    self.gpu_arena.retain(|entry| entry.frame_index != Some(frame_index));
  }

  pub fn gpu_entry_count(&self) -> usize {
    self.gpu_arena.len()
  }

  pub fn cpu_entry_count(&self) -> usize {
    self.cpu_arena.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn set_used_then_clear_drops_only_that_frames_entries() {
    let mut temp_data = TemporaryDataBuffer::new();
    temp_data.hold_gpu(0, Box::new(1u32));
    temp_data.set_used(0);
    temp_data.hold_gpu(1, Box::new(2u32));
    temp_data.set_used(1);

    assert_eq!(temp_data.gpu_entry_count(), 2);
    temp_data.clear(0);
    assert_eq!(temp_data.gpu_entry_count(), 1);
    temp_data.clear(1);
    assert_eq!(temp_data.gpu_entry_count(), 0);
  }

  #[test]
  fn unstamped_entries_survive_clear_of_any_frame() {
    let mut temp_data = TemporaryDataBuffer::new();
    temp_data.hold_gpu(0, Box::new(1u32));
    temp_data.clear(0);
    assert_eq!(temp_data.gpu_entry_count(), 1, "unstamped entries aren't cleared until SetUsed tags them");
  }

  #[test]
  fn set_used_clears_cpu_arena_every_time() {
    let mut temp_data = TemporaryDataBuffer::new();
    temp_data.hold_cpu(Box::new(vec![1u8, 2, 3]));
    assert_eq!(temp_data.cpu_entry_count(), 1);
    temp_data.set_used(0);
    assert_eq!(temp_data.cpu_entry_count(), 0);
  }

  #[test]
  fn set_used_call_count_matches_clear_call_count_over_one_cycle() {
    let buffer_count = 3;
    let mut temp_data = TemporaryDataBuffer::new();
    let mut set_used_calls = 0;
    let mut clear_calls = 0;

    for frame in 0..buffer_count * 2 {
      temp_data.hold_gpu(frame, Box::new(frame));
      temp_data.set_used(frame);
      set_used_calls += 1;
      if frame + 1 >= buffer_count {
        temp_data.clear((frame + buffer_count - 1) % buffer_count);
        clear_calls += 1;
      }
    }

    assert_eq!(set_used_calls, clear_calls + (buffer_count - 1));
  }
}
