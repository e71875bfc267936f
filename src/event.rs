//! Type-tagged event fan-out, used by subsystems (staging, in particular)
//! that need to learn a submission completed without waiting on a fence
//! themselves directly. Grounded on `original_source/library/includes/TerraEvents.hpp`'s
//! `TitanDispatcher<TerraEventType>` design; reworked as a concrete closed
//! enum dispatcher rather than a template, per spec §4.O.
use std::collections::HashMap;

/// Which queue a `QueueExecutionFinished` event refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum QueueKind {
  Graphics,
  Compute,
  Transfer,
}

/// Closed enum of event types Terra can emit.
#[derive(Copy, Clone, Debug)]
pub enum TerraEvent {
  QueueExecutionFinished { queue: QueueKind },
}

/// Discriminant used to key listener registration, independent of event
/// payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TerraEventType {
  QueueExecutionFinished,
}
impl TerraEvent {
  fn event_type(&self) -> TerraEventType {
    match self {
      TerraEvent::QueueExecutionFinished { .. } => TerraEventType::QueueExecutionFinished,
    }
  }
}

type Listener = Box<dyn FnMut(&TerraEvent) + Send>;

/// Synchronous, single-threaded fan-out dispatcher. `Emit` runs every
/// registered listener on the calling thread before returning -- there is no
/// queueing or cross-thread delivery (see spec §5, primary-thread-only
/// ownership of engine state).
#[derive(Default)]
pub struct EventDispatcher {
  listeners: HashMap<TerraEventType, Vec<Listener>>,
}
impl EventDispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a callback for every event of the given type. Returns the
  /// index among that type's listeners, useful if removal is ever added.
  pub fn register<F>(&mut self, event_type: TerraEventType, callback: F) -> usize
  where
    F: FnMut(&TerraEvent) + Send + 'static,
  {
    let listeners = self.listeners.entry(event_type).or_insert_with(Vec::new);
    listeners.push(Box::new(callback));
    listeners.len() - 1
  }

  /// Fans the event out synchronously to every listener registered for its
  /// type.
  pub fn emit(&mut self, event: TerraEvent) {
    if let Some(listeners) = self.listeners.get_mut(&event.event_type()) {
      for listener in listeners.iter_mut() {
        listener(&event);
      }
    }
  }

  pub fn listener_count(&self, event_type: TerraEventType) -> usize {
    self
      .listeners
      .get(&event_type)
      .map(Vec::len)
      .unwrap_or(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  #[test]
  fn emit_fans_out_to_all_listeners_of_matching_type() {
    let mut dispatcher = EventDispatcher::new();
    let count = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
      let count = count.clone();
      dispatcher.register(TerraEventType::QueueExecutionFinished, move |_event| {
        count.fetch_add(1, Ordering::SeqCst);
      });
    }

    dispatcher.emit(TerraEvent::QueueExecutionFinished {
      queue: QueueKind::Transfer,
    });

    assert_eq!(count.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn emit_with_no_listeners_is_a_noop() {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.emit(TerraEvent::QueueExecutionFinished {
      queue: QueueKind::Graphics,
    });
    assert_eq!(dispatcher.listener_count(TerraEventType::QueueExecutionFinished), 0);
  }
}
