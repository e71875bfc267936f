//! CPU-side job pool (spec §5's "external collaborator with a `submit(job)`
//! contract"). The teacher has no thread pool of its own; `rayon` is pulled
//! in the way `myq2-renderer`'s texture decoder uses it
//! (`crates/myq2-renderer/src/vk_image.rs`) -- CPU-bound work fanned out
//! across a worker pool while the primary thread keeps driving the GPU.
use std::sync::{Arc, Condvar, Mutex};

/// A job submitted to a [`JobPool`]. Boxed so callers can submit closures
/// that capture whatever they need (e.g. a staging-buffer pointer and a
/// source byte slice).
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded CPU thread pool contract. `Renderer` never spawns threads of its
/// own; every memcpy-into-staging and other CPU-side preparation task goes
/// through this trait so a caller embedding Terra can supply their own pool.
pub trait JobPool: Send + Sync {
  /// Schedules `job` to run on a worker thread. Returns immediately.
  fn submit(&self, job: Job);

  /// Blocks until every job submitted before this call has completed (spec
  /// §4.N's `WaitForAsyncTasks`).
  fn wait_all(&self);
}

/// Default [`JobPool`] backed by a `rayon::ThreadPool`. Outstanding-job
/// count is tracked with a `Mutex`/`Condvar` pair rather than a `rayon::Scope`
/// since jobs are submitted one at a time from call sites that don't share a
/// single scope's lifetime.
pub struct RayonJobPool {
  pool: rayon::ThreadPool,
  outstanding: Arc<(Mutex<usize>, Condvar)>,
}
impl RayonJobPool {
  /// Builds a pool with `worker_threads` workers, or rayon's default (number
  /// of logical CPUs) when `None`.
  pub fn new(worker_threads: Option<usize>) -> Self {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = worker_threads {
      builder = builder.num_threads(n);
    }
    let pool = builder.build().expect("failed to build rayon thread pool");
    Self {
      pool,
      outstanding: Arc::new((Mutex::new(0), Condvar::new())),
    }
  }
}
impl Default for RayonJobPool {
  fn default() -> Self {
    Self::new(None)
  }
}
impl JobPool for RayonJobPool {
  fn submit(&self, job: Job) {
    let outstanding = self.outstanding.clone();
    {
      let mut count = outstanding.0.lock().expect("outstanding-job counter poisoned");
      *count += 1;
    }
    self.pool.spawn(move || {
      job();
      let (lock, condvar) = &*outstanding;
      let mut count = lock.lock().expect("outstanding-job counter poisoned");
      *count -= 1;
      if *count == 0 {
        condvar.notify_all();
      }
    });
  }

  fn wait_all(&self) {
    let (lock, condvar) = &*self.outstanding;
    let mut count = lock.lock().expect("outstanding-job counter poisoned");
    while *count > 0 {
      count = condvar.wait(count).expect("outstanding-job counter poisoned");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn wait_all_blocks_until_every_submitted_job_completes() {
    let pool = RayonJobPool::new(Some(4));
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..50 {
      let completed = completed.clone();
      pool.submit(Box::new(move || {
        completed.fetch_add(1, Ordering::SeqCst);
      }));
    }
    pool.wait_all();

    assert_eq!(completed.load(Ordering::SeqCst), 50);
  }

  #[test]
  fn wait_all_is_a_no_op_with_nothing_submitted() {
    let pool = RayonJobPool::new(Some(2));
    pool.wait_all();
  }
}
