use crate::sync::queue::{Queue, Task};

/// Where deferred deliveries run.
///
/// The engine owns no execution contexts of its own: operators that
/// reschedule take a scheduler supplied by the host and post [Task]s to it.
/// Any serial context a host already runs, a UI loop, a [Queue], can sit
/// behind this trait.
pub trait Scheduler: Send + Sync {
  fn execute(&self, task: Task);
}

impl Scheduler for Queue {
  fn execute(&self, task: Task) {
    self.post(task);
  }
}

/// Runs tasks synchronously on the calling stack. The explicit opt-in for
/// hosts and tests that want rescheduling operators to stay synchronous.
pub struct Inline;

impl Scheduler for Inline {
  fn execute(&self, task: Task) {
    task.invoke();
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use crate::utils::testing;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[test]
  fn inline_executes_on_caller_test() {
    let counter = Arc::new(AtomicUsize::new(0));
    let cloned = counter.clone();
    Inline {}.execute(Task::new(move || {
      cloned.fetch_add(1, Ordering::Relaxed);
    }));
    assert_eq!(counter.load(Ordering::Relaxed), 1);
  }

  #[test]
  fn queue_scheduler_test() {
    testing::async_context(|| {
      let scheduler: Arc<dyn Scheduler> = Arc::new(Queue::new("scheduler"));
      let (tx, rx) = std::sync::mpsc::channel();
      scheduler.execute(Task::new(move || {
        tx.send(1).unwrap();
      }));
      assert_eq!(rx.recv().unwrap(), 1);
    });
  }
}
