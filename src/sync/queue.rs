use log::warn;

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{Builder, JoinHandle, ThreadId};

/// A unit of work posted to a [Queue] or to any
/// [Scheduler](crate::event::scheduler::Scheduler).
pub struct Task {
  job: Box<dyn FnOnce() + Send>,
}

impl Task {
  pub fn new<F>(job: F) -> Self
  where
    F: FnOnce() + Send + 'static,
  {
    Task { job: Box::new(job) }
  }

  pub fn invoke(self) {
    (self.job)()
  }
}

enum QueueSignal {
  Run(Task),
  Close,
}

struct QueueInner {
  sender: Mutex<Sender<QueueSignal>>,
  thread: ThreadId,
  name: String,
  handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for QueueInner {
  fn drop(&mut self) {
    let _ = self.sender.get_mut().unwrap().send(QueueSignal::Close);
    if std::thread::current().id() != self.thread {
      if let Some(handle) = self.handle.get_mut().unwrap().take() {
        let _ = handle.join();
      }
    }
  }
}

/// A named serial execution context: one worker thread draining a task
/// channel in post order.
///
/// Handles are cheap clones of the same queue. Dropping the last handle
/// closes the channel, lets the worker drain what was already posted and
/// joins it, except when the last handle dies on the worker itself.
///
/// # Example
/// ```
/// use rill::sync::queue::{Queue, Task};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let counter = Arc::new(AtomicUsize::new(0));
/// {
///   let queue = Queue::new("example");
///   for _ in 0..4 {
///     let cloned = counter.clone();
///     queue.post(Task::new(move || {
///       cloned.fetch_add(1, Ordering::Relaxed);
///     }));
///   }
/// }
/// assert_eq!(counter.load(Ordering::Relaxed), 4);
/// ```
pub struct Queue {
  inner: Arc<QueueInner>,
}

impl Clone for Queue {
  fn clone(&self) -> Self {
    Queue {
      inner: self.inner.clone(),
    }
  }
}

impl Queue {
  /// Spawns the worker thread for a queue named `name`.
  pub fn new(name: &str) -> Self {
    let (tx, rx) = channel();
    let handle = Builder::new()
      .name(format!("queue-{}", name))
      .spawn(move || Queue::run(rx))
      .unwrap();
    Queue {
      inner: Arc::new(QueueInner {
        sender: Mutex::new(tx),
        thread: handle.thread().id(),
        name: name.to_owned(),
        handle: Mutex::new(Some(handle)),
      }),
    }
  }

  fn run(receiver: Receiver<QueueSignal>) {
    while let Ok(QueueSignal::Run(task)) = receiver.recv() {
      task.invoke();
    }
  }

  /// Posts `task` to run after everything already queued. Posting to a queue
  /// whose worker has exited logs a warning and drops the task.
  pub fn post(&self, task: Task) {
    if self
      .inner
      .sender
      .lock()
      .unwrap()
      .send(QueueSignal::Run(task))
      .is_err()
    {
      warn!("task dropped, queue '{}' is closed", self.inner.name);
    }
  }

  /// Whether the caller is executing on this queue's worker thread.
  pub fn is_current(&self) -> bool {
    std::thread::current().id() == self.inner.thread
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use crate::utils::testing;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  #[test]
  fn post_order_test() {
    testing::async_context(|| {
      let queue = Queue::new("order");
      let (tx, rx) = channel();
      for i in 0..10 {
        let cloned = tx.clone();
        queue.post(Task::new(move || {
          cloned.send(i).unwrap();
        }));
      }
      for i in 0..10 {
        assert_eq!(rx.recv().unwrap(), i);
      }
    });
  }

  #[test]
  fn drop_drains_pending_test() {
    testing::async_context(|| {
      let counter = Arc::new(AtomicUsize::new(0));
      {
        let queue = Queue::new("drain");
        for _ in 0..5 {
          let cloned = counter.clone();
          queue.post(Task::new(move || {
            cloned.fetch_add(1, Ordering::Relaxed);
          }));
        }
      }
      assert_eq!(counter.load(Ordering::Relaxed), 5);
    });
  }

  #[test]
  fn is_current_test() {
    testing::async_context(|| {
      let queue = Queue::new("current");
      assert!(!queue.is_current());
      let on_worker = Arc::new(AtomicBool::new(false));
      let (tx, rx) = channel();
      let cloned_queue = queue.clone();
      let cloned = on_worker.clone();
      queue.post(Task::new(move || {
        cloned.store(cloned_queue.is_current(), Ordering::Relaxed);
        tx.send(()).unwrap();
      }));
      rx.recv().unwrap();
      assert!(on_worker.load(Ordering::Relaxed));
    });
  }

  #[test]
  fn drop_from_own_worker_test() {
    testing::async_context(|| {
      let queue = Queue::new("self-drop");
      let (tx, rx) = channel();
      let cloned = queue.clone();
      queue.post(Task::new(move || {
        drop(cloned);
        tx.send(()).unwrap();
      }));
      drop(queue);
      rx.recv().unwrap();
    });
  }

  #[test]
  fn name_test() {
    let queue = Queue::new("named");
    assert_eq!(queue.name(), "named");
  }
}
