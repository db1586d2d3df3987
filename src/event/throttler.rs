use super::scheduler::Scheduler;
use crate::sync::queue::Task;
use log::trace;

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{Builder, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

enum ThrottleSignal {
  Invoke(Task),
  Close,
}

/// Trailing-edge coalescing of repeated calls into one deferred run.
///
/// Each [throttle](Throttler::throttle) call replaces whatever is pending,
/// so within one window only the last task fires. A call arriving after a
/// full interval of quiet fires immediately; a call inside an open window
/// fires a full interval after itself. Fired tasks run on the throttler's
/// own timer thread unless a target scheduler was supplied. Dropping the
/// throttler cancels the pending task and stops the timer.
///
/// # Example
/// ```
/// use rill::event::throttler::Throttler;
/// use rill::sync::queue::Task;
/// use std::time::Duration;
///
/// let throttler = Throttler::new(Duration::from_millis(50));
/// let (tx, rx) = std::sync::mpsc::channel();
/// throttler.throttle(Task::new(move || {
///   tx.send("fired").unwrap();
/// }));
/// assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "fired");
/// ```
pub struct Throttler {
  sender: Mutex<Sender<ThrottleSignal>>,
  thread: ThreadId,
  handle: Mutex<Option<JoinHandle<()>>>,
}

impl Throttler {
  /// A throttler whose fired tasks run on its timer thread.
  pub fn new(interval: Duration) -> Self {
    Self::with_target(interval, None)
  }

  /// A throttler whose fired tasks are posted to `scheduler`.
  pub fn with_scheduler(interval: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
    Self::with_target(interval, Some(scheduler))
  }

  fn with_target(interval: Duration, target: Option<Arc<dyn Scheduler>>) -> Self {
    let (tx, rx) = channel();
    let handle = Builder::new()
      .name("throttler".to_owned())
      .spawn(move || Throttler::run(rx, interval, target))
      .unwrap();
    Throttler {
      sender: Mutex::new(tx),
      thread: handle.thread().id(),
      handle: Mutex::new(Some(handle)),
    }
  }

  fn run(
    receiver: Receiver<ThrottleSignal>,
    interval: Duration,
    target: Option<Arc<dyn Scheduler>>,
  ) {
    let mut pending: Option<Task> = None;
    let mut previous_run: Option<Instant> = None;
    let mut wait = interval;
    loop {
      let signal = if pending.is_some() {
        match receiver.recv_timeout(wait) {
          Ok(signal) => Some(signal),
          Err(RecvTimeoutError::Timeout) => None,
          Err(RecvTimeoutError::Disconnected) => break,
        }
      } else {
        match receiver.recv() {
          Ok(signal) => Some(signal),
          Err(_) => break,
        }
      };
      match signal {
        Some(ThrottleSignal::Invoke(task)) => {
          if pending.replace(task).is_some() {
            trace!("pending throttled task replaced");
          }
          let quiet = previous_run
            .map(|at| at.elapsed() > interval)
            .unwrap_or(true);
          wait = if quiet { Duration::from_nanos(0) } else { interval };
        }
        Some(ThrottleSignal::Close) => break,
        None => {
          if let Some(task) = pending.take() {
            previous_run = Some(Instant::now());
            match &target {
              Some(scheduler) => scheduler.execute(task),
              None => task.invoke(),
            }
          }
        }
      }
    }
  }

  /// Hands `task` to the timer: it replaces the pending task if one exists
  /// and fires per the window rule, immediately when the previous run is
  /// older than one interval, otherwise one full interval from now.
  pub fn throttle(&self, task: Task) {
    let _ = self.sender.lock().unwrap().send(ThrottleSignal::Invoke(task));
  }
}

impl Drop for Throttler {
  fn drop(&mut self) {
    let _ = self.sender.get_mut().unwrap().send(ThrottleSignal::Close);
    if std::thread::current().id() != self.thread {
      if let Some(handle) = self.handle.get_mut().unwrap().take() {
        let _ = handle.join();
      }
    }
  }
}
