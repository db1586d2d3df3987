use std::{sync::mpsc, thread, time::Duration};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs `f` on a watchdog thread and panics the caller if it neither
/// finishes nor panics within `d`. Turns a deadlocked or stalled test into a
/// failure instead of a hung run.
pub fn panic_after<T, F>(d: Duration, f: F) -> T
where
  T: Send + 'static,
  F: FnOnce() -> T + Send + 'static,
{
  let (done_tx, done_rx) = mpsc::channel();
  let handle = thread::Builder::new()
    .name("testing-thread".to_owned())
    .spawn(move || {
      let val = f();
      done_tx.send(()).expect("failed to send complete signal");
      val
    })
    .unwrap();
  match done_rx.recv_timeout(d) {
    Ok(_) => handle.join().expect("thread panicked"),
    Err(error) => match error {
      mpsc::RecvTimeoutError::Timeout => panic!("thread took too long"),
      mpsc::RecvTimeoutError::Disconnected => panic!("thread panicked"),
    },
  }
}

/// [panic_after] with the default timeout. Wraps every test that waits on
/// queues, timers or channels.
pub fn async_context<T, F>(f: F) -> T
where
  T: Send + 'static,
  F: FnOnce() -> T + Send + 'static,
{
  panic_after(DEFAULT_TIMEOUT, f)
}
