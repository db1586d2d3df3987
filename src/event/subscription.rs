use log::debug;

use std::sync::Mutex;

type DisposeFn = Box<dyn FnOnce() + Send>;

/// An idempotent one-shot cancellation handle.
///
/// A `Disposable` wraps the action that severs a single subscription or
/// upstream connection. The action runs at most once: on the first
/// [dispose](Disposable::dispose) call or, failing that, when the handle
/// drops. Running it releases everything the action captured.
///
/// # Example
/// ```
/// use rill::event::subscription::Disposable;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let runs = Arc::new(AtomicUsize::new(0));
/// let cloned = runs.clone();
/// let disposable = Disposable::new(move || {
///   cloned.fetch_add(1, Ordering::Relaxed);
/// });
/// disposable.dispose();
/// disposable.dispose();
/// assert_eq!(runs.load(Ordering::Relaxed), 1);
/// ```
pub struct Disposable {
  action: Mutex<Option<DisposeFn>>,
}

impl Disposable {
  pub fn new<F>(action: F) -> Self
  where
    F: FnOnce() + Send + 'static,
  {
    Disposable {
      action: Mutex::new(Some(Box::new(action))),
    }
  }

  /// A handle with nothing to tear down.
  pub fn empty() -> Self {
    Disposable {
      action: Mutex::new(None),
    }
  }

  /// Runs the cancellation action if it has not run yet.
  pub fn dispose(&self) {
    let action = self.action.lock().unwrap().take();
    if let Some(action) = action {
      action();
    }
  }

  /// Whether the cancellation action has already run.
  pub fn is_disposed(&self) -> bool {
    self.action.lock().unwrap().is_none()
  }

  /// Moves the handle into `bag`, tying this cancellation to the bag's
  /// lifetime.
  pub fn disposed_by(self, bag: &DisposeBag) {
    bag.add(self);
  }
}

impl Drop for Disposable {
  fn drop(&mut self) {
    self.dispose();
  }
}

/// Collects cancellation handles and disposes them together.
///
/// Dropping the bag disposes every handle it still holds, so owning a bag is
/// enough to scope a set of subscriptions to an object's lifetime.
///
/// # Example
/// ```
/// use rill::event::notifier::Notifier;
/// use rill::event::subscription::DisposeBag;
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let notifier = Notifier::<i32>::new();
/// let sum = Arc::new(AtomicI32::new(0));
/// {
///   let bag = DisposeBag::new();
///   let cloned = sum.clone();
///   notifier
///     .stream()
///     .subscribe(move |x| {
///       cloned.fetch_add(x, Ordering::Relaxed);
///     })
///     .disposed_by(&bag);
///   notifier.publish_value(2);
/// }
/// notifier.publish_value(3);
/// assert_eq!(sum.load(Ordering::Relaxed), 2);
/// ```
#[derive(Default)]
pub struct DisposeBag {
  state: Mutex<BagState>,
}

#[derive(Default)]
struct BagState {
  drained: bool,
  held: Vec<Disposable>,
}

impl DisposeBag {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds `disposable` to the bag. A bag already drained by
  /// [dispose_all](DisposeBag::dispose_all) disposes the handle on the spot
  /// instead of holding it.
  pub fn add(&self, disposable: Disposable) {
    {
      let mut guard = self.state.lock().unwrap();
      if !guard.drained {
        guard.held.push(disposable);
        return;
      }
    }
    debug!("disposable added to a drained bag");
    disposable.dispose();
  }

  /// Disposes every held handle in insertion order and marks the bag
  /// drained. The handles are taken out before any action runs, so an action
  /// may add to this same bag without deadlocking.
  pub fn dispose_all(&self) {
    let drained = {
      let mut guard = self.state.lock().unwrap();
      guard.drained = true;
      std::mem::take(&mut guard.held)
    };
    for disposable in drained.iter() {
      disposable.dispose();
    }
  }

  pub fn len(&self) -> usize {
    self.state.lock().unwrap().held.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Drop for DisposeBag {
  fn drop(&mut self) {
    self.dispose_all();
  }
}
