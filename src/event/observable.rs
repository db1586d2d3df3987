use super::subscription::{Disposable, DisposeBag};
use log::{trace, warn};

use std::error::Error;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, Weak};

/// Blanket bound for values carried by [Stream]s and
/// [Notifier](super::notifier::Notifier)s.
pub trait StreamValue: Send + Sync + Clone + Debug + 'static {}

impl<T> StreamValue for T where T: Send + Sync + Clone + Debug + 'static {}

/// Opaque failure payload carried by [Event::Failure]. Hosts supply whatever
/// error type suits them; the engine only clones and forwards it.
pub type ErrorKind = Arc<dyn Error + Send + Sync + 'static>;

/// A single delivery: a value or a failure.
///
/// Failures are ordinary events. They travel the same path as values, they
/// land in the same latest-event cache, and they never end the stream that
/// carried them.
#[derive(Clone, Debug)]
pub enum Event<V>
where
  V: StreamValue,
{
  Next(V),
  Failure(ErrorKind),
}

impl<V> Event<V>
where
  V: StreamValue,
{
  /// Wraps a concrete error into a [Failure](Event::Failure) event.
  pub fn failure<E>(error: E) -> Self
  where
    E: Error + Send + Sync + 'static,
  {
    Event::Failure(Arc::new(error))
  }

  pub fn kind(&self) -> EventKind {
    match self {
      Event::Next(_) => EventKind::Next,
      Event::Failure(_) => EventKind::Failure,
    }
  }

  /// The carried value, if this is a [Next](Event::Next) event.
  pub fn value(self) -> Option<V> {
    match self {
      Event::Next(value) => Some(value),
      Event::Failure(_) => None,
    }
  }

  /// The carried error, if this is a [Failure](Event::Failure) event.
  pub fn error(self) -> Option<ErrorKind> {
    match self {
      Event::Next(_) => None,
      Event::Failure(error) => Some(error),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
  Next,
  Failure,
}

type Callback<V> = Arc<dyn Fn(Event<V>) + Send + Sync>;

/// Subscriber table plus latest-event cache. One per [Stream] and one per
/// [Notifier](super::notifier::Notifier), always behind that instance's own
/// mutex.
pub(super) struct Registry<V>
where
  V: StreamValue,
{
  next_id: u64,
  entries: Vec<(u64, Callback<V>)>,
  pub(super) latest: Option<Event<V>>,
}

impl<V> Registry<V>
where
  V: StreamValue,
{
  pub(super) fn new() -> Self {
    Registry {
      next_id: 0,
      entries: Vec::new(),
      latest: None,
    }
  }

  pub(super) fn insert(&mut self, callback: Callback<V>) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    self.entries.push((id, callback));
    id
  }

  pub(super) fn remove(&mut self, id: u64) {
    self.entries.retain(|(entry, _)| *entry != id);
  }

  pub(super) fn len(&self) -> usize {
    self.entries.len()
  }

  fn snapshot(&self) -> Vec<Callback<V>> {
    self
      .entries
      .iter()
      .map(|(_, callback)| callback.clone())
      .collect()
  }
}

/// Publishes `event` through `registry`: the cache is written first, then the
/// subscribers registered at that instant run in registration order. The lock
/// is released before any callback runs, so callbacks are free to subscribe,
/// dispose or publish further events. A subscriber disposed mid pass still
/// receives the in-flight event; one added mid pass does not, it replays the
/// cache on registration instead.
pub(super) fn publish_into<V>(registry: &Mutex<Registry<V>>, event: Event<V>)
where
  V: StreamValue,
{
  let snapshot = {
    let mut guard = registry.lock().unwrap();
    guard.latest = Some(event.clone());
    guard.snapshot()
  };
  for callback in snapshot.iter() {
    callback(event.clone());
  }
}

struct StreamCore<V>
where
  V: StreamValue,
{
  registry: Mutex<Registry<V>>,
  bag: DisposeBag,
}

impl<V> StreamCore<V>
where
  V: StreamValue,
{
  fn deliver(&self, event: Event<V>) {
    publish_into(&self.registry, event);
  }
}

/// The read-side handle onto a sequence of [Event]s.
///
/// A stream owns its own subscriber registry and its own latest-event cache,
/// separate from whatever feeds it. Construction is eager: the setup closure
/// passed to [new](Stream::new) runs before `new` returns, receives a
/// [WeakStream] pointing at the stream under construction and returns the
/// [Disposable] guarding the upstream connection. The stream retains that
/// handle for its own lifetime, so releasing the last strong reference to the
/// stream severs the connection.
///
/// Subscription tokens hold their stream strongly. A chain like
/// `notifier.stream().map(..)` stays alive for exactly as long as a token
/// from its tail is held.
///
/// # Example
/// ```
/// use rill::event::notifier::Notifier;
/// use std::sync::{Arc, Mutex};
///
/// let notifier = Notifier::<i32>::new();
/// notifier.publish_value(1);
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let cloned = seen.clone();
/// let _token = notifier.stream().subscribe(move |x| {
///   cloned.lock().unwrap().push(x);
/// });
/// notifier.publish_value(2);
/// assert_eq!(*seen.lock().unwrap(), [1, 2]);
/// ```
pub struct Stream<V>
where
  V: StreamValue,
{
  core: Arc<StreamCore<V>>,
}

impl<V> Clone for Stream<V>
where
  V: StreamValue,
{
  fn clone(&self) -> Self {
    Stream {
      core: self.core.clone(),
    }
  }
}

impl<V> Stream<V>
where
  V: StreamValue,
{
  /// Builds a stream and connects it upstream.
  ///
  /// `setup` runs synchronously. Deliveries it makes through the handle it
  /// receives land in the cache before `new` returns, which is how replaying
  /// sources hand their latest event to a freshly attached stream.
  pub fn new<F>(setup: F) -> Self
  where
    F: FnOnce(WeakStream<V>) -> Disposable,
  {
    let core = Arc::new(StreamCore {
      registry: Mutex::new(Registry::new()),
      bag: DisposeBag::new(),
    });
    let connection = setup(WeakStream {
      core: Arc::downgrade(&core),
    });
    core.bag.add(connection);
    Stream { core }
  }

  /// The most recent event delivered through this stream, if any.
  pub fn latest(&self) -> Option<Event<V>> {
    self.core.registry.lock().unwrap().latest.clone()
  }

  /// Number of live subscriptions on this stream.
  pub fn subscriber_count(&self) -> usize {
    self.core.registry.lock().unwrap().len()
  }

  /// A non-owning handle to this stream.
  pub fn downgrade(&self) -> WeakStream<V> {
    WeakStream {
      core: Arc::downgrade(&self.core),
    }
  }

  /// Registers `callback` for every subsequent event.
  ///
  /// If this stream already delivered an event, `callback` runs with that
  /// cached event before `subscribe_event` returns. The returned token
  /// removes exactly this registration and keeps the stream (and therefore
  /// its upstream chain) alive until it is disposed or dropped, so the token
  /// must be held onto.
  pub fn subscribe_event<F>(&self, callback: F) -> Disposable
  where
    F: Fn(Event<V>) + Send + Sync + 'static,
  {
    let callback: Callback<V> = Arc::new(callback);
    let (id, replay) = {
      let mut guard = self.core.registry.lock().unwrap();
      (guard.insert(callback.clone()), guard.latest.clone())
    };
    if let Some(event) = replay {
      callback(event);
    }
    let core = self.core.clone();
    Disposable::new(move || {
      core.registry.lock().unwrap().remove(id);
    })
  }

  /// Registers `on_next` for every subsequent value, ignoring failures. Same
  /// replay and token semantics as [subscribe_event](Stream::subscribe_event).
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use std::sync::atomic::{AtomicI32, Ordering};
  /// use std::sync::Arc;
  ///
  /// let notifier = Notifier::<i32>::new();
  /// let sum = Arc::new(AtomicI32::new(0));
  /// let cloned = sum.clone();
  /// let _token = notifier.stream().subscribe(move |x| {
  ///   cloned.fetch_add(x, Ordering::Relaxed);
  /// });
  /// notifier.publish_value(2);
  /// notifier.publish_value(3);
  /// assert_eq!(sum.load(Ordering::Relaxed), 5);
  /// ```
  pub fn subscribe<F>(&self, on_next: F) -> Disposable
  where
    F: Fn(V) + Send + Sync + 'static,
  {
    self.subscribe_event(move |event| {
      if let Event::Next(value) = event {
        on_next(value);
      }
    })
  }

  /// Mirrors every delivered value into a host-side setter. This is
  /// [subscribe](Stream::subscribe) under a name that reads as data flow at
  /// the call site.
  pub fn bind<S>(&self, setter: S) -> Disposable
  where
    S: Fn(V) + Send + Sync + 'static,
  {
    self.subscribe(setter)
  }
}

/// Non-owning handle to a [Stream].
///
/// Setup closures and operator internals hold streams this way; holding a
/// `WeakStream` never extends the target stream's lifetime.
pub struct WeakStream<V>
where
  V: StreamValue,
{
  core: Weak<StreamCore<V>>,
}

impl<V> Clone for WeakStream<V>
where
  V: StreamValue,
{
  fn clone(&self) -> Self {
    WeakStream {
      core: self.core.clone(),
    }
  }
}

impl<V> WeakStream<V>
where
  V: StreamValue,
{
  /// Delivers `event` through the target stream, synchronously on the
  /// calling context. Events aimed at a released stream are dropped.
  pub fn deliver(&self, event: Event<V>) {
    match self.core.upgrade() {
      Some(core) => core.deliver(event),
      None => trace!("event {:?} dropped, stream released", event),
    }
  }

  /// The target stream's latest-event cache; `None` when nothing has been
  /// delivered yet or the stream is gone.
  pub fn latest(&self) -> Option<Event<V>> {
    self
      .core
      .upgrade()
      .and_then(|core| core.registry.lock().unwrap().latest.clone())
  }

  /// Ties `disposable` to the target stream's lifetime. When the stream is
  /// already released the handle is disposed on the spot rather than leaked.
  pub fn retain(&self, disposable: Disposable) {
    match self.core.upgrade() {
      Some(core) => core.bag.add(disposable),
      None => {
        warn!("retain on a released stream, disposing immediately");
        disposable.dispose();
      }
    }
  }

  pub fn upgrade(&self) -> Option<Stream<V>> {
    self.core.upgrade().map(|core| Stream { core })
  }
}
