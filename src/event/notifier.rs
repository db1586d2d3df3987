use super::observable::{publish_into, Event, Registry, Stream, StreamValue};
use super::subscription::Disposable;

use std::error::Error;
use std::sync::{Arc, Mutex};

/// The write side of an event flow: a subscriber registry plus the latest
/// published event.
///
/// Publishing is synchronous on the caller's context and the cache is
/// written before subscribers run, so a subscriber registered from inside a
/// callback replays the in-flight event instead of missing it or receiving
/// it twice. A `Notifier` is usually owned by the publishing object and
/// handed out only as [stream](Notifier::stream)s.
///
/// # Example
/// ```
/// use rill::event::notifier::Notifier;
/// use std::sync::{Arc, Mutex};
///
/// let notifier = Notifier::<i32>::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let cloned = seen.clone();
/// let _token = notifier.stream().subscribe(move |x| {
///   cloned.lock().unwrap().push(x);
/// });
/// notifier.publish_value(1);
/// notifier.publish_value(2);
/// assert_eq!(*seen.lock().unwrap(), [1, 2]);
/// ```
pub struct Notifier<V>
where
  V: StreamValue,
{
  registry: Arc<Mutex<Registry<V>>>,
}

impl<V> Clone for Notifier<V>
where
  V: StreamValue,
{
  fn clone(&self) -> Self {
    Notifier {
      registry: self.registry.clone(),
    }
  }
}

impl<V> Default for Notifier<V>
where
  V: StreamValue,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<V> Notifier<V>
where
  V: StreamValue,
{
  pub fn new() -> Self {
    Notifier {
      registry: Arc::new(Mutex::new(Registry::new())),
    }
  }

  /// Stores `event` as the latest and hands it to every subscriber
  /// registered at this instant, in registration order, on the calling
  /// context.
  pub fn publish(&self, event: Event<V>) {
    publish_into(&self.registry, event);
  }

  pub fn publish_value(&self, value: V) {
    self.publish(Event::Next(value));
  }

  pub fn publish_error<E>(&self, error: E)
  where
    E: Error + Send + Sync + 'static,
  {
    self.publish(Event::failure(error));
  }

  /// The most recently published event, if any.
  pub fn latest(&self) -> Option<Event<V>> {
    self.registry.lock().unwrap().latest.clone()
  }

  /// Number of live subscriptions on this notifier.
  pub fn subscriber_count(&self) -> usize {
    self.registry.lock().unwrap().len()
  }

  /// Raw registration without replay; [stream](Notifier::stream) is the
  /// replaying front door. The returned token holds the registry weakly, so
  /// an outstanding token never extends the notifier's lifetime.
  pub fn add_subscriber<F>(&self, callback: F) -> Disposable
  where
    F: Fn(Event<V>) + Send + Sync + 'static,
  {
    let id = self.registry.lock().unwrap().insert(Arc::new(callback));
    let registry = Arc::downgrade(&self.registry);
    Disposable::new(move || {
      if let Some(registry) = registry.upgrade() {
        registry.lock().unwrap().remove(id);
      }
    })
  }

  /// A read-side stream over this notifier's events. The latest published
  /// event, if any, is replayed into the stream while it is being attached.
  pub fn stream(&self) -> Stream<V> {
    let replay = self.latest();
    Stream::new(|target| {
      if let Some(event) = replay {
        target.deliver(event);
      }
      let forward = target;
      self.add_subscriber(move |event| forward.deliver(event))
    })
  }
}

/// A value-holding publisher: always has a current value, publishes on every
/// [set](Property::set) and remembers the value before the latest set.
///
/// Streams obtained from it replay the current value on attach, so
/// subscribers start from known state.
///
/// # Example
/// ```
/// use rill::event::notifier::Property;
/// use std::sync::{Arc, Mutex};
///
/// let volume = Property::new(3);
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let cloned = seen.clone();
/// let _token = volume.stream().subscribe(move |x| {
///   cloned.lock().unwrap().push(x);
/// });
/// volume.set(5);
/// assert_eq!(*seen.lock().unwrap(), [3, 5]);
/// assert_eq!(volume.get(), 5);
/// assert_eq!(volume.previous(), Some(3));
/// ```
pub struct Property<V>
where
  V: StreamValue,
{
  notifier: Notifier<V>,
  state: Mutex<PropertyState<V>>,
}

struct PropertyState<V> {
  current: V,
  previous: Option<V>,
}

impl<V> Property<V>
where
  V: StreamValue,
{
  pub fn new(value: V) -> Self {
    let notifier = Notifier::new();
    notifier.publish_value(value.clone());
    Property {
      notifier,
      state: Mutex::new(PropertyState {
        current: value,
        previous: None,
      }),
    }
  }

  pub fn get(&self) -> V {
    self.state.lock().unwrap().current.clone()
  }

  /// The value before the most recent [set](Property::set), if any.
  pub fn previous(&self) -> Option<V> {
    self.state.lock().unwrap().previous.clone()
  }

  /// Stores `value` and publishes it. The state lock is released before
  /// subscribers run, so callbacks may call [get](Property::get).
  pub fn set(&self, value: V) {
    {
      let mut guard = self.state.lock().unwrap();
      guard.previous = Some(std::mem::replace(&mut guard.current, value.clone()));
    }
    self.notifier.publish_value(value);
  }

  /// A stream over this property's values, replaying the current value on
  /// attach.
  pub fn stream(&self) -> Stream<V> {
    self.notifier.stream()
  }
}
