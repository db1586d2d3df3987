use super::observable::{Event, Stream, StreamValue, WeakStream};
use super::subscription::Disposable;

use std::error::Error;

/// Push handle handed to an external source feeding a [Stream].
///
/// The sink holds its stream weakly: once the stream is released every
/// delivery becomes a no-op, so a source keeping a sink around cannot keep
/// the stream alive or crash into a dead one.
pub struct EventSink<V>
where
  V: StreamValue,
{
  target: WeakStream<V>,
}

impl<V> Clone for EventSink<V>
where
  V: StreamValue,
{
  fn clone(&self) -> Self {
    EventSink {
      target: self.target.clone(),
    }
  }
}

impl<V> EventSink<V>
where
  V: StreamValue,
{
  pub fn deliver(&self, event: Event<V>) {
    self.target.deliver(event);
  }

  pub fn next(&self, value: V) {
    self.deliver(Event::Next(value));
  }

  pub fn fail<E>(&self, error: E)
  where
    E: Error + Send + Sync + 'static,
  {
    self.deliver(Event::failure(error));
  }
}

/// Contract an external event feed implements to drive a [Stream].
///
/// `connect` starts pushing into `sink` and returns the [Disposable] that
/// severs the feed; the built stream retains it, so releasing the stream
/// stops the feed. Host-side bridges to timers, IO completion or toolkit
/// callbacks implement exactly this.
pub trait EventSource<V>
where
  V: StreamValue,
{
  fn connect(&self, sink: EventSink<V>) -> Disposable;
}

impl<V> Stream<V>
where
  V: StreamValue,
{
  /// Adapts an external [EventSource] into a stream.
  pub fn from_source<S>(source: &S) -> Self
  where
    S: EventSource<V> + ?Sized,
  {
    Stream::new(|target| source.connect(EventSink { target }))
  }
}
