use super::observable::{ErrorKind, Event, Stream, StreamValue, WeakStream};
use super::scheduler::Scheduler;
use super::subscription::Disposable;
use super::throttler::Throttler;
use crate::sync::queue::Task;
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub trait Map<A, B>
where
  A: StreamValue,
  B: StreamValue,
{
  /// Builds a stream of `transform`ed values.
  ///
  /// Failures pass through untouched.
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use rill::event::ops::*;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let notifier = Notifier::<i32>::new();
  /// let seen = Arc::new(Mutex::new(Vec::new()));
  /// let cloned = seen.clone();
  /// let _token = notifier
  ///   .stream()
  ///   .map(|x| format!("value_{}", x))
  ///   .subscribe(move |x| {
  ///     cloned.lock().unwrap().push(x);
  ///   });
  /// notifier.publish_value(1);
  /// notifier.publish_value(2);
  /// assert_eq!(*seen.lock().unwrap(), ["value_1", "value_2"]);
  /// ```
  fn map<F>(&self, transform: F) -> Stream<B>
  where
    F: Fn(A) -> B + Send + Sync + 'static;
}

impl<A, B> Map<A, B> for Stream<A>
where
  A: StreamValue,
  B: StreamValue,
{
  fn map<F>(&self, transform: F) -> Stream<B>
  where
    F: Fn(A) -> B + Send + Sync + 'static,
  {
    self.filter_map(move |value| Some(transform(value)))
  }
}

pub trait FilterMap<A, B>
where
  A: StreamValue,
  B: StreamValue,
{
  /// Builds a stream of the values `transform` maps to `Some`.
  ///
  /// A `None` result drops that value silently; failures pass through.
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use rill::event::ops::*;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let notifier = Notifier::<&'static str>::new();
  /// let seen = Arc::new(Mutex::new(Vec::new()));
  /// let cloned = seen.clone();
  /// let _token = notifier
  ///   .stream()
  ///   .filter_map(|x| x.parse::<i32>().ok())
  ///   .subscribe(move |x| {
  ///     cloned.lock().unwrap().push(x);
  ///   });
  /// notifier.publish_value("1");
  /// notifier.publish_value("oops");
  /// notifier.publish_value("2");
  /// assert_eq!(*seen.lock().unwrap(), [1, 2]);
  /// ```
  fn filter_map<F>(&self, transform: F) -> Stream<B>
  where
    F: Fn(A) -> Option<B> + Send + Sync + 'static;
}

impl<A, B> FilterMap<A, B> for Stream<A>
where
  A: StreamValue,
  B: StreamValue,
{
  fn filter_map<F>(&self, transform: F) -> Stream<B>
  where
    F: Fn(A) -> Option<B> + Send + Sync + 'static,
  {
    Stream::new(|target| {
      self.subscribe_event(move |event| match event {
        Event::Next(value) => {
          if let Some(mapped) = transform(value) {
            target.deliver(Event::Next(mapped));
          }
        }
        Event::Failure(error) => target.deliver(Event::Failure(error)),
      })
    })
  }
}

pub trait Filter<T>
where
  T: StreamValue,
{
  /// Builds a stream keeping the values that satisfy `predicate`.
  ///
  /// Failures always pass; filtering applies to values only.
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use rill::event::ops::*;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let notifier = Notifier::<i32>::new();
  /// let seen = Arc::new(Mutex::new(Vec::new()));
  /// let cloned = seen.clone();
  /// let _token = notifier
  ///   .stream()
  ///   .filter(|x| x % 2 == 0)
  ///   .subscribe(move |x| {
  ///     cloned.lock().unwrap().push(x);
  ///   });
  /// for i in 0..5 {
  ///   notifier.publish_value(i);
  /// }
  /// assert_eq!(*seen.lock().unwrap(), [0, 2, 4]);
  /// ```
  fn filter<F>(&self, predicate: F) -> Stream<T>
  where
    F: Fn(&T) -> bool + Send + Sync + 'static;
}

impl<T> Filter<T> for Stream<T>
where
  T: StreamValue,
{
  fn filter<F>(&self, predicate: F) -> Stream<T>
  where
    F: Fn(&T) -> bool + Send + Sync + 'static,
  {
    Stream::new(|target| {
      self.subscribe_event(move |event| match event {
        Event::Next(value) => {
          if predicate(&value) {
            target.deliver(Event::Next(value));
          }
        }
        Event::Failure(error) => target.deliver(Event::Failure(error)),
      })
    })
  }
}

pub trait FilterSome<T>
where
  T: StreamValue,
{
  /// Builds a stream that unwraps `Some` values and drops `None`s.
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use rill::event::ops::*;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let notifier = Notifier::<Option<i32>>::new();
  /// let seen = Arc::new(Mutex::new(Vec::new()));
  /// let cloned = seen.clone();
  /// let _token = notifier.stream().filter_some().subscribe(move |x| {
  ///   cloned.lock().unwrap().push(x);
  /// });
  /// notifier.publish_value(Some(1));
  /// notifier.publish_value(None);
  /// notifier.publish_value(Some(2));
  /// assert_eq!(*seen.lock().unwrap(), [1, 2]);
  /// ```
  fn filter_some(&self) -> Stream<T>;
}

impl<T> FilterSome<T> for Stream<Option<T>>
where
  T: StreamValue,
{
  fn filter_some(&self) -> Stream<T> {
    self.filter_map(|value| value)
  }
}

pub trait FlatMap<A, B>
where
  A: StreamValue,
  B: StreamValue,
{
  /// Builds a stream forwarding every event of every child stream `transform`
  /// yields.
  ///
  /// Each child subscription is retained by the output stream, so
  /// overlapping children all stay live until the output is released. A
  /// `None` result drops that value without attaching anything; failures of
  /// the input pass straight through.
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use rill::event::ops::*;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let rooms = Notifier::<i32>::new();
  /// let chatter = Notifier::<&'static str>::new();
  /// let feed = chatter.clone();
  /// let seen = Arc::new(Mutex::new(Vec::new()));
  /// let cloned = seen.clone();
  /// let _token = rooms
  ///   .stream()
  ///   .flat_map(move |room| if room == 0 { Some(feed.stream()) } else { None })
  ///   .subscribe(move |x| {
  ///     cloned.lock().unwrap().push(x);
  ///   });
  /// rooms.publish_value(0);
  /// chatter.publish_value("hello");
  /// assert_eq!(*seen.lock().unwrap(), ["hello"]);
  /// ```
  fn flat_map<F>(&self, transform: F) -> Stream<B>
  where
    F: Fn(A) -> Option<Stream<B>> + Send + Sync + 'static;
}

impl<A, B> FlatMap<A, B> for Stream<A>
where
  A: StreamValue,
  B: StreamValue,
{
  fn flat_map<F>(&self, transform: F) -> Stream<B>
  where
    F: Fn(A) -> Option<Stream<B>> + Send + Sync + 'static,
  {
    Stream::new(|target| {
      let forward = target;
      self.subscribe_event(move |event| match event {
        Event::Next(value) => {
          if let Some(child) = transform(value) {
            let into = forward.clone();
            forward.retain(child.subscribe_event(move |event| into.deliver(event)));
          }
        }
        Event::Failure(error) => forward.deliver(Event::Failure(error)),
      })
    })
  }
}

pub trait Distinct<T>
where
  T: StreamValue + PartialEq,
{
  /// Builds a stream suppressing consecutive equal values.
  ///
  /// Equality is checked against the built stream's own latest delivery, so
  /// a replayed value followed by an equal publish collapses into a single
  /// delivery. Failures always pass.
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use rill::event::ops::*;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let notifier = Notifier::<i32>::new();
  /// let seen = Arc::new(Mutex::new(Vec::new()));
  /// let cloned = seen.clone();
  /// let _token = notifier.stream().distinct().subscribe(move |x| {
  ///   cloned.lock().unwrap().push(x);
  /// });
  /// for x in vec![1, 1, 2, 2, 2, 3] {
  ///   notifier.publish_value(x);
  /// }
  /// assert_eq!(*seen.lock().unwrap(), [1, 2, 3]);
  /// ```
  fn distinct(&self) -> Stream<T>;
}

impl<T> Distinct<T> for Stream<T>
where
  T: StreamValue + PartialEq,
{
  fn distinct(&self) -> Stream<T> {
    Stream::new(|target| {
      self.subscribe_event(move |event| match event {
        Event::Next(value) => {
          let repeated = matches!(
            target.latest(),
            Some(Event::Next(last)) if last == value
          );
          if !repeated {
            target.deliver(Event::Next(value));
          }
        }
        Event::Failure(error) => target.deliver(Event::Failure(error)),
      })
    })
  }
}

pub trait IgnoreLatest<T>
where
  T: StreamValue,
{
  /// Builds a stream suppressing exactly the first delivery it would make,
  /// replayed or fresh.
  ///
  /// This is the counterweight to replay-on-attach for subscribers that only
  /// care about changes.
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use rill::event::ops::*;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let notifier = Notifier::<i32>::new();
  /// notifier.publish_value(0);
  /// let seen = Arc::new(Mutex::new(Vec::new()));
  /// let cloned = seen.clone();
  /// let _token = notifier.stream().ignore_latest().subscribe(move |x| {
  ///   cloned.lock().unwrap().push(x);
  /// });
  /// notifier.publish_value(1);
  /// notifier.publish_value(2);
  /// assert_eq!(*seen.lock().unwrap(), [1, 2]);
  /// ```
  fn ignore_latest(&self) -> Stream<T>;
}

impl<T> IgnoreLatest<T> for Stream<T>
where
  T: StreamValue,
{
  fn ignore_latest(&self) -> Stream<T> {
    Stream::new(|target| {
      let initial = AtomicBool::new(true);
      self.subscribe_event(move |event| {
        if initial.swap(false, Ordering::Relaxed) {
          return;
        }
        target.deliver(event);
      })
    })
  }
}

pub trait First<T>
where
  T: StreamValue,
{
  /// Builds a stream delivering only its first event, then severing the
  /// upstream connection eagerly.
  ///
  /// When the upstream replays a cached event the built stream is already
  /// done before `first` returns. Late subscribers still replay the one
  /// delivered event.
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use rill::event::ops::*;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let notifier = Notifier::<i32>::new();
  /// let seen = Arc::new(Mutex::new(Vec::new()));
  /// let cloned = seen.clone();
  /// let _token = notifier.stream().first().subscribe(move |x| {
  ///   cloned.lock().unwrap().push(x);
  /// });
  /// notifier.publish_value(1);
  /// notifier.publish_value(2);
  /// assert_eq!(*seen.lock().unwrap(), [1]);
  /// assert_eq!(notifier.subscriber_count(), 0);
  /// ```
  fn first(&self) -> Stream<T>;
}

impl<T> First<T> for Stream<T>
where
  T: StreamValue,
{
  fn first(&self) -> Stream<T> {
    Stream::new(|target| {
      let connection: Arc<Mutex<Option<Disposable>>> = Arc::new(Mutex::new(None));
      let consumed = Arc::new(AtomicBool::new(false));
      let slot = connection.clone();
      let fired = consumed.clone();
      let token = self.subscribe_event(move |event| {
        if !fired.swap(true, Ordering::Relaxed) {
          target.deliver(event);
          if let Some(upstream) = slot.lock().unwrap().take() {
            upstream.dispose();
          }
        }
      });
      // a replayed event consumes the stream before the token reaches the
      // slot, so it is disposed here instead
      if consumed.load(Ordering::Relaxed) {
        token.dispose();
      } else {
        *connection.lock().unwrap() = Some(token);
      }
      Disposable::new(move || {
        if let Some(upstream) = connection.lock().unwrap().take() {
          upstream.dispose();
        }
      })
    })
  }
}

pub trait On<T>
where
  T: StreamValue,
{
  /// Builds a stream re-delivering every event through `scheduler`.
  ///
  /// Posting preserves per-source order; the
  /// [Inline](super::scheduler::Inline) scheduler keeps delivery on the
  /// calling stack for hosts that opt into synchronous hand-off.
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use rill::event::ops::*;
  /// use rill::event::scheduler::Inline;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let notifier = Notifier::<i32>::new();
  /// let seen = Arc::new(Mutex::new(Vec::new()));
  /// let cloned = seen.clone();
  /// let _token = notifier.stream().on(Arc::new(Inline {})).subscribe(move |x| {
  ///   cloned.lock().unwrap().push(x);
  /// });
  /// notifier.publish_value(1);
  /// assert_eq!(*seen.lock().unwrap(), [1]);
  /// ```
  fn on(&self, scheduler: Arc<dyn Scheduler>) -> Stream<T>;
}

impl<T> On<T> for Stream<T>
where
  T: StreamValue,
{
  fn on(&self, scheduler: Arc<dyn Scheduler>) -> Stream<T> {
    Stream::new(|target| {
      self.subscribe_event(move |event| {
        let deferred = target.clone();
        scheduler.execute(Task::new(move || deferred.deliver(event)));
      })
    })
  }
}

pub trait Throttle<T>
where
  T: StreamValue,
{
  /// Builds a stream coalescing bursts down to the last event per window.
  ///
  /// The first event after a quiet interval is delivered immediately; events
  /// inside an open window replace each other and the survivor is delivered
  /// one full `interval` after it arrived. Deliveries land on the throttle
  /// timer thread.
  ///
  /// # Example
  /// ```
  /// use rill::event::notifier::Notifier;
  /// use rill::event::ops::*;
  /// use std::sync::Mutex;
  /// use std::time::Duration;
  ///
  /// let notifier = Notifier::<i32>::new();
  /// let (tx, rx) = std::sync::mpsc::channel();
  /// let tx = Mutex::new(tx);
  /// let _token = notifier
  ///   .stream()
  ///   .throttle(Duration::from_millis(150))
  ///   .subscribe(move |x| {
  ///     tx.lock().unwrap().send(x).unwrap();
  ///   });
  /// notifier.publish_value(1);
  /// assert_eq!(rx.recv().unwrap(), 1);
  /// // 2 and 3 land inside the window opened by 1; only the last survives
  /// notifier.publish_value(2);
  /// notifier.publish_value(3);
  /// assert_eq!(rx.recv().unwrap(), 3);
  /// ```
  fn throttle(&self, interval: Duration) -> Stream<T>;

  /// Same window rule as [throttle](Throttle::throttle), with fired
  /// deliveries posted to `scheduler` instead of the timer thread.
  fn throttle_on(&self, interval: Duration, scheduler: Arc<dyn Scheduler>) -> Stream<T>;
}

impl<T> Throttle<T> for Stream<T>
where
  T: StreamValue,
{
  fn throttle(&self, interval: Duration) -> Stream<T> {
    throttle_with(self, Throttler::new(interval))
  }

  fn throttle_on(&self, interval: Duration, scheduler: Arc<dyn Scheduler>) -> Stream<T> {
    throttle_with(self, Throttler::with_scheduler(interval, scheduler))
  }
}

fn throttle_with<T>(stream: &Stream<T>, throttler: Throttler) -> Stream<T>
where
  T: StreamValue,
{
  Stream::new(|target| {
    stream.subscribe_event(move |event| {
      let deferred = target.clone();
      throttler.throttle(Task::new(move || deferred.deliver(event)));
    })
  })
}

/// Failure payload produced by [all] when an arriving failure meets a
/// failure cached on the other side, keeping both causes.
#[derive(Debug, Clone, Error)]
#[error("both sources failed: {left}; {right}")]
pub struct CombinedFailure {
  pub left: ErrorKind,
  pub right: ErrorKind,
}

fn latest_value<T>(stream: &WeakStream<T>) -> Option<T>
where
  T: StreamValue,
{
  match stream.latest() {
    Some(Event::Next(value)) => Some(value),
    _ => None,
  }
}

fn latest_failure<T>(stream: &WeakStream<T>) -> Option<ErrorKind>
where
  T: StreamValue,
{
  match stream.latest() {
    Some(Event::Failure(error)) => Some(error),
    _ => None,
  }
}

/// Builds a stream pairing the latest values of two sources on every event
/// from either, with `None` standing in for a side that has not produced a
/// value yet. A failure on either side passes through as the pair's failure.
///
/// # Example
/// ```
/// use rill::event::notifier::Notifier;
/// use rill::event::ops::any;
/// use std::sync::{Arc, Mutex};
///
/// let left = Notifier::<i32>::new();
/// let right = Notifier::<i32>::new();
/// let first = left.stream();
/// let second = right.stream();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let cloned = seen.clone();
/// let _token = any(&first, &second).subscribe(move |pair| {
///   cloned.lock().unwrap().push(pair);
/// });
/// right.publish_value(10);
/// left.publish_value(1);
/// assert_eq!(
///   *seen.lock().unwrap(),
///   [(None, Some(10)), (Some(1), Some(10))]
/// );
/// ```
pub fn any<A, B>(left: &Stream<A>, right: &Stream<B>) -> Stream<(Option<A>, Option<B>)>
where
  A: StreamValue,
  B: StreamValue,
{
  let left_weak = left.downgrade();
  let right_weak = right.downgrade();
  Stream::new(|target| {
    let pair_left = target.clone();
    let from_left = left.subscribe_event(move |event| match event {
      Event::Next(value) => {
        let other = latest_value(&right_weak);
        pair_left.deliver(Event::Next((Some(value), other)));
      }
      Event::Failure(error) => pair_left.deliver(Event::Failure(error)),
    });
    let pair_right = target;
    let from_right = right.subscribe_event(move |event| match event {
      Event::Next(value) => {
        let other = latest_value(&left_weak);
        pair_right.deliver(Event::Next((other, Some(value))));
      }
      Event::Failure(error) => pair_right.deliver(Event::Failure(error)),
    });
    Disposable::new(move || {
      from_left.dispose();
      from_right.dispose();
    })
  })
}

/// Builds a stream pairing two sources once both have produced a value, then
/// re-pairing on every later event from either side.
///
/// Until both caches hold a value nothing is emitted. An arriving failure
/// that meets a failure cached on the other side collapses into one
/// [CombinedFailure] event; a lone failure passes through unchanged.
///
/// # Example
/// ```
/// use rill::event::notifier::Notifier;
/// use rill::event::ops::all;
/// use std::sync::{Arc, Mutex};
///
/// let left = Notifier::<i32>::new();
/// let right = Notifier::<i32>::new();
/// let first = left.stream();
/// let second = right.stream();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let cloned = seen.clone();
/// let _token = all(&first, &second).subscribe(move |pair| {
///   cloned.lock().unwrap().push(pair);
/// });
/// left.publish_value(1);
/// right.publish_value(2);
/// left.publish_value(3);
/// assert_eq!(*seen.lock().unwrap(), [(1, 2), (3, 2)]);
/// ```
pub fn all<A, B>(left: &Stream<A>, right: &Stream<B>) -> Stream<(A, B)>
where
  A: StreamValue,
  B: StreamValue,
{
  let left_weak = left.downgrade();
  let right_weak = right.downgrade();
  Stream::new(|target| {
    let pair_left = target.clone();
    let from_left = left.subscribe_event(move |event| match event {
      Event::Next(value) => {
        if let Some(other) = latest_value(&right_weak) {
          pair_left.deliver(Event::Next((value, other)));
        }
      }
      Event::Failure(error) => {
        let event = match latest_failure(&right_weak) {
          Some(right_error) => Event::failure(CombinedFailure {
            left: error,
            right: right_error,
          }),
          None => Event::Failure(error),
        };
        pair_left.deliver(event);
      }
    });
    let pair_right = target;
    let from_right = right.subscribe_event(move |event| match event {
      Event::Next(value) => {
        if let Some(other) = latest_value(&left_weak) {
          pair_right.deliver(Event::Next((other, value)));
        }
      }
      Event::Failure(error) => {
        let event = match latest_failure(&left_weak) {
          Some(left_error) => Event::failure(CombinedFailure {
            left: left_error,
            right: error,
          }),
          None => Event::Failure(error),
        };
        pair_right.deliver(event);
      }
    });
    Disposable::new(move || {
      from_left.dispose();
      from_right.dispose();
    })
  })
}

/// Three-source [any], flattened into one tuple.
pub fn any3<A, B, C>(
  first: &Stream<A>,
  second: &Stream<B>,
  third: &Stream<C>,
) -> Stream<(Option<A>, Option<B>, Option<C>)>
where
  A: StreamValue,
  B: StreamValue,
  C: StreamValue,
{
  any(&any(first, second), third).map(|(pair, last)| match pair {
    Some((a, b)) => (a, b, last),
    None => (None, None, last),
  })
}

/// Three-source [all], flattened into one tuple.
pub fn all3<A, B, C>(
  first: &Stream<A>,
  second: &Stream<B>,
  third: &Stream<C>,
) -> Stream<(A, B, C)>
where
  A: StreamValue,
  B: StreamValue,
  C: StreamValue,
{
  all(&all(first, second), third).map(|((a, b), c)| (a, b, c))
}
