use rill::event::notifier::{Notifier, Property};
use rill::event::ops::*;
use rill::utils::testing;
use thiserror::Error;

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Error)]
#[error("probe: {0}")]
struct ProbeError(&'static str);

fn collect<T>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static)
where
  T: Send + 'static,
{
  let seen = Arc::new(Mutex::new(Vec::new()));
  let cloned = seen.clone();
  (seen, move |value| {
    cloned.lock().unwrap().push(value);
  })
}

#[test]
fn any_all_matrix_test() {
  println!("START any_all_matrix_test");
  let a = Property::new(0);
  let b = Property::new(0);
  let c = Notifier::<i32>::new();

  let any2 = any(&a.stream(), &b.stream());
  let (result_any2, push) = collect();
  let token_any2 = any2.subscribe(push);

  let all2 = all(&a.stream(), &b.stream());
  let (result_all2, push) = collect();
  let token_all2 = all2.subscribe(push);

  let triple_any = any3(&a.stream(), &b.stream(), &c.stream());
  let (result_any3, push) = collect();
  let token_any3 = triple_any.subscribe(push);

  let triple_all = all3(&a.stream(), &b.stream(), &c.stream());
  let (result_all3, push) = collect();
  let token_all3 = triple_all.subscribe(push);

  a.set(1);
  b.set(1);
  c.publish_value(1);
  a.set(2);
  c.publish_value(2);
  token_any2.dispose();
  token_all2.dispose();
  a.set(3);
  token_any3.dispose();
  token_all3.dispose();
  c.publish_value(3);

  assert_eq!(
    *result_any2.lock().unwrap(),
    [
      (Some(0), Some(0)),
      (Some(1), Some(0)),
      (Some(1), Some(1)),
      (Some(2), Some(1)),
    ]
  );
  assert_eq!(
    *result_all2.lock().unwrap(),
    [(0, 0), (1, 0), (1, 1), (2, 1)]
  );
  assert_eq!(
    *result_any3.lock().unwrap(),
    [
      (Some(0), Some(0), None),
      (Some(1), Some(0), None),
      (Some(1), Some(1), None),
      (Some(1), Some(1), Some(1)),
      (Some(2), Some(1), Some(1)),
      (Some(2), Some(1), Some(2)),
      (Some(3), Some(1), Some(2)),
    ]
  );
  assert_eq!(
    *result_all3.lock().unwrap(),
    [(1, 1, 1), (2, 1, 1), (2, 1, 2), (3, 1, 2)]
  );
  println!("END any_all_matrix_test");
}

#[test]
fn all_failure_aggregation_test() {
  println!("START all_failure_aggregation_test");
  let left = Notifier::<i32>::new();
  let right = Notifier::<i32>::new();
  let gated = all(&left.stream(), &right.stream());
  let (errors, push) = collect();
  let _token = gated.subscribe_event(move |event| {
    if let Some(error) = event.error() {
      push(error);
    }
  });
  left.publish_error(ProbeError("left"));
  right.publish_error(ProbeError("right"));
  let errors = errors.lock().unwrap();
  assert_eq!(errors.len(), 2);
  assert_eq!(errors[0].to_string(), "probe: left");
  let combined = errors[1]
    .downcast_ref::<CombinedFailure>()
    .expect("dual failure should combine");
  assert_eq!(combined.left.to_string(), "probe: left");
  assert_eq!(combined.right.to_string(), "probe: right");
  println!("END all_failure_aggregation_test");
}

#[test]
fn any_forwards_one_sided_failure_test() {
  println!("START any_forwards_one_sided_failure_test");
  let left = Notifier::<i32>::new();
  let right = Notifier::<i32>::new();
  let pair = any(&left.stream(), &right.stream());
  let (seen, push) = collect();
  let failures = Arc::new(AtomicUsize::new(0));
  let cloned = failures.clone();
  let _token = pair.subscribe_event(move |event| match event.value() {
    Some(value) => push(value),
    None => {
      cloned.fetch_add(1, Ordering::Relaxed);
    }
  });
  left.publish_error(ProbeError("left"));
  right.publish_value(7);
  assert_eq!(failures.load(Ordering::Relaxed), 1);
  assert_eq!(*seen.lock().unwrap(), [(None, Some(7))]);
  println!("END any_forwards_one_sided_failure_test");
}

#[test]
fn throttle_window_test() {
  println!("START throttle_window_test");
  testing::async_context(|| {
    let interval = Duration::from_millis(500);
    let notifier = Notifier::new();
    let (tx, rx) = std::sync::mpsc::channel();
    let tx = Mutex::new(tx);
    let count = Arc::new(AtomicUsize::new(0));
    let cloned = count.clone();
    let _token = notifier.stream().throttle(interval).subscribe(move |x: i32| {
      cloned.fetch_add(1, Ordering::Relaxed);
      tx.lock().unwrap().send(x).unwrap();
    });
    // opening publish fires on its own and starts the window
    notifier.publish_value(0);
    assert_eq!(rx.recv().unwrap(), 0);
    let window_start = Instant::now();
    notifier.publish_value(1);
    std::thread::sleep(Duration::from_millis(150));
    notifier.publish_value(2);
    assert_eq!(rx.recv().unwrap(), 2);
    assert!(window_start.elapsed() >= interval);
    std::thread::sleep(Duration::from_millis(700));
    assert_eq!(count.load(Ordering::Relaxed), 2);
  });
  println!("END throttle_window_test");
}

#[test]
fn throttle_reopens_after_quiet_test() {
  println!("START throttle_reopens_after_quiet_test");
  testing::async_context(|| {
    let notifier = Notifier::new();
    let (tx, rx) = std::sync::mpsc::channel();
    let tx = Mutex::new(tx);
    let _token = notifier
      .stream()
      .throttle(Duration::from_millis(100))
      .subscribe(move |x: i32| {
        tx.lock().unwrap().send(x).unwrap();
      });
    notifier.publish_value(0);
    assert_eq!(rx.recv().unwrap(), 0);
    std::thread::sleep(Duration::from_millis(250));
    let start = Instant::now();
    notifier.publish_value(1);
    assert_eq!(rx.recv().unwrap(), 1);
    assert!(start.elapsed() < Duration::from_millis(80));
  });
  println!("END throttle_reopens_after_quiet_test");
}

#[test]
fn concurrent_publish_subscribe_stress_test() {
  println!("START concurrent_publish_subscribe_stress_test");
  testing::async_context(|| {
    let notifier = Notifier::<u64>::new();
    let received = Arc::new(AtomicUsize::new(0));
    let cloned = received.clone();
    let _anchor = notifier.stream().subscribe(move |_| {
      cloned.fetch_add(1, Ordering::Relaxed);
    });
    let mut handles = Vec::new();
    for worker in 0..4u64 {
      let publisher = notifier.clone();
      handles.push(std::thread::spawn(move || {
        let mut rng = rand::thread_rng();
        let mut tokens = Vec::new();
        for i in 0..200u64 {
          match rng.gen_range(0..3) {
            0 => publisher.publish_value(worker * 1000 + i),
            1 => tokens.push(publisher.stream().subscribe(|_| {})),
            _ => {
              tokens.pop();
            }
          }
        }
      }));
    }
    for handle in handles {
      handle.join().unwrap();
    }
    assert_eq!(notifier.subscriber_count(), 1);
    let before = received.load(Ordering::Relaxed);
    notifier.publish_value(u64::MAX);
    assert_eq!(received.load(Ordering::Relaxed), before + 1);
  });
  println!("END concurrent_publish_subscribe_stress_test");
}
