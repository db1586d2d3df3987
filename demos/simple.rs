//! A simple example of what rill has to offer

use rill::event::notifier::{Notifier, Property};
use rill::event::ops::*;

#[derive(Debug, Clone)]
enum Input {
  Keyboard(char),
  Pointer(i32, i32),
}

impl std::fmt::Display for Input {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Keyboard(key) => write!(f, "key '{}'", key)?,
      Self::Pointer(x, y) => write!(f, "pointer at ({}, {})", x, y)?,
    };
    Ok(())
  }
}

fn main() {
  let inputs = Notifier::<Input>::new();
  let focused = Property::new(false);

  let pair = all(&inputs.stream(), &focused.stream());
  let _token = pair
    .filter(|(_, focused)| *focused)
    .map(|(input, _)| format!("handled {}", input))
    .subscribe(|line| println!("{}", line));

  // dropped: the window is not focused yet
  inputs.publish_value(Input::Keyboard('a'));
  // gaining focus re-pairs with the latest input, so 'a' is handled now
  focused.set(true);
  inputs.publish_value(Input::Keyboard('b'));
  inputs.publish_value(Input::Pointer(3, 4));
}
