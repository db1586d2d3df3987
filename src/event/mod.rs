//! This module contains rill's core event system. The module is organized
//! into the following sub modules:
//! * `observable` which implements the [Stream](observable::Stream) type, the
//!   read side of an event flow, together with the event model itself.
//! * `notifier` which implements the write-side publishers
//!   [Notifier](notifier::Notifier) and [Property](notifier::Property).
//! * `ops` which contains all of the stream operators and the latest-pair
//!   combinators.
//! * `scheduler` which defines where deferred deliveries run.
//! * `source` which defines the boundary contract external event feeds
//!   implement.
//! * `subscription` which implements the
//!   [Disposable](subscription::Disposable) token used to tie a subscription
//!   to the current scope.
//! * `throttler` which implements trailing-edge burst coalescing.
//!
pub mod notifier;
pub mod observable;
pub mod ops;
pub mod scheduler;
pub mod source;
pub mod subscription;
pub mod throttler;
