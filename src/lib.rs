//! Rill is:
//! * a lightweight reactive stream engine built around synchronous
//!   publish/subscribe with replay-one semantics.
//! * an operator algebra over those streams: transforms, filters,
//!   latest-pair combinators, rescheduling and trailing-edge throttling,
//!   with deterministic token-based teardown throughout.
pub mod event;
pub mod sync;
pub mod utils;
