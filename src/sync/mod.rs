//! Rill synchronization mechanisms.
//!
//! The engine itself never spawns execution contexts behind the caller's
//! back; the one context it offers, the serial [Queue](queue::Queue), is
//! constructed explicitly by the host and handed to operators that
//! reschedule.
pub mod queue;
