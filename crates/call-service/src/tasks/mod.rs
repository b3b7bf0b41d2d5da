//! Background tasks for the call service.

pub mod ring_notifier;

pub use ring_notifier::{run_ring_notifier, NotifierRegistry};
