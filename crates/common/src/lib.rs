//! Common types shared across Interfone components.

#![warn(clippy::pedantic)]

/// Module for shared identifier and status types
pub mod types;

/// Module for the incoming-call push signal payload
pub mod signal;
