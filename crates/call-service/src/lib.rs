//! Interfone Call Service Library
//!
//! Core functionality for the Interfone call service - the server half of the
//! doorman-to-apartment intercom subsystem:
//!
//! - Call lifecycle (ringing → answered → ended, status only moves forward)
//! - Participant resolution and push-signal fan-out with retry
//! - First-answer-wins claim and voice bridge setup
//! - Bridge provider status reconciliation
//!
//! # Architecture
//!
//! The service follows the Handler -> Orchestrator -> Store pattern:
//!
//! ```text
//! routes.rs -> handlers/*.rs -> orchestrator.rs -> store/*.rs
//!                                    |
//!                                    +-> services/*.rs (push, bridge)
//!                                    +-> tasks/ring_notifier.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `models` - Data models
//! - `observability` - Prometheus metrics
//! - `orchestrator` - Call lifecycle coordination
//! - `routes` - Axum router setup
//! - `services` - Push gateway and bridge provider clients
//! - `store` - Call record store (Postgres and in-memory)
//! - `tasks` - Ring notifier background task

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod routes;
pub mod services;
pub mod store;
pub mod tasks;
