//! Resident-device call session client.
//!
//! Device-side counterpart of the call service: receives incoming-call
//! signals, owns the single device-local [`session::CallSession`], drives
//! the platform's native call UI, and notifies the server of answer and
//! hangup without ever letting server round-trips gate local transitions.
//!
//! # Architecture
//!
//! ```text
//!  push payload ──> DeliveryHook ──┐
//!                                  ├──> CallCoordinator (actor)
//!  NativeEventBridge ──────────────┘         │    │
//!       ▲                                    │    └──> ControlClient ──> server
//!       │ user intent                        └──> SessionStorage (crash recovery)
//!  native call UI <── NativeCallUi ── coordinator
//! ```
//!
//! All session state lives inside the coordinator task; everything else
//! communicates with it through the [`coordinator::CoordinatorHandle`].

pub mod control;
pub mod coordinator;
pub mod delivery;
pub mod errors;
pub mod native;
pub mod session;
pub mod storage;

pub use coordinator::{CallCoordinator, CoordinatorConfig, CoordinatorHandle, SessionEvent, SignalOutcome};
pub use delivery::DeliveryHook;
pub use errors::SessionError;
pub use native::{NativeCallUi, NativeEvent, NativeEventBridge, OverlayCallUi};
pub use session::{CallPhase, CallSession, EndReason};
