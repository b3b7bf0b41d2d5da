//! Client session coordinator.
//!
//! Single-threaded actor that exclusively owns the device-local call
//! session. Everything that can touch the session — push signals, user
//! actions, native UI intent, recovery, server acknowledgements — arrives as
//! a [`Command`] on one mpsc channel, so there are no interleaved state
//! transitions to reason about.
//!
//! # Lifecycle contract
//!
//! `spawn()` starts the loop but performs no recovery; `initialize()` does.
//! Subscribers obtained from [`CoordinatorHandle::subscribe`] before
//! `initialize()` is called are therefore guaranteed to observe the
//! recovery `SessionCreated` event.
//!
//! # Propagation policy
//!
//! Server notification never gates local transitions: answering flips the
//! session to connecting and the UI to answered immediately, while the
//! notification retries in the background. Ending is idempotent and local
//! end, decline, and remote end all funnel through the same transition.

pub mod messages;

pub use messages::{Command, SessionEvent, SignalOutcome};

use crate::control::ControlClient;
use crate::errors::SessionError;
use crate::native::{NativeCallUi, NativeEvent};
use crate::session::{CallPhase, CallSession, EndReason};
use crate::storage::SessionStorage;
use chrono::Utc;
use common::signal::CallSignal;
use common::types::{CallId, ResidentId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default recovery window for persisted sessions.
pub const DEFAULT_RECOVERY_WINDOW_SECONDS: u64 = 60;

/// Default number of answer notification attempts.
pub const DEFAULT_ANSWER_RETRY_ATTEMPTS: u32 = 3;

/// Default delay between answer notification attempts.
pub const DEFAULT_ANSWER_RETRY_BACKOFF_SECONDS: u64 = 2;

/// Coordinator tuning and identity.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Resident this device belongs to, sent with answer notifications.
    pub resident_id: ResidentId,

    /// Maximum age of a persisted session worth recovering.
    pub recovery_window: Duration,

    /// Answer notification attempts before giving up.
    pub answer_retry_attempts: u32,

    /// Delay between answer notification attempts.
    pub answer_retry_backoff: Duration,
}

impl CoordinatorConfig {
    /// Defaults for a resident.
    #[must_use]
    pub fn new(resident_id: ResidentId) -> Self {
        Self {
            resident_id,
            recovery_window: Duration::from_secs(DEFAULT_RECOVERY_WINDOW_SECONDS),
            answer_retry_attempts: DEFAULT_ANSWER_RETRY_ATTEMPTS,
            answer_retry_backoff: Duration::from_secs(DEFAULT_ANSWER_RETRY_BACKOFF_SECONDS),
        }
    }
}

/// Cloneable handle to a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: mpsc::Sender<Command>,
    native_tx: mpsc::Sender<NativeEvent>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
}

impl CoordinatorHandle {
    /// Subscribe to session lifecycle events.
    ///
    /// Subscribe before calling [`initialize`](Self::initialize) to observe
    /// recovery events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Run startup recovery of a persisted session.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        self.request(|respond_to| Command::Initialize { respond_to })
            .await?
    }

    /// Deliver an incoming-call signal.
    pub async fn signal_received(
        &self,
        signal: CallSignal,
    ) -> Result<SignalOutcome, SessionError> {
        self.request(|respond_to| Command::SignalReceived { signal, respond_to })
            .await?
    }

    /// Answer the active session.
    pub async fn answer(&self) -> Result<(), SessionError> {
        self.request(|respond_to| Command::Answer { respond_to })
            .await?
    }

    /// End the active session. Idempotent.
    pub async fn end(&self, reason: EndReason) -> Result<(), SessionError> {
        self.request(|respond_to| Command::End { reason, respond_to })
            .await?
    }

    /// Report that the server or the other side ended a call.
    pub async fn remote_ended(&self, call_id: CallId) -> Result<(), SessionError> {
        self.cmd_tx
            .send(Command::RemoteEnded { call_id })
            .await
            .map_err(|_| SessionError::CoordinatorClosed)
    }

    /// Snapshot of the active session.
    pub async fn session(&self) -> Result<Option<CallSession>, SessionError> {
        self.request(|respond_to| Command::Snapshot { respond_to })
            .await
    }

    /// Channel the native event bridge attaches to.
    pub fn native_sender(&self) -> mpsc::Sender<NativeEvent> {
        self.native_tx.clone()
    }

    /// Stop the coordinator task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| SessionError::CoordinatorClosed)?;
        rx.await.map_err(|_| SessionError::CoordinatorClosed)
    }
}

/// The coordinator actor.
pub struct CallCoordinator {
    storage: Arc<dyn SessionStorage>,
    control: Arc<dyn ControlClient>,
    ui: Arc<dyn NativeCallUi>,
    config: CoordinatorConfig,
    session: Option<CallSession>,
    events: broadcast::Sender<SessionEvent>,
    /// Sender for internal commands from background tasks.
    internal_tx: mpsc::Sender<Command>,
}

impl CallCoordinator {
    /// Spawn the coordinator task and return its handle.
    pub fn spawn(
        storage: Arc<dyn SessionStorage>,
        control: Arc<dyn ControlClient>,
        ui: Arc<dyn NativeCallUi>,
        config: CoordinatorConfig,
    ) -> CoordinatorHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (native_tx, native_rx) = mpsc::channel(32);
        let (events, _) = broadcast::channel(32);
        let cancel = CancellationToken::new();

        let coordinator = Self {
            storage,
            control,
            ui,
            config,
            session: None,
            events: events.clone(),
            internal_tx: cmd_tx.clone(),
        };

        tokio::spawn(coordinator.run(cmd_rx, native_rx, cancel.clone()));

        CoordinatorHandle {
            cmd_tx,
            native_tx,
            events,
            cancel,
        }
    }

    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut native_rx: mpsc::Receiver<NativeEvent>,
        cancel: CancellationToken,
    ) {
        info!(target: "session.coordinator", "Coordinator started");
        loop {
            tokio::select! {
                Some(command) = cmd_rx.recv() => {
                    self.handle_command(command);
                }
                Some(event) = native_rx.recv() => {
                    self.handle_native_event(event);
                }
                _ = cancel.cancelled() => {
                    info!(target: "session.coordinator", "Coordinator shutting down");
                    break;
                }
                else => break,
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Initialize { respond_to } => {
                let result = self.recover_persisted_session();
                let _ = respond_to.send(result);
            }
            Command::SignalReceived { signal, respond_to } => {
                let result = self.on_signal_received(&signal);
                let _ = respond_to.send(result);
            }
            Command::Answer { respond_to } => {
                let result = self.on_answer();
                let _ = respond_to.send(result);
            }
            Command::End { reason, respond_to } => {
                let result = self.on_end(reason, true);
                let _ = respond_to.send(result);
            }
            Command::RemoteEnded { call_id } => {
                if self.session.as_ref().is_some_and(|s| s.call_id == call_id) {
                    // Remote already knows; no hangup notification back.
                    let _ = self.on_end(EndReason::Remote, false);
                } else {
                    debug!(
                        target: "session.coordinator",
                        call_id = %call_id,
                        "Remote end for unknown session, ignoring"
                    );
                }
            }
            Command::AnswerAcknowledged { call_id } => self.on_answer_acknowledged(call_id),
            Command::AnswerFailed { call_id } => {
                warn!(
                    target: "session.coordinator",
                    call_id = %call_id,
                    "Answer notification exhausted retries, session stays connecting"
                );
            }
            Command::Snapshot { respond_to } => {
                let _ = respond_to.send(self.session.clone());
            }
        }
    }

    fn handle_native_event(&mut self, event: NativeEvent) {
        let known = self
            .session
            .as_ref()
            .is_some_and(|s| s.call_id == event.call_id());
        if !known {
            debug!(
                target: "session.coordinator",
                call_id = %event.call_id(),
                "Native event for unknown session, ignoring"
            );
            return;
        }

        match event {
            NativeEvent::Answer { .. } => {
                if let Err(e) = self.on_answer() {
                    warn!(target: "session.coordinator", error = %e, "Native answer rejected");
                }
            }
            NativeEvent::End { .. } => {
                let _ = self.on_end(EndReason::Local, true);
            }
            NativeEvent::Decline { .. } => {
                // A decline ends the ring for everyone, so the server is
                // notified like a hangup.
                let _ = self.on_end(EndReason::Declined, true);
            }
            NativeEvent::Mute { call_id, muted } => {
                debug!(
                    target: "session.coordinator",
                    call_id = %call_id,
                    muted,
                    "Mute toggled (handled by voice layer)"
                );
            }
            NativeEvent::Dtmf { call_id, digit } => {
                debug!(
                    target: "session.coordinator",
                    call_id = %call_id,
                    digit = %digit,
                    "DTMF digit (handled by voice layer)"
                );
            }
        }
    }

    /// Recover a persisted session at startup.
    ///
    /// A stored unresolved session younger than the recovery window is
    /// restored and re-announced with the recovered flag; anything older is
    /// discarded as missed and reported as `SessionEnded` with an expired
    /// reason. An expired session is not an error.
    fn recover_persisted_session(&mut self) -> Result<(), SessionError> {
        let Some(stored) = self.storage.load()? else {
            return Ok(());
        };

        if !stored.phase.is_unresolved() {
            self.storage.clear()?;
            return Ok(());
        }

        if stored.age(Utc::now()) > self.config.recovery_window {
            info!(
                target: "session.coordinator",
                call_id = %stored.call_id,
                "Persisted session exceeded recovery window, discarding as missed"
            );
            self.storage.clear()?;
            self.emit(SessionEvent::SessionEnded {
                call_id: stored.call_id,
                reason: EndReason::Expired,
            });
            return Ok(());
        }

        info!(
            target: "session.coordinator",
            call_id = %stored.call_id,
            phase = stored.phase.as_str(),
            "Recovered persisted session"
        );
        if stored.phase == CallPhase::Ringing {
            self.ui
                .display_incoming(stored.call_id, &stored.caller_name, &stored.subtitle());
        }
        self.emit(SessionEvent::SessionCreated {
            session: stored.clone(),
            recovered: true,
        });
        self.session = Some(stored);
        Ok(())
    }

    fn on_signal_received(&mut self, signal: &CallSignal) -> Result<SignalOutcome, SessionError> {
        if !signal.is_valid() {
            warn!(target: "session.coordinator", "Dropping malformed call signal");
            return Ok(SignalOutcome::Invalid);
        }

        if let Some(active) = &self.session {
            if active.call_id == signal.call_id {
                debug!(
                    target: "session.coordinator",
                    call_id = %signal.call_id,
                    "Duplicate signal for known session, no-op"
                );
                return Ok(SignalOutcome::Duplicate);
            }
            info!(
                target: "session.coordinator",
                call_id = %signal.call_id,
                active_call_id = %active.call_id,
                "Busy with another session, ignoring new call"
            );
            return Ok(SignalOutcome::Busy);
        }

        let session = CallSession::from_signal(signal);
        self.storage.save(&session)?;
        self.ui
            .display_incoming(session.call_id, &session.caller_name, &session.subtitle());
        info!(
            target: "session.coordinator",
            call_id = %session.call_id,
            "Incoming call session created"
        );
        self.emit(SessionEvent::SessionCreated {
            session: session.clone(),
            recovered: false,
        });
        self.session = Some(session);
        Ok(SignalOutcome::Created)
    }

    fn on_answer(&mut self) -> Result<(), SessionError> {
        let Some(session) = self.session.as_mut() else {
            return Err(SessionError::NoActiveSession);
        };

        match session.phase {
            CallPhase::Ringing => {}
            // Double-tap on the answer button; already on its way.
            CallPhase::Connecting | CallPhase::Active => return Ok(()),
            phase => {
                return Err(SessionError::InvalidPhase {
                    actual: phase.as_str(),
                })
            }
        }

        session.phase = CallPhase::Connecting;
        let call_id = session.call_id;
        let snapshot = session.clone();
        // Local transition first; persistence and UI follow, server last.
        if let Err(e) = self.storage.save(&snapshot) {
            warn!(target: "session.coordinator", error = %e, "Failed to persist answered session");
        }
        self.ui.mark_answered(call_id);
        self.emit(SessionEvent::SessionAnswered { call_id });

        // Notify the server in the background; failure never rolls the
        // local phase back.
        let control = self.control.clone();
        let internal_tx = self.internal_tx.clone();
        let resident_id = self.config.resident_id;
        let attempts = self.config.answer_retry_attempts.max(1);
        let backoff = self.config.answer_retry_backoff;
        tokio::spawn(async move {
            for attempt in 1..=attempts {
                match control.notify_answer(call_id, resident_id).await {
                    Ok(()) => {
                        let _ = internal_tx.send(Command::AnswerAcknowledged { call_id }).await;
                        return;
                    }
                    Err(e) => {
                        warn!(
                            target: "session.coordinator",
                            call_id = %call_id,
                            attempt,
                            error = %e,
                            "Answer notification failed"
                        );
                        if attempt < attempts {
                            tokio::time::sleep(backoff).await;
                        }
                    }
                }
            }
            let _ = internal_tx.send(Command::AnswerFailed { call_id }).await;
        });

        Ok(())
    }

    fn on_answer_acknowledged(&mut self, call_id: CallId) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.call_id != call_id || session.phase != CallPhase::Connecting {
            return;
        }
        session.phase = CallPhase::Active;
        let snapshot = session.clone();
        if let Err(e) = self.storage.save(&snapshot) {
            warn!(target: "session.coordinator", error = %e, "Failed to persist active session");
        }
        info!(target: "session.coordinator", call_id = %call_id, "Call is live");
        self.emit(SessionEvent::SessionActive { call_id });
    }

    /// End the session. Idempotent: ending with no session, or one already
    /// ended, is a successful no-op.
    fn on_end(&mut self, reason: EndReason, notify_server: bool) -> Result<(), SessionError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        if session.phase == CallPhase::Ended {
            return Ok(());
        }

        let call_id = session.call_id;
        if let Err(e) = self.storage.clear() {
            warn!(target: "session.coordinator", error = %e, "Failed to clear persisted session");
        }
        self.ui.report_ended(call_id, reason.as_str());
        info!(
            target: "session.coordinator",
            call_id = %call_id,
            reason = reason.as_str(),
            "Session ended"
        );
        self.emit(SessionEvent::SessionEnded { call_id, reason });

        if notify_server {
            // Best-effort: the server ring timeout is the backstop if this
            // never arrives.
            let control = self.control.clone();
            tokio::spawn(async move {
                if let Err(e) = control.notify_hangup(call_id).await {
                    warn!(
                        target: "session.coordinator",
                        call_id = %call_id,
                        error = %e,
                        "Hangup notification failed"
                    );
                }
            });
        }

        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; broadcast returns Err then.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::control::mock::MockControlClient;
    use crate::native::mock::{MockNativeUi, UiCall};
    use crate::storage::MemorySessionStorage;
    use uuid::Uuid;

    struct Fixture {
        storage: Arc<MemorySessionStorage>,
        control: Arc<MockControlClient>,
        ui: Arc<MockNativeUi>,
        handle: CoordinatorHandle,
    }

    fn spawn_with(
        storage: MemorySessionStorage,
        control: MockControlClient,
        config: CoordinatorConfig,
    ) -> Fixture {
        let storage = Arc::new(storage);
        let control = Arc::new(control);
        let ui = Arc::new(MockNativeUi::new());
        let handle = CallCoordinator::spawn(
            storage.clone(),
            control.clone(),
            ui.clone(),
            config,
        );
        Fixture {
            storage,
            control,
            ui,
            handle,
        }
    }

    fn fixture() -> Fixture {
        spawn_with(
            MemorySessionStorage::new(),
            MockControlClient::accepting(),
            CoordinatorConfig::new(ResidentId(Uuid::new_v4())),
        )
    }

    fn signal() -> CallSignal {
        CallSignal::new(CallId::new(), "Carlos", "302", "channel-1")
    }

    #[tokio::test]
    async fn test_signal_creates_ringing_session_and_shows_ui() {
        let f = fixture();
        let signal = signal();
        let mut events = f.handle.subscribe();

        let outcome = f.handle.signal_received(signal.clone()).await.unwrap();
        assert_eq!(outcome, SignalOutcome::Created);

        let session = f.handle.session().await.unwrap().unwrap();
        assert_eq!(session.call_id, signal.call_id);
        assert_eq!(session.phase, CallPhase::Ringing);

        // Persisted for crash recovery.
        assert!(f.storage.load().unwrap().is_some());

        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SessionCreated { recovered: false, .. }
        ));
        assert!(matches!(
            f.ui.calls().first().unwrap(),
            UiCall::DisplayIncoming { .. }
        ));

        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_duplicate_signal_is_noop() {
        let f = fixture();
        let signal = signal();

        f.handle.signal_received(signal.clone()).await.unwrap();
        let outcome = f.handle.signal_received(signal).await.unwrap();
        assert_eq!(outcome, SignalOutcome::Duplicate);

        // UI shown exactly once.
        assert_eq!(f.ui.calls().len(), 1);
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_second_call_while_busy_is_ignored() {
        let f = fixture();
        let first = signal();
        f.handle.signal_received(first.clone()).await.unwrap();

        let outcome = f.handle.signal_received(signal()).await.unwrap();
        assert_eq!(outcome, SignalOutcome::Busy);

        let session = f.handle.session().await.unwrap().unwrap();
        assert_eq!(session.call_id, first.call_id);
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_malformed_signal_is_dropped() {
        let f = fixture();
        let mut bad = signal();
        bad.caller_name.clear();

        let outcome = f.handle.signal_received(bad).await.unwrap();
        assert_eq!(outcome, SignalOutcome::Invalid);
        assert!(f.handle.session().await.unwrap().is_none());
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_answer_advances_to_active_on_ack() {
        let f = fixture();
        let mut events = f.handle.subscribe();
        f.handle.signal_received(signal()).await.unwrap();
        f.handle.answer().await.unwrap();

        // SessionCreated, SessionAnswered, then SessionActive once the
        // mock server acks.
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SessionCreated { .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SessionAnswered { .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SessionActive { .. }
        ));

        let session = f.handle.session().await.unwrap().unwrap();
        assert_eq!(session.phase, CallPhase::Active);
        assert_eq!(f.control.answers().len(), 1);

        // Native UI marked answered and stays up.
        assert!(f.ui.calls().contains(&UiCall::MarkAnswered {
            call_id: session.call_id
        }));
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_answer_without_session_is_rejected() {
        let f = fixture();
        let result = f.handle.answer().await;
        assert!(matches!(result, Err(SessionError::NoActiveSession)));
        f.handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_notification_retries_then_succeeds() {
        let f = spawn_with(
            MemorySessionStorage::new(),
            MockControlClient::failing_first_answers(2),
            CoordinatorConfig::new(ResidentId(Uuid::new_v4())),
        );
        f.handle.signal_received(signal()).await.unwrap();
        f.handle.answer().await.unwrap();

        // Local phase advanced immediately despite the failures.
        let session = f.handle.session().await.unwrap().unwrap();
        assert_eq!(session.phase, CallPhase::Connecting);

        // Two failures, 2s apart, then success.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.control.answer_attempts(), 3);
        assert_eq!(f.control.answers().len(), 1);

        let session = f.handle.session().await.unwrap().unwrap();
        assert_eq!(session.phase, CallPhase::Active);
        f.handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_failure_never_rolls_back_local_phase() {
        let f = spawn_with(
            MemorySessionStorage::new(),
            MockControlClient::failing(),
            CoordinatorConfig::new(ResidentId(Uuid::new_v4())),
        );
        f.handle.signal_received(signal()).await.unwrap();
        f.handle.answer().await.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(f.control.answer_attempts(), 3);

        let session = f.handle.session().await.unwrap().unwrap();
        assert_eq!(session.phase, CallPhase::Connecting);
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_end_clears_storage_and_notifies_server() {
        let f = fixture();
        let signal = signal();
        f.handle.signal_received(signal.clone()).await.unwrap();
        f.handle.end(EndReason::Local).await.unwrap();

        assert!(f.handle.session().await.unwrap().is_none());
        assert!(f.storage.load().unwrap().is_none());

        // Hangup notification is spawned; give it a turn.
        tokio::task::yield_now().await;
        assert_eq!(f.control.hangups(), vec![signal.call_id]);
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_end_is_idempotent() {
        let f = fixture();
        f.handle.signal_received(signal()).await.unwrap();
        f.handle.end(EndReason::Local).await.unwrap();
        f.handle.end(EndReason::Local).await.unwrap();
        // Ending with no session at all is also fine.
        assert!(f.handle.session().await.unwrap().is_none());
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_remote_end_does_not_notify_server() {
        let f = fixture();
        let signal = signal();
        let mut events = f.handle.subscribe();
        f.handle.signal_received(signal.clone()).await.unwrap();
        f.handle.remote_ended(signal.call_id).await.unwrap();

        // Drain created, expect ended with remote reason.
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SessionCreated { .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SessionEnded {
                reason: EndReason::Remote,
                ..
            }
        ));

        tokio::task::yield_now().await;
        assert!(f.control.hangups().is_empty());
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_native_decline_notifies_hangup() {
        let f = fixture();
        let signal = signal();
        f.handle.signal_received(signal.clone()).await.unwrap();

        f.handle
            .native_sender()
            .send(NativeEvent::Decline {
                call_id: signal.call_id,
            })
            .await
            .unwrap();

        // Let the coordinator and the spawned notification run.
        tokio::task::yield_now().await;
        let mut waited = 0;
        while f.control.hangups().is_empty() && waited < 100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert_eq!(f.control.hangups(), vec![signal.call_id]);
        assert!(f.handle.session().await.unwrap().is_none());
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_recovery_reemits_fresh_session_to_early_subscribers() {
        let stored = CallSession::from_signal(&signal());
        let f = spawn_with(
            MemorySessionStorage::with_session(stored.clone()),
            MockControlClient::accepting(),
            CoordinatorConfig::new(ResidentId(Uuid::new_v4())),
        );

        // Subscribe before initialize, per the lifecycle contract.
        let mut events = f.handle.subscribe();
        f.handle.initialize().await.unwrap();

        match events.recv().await.unwrap() {
            SessionEvent::SessionCreated { session, recovered } => {
                assert!(recovered);
                assert_eq!(session.call_id, stored.call_id);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // Ringing recovery re-presents the native UI.
        assert!(matches!(
            f.ui.calls().first().unwrap(),
            UiCall::DisplayIncoming { .. }
        ));
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_recovery_discards_expired_session_as_missed() {
        let mut stored = CallSession::from_signal(&signal());
        stored.created_at = Utc::now() - chrono::Duration::seconds(120);
        let expired_call_id = stored.call_id;
        let f = spawn_with(
            MemorySessionStorage::with_session(stored),
            MockControlClient::accepting(),
            CoordinatorConfig::new(ResidentId(Uuid::new_v4())),
        );

        let mut events = f.handle.subscribe();
        f.handle.initialize().await.unwrap();

        assert!(f.handle.session().await.unwrap().is_none());
        assert!(f.storage.load().unwrap().is_none());

        // Subscribers learn about the missed call but never see it as live.
        match events.recv().await.unwrap() {
            SessionEvent::SessionEnded { call_id, reason } => {
                assert_eq!(call_id, expired_call_id);
                assert_eq!(reason, EndReason::Expired);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        f.handle.shutdown();
    }

    #[tokio::test]
    async fn test_recovery_with_empty_storage_is_noop() {
        let f = fixture();
        f.handle.initialize().await.unwrap();
        assert!(f.handle.session().await.unwrap().is_none());
        f.handle.shutdown();
    }
}
