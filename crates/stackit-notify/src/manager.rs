//! Push connection state machine.
//!
//! [`ConnectionManager`] is pure: it consumes [`ManagerEvent`]s and returns
//! the [`Command`]s the runtime must execute. Every connection attempt gets a
//! fresh [`AttemptId`]; events tagged with anything but the current attempt
//! are stale and ignored. This is what keeps a late close from an old socket
//! from scheduling a retry next to a healthy new one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::dispatcher::EventDispatcher;
use crate::endpoint::PushEndpoint;
use crate::protocol::{CLOSE_CREDENTIAL_REJECTED, CLOSE_NORMAL, is_intentional_close};
use crate::scheduler::{ReconnectScheduler, TimerId};
use crate::session::{Credential, SessionGate};

/// Identity of one connection attempt. Strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    /// We asked the current connection to close and are waiting for it.
    Closing,
    /// An abnormal close happened; a retry timer is armed.
    WaitingToRetry,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting => write!(f, "connecting..."),
            ConnectionState::Open => write!(f, "connected"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::WaitingToRetry => write!(f, "waiting to reconnect"),
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// The session gate's credential may have changed.
    SessionChanged,
    Opened {
        attempt: AttemptId,
    },
    Frame {
        attempt: AttemptId,
        text: String,
    },
    /// Terminal: the attempt's connection is gone.
    Closed {
        attempt: AttemptId,
        code: u16,
        reason: String,
    },
    /// Terminal: the attempt failed without a close handshake.
    Errored {
        attempt: AttemptId,
        error: String,
    },
    RetryFired {
        timer: TimerId,
    },
    /// The owner is going away. Nothing reconnects after this.
    Teardown,
}

/// Side effects for the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open {
        attempt: AttemptId,
        url: Url,
    },
    Close {
        attempt: AttemptId,
        code: u16,
        reason: &'static str,
    },
    ScheduleRetry {
        timer: TimerId,
        delay: Duration,
    },
    CancelRetry {
        timer: TimerId,
    },
}

#[derive(Debug)]
enum Phase {
    Idle,
    Connecting {
        attempt: AttemptId,
        credential: Credential,
    },
    Open {
        attempt: AttemptId,
        credential: Credential,
    },
    Closing {
        attempt: AttemptId,
    },
    WaitingToRetry,
}

/// Owns the lifecycle of the single push connection.
pub struct ConnectionManager {
    session: Arc<dyn SessionGate>,
    endpoint: PushEndpoint,
    scheduler: ReconnectScheduler,
    dispatcher: EventDispatcher,
    phase: Phase,
    /// Last credential observed from the session gate.
    observed: Option<Credential>,
    last_attempt: u64,
    torn_down: bool,
}

impl ConnectionManager {
    pub fn new(
        session: Arc<dyn SessionGate>,
        endpoint: PushEndpoint,
        scheduler: ReconnectScheduler,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            session,
            endpoint,
            scheduler,
            dispatcher,
            phase: Phase::Idle,
            observed: None,
            last_attempt: 0,
            torn_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.phase {
            Phase::Idle => ConnectionState::Idle,
            Phase::Connecting { .. } => ConnectionState::Connecting,
            Phase::Open { .. } => ConnectionState::Open,
            Phase::Closing { .. } => ConnectionState::Closing,
            Phase::WaitingToRetry => ConnectionState::WaitingToRetry,
        }
    }

    /// The attempt whose events are currently honored, if any.
    pub fn current_attempt(&self) -> Option<AttemptId> {
        match self.phase {
            Phase::Connecting { attempt, .. } | Phase::Open { attempt, .. } => Some(attempt),
            _ => None,
        }
    }

    pub fn pending_retry(&self) -> Option<TimerId> {
        self.scheduler.pending()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn session(&self) -> &Arc<dyn SessionGate> {
        &self.session
    }

    /// Apply one event.
    pub fn handle(&mut self, event: ManagerEvent) -> Vec<Command> {
        let mut commands = Vec::new();
        match event {
            ManagerEvent::SessionChanged => self.on_session_changed(&mut commands),
            ManagerEvent::Opened { attempt } => self.on_opened(attempt),
            ManagerEvent::Frame { attempt, text } => self.on_frame(attempt, &text),
            ManagerEvent::Closed {
                attempt,
                code,
                reason,
            } => self.on_closed(attempt, code, &reason, &mut commands),
            ManagerEvent::Errored { attempt, error } => {
                self.on_errored(attempt, &error, &mut commands)
            }
            ManagerEvent::RetryFired { timer } => self.on_retry_fired(timer, &mut commands),
            ManagerEvent::Teardown => self.on_teardown(&mut commands),
        }
        commands
    }

    fn on_session_changed(&mut self, commands: &mut Vec<Command>) {
        if self.torn_down {
            debug!("session change after teardown ignored");
            return;
        }
        let credential = self.session.credential();
        if credential != self.observed {
            if self.observed.is_some() {
                debug!("session changed, dropping cached notifications");
                self.dispatcher.store().clear();
            }
            self.observed = credential.clone();
        }

        let live = match &self.phase {
            Phase::Connecting {
                attempt,
                credential,
            }
            | Phase::Open {
                attempt,
                credential,
            } => Some((*attempt, credential.clone())),
            _ => None,
        };

        match (live, credential) {
            (None, Some(credential)) if matches!(self.phase, Phase::Idle) => {
                self.start_attempt(credential, commands);
            }
            (Some((attempt, _)), None) => {
                info!(%attempt, "session ended, closing push connection");
                self.close_current(attempt, "session ended", commands);
            }
            (Some((attempt, current)), Some(next)) if current != next => {
                // Reopen with the new credential once this one has closed.
                info!(%attempt, "credential changed, replacing push connection");
                self.close_current(attempt, "credential changed", commands);
            }
            _ => {}
        }
    }

    fn on_opened(&mut self, attempt: AttemptId) {
        if let Phase::Connecting { attempt: current, .. } = self.phase
            && current == attempt
        {
            let Phase::Connecting { credential, .. } =
                std::mem::replace(&mut self.phase, Phase::Idle)
            else {
                return;
            };
            self.phase = Phase::Open {
                attempt,
                credential,
            };
            self.scheduler.record_success();
            info!(%attempt, "push connection open");
        } else {
            debug!(%attempt, "stale open ignored");
        }
    }

    fn on_frame(&mut self, attempt: AttemptId, text: &str) {
        if self.current_attempt() == Some(attempt) {
            self.dispatcher.dispatch(text);
        } else {
            debug!(%attempt, "frame from stale connection dropped");
        }
    }

    fn on_closed(&mut self, attempt: AttemptId, code: u16, reason: &str, commands: &mut Vec<Command>) {
        if let Phase::Closing { attempt: closing } = self.phase
            && closing == attempt
        {
            debug!(%attempt, code, "push connection closed");
            self.finish_closing(commands);
            return;
        }
        if self.current_attempt() != Some(attempt) {
            debug!(%attempt, code, "stale close ignored");
            return;
        }

        if is_intentional_close(code) {
            info!(%attempt, reason, "server closed push connection");
            self.phase = Phase::Idle;
        } else {
            if code == CLOSE_CREDENTIAL_REJECTED {
                warn!(%attempt, reason, "server rejected the credential");
            } else {
                warn!(%attempt, code, reason, "push connection lost");
            }
            self.enter_retry(commands);
        }
    }

    fn on_errored(&mut self, attempt: AttemptId, error: &str, commands: &mut Vec<Command>) {
        if let Phase::Closing { attempt: closing } = self.phase
            && closing == attempt
        {
            debug!(%attempt, error, "push connection failed while closing");
            self.finish_closing(commands);
            return;
        }
        if self.current_attempt() != Some(attempt) {
            debug!(%attempt, "stale error ignored");
            return;
        }

        warn!(%attempt, error, "push connection failed");
        self.enter_retry(commands);
    }

    fn on_retry_fired(&mut self, timer: TimerId, commands: &mut Vec<Command>) {
        if !self.scheduler.fire(timer) {
            debug!(%timer, "cancelled retry ignored");
            return;
        }
        if self.torn_down || !matches!(self.phase, Phase::WaitingToRetry) {
            debug!(%timer, state = %self.state(), "retry not needed");
            return;
        }

        match self.session.credential() {
            Some(credential) => {
                debug!(%timer, "retrying push connection");
                self.start_attempt(credential, commands);
            }
            None => {
                info!("session ended while waiting to reconnect");
                self.phase = Phase::Idle;
            }
        }
    }

    fn on_teardown(&mut self, commands: &mut Vec<Command>) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(timer) = self.scheduler.cancel() {
            commands.push(Command::CancelRetry { timer });
        }
        match self.phase {
            Phase::Connecting { attempt, .. } | Phase::Open { attempt, .. } => {
                info!(%attempt, "tearing down push connection");
                self.close_current(attempt, "client shutting down", commands);
            }
            Phase::WaitingToRetry => self.phase = Phase::Idle,
            Phase::Closing { .. } | Phase::Idle => {}
        }
    }

    fn start_attempt(&mut self, credential: Credential, commands: &mut Vec<Command>) {
        self.last_attempt += 1;
        let attempt = AttemptId(self.last_attempt);
        let url = self.endpoint.url_for(&credential);
        info!(%attempt, endpoint = %self.endpoint.url(), "opening push connection");
        self.phase = Phase::Connecting {
            attempt,
            credential,
        };
        commands.push(Command::Open { attempt, url });
    }

    fn close_current(&mut self, attempt: AttemptId, reason: &'static str, commands: &mut Vec<Command>) {
        self.phase = Phase::Closing { attempt };
        commands.push(Command::Close {
            attempt,
            code: CLOSE_NORMAL,
            reason,
        });
    }

    fn finish_closing(&mut self, commands: &mut Vec<Command>) {
        self.phase = Phase::Idle;
        if self.torn_down {
            return;
        }
        if let Some(credential) = self.session.credential() {
            self.start_attempt(credential, commands);
        }
    }

    fn enter_retry(&mut self, commands: &mut Vec<Command>) {
        self.phase = Phase::WaitingToRetry;
        if let Some(retry) = self.scheduler.schedule() {
            info!(delay = ?retry.delay, timer = %retry.timer, "reconnect scheduled");
            commands.push(Command::ScheduleRetry {
                timer: retry.timer,
                delay: retry.delay,
            });
        }
    }
}
