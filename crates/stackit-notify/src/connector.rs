//! Transport seam between the runtime and a socket implementation.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::trace;
use url::Url;

use crate::manager::{AttemptId, ManagerEvent};
use crate::protocol::CLOSE_NORMAL;

/// Opens push connections.
///
/// `connect` must not block. The connection reports through the
/// [`AttemptSink`]: at most one `opened`, any number of frames, then exactly
/// one terminal `closed` or `errored`.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: Url, sink: AttemptSink) -> ConnectionHandle;
}

/// Reports one attempt's lifecycle back to the runtime, tagged with its id.
#[derive(Debug, Clone)]
pub struct AttemptSink {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<ManagerEvent>,
}

impl AttemptSink {
    pub(crate) fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<ManagerEvent>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn opened(&self) {
        self.send(ManagerEvent::Opened {
            attempt: self.attempt,
        });
    }

    pub fn frame(&self, text: impl Into<String>) {
        self.send(ManagerEvent::Frame {
            attempt: self.attempt,
            text: text.into(),
        });
    }

    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        self.send(ManagerEvent::Closed {
            attempt: self.attempt,
            code,
            reason: reason.into(),
        });
    }

    pub fn errored(&self, error: impl Into<String>) {
        self.send(ManagerEvent::Errored {
            attempt: self.attempt,
            error: error.into(),
        });
    }

    fn send(&self, event: ManagerEvent) {
        if self.tx.send(event).is_err() {
            trace!(attempt = %self.attempt, "runtime gone, dropping transport event");
        }
    }
}

/// Request to close a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseRequest {
    pub code: u16,
    pub reason: &'static str,
}

impl CloseRequest {
    pub fn normal(reason: &'static str) -> Self {
        Self {
            code: CLOSE_NORMAL,
            reason,
        }
    }
}

/// The runtime's grip on one live connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    close_tx: Option<oneshot::Sender<CloseRequest>>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    pub fn new(close_tx: oneshot::Sender<CloseRequest>, task: JoinHandle<()>) -> Self {
        Self {
            close_tx: Some(close_tx),
            task,
        }
    }

    /// Ask the connection to close. Later calls are no-ops.
    pub fn close(&mut self, request: CloseRequest) {
        if let Some(tx) = self.close_tx.take() {
            // The task may already have finished on its own.
            let _ = tx.send(request);
        }
    }

    /// Stop the connection task without a close handshake.
    pub fn abort(self) {
        self.task.abort();
    }
}
