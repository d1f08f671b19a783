//! Tokio driver for the connection manager.
//!
//! One task owns the [`ConnectionManager`] and serializes everything that
//! can happen to it: transport reports, timer fires, session changes and
//! teardown all arrive through the same loop, so no two handlers ever race.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::alert::{Alerter, NoAlerts};
use crate::connector::{AttemptSink, CloseRequest, ConnectionHandle, Connector};
use crate::dispatcher::{DEFAULT_ALERT_TITLE, EventDispatcher};
use crate::endpoint::PushEndpoint;
use crate::manager::{AttemptId, Command, ConnectionManager, ConnectionState, ManagerEvent};
use crate::protocol::PushEvent;
use crate::scheduler::{ReconnectScheduler, RetryPolicy, TimerId};
use crate::session::{Credential, SessionGate};
use crate::store::NotificationStore;
use crate::ws::WsConnector;

/// How long teardown waits for the server to acknowledge a close.
const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// A running push client.
///
/// Dropping it tears the connection down in the background; prefer
/// [`shutdown`](Self::shutdown) to wait for the close to finish.
pub struct PushClient {
    events_tx: mpsc::UnboundedSender<ManagerEvent>,
    status_rx: watch::Receiver<ConnectionState>,
    push_events: broadcast::Sender<PushEvent>,
    store: NotificationStore,
    task: Option<JoinHandle<()>>,
}

impl PushClient {
    pub fn builder(
        session: Arc<dyn SessionGate>,
        store: NotificationStore,
        endpoint: PushEndpoint,
    ) -> PushClientBuilder {
        PushClientBuilder::new(session, store, endpoint)
    }

    /// Drive an already-built manager.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        manager: ConnectionManager,
        connector: Arc<dyn Connector>,
        close_grace: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(manager.state());
        let push_events = manager.dispatcher().event_sender();
        let store = manager.dispatcher().store().clone();
        let session_rx = manager.session().subscribe();

        let driver = Driver {
            manager,
            connector,
            events_tx: events_tx.clone(),
            handles: HashMap::new(),
            timers: HashMap::new(),
            status_tx,
            close_grace,
        };
        let task = tokio::spawn(driver.run(events_rx, session_rx));

        Self {
            events_tx,
            status_rx,
            push_events,
            store,
            task: Some(task),
        }
    }

    pub fn status(&self) -> ConnectionState {
        *self.status_rx.borrow()
    }

    /// Watch connection state changes.
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.status_rx.clone()
    }

    /// Receive every decoded push event.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.push_events.subscribe()
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    /// Tear down and wait for the driver to finish.
    pub async fn shutdown(mut self) {
        let _ = self.events_tx.send(ManagerEvent::Teardown);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "push driver task failed");
        }
    }
}

impl Drop for PushClient {
    fn drop(&mut self) {
        // Harmless if the driver already stopped.
        let _ = self.events_tx.send(ManagerEvent::Teardown);
    }
}

/// Builder for a [`PushClient`] over the default WebSocket transport.
pub struct PushClientBuilder {
    session: Arc<dyn SessionGate>,
    store: NotificationStore,
    endpoint: PushEndpoint,
    alerter: Arc<dyn Alerter>,
    alert_title: String,
    retry: RetryPolicy,
    connector: Option<Arc<dyn Connector>>,
    connect_timeout: Option<Duration>,
    close_grace: Duration,
}

impl PushClientBuilder {
    pub fn new(session: Arc<dyn SessionGate>, store: NotificationStore, endpoint: PushEndpoint) -> Self {
        Self {
            session,
            store,
            endpoint,
            alerter: Arc::new(NoAlerts),
            alert_title: DEFAULT_ALERT_TITLE.to_string(),
            retry: RetryPolicy::default(),
            connector: None,
            connect_timeout: None,
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }

    pub fn alerter(mut self, alerter: Arc<dyn Alerter>) -> Self {
        self.alerter = alerter;
        self
    }

    pub fn alert_title(mut self, title: impl Into<String>) -> Self {
        self.alert_title = title.into();
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Replace the WebSocket transport.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Handshake timeout for the default transport.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Start the driver. Must be called from within a tokio runtime.
    pub fn spawn(self) -> PushClient {
        let dispatcher =
            EventDispatcher::new(self.store, self.alerter).with_title(self.alert_title);
        let manager = ConnectionManager::new(
            self.session,
            self.endpoint,
            ReconnectScheduler::new(self.retry),
            dispatcher,
        );
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WsConnector::new().with_connect_timeout(self.connect_timeout)),
        };
        PushClient::spawn(manager, connector, self.close_grace)
    }
}

struct Driver {
    manager: ConnectionManager,
    connector: Arc<dyn Connector>,
    events_tx: mpsc::UnboundedSender<ManagerEvent>,
    handles: HashMap<AttemptId, ConnectionHandle>,
    timers: HashMap<TimerId, JoinHandle<()>>,
    status_tx: watch::Sender<ConnectionState>,
    close_grace: Duration,
}

impl Driver {
    async fn run(
        mut self,
        mut events_rx: mpsc::UnboundedReceiver<ManagerEvent>,
        mut session_rx: watch::Receiver<Option<Credential>>,
    ) {
        self.apply(ManagerEvent::SessionChanged);

        let mut session_open = true;
        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    let Some(event) = event else { break };
                    let teardown = matches!(event, ManagerEvent::Teardown);
                    self.apply(event);
                    if teardown {
                        break;
                    }
                }
                changed = session_rx.changed(), if session_open => {
                    match changed {
                        Ok(()) => self.apply(ManagerEvent::SessionChanged),
                        Err(_) => {
                            debug!("session gate dropped");
                            session_open = false;
                        }
                    }
                }
            }
        }

        self.drain(&mut events_rx).await;
    }

    /// Wait (bounded) for a requested close to be acknowledged.
    async fn drain(&mut self, events_rx: &mut mpsc::UnboundedReceiver<ManagerEvent>) {
        let deadline = tokio::time::sleep(self.close_grace);
        tokio::pin!(deadline);

        while self.manager.state() != ConnectionState::Idle {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => self.apply(event),
                    None => break,
                },
                _ = &mut deadline => {
                    warn!("close not acknowledged in time, dropping connection");
                    break;
                }
            }
        }

        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        debug!("push driver stopped");
    }

    fn apply(&mut self, event: ManagerEvent) {
        let finished = match &event {
            ManagerEvent::Closed { attempt, .. } | ManagerEvent::Errored { attempt, .. } => {
                Some(*attempt)
            }
            ManagerEvent::RetryFired { timer } => {
                self.timers.remove(timer);
                None
            }
            _ => None,
        };

        let commands = self.manager.handle(event);
        if let Some(attempt) = finished {
            self.handles.remove(&attempt);
        }
        for command in commands {
            self.execute(command);
        }

        let state = self.manager.state();
        self.status_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Open { attempt, url } => {
                let sink = AttemptSink::new(attempt, self.events_tx.clone());
                let handle = self.connector.connect(url, sink);
                self.handles.insert(attempt, handle);
            }
            Command::Close {
                attempt,
                code,
                reason,
            } => match self.handles.get_mut(&attempt) {
                Some(handle) => handle.close(CloseRequest { code, reason }),
                None => debug!(%attempt, "close for unknown connection"),
            },
            Command::ScheduleRetry { timer, delay } => {
                let tx = self.events_tx.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(ManagerEvent::RetryFired { timer });
                });
                self.timers.insert(timer, task);
            }
            Command::CancelRetry { timer } => {
                if let Some(task) = self.timers.remove(&timer) {
                    task.abort();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CLOSE_ABNORMAL, CLOSE_NORMAL};
    use crate::session::CredentialStore;
    use crate::store::{MemorySource, StoreConfig};
    use parking_lot::Mutex;
    use tokio::sync::oneshot;
    use url::Url;

    struct MockAttempt {
        url: Url,
        sink: AttemptSink,
        close_rx: Option<oneshot::Receiver<CloseRequest>>,
    }

    #[derive(Default)]
    struct MockConnector {
        attempts: Mutex<Vec<MockAttempt>>,
    }

    impl MockConnector {
        fn count(&self) -> usize {
            self.attempts.lock().len()
        }

        fn sink(&self, index: usize) -> AttemptSink {
            self.attempts.lock()[index].sink.clone()
        }

        fn url(&self, index: usize) -> Url {
            self.attempts.lock()[index].url.clone()
        }

        fn take_close(&self, index: usize) -> oneshot::Receiver<CloseRequest> {
            self.attempts.lock()[index]
                .close_rx
                .take()
                .expect("close receiver already taken")
        }
    }

    impl Connector for MockConnector {
        fn connect(&self, url: Url, sink: AttemptSink) -> ConnectionHandle {
            let (close_tx, close_rx) = oneshot::channel();
            let task = tokio::spawn(async {});
            self.attempts.lock().push(MockAttempt {
                url,
                sink,
                close_rx: Some(close_rx),
            });
            ConnectionHandle::new(close_tx, task)
        }
    }

    struct Harness {
        session: CredentialStore,
        connector: Arc<MockConnector>,
        client: PushClient,
        status: watch::Receiver<ConnectionState>,
    }

    fn start(session: CredentialStore) -> Harness {
        let store = NotificationStore::new(Arc::new(MemorySource::default()), StoreConfig::default());
        let connector = Arc::new(MockConnector::default());
        let client = PushClient::builder(
            Arc::new(session.clone()),
            store,
            PushEndpoint::from_base("http://localhost:8000").unwrap(),
        )
        .retry_policy(RetryPolicy::fixed(Duration::from_secs(5)))
        .connector(connector.clone())
        .spawn();
        let status = client.status_receiver();
        Harness {
            session,
            connector,
            client,
            status,
        }
    }

    async fn wait_for(status: &mut watch::Receiver<ConnectionState>, state: ConnectionState) {
        tokio::time::timeout(Duration::from_secs(60), status.wait_for(|s| *s == state))
            .await
            .expect("timed out waiting for state")
            .expect("driver stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_and_applies_push_events() {
        let mut h = start(CredentialStore::with_token("abc"));
        let mut events = h.client.subscribe();

        wait_for(&mut h.status, ConnectionState::Connecting).await;
        assert_eq!(h.connector.count(), 1);
        assert!(h.connector.url(0).as_str().ends_with("/notifications/ws?token=abc"));

        let sink = h.connector.sink(0);
        sink.opened();
        wait_for(&mut h.status, ConnectionState::Open).await;

        sink.frame(r#"{"msg":"New answer","unread_count":3}"#);
        let event = events.recv().await.unwrap();
        assert_eq!(event.message, "New answer");
        assert_eq!(h.client.store().unread_count(), 3);
        assert!(h.client.store().is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abnormal_close_reconnects_after_delay() {
        let mut h = start(CredentialStore::with_token("abc"));
        wait_for(&mut h.status, ConnectionState::Connecting).await;
        let sink = h.connector.sink(0);
        sink.opened();
        wait_for(&mut h.status, ConnectionState::Open).await;

        sink.closed(CLOSE_ABNORMAL, "");
        wait_for(&mut h.status, ConnectionState::WaitingToRetry).await;

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(h.connector.count(), 1);

        wait_for(&mut h.status, ConnectionState::Connecting).await;
        assert_eq!(h.connector.count(), 2);

        // A late report from the dead socket must not schedule anything.
        sink.closed(CLOSE_ABNORMAL, "");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.connector.count(), 2);
        assert_eq!(h.client.status(), ConnectionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_closes_without_reconnect() {
        let mut h = start(CredentialStore::with_token("abc"));
        wait_for(&mut h.status, ConnectionState::Connecting).await;
        let sink = h.connector.sink(0);
        sink.opened();
        wait_for(&mut h.status, ConnectionState::Open).await;

        h.session.logout();
        wait_for(&mut h.status, ConnectionState::Closing).await;
        let request = h.connector.take_close(0).await.unwrap();
        assert_eq!(request.code, CLOSE_NORMAL);

        sink.closed(request.code, request.reason);
        wait_for(&mut h.status, ConnectionState::Idle).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.connector.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_later_connects() {
        let mut h = start(CredentialStore::new());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.connector.count(), 0);

        h.session.login("late");
        wait_for(&mut h.status, ConnectionState::Connecting).await;
        assert!(h.connector.url(0).as_str().ends_with("token=late"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_waiting_cancels_retry() {
        let mut h = start(CredentialStore::with_token("abc"));
        wait_for(&mut h.status, ConnectionState::Connecting).await;
        h.connector.sink(0).errored("connection refused");
        wait_for(&mut h.status, ConnectionState::WaitingToRetry).await;

        let connector = h.connector.clone();
        h.client.shutdown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_sends_normal_close() {
        let mut h = start(CredentialStore::with_token("abc"));
        wait_for(&mut h.status, ConnectionState::Connecting).await;
        let sink = h.connector.sink(0);
        sink.opened();
        wait_for(&mut h.status, ConnectionState::Open).await;

        let close_rx = h.connector.take_close(0);
        let acknowledge = tokio::spawn(async move {
            let request = close_rx.await.unwrap();
            sink.closed(request.code, request.reason);
            request
        });

        h.client.shutdown().await;
        let request = acknowledge.await.unwrap();
        assert_eq!(request.code, CLOSE_NORMAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_gives_up_after_grace() {
        let mut h = start(CredentialStore::with_token("abc"));
        wait_for(&mut h.status, ConnectionState::Connecting).await;

        // The transport never acknowledges; shutdown still returns.
        let started = tokio::time::Instant::now();
        h.client.shutdown().await;
        assert!(started.elapsed() >= DEFAULT_CLOSE_GRACE);
    }
}
