//! Connection manager façade
//!
//! One manager owns one logical broker connection. `manage_connection_async`
//! starts two workers bound to a cancellation token:
//!
//! - the **filter worker** takes reconnect requests one at a time and claims
//!   the dial gate for each; if the gate is already held the request is
//!   dropped, since the dial in flight will answer it.
//! - the **dial worker** runs a dial for every claimed gate, lets the gate go
//!   and publishes the outcome on the state broadcaster.
//!
//! Callers only ever read the broadcaster and send requests, so a slow dial
//! never blocks anyone who just wants the current connection. Both workers
//! run on a `TaskTracker`; [`ConnectionManager::wait_stopped`] resolves for
//! every waiter once both have exited.

use super::dialer::Dialer;
use super::state::{state_channel, ConnectionState, StateError};
use crate::config::MqConfig;
use crate::error::{ConnError, ConnResult};
use crate::sync::{Gate, GateError, GateGuard};
use crate::transport::Transport;
use std::sync::{Arc, Mutex, TryLockError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn, Instrument};

/// Shared handle to an established connection
pub type ConnectionHandle<T> = Arc<<T as Transport>::Connection>;

type StateSender<T> = watch::Sender<ConnectionState<<T as Transport>::Connection>>;
type StateReceiver<T> = watch::Receiver<ConnectionState<<T as Transport>::Connection>>;

/// Channel ends handed to the workers when management starts
struct WorkerChannels<T: Transport> {
    requests_rx: mpsc::Receiver<()>,
    state_tx: StateSender<T>,
}

struct Inner<T: Transport> {
    config: Arc<MqConfig>,
    transport: Arc<T>,
    dialer: Dialer<T>,
    running: Gate,
    requests_tx: mpsc::Sender<()>,
    state_rx: StateReceiver<T>,
    /// Only touched with `try_lock` by the holder of `running`
    channels: Mutex<Option<WorkerChannels<T>>>,
    workers: TaskTracker,
}

/// Self-healing connection to a single broker
pub struct ConnectionManager<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> ConnectionManager<T> {
    /// Create an idle manager; nothing is dialed until management starts
    pub fn new(config: MqConfig, transport: T) -> Self {
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: MqConfig, transport: Arc<T>) -> Self {
        let config = Arc::new(config);
        let dialer = Dialer::new(Arc::clone(&config), Arc::clone(&transport));
        let (requests_tx, requests_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = state_channel();

        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                dialer,
                running: Gate::new(),
                requests_tx,
                state_rx,
                channels: Mutex::new(Some(WorkerChannels {
                    requests_rx,
                    state_tx,
                })),
                workers: TaskTracker::new(),
            }),
        }
    }

    pub fn config(&self) -> &MqConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.inner.transport
    }

    /// True until both workers have exited
    pub fn is_running(&self) -> bool {
        !self.inner.workers.is_empty()
    }

    /// True while a dial is in flight
    pub fn is_dialing(&self) -> bool {
        self.inner.dialer.is_dialing()
    }

    /// Latest published state, without triggering anything
    pub fn current_state(&self) -> ConnectionState<T::Connection> {
        self.inner.state_rx.borrow().clone()
    }

    /// Watch published states
    pub fn subscribe(&self) -> StateReceiver<T> {
        self.inner.state_rx.clone()
    }

    /// Start the filter and dial workers and return immediately.
    ///
    /// Fails with [`ConnError::AlreadyRunning`] while the workers are running and
    /// with [`ConnError::Stopped`] once they have been shut down. Must be called
    /// from within a tokio runtime.
    pub fn manage_connection_async(&self, cancel: &CancellationToken) -> ConnResult<()> {
        let running = self.inner.running.try_acquire().map_err(|e| {
            warn!("could not acquire connection management lock: {}", e);
            ConnError::AlreadyRunning(e)
        })?;

        let channels = self.take_channels(&running)?;

        let (dial_tx, dial_rx) = mpsc::channel::<GateGuard>(1);
        let workers = &self.inner.workers;
        workers.spawn(
            filter_worker(
                channels.requests_rx,
                dial_tx,
                self.inner.dialer.gate().clone(),
                cancel.clone(),
            )
            .instrument(crate::manager_span!(worker = "filter")),
        );
        workers.spawn(
            dial_worker(
                self.inner.dialer.clone(),
                dial_rx,
                channels.state_tx,
                cancel.clone(),
                running,
            )
            .instrument(crate::manager_span!(worker = "dial")),
        );
        workers.close();

        info!(host = %self.inner.config.host, "MQ connection management started");
        Ok(())
    }

    /// Channel ends for a new worker pair; `Stopped` once a pair has consumed them
    fn take_channels(&self, _running: &GateGuard) -> ConnResult<WorkerChannels<T>> {
        // Holding `running` makes us the only caller, so this never contends
        let mut slot = match self.inner.channels.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(ConnError::AlreadyRunning(GateError::AlreadyLocked))
            }
        };
        slot.take().ok_or(ConnError::Stopped)
    }

    /// Wait for both workers to exit after their token was cancelled.
    ///
    /// Any number of callers may wait. Called before management has started,
    /// this waits until it has started and then stopped.
    pub async fn wait_stopped(&self) {
        self.inner.workers.wait().await;
        debug!("MQ connection management stopped");
    }

    /// Current connection, reconnecting once if the published state is bad.
    ///
    /// Only one reconnect cycle is attempted per call; if the state is still
    /// bad afterwards the terminal error is returned.
    pub async fn get_connection(
        &self,
        cancel: &CancellationToken,
    ) -> ConnResult<ConnectionHandle<T>> {
        let state = self.read_state(cancel)?;
        if let Some(connection) = state.healthy_connection() {
            return Ok(connection);
        }

        debug!(
            error = ?state.error.as_ref().map(StateError::kind),
            "tried to get MQ connection but found bad state; reconnecting"
        );
        self.reconnect_from(&state, cancel).await;

        self.read_state(cancel)?.into_result().map_err(|cause| {
            let err = ConnError::Unhealthy(cause);
            error!("{}", err);
            err
        })
    }

    /// Connection from [`get_connection`](Self::get_connection), then a session on it
    pub async fn get_session(&self, cancel: &CancellationToken) -> ConnResult<T::Session> {
        let connection = self.get_connection(cancel).await?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConnError::Cancelled),
            session = self.inner.transport.open_session(&connection) => session.map_err(ConnError::Session),
        }
    }

    /// Ask for a fresh dial and wait until a new outcome is published.
    ///
    /// Best effort: returns early on cancellation or once management has stopped.
    pub async fn reconnect(&self, cancel: &CancellationToken) {
        let baseline = self.inner.state_rx.borrow().clone();
        self.reconnect_from(&baseline, cancel).await;
    }

    async fn reconnect_from(
        &self,
        baseline: &ConnectionState<T::Connection>,
        cancel: &CancellationToken,
    ) {
        let mut state_rx = self.inner.state_rx.clone();
        if !state_rx.borrow_and_update().same_outcome(baseline) {
            debug!("MQ connection state already replaced; skipping reconnect request");
            return;
        }

        debug!("send MQ reconnect request");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = self.inner.requests_tx.send(()) => {
                if sent.is_err() {
                    debug!("reconnect request not delivered: connection management stopped");
                    return;
                }
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
            if !state_rx.borrow_and_update().same_outcome(baseline) {
                return;
            }
        }
    }

    fn read_state(&self, cancel: &CancellationToken) -> ConnResult<ConnectionState<T::Connection>> {
        if cancel.is_cancelled() {
            return Err(ConnError::Cancelled);
        }
        // Closed once the dial worker has exited
        if self.inner.state_rx.has_changed().is_err() {
            return Err(ConnError::Stopped);
        }
        Ok(self.inner.state_rx.borrow().clone())
    }
}

/// Collapse reconnect requests: claim the dial gate or drop the request
async fn filter_worker(
    mut requests_rx: mpsc::Receiver<()>,
    dial_tx: mpsc::Sender<GateGuard>,
    dial_gate: Gate,
    cancel: CancellationToken,
) {
    debug!("MQ filter worker started");
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("filter worker canceled while receiving reconnect requests");
                return;
            }
            request = requests_rx.recv() => {
                if request.is_none() {
                    return;
                }
            }
        }
        debug!("MQ filter worker received reconnect request");

        let guard = match dial_gate.try_acquire() {
            Ok(guard) => guard,
            Err(_) => {
                info!("received MQ reconnect request, but reconnect already in progress");
                continue;
            }
        };

        // At most one guard exists, so this send never waits on a full channel
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("filter worker canceled while sending dial signal");
                return;
            }
            sent = dial_tx.send(guard) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

/// Dial on every claimed gate, release it, then publish the outcome
async fn dial_worker<T: Transport>(
    dialer: Dialer<T>,
    mut dial_rx: mpsc::Receiver<GateGuard>,
    state_tx: StateSender<T>,
    cancel: CancellationToken,
    _running: GateGuard,
) {
    debug!("MQ dial worker started");
    loop {
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("dial worker canceled");
                return;
            }
            signal = dial_rx.recv() => match signal {
                Some(guard) => guard,
                None => return,
            },
        };
        debug!("MQ dial worker received signal");

        let outcome = dialer.dial_holding(&guard, &cancel).await;
        // Release first: a request turned away by the filter must always be
        // answered by a publish that is still to come
        drop(guard);

        let state = ConnectionState::from_dial(outcome);
        info!(
            healthy = state.is_healthy(),
            error = ?state.error.as_ref().map(StateError::kind),
            "MQ connection state updated"
        );
        state_tx.send_replace(state);
    }
}
