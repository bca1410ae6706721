//! The stream consumer: the single writer of every projection.
//!
//! The consumer runs a select loop that:
//! 1. Stops when shutdown is signalled
//! 2. Applies local intents arriving on the control channel
//! 3. Decodes and applies the next result-stream message
//! 4. Records reports arriving on the optional error feed
//!
//! Each message is fully handled, including the durable write, before the
//! next one is pulled. The loop ends when shutdown is signalled or once the
//! result transport and the error feed have both closed.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use mxr_events::{ErrorReport, MatrixDescriptor, decode_error_report, decode_event};
use mxr_store::{
    Calculation, Progress, ReconcileStats, Reconciler, ResultCache, Selection, SelectionError,
    StartOutcome,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::error::HostError;
use crate::transport::{Transport, TransportError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerState {
    Stopped,
    Running,
}

/// Local intents routed through the consumer so it stays the only writer.
#[derive(Debug)]
pub enum ControlMsg {
    SelectMatrix {
        id: String,
        resp: oneshot::Sender<Option<MatrixDescriptor>>,
    },
    StartCalculation {
        resp: oneshot::Sender<Result<StartOutcome, SelectionError>>,
    },
    Reset {
        resp: oneshot::Sender<()>,
    },
}

pub struct StreamConsumer {
    transport: Box<dyn Transport>,
    error_feed: Option<Box<dyn Transport>>,
    state: Arc<RwLock<Reconciler>>,
    config: HostConfig,
}

impl StreamConsumer {
    pub fn new(
        transport: impl Transport + 'static,
        reconciler: Reconciler,
        config: HostConfig,
    ) -> Self {
        Self {
            transport: Box::new(transport),
            error_feed: None,
            state: Arc::new(RwLock::new(reconciler)),
            config,
        }
    }

    /// Also consume worker error reports from `feed`.
    pub fn with_error_feed(mut self, feed: impl Transport + 'static) -> Self {
        self.error_feed = Some(Box::new(feed));
        self
    }

    pub fn reader(&self) -> ProjectionReader {
        ProjectionReader {
            state: self.state.clone(),
        }
    }

    /// Spawn the consumer loop on the current runtime.
    pub fn start(self) -> ConsumerHandle {
        let (control_tx, control_rx) = mpsc::channel(self.config.control_capacity);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let reader = self.reader();
        let join = tokio::spawn(self.run(control_rx, shutdown_rx));
        ConsumerHandle {
            control_tx,
            shutdown_tx,
            reader,
            join,
        }
    }

    async fn run(
        mut self,
        mut control_rx: mpsc::Receiver<ControlMsg>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> ReconcileStats {
        info!("stream consumer started");
        let mut control_open = true;
        let mut transport_open = true;
        let mut feed_open = self.error_feed.is_some();

        while transport_open || feed_open {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }

                msg = control_rx.recv(), if control_open => {
                    match msg {
                        Some(cmd) => self.apply_control(cmd),
                        None => {
                            debug!("control channel closed");
                            control_open = false;
                        }
                    }
                }

                received = self.transport.recv(), if transport_open => {
                    match received {
                        Ok(Some(raw)) => self.handle_message(&raw),
                        Ok(None) => {
                            info!("result transport closed");
                            transport_open = false;
                        }
                        Err(err) => back_off(self.config.poll_interval, "result transport", err).await,
                    }
                }

                received = recv_feed(&mut self.error_feed), if feed_open => {
                    match received {
                        Ok(Some(raw)) => self.handle_error_report(&raw),
                        Ok(None) => {
                            debug!("error feed closed");
                            feed_open = false;
                        }
                        Err(err) => back_off(self.config.poll_interval, "error feed", err).await,
                    }
                }
            }

            // Let the host runtime schedule other work between messages.
            tokio::task::yield_now().await;
        }

        let stats = self.reader().stats();
        info!(
            events = stats.events,
            dropped = stats.dropped,
            conflicts = stats.conflicts,
            degraded = stats.degraded,
            "stream consumer stopped"
        );
        stats
    }

    fn handle_message(&self, raw: &str) {
        let mut state = self.write_state();
        match decode_event(raw) {
            Ok(event) => {
                let tag = event.tag();
                let applied = state.apply(event);
                debug!(tag, ?applied, "event applied");
            }
            Err(err) => {
                warn!(%err, "dropping undecodable message");
                state.record_dropped();
            }
        }
    }

    fn handle_error_report(&self, raw: &str) {
        let mut state = self.write_state();
        match decode_error_report(raw) {
            Ok(report) => state.record_error(report),
            Err(err) => {
                warn!(%err, "dropping undecodable error report");
                state.record_dropped();
            }
        }
    }

    fn apply_control(&self, cmd: ControlMsg) {
        let mut state = self.write_state();
        match cmd {
            ControlMsg::SelectMatrix { id, resp } => {
                let selected = state.select_matrix(&id);
                if selected.is_none() {
                    debug!(%id, "selected matrix is not registered");
                }
                let _ = resp.send(selected);
            }
            ControlMsg::StartCalculation { resp } => {
                let _ = resp.send(state.start_calculation());
            }
            ControlMsg::Reset { resp } => {
                state.reset();
                let _ = resp.send(());
            }
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Reconciler> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn back_off(interval: Duration, source: &str, err: TransportError) {
    warn!(%err, source, "receive failed, backing off");
    tokio::time::sleep(interval).await;
}

async fn recv_feed(
    feed: &mut Option<Box<dyn Transport>>,
) -> Result<Option<String>, TransportError> {
    match feed {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

/// Owner-side handle of a running consumer.
pub struct ConsumerHandle {
    control_tx: mpsc::Sender<ControlMsg>,
    shutdown_tx: broadcast::Sender<()>,
    reader: ProjectionReader,
    join: JoinHandle<ReconcileStats>,
}

impl ConsumerHandle {
    pub fn reader(&self) -> ProjectionReader {
        self.reader.clone()
    }

    pub fn state(&self) -> ConsumerState {
        if self.join.is_finished() {
            ConsumerState::Stopped
        } else {
            ConsumerState::Running
        }
    }

    /// Sender that stops the consumer when signalled, e.g. from a Ctrl-C task.
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub async fn select_matrix(
        &self,
        id: impl Into<String>,
    ) -> Result<Option<MatrixDescriptor>, HostError> {
        let id = id.into();
        self.request(|resp| ControlMsg::SelectMatrix { id, resp })
            .await
    }

    pub async fn start_calculation(&self) -> Result<StartOutcome, HostError> {
        Ok(self
            .request(|resp| ControlMsg::StartCalculation { resp })
            .await??)
    }

    pub async fn reset(&self) -> Result<(), HostError> {
        self.request(|resp| ControlMsg::Reset { resp }).await
    }

    /// Signal shutdown and wait for the loop to exit.
    pub async fn stop(self) -> Result<ReconcileStats, HostError> {
        let _ = self.shutdown_tx.send(());
        Ok(self.join.await?)
    }

    /// Wait for the loop to exit on its own, i.e. once every source closes.
    pub async fn join(self) -> Result<ReconcileStats, HostError> {
        Ok(self.join.await?)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ControlMsg,
    ) -> Result<T, HostError> {
        let (resp, rx) = oneshot::channel();
        self.control_tx
            .send(make(resp))
            .await
            .map_err(|_| HostError::NotRunning)?;
        rx.await.map_err(|_| HostError::NotRunning)
    }
}

/// Read-only view of the projections. Every query returns a snapshot in time;
/// query again to observe newer data.
#[derive(Clone)]
pub struct ProjectionReader {
    state: Arc<RwLock<Reconciler>>,
}

impl ProjectionReader {
    fn read(&self) -> RwLockReadGuard<'_, Reconciler> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn matrices(&self) -> Vec<MatrixDescriptor> {
        self.read().registry().list().to_vec()
    }

    pub fn current(&self) -> Option<Calculation> {
        self.read().current().cloned()
    }

    pub fn selection(&self) -> Selection {
        self.read().selection().clone()
    }

    pub fn progress(&self) -> Option<Progress> {
        self.read().progress()
    }

    pub fn completion_count(&self, result_matrix_id: &str) -> usize {
        self.read().cache().completion_count(result_matrix_id)
    }

    pub fn completion_fraction(&self, result_matrix_id: &str, total_cells: u64) -> f64 {
        self.read()
            .cache()
            .completion_fraction(result_matrix_id, total_cells)
    }

    pub fn cell_value(&self, result_matrix_id: &str, row: u32, column: u32) -> Option<f64> {
        self.read().cache().cell_value(result_matrix_id, row, column)
    }

    pub fn cache(&self) -> ResultCache {
        self.read().cache().clone()
    }

    pub fn errors(&self) -> Vec<ErrorReport> {
        self.read().errors().list().to_vec()
    }

    pub fn stats(&self) -> ReconcileStats {
        self.read().stats()
    }
}
