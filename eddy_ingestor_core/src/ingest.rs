//! The ingest state machine.
//!
//! ```text
//! CONNECTING -> CONSUMING <-> FLUSHING
//!                   |            |
//!                   +-> DRAINING <+-> STOPPED
//!
//! any state -> FAILED
//! ```
//!
//! The consumption position is committed only after the batch holding the
//! corresponding records was appended. A crash between the two redelivers
//! the batch, so delivery is at-least-once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use eddy_data_lake::TableSink;
use eddy_events::normalize;
use snafu::ResultExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::accumulator::{BatchAccumulator, FlushDecision, FlushTrigger};
use crate::error::{AcquireSnafu, PollSnafu, Result, SupervisorError, WriteSnafu};
use crate::metrics::IngestMetrics;
use crate::position::ConsumptionPosition;
use crate::source::{EventSource, SourceMessage};
use crate::supervisor::ConnectionSupervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Connecting,
    Consuming,
    Flushing,
    Draining,
    Stopped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Buffered events that trigger a flush.
    pub batch_size: usize,
    /// Time since the last flush that triggers a flush.
    pub batch_age: Duration,
    /// Upper bound on a single broker poll, and so on shutdown latency.
    pub poll_interval: Duration,
    /// Append attempts per batch before failing.
    pub write_max_attempts: u32,
    /// Fixed wait between append attempts.
    pub write_retry_interval: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_age: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            write_max_attempts: 5,
            write_retry_interval: Duration::from_secs(3),
        }
    }
}

pub struct IngestLoop {
    supervisor: ConnectionSupervisor,
    sink: Arc<dyn TableSink>,
    options: IngestOptions,
    metrics: IngestMetrics,
    state: watch::Sender<IngestState>,
}

/// Everything owned by the loop once connected.
struct Session {
    source: Box<dyn EventSource>,
    accumulator: BatchAccumulator,
    /// Consumed but not yet committed.
    pending: ConsumptionPosition,
}

enum Consumed {
    Flush(FlushTrigger),
    Shutdown,
}

enum Flushed {
    Committed,
    /// Shutdown arrived while waiting to retry. The batch is back in the
    /// accumulator.
    Interrupted,
}

impl IngestLoop {
    pub fn new(
        supervisor: ConnectionSupervisor,
        sink: Arc<dyn TableSink>,
        options: IngestOptions,
    ) -> Self {
        let (state, _) = watch::channel(IngestState::Connecting);
        Self {
            supervisor,
            sink,
            options,
            metrics: IngestMetrics::default(),
            state,
        }
    }

    /// Observes state transitions.
    pub fn subscribe(&self) -> watch::Receiver<IngestState> {
        self.state.subscribe()
    }

    /// Runs until `ct` is cancelled or an unrecoverable error occurs.
    ///
    /// Cancellation is a clean stop: buffered events get one final append
    /// attempt and `Ok(())` is returned.
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        info!(state = %IngestState::Connecting, "Ingest loop started");

        let source = match self.supervisor.acquire(&ct).await {
            Ok(source) => source,
            Err(SupervisorError::Cancelled) => {
                self.enter(IngestState::Stopped);
                return Ok(());
            }
            Err(err) => {
                error!(error = %err, "Giving up on broker connection");
                self.enter(IngestState::Failed);
                return Err(err).context(AcquireSnafu {});
            }
        };

        let mut session = Session {
            source,
            accumulator: BatchAccumulator::new(
                self.options.batch_size,
                self.options.batch_age,
                Instant::now(),
            ),
            pending: ConsumptionPosition::default(),
        };

        self.enter(IngestState::Consuming);
        let result = self.process(&mut session, &ct).await;
        session.source.close().await;

        match &result {
            Ok(()) => {
                self.enter(IngestState::Stopped);
            }
            Err(err) => {
                error!(error = %err, "Ingest loop failed");
                self.enter(IngestState::Failed);
            }
        }

        result
    }

    async fn process(&self, session: &mut Session, ct: &CancellationToken) -> Result<()> {
        let mut state = IngestState::Consuming;
        loop {
            state = match state {
                IngestState::Consuming => match self.consume(session, ct).await? {
                    Consumed::Flush(trigger) => {
                        debug!(?trigger, records = session.accumulator.len(), "Flush triggered");
                        self.enter(IngestState::Flushing)
                    }
                    Consumed::Shutdown => self.enter(IngestState::Draining),
                },
                IngestState::Flushing => match self.flush(session, ct).await? {
                    Flushed::Committed => self.enter(IngestState::Consuming),
                    Flushed::Interrupted => self.enter(IngestState::Draining),
                },
                IngestState::Draining => {
                    self.drain(session).await;
                    return Ok(());
                }
                IngestState::Connecting | IngestState::Stopped | IngestState::Failed => {
                    return Ok(());
                }
            };
        }
    }

    async fn consume(&self, session: &mut Session, ct: &CancellationToken) -> Result<Consumed> {
        loop {
            let now = Instant::now();
            if let FlushDecision::Flush(trigger) = session.accumulator.tick(now) {
                return Ok(Consumed::Flush(trigger));
            }

            let timeout = if session.accumulator.is_empty() {
                self.options.poll_interval
            } else {
                let until_deadline = session.accumulator.deadline().saturating_duration_since(now);
                self.options.poll_interval.min(until_deadline)
            };

            let polled = tokio::select! {
                biased;
                _ = ct.cancelled() => return Ok(Consumed::Shutdown),
                polled = session.source.poll(timeout) => polled,
            };

            match polled {
                Ok(None) => {}
                Ok(Some(message)) => {
                    if let Some(trigger) = self.absorb(session, message) {
                        return Ok(Consumed::Flush(trigger));
                    }
                }
                Err(err) if err.kind().is_retryable() => {
                    warn!(error = %err, "Failed to poll broker");
                    tokio::select! {
                        biased;
                        _ = ct.cancelled() => return Ok(Consumed::Shutdown),
                        _ = tokio::time::sleep(self.options.poll_interval) => {}
                    }
                }
                Err(err) => return Err(err).context(PollSnafu {}),
            }
        }
    }

    fn absorb(&self, session: &mut Session, message: SourceMessage) -> Option<FlushTrigger> {
        self.metrics.messages_consumed.add(1, &[]);
        // Dropped messages still advance the position so they are not redelivered.
        session.pending.observe(&message.position);

        let event = match normalize(&message.payload) {
            Ok(event) => event,
            Err(err) => {
                self.metrics.messages_dropped.add(1, &[]);
                warn!(
                    topic = %message.position.topic,
                    partition = message.position.partition,
                    offset = message.position.offset,
                    error = %err,
                    "Dropping malformed message"
                );
                return None;
            }
        };

        match session.accumulator.absorb(event, Instant::now()) {
            FlushDecision::Flush(trigger) => Some(trigger),
            FlushDecision::Hold => None,
        }
    }

    async fn flush(&self, session: &mut Session, ct: &CancellationToken) -> Result<Flushed> {
        let batch = session.accumulator.flush(Instant::now());
        let position = session.pending.take();
        let records = batch.len();
        let max_attempts = self.options.write_max_attempts.max(1);

        let mut attempt = 1;
        loop {
            let err = match self.sink.append(&batch).await {
                Ok(()) => {
                    self.record_written(records);
                    info!(records, attempt, "Batch flushed");
                    self.commit(session, position).await;
                    return Ok(Flushed::Committed);
                }
                Err(err) => err,
            };

            if attempt >= max_attempts {
                return Err(err).context(WriteSnafu { records, attempts: attempt });
            }

            self.metrics.write_retries.add(1, &[]);
            warn!(
                records,
                attempt,
                max_attempts,
                retry_in = ?self.options.write_retry_interval,
                error = %err,
                "Failed to write batch"
            );

            tokio::select! {
                biased;
                _ = ct.cancelled() => {
                    session.accumulator.restore(batch);
                    session.pending.merge(position);
                    return Ok(Flushed::Interrupted);
                }
                _ = tokio::time::sleep(self.options.write_retry_interval) => {}
            }

            attempt += 1;
        }
    }

    /// Final best-effort append. A failure is logged and the uncommitted
    /// records are redelivered on the next start.
    async fn drain(&self, session: &mut Session) {
        let batch = session.accumulator.drain();
        let position = session.pending.take();

        if batch.is_empty() {
            debug!("No buffered events to drain");
            self.commit(session, position).await;
            return;
        }

        let records = batch.len();
        match self.sink.append(&batch).await {
            Ok(()) => {
                self.record_written(records);
                info!(records, "Drained buffered events");
                self.commit(session, position).await;
            }
            Err(err) => {
                error!(records, error = %err, "Failed to write final batch");
            }
        }
    }

    async fn commit(&self, session: &mut Session, position: ConsumptionPosition) {
        if position.is_empty() {
            return;
        }

        match session.source.commit(&position).await {
            Ok(()) => debug!(%position, "Committed consumption position"),
            Err(err) => {
                // The next commit covers these offsets.
                warn!(%position, error = %err, "Failed to commit consumption position");
                session.pending.merge(position);
            }
        }
    }

    fn record_written(&self, records: usize) {
        self.metrics.records_written.add(records as u64, &[]);
        self.metrics.batches_flushed.add(1, &[]);
    }

    fn enter(&self, to: IngestState) -> IngestState {
        let from = self.state.send_replace(to);
        info!(%from, %to, "Ingest state changed");
        to
    }
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "CONNECTING",
            Self::Consuming => "CONSUMING",
            Self::Flushing => "FLUSHING",
            Self::Draining => "DRAINING",
            Self::Stopped => "STOPPED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
