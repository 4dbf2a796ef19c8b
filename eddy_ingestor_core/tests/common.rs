#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eddy_data_lake::{DataLakeError, TableSink};
use eddy_events::EventRecord;
use eddy_ingestor_core::{
    ConnectOptions, ConnectionSupervisor, Connector, ConsumptionPosition, EventSource,
    IngestError, IngestLoop, IngestOptions, IngestState, MessagePosition, SourceError,
    SourceMessage,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const TOPIC: &str = "analytics-events";

/// Operations observed by the fake source and sink, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Append(Vec<EventRecord>),
    FailedAppend(usize),
    Commit(ConsumptionPosition),
    Close,
}

pub type OpLog = Arc<Mutex<Vec<Op>>>;

pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<SourceMessage>,
    log: OpLog,
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>, SourceError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    async fn commit(&mut self, position: &ConsumptionPosition) -> Result<(), SourceError> {
        self.log.lock().unwrap().push(Op::Commit(position.clone()));
        Ok(())
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().push(Op::Close);
    }
}

/// Fails the first `failures` connection attempts.
pub struct ScriptedConnector {
    source: Mutex<Option<ChannelSource>>,
    failures: u32,
    attempts: AtomicU32,
}

impl ScriptedConnector {
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn EventSource>, SourceError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(SourceError::Connect {
                source: "broker transport failure".into(),
            });
        }

        let source = self.source.lock().unwrap().take().expect("connected once");
        Ok(Box::new(source))
    }

    fn target(&self) -> String {
        "memory".to_string()
    }
}

/// Records appends, failing the first `failures` of them.
pub struct MemorySink {
    failures: AtomicU32,
    log: OpLog,
}

#[async_trait]
impl TableSink for MemorySink {
    async fn append(&self, events: &[EventRecord]) -> eddy_data_lake::Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if failed {
            self.log
                .lock()
                .unwrap()
                .push(Op::FailedAppend(events.len()));
            return Err(DataLakeError::Internal {
                message: "injected write failure".to_string(),
            });
        }

        self.log.lock().unwrap().push(Op::Append(events.to_vec()));
        Ok(())
    }
}

pub struct Harness {
    pub tx: mpsc::UnboundedSender<SourceMessage>,
    pub log: OpLog,
    pub connector: Arc<ScriptedConnector>,
    pub state: watch::Receiver<IngestState>,
    pub ct: CancellationToken,
    pub task: JoinHandle<Result<(), IngestError>>,
}

#[derive(Default)]
pub struct HarnessOptions {
    pub ingest: IngestOptions,
    pub connect: ConnectOptions,
    pub connect_failures: u32,
    pub write_failures: u32,
}

pub fn start(options: HarnessOptions) -> Harness {
    let (tx, rx) = mpsc::unbounded_channel();
    let log = OpLog::default();

    let connector = Arc::new(ScriptedConnector {
        source: Mutex::new(Some(ChannelSource {
            rx,
            log: log.clone(),
        })),
        failures: options.connect_failures,
        attempts: AtomicU32::new(0),
    });
    let sink = Arc::new(MemorySink {
        failures: AtomicU32::new(options.write_failures),
        log: log.clone(),
    });

    let supervisor = ConnectionSupervisor::new(connector.clone(), options.connect);
    let ingest = IngestLoop::new(supervisor, sink, options.ingest);
    let state = ingest.subscribe();

    let ct = CancellationToken::new();
    let task = tokio::spawn(ingest.run(ct.clone()));

    Harness {
        tx,
        log,
        connector,
        state,
        ct,
        task,
    }
}

impl Harness {
    pub fn send(&self, offset: i64, payload: impl Into<Vec<u8>>) {
        self.tx
            .send(SourceMessage {
                payload: payload.into(),
                position: MessagePosition {
                    topic: TOPIC.to_string(),
                    partition: 0,
                    offset,
                },
            })
            .expect("ingest loop is running");
    }

    /// Sends `count` valid events with offsets starting at `first_offset`.
    pub fn send_events(&self, first_offset: i64, count: usize) {
        for i in 0..count as i64 {
            let offset = first_offset + i;
            let payload = serde_json::json!({
                "timestamp": "2025-03-01T12:00:00Z",
                "channel": "web",
                "event_type": "click",
                "user_id": format!("u{offset}"),
            });
            self.send(offset, payload.to_string());
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.log.lock().unwrap().clone()
    }

    pub fn appended(&self) -> Vec<usize> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Append(events) => Some(events.len()),
                _ => None,
            })
            .collect()
    }

    pub fn committed_offsets(&self) -> Vec<i64> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Commit(position) => position.offset(TOPIC, 0),
                _ => None,
            })
            .collect()
    }

    pub async fn stop(self) -> (Result<(), IngestError>, Vec<Op>, IngestState) {
        self.ct.cancel();
        let result = self.task.await.expect("ingest task panicked");
        let ops = self.log.lock().unwrap().clone();
        let state = *self.state.borrow();
        (result, ops, state)
    }

    pub async fn join(self) -> (Result<(), IngestError>, Vec<Op>, IngestState) {
        let result = self.task.await.expect("ingest task panicked");
        let ops = self.log.lock().unwrap().clone();
        let state = *self.state.borrow();
        (result, ops, state)
    }
}
