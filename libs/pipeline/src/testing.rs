//! Test doubles for the broker, index store, writer and metrics seams.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use loader_api::{
    BoxFuture, BrokerConnector, BrokerConsumer, BulkItemStatus, ConnectorError, Event,
    IndexStore, Metrics, RawRecord, RecordValue, Stage, Watermarks,
};

use crate::sink::{BatchWriter, WriteOutcome};
use crate::PipelineError;

pub fn event(value: Value) -> Event {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

pub fn record(topic: &str, partition: i32, offset: i64, value: Value) -> RawRecord {
    RawRecord {
        topic: topic.into(),
        partition,
        offset,
        key: None,
        value: RecordValue::Json(value),
    }
}

pub fn statuses(codes: &[u16]) -> Vec<BulkItemStatus> {
    codes.iter().copied().map(BulkItemStatus).collect()
}

// ═══════════════════════════════════════════════════════════════
//  Metrics
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct RecordingMetrics {
    processed: AtomicU64,
    errors: AtomicU64,
    dropped: AtomicU64,
    observed: Mutex<HashMap<Stage, usize>>,
}

impl RecordingMetrics {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn observations(&self, stage: Stage) -> usize {
        self.observed.lock().unwrap().get(&stage).copied().unwrap_or(0)
    }

    pub fn total_observations(&self) -> usize {
        self.observed.lock().unwrap().values().sum()
    }
}

impl Metrics for RecordingMetrics {
    fn inc_processed(&self, n: u64) {
        self.processed.fetch_add(n, Ordering::SeqCst);
    }

    fn inc_errors(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn inc_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::SeqCst);
    }

    fn observe(&self, stage: Stage, _seconds: f64) {
        *self.observed.lock().unwrap().entry(stage).or_default() += 1;
    }
}

// ═══════════════════════════════════════════════════════════════
//  Index store
// ═══════════════════════════════════════════════════════════════

/// Отвечает по скрипту; когда скрипт кончился, всё проиндексировано.
#[derive(Default)]
pub struct ScriptedStore {
    pings: Mutex<VecDeque<bool>>,
    responses: Mutex<VecDeque<Result<Vec<BulkItemStatus>, ConnectorError>>>,
    calls: Mutex<Vec<(String, Vec<Event>)>>,
    ping_calls: AtomicU64,
}

impl ScriptedStore {
    pub fn with_responses(
        responses: impl IntoIterator<Item = Result<Vec<BulkItemStatus>, ConnectorError>>,
    ) -> Self {
        Self { responses: Mutex::new(responses.into_iter().collect()), ..Default::default() }
    }

    pub fn with_pings(pings: impl IntoIterator<Item = bool>) -> Self {
        Self { pings: Mutex::new(pings.into_iter().collect()), ..Default::default() }
    }

    /// Documents submitted by each bulk call, in order.
    pub fn calls(&self) -> Vec<Vec<Event>> {
        self.calls.lock().unwrap().iter().map(|(_, docs)| docs.clone()).collect()
    }

    pub fn indices(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(index, _)| index.clone()).collect()
    }

    pub fn ping_calls(&self) -> u64 {
        self.ping_calls.load(Ordering::SeqCst)
    }
}

impl IndexStore for ScriptedStore {
    fn ping(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            self.ping_calls.fetch_add(1, Ordering::SeqCst);
            self.pings.lock().unwrap().pop_front().unwrap_or(false)
        })
    }

    fn bulk<'a>(
        &'a self,
        index: &'a str,
        docs: &'a [Event],
    ) -> BoxFuture<'a, Result<Vec<BulkItemStatus>, ConnectorError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push((index.to_string(), docs.to_vec()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![BulkItemStatus::CREATED; docs.len()]))
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Batch writer
// ═══════════════════════════════════════════════════════════════

/// Writer that records batches and optionally fails every call.
#[derive(Default)]
pub struct RecordingWriter {
    fail_with: Option<String>,
    batches: Mutex<Vec<Vec<Event>>>,
}

impl RecordingWriter {
    pub fn failing(message: &str) -> Self {
        Self { fail_with: Some(message.into()), ..Default::default() }
    }

    pub fn batches(&self) -> Vec<Vec<Event>> {
        self.batches.lock().unwrap().clone()
    }
}

impl BatchWriter for RecordingWriter {
    fn write_batch(&self, events: Vec<Event>) -> BoxFuture<'_, Result<WriteOutcome, PipelineError>> {
        Box::pin(async move {
            let submitted = events.len();
            self.batches.lock().unwrap().push(events);
            match &self.fail_with {
                Some(msg) => Err(PipelineError::Sink(ConnectorError::io(msg.clone()))),
                None => Ok(WriteOutcome { submitted, indexed: submitted, attempts: 1, dropped: Vec::new() }),
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Broker
// ═══════════════════════════════════════════════════════════════

/// Shared view of what the scripted consumer saw.
#[derive(Default)]
pub struct BrokerLog {
    pub opened: AtomicU64,
    pub closed: AtomicU64,
    pub polls: AtomicU64,
    pub commits: Mutex<Vec<Watermarks>>,
}

impl BrokerLog {
    pub fn commits(&self) -> Vec<Watermarks> {
        self.commits.lock().unwrap().clone()
    }
}

/// Брокер по скрипту. Когда скрипт poll'ов кончился, отменяет token
/// и зависает, как живой брокер без новых сообщений.
pub struct ScriptedBroker {
    checks: Mutex<VecDeque<Result<(), ConnectorError>>>,
    polls: Mutex<Option<VecDeque<Result<Vec<RawRecord>, ConnectorError>>>>,
    open_error: Option<ConnectorError>,
    token: CancellationToken,
    pub log: Arc<BrokerLog>,
}

impl ScriptedBroker {
    pub fn new(
        polls: impl IntoIterator<Item = Result<Vec<RawRecord>, ConnectorError>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            checks: Mutex::new(VecDeque::new()),
            polls: Mutex::new(Some(polls.into_iter().collect())),
            open_error: None,
            token,
            log: Arc::new(BrokerLog::default()),
        }
    }

    pub fn with_checks(mut self, checks: impl IntoIterator<Item = Result<(), ConnectorError>>) -> Self {
        self.checks = Mutex::new(checks.into_iter().collect());
        self
    }

    pub fn failing_open(mut self, error: ConnectorError) -> Self {
        self.open_error = Some(error);
        self
    }
}

impl BrokerConnector for ScriptedBroker {
    fn check(&self) -> BoxFuture<'_, Result<(), ConnectorError>> {
        Box::pin(async move {
            self.checks
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ConnectorError::io("broker down")))
        })
    }

    fn open(&self) -> BoxFuture<'_, Result<Box<dyn BrokerConsumer>, ConnectorError>> {
        Box::pin(async move {
            if let Some(e) = &self.open_error {
                return Err(e.clone());
            }
            let polls = self.polls.lock().unwrap().take().unwrap_or_default();
            self.log.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedConsumer {
                polls,
                token: self.token.clone(),
                log: self.log.clone(),
            }) as Box<dyn BrokerConsumer>)
        })
    }
}

struct ScriptedConsumer {
    polls: VecDeque<Result<Vec<RawRecord>, ConnectorError>>,
    token: CancellationToken,
    log: Arc<BrokerLog>,
}

impl BrokerConsumer for ScriptedConsumer {
    fn poll_batch(
        &mut self,
        _max_wait: Duration,
        _max_records: usize,
    ) -> BoxFuture<'_, Result<Vec<RawRecord>, ConnectorError>> {
        Box::pin(async move {
            self.log.polls.fetch_add(1, Ordering::SeqCst);
            match self.polls.pop_front() {
                Some(result) => result,
                None => {
                    self.token.cancel();
                    std::future::pending().await
                }
            }
        })
    }

    fn commit<'a>(&'a mut self, offsets: &'a Watermarks) -> BoxFuture<'a, Result<(), ConnectorError>> {
        Box::pin(async move {
            self.log.commits.lock().unwrap().push(offsets.clone());
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), ConnectorError>> {
        Box::pin(async move {
            self.log.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Log capture
// ═══════════════════════════════════════════════════════════════

#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Capture log lines emitted on the current thread while the guard lives.
/// `#[tokio::test]` runs on a current-thread runtime, so the whole test is covered.
pub fn capture_logs() -> (tracing::subscriber::DefaultGuard, LogBuffer) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .with_writer(move || writer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), buffer)
}
