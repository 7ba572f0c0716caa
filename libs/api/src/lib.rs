use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

mod error;
mod types;
mod util;

pub use error::{ConnectorError, ErrorKind};
pub use types::{BulkItemStatus, Event, RawRecord, RecordValue, TopicPartition, Watermarks};
pub use util::now_secs;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ════════════════════════════════════════════════════════════════
//  Broker Traits
// ════════════════════════════════════════════════════════════════

/// Фабрика соединений с брокером.
///
/// Два независимых способа получить соединение: одноразовая проверка
/// доступности и долгоживущий consumer для основного цикла.
pub trait BrokerConnector: Send + Sync {
    /// Открыть одноразовое соединение, сразу закрыть. Ok = брокер доступен.
    fn check(&self) -> BoxFuture<'_, Result<(), ConnectorError>>;

    /// Открыть steady-state consumer в consumer group, auto-commit выключен.
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn BrokerConsumer>, ConnectorError>>;
}

/// Consumer, эксклюзивно принадлежащий одному циклу чтения.
pub trait BrokerConsumer: Send {
    /// Ждать записи не дольше `max_wait` и не больше `max_records` штук.
    /// Пустой Vec: за окно ничего не пришло.
    fn poll_batch(
        &mut self,
        max_wait: Duration,
        max_records: usize,
    ) -> BoxFuture<'_, Result<Vec<RawRecord>, ConnectorError>>;

    /// Закоммитить ровно переданные offset'ы (next offset to read).
    fn commit<'a>(&'a mut self, offsets: &'a Watermarks) -> BoxFuture<'a, Result<(), ConnectorError>>;

    /// Освободить соединение.
    fn close(&mut self) -> BoxFuture<'_, Result<(), ConnectorError>>;
}

// ════════════════════════════════════════════════════════════════
//  Index Store Trait
// ════════════════════════════════════════════════════════════════

/// Search/index store backend.
pub trait IndexStore: Send + Sync {
    /// Availability check on a connection separate from the write path.
    fn ping(&self) -> BoxFuture<'_, bool>;

    /// Submit every document as an index operation against `index`.
    ///
    /// `Ok` carries one status per document, positionally aligned with
    /// `docs`. `Err` is a transport-level failure: nothing is known about
    /// the individual documents.
    fn bulk<'a>(
        &'a self,
        index: &'a str,
        docs: &'a [Event],
    ) -> BoxFuture<'a, Result<Vec<BulkItemStatus>, ConnectorError>>;
}

// ════════════════════════════════════════════════════════════════
//  Metrics
// ════════════════════════════════════════════════════════════════

/// Timed pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// One broker poll.
    Consume,
    /// Transform pass over one polled batch.
    Transform,
    /// One bulk call to the index store.
    SinkWrite,
    /// Whole orchestrator call for one batch.
    Batch,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Consume => f.write_str("consume"),
            Stage::Transform => f.write_str("transform"),
            Stage::SinkWrite => f.write_str("sink_write"),
            Stage::Batch => f.write_str("batch"),
        }
    }
}

/// Счётчики и длительности. Хранение и экспозиция на стороне реализации.
pub trait Metrics: Send + Sync {
    fn inc_processed(&self, n: u64);
    fn inc_errors(&self);
    /// Documents given up on after the write retry budget.
    fn inc_dropped(&self, n: u64);
    fn observe(&self, stage: Stage, seconds: f64);
}

/// Metrics sink that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn inc_processed(&self, _n: u64) {}
    fn inc_errors(&self) {}
    fn inc_dropped(&self, _n: u64) {}
    fn observe(&self, _stage: Stage, _seconds: f64) {}
}
