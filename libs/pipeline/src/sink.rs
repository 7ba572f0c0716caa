use std::sync::Arc;
use std::time::Duration;

use loader_api::{BoxFuture, BulkItemStatus, Event, IndexStore, Metrics, Stage};

use crate::PipelineError;
use crate::availability::{AvailabilityPolicy, wait_available};
use crate::timer::ScopedTimer;

/// Пауза между попытками bulk записи.
pub const BULK_RETRY_BACKOFF: Duration = Duration::from_secs(2);

// ═══════════════════════════════════════════════════════════════
//  Write outcome
// ═══════════════════════════════════════════════════════════════

/// Что делать с документами, оставшимися после исчерпания попыток.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResidualPolicy {
    /// Залогировать и вернуть `Ok`: batch считается записанным.
    #[default]
    Accept,
    /// Вернуть `PipelineError::ResidualWrite`: offset'ы не коммитятся.
    Fail,
}

/// Итог bulk записи одного batch'а.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    pub submitted: usize,
    pub indexed: usize,
    /// Number of store calls made.
    pub attempts: u32,
    /// Documents still unindexed when the retry budget ran out.
    pub dropped: Vec<Event>,
}

impl WriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Запись batch'а событий. Seam между orchestrator'ом и sink client'ом.
pub trait BatchWriter: Send + Sync {
    fn write_batch(&self, events: Vec<Event>) -> BoxFuture<'_, Result<WriteOutcome, PipelineError>>;
}

// ═══════════════════════════════════════════════════════════════
//  Sink client
// ═══════════════════════════════════════════════════════════════

/// Клиент index store: проверка доступности и bulk запись с повторами
/// для частично упавших документов.
///
/// `bulk_insert` нельзя вызывать конкурентно на одном экземпляре.
pub struct SinkClient {
    store: Arc<dyn IndexStore>,
    index: String,
    max_attempts: u32,
    backoff: Duration,
    residual: ResidualPolicy,
    availability: AvailabilityPolicy,
    metrics: Arc<dyn Metrics>,
}

impl SinkClient {
    pub fn new(
        store: Arc<dyn IndexStore>,
        index: impl Into<String>,
        max_attempts: u32,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        Self {
            store,
            index: index.into(),
            max_attempts,
            backoff: BULK_RETRY_BACKOFF,
            residual: ResidualPolicy::default(),
            availability: AvailabilityPolicy::default(),
            metrics,
        }
    }

    pub fn with_residual_policy(mut self, residual: ResidualPolicy) -> Self {
        self.residual = residual;
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Ping the store until it answers, 10 attempts 3 s apart.
    pub async fn connect(&self) -> Result<(), PipelineError> {
        let store = &self.store;
        wait_available("Elasticsearch", self.availability, move || async move {
            if store.ping().await { Ok(()) } else { Err("ping failed") }
        })
        .await
    }

    /// Записать события bulk'ом. Повторяются только упавшие документы,
    /// множество pending никогда не растёт. Не больше `max_attempts` вызовов store.
    pub async fn bulk_insert(&self, events: Vec<Event>) -> Result<WriteOutcome, PipelineError> {
        if events.is_empty() {
            return Ok(WriteOutcome::default());
        }

        let submitted = events.len();
        let mut pending = events;
        let mut indexed = 0;
        let mut attempts = 0;

        while attempts < self.max_attempts && !pending.is_empty() {
            let result = {
                let _timer = ScopedTimer::start(&*self.metrics, Stage::SinkWrite);
                self.store.bulk(&self.index, &pending).await
            };
            attempts += 1;

            match result {
                Ok(statuses) => {
                    let (ok, failed) = split_failed(pending, &statuses);
                    indexed += ok;
                    if failed.is_empty() {
                        tracing::info!(index = %self.index, indexed, attempts, "successfully inserted {indexed} documents");
                        return Ok(WriteOutcome { submitted, indexed, attempts, dropped: Vec::new() });
                    }
                    tracing::warn!(index = %self.index, failed = failed.len(), attempt = attempts, "{} documents failed, retrying", failed.len());
                    pending = failed;
                }
                Err(e) => {
                    self.metrics.inc_errors();
                    tracing::error!(index = %self.index, attempt = attempts, error = %e, "bulk insert failed on attempt {attempts}");
                }
            }

            if attempts < self.max_attempts {
                tokio::time::sleep(self.backoff).await;
            }
        }

        tracing::error!(
            index = %self.index,
            dropped = pending.len(),
            max_attempts = self.max_attempts,
            "could not insert {} documents after {} attempts",
            pending.len(),
            self.max_attempts,
        );
        for doc in &pending {
            let body = serde_json::to_string(doc).unwrap_or_default();
            tracing::error!(index = %self.index, document = %body, "failed document");
        }
        self.metrics.inc_dropped(pending.len() as u64);

        match self.residual {
            ResidualPolicy::Accept => Ok(WriteOutcome { submitted, indexed, attempts, dropped: pending }),
            ResidualPolicy::Fail => Err(PipelineError::ResidualWrite { dropped: pending.len() }),
        }
    }
}

impl BatchWriter for SinkClient {
    fn write_batch(&self, events: Vec<Event>) -> BoxFuture<'_, Result<WriteOutcome, PipelineError>> {
        Box::pin(self.bulk_insert(events))
    }
}

/// Разделить pending по статусам: статус i относится к документу i.
/// Документ без статуса считается упавшим.
fn split_failed(pending: Vec<Event>, statuses: &[BulkItemStatus]) -> (usize, Vec<Event>) {
    let mut indexed = 0;
    let mut failed = Vec::new();
    for (i, doc) in pending.into_iter().enumerate() {
        match statuses.get(i) {
            Some(status) if status.is_indexed() => indexed += 1,
            _ => failed.push(doc),
        }
    }
    (indexed, failed)
}
