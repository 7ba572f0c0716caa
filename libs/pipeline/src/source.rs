use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use loader_api::{BrokerConnector, BrokerConsumer, Metrics, RawRecord, Stage};

use crate::PipelineError;
use crate::batch::Batch;
use crate::config::PollSettings;
use crate::orchestrator::process_events;
use crate::availability::{AvailabilityPolicy, wait_available};
use crate::sink::BatchWriter;
use crate::timer::ScopedTimer;

/// Пауза после временной ошибки poll'а.
pub const POLL_RETRY_BACKOFF: Duration = Duration::from_secs(1);

// ═══════════════════════════════════════════════════════════════
//  Source consumer: poll → transform → write → commit
// ═══════════════════════════════════════════════════════════════

/// Читает batch'и из брокера и коммитит offset'ы только после того,
/// как batch прошёл через writer без ошибки.
///
/// В полёте не больше одного batch'а: следующий poll начинается только
/// после решения commit/abort по предыдущему.
pub struct SourceConsumer {
    connector: Arc<dyn BrokerConnector>,
    writer: Arc<dyn BatchWriter>,
    metrics: Arc<dyn Metrics>,
    poll: PollSettings,
    availability: AvailabilityPolicy,
}

impl SourceConsumer {
    pub fn new(
        connector: Arc<dyn BrokerConnector>,
        writer: Arc<dyn BatchWriter>,
        metrics: Arc<dyn Metrics>,
        poll: PollSettings,
    ) -> Self {
        Self {
            connector,
            writer,
            metrics,
            poll,
            availability: AvailabilityPolicy::default(),
        }
    }

    /// Проверить доступность брокера одноразовыми соединениями,
    /// 10 попыток через 3 секунды.
    pub async fn connect(&self) -> Result<(), PipelineError> {
        let connector = &self.connector;
        wait_available("Kafka", self.availability, move || async move { connector.check().await }).await
    }

    /// Открыть steady-state consumer и крутить poll loop до ошибки или отмены.
    ///
    /// Consumer закрывается на любом пути выхода. Отмена через `token`
    /// возвращает `PipelineError::Cancelled`.
    pub async fn start(&self, token: CancellationToken) -> Result<(), PipelineError> {
        let mut consumer = self.connector.open().await.map_err(PipelineError::Broker)?;
        tracing::info!(
            max_wait_ms = self.poll.max_wait.as_millis() as u64,
            max_records = self.poll.max_records,
            "consumer started"
        );

        let result = tokio::select! {
            res = self.run(consumer.as_mut()) => res,
            _ = token.cancelled() => Err(PipelineError::Cancelled),
        };

        if let Err(e) = consumer.close().await {
            tracing::warn!(error = %e, "consumer close error");
        }
        tracing::info!("consumer stopped");
        result
    }

    async fn run(&self, consumer: &mut dyn BrokerConsumer) -> Result<(), PipelineError> {
        loop {
            self.poll_once(consumer).await?;
        }
    }

    /// Один цикл. Возвращает число записанных и закоммиченных событий.
    async fn poll_once(&self, consumer: &mut dyn BrokerConsumer) -> Result<usize, PipelineError> {
        let polled = {
            let _timer = ScopedTimer::start(&*self.metrics, Stage::Consume);
            consumer.poll_batch(self.poll.max_wait, self.poll.max_records).await
        };
        let records = match polled {
            Ok(records) => records,
            Err(e) if e.is_transient() => {
                self.metrics.inc_errors();
                tracing::warn!(error = %e, "poll failed, retrying");
                tokio::time::sleep(POLL_RETRY_BACKOFF).await;
                return Ok(0);
            }
            Err(e) => return Err(PipelineError::Broker(e)),
        };
        if records.is_empty() {
            return Ok(0);
        }

        let batch = {
            let _timer = ScopedTimer::start(&*self.metrics, Stage::Transform);
            self.collect(records)
        };
        if batch.is_empty() {
            return Ok(0);
        }

        let (events, watermarks) = batch.into_parts();
        let count = events.len();
        process_events(&*self.writer, events, &*self.metrics).await?;

        consumer.commit(&watermarks).await.map_err(PipelineError::Broker)?;
        tracing::debug!(events = count, partitions = watermarks.len(), "offsets committed");
        Ok(count)
    }

    fn collect(&self, records: Vec<RawRecord>) -> Batch {
        let mut batch = Batch::new();
        for record in records {
            if let Err(rejected) = batch.push(record) {
                self.metrics.inc_errors();
                tracing::error!(
                    topic = %rejected.topic,
                    partition = rejected.partition,
                    offset = rejected.offset,
                    value = %rejected.value,
                    "invalid message format"
                );
            }
        }
        batch
    }
}
