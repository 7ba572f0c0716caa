use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use tokio::time::Instant;

use loader_api::{
    BoxFuture, BrokerConnector, BrokerConsumer, ConnectorError, RawRecord, RecordValue, Watermarks,
};

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka connector на librdkafka.
///
/// `check` поднимает одноразовый клиент без consumer group и запрашивает
/// metadata. `open` создаёт consumer в группе с выключенным auto-commit:
/// offset'ы фиксирует только вызывающий через `commit`.
pub struct KafkaConnector {
    bootstrap_servers: String,
    topics: Vec<String>,
    group: String,
}

impl KafkaConnector {
    pub fn new(bootstrap_servers: impl Into<String>, topics: Vec<String>, group: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            topics,
            group: group.into(),
        }
    }

    fn base_config(&self) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", &self.bootstrap_servers);
        cfg
    }

    fn consumer_config(&self) -> ClientConfig {
        let mut cfg = self.base_config();
        cfg.set("group.id", &self.group)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "latest");
        cfg
    }
}

impl BrokerConnector for KafkaConnector {
    fn check(&self) -> BoxFuture<'_, Result<(), ConnectorError>> {
        let cfg = self.base_config();
        Box::pin(async move {
            // fetch_metadata блокирующий
            tokio::task::spawn_blocking(move || -> Result<(), ConnectorError> {
                let consumer: BaseConsumer = cfg.create().map_err(kafka_err)?;
                consumer.fetch_metadata(None, METADATA_TIMEOUT).map_err(kafka_err)?;
                Ok(())
            })
            .await
            .map_err(|e| ConnectorError::io(format!("metadata task: {e}")))?
        })
    }

    fn open(&self) -> BoxFuture<'_, Result<Box<dyn BrokerConsumer>, ConnectorError>> {
        Box::pin(async move {
            let consumer: StreamConsumer = self
                .consumer_config()
                .create()
                .map_err(|e| ConnectorError::config(format!("kafka consumer: {e}")))?;

            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();
            consumer.subscribe(&topics).map_err(kafka_err)?;

            tracing::info!(
                topics = ?self.topics,
                group = %self.group,
                "kafka consumer subscribed"
            );

            Ok(Box::new(KafkaConsumer { inner: Arc::new(consumer) }) as Box<dyn BrokerConsumer>)
        })
    }
}

// ════════════════════════════════════════════════════════════════
//  Consumer
// ════════════════════════════════════════════════════════════════

struct KafkaConsumer {
    inner: Arc<StreamConsumer>,
}

impl BrokerConsumer for KafkaConsumer {
    fn poll_batch(
        &mut self,
        max_wait: Duration,
        max_records: usize,
    ) -> BoxFuture<'_, Result<Vec<RawRecord>, ConnectorError>> {
        Box::pin(async move {
            let deadline = Instant::now() + max_wait;
            let mut records = Vec::new();
            while records.len() < max_records {
                match tokio::time::timeout_at(deadline, self.inner.recv()).await {
                    Ok(Ok(msg)) => records.push(to_record(&msg)),
                    Ok(Err(e)) => {
                        let err = kafka_err(e);
                        if !err.is_transient() || records.is_empty() {
                            return Err(err);
                        }
                        // отдать уже прочитанное, сбой только в лог
                        tracing::warn!(error = %err, collected = records.len(), "kafka poll interrupted");
                        break;
                    }
                    Err(_) => break,
                }
            }
            Ok(records)
        })
    }

    fn commit<'a>(&'a mut self, offsets: &'a Watermarks) -> BoxFuture<'a, Result<(), ConnectorError>> {
        Box::pin(async move {
            if offsets.is_empty() {
                return Ok(());
            }
            let list = commit_list(offsets)?;
            let consumer = Arc::clone(&self.inner);
            tokio::task::spawn_blocking(move || consumer.commit(&list, CommitMode::Sync))
                .await
                .map_err(|e| ConnectorError::io(format!("commit task: {e}")))?
                .map_err(kafka_err)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), ConnectorError>> {
        Box::pin(async move {
            self.inner.unsubscribe();
            tracing::debug!("kafka consumer unsubscribed");
            Ok(())
        })
    }
}

fn to_record(msg: &BorrowedMessage<'_>) -> RawRecord {
    RawRecord {
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(<[u8]>::to_vec),
        value: RecordValue::decode(msg.payload().unwrap_or_default()),
    }
}

/// Watermark'и → список для commit: offset = следующий к чтению.
pub fn commit_list(offsets: &Watermarks) -> Result<TopicPartitionList, ConnectorError> {
    let mut list = TopicPartitionList::with_capacity(offsets.len());
    for (tp, next) in offsets {
        list.add_partition_offset(&tp.topic, tp.partition, Offset::Offset(*next))
            .map_err(kafka_err)?;
    }
    Ok(list)
}

/// librdkafka сообщает о недоступном topic'е или брокере через `recv()`;
/// такие ошибки временные. Fatal-ошибки consumer'а и ошибки настройки не временные.
fn kafka_err(e: KafkaError) -> ConnectorError {
    let msg = format!("kafka: {e}");
    match e {
        KafkaError::MessageConsumptionFatal(_) => ConnectorError::fatal(msg),
        KafkaError::ClientConfig(..) | KafkaError::ClientCreation(_) | KafkaError::Subscription(_) => {
            ConnectorError::config(msg)
        }
        _ => ConnectorError::io(msg),
    }
}
