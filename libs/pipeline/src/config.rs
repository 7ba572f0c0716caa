use std::time::Duration;

use serde::Deserialize;

use crate::sink::ResidualPolicy;

// ═══════════════════════════════════════════════════════════════
//  Loader Config (config.toml)
// ═══════════════════════════════════════════════════════════════

/// Полная конфигурация загрузчика. Каждая секция необязательна,
/// отсутствующие поля берутся из defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub application: ApplicationSettings,
    pub kafka: KafkaSettings,
    pub elastic: ElasticSettings,
    pub prometheus: PrometheusSettings,
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.kafka.validate()?;
        self.elastic.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Имя пода, попадает в логи при старте.
    pub pod_name: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self { pod_name: "streaming-data-loader".into() }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Kafka
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaSettings {
    pub bootstrap_servers: String,
    /// Один topic или список через запятую.
    pub consumer_topics: String,
    pub consumer_group: String,
    /// Максимум записей за один poll.
    pub batch_size: usize,
    /// Максимальное ожидание poll'а в мс.
    pub timeout_ms: u64,
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            bootstrap_servers: "kafka-cluster:9092".into(),
            consumer_topics: "topic_name".into(),
            consumer_group: "consumer_group_name".into(),
            batch_size: 100,
            timeout_ms: 5000,
        }
    }
}

impl KafkaSettings {
    /// Topics from the comma-separated list, trimmed, empties dropped.
    pub fn topics(&self) -> Vec<String> {
        self.consumer_topics
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn poll(&self) -> PollSettings {
        PollSettings {
            max_wait: Duration::from_millis(self.timeout_ms),
            max_records: self.batch_size,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.bootstrap_servers.trim().is_empty() {
            return Err("kafka: bootstrap_servers is empty".into());
        }
        if self.topics().is_empty() {
            return Err("kafka: consumer_topics has no topic names".into());
        }
        if self.consumer_group.trim().is_empty() {
            return Err("kafka: consumer_group is empty".into());
        }
        if self.batch_size == 0 {
            return Err("kafka: batch_size must be at least 1".into());
        }
        Ok(())
    }
}

/// Границы одного poll'а: staleness (max_wait) и backpressure (max_records).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_wait: Duration,
    pub max_records: usize,
}

// ═══════════════════════════════════════════════════════════════
//  Elasticsearch
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ElasticSettings {
    pub url: String,
    pub index: String,
    /// Максимум попыток bulk записи.
    pub retry: u32,
    /// Документы, не записанные за `retry` попыток, валят batch
    /// (offset'ы не коммитятся). По умолчанию выключено.
    pub strict: bool,
}

impl Default for ElasticSettings {
    fn default() -> Self {
        Self {
            url: "http://elasticsearch:9200".into(),
            index: "index_name".into(),
            retry: 3,
            strict: false,
        }
    }
}

impl ElasticSettings {
    pub fn residual_policy(&self) -> ResidualPolicy {
        if self.strict { ResidualPolicy::Fail } else { ResidualPolicy::Accept }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("elastic: url is empty".into());
        }
        if self.index.trim().is_empty() {
            return Err("elastic: index is empty".into());
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Prometheus
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrometheusSettings {
    pub port: u16,
}

impl Default for PrometheusSettings {
    fn default() -> Self {
        Self { port: 9090 }
    }
}
