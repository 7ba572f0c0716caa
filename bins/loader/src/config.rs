use clap::{Parser, ValueEnum};

use pipeline::config::LoaderConfig;

use crate::error::LoaderError;

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Parser, Clone, Debug)]
#[command(name = "streaming-loader", about = "Потоковая загрузка событий из Kafka в Elasticsearch")]
pub struct Cli {
    /// Путь к config.toml (отсутствующий файл не ошибка)
    #[arg(long, default_value = "config.toml", env = "LOADER_CONFIG")]
    pub config: String,

    /// Формат логов
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Имя пода для стартового лога
    #[arg(long, env = "POD_NAME")]
    pub pod_name: Option<String>,

    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS")]
    pub kafka_bootstrap_servers: Option<String>,

    /// Topic или список через запятую
    #[arg(long, env = "KAFKA_CONSUMER_TOPICS")]
    pub kafka_consumer_topics: Option<String>,

    #[arg(long, env = "KAFKA_CONSUMER_GROUP")]
    pub kafka_consumer_group: Option<String>,

    /// Максимум записей за poll
    #[arg(long, env = "KAFKA_BATCH_SIZE")]
    pub kafka_batch_size: Option<usize>,

    /// Ожидание poll'а, мс
    #[arg(long, env = "KAFKA_TIMEOUT_MS")]
    pub kafka_timeout_ms: Option<u64>,

    #[arg(long, env = "ELASTIC_URL")]
    pub elastic_url: Option<String>,

    #[arg(long, env = "ELASTIC_INDEX")]
    pub elastic_index: Option<String>,

    /// Максимум попыток bulk записи
    #[arg(long, env = "ELASTIC_RETRY")]
    pub elastic_retry: Option<u32>,

    /// Не коммитить batch, если часть документов так и не записалась
    #[arg(long, env = "ELASTIC_STRICT")]
    pub elastic_strict: Option<bool>,

    #[arg(long, env = "PROMETHEUS_PORT")]
    pub prometheus_port: Option<u16>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

pub fn load_config(path: &str) -> Result<LoaderConfig, LoaderError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LoaderError::Config { context: "read", detail: format!("'{path}': {e}") })?;
    toml::from_str(&content)
        .map_err(|e| LoaderError::Config { context: "parse", detail: format!("'{path}': {e}") })
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация: config.toml < env/CLI, затем validate.
pub fn effective(cli: &Cli) -> Result<LoaderConfig, LoaderError> {
    let file = match load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            if std::path::Path::new(&cli.config).exists() {
                return Err(e);
            }
            LoaderConfig::default()
        }
    };

    let cfg = merge(cli, file);
    cfg.validate()
        .map_err(|detail| LoaderError::Config { context: "validate", detail })?;
    Ok(cfg)
}

fn merge(cli: &Cli, mut cfg: LoaderConfig) -> LoaderConfig {
    let app = &mut cfg.application;
    app.pod_name = pick(&cli.pod_name, &app.pod_name);

    let kafka = &mut cfg.kafka;
    kafka.bootstrap_servers = pick(&cli.kafka_bootstrap_servers, &kafka.bootstrap_servers);
    kafka.consumer_topics = pick(&cli.kafka_consumer_topics, &kafka.consumer_topics);
    kafka.consumer_group = pick(&cli.kafka_consumer_group, &kafka.consumer_group);
    kafka.batch_size = cli.kafka_batch_size.unwrap_or(kafka.batch_size);
    kafka.timeout_ms = cli.kafka_timeout_ms.unwrap_or(kafka.timeout_ms);

    let elastic = &mut cfg.elastic;
    elastic.url = pick(&cli.elastic_url, &elastic.url);
    elastic.index = pick(&cli.elastic_index, &elastic.index);
    elastic.retry = cli.elastic_retry.unwrap_or(elastic.retry);
    elastic.strict = cli.elastic_strict.unwrap_or(elastic.strict);

    cfg.prometheus.port = cli.prometheus_port.unwrap_or(cfg.prometheus.port);
    cfg
}

fn pick(arg: &Option<String>, current: &str) -> String {
    arg.as_deref().unwrap_or(current).trim().to_string()
}
