use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use loader_api::{IndexStore, Metrics};
use metrics_server::PrometheusMetrics;
use pipeline::{PipelineError, SinkClient, SourceConsumer};
use source_kafka::KafkaConnector;
use storage_elasticsearch::ElasticsearchStore;

use crate::config::{Cli, effective};
use crate::error::LoaderError;

pub async fn run(cli: &Cli) -> Result<(), LoaderError> {
    let config = effective(cli)?;
    tracing::info!(pod = %config.application.pod_name, config = %cli.config, "streaming loader starting");

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Metrics ---
    let prometheus = Arc::new(PrometheusMetrics::new()?);
    let metrics: Arc<dyn Metrics> = prometheus.clone();
    let metrics_task = {
        let port = config.prometheus.port;
        let token = token.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics_server::run(port, prometheus, token).await {
                tracing::error!(error = %e, "metrics server failed");
            }
        })
    };

    // --- Elasticsearch sink ---
    let store: Arc<dyn IndexStore> = Arc::new(ElasticsearchStore::new(&config.elastic.url)?);
    let sink = Arc::new(
        SinkClient::new(store, &config.elastic.index, config.elastic.retry, metrics.clone())
            .with_residual_policy(config.elastic.residual_policy()),
    );

    // --- Kafka source ---
    let connector = Arc::new(KafkaConnector::new(
        &config.kafka.bootstrap_servers,
        config.kafka.topics(),
        &config.kafka.consumer_group,
    ));
    let source = SourceConsumer::new(connector, sink.clone(), metrics, config.kafka.poll());

    // --- Ctrl+C ---
    let signal_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received Ctrl+C, shutting down"),
            Err(e) => tracing::error!(error = %e, "signal handler failed, shutting down"),
        }
        signal_token.cancel();
    });

    // --- Startup checks, then the poll loop ---
    let checks = async {
        source.connect().await?;
        sink.connect().await
    };
    let checked = tokio::select! {
        res = checks => res,
        _ = token.cancelled() => Err(PipelineError::Cancelled),
    };

    let result = match checked {
        Ok(()) => {
            tracing::info!(
                topics = %config.kafka.consumer_topics,
                index = %sink.index(),
                "streaming loader started"
            );
            source.start(token.clone()).await
        }
        Err(e) => Err(e),
    };

    token.cancel();
    join_metrics(metrics_task).await;

    match result {
        Ok(()) | Err(PipelineError::Cancelled) => {
            tracing::info!("shutdown complete");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn join_metrics(task: JoinHandle<()>) {
    if let Err(e) = task.await {
        tracing::warn!(error = %e, "metrics server task failed");
    }
}
