#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Connector(#[from] loader_api::ConnectorError),

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("metrics: {0}")]
    Metrics(#[from] metrics_server::MetricsError),
}
