use loader_api::ConnectorError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("could not connect to {service} after {attempts} attempts")]
    Unavailable { service: &'static str, attempts: u32 },

    #[error("broker: {0}")]
    Broker(ConnectorError),

    #[error("sink: {0}")]
    Sink(ConnectorError),

    #[error("could not insert {dropped} documents")]
    ResidualWrite { dropped: usize },

    #[error("cancelled")]
    Cancelled,
}
