#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("bind metrics :{port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    #[error("serve: {0}")]
    Serve(std::io::Error),
}
