use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
}
