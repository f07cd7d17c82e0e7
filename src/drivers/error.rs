use thiserror::Error;

/// Failures of a voltage source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid device uid '{0}'")]
    InvalidUid(String),
    #[error("device i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected device response: {0}")]
    Protocol(String),
    #[error("device reported error code {0}")]
    Device(u8),
    #[error("source is not connected")]
    Disconnected,
    #[error("source has no more samples")]
    Exhausted,
}

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("failed to render plot: {0}")]
    Render(String),
    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for PlotError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        PlotError::Render(format!("{value:?}"))
    }
}

impl From<image::ImageError> for PlotError {
    fn from(value: image::ImageError) -> Self {
        PlotError::Render(value.to_string())
    }
}
