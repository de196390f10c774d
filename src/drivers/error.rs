use thiserror::Error;
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("failed to open link: {0}")]
    Open(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("window is empty; nothing to render yet")]
    EmptyWindow,
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl From<serde_json::Error> for TelemetryError {
    fn from(value: serde_json::Error) -> Self {
        TelemetryError::MalformedPayload(value.to_string())
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for TelemetryError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        TelemetryError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for TelemetryError {
    fn from(value: image::ImageError) -> Self {
        TelemetryError::Plot(value.to_string())
    }
}
