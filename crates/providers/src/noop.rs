use crate::{Camera, CameraRequest, CameraStream, FaceExtractor, Frame, ProviderError};

/// Placeholder used when no device or model is wired in.
#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl Camera for NoopProvider {
    async fn open(&self, _request: &CameraRequest) -> Result<Box<dyn CameraStream>, ProviderError> {
        Err(ProviderError::CameraUnavailable(
            "no camera device configured".into(),
        ))
    }
}

#[async_trait::async_trait]
impl FaceExtractor for NoopProvider {
    async fn load_models(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn detect(&self, _frame: &Frame) -> Result<Option<Vec<f32>>, ProviderError> {
        Ok(None)
    }
}
