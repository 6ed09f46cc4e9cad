//! Replays a scripted sequence of frames.
//!
//! Each entry is the descriptor the "model" will report for that frame, or
//! `None` for a frame without a detectable face. Frames past the end of the
//! script have no face.

use crate::{Camera, CameraRequest, CameraStream, FaceExtractor, Frame, ProviderError};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    frames: Arc<Vec<Option<Vec<f32>>>>,
    camera_error: Option<String>,
    model_error: Option<String>,
    active_streams: Arc<AtomicUsize>,
}

impl FixtureProvider {
    pub fn new(frames: Vec<Option<Vec<f32>>>) -> Self {
        Self {
            frames: Arc::new(frames),
            ..Self::default()
        }
    }

    pub fn with_camera_error(mut self, msg: &str) -> Self {
        self.camera_error = Some(msg.to_string());
        self
    }

    pub fn with_model_error(mut self, msg: &str) -> Self {
        self.model_error = Some(msg.to_string());
        self
    }

    /// Streams opened and not yet stopped.
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }
}

struct FixtureStream {
    request: CameraRequest,
    next: u64,
    active: bool,
    counter: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl CameraStream for FixtureStream {
    async fn next_frame(&mut self) -> Result<Frame, ProviderError> {
        if !self.active {
            return Err(ProviderError::CameraUnavailable("stream stopped".into()));
        }
        let frame = Frame {
            sequence: self.next,
            width: self.request.width,
            height: self.request.height,
            data: Bytes::new(),
        };
        self.next += 1;
        Ok(frame)
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.counter.fetch_sub(1, Ordering::SeqCst);
            debug!("fixture camera stopped after {} frames", self.next);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for FixtureStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait::async_trait]
impl Camera for FixtureProvider {
    async fn open(&self, request: &CameraRequest) -> Result<Box<dyn CameraStream>, ProviderError> {
        if let Some(msg) = &self.camera_error {
            return Err(ProviderError::CameraUnavailable(msg.clone()));
        }
        self.active_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixtureStream {
            request: request.clone(),
            next: 0,
            active: true,
            counter: self.active_streams.clone(),
        }))
    }
}

#[async_trait::async_trait]
impl FaceExtractor for FixtureProvider {
    async fn load_models(&self) -> Result<(), ProviderError> {
        match &self.model_error {
            Some(msg) => Err(ProviderError::ModelLoad(msg.clone())),
            None => Ok(()),
        }
    }

    async fn detect(&self, frame: &Frame) -> Result<Option<Vec<f32>>, ProviderError> {
        Ok(self
            .frames
            .get(frame.sequence as usize)
            .cloned()
            .flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_and_tracks_streams() {
        let fixture = FixtureProvider::new(vec![None, Some(vec![1.0, 2.0])]);
        let mut stream = fixture.open(&CameraRequest::default()).await.unwrap();
        assert_eq!(fixture.active_streams(), 1);

        let first = stream.next_frame().await.unwrap();
        assert_eq!(first.width, 640);
        assert_eq!(fixture.detect(&first).await.unwrap(), None);
        let second = stream.next_frame().await.unwrap();
        assert_eq!(fixture.detect(&second).await.unwrap(), Some(vec![1.0, 2.0]));
        let third = stream.next_frame().await.unwrap();
        assert_eq!(fixture.detect(&third).await.unwrap(), None);

        drop(stream);
        assert_eq!(fixture.active_streams(), 0);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let fixture = FixtureProvider::new(vec![]);
        let mut stream = fixture.open(&CameraRequest::default()).await.unwrap();
        stream.stop();
        stream.stop();
        assert!(!stream.is_active());
        assert!(stream.next_frame().await.is_err());
        drop(stream);
        assert_eq!(fixture.active_streams(), 0);
    }

    #[tokio::test]
    async fn scripted_failures() {
        let fixture = FixtureProvider::new(vec![])
            .with_camera_error("permission denied")
            .with_model_error("404");
        assert!(matches!(
            fixture.open(&CameraRequest::default()).await,
            Err(ProviderError::CameraUnavailable(_))
        ));
        assert!(matches!(
            fixture.load_models().await,
            Err(ProviderError::ModelLoad(_))
        ));
    }
}
