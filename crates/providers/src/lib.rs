//! Provider abstractions for the camera and the face-embedding model.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod fixture;
pub mod models;
pub mod noop;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    User,
    Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraRequest {
    pub facing_mode: FacingMode,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::User,
            width: 640,
            height: 480,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

/// A live capture. Implementations stop their tracks when `stop` is called
/// and again on drop.
#[async_trait::async_trait]
pub trait CameraStream: Send {
    async fn next_frame(&mut self) -> Result<Frame, ProviderError>;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

#[async_trait::async_trait]
pub trait Camera: Send + Sync {
    async fn open(&self, request: &CameraRequest) -> Result<Box<dyn CameraStream>, ProviderError>;
}

#[async_trait::async_trait]
pub trait FaceExtractor: Send + Sync {
    /// Loads detection, landmark and recognition models.
    async fn load_models(&self) -> Result<(), ProviderError>;

    /// Returns the descriptor of the single detected face, if any.
    async fn detect(&self, frame: &Frame) -> Result<Option<Vec<f32>>, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    cameras: HashMap<String, Arc<dyn Camera>>,
    extractors: HashMap<String, Arc<dyn FaceExtractor>>,
    pub preferred_camera: Option<String>,
    pub preferred_extractor: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera(mut self, name: &str, provider: Arc<dyn Camera>) -> Self {
        self.cameras.insert(name.to_string(), provider);
        self
    }

    pub fn with_extractor(mut self, name: &str, provider: Arc<dyn FaceExtractor>) -> Self {
        self.extractors.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_camera(mut self, name: &str) -> Self {
        self.preferred_camera = Some(name.to_string());
        self
    }

    pub fn set_preferred_extractor(mut self, name: &str) -> Self {
        self.preferred_extractor = Some(name.to_string());
        self
    }

    pub fn camera(&self, name: Option<&str>) -> Result<Arc<dyn Camera>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_camera.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no camera configured".into()))?;
        self.cameras
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }

    pub fn extractor(&self, name: Option<&str>) -> Result<Arc<dyn FaceExtractor>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_extractor.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no face extractor configured".into())
            })?;
        self.extractors
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }
}
