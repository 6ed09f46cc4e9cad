//! Scan screen: model loading, camera capture, detection polling, matching.

use crate::config::ScannerConfig;
use crate::matcher::{FaceMatcher, MatchError, MatchOutcome};
use crate::router::is_valid_token;
use crate::token::MonotonicClock;
use chrono::{Local, Utc};
use providers::{Camera, CameraRequest, CameraStream, FaceExtractor, Frame, ProviderError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use storage::directory::StudentDirectory;
use storage::models::AttendanceRecord;
use storage::{AttendanceStore, StorageError};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan code is invalid or expired")]
    InvalidToken,
    #[error("could not load face recognition models: {0}")]
    ModelLoad(String),
    #[error("could not access the camera: {0}")]
    CameraAccess(String),
    #[error("face detection failed: {0}")]
    Detection(String),
    #[error("no face detected within {0:?}")]
    DetectionTimeout(Duration),
    #[error("scan cancelled")]
    Cancelled,
    #[error("scan already finished")]
    Finished,
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    InvalidToken,
    ModelsLoading,
    LoadError { message: String },
    ReadyToScan,
    CameraActive,
    CameraError { message: String },
    Matched { student_id: String, fallback: bool },
    Unmatched,
    TimedOut,
    Cancelled,
    Failed { message: String },
}

impl ScanState {
    /// A matched or unmatched face ends the screen; only a new scanner
    /// starts over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Matched { .. } | ScanState::Unmatched)
    }

    fn from_error(err: &ScanError) -> Self {
        match err {
            ScanError::InvalidToken => ScanState::InvalidToken,
            ScanError::ModelLoad(msg) => ScanState::LoadError {
                message: msg.clone(),
            },
            ScanError::CameraAccess(msg) => ScanState::CameraError {
                message: msg.clone(),
            },
            ScanError::DetectionTimeout(_) => ScanState::TimedOut,
            ScanError::Cancelled => ScanState::Cancelled,
            ScanError::Match(_) => ScanState::Unmatched,
            ScanError::Detection(_) | ScanError::Storage(_) | ScanError::Finished => {
                ScanState::Failed {
                    message: err.to_string(),
                }
            }
        }
    }
}

/// Cooperative cancellation for a running scan.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    /// A token nobody can cancel.
    pub fn never() -> Self {
        cancel_pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
    pub camera: CameraRequest,
}

impl From<&ScannerConfig> for ScanSettings {
    fn from(cfg: &ScannerConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(cfg.poll_interval_ms.max(1)),
            timeout: cfg
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            camera: CameraRequest {
                facing_mode: cfg.facing_mode,
                width: cfg.width,
                height: cfg.height,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub record: AttendanceRecord,
    pub outcome: MatchOutcome,
}

impl ScanResult {
    pub fn message(&self) -> String {
        format!(
            "Attendance recorded for {} at {}",
            self.record.student_name,
            self.record
                .timestamp
                .with_timezone(&Local)
                .format("%H:%M:%S")
        )
    }
}

/// Stops the camera on every exit path.
struct LiveStream(Box<dyn CameraStream>);

impl LiveStream {
    async fn next_frame(&mut self) -> Result<Frame, ProviderError> {
        self.0.next_frame().await
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        if self.0.is_active() {
            self.0.stop();
            debug!("camera stream released");
        }
    }
}

pub struct Scanner {
    extractor: Arc<dyn FaceExtractor>,
    camera: Arc<dyn Camera>,
    matcher: FaceMatcher,
    directory: Arc<StudentDirectory>,
    store: Arc<dyn AttendanceStore>,
    clock: Arc<MonotonicClock>,
    settings: ScanSettings,
    state: ScanState,
}

impl Scanner {
    pub fn new(
        extractor: Arc<dyn FaceExtractor>,
        camera: Arc<dyn Camera>,
        matcher: FaceMatcher,
        directory: Arc<StudentDirectory>,
        store: Arc<dyn AttendanceStore>,
        clock: Arc<MonotonicClock>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            extractor,
            camera,
            matcher,
            directory,
            store,
            clock,
            settings,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Validates the token and loads models; leaves the screen ready to scan.
    pub async fn prepare(&mut self, token: &str) -> Result<(), ScanError> {
        if self.state.is_terminal() {
            return Err(ScanError::Finished);
        }
        let res = self.load(token).await;
        if let Err(e) = &res {
            self.state = ScanState::from_error(e);
        }
        res
    }

    /// Opens the camera, polls for a face, matches and records attendance.
    pub async fn capture(&mut self, cancel: &CancelToken) -> Result<ScanResult, ScanError> {
        if self.state.is_terminal() {
            return Err(ScanError::Finished);
        }
        let res = self.detect_and_record(cancel).await;
        match &res {
            Ok(r) => {
                self.state = ScanState::Matched {
                    student_id: r.record.student_id.clone(),
                    fallback: r.outcome.fallback,
                }
            }
            Err(e) => self.state = ScanState::from_error(e),
        }
        res
    }

    pub async fn run(&mut self, token: &str, cancel: &CancelToken) -> Result<ScanResult, ScanError> {
        self.prepare(token).await?;
        self.capture(cancel).await
    }

    async fn load(&mut self, token: &str) -> Result<(), ScanError> {
        if !is_valid_token(token) {
            warn!(token, "scan opened with invalid token");
            return Err(ScanError::InvalidToken);
        }
        self.state = ScanState::ModelsLoading;
        self.extractor
            .load_models()
            .await
            .map_err(|e| ScanError::ModelLoad(e.to_string()))?;
        info!("Face models loaded.");
        self.state = ScanState::ReadyToScan;
        Ok(())
    }

    async fn detect_and_record(&mut self, cancel: &CancelToken) -> Result<ScanResult, ScanError> {
        if self.state != ScanState::ReadyToScan {
            return Err(ScanError::ModelLoad("models not loaded".into()));
        }
        let stream = self
            .camera
            .open(&self.settings.camera)
            .await
            .map_err(|e| ScanError::CameraAccess(e.to_string()))?;
        let mut stream = LiveStream(stream);
        self.state = ScanState::CameraActive;
        info!(
            "Camera active at {}x{}",
            self.settings.camera.width, self.settings.camera.height
        );

        let descriptor = self.poll_for_face(&mut stream, cancel).await?;
        drop(stream);

        let outcome = self
            .matcher
            .match_descriptor(&descriptor, &self.directory)?;
        let record = AttendanceRecord::for_student(
            self.clock.next_id(),
            &outcome.student,
            Utc::now(),
            true,
        );
        self.store.append(record.clone()).await?;
        info!(
            student = %record.student_id,
            fallback = outcome.fallback,
            "attendance recorded by face"
        );
        Ok(ScanResult { record, outcome })
    }

    async fn poll_for_face(
        &self,
        stream: &mut LiveStream,
        cancel: &CancelToken,
    ) -> Result<Vec<f32>, ScanError> {
        let deadline = self.settings.timeout.map(|t| (Instant::now() + t, t));
        let mut attempts = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            if let Some((at, timeout)) = deadline {
                if Instant::now() >= at {
                    warn!("no face detected after {} attempts", attempts);
                    return Err(ScanError::DetectionTimeout(timeout));
                }
            }

            let frame = stream
                .next_frame()
                .await
                .map_err(|e| ScanError::CameraAccess(e.to_string()))?;
            attempts += 1;
            let detected = self
                .extractor
                .detect(&frame)
                .await
                .map_err(|e| ScanError::Detection(e.to_string()))?;
            if let Some(descriptor) = detected {
                debug!(attempts, "face detected");
                return Ok(descriptor);
            }

            let mut wake = Instant::now() + self.settings.poll_interval;
            if let Some((at, _)) = deadline {
                wake = wake.min(at);
            }
            tokio::select! {
                _ = tokio::time::sleep_until(wake) => {}
                _ = cancel.cancelled() => return Err(ScanError::Cancelled),
            }
        }
    }
}
