use providers::FacingMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub kiosk: KioskConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub models: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Origin embedded in scan URLs, e.g. `http://kiosk.local`.
    pub origin: String,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5173".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub period_secs: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self { period_secs: 15 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Reject a face that is not within threshold of any reference.
    Strict,
    /// Fall back to a random student when nothing is within threshold.
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub threshold: f32,
    pub policy: MatchPolicy,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            policy: MatchPolicy::Lenient,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub poll_interval_ms: u64,
    /// Upper bound on face detection; `0` (or `None`) polls until cancelled.
    pub timeout_secs: Option<u64>,
    pub facing_mode: FacingMode,
    pub width: u32,
    pub height: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            timeout_secs: Some(30),
            facing_mode: FacingMode::User,
            width: 640,
            height: 480,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CredentialSource {
    Static { secret: String },
    Env { var: String },
}

impl Default for CredentialSource {
    fn default() -> Self {
        CredentialSource::Env {
            var: "KIOSK_ADMIN_PASSWORD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub credential: CredentialSource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// TOML roster; the built-in demo roster is used when unset.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub camera: String,
    pub extractor: String,
    /// Descriptors replayed by the fixture provider, one per frame.
    /// An empty list is a frame without a face.
    pub fixture_frames: Vec<Vec<f32>>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            camera: "fixture".to_string(),
            extractor: "fixture".to_string(),
            fixture_frames: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// When set, model manifests are fetched from here before scanning.
    #[serde(default)]
    pub base_url: Option<String>,
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("KIOSK")
            .prefix_separator("_")
            .separator("__"),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
