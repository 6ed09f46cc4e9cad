use crate::{FaceExtractor, Frame, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_MODEL_URL: &str = "https://cdn.jsdelivr.net/npm/@vladmandic/face-api/model";

/// Detector, landmark and recognition networks, in load order.
pub const MODEL_BUNDLES: [&str; 3] = [
    "tiny_face_detector_model",
    "face_landmark_68_model",
    "face_recognition_model",
];

#[derive(Clone)]
pub struct ModelBundleConfig {
    pub base_url: String,
    pub bundles: Vec<String>,
}

impl Default for ModelBundleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MODEL_URL.to_string(),
            bundles: MODEL_BUNDLES.iter().map(|b| b.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestGroup {
    paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub name: String,
    pub weight_files: Vec<String>,
}

#[derive(Clone)]
pub struct HttpModelLoader {
    client: Client,
    cfg: Arc<ModelBundleConfig>,
}

impl HttpModelLoader {
    pub fn new(cfg: ModelBundleConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }

    pub fn manifest_url(&self, bundle: &str) -> String {
        format!(
            "{}/{}-weights_manifest.json",
            self.cfg.base_url.trim_end_matches('/'),
            bundle
        )
    }

    pub async fn fetch(&self, bundle: &str) -> Result<ModelBundle, ProviderError> {
        let url = self.manifest_url(bundle);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProviderError::ModelLoad(format!("{bundle}: {e}")))?;

        let groups: Vec<ManifestGroup> = resp
            .json()
            .await
            .map_err(|e| ProviderError::ModelLoad(format!("{bundle}: bad manifest: {e}")))?;

        Ok(ModelBundle {
            name: bundle.to_string(),
            weight_files: groups.into_iter().flat_map(|g| g.paths).collect(),
        })
    }

    pub async fn fetch_all(&self) -> Result<Vec<ModelBundle>, ProviderError> {
        let mut bundles = Vec::with_capacity(self.cfg.bundles.len());
        for name in &self.cfg.bundles {
            let bundle = self.fetch(name).await?;
            info!(
                "Model {} available ({} weight files)",
                bundle.name,
                bundle.weight_files.len()
            );
            bundles.push(bundle);
        }
        Ok(bundles)
    }
}

/// Requires the remote model bundles to be reachable before the inner
/// extractor is considered loaded.
pub struct RemoteModelExtractor {
    loader: HttpModelLoader,
    inner: Arc<dyn FaceExtractor>,
}

impl RemoteModelExtractor {
    pub fn new(loader: HttpModelLoader, inner: Arc<dyn FaceExtractor>) -> Self {
        Self { loader, inner }
    }
}

#[async_trait::async_trait]
impl FaceExtractor for RemoteModelExtractor {
    async fn load_models(&self) -> Result<(), ProviderError> {
        self.loader.fetch_all().await?;
        self.inner.load_models().await
    }

    async fn detect(&self, frame: &Frame) -> Result<Option<Vec<f32>>, ProviderError> {
        self.inner.detect(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_urls_follow_bundle_names() {
        let loader = HttpModelLoader::new(ModelBundleConfig {
            base_url: "http://models.local/face/".into(),
            ..ModelBundleConfig::default()
        });
        assert_eq!(
            loader.manifest_url("face_recognition_model"),
            "http://models.local/face/face_recognition_model-weights_manifest.json"
        );
    }

    #[test]
    fn default_config_lists_three_bundles() {
        let cfg = ModelBundleConfig::default();
        assert_eq!(cfg.bundles.len(), 3);
        assert_eq!(cfg.base_url, DEFAULT_MODEL_URL);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_model_load_error() {
        let loader = HttpModelLoader::new(ModelBundleConfig {
            base_url: "http://127.0.0.1:9".into(),
            bundles: vec!["tiny_face_detector_model".into()],
        });
        let err = loader.fetch_all().await.unwrap_err();
        assert!(matches!(err, ProviderError::ModelLoad(_)));
    }
}
