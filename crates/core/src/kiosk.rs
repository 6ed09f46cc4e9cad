use crate::admin::{AdminGate, AdminScreen};
use crate::config::AppConfig;
use crate::matcher::FaceMatcher;
use crate::rotation::RotationTimer;
use crate::router::{self, LinkOutcome, Router, Screen};
use crate::scanner::{ScanSettings, Scanner};
use crate::token::{CodeGenerator, MonotonicClock};
use anyhow::Context;
use providers::fixture::FixtureProvider;
use providers::models::{HttpModelLoader, ModelBundleConfig, RemoteModelExtractor};
use providers::noop::NoopProvider;
use providers::ProviderRegistry;
use std::path::Path;
use std::sync::Arc;
use storage::directory::StudentDirectory;
use storage::{AttendanceStore, MemoryAttendanceStore};
use tracing::{debug, info};

/// Fixture frames from config; an empty descriptor is a frame without a face.
pub fn fixture_frames(config: &AppConfig) -> Vec<Option<Vec<f32>>> {
    config
        .providers
        .fixture_frames
        .iter()
        .map(|f| if f.is_empty() { None } else { Some(f.clone()) })
        .collect()
}

pub fn build_registry(config: &AppConfig, fixture: FixtureProvider) -> ProviderRegistry {
    let fixture = Arc::new(fixture);
    let mut reg = ProviderRegistry::new()
        .with_camera("noop", Arc::new(NoopProvider))
        .with_extractor("noop", Arc::new(NoopProvider))
        .with_camera("fixture", fixture.clone())
        .with_extractor("fixture", fixture);

    let mut extractor = config.providers.extractor.clone();
    if let Some(base) = &config.models.base_url {
        if let Ok(inner) = reg.extractor(Some(extractor.as_str())) {
            let loader = HttpModelLoader::new(ModelBundleConfig {
                base_url: base.clone(),
                ..ModelBundleConfig::default()
            });
            reg = reg.with_extractor("remote", Arc::new(RemoteModelExtractor::new(loader, inner)));
            extractor = "remote".to_string();
        }
    }

    reg.set_preferred_camera(&config.providers.camera)
        .set_preferred_extractor(&extractor)
}

pub fn build_directory(config: &AppConfig) -> anyhow::Result<StudentDirectory> {
    match &config.directory.path {
        Some(p) => StudentDirectory::load(Path::new(p))
            .with_context(|| format!("load student directory {p}")),
        None => {
            info!("No student directory configured, using demo roster.");
            Ok(StudentDirectory::demo())
        }
    }
}

/// One kiosk session: shared roster and attendance list plus the screens
/// that read and write them.
pub struct Kiosk {
    config: AppConfig,
    directory: Arc<StudentDirectory>,
    store: Arc<dyn AttendanceStore>,
    registry: ProviderRegistry,
    clock: Arc<MonotonicClock>,
    router: Router,
    admin: AdminScreen,
}

impl Kiosk {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let directory = build_directory(&config)?;
        let registry = build_registry(&config, FixtureProvider::new(fixture_frames(&config)));
        Ok(Self::with_parts(
            config,
            directory,
            Arc::new(MemoryAttendanceStore::new()),
            registry,
        ))
    }

    pub fn with_parts(
        config: AppConfig,
        directory: StudentDirectory,
        store: Arc<dyn AttendanceStore>,
        registry: ProviderRegistry,
    ) -> Self {
        let directory = Arc::new(directory);
        let clock = Arc::new(MonotonicClock::new());
        let admin = AdminScreen::new(
            AdminGate::from_source(&config.admin.credential),
            directory.clone(),
            store.clone(),
            clock.clone(),
        );
        let router = Router::new(&config.kiosk.origin, "/");
        Self {
            config,
            directory,
            store,
            registry,
            clock,
            router,
            admin,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn directory(&self) -> &StudentDirectory {
        &self.directory
    }

    pub fn store(&self) -> Arc<dyn AttendanceStore> {
        self.store.clone()
    }

    pub fn admin(&self) -> &AdminScreen {
        &self.admin
    }

    pub fn admin_mut(&mut self) -> &mut AdminScreen {
        &mut self.admin
    }

    pub fn screen(&self) -> Screen {
        self.router.current()
    }

    pub fn current_path(&self) -> &str {
        self.router.current_path()
    }

    pub fn code_generator(&self) -> CodeGenerator {
        CodeGenerator::new(self.clock.clone())
    }

    /// A fresh reception countdown with its first token already issued.
    pub fn reception(&self) -> RotationTimer {
        RotationTimer::new(self.code_generator(), self.config.rotation.period_secs)
    }

    pub fn scan_url(&self, token: &str) -> String {
        router::scan_url(self.router.origin(), token)
    }

    /// Swaps the camera and model providers used by later scans and
    /// returns the previous ones.
    pub fn set_registry(&mut self, registry: ProviderRegistry) -> ProviderRegistry {
        std::mem::replace(&mut self.registry, registry)
    }

    pub fn scanner(&self) -> anyhow::Result<Scanner> {
        let extractor = self.registry.extractor(None).context("face extractor")?;
        let camera = self.registry.camera(None).context("camera")?;
        Ok(Scanner::new(
            extractor,
            camera,
            FaceMatcher::new(&self.config.matcher),
            self.directory.clone(),
            self.store.clone(),
            self.clock.clone(),
            ScanSettings::from(&self.config.scanner),
        ))
    }

    pub fn navigate(&mut self, path: &str) -> Screen {
        let screen = self.router.navigate(path);
        self.entered(&screen);
        screen
    }

    pub fn follow_link(&mut self, href: &str) -> LinkOutcome {
        let outcome = self.router.follow_link(href);
        if let LinkOutcome::Navigated(screen) = &outcome {
            self.entered(screen);
        }
        outcome
    }

    pub fn back(&mut self) -> Option<Screen> {
        let screen = self.router.back()?;
        self.entered(&screen);
        Some(screen)
    }

    pub fn forward(&mut self) -> Option<Screen> {
        let screen = self.router.forward()?;
        self.entered(&screen);
        Some(screen)
    }

    /// Screen state does not survive leaving the screen.
    fn entered(&mut self, screen: &Screen) {
        debug!(?screen, "screen entered");
        if *screen != Screen::Admin && self.admin.is_authenticated() {
            self.admin.logout();
            info!("admin session closed on navigation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialSource;

    fn kiosk() -> Kiosk {
        let mut config = AppConfig::default();
        config.admin.credential = CredentialSource::Static {
            secret: "clave123".into(),
        };
        Kiosk::new(config).unwrap()
    }

    #[test]
    fn fixture_frames_map_empty_to_no_face() {
        let mut config = AppConfig::default();
        config.providers.fixture_frames = vec![vec![], vec![0.5, 0.5]];
        assert_eq!(fixture_frames(&config), vec![None, Some(vec![0.5, 0.5])]);
    }

    #[test]
    fn registry_prefers_remote_models_when_configured() {
        let mut config = AppConfig::default();
        config.models.base_url = Some("http://models.local".into());
        let reg = build_registry(&config, FixtureProvider::default());
        assert_eq!(reg.preferred_extractor.as_deref(), Some("remote"));
        assert!(reg.extractor(None).is_ok());

        let reg = build_registry(&AppConfig::default(), FixtureProvider::default());
        assert_eq!(reg.preferred_extractor.as_deref(), Some("fixture"));
    }

    #[test]
    fn missing_directory_file_is_an_error() {
        let mut config = AppConfig::default();
        config.directory.path = Some("/definitely/not/here.toml".into());
        assert!(Kiosk::new(config).is_err());
    }

    #[test]
    fn leaving_admin_screen_logs_out() {
        let mut kiosk = kiosk();
        assert_eq!(kiosk.navigate("/admin"), Screen::Admin);
        kiosk.admin_mut().login("clave123").unwrap();
        assert!(kiosk.admin().is_authenticated());

        assert_eq!(
            kiosk.follow_link("http://localhost:5173/"),
            LinkOutcome::Navigated(Screen::Reception)
        );
        assert!(!kiosk.admin().is_authenticated());
        assert_eq!(kiosk.back(), Some(Screen::Admin));
        assert!(!kiosk.admin().is_authenticated());
    }

    #[test]
    fn reception_issues_scan_urls_for_current_origin() {
        let kiosk = kiosk();
        let timer = kiosk.reception();
        assert_eq!(timer.period(), 15);
        let url = kiosk.scan_url(timer.token());
        assert!(url.starts_with("http://localhost:5173/scan/"));
        assert_eq!(
            router::resolve(url.trim_start_matches("http://localhost:5173")),
            Screen::Scan(timer.token().to_string())
        );
    }
}
