//! Line-driven kiosk session: navigation, reception countdown, scans and
//! the admin panel sharing one attendance list.

use crate::render;
use anyhow::{anyhow, Context, Result};
use kiosk_core::kiosk::{build_registry, Kiosk};
use kiosk_core::rotation::{RotationTimer, TickOutcome};
use kiosk_core::router::{is_valid_token, LinkOutcome, Screen};
use kiosk_core::scanner::{CancelToken, ScanState};
use providers::fixture::FixtureProvider;
use tracing::debug;

pub const HELP: &str = "\
commands:
  goto <path>        navigate to /, /admin or /scan/<token>
  click <href>       follow a link (same-origin links stay in the kiosk)
  back | forward     move through history
  show               render the current screen
  tick [n]           advance the reception countdown n seconds
  open               open the scan URL currently shown at reception
  scan [face]        run face verification; face is @<student-id>,
                     a comma-separated descriptor, or `none`
  login <password>   unlock the admin panel
  logout             lock the admin panel
  add <student-id>   register manual attendance (admin)
  list               show the attendance log (admin)
  help | quit";

#[derive(Debug, Clone)]
struct ScanView {
    state: ScanState,
    message: Option<String>,
}

pub struct Session {
    kiosk: Kiosk,
    reception: Option<RotationTimer>,
    scan: ScanView,
    login_error: Option<String>,
}

impl Session {
    pub fn new(kiosk: Kiosk) -> Self {
        let mut session = Self {
            kiosk,
            reception: None,
            scan: ScanView {
                state: ScanState::Idle,
                message: None,
            },
            login_error: None,
        };
        session.mount();
        session
    }

    pub fn kiosk(&self) -> &Kiosk {
        &self.kiosk
    }

    pub fn reception_token(&self) -> Option<&str> {
        self.reception.as_ref().map(|r| r.token())
    }

    /// Runs one command. `Ok(None)` ends the session.
    pub async fn execute(&mut self, line: &str) -> Result<Option<String>> {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return Ok(Some(String::new()));
        };
        let arg = parts.next();
        debug!(cmd, ?arg, "session command");

        let out = match cmd {
            "quit" | "exit" => return Ok(None),
            "help" => HELP.to_string(),
            "show" => self.render().await?,
            "goto" => {
                let path = arg.ok_or_else(|| anyhow!("usage: goto <path>"))?;
                self.kiosk.navigate(path);
                self.mount();
                self.render().await?
            }
            "click" => {
                let href = arg.ok_or_else(|| anyhow!("usage: click <href>"))?;
                match self.kiosk.follow_link(href) {
                    LinkOutcome::Navigated(_) => {
                        self.mount();
                        self.render().await?
                    }
                    LinkOutcome::External => format!("external link, leaving kiosk: {href}"),
                }
            }
            "back" | "forward" => {
                let moved = if cmd == "back" {
                    self.kiosk.back()
                } else {
                    self.kiosk.forward()
                };
                match moved {
                    Some(_) => {
                        self.mount();
                        self.render().await?
                    }
                    None => format!("no {cmd} history"),
                }
            }
            "tick" => {
                let n: u32 = match arg {
                    Some(a) => a.parse().context("tick count")?,
                    None => 1,
                };
                self.tick(n)?
            }
            "open" => {
                let token = self
                    .reception_token()
                    .ok_or_else(|| anyhow!("not on the reception screen"))?
                    .to_string();
                let url = self.kiosk.scan_url(&token);
                self.kiosk.follow_link(&url);
                self.mount();
                self.render().await?
            }
            "scan" => self.scan(arg).await?,
            "login" => self.login(arg.unwrap_or("")).await?,
            "logout" => {
                self.kiosk.admin_mut().logout();
                self.render().await?
            }
            "add" => {
                let id = arg.ok_or_else(|| anyhow!("usage: add <student-id>"))?;
                match self.kiosk.admin().add_manual(id).await {
                    Ok(r) => format!("registered {} (manual)", r.student_name),
                    Err(e) => e.to_string(),
                }
            }
            "list" => match self.kiosk.admin().records().await {
                Ok(records) => render::records(&records),
                Err(e) => e.to_string(),
            },
            other => format!("unknown command: {other} (try `help`)"),
        };
        Ok(Some(out))
    }

    pub async fn render(&self) -> Result<String> {
        Ok(match self.kiosk.screen() {
            Screen::Reception => match &self.reception {
                Some(timer) => {
                    render::reception(&timer.snapshot(), &self.kiosk.scan_url(timer.token()))
                }
                None => String::new(),
            },
            Screen::Scan(token) => {
                render::scan(&token, &self.scan.state, self.scan.message.as_deref())
            }
            Screen::Admin => {
                let admin = self.kiosk.admin();
                if admin.is_authenticated() {
                    let records = admin.records().await?;
                    render::admin(admin.students(), &records)
                } else {
                    render::admin_login(self.login_error.as_deref())
                }
            }
        })
    }

    /// Resets per-screen state after navigation. The reception countdown
    /// only exists while its screen is shown.
    fn mount(&mut self) {
        self.scan = ScanView {
            state: ScanState::Idle,
            message: None,
        };
        self.login_error = None;
        match self.kiosk.screen() {
            Screen::Reception => {
                if self.reception.is_none() {
                    self.reception = Some(self.kiosk.reception());
                }
            }
            _ => self.reception = None,
        }
    }

    fn tick(&mut self, n: u32) -> Result<String> {
        let timer = self
            .reception
            .as_mut()
            .ok_or_else(|| anyhow!("not on the reception screen"))?;
        let mut rotations = 0;
        for _ in 0..n {
            if let TickOutcome::Rotated { .. } = timer.tick() {
                rotations += 1;
            }
        }
        let snapshot = timer.snapshot();
        let url = self.kiosk.scan_url(&snapshot.token);
        let mut out = render::reception(&snapshot, &url);
        if rotations > 0 {
            out = format!("(code rotated {rotations}x)\n{out}");
        }
        Ok(out)
    }

    async fn scan(&mut self, face: Option<&str>) -> Result<String> {
        let Screen::Scan(token) = self.kiosk.screen() else {
            return Err(anyhow!("not on a scan screen"));
        };
        // Each scan screen verifies one face; navigate to scan again.
        if !is_valid_token(&token)
            || !matches!(self.scan.state, ScanState::Idle | ScanState::ReadyToScan)
        {
            return self.render().await;
        }

        // A face given here applies to this scan only.
        let mut scanner = match face {
            Some(face) => {
                let frames = self.frames_for(face)?;
                let registry = build_registry(self.kiosk.config(), FixtureProvider::new(frames));
                let configured = self.kiosk.set_registry(registry);
                let scanner = self.kiosk.scanner();
                self.kiosk.set_registry(configured);
                scanner?
            }
            None => self.kiosk.scanner()?,
        };
        let result = scanner.run(&token, &CancelToken::never()).await;
        self.scan = ScanView {
            state: scanner.state().clone(),
            message: result.as_ref().ok().map(|r| r.message()),
        };
        self.render().await
    }

    fn frames_for(&self, face: &str) -> Result<Vec<Option<Vec<f32>>>> {
        if face == "none" {
            return Ok(vec![]);
        }
        if let Some(id) = face.strip_prefix('@') {
            let student = self
                .kiosk
                .directory()
                .find(id)
                .ok_or_else(|| anyhow!("unknown student: {id}"))?;
            return Ok(vec![Some(student.reference_descriptor.clone())]);
        }
        Ok(vec![Some(parse_descriptor(face)?)])
    }

    async fn login(&mut self, password: &str) -> Result<String> {
        if self.kiosk.screen() != Screen::Admin {
            return Err(anyhow!("not on the admin screen"));
        }
        match self.kiosk.admin_mut().login(password) {
            Ok(()) => self.login_error = None,
            Err(e) => self.login_error = Some(e.to_string()),
        }
        self.render().await
    }
}

pub fn parse_descriptor(raw: &str) -> Result<Vec<f32>> {
    raw.split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .with_context(|| format!("invalid descriptor value: {v}"))
        })
        .collect()
}
