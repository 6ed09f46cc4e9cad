//! Path → screen resolution and in-app navigation history.

use serde::Serialize;

const SCAN_PREFIX: &str = "/scan/";

/// Token left in a route template that was never filled in.
pub const PLACEHOLDER_TOKEN: &str = ":code";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", content = "token", rename_all = "snake_case")]
pub enum Screen {
    Reception,
    Scan(String),
    Admin,
}

impl Screen {
    pub fn path(&self) -> String {
        match self {
            Screen::Reception => "/".to_string(),
            Screen::Scan(token) => format!("{SCAN_PREFIX}{token}"),
            Screen::Admin => "/admin".to_string(),
        }
    }
}

pub fn resolve(path: &str) -> Screen {
    if path == "/admin" {
        Screen::Admin
    } else if let Some(token) = path.strip_prefix(SCAN_PREFIX) {
        Screen::Scan(token.to_string())
    } else {
        Screen::Reception
    }
}

/// Whether a scan token can start a verification. Token age is not checked.
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty() && token != PLACEHOLDER_TOKEN
}

pub fn scan_url(origin: &str, token: &str) -> String {
    format!("{}{SCAN_PREFIX}{token}", origin.trim_end_matches('/'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Navigated(Screen),
    /// Link leaves the kiosk origin; the host handles it.
    External,
}

/// History-backed navigation, independent of any renderer.
#[derive(Debug, Clone)]
pub struct Router {
    origin: String,
    history: Vec<String>,
    cursor: usize,
}

impl Router {
    pub fn new(origin: &str, initial_path: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            history: vec![normalize(initial_path)],
            cursor: 0,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn current_path(&self) -> &str {
        &self.history[self.cursor]
    }

    pub fn current(&self) -> Screen {
        resolve(self.current_path())
    }

    /// Pushes a history entry, discarding anything forward of the cursor.
    pub fn navigate(&mut self, path: &str) -> Screen {
        self.history.truncate(self.cursor + 1);
        self.history.push(normalize(path));
        self.cursor = self.history.len() - 1;
        self.current()
    }

    /// Same-origin links (absolute or root-relative) navigate in place.
    pub fn follow_link(&mut self, href: &str) -> LinkOutcome {
        let rest = if let Some(rest) = href.strip_prefix(&self.origin) {
            if !(rest.is_empty() || rest.starts_with(['/', '?', '#'])) {
                return LinkOutcome::External;
            }
            rest
        } else if href.starts_with('/') && !href.starts_with("//") {
            href
        } else {
            return LinkOutcome::External;
        };
        LinkOutcome::Navigated(self.navigate(rest))
    }

    pub fn back(&mut self) -> Option<Screen> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<Screen> {
        if self.cursor + 1 >= self.history.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }
}

/// Drops query and fragment; an empty path is the root.
fn normalize(path: &str) -> String {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
