use crate::config::CredentialSource;
use crate::token::MonotonicClock;
use chrono::Utc;
use std::sync::Arc;
use storage::directory::StudentDirectory;
use storage::models::AttendanceRecord;
use storage::{AttendanceStore, StorageError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid password")]
    InvalidPassword,
    #[error("admin login required")]
    NotAuthenticated,
    #[error("unknown student: {0}")]
    UnknownStudent(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Single shared secret gating the admin screen. Plain comparison, no
/// lockout.
#[derive(Debug, Clone, Default)]
pub struct AdminGate {
    secret: Option<String>,
    authenticated: bool,
}

impl AdminGate {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret,
            authenticated: false,
        }
    }

    pub fn from_source(source: &CredentialSource) -> Self {
        let secret = match source {
            CredentialSource::Static { secret } => Some(secret.clone()),
            CredentialSource::Env { var } => match std::env::var(var) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("{var} is not set; admin login is disabled");
                    None
                }
            },
        };
        Self::new(secret)
    }

    pub fn authenticate(&mut self, password: &str) -> bool {
        let ok = self.secret.as_deref() == Some(password);
        if ok {
            self.authenticated = true;
        } else {
            warn!("rejected admin login attempt");
        }
        ok
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
    }
}

/// The admin screen: login, attendance list and manual entry.
pub struct AdminScreen {
    gate: AdminGate,
    directory: Arc<StudentDirectory>,
    store: Arc<dyn AttendanceStore>,
    clock: Arc<MonotonicClock>,
}

impl AdminScreen {
    pub fn new(
        gate: AdminGate,
        directory: Arc<StudentDirectory>,
        store: Arc<dyn AttendanceStore>,
        clock: Arc<MonotonicClock>,
    ) -> Self {
        Self {
            gate,
            directory,
            store,
            clock,
        }
    }

    pub fn login(&mut self, password: &str) -> Result<(), AdminError> {
        if self.gate.authenticate(password) {
            info!("admin session opened");
            Ok(())
        } else {
            Err(AdminError::InvalidPassword)
        }
    }

    pub fn logout(&mut self) {
        self.gate.logout();
    }

    pub fn is_authenticated(&self) -> bool {
        self.gate.is_authenticated()
    }

    pub fn students(&self) -> &StudentDirectory {
        &self.directory
    }

    /// Attendance, most recent first.
    pub async fn records(&self) -> Result<Vec<AttendanceRecord>, AdminError> {
        self.require_login()?;
        Ok(self.store.all_descending().await)
    }

    pub async fn add_manual(&self, student_id: &str) -> Result<AttendanceRecord, AdminError> {
        self.require_login()?;
        let student = self
            .directory
            .find(student_id)
            .ok_or_else(|| AdminError::UnknownStudent(student_id.to_string()))?;
        let record =
            AttendanceRecord::for_student(self.clock.next_id(), student, Utc::now(), false);
        self.store.append(record.clone()).await?;
        info!(student = %student.id, "manual attendance recorded");
        Ok(record)
    }

    fn require_login(&self) -> Result<(), AdminError> {
        if self.gate.is_authenticated() {
            Ok(())
        } else {
            Err(AdminError::NotAuthenticated)
        }
    }
}
