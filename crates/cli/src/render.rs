//! Plain-text rendering of the kiosk screens.

use chrono::Local;
use kiosk_core::rotation::RotationSnapshot;
use kiosk_core::router::is_valid_token;
use kiosk_core::scanner::ScanState;
use std::fmt::Write;
use storage::directory::StudentDirectory;
use storage::models::AttendanceRecord;

pub fn reception(snapshot: &RotationSnapshot, scan_url: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== Smart Attendance ==");
    let _ = writeln!(out, "Scan the QR code to register your attendance.");
    let _ = writeln!(
        out,
        "The code changes automatically every {} seconds.",
        snapshot.period
    );
    let _ = writeln!(out, "QR: {scan_url}");
    let _ = writeln!(out, "Time remaining: {}s", snapshot.remaining);
    let _ = write!(out, "Admin panel: /admin");
    out
}

pub fn scan(token: &str, state: &ScanState, message: Option<&str>) -> String {
    if !is_valid_token(token) {
        return "== Invalid Code ==\nThe QR code is not valid or has expired.\nBack to home: /"
            .to_string();
    }
    let mut out = String::from("== Face Verification ==\n");
    let body = match state {
        ScanState::Idle | ScanState::ReadyToScan => {
            "Type `scan` to start the camera and face recognition.".to_string()
        }
        ScanState::ModelsLoading => "Loading face recognition...".to_string(),
        ScanState::CameraActive => "Detecting face...".to_string(),
        ScanState::Matched { .. } => format!("OK: {}", message.unwrap_or("attendance recorded")),
        ScanState::Unmatched => "Face not recognized. Contact the person in charge.".to_string(),
        ScanState::InvalidToken => "The QR code is not valid or has expired.".to_string(),
        ScanState::LoadError { message } => {
            format!("Error loading face recognition models: {message}")
        }
        ScanState::CameraError { message } => format!("Could not access the camera: {message}"),
        ScanState::TimedOut => "No face detected in time. Try again from the start.".to_string(),
        ScanState::Cancelled => "Scan cancelled.".to_string(),
        ScanState::Failed { message } => format!("Error: {message}"),
    };
    out.push_str(&body);
    if !matches!(
        state,
        ScanState::Idle | ScanState::ReadyToScan | ScanState::ModelsLoading | ScanState::CameraActive
    ) {
        out.push_str("\nBack to home: /");
    }
    out
}

pub fn admin_login(error: Option<&str>) -> String {
    let mut out = String::from("== Admin Panel ==\nEnter the access password: login <password>");
    if let Some(e) = error {
        let _ = write!(out, "\n{e}");
    }
    out.push_str("\nBack to home: /");
    out
}

pub fn students(directory: &StudentDirectory) -> String {
    let mut out = String::new();
    for s in directory.all() {
        let _ = writeln!(out, "{:<6} {}", s.id, s.name);
    }
    out.trim_end().to_string()
}

/// Records are expected most-recent first.
pub fn records(records: &[AttendanceRecord]) -> String {
    if records.is_empty() {
        return "No attendance recorded".to_string();
    }
    let mut out = format!(
        "{:<24} {:<10} {:<8} {}\n",
        "Student", "Date", "Time", "Validated by face"
    );
    for r in records {
        let local = r.timestamp.with_timezone(&Local);
        let _ = writeln!(
            out,
            "{:<24} {:<10} {:<8} {}",
            r.student_name,
            local.format("%Y-%m-%d"),
            local.format("%H:%M:%S"),
            if r.validated_by_face { "yes" } else { "no" }
        );
    }
    out.trim_end().to_string()
}

pub fn admin(directory: &StudentDirectory, attendance: &[AttendanceRecord]) -> String {
    format!(
        "== Admin Panel ==\nRegister manual attendance: add <student-id>\n{}\n\nAttendance log\n{}\nExit: /",
        students(directory),
        records(attendance)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use storage::models::Student;

    #[test]
    fn empty_log_has_placeholder() {
        assert_eq!(records(&[]), "No attendance recorded");
    }

    #[test]
    fn records_show_face_validation_column() {
        let s = Student {
            id: "1".into(),
            name: "Ana Torres".into(),
            reference_descriptor: vec![],
        };
        let rows = vec![
            AttendanceRecord::for_student("2", &s, Utc::now(), true),
            AttendanceRecord::for_student("1", &s, Utc::now(), false),
        ];
        let table = records(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("yes"));
        assert!(lines[2].ends_with("no"));
    }

    #[test]
    fn invalid_token_screen_links_home() {
        let out = scan(":code", &ScanState::Idle, None);
        assert!(out.contains("Invalid Code"));
        assert!(out.ends_with("Back to home: /"));
    }

    #[test]
    fn reception_shows_url_and_countdown() {
        let snap = RotationSnapshot {
            token: "1-abc".into(),
            remaining: 9,
            period: 15,
        };
        let out = reception(&snap, "http://k/scan/1-abc");
        assert!(out.contains("QR: http://k/scan/1-abc"));
        assert!(out.contains("Time remaining: 9s"));
        assert!(out.contains("every 15 seconds"));
    }
}
