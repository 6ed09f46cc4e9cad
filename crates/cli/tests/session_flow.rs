use cli::session::Session;
use kiosk_core::config::{AppConfig, CredentialSource};
use kiosk_core::kiosk::Kiosk;
use kiosk_core::router::Screen;
use std::fs;
use tempfile::tempdir;

fn session() -> Session {
    let mut config = AppConfig::default();
    config.admin.credential = CredentialSource::Static {
        secret: "clave123".into(),
    };
    config.scanner.timeout_secs = Some(2);
    Session::new(Kiosk::new(config).unwrap())
}

async fn run(session: &mut Session, line: &str) -> String {
    session.execute(line).await.unwrap().unwrap()
}

#[tokio::test]
async fn manual_and_face_attendance_share_one_log() {
    let mut s = session();

    // Admin registers student 1 by hand.
    run(&mut s, "goto /admin").await;
    let out = run(&mut s, "login nope").await;
    assert!(out.contains("invalid password"));
    let out = run(&mut s, "login clave123").await;
    assert!(out.contains("No attendance recorded"));
    let out = run(&mut s, "add 1").await;
    assert_eq!(out, "registered Ana Torres (manual)");

    // Reception hands out a code, student 2 scans it.
    run(&mut s, "goto /").await;
    assert!(!s.kiosk().admin().is_authenticated());
    let token = s.reception_token().unwrap().to_string();
    let out = run(&mut s, "open").await;
    assert_eq!(s.kiosk().screen(), Screen::Scan(token));
    assert!(out.contains("Face Verification"));
    let out = run(&mut s, "scan @2").await;
    assert!(out.contains("Attendance recorded for Luis Pérez"), "{out}");

    let store = s.kiosk().store();
    let all = store.all().await;
    assert_eq!(all.len(), 2);
    assert!(!all[0].validated_by_face);
    assert!(all[1].validated_by_face);
    assert_eq!(store.all_descending().await[0].student_id, "2");

    // The admin log shows the face scan first.
    run(&mut s, "goto /admin").await;
    run(&mut s, "login clave123").await;
    let out = run(&mut s, "list").await;
    let rows: Vec<&str> = out.lines().skip(1).collect();
    assert!(rows[0].starts_with("Luis Pérez") && rows[0].ends_with("yes"));
    assert!(rows[1].starts_with("Ana Torres") && rows[1].ends_with("no"));
}

#[tokio::test]
async fn placeholder_and_empty_tokens_show_invalid_screen() {
    let mut s = session();
    for path in ["/scan/:code", "/scan/"] {
        let out = run(&mut s, &format!("goto {path}")).await;
        assert!(out.contains("Invalid Code"), "{path}: {out}");
        let out = run(&mut s, "scan @1").await;
        assert!(out.contains("Invalid Code"));
    }
    assert!(s.kiosk().store().all().await.is_empty());
}

#[tokio::test]
async fn admin_actions_need_login() {
    let mut s = session();
    run(&mut s, "goto /admin").await;
    assert!(run(&mut s, "add 1").await.contains("login required"));
    assert!(run(&mut s, "list").await.contains("login required"));
    assert!(s.execute("login").await.unwrap().is_some());
    assert!(s.kiosk().store().all().await.is_empty());
}

#[tokio::test]
async fn reception_countdown_rotates_code() {
    let mut s = session();
    let first = s.reception_token().unwrap().to_string();
    let out = run(&mut s, "tick 14").await;
    assert!(out.contains("Time remaining: 1s"));
    assert_eq!(s.reception_token(), Some(first.as_str()));

    let out = run(&mut s, "tick").await;
    assert!(out.contains("code rotated 1x"));
    assert!(out.contains("Time remaining: 15s"));
    assert_ne!(s.reception_token(), Some(first.as_str()));

    // Leaving reception stops the countdown.
    run(&mut s, "goto /admin").await;
    assert!(s.reception_token().is_none());
    assert!(s.execute("tick").await.is_err());
}

#[tokio::test]
async fn history_and_external_links() {
    let mut s = session();
    run(&mut s, "goto /admin").await;
    run(&mut s, "click /scan/abc").await;
    assert_eq!(s.kiosk().screen(), Screen::Scan("abc".into()));
    run(&mut s, "back").await;
    assert_eq!(s.kiosk().screen(), Screen::Admin);
    run(&mut s, "forward").await;
    assert_eq!(s.kiosk().current_path(), "/scan/abc");
    assert_eq!(run(&mut s, "forward").await, "no forward history");

    let out = run(&mut s, "click https://example.org/help").await;
    assert!(out.starts_with("external link"));
    assert_eq!(s.kiosk().current_path(), "/scan/abc");
    assert!(s.execute("quit").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn scan_without_face_times_out() {
    let mut s = session();
    run(&mut s, "goto /scan/1-abc").await;
    let out = run(&mut s, "scan none").await;
    assert!(out.contains("No face detected in time"), "{out}");
    assert!(s.kiosk().store().all().await.is_empty());
}

#[tokio::test]
async fn roster_file_feeds_admin_and_scanner() {
    let temp = tempdir().unwrap();
    let roster = temp.path().join("students.toml");
    fs::write(
        &roster,
        r#"
        [[student]]
        id = "A7"
        name = "Rosa Díaz"
        reference_descriptor = [1.0, 0.0, 0.0]
        "#,
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.directory.path = Some(roster.to_string_lossy().into_owned());
    config.admin.credential = CredentialSource::Static {
        secret: "clave123".into(),
    };
    let mut s = Session::new(Kiosk::new(config).unwrap());

    run(&mut s, "goto /scan/9-zz").await;
    let out = run(&mut s, "scan 0.9,0.1,0.0").await;
    assert!(out.contains("Rosa Díaz"), "{out}");

    run(&mut s, "goto /admin").await;
    let out = run(&mut s, "login clave123").await;
    assert!(out.contains("A7"));
    assert!(out.contains("Rosa Díaz"));
}

#[tokio::test]
async fn scan_screen_records_one_face() {
    let mut s = session();
    run(&mut s, "goto /scan/1-abc").await;
    let out = run(&mut s, "scan @1").await;
    assert!(out.contains("Attendance recorded for Ana Torres"), "{out}");

    let out = run(&mut s, "scan @2").await;
    assert!(out.contains("Ana Torres"), "{out}");
    assert!(!out.contains("Luis Pérez"));
    assert_eq!(s.kiosk().store().all().await.len(), 1);

    // Coming back to the screen allows a new verification.
    run(&mut s, "goto /").await;
    run(&mut s, "back").await;
    let out = run(&mut s, "scan @2").await;
    assert!(out.contains("Attendance recorded for Luis Pérez"), "{out}");
    assert_eq!(s.kiosk().store().all().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn scanned_face_does_not_carry_to_next_screen() {
    let mut s = session();
    run(&mut s, "goto /scan/1-abc").await;
    run(&mut s, "scan @1").await;

    run(&mut s, "goto /").await;
    run(&mut s, "goto /scan/2-def").await;
    let out = run(&mut s, "scan").await;
    assert!(out.contains("No face detected in time"), "{out}");

    let ids: Vec<String> = s
        .kiosk()
        .store()
        .all()
        .await
        .into_iter()
        .map(|r| r.student_id)
        .collect();
    assert_eq!(ids, vec!["1".to_string()]);
}
