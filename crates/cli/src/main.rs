use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::render;
use cli::session::{parse_descriptor, Session, HELP};
use kiosk_core::config;
use kiosk_core::config::AppConfig;
use kiosk_core::kiosk::{build_registry, fixture_frames, Kiosk};
use kiosk_core::router;
use kiosk_core::scanner::cancel_pair;
use providers::fixture::FixtureProvider;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Token { json } => run_token(cfg, json),
        Commands::Resolve { path, json } => run_resolve(&path, json),
        Commands::Reception { rotations, json } => run_reception(cfg, rotations, json).await,
        Commands::Students { json } => run_students(cfg, json),
        Commands::Scan {
            token,
            descriptor,
            as_student,
            json,
        } => run_scan(cfg, &token, descriptor, as_student, json).await,
        Commands::Session => run_session(cfg).await,
    }
}

#[derive(Parser)]
#[command(name = "kiosk")]
#[command(about = "QR + face verification attendance kiosk", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one scan token and its URL
    Token {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a path to the screen it shows
    Resolve {
        path: String,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the rotating reception code until Ctrl-C
    Reception {
        /// Stop after this many rotations
        #[arg(long)]
        rotations: Option<u32>,
        /// Output one JSON snapshot per line
        #[arg(long)]
        json: bool,
    },
    /// List the student directory
    Students {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Run face verification for a scan token
    Scan {
        token: String,
        /// Descriptor the camera will report (comma-separated floats)
        #[arg(long, conflicts_with = "as_student")]
        descriptor: Option<String>,
        /// Simulate the face of a directory student
        #[arg(long)]
        as_student: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive kiosk session (reception, scan and admin screens)
    Session,
}

fn run_token(cfg: AppConfig, json: bool) -> Result<()> {
    let kiosk = Kiosk::new(cfg)?;
    let token = kiosk.code_generator().generate();
    let url = kiosk.scan_url(&token);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "token": token, "url": url }))?
        );
    } else {
        println!("{token}\n{url}");
    }
    Ok(())
}

fn run_resolve(path: &str, json: bool) -> Result<()> {
    let screen = router::resolve(path);
    if json {
        let mut value = serde_json::to_value(&screen)?;
        if let router::Screen::Scan(token) = &screen {
            value
                .as_object_mut()
                .context("screen serializes as an object")?
                .insert("valid".into(), router::is_valid_token(token).into());
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match &screen {
            router::Screen::Scan(token) if !router::is_valid_token(token) => {
                println!("scan (invalid token)")
            }
            router::Screen::Scan(token) => println!("scan {token}"),
            router::Screen::Admin => println!("admin"),
            router::Screen::Reception => println!("reception"),
        }
    }
    Ok(())
}

async fn run_reception(cfg: AppConfig, rotations: Option<u32>, json: bool) -> Result<()> {
    let kiosk = Kiosk::new(cfg)?;
    let timer = kiosk.reception();
    let mut last_token = timer.token().to_string();
    let mut handle = timer.spawn(Duration::from_secs(1));
    print_snapshot(&kiosk, &handle.current(), json)?;

    let mut seen = 0u32;
    loop {
        tokio::select! {
            snap = handle.changed() => {
                let Some(snap) = snap else { break };
                print_snapshot(&kiosk, &snap, json)?;
                if snap.token != last_token {
                    last_token = snap.token.clone();
                    seen += 1;
                    if rotations.is_some_and(|max| seen >= max) {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Reception stopped.");
                break;
            }
        }
    }
    Ok(())
}

fn print_snapshot(
    kiosk: &Kiosk,
    snap: &kiosk_core::rotation::RotationSnapshot,
    json: bool,
) -> Result<()> {
    let url = kiosk.scan_url(&snap.token);
    if json {
        let mut value = serde_json::to_value(snap)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("url".into(), url.into());
        }
        println!("{}", serde_json::to_string(&value)?);
    } else {
        println!("{}\n", render::reception(snap, &url));
    }
    Ok(())
}

fn run_students(cfg: AppConfig, json: bool) -> Result<()> {
    let kiosk = Kiosk::new(cfg)?;
    if json {
        println!("{}", serde_json::to_string_pretty(kiosk.directory().all())?);
    } else {
        println!("{}", render::students(kiosk.directory()));
    }
    Ok(())
}

async fn run_scan(
    cfg: AppConfig,
    token: &str,
    descriptor: Option<String>,
    as_student: Option<String>,
    json: bool,
) -> Result<()> {
    let mut kiosk = Kiosk::new(cfg)?;
    let frames = if let Some(raw) = descriptor {
        vec![Some(parse_descriptor(&raw)?)]
    } else if let Some(id) = as_student {
        let student = kiosk
            .directory()
            .find(&id)
            .with_context(|| format!("unknown student: {id}"))?;
        vec![Some(student.reference_descriptor.clone())]
    } else {
        fixture_frames(kiosk.config())
    };
    let registry = build_registry(kiosk.config(), FixtureProvider::new(frames));
    kiosk.set_registry(registry);

    let mut scanner = kiosk.scanner()?;
    let (cancel, cancel_token) = cancel_pair();
    let result = {
        let scan = scanner.run(token, &cancel_token);
        tokio::pin!(scan);
        tokio::select! {
            res = &mut scan => res,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                scan.await
            }
        }
    };

    if json {
        let value = match &result {
            Ok(r) => serde_json::json!({
                "status": "ok",
                "record": r.record,
                "fallback": r.outcome.fallback,
                "distance": r.outcome.distance,
            }),
            Err(e) => serde_json::json!({
                "status": "error",
                "error": e.to_string(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let message = result.as_ref().ok().map(|r| r.message());
        println!("{}", render::scan(token, scanner.state(), message.as_deref()));
    }
    result.map(|_| ()).map_err(Into::into)
}

async fn run_session(cfg: AppConfig) -> Result<()> {
    let kiosk = Kiosk::new(cfg)?;
    let mut session = Session::new(kiosk);
    println!("{}\n\n{}", session.render().await?, HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}> ", session.kiosk().current_path());
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match session.execute(&line).await {
            Ok(Some(out)) => {
                if !out.is_empty() {
                    println!("{out}");
                }
            }
            Ok(None) => break,
            Err(e) => println!("error: {e:#}"),
        }
    }
    Ok(())
}
