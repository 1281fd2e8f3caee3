use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use faceaccess_client::models::{DocumentLevel, DocumentUpload, NewUser, UserUpdate};
use faceaccess_client::{AccessGate, ApiClient, AttemptOutcome, Config, DashboardSnapshot, Session};
use faceaccess_core::{AuthorizationLevel, SessionView};
use faceaccess_hw::{Camera, CaptureSource, StillImage};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "faceaccess", about = "Facial-recognition access control client")]
struct Cli {
    /// Backend API root, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SourceArgs {
    /// Submit this image file instead of capturing from a camera
    #[arg(long, conflicts_with = "device")]
    image: Option<PathBuf>,
    /// V4L2 device to capture from (defaults to the configured device)
    #[arg(long)]
    device: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one still and run an access check
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Interactive session: recognize, then browse the views you are allowed
    Session {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Manage enrolled users
    Users {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Browse and manage documents
    Documents {
        #[command(subcommand)]
        action: DocumentCommand,
    },
    /// Show recent access attempts
    Logs {
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show access statistics
    Stats,
    /// Show statistics and recent attempts together
    Dashboard {
        /// Refresh on the configured interval until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Check backend health
    Health,
    /// List V4L2 capture devices
    Devices,
}

#[derive(Subcommand)]
enum UserCommand {
    /// List enrolled users
    List,
    /// Enroll a user with a reference face image
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// basic, intermediate or full
        #[arg(long)]
        level: AuthorizationLevel,
        /// Reference face image (JPEG or PNG)
        #[arg(long)]
        image: PathBuf,
    },
    /// Change a user's name, level or active flag
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        level: Option<AuthorizationLevel>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Remove a user
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum DocumentCommand {
    /// List documents visible to a user
    List {
        #[arg(long)]
        email: String,
    },
    /// Upload a document
    Upload {
        file: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// public, restricted or confidential
        #[arg(long)]
        level: DocumentLevel,
        #[arg(long)]
        uploader: String,
    },
    /// Download a document's contents
    Download {
        id: i64,
        #[arg(long)]
        email: String,
        /// Output file (defaults to document-<id>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show document and access level catalogs
    Levels,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    let api = ApiClient::with_timeout(&config.api_base_url, config.request_timeout())?;
    tracing::debug!(api = %api.base_url(), "client configured");

    match cli.command {
        Commands::Check { source } => {
            let mut gate = AccessGate::new(api);
            gate.start_capture(open_source(&config, &source)?, config.warmup_frames)?;
            let outcome = gate.check_access().await;
            gate.stop_capture();
            print_outcome(&outcome?);
        }
        Commands::Session { source } => run_session(api, &config, &source).await?,
        Commands::Users { action } => run_users(&api, action).await?,
        Commands::Documents { action } => run_documents(&api, action).await?,
        Commands::Logs { limit } => {
            let logs = api.access_logs(limit.unwrap_or(config.access_log_limit)).await?;
            print_logs(&logs);
        }
        Commands::Stats => print_stats(&api.stats().await?),
        Commands::Dashboard { watch } => run_dashboard(&api, &config, watch).await?,
        Commands::Health => {
            let health = api.health().await?;
            println!(
                "{}: {} ({})",
                api.base_url(),
                health.status,
                health.timestamp.as_deref().unwrap_or("no timestamp")
            );
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for device in devices {
                println!("{}  {} ({}, {})", device.path, device.name, device.driver, device.bus);
            }
        }
    }

    Ok(())
}

fn open_source(config: &Config, args: &SourceArgs) -> Result<Box<dyn CaptureSource>> {
    let settings = config.capture_settings();
    if let Some(path) = &args.image {
        return Ok(Box::new(StillImage::open(path, settings.jpeg_quality)?));
    }
    let device = args.device.as_deref().unwrap_or(&config.camera_device);
    let camera = Camera::open(device, settings).with_context(|| format!("failed to open {device}"))?;
    Ok(Box::new(camera))
}

fn print_outcome(outcome: &AttemptOutcome) {
    let result = &outcome.result;
    if let Some(lockout) = result.lockout() {
        println!("LOCKED: {} ({}s remaining)", lockout.message, lockout.remaining.as_secs());
        return;
    }
    if result.granted {
        let who = result
            .user_name
            .as_deref()
            .or(result.subject_email.as_deref())
            .unwrap_or("unknown");
        print!("GRANTED: {who}");
        if let Some(score) = result.confidence_score {
            print!(" ({score:.1}% confidence)");
        }
        println!();
    } else {
        println!("DENIED");
    }
    if !result.message.is_empty() {
        println!("  {}", result.message);
    }
}

fn print_views(session: &Session) {
    let active = session.router().active_index();
    for (i, view) in session.views().iter().enumerate() {
        let marker = if i == active { '*' } else { ' ' };
        println!("{marker} {i}  {}", view.title());
    }
}

fn print_logs(logs: &[faceaccess_client::models::AccessLog]) {
    if logs.is_empty() {
        println!("No access attempts recorded");
    }
    for log in logs {
        let outcome = if log.access_granted { "granted" } else { "denied " };
        let score = log
            .confidence_score
            .map(|s| format!("{s:.1}%"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {outcome}  {:>6}  {}",
            log.timestamp.format("%Y-%m-%d %H:%M:%S"),
            score,
            log.user_name.as_deref().unwrap_or("unknown")
        );
    }
}

fn print_stats(stats: &faceaccess_client::models::Stats) {
    println!("Authorized users:  {}", stats.total_authorized_users);
    println!("Access attempts:   {}", stats.total_access_attempts);
    println!("  granted:         {}", stats.granted_attempts);
    println!("  denied:          {}", stats.denied_attempts);
    println!("Success rate:      {:.1}%", stats.success_rate);
    if let Some(lockouts) = stats.current_lockouts {
        println!("Active lockouts:   {lockouts}");
    }
}

fn print_dashboard(snapshot: &DashboardSnapshot) {
    println!("== Dashboard ({}) ==", snapshot.fetched_at.format("%H:%M:%S"));
    print_stats(&snapshot.stats);
    println!();
    println!(
        "Recent attempts ({} granted of {}):",
        snapshot.granted_in_window(),
        snapshot.logs.len()
    );
    print_logs(&snapshot.logs);
}

async fn run_dashboard(api: &ApiClient, config: &Config, watch: bool) -> Result<()> {
    if !watch {
        print_dashboard(&DashboardSnapshot::fetch(api, config.dashboard_log_limit).await?);
        return Ok(());
    }

    let mut interval = tokio::time::interval(config.dashboard_refresh());
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match DashboardSnapshot::fetch(api, config.dashboard_log_limit).await {
                    Ok(snapshot) => print_dashboard(&snapshot),
                    Err(e) => eprintln!("notice: dashboard refresh failed: {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn run_users(api: &ApiClient, action: UserCommand) -> Result<()> {
    match action {
        UserCommand::List => {
            for user in api.list_users().await? {
                let level = user
                    .access_level
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "UNKNOWN".to_string());
                let active = if user.is_active { "" } else { "  (inactive)" };
                println!("{:>4}  {:<28} {:<12} {}{active}", user.id, user.email, level, user.name);
            }
        }
        UserCommand::Register {
            name,
            email,
            level,
            image,
        } => {
            let (bytes, file_name) = read_upload(&image)?;
            let user = NewUser {
                name,
                email,
                access_level: level,
            };
            let created = api.register_user(&user, bytes, &file_name).await?;
            println!("Registered {} (id {})", created.email, created.id);
        }
        UserCommand::Update {
            id,
            name,
            level,
            active,
        } => {
            let update = UserUpdate {
                name,
                access_level: level,
                is_active: active,
            };
            let user = api.update_user(id, &update).await?;
            println!("Updated {} (id {})", user.email, user.id);
        }
        UserCommand::Delete { id } => {
            api.delete_user(id).await?;
            println!("Deleted user {id}");
        }
    }
    Ok(())
}

async fn run_documents(api: &ApiClient, action: DocumentCommand) -> Result<()> {
    match action {
        DocumentCommand::List { email } => print_documents(api, &email).await?,
        DocumentCommand::Upload {
            file,
            title,
            description,
            level,
            uploader,
        } => {
            let (bytes, file_name) = read_upload(&file)?;
            let upload = DocumentUpload {
                title,
                description,
                document_level: level,
                uploader_email: uploader,
            };
            let doc = api.upload_document(&upload, bytes, &file_name).await?;
            println!("Uploaded {} as document {}", doc.filename, doc.id);
        }
        DocumentCommand::Download { id, email, output } => {
            let bytes = api.download_document(id, &email).await?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("document-{id}")));
            std::fs::write(&output, &bytes)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Saved {} bytes to {}", bytes.len(), output.display());
        }
        DocumentCommand::Levels => {
            let catalog = api.document_levels().await?;
            println!("Document levels:");
            for level in &catalog.document_levels {
                println!("  {:<14} {}  {}", level.value, level.label, level.description);
            }
            println!("Access levels:");
            for level in &catalog.access_levels {
                println!("  {:<14} {}  {}", level.value, level.label, level.description);
            }
        }
    }
    Ok(())
}

async fn print_documents(api: &ApiClient, email: &str) -> Result<()> {
    let access = api.list_documents(email).await?;
    if let Some(level) = access.user_access_level {
        println!("Access level: {level}");
    }
    println!("{} of {} documents visible", access.documents.len(), access.total_available);
    for doc in &access.documents {
        println!(
            "{:>4}  {:<13} {}  ({})",
            doc.id,
            doc.document_level.to_string(),
            doc.title,
            doc.filename
        );
    }
    Ok(())
}

fn read_upload(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());
    Ok((bytes, file_name))
}

const SESSION_HELP: &str = "\
commands:
  start        open the camera (or image) for this session
  stop         release the camera
  check        capture a still and run an access check
  views        list the views available to this session
  select N     switch to view N
  show         render the active view
  quit         stop the camera and exit";

/// One line of input to the interactive session.
#[derive(Debug, PartialEq, Eq)]
enum SessionCommand {
    Start,
    Stop,
    Check,
    Views,
    Select(Option<usize>),
    Show,
    Quit,
    Help,
    Empty,
}

fn parse_session_command(line: &str) -> SessionCommand {
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (None, _) => SessionCommand::Empty,
        (Some("start"), _) => SessionCommand::Start,
        (Some("stop"), _) => SessionCommand::Stop,
        (Some("check"), _) => SessionCommand::Check,
        (Some("views"), _) => SessionCommand::Views,
        (Some("select"), Some(n)) => SessionCommand::Select(n.parse().ok()),
        (Some("show"), _) => SessionCommand::Show,
        (Some("quit" | "exit"), _) => SessionCommand::Quit,
        _ => SessionCommand::Help,
    }
}

/// Open the session's capture source, replacing any active one. Failures
/// are printed as notices.
fn start_camera(gate: &mut AccessGate, config: &Config, source: &SourceArgs) {
    let started = open_source(config, source)
        .and_then(|src| Ok(gate.start_capture(src, config.warmup_frames)?));
    match started {
        Ok(()) => {
            if let Some(description) = gate.capture_description() {
                println!("Capturing from {description}");
            }
        }
        Err(e) => eprintln!("notice: camera unavailable: {e:#}"),
    }
}

/// Interactive loop. Every failure is printed as a notice; the loop only
/// ends on `quit` or end of input.
async fn run_session(api: ApiClient, config: &Config, source: &SourceArgs) -> Result<()> {
    let mut gate = AccessGate::new(api.clone());
    let mut session = Session::new(api.clone());
    let mut last: Option<AttemptOutcome> = None;

    start_camera(&mut gate, config, source);
    println!("{SESSION_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_views(&session);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_session_command(&line) {
            SessionCommand::Empty | SessionCommand::Views => {}
            SessionCommand::Start => start_camera(&mut gate, config, source),
            SessionCommand::Stop => {
                if gate.stop_capture() {
                    println!("Camera released");
                } else {
                    eprintln!("notice: camera is not running");
                }
            }
            SessionCommand::Check => match gate.check_access().await {
                Ok(outcome) => {
                    print_outcome(&outcome);
                    if let Err(e) = session.observe(&outcome).await {
                        eprintln!("notice: {e}");
                    }
                    last = Some(outcome);
                }
                Err(e) => eprintln!("notice: {e}"),
            },
            SessionCommand::Select(index) => match index.and_then(|i| session.select(i)) {
                Some(view) => println!("Switched to {}", view.title()),
                None => eprintln!("notice: no such view"),
            },
            SessionCommand::Show => {
                if let Err(e) = show_view(&api, config, &session, &gate, last.as_ref()).await {
                    eprintln!("notice: {e:#}");
                }
            }
            SessionCommand::Quit => break,
            SessionCommand::Help => println!("{SESSION_HELP}"),
        }
    }

    gate.stop_capture();
    Ok(())
}

async fn show_view(
    api: &ApiClient,
    config: &Config,
    session: &Session,
    gate: &AccessGate,
    last: Option<&AttemptOutcome>,
) -> Result<()> {
    match session.active_view() {
        SessionView::AccessControl => {
            match session.email() {
                Some(email) => println!(
                    "Recognized: {email} ({})",
                    session
                        .level()
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| "level unknown".to_string())
                ),
                None => println!("No one recognized yet"),
            }
            if let Some(outcome) = last {
                print_outcome(outcome);
            }
            if let Some(remaining) = gate.lockout_remaining() {
                println!("Locked for another {}s", remaining.as_secs());
            }
        }
        SessionView::Documents => {
            let email = session.email().context("no recognized identity")?;
            print_documents(api, email).await?;
        }
        SessionView::UserAdmin => run_users(api, UserCommand::List).await?,
        SessionView::Dashboard => {
            print_dashboard(&DashboardSnapshot::fetch(api, config.dashboard_log_limit).await?);
        }
    }
    Ok(())
}
