#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inquire::{InquireError, Select};
use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{Level as TraceLevel, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use rtt_sync::config::HostConfig;
use rtt_sync::consent::{ConsentAnswer, ConsentPrompter, ConsentRequest};
use rtt_sync::constants::config::TICK_INTERVAL_MS;
use rtt_sync::events::SyncEvent;
use rtt_sync::status::blocks_profile;
use rtt_sync::{RttSynchronizer, StatusReportItem, ViewportRegion};

/// Plays the host: feeds viewports and profile lifecycle events to the synchronizer
#[derive(Parser)]
#[command(name = "rtt-sync", version, about = "Keep RTTClient.INI in step with profile viewports")]
struct Cli {
    /// Host profile file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ViewportArgs {
    /// JSON array of viewports: [{"name", "x", "y", "width", "height"}]
    #[arg(long)]
    viewports: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the configuration that would be written
    Generate(ViewportArgs),
    /// Run the ready check; exits with status 1 if the profile could not start
    Check {
        #[command(flatten)]
        viewports: ViewportArgs,
        #[arg(long)]
        json: bool,
    },
    /// Print the full status report
    Status {
        #[command(flatten)]
        viewports: ViewportArgs,
        #[arg(long)]
        json: bool,
    },
    /// Enable generation, asking before taking over a foreign file
    Enable(ViewportArgs),
    /// Disable generation
    Disable,
    /// Start the profile and keep it running until interrupted
    Run {
        #[arg(long)]
        viewports: PathBuf,
    },
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_viewports(path: Option<&Path>) -> Result<Vec<ViewportRegion>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read viewports from {:?}", path))?;
    let regions: Vec<ViewportRegion> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse viewports from {:?}", path))?;
    debug!(count = regions.len(), path = %path.display(), "Loaded viewports");
    Ok(regions)
}

fn print_items(items: &[StatusReportItem], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        for item in items {
            println!("{item}");
        }
    }
    Ok(())
}

/// Interactive takeover question on the terminal
struct TerminalPrompter;

impl ConsentPrompter for TerminalPrompter {
    fn confirm_takeover(&mut self, request: &ConsentRequest) -> ConsentAnswer {
        println!("{}", request.message());
        answer_or_cancel(Select::new("Take ownership?", ConsentAnswer::ALL.to_vec()).prompt())
    }
}

/// Esc, Ctrl-C and a missing terminal all count as cancelling
fn answer_or_cancel(result: Result<ConsentAnswer, InquireError>) -> ConsentAnswer {
    match result {
        Ok(answer) => answer,
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
            ConsentAnswer::Cancel
        }
        Err(e) => {
            warn!(error = %e, "Consent prompt failed, treating as cancel");
            ConsentAnswer::Cancel
        }
    }
}

/// Host session: the loaded profile plus a synchronizer attached to it
struct Session {
    config_path: PathBuf,
    host: HostConfig,
    sync: RttSynchronizer,
    dirty: Rc<Cell<bool>>,
}

impl Session {
    fn open(config_path: PathBuf, viewports: Option<&Path>) -> Result<Self> {
        let host = HostConfig::load(&config_path)?;
        let mut sync = RttSynchronizer::new(host.rtt.clone(), host.install_dir.clone());

        let dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dirty);
        sync.subscribe(move |event| {
            debug!(?event, "Synchronizer event");
            if matches!(event, SyncEvent::StateChanged { .. } | SyncEvent::OptionsChanged(_)) {
                flag.set(true);
            }
        });

        sync.update(&load_viewports(viewports)?);
        sync.on_loaded();
        Ok(Self {
            config_path,
            host,
            sync,
            dirty,
        })
    }

    /// Persist settings if the synchronizer changed them
    fn save_if_changed(&mut self) -> Result<()> {
        if !self.dirty.get() && self.host.rtt == *self.sync.settings() {
            return Ok(());
        }
        self.host.rtt = self.sync.settings().clone();
        self.host.save(&self.config_path)?;
        self.dirty.set(false);
        Ok(())
    }
}

fn file_modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(unix)]
fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    let flag = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&flag))
            .with_context(|| format!("Failed to register handler for signal {signal}"))?;
    }
    Ok(flag)
}

#[cfg(not(unix))]
fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&flag);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
        setter.store(true, Ordering::Relaxed);
    });
    info!("Press Enter to stop the profile");
    Ok(flag)
}

fn run_profile(session: &mut Session, viewports: &Path) -> Result<()> {
    let items = session.sync.on_ready_check();
    print_items(&items, false)?;
    if blocks_profile(&items) {
        session.save_if_changed()?;
        anyhow::bail!("Profile is not ready to run");
    }

    let stop = shutdown_flag()?;
    match session.sync.on_profile_start()? {
        Some(start) => info!(sync = ?start.sync, process = ?start.process, "Profile started"),
        None => info!("Profile started with RTT configuration generation disabled"),
    }

    let mut last_modified = file_modified(viewports);
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(TICK_INTERVAL_MS));

        let modified = file_modified(viewports);
        if modified.is_some() && modified != last_modified {
            last_modified = modified;
            match load_viewports(Some(viewports)) {
                Ok(regions) => session.sync.update(&regions),
                Err(e) => warn!(error = %format!("{e:#}"), "Keeping previous viewports"),
            }
        }
    }

    info!("Stopping profile");
    let stopped = session.sync.on_profile_stop()?;
    info!(decision = ?stopped, "Profile stopped");
    session.save_if_changed()
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(HostConfig::default_path);

    match cli.command {
        Command::Generate(args) => {
            let session = Session::open(config_path, args.viewports.as_deref())?;
            println!("{}", session.sync.config().contents());
        }
        Command::Check { viewports, json } => {
            let mut session = Session::open(config_path, viewports.viewports.as_deref())?;
            let items = session.sync.on_ready_check();
            print_items(&items, json)?;
            session.save_if_changed()?;
            if blocks_profile(&items) {
                std::process::exit(1);
            }
        }
        Command::Status { viewports, json } => {
            let mut session = Session::open(config_path, viewports.viewports.as_deref())?;
            print_items(&session.sync.on_status_report(), json)?;
            session.save_if_changed()?;
        }
        Command::Enable(args) => {
            let mut session = Session::open(config_path, args.viewports.as_deref())?;
            let mut prompter = TerminalPrompter;
            let state = session.sync.on_interactively_enabled(&mut prompter)?;
            println!("RTT configuration generation is {state}");
            session.save_if_changed()?;
        }
        Command::Disable => {
            let mut session = Session::open(config_path, None)?;
            session.sync.set_enabled(false);
            println!("RTT configuration generation is {}", session.sync.state());
            session.save_if_changed()?;
        }
        Command::Run { viewports } => {
            let mut session = Session::open(config_path, Some(&viewports))?;
            if let Err(e) = run_profile(&mut session, &viewports) {
                error!(error = %format!("{e:#}"), "Profile run failed");
                return Err(e);
            }
        }
    }

    Ok(())
}
