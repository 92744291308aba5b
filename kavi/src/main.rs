//! kavi - voice assistant console
//!
//! Reads one utterance per line from stdin (or a single `--command`), runs it
//! through the assistant pipeline, and prints what would be spoken and what
//! the device was asked to do.
//!
//! Lines starting with `:` are console commands:
//! - `:summary` - conversation memory
//! - `:insight` - habit analysis over recent commands
//! - `:feeling <label>` - reply to a detected mood
//! - `:quit`
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/kavi/kavi.db (~/.local/share/kavi/kavi.db)
//! - Logs: $XDG_STATE_HOME/kavi/kavi.log (~/.local/state/kavi/kavi.log)
//! - Config: $XDG_CONFIG_HOME/kavi/config.toml (~/.config/kavi/config.toml)

mod console;

use anyhow::{Context, Result};
use clap::Parser;
use console::ConsoleRenderer;
use kavi_core::proactive::{ProactiveEngine, ProactiveMonitor};
use kavi_core::security::{create_default_analyzer, DeviceSnapshot, SecurityReporter};
use kavi_core::voice::{Speaker, VoiceQueue};
use kavi_core::{
    ActionDispatcher, Assistant, Clock, Config, Database, Platform, SimulatedDevice, SystemClock,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "kavi")]
#[command(about = "Talk to the Kavi assistant from a terminal")]
#[command(version)]
struct Args {
    /// Process a single utterance and exit
    #[arg(short, long)]
    command: Option<String>,

    /// Run the proactive monitor alongside the conversation
    #[arg(long)]
    proactive: bool,

    /// Device snapshot (JSON) answering voice-triggered security checks
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the classified intent and parameters of every utterance
    #[arg(short, long)]
    verbose: bool,
}

type Console = VoiceQueue<ConsoleRenderer>;

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        kavi_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("kavi starting");

    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    let db = Arc::new(db);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let voice: Arc<Console> = Arc::new(VoiceQueue::new(ConsoleRenderer));
    let device = Arc::new(SimulatedDevice::new());
    let seed = config.assistant.rng_seed;

    let mut dispatcher =
        ActionDispatcher::new(Platform::single(device.clone()), voice.clone(), clock.clone(), seed);
    if let Some(path) = &args.snapshot {
        let snapshot = DeviceSnapshot::load(path)
            .with_context(|| format!("failed to load device snapshot {}", path.display()))?;
        let analyzer = create_default_analyzer(&config.security, &config.assistant.self_package)
            .with_clock(clock.clone());
        dispatcher = dispatcher.with_security(
            SecurityReporter::new(analyzer, Arc::new(snapshot), voice.clone())
                .with_report_log(db.clone()),
        );
    }

    let mut assistant = Assistant::new(&config, db.clone(), clock.clone(), voice.clone(), dispatcher);

    if let Some(command) = &args.command {
        run_turn(&mut assistant, &voice, &device, command, args.verbose);
        finish_background(&assistant, &voice);
        tracing::info!("kavi finished single command");
        return Ok(());
    }

    // The monitor needs a runtime; the conversation itself stays synchronous
    let monitor = if args.proactive || config.proactive.enabled {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .context("failed to create async runtime")?;
        let engine = Arc::new(ProactiveEngine::new(
            db.clone(),
            clock.clone(),
            config.proactive.cooldown(),
            seed,
        ));
        let speaker: Arc<dyn Speaker> = voice.clone();
        let monitor = {
            let _enter = runtime.enter();
            ProactiveMonitor::start(engine, speaker, config.proactive.tick())
        };
        println!("Proactive messages: on");
        Some((runtime, monitor))
    } else {
        None
    };

    let result = run_repl(&mut assistant, &voice, &device, args.verbose);
    finish_background(&assistant, &voice);

    if let Some((runtime, monitor)) = monitor {
        runtime.block_on(monitor.stop());
    }
    tracing::info!("kavi shutting down");

    result
}

/// Let a running security scan finish speaking before exit.
fn finish_background(assistant: &Assistant, voice: &Console) {
    if let Some(report) = assistant.wait_for_security_scan() {
        tracing::info!(level = %report.threat_level, score = report.total_score, "Security scan finished");
    }
    voice.drain();
}

/// Read stdin on a helper thread so Ctrl-C is noticed between lines.
fn run_repl(
    assistant: &mut Assistant,
    voice: &Console,
    device: &SimulatedDevice,
    verbose: bool,
) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl-C handler")?;

    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    });

    while running.load(Ordering::SeqCst) {
        let line = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => line,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // Let proactive messages finish printing
                voice.drain();
                continue;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        let line = line.trim();
        if let Some(console_command) = line.strip_prefix(':') {
            if !run_console_command(assistant, voice, console_command) {
                break;
            }
            continue;
        }
        run_turn(assistant, voice, device, line, verbose);
    }

    Ok(())
}

fn run_turn(
    assistant: &mut Assistant,
    voice: &Console,
    device: &SimulatedDevice,
    utterance: &str,
    verbose: bool,
) {
    let Some(turn) = assistant.process(utterance) else {
        return;
    };
    voice.drain();

    if verbose {
        let params = turn
            .result
            .parameters
            .iter()
            .map(|(k, v)| format!("{}={:?}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  intent: {} ({:.2}) {{{}}} frequency={}",
            turn.result.intent, turn.result.confidence, params, turn.frequency
        );
    }
    for effect in device.take_effects() {
        println!("  -> {}", effect);
    }
}

/// Returns false when the console should exit.
fn run_console_command(assistant: &Assistant, voice: &Console, command: &str) -> bool {
    let (name, rest) = command
        .split_once(' ')
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));

    match name {
        "quit" | "exit" => return false,
        "summary" => println!("{}", assistant.context().summary()),
        "insight" => match assistant.insight() {
            Some(insight) => println!("{}", insight),
            None => println!("Nothing unusual."),
        },
        "feeling" => {
            let (text, emotion) = assistant.personality().respond_to_emotion(rest);
            voice.speak(&text, emotion);
            voice.drain();
        }
        other => println!("Unknown console command: {}", other),
    }
    true
}
