//! KeyGuide - USB-MIDI keyboard tutor
//!
//! Plays song and chord lessons against a MIDI keyboard, or against notes
//! typed at the prompt with `--simulate`.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::*;
use crossbeam::channel::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keyguide::cli::{self, ConsoleCommand, HELP};
use keyguide::config::AppConfig;
use keyguide::display::{self, ConsoleDisplay, LessonDisplay};
use keyguide::lesson::{ButtonOutcome, FeedbackKind, NoteOutcome};
use keyguide::library::Library;
use keyguide::monitor;
use keyguide::transport::loopback::LoopbackPipe;
use keyguide::transport::midir_pipe::MidirPipe;
use keyguide::transport::{InPipe, UrbStatus};
use keyguide::{MonotonicClock, Tutor};

/// KeyGuide - learn songs and chords on a USB-MIDI keyboard
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "keyguide.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// List available MIDI input ports
    #[arg(long)]
    list_ports: bool,

    /// List songs and chord packs
    #[arg(long)]
    list: bool,

    /// Print the library listing as JSON
    #[arg(long, requires = "list")]
    json: bool,

    /// Start a song (number or title)
    #[arg(long, conflicts_with = "chords")]
    song: Option<String>,

    /// Start a chord pack (number or name)
    #[arg(long)]
    chords: Option<String>,

    /// Type notes at the prompt instead of playing a keyboard
    #[arg(long)]
    simulate: bool,

    /// Print raw USB-MIDI packets from the keyboard
    #[arg(long, conflicts_with = "simulate")]
    monitor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Pipe backing the tutor: a host MIDI port or typed notes
enum HostPipe {
    Port(MidirPipe),
    Simulated(LoopbackPipe),
}

impl InPipe for HostPipe {
    fn submit_receive(&mut self, endpoint: u8, max_len: usize) {
        match self {
            HostPipe::Port(pipe) => pipe.submit_receive(endpoint, max_len),
            HostPipe::Simulated(pipe) => pipe.submit_receive(endpoint, max_len),
        }
    }

    fn poll_urb(&mut self) -> UrbStatus {
        match self {
            HostPipe::Port(pipe) => pipe.poll_urb(),
            HostPipe::Simulated(pipe) => pipe.poll_urb(),
        }
    }

    fn received(&self) -> &[u8] {
        match self {
            HostPipe::Port(pipe) => pipe.received(),
            HostPipe::Simulated(pipe) => pipe.received(),
        }
    }

    fn clear_stall(&mut self, endpoint: u8) {
        match self {
            HostPipe::Port(pipe) => pipe.clear_stall(endpoint),
            HostPipe::Simulated(pipe) => pipe.clear_stall(endpoint),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.log_format)?;

    let config = AppConfig::load_or_default(&args.config).await?;
    debug!("Configuration: {:?}", config.timing);

    if args.list_ports {
        monitor::list_ports_formatted(&config.midi.client_name);
        return Ok(());
    }

    if args.monitor {
        return monitor::run_monitor(&config).await;
    }

    let library = Library::from_config(&config)?;
    if library.is_empty() {
        warn!("Library is empty: set builtin_library or add songs to the config");
    }

    if args.list {
        return print_library(&library, args.json);
    }

    info!("Starting KeyGuide v{}...", env!("CARGO_PKG_VERSION"));
    run_tutor(&args, &config, &library, shutdown_signal()).await?;

    info!("KeyGuide shutdown complete");
    Ok(())
}

async fn run_tutor(
    args: &Args,
    config: &AppConfig,
    library: &Library,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let mut display = ConsoleDisplay::new();

    let pipe = if args.simulate {
        info!("Simulation mode: type notes at the prompt");
        HostPipe::Simulated(LoopbackPipe::new())
    } else {
        HostPipe::Port(MidirPipe::new(
            &config.midi.client_name,
            config.midi.input_port.clone(),
        ))
    };
    let interfaces = match &pipe {
        HostPipe::Port(port) => port.interfaces(),
        HostPipe::Simulated(loopback) => loopback.interfaces(),
    };
    let mut tutor = Tutor::new(pipe, &interfaces, config.timing.feedback_ms)
        .context("No MIDI streaming endpoint")?;

    if !args.simulate {
        check_keyboard(&mut tutor, &mut display);
    }

    let clock = MonotonicClock::new();
    if let Some(selector) = &args.song {
        start_song(&mut tutor, library, selector, clock.now_ms(), &mut display);
    } else if let Some(selector) = &args.chords {
        start_chords(&mut tutor, library, selector, clock.now_ms(), &mut display);
    } else {
        print_library(library, false)?;
        display::refresh(&mut display, tutor.engine());
    }

    let commands = cli::spawn_input("keyguide> ", args.simulate)?;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.timing.tick_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut port_check =
        tokio::time::interval(Duration::from_millis(config.timing.port_check_ms));
    port_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!("Ready, waiting for notes");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = clock.now_ms();

                // Console input first, so typed notes land in this tick's poll
                let flow = drain_commands(&commands, &mut tutor, library, now, &mut display);
                let redraw = match flow {
                    Flow::Continue(changed) => changed,
                    Flow::Quit => break,
                };

                let report = tutor.tick(now);
                for (pitch, outcome) in &report.notes {
                    display.show_note(*pitch, outcome);
                    match outcome {
                        NoteOutcome::Hit { .. } => {
                            display.set_indicator(FeedbackKind::Correct, true)
                        }
                        NoteOutcome::Miss => {
                            display.set_indicator(FeedbackKind::Incorrect, true)
                        }
                        NoteOutcome::Ignored => {}
                    }
                }
                for kind in &report.expired {
                    display.set_indicator(*kind, false);
                }

                if redraw || report.changed() {
                    display::refresh(&mut display, tutor.engine());
                }
            }

            _ = port_check.tick(), if !args.simulate => {
                check_keyboard(&mut tutor, &mut display);
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping tutor loop");
                break;
            }
        }
    }

    let stats = tutor.transport().stats();
    debug!(
        "Transport: {} transfers, {} packets, {} dropped, {} stalls, {} errors",
        stats.transfers,
        stats.records_enqueued,
        stats.records_dropped,
        stats.stalls_cleared,
        stats.errors
    );
    Ok(())
}

enum Flow {
    /// Keep running; `true` when the lesson view changed
    Continue(bool),
    Quit,
}

fn drain_commands(
    commands: &Receiver<ConsoleCommand>,
    tutor: &mut Tutor<HostPipe>,
    library: &Library,
    now: u64,
    display: &mut ConsoleDisplay,
) -> Flow {
    let mut changed = false;
    loop {
        let command = match commands.try_recv() {
            Ok(command) => command,
            Err(TryRecvError::Empty) => return Flow::Continue(changed),
            Err(TryRecvError::Disconnected) => return Flow::Quit,
        };

        match command {
            ConsoleCommand::Press(button) => {
                let outcome = tutor.press(button, now);
                debug!("Button {:?}: {:?}", button, outcome);
                if outcome == ButtonOutcome::Ignored {
                    println!("{}", "No lesson running (try 'list', then 'song 1')".dimmed());
                }
                changed = true;
            }
            ConsoleCommand::Play(pitches) => {
                if let HostPipe::Simulated(pipe) = tutor.transport_mut().pipe_mut() {
                    let messages: Vec<[u8; 3]> = pitches.iter().map(|&p| [0x90, p, 100]).collect();
                    pipe.send_messages(&messages);
                }
            }
            ConsoleCommand::StartSong(selector) => {
                start_song(tutor, library, &selector, now, display);
            }
            ConsoleCommand::StartChords(selector) => {
                start_chords(tutor, library, &selector, now, display);
            }
            ConsoleCommand::List => {
                if let Err(e) = print_library(library, false) {
                    warn!("Failed to print library: {}", e);
                }
            }
            ConsoleCommand::Status => print_status(tutor),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => return Flow::Quit,
        }
    }
}

fn start_song(
    tutor: &mut Tutor<HostPipe>,
    library: &Library,
    selector: &str,
    now: u64,
    display: &mut ConsoleDisplay,
) {
    let Some(song) = library.find_song(selector) else {
        warn!("No song matching '{}'", selector);
        return;
    };
    match tutor.engine_mut().start_song(song, now) {
        Ok(()) => display::refresh(display, tutor.engine()),
        Err(e) => warn!("Cannot start '{}': {}", song.title, e),
    }
}

fn start_chords(
    tutor: &mut Tutor<HostPipe>,
    library: &Library,
    selector: &str,
    now: u64,
    display: &mut ConsoleDisplay,
) {
    let Some(pack) = library.find_chord_pack(selector) else {
        warn!("No chord pack matching '{}'", selector);
        return;
    };
    match tutor.engine_mut().start_chord_exercise(pack, now) {
        Ok(()) => display::refresh(display, tutor.engine()),
        Err(e) => warn!("Cannot start '{}': {}", pack.name, e),
    }
}

/// Detect keyboard removal and (re)attachment on the host port
fn check_keyboard(tutor: &mut Tutor<HostPipe>, display: &mut ConsoleDisplay) {
    let HostPipe::Port(pipe) = tutor.transport_mut().pipe_mut() else {
        return;
    };

    if pipe.is_connected() {
        if pipe.is_port_present() {
            return;
        }
        warn!("⚠️  Keyboard disconnected");
        pipe.disconnect();
        tutor.device_detached();
        display.show_message(["Keyboard lost", "Waiting..."]);
        return;
    }

    if !pipe.is_port_available() {
        tutor.device_detached();
        return;
    }
    if let Err(e) = pipe.connect() {
        warn!("Failed to open keyboard port: {}", e);
        tutor.device_detached();
        return;
    }
    let interfaces = pipe.interfaces();
    match tutor.device_attached(&interfaces) {
        Ok(()) => display::refresh(display, tutor.engine()),
        Err(e) => warn!("Keyboard has no usable MIDI endpoint: {}", e),
    }
}

fn print_status(tutor: &Tutor<HostPipe>) {
    let transport = tutor.transport();
    let stats = transport.stats();
    println!("\n{}", "=== Transport ===".bold().cyan());
    println!("  State:     {:?}", transport.state());
    println!("  Endpoint:  0x{:02X}", transport.endpoint().address);
    println!("  Transfers: {}", stats.transfers.to_string().green());
    println!("  Packets:   {}", stats.records_enqueued.to_string().green());
    println!("  Dropped:   {}", stats.records_dropped.to_string().yellow());
    println!("  Stalls:    {}", stats.stalls_cleared);
    println!("  Errors:    {}", stats.errors.to_string().red());
}

fn print_library(library: &Library, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(library).context("Failed to serialize library")?
        );
        return Ok(());
    }

    println!("\n{}", "=== Songs ===".bold().cyan());
    if library.songs.is_empty() {
        println!("  {}", "No songs".dimmed());
    }
    for (index, song) in library.songs.iter().enumerate() {
        println!(
            "  {} {} {}",
            format!("{}.", index + 1).green(),
            song.title.bright_white(),
            format!("({} steps)", song.steps.len()).dimmed()
        );
    }

    println!("\n{}", "=== Chord packs ===".bold().cyan());
    if library.chord_packs.is_empty() {
        println!("  {}", "No chord packs".dimmed());
    }
    for (index, pack) in library.chord_packs.iter().enumerate() {
        let names: Vec<&str> = pack.chords.iter().map(|c| c.name.as_str()).collect();
        println!(
            "  {} {} {}",
            format!("{}.", index + 1).green(),
            pack.name.bright_white(),
            names.join(" ").dimmed()
        );
    }
    println!();
    Ok(())
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init(),
    }

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
