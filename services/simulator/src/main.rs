mod config;
mod console;

use crate::config::{BackendKind, Config};
use crate::console::{HELP, Input, Screen};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use sle_exam_core::Event;
use sle_exam_core::audio::{Playback, SilentPlayback};
use sle_exam_core::backend::{ExamBackend, HttpBackend};
use sle_exam_core::effects::EffectRunner;
use sle_exam_core::offline::OfflineBackend;
use sle_exam_core::phase::{CoachKey, ExamConfig, ExamLevel, Language};
use sle_exam_core::session_state::ExamSession;
use sle_native_utils::capture::Microphone;
use sle_native_utils::playback::SpeakerPlayback;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::fmt::time::ChronoLocal;

/// How often the input level meter is sampled while recording.
const METER_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Parser)]
#[command(version, about = "SLE oral exam simulator")]
struct Cli {
    /// Target level: B or C
    #[arg(long, default_value = "B", value_parser = parse_level)]
    level: ExamLevel,
    /// Coach persona: STEVEN (French) or PRECIOSA (English)
    #[arg(long, default_value = "STEVEN", value_parser = parse_coach)]
    coach: CoachKey,
    /// Exam language, fr or en. Defaults to the coach's language
    #[arg(long, value_parser = parse_language)]
    language: Option<Language>,
    /// Name of the microphone to record from
    #[arg(long)]
    input_device: Option<String>,
    /// Name of the speaker to play coach audio on
    #[arg(long)]
    output_device: Option<String>,
    /// Use the built-in offline coach instead of the HTTP backend
    #[arg(long)]
    offline: bool,
    /// Print the available audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn parse_level(s: &str) -> Result<ExamLevel, String> {
    match s.to_uppercase().as_str() {
        "B" => Ok(ExamLevel::B),
        "C" => Ok(ExamLevel::C),
        _ => Err(format!("unknown level '{s}', expected B or C")),
    }
}

fn parse_coach(s: &str) -> Result<CoachKey, String> {
    match s.to_uppercase().as_str() {
        "STEVEN" => Ok(CoachKey::Steven),
        "PRECIOSA" => Ok(CoachKey::Preciosa),
        _ => Err(format!("unknown coach '{s}', expected STEVEN or PRECIOSA")),
    }
}

fn parse_language(s: &str) -> Result<Language, String> {
    match s.to_lowercase().as_str() {
        "fr" => Ok(Language::Fr),
        "en" => Ok(Language::En),
        _ => Err(format!("unknown language '{s}', expected fr or en")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 2. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load application configuration")?;
    if args.offline {
        config = config.offline();
    }
    config
        .validate()
        .context("Failed to load application configuration")?;

    // --- 3. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    if args.list_devices {
        println!("Input devices:\n{}", sle_native_utils::device::get_available_inputs()?);
        println!("Output devices:\n{}", sle_native_utils::device::get_available_outputs()?);
        return Ok(());
    }

    let exam_config = ExamConfig {
        level: args.level,
        coach: args.coach,
        language: args.language.unwrap_or(args.coach.language()),
    };
    tracing::info!(
        "Configuration loaded successfully. Level {} with {} ({})",
        exam_config.level.as_str(),
        exam_config.coach.display_name(),
        exam_config.language.code()
    );

    // --- 4. Initialize Backend ---
    let backend: Arc<dyn ExamBackend> = match config.backend {
        BackendKind::Http => {
            let mut builder = HttpBackend::builder().with_base_url(&config.api_url);
            if let Some(token) = config.api_token.clone() {
                builder = builder.with_token(token);
            }
            let backend = builder.build();
            tracing::info!("Using exam backend at {}", backend.base_url());
            Arc::new(backend)
        }
        BackendKind::Offline => {
            tracing::info!("Using offline coach");
            Arc::new(OfflineBackend::new(exam_config.language))
        }
    };

    // --- 5. Initialize Audio Devices ---
    let capture = Box::new(Microphone::new(args.input_device));
    // The guard owns the output stream and must outlive the event loop.
    let (player, _output_guard) = match SpeakerPlayback::open(args.output_device) {
        Ok((player, guard)) => (Arc::new(player) as Arc<dyn Playback>, Some(guard)),
        Err(e) => {
            tracing::warn!("No speaker available, coach audio is muted: {:?}", e);
            (Arc::new(SilentPlayback) as Arc<dyn Playback>, None)
        }
    };

    // --- 6. Wire the Engine ---
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let (mut runner, rpc_lane) = EffectRunner::new(backend, capture, player, event_tx);
    let mut session = ExamSession::new(exam_config);
    let mut screen = Screen::new();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut clock = tokio::time::interval(Duration::from_secs(1));
    let mut meter = tokio::time::interval(METER_INTERVAL);
    meter.set_missed_tick_behavior(MissedTickBehavior::Skip);

    println!("{HELP}");

    // --- 7. Run the Event Loop ---
    loop {
        let event = tokio::select! {
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) => match console::parse_line(&line) {
                    Some(Input::Event(event)) => event,
                    Some(Input::Status) => {
                        println!("{}", console::render_status(&session));
                        continue;
                    }
                    Some(Input::Help) => {
                        println!("{HELP}");
                        continue;
                    }
                    Some(Input::Quit) => break,
                    None => continue,
                },
                None => break,
            },
            _ = clock.tick() => Event::Tick,
            _ = meter.tick() => match runner.input_level() {
                Some(level) => Event::InputLevel(level),
                None => continue,
            },
            Some(event) = event_rx.recv() => event,
            _ = tokio::signal::ctrl_c() => break,
        };

        if !matches!(event, Event::Tick | Event::InputLevel(_)) {
            tracing::debug!("Handling event: {}", event.name());
        }
        for command in session.handle(event, Utc::now()) {
            runner.dispatch(command);
        }
        for line in screen.refresh(&session) {
            println!("{line}");
        }
    }

    tracing::info!("Shutting down");
    runner.shutdown();
    rpc_lane.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_values_case_insensitively() {
        assert_eq!(parse_level("c"), Ok(ExamLevel::C));
        assert_eq!(parse_coach("Preciosa"), Ok(CoachKey::Preciosa));
        assert_eq!(parse_language("FR"), Ok(Language::Fr));
        assert!(parse_level("A").is_err());
    }

    #[test]
    fn language_defaults_to_coach() {
        let args = Cli::parse_from(["sle-simulator", "--coach", "PRECIOSA", "--offline"]);
        assert!(args.offline);
        assert_eq!(args.language.unwrap_or(args.coach.language()), Language::En);
        assert_eq!(args.level, ExamLevel::B);
    }
}
