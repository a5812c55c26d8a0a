//! Line-oriented terminal surface: turns stdin lines into engine events and
//! renders what the engine produced.

use sle_exam_core::Event;
use sle_exam_core::labels;
use sle_exam_core::phase::{EXAM_PARTS, ExamPhase, Language};
use sle_exam_core::results::ExamResults;
use sle_exam_core::session_state::ExamSession;
use sle_exam_core::timer::format_time;
use sle_exam_core::transcript::{ChatMessage, Role};

pub const HELP: &str = "Commands: start | r (record on/off) | n (next part) | p (pause) | reset | status | q\nAny other line is sent to the coach as a typed answer.";

/// One parsed line of user input.
#[derive(Debug, PartialEq)]
pub enum Input {
    Event(Event),
    Status,
    Help,
    Quit,
}

pub fn parse_line(line: &str) -> Option<Input> {
    let line = line.trim();
    let input = match line.to_lowercase().as_str() {
        "" => return None,
        "start" => Input::Event(Event::Start),
        "r" | "rec" | "record" => Input::Event(Event::ToggleRecording),
        "n" | "next" => Input::Event(Event::Advance),
        "p" | "pause" => Input::Event(Event::TogglePause),
        "reset" => Input::Event(Event::Reset),
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "q" | "quit" | "exit" => Input::Quit,
        _ => Input::Event(Event::SubmitText(line.to_string())),
    };
    Some(input)
}

pub fn render_turn(turn: &ChatMessage, coach_name: &str) -> String {
    let speaker = match turn.role {
        Role::User => "You",
        Role::Assistant => coach_name,
    };
    format!("[{}] {}: {}", turn.timestamp.format("%H:%M:%S"), speaker, turn.content)
}

pub fn render_phase(phase: ExamPhase, remaining: u32, language: Language) -> String {
    match phase.part_number() {
        Some(n) => format!(
            "== {} [{}/{}] ({}) ==",
            labels::phase_title(phase, language),
            n,
            EXAM_PARTS.len(),
            format_time(remaining)
        ),
        None => format!("== {} ==", labels::phase_title(phase, language)),
    }
}

pub fn render_status(session: &ExamSession) -> String {
    let config = session.config();
    let mut flags = Vec::new();
    if session.is_paused() {
        flags.push("paused");
    }
    if session.is_recording() {
        flags.push("recording");
    }
    if session.is_processing() {
        flags.push("waiting for coach");
    }
    if session.is_coach_speaking() {
        flags.push("coach speaking");
    }
    format!(
        "{} | level {} | coach {} | {} left{}",
        session.phase(),
        config.level.as_str(),
        config.coach.display_name(),
        format_time(session.remaining_secs()),
        if flags.is_empty() {
            String::new()
        } else {
            format!(" | {}", flags.join(", "))
        }
    )
}

pub fn render_results(results: &ExamResults, passed: bool, language: Language) -> String {
    let mut out = vec![
        format!(
            "Overall level: {} ({}%) - {}",
            results.overall_level,
            results.overall_score,
            labels::verdict(passed, language)
        ),
        format!("Total time: {}", format_time(results.total_duration as u32)),
    ];
    for phase in &results.phases {
        out.push(format!(
            "  {}: {}% ({})",
            labels::phase_title(phase.phase, language),
            phase.score,
            format_time(phase.duration as u32)
        ));
    }
    let c = &results.average_criteria;
    out.push(format!(
        "  fluency {} | comprehension {} | vocabulary {} | grammar {} | pronunciation {}",
        c.fluency, c.comprehension, c.vocabulary, c.grammar, c.pronunciation
    ));
    out.push("Strengths:".to_string());
    out.extend(results.strengths.iter().map(|s| format!("  + {s}")));
    out.push("To improve:".to_string());
    out.extend(results.improvements.iter().map(|s| format!("  - {s}")));
    out.push(results.recommendation.clone());
    out.join("\n")
}

/// Tracks what has already been printed so each refresh only shows changes.
pub struct Screen {
    printed_turns: usize,
    phase: ExamPhase,
    results_shown: bool,
}

impl Screen {
    pub fn new() -> Self {
        Self {
            printed_turns: 0,
            phase: ExamPhase::Setup,
            results_shown: false,
        }
    }

    pub fn refresh(&mut self, session: &ExamSession) -> Vec<String> {
        let language = session.config().language;
        let mut lines = Vec::new();

        // A shorter transcript means the exam was reset.
        if session.transcript().len() < self.printed_turns {
            self.printed_turns = 0;
            self.results_shown = false;
        }
        if session.phase() != self.phase {
            self.phase = session.phase();
            lines.push(render_phase(self.phase, session.remaining_secs(), language));
        }
        let coach = session.config().coach.display_name();
        for turn in session.transcript().since(self.printed_turns) {
            lines.push(render_turn(turn, coach));
        }
        self.printed_turns = session.transcript().len();

        if !self.results_shown {
            if let (Some(results), Some(passed)) = (session.exam_results(), session.passed()) {
                lines.push(render_results(results, passed, language));
                self.results_shown = true;
            }
        }
        lines
    }
}
