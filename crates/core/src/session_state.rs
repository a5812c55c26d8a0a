use crate::{
    Command, Event, MOCK_EXAM_MODE, ReplyKind,
    audio::CapturedAudio,
    backend::{SessionFeedback, SessionId, SessionStart},
    labels,
    phase::{ExamConfig, ExamPhase},
    results::{ExamResults, PhaseResult},
    scoring::{PhaseScorer, SyntheticScorer},
    timer::{CountdownTimer, TimerOutcome},
    transcript::Transcript,
};
use chrono::{DateTime, Utc};

/// One attempt at the mock oral exam.
///
/// All state lives here and changes only through [`ExamSession::handle`],
/// which returns the side effects to perform instead of performing them.
/// Nothing is persisted; the backend is the system of record.
pub struct ExamSession {
    config: ExamConfig,
    phase: ExamPhase,
    phase_started_at: Option<DateTime<Utc>>,
    timer: CountdownTimer,
    paused: bool,
    transcript: Transcript,
    session_id: Option<SessionId>,
    phase_results: Vec<PhaseResult>,
    exam_results: Option<ExamResults>,
    starting: bool,
    processing: bool,
    recording: bool,
    coach_speaking: bool,
    ending: bool,
    audio_level: f32,
    scorer: Box<dyn PhaseScorer>,
}

impl ExamSession {
    /// A session scored by the synthetic placeholder scorer.
    pub fn new(config: ExamConfig) -> Self {
        Self::with_scorer(config, Box::new(SyntheticScorer::new()))
    }

    pub fn with_scorer(config: ExamConfig, scorer: Box<dyn PhaseScorer>) -> Self {
        Self {
            config,
            phase: ExamPhase::Setup,
            phase_started_at: None,
            timer: CountdownTimer::stopped(),
            paused: false,
            transcript: Transcript::new(),
            session_id: None,
            phase_results: vec![],
            exam_results: None,
            starting: false,
            processing: false,
            recording: false,
            coach_speaking: false,
            ending: false,
            audio_level: 0.0,
            scorer,
        }
    }

    /// Changes the exam configuration. Only allowed before the exam starts.
    pub fn configure(&mut self, config: ExamConfig) -> bool {
        if self.phase != ExamPhase::Setup || self.starting {
            return false;
        }
        self.config = config;
        true
    }

    pub fn handle(&mut self, event: Event, now: DateTime<Utc>) -> Vec<Command> {
        if event != Event::Tick && !matches!(event, Event::InputLevel(_)) {
            tracing::debug!("Event {} in {}", event.name(), self.phase);
        }
        match event {
            Event::Start => self.start(),
            Event::SessionStarted(start) => self.session_started(start, now),
            Event::SessionStartFailed(error) => {
                if self.starting {
                    self.starting = false;
                    tracing::error!("Failed to start exam session: {}", error);
                }
                vec![]
            }
            Event::Tick => self.tick(now),
            Event::TogglePause => {
                if self.phase.is_timed() && !self.ending {
                    self.paused = !self.paused;
                    if self.paused {
                        self.timer.pause();
                    } else {
                        self.timer.resume();
                    }
                    tracing::info!(
                        "Exam {} with {}s left",
                        if self.paused { "paused" } else { "resumed" },
                        self.timer.remaining()
                    );
                }
                vec![]
            }
            Event::Advance => self.advance(now),
            Event::ToggleRecording => {
                if self.recording {
                    vec![Command::StopCapture]
                } else if self.can_record() {
                    vec![Command::StartCapture]
                } else {
                    tracing::debug!("Recording not available right now");
                    vec![]
                }
            }
            Event::RecordingStarted => {
                self.recording = true;
                vec![]
            }
            Event::RecordingFailed(error) => {
                self.recording = false;
                self.audio_level = 0.0;
                tracing::warn!("Could not start recording: {}", error);
                vec![]
            }
            Event::RecordingStopped(audio) => self.recording_stopped(audio),
            Event::InputLevel(level) => {
                if self.recording {
                    self.audio_level = level.clamp(0.0, 1.0);
                }
                vec![]
            }
            Event::Transcribed(text) => {
                if !self.processing {
                    tracing::debug!("Dropping transcription with no recording in flight");
                    return vec![];
                }
                if !self.accepts_turns() {
                    self.processing = false;
                    tracing::debug!("Dropping transcription that arrived after the part closed");
                    return vec![];
                }
                let text = text.trim();
                if text.is_empty() {
                    self.processing = false;
                    return vec![];
                }
                self.send_user_turn(text.to_string(), now)
            }
            Event::TranscriptionFailed(error) => {
                self.processing = false;
                tracing::warn!("Failed to process recording: {}", error);
                vec![]
            }
            Event::SubmitText(text) => self.submit_text(text, now),
            Event::ReplyReceived {
                session_id,
                kind,
                reply,
            } => {
                if !self.is_current(&session_id) {
                    tracing::debug!("Ignoring reply for stale session {}", session_id);
                    return vec![];
                }
                if kind == ReplyKind::Turn {
                    self.processing = false;
                }
                let audio_url = reply.audio().map(str::to_string);
                self.transcript
                    .push_assistant(reply.text().to_string(), audio_url.clone(), now);
                match audio_url {
                    Some(url) => {
                        self.coach_speaking = true;
                        vec![Command::PlayAudio(url)]
                    }
                    None => vec![],
                }
            }
            Event::ReplyFailed {
                session_id,
                kind,
                error,
            } => {
                if !self.is_current(&session_id) {
                    return vec![];
                }
                if kind == ReplyKind::Turn {
                    self.processing = false;
                    tracing::error!("Failed to send message: {}", error);
                } else {
                    tracing::error!("Phase transition error: {}", error);
                }
                vec![]
            }
            Event::SessionEnded {
                session_id,
                feedback,
            } => {
                if self.ending && self.is_current(&session_id) {
                    self.conclude(feedback);
                }
                vec![]
            }
            Event::SessionEndFailed { session_id, error } => {
                if self.ending && self.is_current(&session_id) {
                    tracing::error!("Failed to end session: {}", error);
                    self.conclude(None);
                }
                vec![]
            }
            Event::PlaybackFinished => {
                self.coach_speaking = false;
                vec![]
            }
            Event::Reset => self.reset(),
        }
    }

    fn start(&mut self) -> Vec<Command> {
        if self.phase != ExamPhase::Setup || self.starting {
            return vec![];
        }
        self.starting = true;
        tracing::info!(
            "Starting exam: level {}, {}",
            self.config.level.as_str(),
            self.config.coach.display_name()
        );
        vec![Command::StartSession {
            coach: self.config.coach,
            level: self.config.level,
            mode: MOCK_EXAM_MODE.to_string(),
        }]
    }

    fn session_started(&mut self, start: SessionStart, now: DateTime<Utc>) -> Vec<Command> {
        if !self.starting || self.phase != ExamPhase::Setup {
            tracing::warn!("Ignoring unexpected session {}", start.session_id);
            return vec![];
        }
        self.starting = false;
        tracing::info!("Session {} started", start.session_id);
        self.session_id = Some(start.session_id);

        let greeting = start
            .greeting
            .filter(|g| !g.trim().is_empty())
            .unwrap_or_else(|| labels::fallback_greeting(self.config.language).to_string());
        self.transcript.push_assistant(greeting, None, now);

        self.enter_part(ExamPhase::Part1, now)
    }

    /// Makes `part` current and restarts the clock for it.
    fn enter_part(&mut self, part: ExamPhase, now: DateTime<Utc>) -> Vec<Command> {
        let Some(secs) = part.duration_secs() else {
            return vec![];
        };
        self.phase = part;
        self.phase_started_at = Some(now);
        tracing::info!(
            "{} ({}s)",
            labels::phase_title(part, self.config.language),
            secs
        );
        match self.timer.reset(secs) {
            TimerOutcome::Expired => self.advance(now),
            _ => {
                // A pause carries over into the next part.
                if self.paused {
                    self.timer.pause();
                }
                vec![]
            }
        }
    }

    fn tick(&mut self, now: DateTime<Utc>) -> Vec<Command> {
        if !self.phase.is_timed() || self.paused || self.ending {
            return vec![];
        }
        match self.timer.tick() {
            TimerOutcome::Expired => {
                tracing::info!("Time is up for {}", self.phase);
                self.advance(now)
            }
            _ => vec![],
        }
    }

    fn advance(&mut self, now: DateTime<Utc>) -> Vec<Command> {
        let completed = self.phase;
        if !completed.is_timed() || self.ending {
            return vec![];
        }

        let duration = self.elapsed_secs(now);
        let scores = self.scorer.score(completed);
        self.phase_results.push(PhaseResult {
            phase: completed,
            score: scores.score,
            criteria: scores.criteria,
            feedback: String::new(),
            duration,
        });
        tracing::info!(
            "Completed {} after {}s (score {})",
            completed,
            duration,
            scores.score
        );

        match completed.next() {
            Some(next) if next.is_timed() => {
                let mut commands = vec![];
                if let Some(session_id) = self.session_id.clone() {
                    commands.push(Command::SendMessage {
                        session_id,
                        message: format!("[EXAM_PHASE_TRANSITION: {next}]"),
                        exam_part: next,
                        kind: ReplyKind::PhaseTransition,
                    });
                }
                commands.extend(self.enter_part(next, now));
                commands
            }
            _ => self.finish_parts(),
        }
    }

    /// All four parts are done: stop the clock and close the session.
    fn finish_parts(&mut self) -> Vec<Command> {
        self.timer.stop();
        self.paused = false;
        let mut commands = vec![];
        if self.recording {
            commands.push(Command::StopCapture);
        }
        match self.session_id.clone() {
            Some(session_id) => {
                self.ending = true;
                commands.push(Command::EndSession { session_id });
            }
            None => self.conclude(None),
        }
        commands
    }

    fn conclude(&mut self, feedback: Option<SessionFeedback>) {
        let results = ExamResults::aggregate(
            self.phase_results.clone(),
            feedback,
            self.config.language,
        );
        tracing::info!(
            "Exam complete: level {}, score {}",
            results.overall_level,
            results.overall_score
        );
        self.exam_results = Some(results);
        self.ending = false;
        self.phase = ExamPhase::Feedback;
        self.phase_started_at = None;
    }

    fn recording_stopped(&mut self, audio: CapturedAudio) -> Vec<Command> {
        self.recording = false;
        self.audio_level = 0.0;
        if audio.is_empty() {
            tracing::debug!("Recording stopped with no audio captured");
            return vec![];
        }
        if !self.accepts_turns() {
            tracing::debug!("Discarding recording captured outside an exam part");
            return vec![];
        }
        self.processing = true;
        tracing::debug!("Transcribing {:.1}s of audio", audio.duration_secs());
        vec![Command::Transcribe {
            audio,
            language: self.config.language,
        }]
    }

    fn submit_text(&mut self, text: String, now: DateTime<Utc>) -> Vec<Command> {
        let text = text.trim();
        if text.is_empty() || self.processing || !self.accepts_turns() {
            tracing::debug!("Ignoring typed turn");
            return vec![];
        }
        self.processing = true;
        self.send_user_turn(text.to_string(), now)
    }

    fn send_user_turn(&mut self, text: String, now: DateTime<Utc>) -> Vec<Command> {
        let Some(session_id) = self.session_id.clone() else {
            self.processing = false;
            return vec![];
        };
        tracing::info!("User said: \"{}\"", text);
        self.transcript.push_user(text.clone(), now);
        vec![Command::SendMessage {
            session_id,
            message: text,
            exam_part: self.phase,
            kind: ReplyKind::Turn,
        }]
    }

    fn reset(&mut self) -> Vec<Command> {
        let mut commands = vec![];
        if self.recording {
            commands.push(Command::StopCapture);
        }
        if self.coach_speaking {
            commands.push(Command::StopPlayback);
        }
        self.phase = ExamPhase::Setup;
        self.phase_started_at = None;
        self.timer = CountdownTimer::stopped();
        self.paused = false;
        self.transcript.clear();
        self.session_id = None;
        self.phase_results.clear();
        self.exam_results = None;
        self.starting = false;
        self.processing = false;
        self.recording = false;
        self.coach_speaking = false;
        self.ending = false;
        self.audio_level = 0.0;
        tracing::info!("Exam reset");
        commands
    }

    fn accepts_turns(&self) -> bool {
        self.phase.is_timed() && !self.ending && self.session_id.is_some()
    }

    fn can_record(&self) -> bool {
        self.accepts_turns() && !self.processing
    }

    fn is_current(&self, session_id: &SessionId) -> bool {
        self.session_id.as_ref() == Some(session_id)
    }

    /// Seconds since the current part began, rounded to the nearest second.
    fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        self.phase_started_at
            .map(|start| ((now - start).num_milliseconds().max(0) as f64 / 1000.0).round() as u64)
            .unwrap_or(0)
    }

    pub fn config(&self) -> &ExamConfig {
        &self.config
    }

    pub fn phase(&self) -> ExamPhase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u32 {
        self.timer.remaining()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn phase_results(&self) -> &[PhaseResult] {
        &self.phase_results
    }

    pub fn exam_results(&self) -> Option<&ExamResults> {
        self.exam_results.as_ref()
    }

    /// Pass/fail against the configured target, once results exist.
    pub fn passed(&self) -> Option<bool> {
        self.exam_results
            .as_ref()
            .map(|r| r.passed(self.config.level))
    }

    pub fn is_starting(&self) -> bool {
        self.starting
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_coach_speaking(&self) -> bool {
        self.coach_speaking
    }

    pub fn is_ending(&self) -> bool {
        self.ending
    }

    pub fn audio_level(&self) -> f32 {
        self.audio_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CaptureError;
    use crate::backend::MessageReply;
    use crate::phase::{CoachKey, ExamLevel, Language};
    use crate::scoring::FixedScorer;
    use crate::transcript::Role;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T14:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn started(scores: Vec<u32>) -> ExamSession {
        let mut session = ExamSession::with_scorer(
            ExamConfig::for_coach(ExamLevel::B, CoachKey::Steven),
            Box::new(FixedScorer::new(scores)),
        );
        session.handle(Event::Start, t0());
        session.handle(
            Event::SessionStarted(SessionStart {
                session_id: SessionId::from(7),
                greeting: Some("Bonjour, parlons de votre travail.".into()),
            }),
            t0(),
        );
        session
    }

    fn tick_n(session: &mut ExamSession, n: u32, start: DateTime<Utc>) -> Vec<Command> {
        let mut out = vec![];
        for i in 1..=n {
            out.extend(session.handle(Event::Tick, start + Duration::seconds(i as i64)));
        }
        out
    }

    #[test]
    fn start_issues_one_session_request() {
        // --- 1. Arrange ---
        let mut session = ExamSession::new(ExamConfig::for_coach(ExamLevel::B, CoachKey::Steven));

        // --- 2. Act ---
        let first = session.handle(Event::Start, t0());
        let second = session.handle(Event::Start, t0());

        // --- 3. Assert ---
        assert_eq!(
            first,
            vec![Command::StartSession {
                coach: CoachKey::Steven,
                level: ExamLevel::B,
                mode: "mock_exam".into(),
            }]
        );
        assert!(second.is_empty(), "A start already in flight must not be repeated");
        assert_eq!(session.phase(), ExamPhase::Setup);
    }

    #[test]
    fn session_start_enters_part_one_with_greeting() {
        let session = started(vec![70]);
        assert_eq!(session.phase(), ExamPhase::Part1);
        assert_eq!(session.remaining_secs(), 360);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript().turns()[0].role, Role::Assistant);
        assert_eq!(session.session_id(), Some(&SessionId::from(7)));
    }

    #[test]
    fn missing_greeting_uses_localized_default() {
        let mut session = ExamSession::new(ExamConfig::for_coach(ExamLevel::C, CoachKey::Preciosa));
        session.handle(Event::Start, t0());
        session.handle(
            Event::SessionStarted(SessionStart {
                session_id: SessionId::from("s-1"),
                greeting: None,
            }),
            t0(),
        );
        assert_eq!(
            session.transcript().turns()[0].content,
            labels::fallback_greeting(Language::En)
        );
    }

    #[test]
    fn failed_start_stays_in_setup() {
        let mut session = ExamSession::new(ExamConfig::default());
        session.handle(Event::Start, t0());
        session.handle(Event::SessionStartFailed("503".into()), t0());
        assert_eq!(session.phase(), ExamPhase::Setup);
        assert!(session.session_id().is_none());
        assert!(!session.is_starting());
        // The learner can try again.
        assert_eq!(session.handle(Event::Start, t0()).len(), 1);
    }

    #[test]
    fn late_session_start_after_reset_is_ignored() {
        let mut session = ExamSession::new(ExamConfig::default());
        session.handle(Event::Start, t0());
        session.handle(Event::Reset, t0());
        session.handle(
            Event::SessionStarted(SessionStart {
                session_id: SessionId::from(1),
                greeting: None,
            }),
            t0(),
        );
        assert_eq!(session.phase(), ExamPhase::Setup);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn expiry_advances_and_notifies_backend() {
        let mut session = started(vec![70]);
        let commands = tick_n(&mut session, 360, t0());

        assert_eq!(session.phase(), ExamPhase::Part2);
        assert_eq!(session.remaining_secs(), 420);
        assert_eq!(session.phase_results().len(), 1);
        assert_eq!(session.phase_results()[0].phase, ExamPhase::Part1);
        assert_eq!(session.phase_results()[0].duration, 360);
        assert_eq!(
            commands,
            vec![Command::SendMessage {
                session_id: SessionId::from(7),
                message: "[EXAM_PHASE_TRANSITION: part2]".into(),
                exam_part: ExamPhase::Part2,
                kind: ReplyKind::PhaseTransition,
            }]
        );
    }

    #[test]
    fn pause_freezes_the_clock() {
        let mut session = started(vec![70]);
        tick_n(&mut session, 10, t0());
        assert_eq!(session.remaining_secs(), 350);

        session.handle(Event::TogglePause, t0());
        tick_n(&mut session, 1000, t0());
        assert_eq!(session.remaining_secs(), 350);
        assert_eq!(session.phase(), ExamPhase::Part1);

        session.handle(Event::TogglePause, t0());
        assert_eq!(session.remaining_secs(), 350);
        tick_n(&mut session, 1, t0());
        assert_eq!(session.remaining_secs(), 349);
    }

    #[test]
    fn typed_turn_blocks_until_reply() {
        let mut session = started(vec![70]);
        let now = t0() + Duration::seconds(5);

        let commands = session.handle(Event::SubmitText("Je suis analyste.".into()), now);
        assert_eq!(commands.len(), 1);
        assert!(session.is_processing());

        let blocked = session.handle(Event::SubmitText("Encore".into()), now);
        assert!(blocked.is_empty());
        assert_eq!(session.transcript().len(), 2);

        let commands = session.handle(
            Event::ReplyReceived {
                session_id: SessionId::from(7),
                kind: ReplyKind::Turn,
                reply: MessageReply {
                    response: Some("Intéressant.".into()),
                    audio_url: Some("https://cdn.example/reply.mp3".into()),
                    ..Default::default()
                },
            },
            now,
        );
        assert!(!session.is_processing());
        assert!(session.is_coach_speaking());
        assert_eq!(
            commands,
            vec![Command::PlayAudio("https://cdn.example/reply.mp3".into())]
        );
        assert_eq!(session.transcript().len(), 3);

        session.handle(Event::PlaybackFinished, now);
        assert!(!session.is_coach_speaking());
    }

    #[test]
    fn failed_reply_clears_processing_without_a_turn() {
        let mut session = started(vec![70]);
        session.handle(Event::SubmitText("Bonjour".into()), t0());
        session.handle(
            Event::ReplyFailed {
                session_id: SessionId::from(7),
                kind: ReplyKind::Turn,
                error: "timeout".into(),
            },
            t0(),
        );
        assert!(!session.is_processing());
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn recording_round_trip() {
        let mut session = started(vec![70]);
        assert_eq!(
            session.handle(Event::ToggleRecording, t0()),
            vec![Command::StartCapture]
        );
        session.handle(Event::RecordingStarted, t0());
        session.handle(Event::InputLevel(1.7), t0());
        assert_eq!(session.audio_level(), 1.0);
        assert_eq!(
            session.handle(Event::ToggleRecording, t0()),
            vec![Command::StopCapture]
        );

        let audio = CapturedAudio::new(vec![0.1; 1600], 16_000);
        let commands = session.handle(Event::RecordingStopped(audio.clone()), t0());
        assert_eq!(
            commands,
            vec![Command::Transcribe {
                audio,
                language: Language::Fr,
            }]
        );
        assert!(!session.is_recording());
        assert_eq!(session.audio_level(), 0.0);
        assert!(session.is_processing());

        let commands = session.handle(Event::Transcribed(" Je gère une équipe. ".into()), t0());
        assert_eq!(commands.len(), 1);
        let last = &session.transcript().turns()[1];
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "Je gère une équipe.");
    }

    #[test]
    fn empty_recording_appends_nothing() {
        let mut session = started(vec![70]);
        session.handle(Event::ToggleRecording, t0());
        session.handle(Event::RecordingStarted, t0());
        let commands = session.handle(Event::RecordingStopped(CapturedAudio::default()), t0());
        assert!(commands.is_empty());
        assert!(!session.is_processing());
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn empty_transcription_appends_nothing() {
        let mut session = started(vec![70]);
        session.handle(
            Event::RecordingStopped(CapturedAudio::new(vec![0.2; 10], 16_000)),
            t0(),
        );
        assert!(session.is_processing());
        assert!(session.handle(Event::Transcribed("   ".into()), t0()).is_empty());
        assert!(!session.is_processing());
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn transcription_failure_returns_to_idle() {
        let mut session = started(vec![70]);
        session.handle(
            Event::RecordingStopped(CapturedAudio::new(vec![0.2; 10], 16_000)),
            t0(),
        );
        session.handle(Event::TranscriptionFailed("bad audio".into()), t0());
        assert!(!session.is_processing());
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn microphone_failure_leaves_flow_untouched() {
        let mut session = started(vec![70]);
        session.handle(Event::ToggleRecording, t0());
        session.handle(Event::RecordingFailed(CaptureError::PermissionDenied), t0());
        assert!(!session.is_recording());
        assert_eq!(session.phase(), ExamPhase::Part1);
        // The tap-to-speak affordance is available again.
        assert_eq!(
            session.handle(Event::ToggleRecording, t0()),
            vec![Command::StartCapture]
        );
    }

    #[test]
    fn cannot_record_while_processing() {
        let mut session = started(vec![70]);
        session.handle(Event::SubmitText("Bonjour".into()), t0());
        assert!(session.handle(Event::ToggleRecording, t0()).is_empty());
    }

    #[test]
    fn finishing_part_four_waits_for_end_session() {
        let mut session = started(vec![70, 80, 60, 90]);
        for _ in 0..3 {
            session.handle(Event::Advance, t0());
        }
        assert_eq!(session.phase(), ExamPhase::Part4);

        let commands = session.handle(Event::Advance, t0());
        assert_eq!(
            commands,
            vec![Command::EndSession {
                session_id: SessionId::from(7)
            }]
        );
        assert!(session.is_ending());
        assert_eq!(session.phase(), ExamPhase::Part4);
        // Advancing again while closing is a no-op.
        assert!(session.handle(Event::Advance, t0()).is_empty());
        assert_eq!(session.phase_results().len(), 4);

        session.handle(
            Event::SessionEnded {
                session_id: SessionId::from(7),
                feedback: None,
            },
            t0(),
        );
        assert_eq!(session.phase(), ExamPhase::Feedback);
        let results = session.exam_results().unwrap();
        assert_eq!(results.overall_score, 75);
        assert_eq!(session.passed(), Some(true));
        assert!(session.handle(Event::Advance, t0()).is_empty());
        assert!(session.handle(Event::Tick, t0()).is_empty());
    }

    #[test]
    fn end_session_failure_still_reaches_feedback() {
        let mut session = started(vec![40]);
        for _ in 0..4 {
            session.handle(Event::Advance, t0());
        }
        session.handle(
            Event::SessionEndFailed {
                session_id: SessionId::from(7),
                error: "connection reset".into(),
            },
            t0(),
        );
        assert_eq!(session.phase(), ExamPhase::Feedback);
        let results = session.exam_results().unwrap();
        assert_eq!(results.recommendation, labels::fallback_recommendation(Language::Fr));
        assert_eq!(session.passed(), Some(false));
    }

    #[test]
    fn transcription_after_final_advance_is_dropped() {
        // --- 1. Arrange ---
        let mut session = started(vec![70]);
        for _ in 0..3 {
            session.handle(Event::Advance, t0());
        }
        session.handle(Event::ToggleRecording, t0());
        session.handle(Event::RecordingStarted, t0());
        session.handle(Event::ToggleRecording, t0());
        session.handle(
            Event::RecordingStopped(CapturedAudio::new(vec![0.2; 1600], 16_000)),
            t0(),
        );
        assert!(session.is_processing());
        let ending = session.handle(Event::Advance, t0());
        assert_eq!(
            ending,
            vec![Command::EndSession {
                session_id: SessionId::from(7)
            }]
        );
        let turns_before = session.transcript().len();

        // --- 2. Act ---
        let commands = session.handle(Event::Transcribed("Je conclus.".into()), t0());

        // --- 3. Assert ---
        assert!(commands.is_empty());
        assert_eq!(session.transcript().len(), turns_before);
        assert!(!session.is_processing());

        session.handle(
            Event::SessionEnded {
                session_id: SessionId::from(7),
                feedback: None,
            },
            t0(),
        );
        assert_eq!(session.phase(), ExamPhase::Feedback);
        assert_eq!(session.transcript().len(), turns_before);
    }

    #[test]
    fn failed_transition_notice_does_not_hold_the_exam() {
        let mut session = started(vec![70, 80]);
        let commands = session.handle(Event::Advance, t0() + Duration::seconds(30));
        assert_eq!(commands.len(), 1);
        assert_eq!(session.phase(), ExamPhase::Part2);

        let commands = session.handle(
            Event::ReplyFailed {
                session_id: SessionId::from(7),
                kind: ReplyKind::PhaseTransition,
                error: "502 Bad Gateway".into(),
            },
            t0() + Duration::seconds(31),
        );

        assert!(commands.is_empty());
        assert_eq!(session.phase(), ExamPhase::Part2);
        assert_eq!(session.remaining_secs(), 420);
        assert_eq!(session.phase_results().len(), 1);
        assert_eq!(session.phase_results()[0].duration, 30);
        assert!(!session.is_processing());
        assert_eq!(session.transcript().len(), 1);
        // The learner can keep talking in the new part.
        assert_eq!(
            session
                .handle(Event::SubmitText("D'accord.".into()), t0())
                .len(),
            1
        );
        // And the clock keeps running.
        tick_n(&mut session, 420, t0());
        assert_eq!(session.phase(), ExamPhase::Part3);
    }

    #[test]
    fn pause_carries_into_the_next_part() {
        let mut session = started(vec![70]);
        session.handle(Event::TogglePause, t0());
        assert!(session.is_paused());

        session.handle(Event::Advance, t0());
        assert_eq!(session.phase(), ExamPhase::Part2);
        assert!(session.is_paused());
        tick_n(&mut session, 30, t0());
        assert_eq!(session.remaining_secs(), 420);

        session.handle(Event::TogglePause, t0());
        tick_n(&mut session, 1, t0());
        assert_eq!(session.remaining_secs(), 419);
    }

    #[test]
    fn stale_reply_after_reset_is_dropped() {
        let mut session = started(vec![70]);
        session.handle(Event::SubmitText("Bonjour".into()), t0());
        session.handle(Event::Reset, t0());
        session.handle(
            Event::ReplyReceived {
                session_id: SessionId::from(7),
                kind: ReplyKind::Turn,
                reply: MessageReply::default(),
            },
            t0(),
        );
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn reset_releases_devices() {
        let mut session = started(vec![70]);
        session.handle(Event::RecordingStarted, t0());
        session.handle(
            Event::ReplyReceived {
                session_id: SessionId::from(7),
                kind: ReplyKind::PhaseTransition,
                reply: MessageReply {
                    message: Some("Partie II".into()),
                    audio_url: Some("https://cdn.example/p2.mp3".into()),
                    ..Default::default()
                },
            },
            t0(),
        );
        let commands = session.handle(Event::Reset, t0());
        assert_eq!(commands, vec![Command::StopCapture, Command::StopPlayback]);
        assert!(!session.is_recording());
        assert!(!session.is_coach_speaking());
    }

    #[test]
    fn configure_only_in_setup() {
        let mut session = ExamSession::new(ExamConfig::default());
        let c = ExamConfig::for_coach(ExamLevel::C, CoachKey::Preciosa);
        assert!(session.configure(c));
        assert_eq!(session.config().language, Language::En);

        let mut session = started(vec![70]);
        assert!(!session.configure(c));
        assert_eq!(session.config().coach, CoachKey::Steven);
    }
}
