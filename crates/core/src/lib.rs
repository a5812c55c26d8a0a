pub mod audio;
pub mod backend;
pub mod effects;
pub mod labels;
pub mod offline;
pub mod phase;
pub mod results;
pub mod scoring;
pub mod session_state;
pub mod timer;
pub mod transcript;

use crate::audio::{CaptureError, CapturedAudio};
use crate::backend::{MessageReply, SessionFeedback, SessionId, SessionStart};
use crate::phase::{CoachKey, ExamLevel, ExamPhase, Language};

/// Mode tag sent with every session start from the simulator.
pub const MOCK_EXAM_MODE: &str = "mock_exam";

/// Why a message is being sent, so its reply can be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// A learner turn. Holds the processing flag until it resolves.
    Turn,
    /// The notice sent when a new part begins.
    PhaseTransition,
}

/// Side effects the exam engine (`ExamSession`) asks the runtime to perform.
///
/// The engine never performs I/O itself; it returns these from
/// `ExamSession::handle` and the runtime reports back with [`Event`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartSession {
        coach: CoachKey,
        level: ExamLevel,
        mode: String,
    },
    SendMessage {
        session_id: SessionId,
        message: String,
        exam_part: ExamPhase,
        kind: ReplyKind,
    },
    Transcribe {
        audio: CapturedAudio,
        language: Language,
    },
    EndSession {
        session_id: SessionId,
    },
    /// Acquire the microphone and begin recording.
    StartCapture,
    /// Finish the recording and release the microphone.
    StopCapture,
    /// Play synthesized coach audio, replacing anything already playing.
    PlayAudio(String),
    StopPlayback,
}

/// Everything that can happen to an exam: learner intents, clock ticks and
/// completions of previously issued commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start,
    SubmitText(String),
    ToggleRecording,
    TogglePause,
    Advance,
    Reset,
    /// One second of wall time has passed.
    Tick,
    /// Live microphone level, sampled once per redraw.
    InputLevel(f32),

    SessionStarted(SessionStart),
    SessionStartFailed(String),
    RecordingStarted,
    RecordingFailed(CaptureError),
    RecordingStopped(CapturedAudio),
    Transcribed(String),
    TranscriptionFailed(String),
    ReplyReceived {
        session_id: SessionId,
        kind: ReplyKind,
        reply: MessageReply,
    },
    ReplyFailed {
        session_id: SessionId,
        kind: ReplyKind,
        error: String,
    },
    SessionEnded {
        session_id: SessionId,
        feedback: Option<SessionFeedback>,
    },
    SessionEndFailed {
        session_id: SessionId,
        error: String,
    },
    PlaybackFinished,
}

impl Event {
    /// Short name for logs; some payloads (audio) are too large to print.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::SubmitText(_) => "submit_text",
            Event::ToggleRecording => "toggle_recording",
            Event::TogglePause => "toggle_pause",
            Event::Advance => "advance",
            Event::Reset => "reset",
            Event::Tick => "tick",
            Event::InputLevel(_) => "input_level",
            Event::SessionStarted(_) => "session_started",
            Event::SessionStartFailed(_) => "session_start_failed",
            Event::RecordingStarted => "recording_started",
            Event::RecordingFailed(_) => "recording_failed",
            Event::RecordingStopped(_) => "recording_stopped",
            Event::Transcribed(_) => "transcribed",
            Event::TranscriptionFailed(_) => "transcription_failed",
            Event::ReplyReceived { .. } => "reply_received",
            Event::ReplyFailed { .. } => "reply_failed",
            Event::SessionEnded { .. } => "session_ended",
            Event::SessionEndFailed { .. } => "session_end_failed",
            Event::PlaybackFinished => "playback_finished",
        }
    }
}
