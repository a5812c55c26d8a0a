use crate::audio::{AudioCapture, Playback};
use crate::backend::ExamBackend;
use crate::{Command, Event};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

pub type EventTx = UnboundedSender<Event>;

/// Executes the commands an `ExamSession` returns and reports the outcome as
/// events on `events`.
///
/// Backend calls are queued onto one sequential lane so their completions come
/// back in the order they were issued. Microphone commands run inline, which
/// keeps device release immediate even while a request is outstanding.
/// Playback runs on its own task and is replaced, never overlapped.
pub struct EffectRunner {
    rpc_tx: UnboundedSender<Command>,
    capture: Box<dyn AudioCapture>,
    player: Arc<dyn Playback>,
    playback: Option<JoinHandle<()>>,
    events: EventTx,
}

impl EffectRunner {
    /// Builds the runner and spawns its RPC lane on the current runtime.
    pub fn new(
        backend: Arc<dyn ExamBackend>,
        capture: Box<dyn AudioCapture>,
        player: Arc<dyn Playback>,
        events: EventTx,
    ) -> (Self, JoinHandle<()>) {
        let (rpc_tx, rpc_rx) = tokio::sync::mpsc::unbounded_channel();
        let lane = tokio::spawn(run_rpc_lane(backend, rpc_rx, events.clone()));
        (
            Self {
                rpc_tx,
                capture,
                player,
                playback: None,
                events,
            },
            lane,
        )
    }

    pub fn dispatch(&mut self, command: Command) {
        match command {
            Command::StartCapture => match self.capture.start() {
                Ok(()) => self.emit(Event::RecordingStarted),
                Err(e) => self.emit(Event::RecordingFailed(e)),
            },
            Command::StopCapture => {
                let audio = self.capture.stop();
                self.emit(Event::RecordingStopped(audio));
            }
            Command::PlayAudio(url) => {
                self.stop_playback();
                let player = self.player.clone();
                let events = self.events.clone();
                self.playback = Some(tokio::spawn(async move {
                    if let Err(e) = player.play(&url).await {
                        tracing::warn!("Playback of {} failed: {:?}", url, e);
                    }
                    let _ = events.send(Event::PlaybackFinished);
                }));
            }
            Command::StopPlayback => {
                self.stop_playback();
                self.emit(Event::PlaybackFinished);
            }
            network => {
                if self.rpc_tx.send(network).is_err() {
                    tracing::error!("RPC lane has shut down; dropping command");
                }
            }
        }
    }

    /// Current microphone level while recording.
    pub fn input_level(&self) -> Option<f32> {
        self.capture
            .is_recording()
            .then(|| self.capture.level())
    }

    /// Releases the microphone and silences playback. Outstanding requests
    /// are left to finish on their own.
    pub fn shutdown(&mut self) {
        if self.capture.is_recording() {
            let _ = self.capture.stop();
        }
        self.stop_playback();
    }

    fn stop_playback(&mut self) {
        if let Some(handle) = self.playback.take() {
            handle.abort();
        }
        self.player.stop();
    }

    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::warn!("Event channel closed");
        }
    }
}

/// Drains network commands one at a time, in order.
pub async fn run_rpc_lane(
    backend: Arc<dyn ExamBackend>,
    mut commands: UnboundedReceiver<Command>,
    events: EventTx,
) {
    while let Some(command) = commands.recv().await {
        if let Some(event) = perform(backend.as_ref(), command).await {
            if events.send(event).is_err() {
                break;
            }
        }
    }
    tracing::debug!("RPC lane finished");
}

/// Runs one backend command and converts the outcome into an event.
pub async fn perform(backend: &dyn ExamBackend, command: Command) -> Option<Event> {
    let event = match command {
        Command::StartSession { coach, level, mode } => {
            match backend.start_session(coach, level, &mode).await {
                Ok(start) => Event::SessionStarted(start),
                Err(e) => Event::SessionStartFailed(e.to_string()),
            }
        }
        Command::SendMessage {
            session_id,
            message,
            exam_part,
            kind,
        } => match backend.send_message(&session_id, &message, exam_part).await {
            Ok(reply) => Event::ReplyReceived {
                session_id,
                kind,
                reply,
            },
            Err(e) => Event::ReplyFailed {
                session_id,
                kind,
                error: e.to_string(),
            },
        },
        Command::Transcribe { audio, language } => {
            let data = match audio.to_data_url() {
                Ok(data) => data,
                Err(e) => return Some(Event::TranscriptionFailed(e.to_string())),
            };
            match backend.transcribe_audio(&data, language).await {
                Ok(transcription) => Event::Transcribed(transcription.text),
                Err(e) => Event::TranscriptionFailed(e.to_string()),
            }
        }
        Command::EndSession { session_id } => match backend.end_session(&session_id).await {
            Ok(end) => Event::SessionEnded {
                session_id,
                feedback: end.feedback,
            },
            Err(e) => Event::SessionEndFailed {
                session_id,
                error: e.to_string(),
            },
        },
        other => {
            tracing::warn!("Not a backend command: {:?}", other);
            return None;
        }
    };
    Some(event)
}
