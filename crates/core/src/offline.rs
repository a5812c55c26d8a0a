use crate::backend::{
    BackendError, ExamBackend, MessageReply, SessionEnd, SessionId, SessionStart, Transcription,
};
use crate::phase::{CoachKey, ExamLevel, ExamPhase, Language};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};

/// A simulated backend for practising without the web application.
///
/// No network calls are made. Replies are canned prompts per exam part, and
/// transcription cannot recognise speech, so spoken turns come back as a
/// placeholder sentence. Useful for exercising the timing and device plumbing
/// end to end.
pub struct OfflineBackend {
    next_id: AtomicI64,
    language: Language,
}

impl OfflineBackend {
    pub fn new(language: Language) -> Self {
        Self {
            next_id: AtomicI64::new(1),
            language,
        }
    }

    fn prompt_for(&self, part: ExamPhase) -> &'static str {
        match (self.language, part) {
            (Language::Fr, ExamPhase::Part2) => {
                "Écoutez attentivement l'extrait, puis résumez les idées principales."
            }
            (Language::Fr, ExamPhase::Part3) => {
                "Choisissez une des trois questions et développez votre réponse."
            }
            (Language::Fr, ExamPhase::Part4) => {
                "Je ne suis pas d'accord. Défendez votre point de vue."
            }
            (Language::Fr, _) => "Merci. Pouvez-vous préciser votre réponse ?",
            (Language::En, ExamPhase::Part2) => {
                "Listen carefully to the excerpt, then summarize the main ideas."
            }
            (Language::En, ExamPhase::Part3) => {
                "Pick one of the three questions and develop your answer."
            }
            (Language::En, ExamPhase::Part4) => "I disagree. Defend your point of view.",
            (Language::En, _) => "Thank you. Could you expand on that?",
        }
    }
}

#[async_trait]
impl ExamBackend for OfflineBackend {
    async fn start_session(
        &self,
        coach: CoachKey,
        level: ExamLevel,
        mode: &str,
    ) -> Result<SessionStart, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            "Offline session {} for {} at level {} ({})",
            id,
            coach.as_str(),
            level.as_str(),
            mode
        );
        // No greeting: the engine substitutes its localized default.
        Ok(SessionStart {
            session_id: SessionId::from(id),
            greeting: None,
        })
    }

    async fn send_message(
        &self,
        _session_id: &SessionId,
        _message: &str,
        exam_part: ExamPhase,
    ) -> Result<MessageReply, BackendError> {
        Ok(MessageReply {
            response: Some(self.prompt_for(exam_part).to_string()),
            ..Default::default()
        })
    }

    async fn transcribe_audio(
        &self,
        _audio_data: &str,
        language: Language,
    ) -> Result<Transcription, BackendError> {
        let text = match language {
            Language::Fr => "(réponse orale enregistrée)",
            Language::En => "(spoken answer recorded)",
        };
        Ok(Transcription {
            text: text.to_string(),
        })
    }

    async fn end_session(&self, _session_id: &SessionId) -> Result<SessionEnd, BackendError> {
        Ok(SessionEnd::default())
    }
}
