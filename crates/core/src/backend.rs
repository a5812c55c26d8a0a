use crate::phase::{CoachKey, ExamLevel, ExamPhase, Language};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque correlation token handed out by the backend at session start.
///
/// The server may use numbers or strings; the value is echoed back untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(serde_json::Value);

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        Self(serde_json::Value::from(id))
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(serde_json::Value::from(id))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub session_id: SessionId,
    #[serde(default, alias = "welcomeMessage")]
    pub greeting: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReply {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub coach_response: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
}

impl MessageReply {
    pub fn text(&self) -> &str {
        self.response
            .as_deref()
            .or(self.message.as_deref())
            .or(self.coach_response.as_deref())
            .unwrap_or("")
    }

    /// Audio to play back, ignoring empty URLs.
    pub fn audio(&self) -> Option<&str> {
        self.audio_url.as_deref().filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Transcription {
    #[serde(default, alias = "transcription")]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionFeedback {
    #[serde(default)]
    pub strengths: Option<Vec<String>>,
    #[serde(default)]
    pub improvements: Option<Vec<String>>,
    #[serde(default)]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionEnd {
    #[serde(default)]
    pub feedback: Option<SessionFeedback>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request to {procedure} failed: {source}")]
    Http {
        procedure: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{procedure} returned HTTP {status}: {body}")]
    Status {
        procedure: String,
        status: u16,
        body: String,
    },
    #[error("Could not decode {procedure} response: {source}")]
    Decode {
        procedure: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// The remote procedures the exam depends on.
///
/// Everything the engine learns from the outside world comes through here, so
/// tests swap in `MockExamBackend` and the terminal app can swap in the offline
/// simulation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExamBackend: Send + Sync {
    async fn start_session(
        &self,
        coach: CoachKey,
        level: ExamLevel,
        mode: &str,
    ) -> Result<SessionStart, BackendError>;

    async fn send_message(
        &self,
        session_id: &SessionId,
        message: &str,
        exam_part: ExamPhase,
    ) -> Result<MessageReply, BackendError>;

    async fn transcribe_audio(
        &self,
        audio_data: &str,
        language: Language,
    ) -> Result<Transcription, BackendError>;

    async fn end_session(&self, session_id: &SessionId) -> Result<SessionEnd, BackendError>;
}

#[derive(Deserialize)]
struct TrpcResponse<T> {
    result: TrpcResult<T>,
}

#[derive(Deserialize)]
struct TrpcResult<T> {
    data: TrpcData<T>,
}

#[derive(Deserialize)]
struct TrpcData<T> {
    json: T,
}

/// Talks to the `sleCompanion` router of the web application over tRPC's
/// HTTP transport.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

pub struct HttpBackendBuilder {
    base_url: String,
    token: Option<SecretString>,
}

impl HttpBackendBuilder {
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn build(self) -> HttpBackend {
        HttpBackend {
            client: Client::new(),
            base_url: self.base_url,
            token: self.token,
        }
    }
}

impl HttpBackend {
    pub fn builder() -> HttpBackendBuilder {
        HttpBackendBuilder {
            base_url: "http://localhost:3000".to_string(),
            token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, procedure: &str) -> String {
        format!("{}/api/trpc/sleCompanion.{}", self.base_url, procedure)
    }

    async fn call<I, O>(&self, procedure: &str, input: I) -> Result<O, BackendError>
    where
        I: Serialize + Send,
        O: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(self.url(procedure))
            .json(&serde_json::json!({ "json": input }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let http_err = |source| BackendError::Http {
            procedure: procedure.to_string(),
            source,
        };
        let response = request.send().await.map_err(http_err)?;
        let status = response.status();
        let body = response.text().await.map_err(http_err)?;
        if !status.is_success() {
            return Err(BackendError::Status {
                procedure: procedure.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!("{} responded with {} bytes", procedure, body.len());
        decode_envelope(procedure, &body)
    }
}

fn decode_envelope<O: DeserializeOwned>(procedure: &str, body: &str) -> Result<O, BackendError> {
    serde_json::from_str::<TrpcResponse<O>>(body)
        .map(|envelope| envelope.result.data.json)
        .map_err(|source| BackendError::Decode {
            procedure: procedure.to_string(),
            source,
        })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionInput<'a> {
    coach_key: CoachKey,
    target_level: ExamLevel,
    mode: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageInput<'a> {
    session_id: &'a SessionId,
    message: &'a str,
    exam_part: ExamPhase,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeInput<'a> {
    audio_data: &'a str,
    language: Language,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EndSessionInput<'a> {
    session_id: &'a SessionId,
}

#[async_trait]
impl ExamBackend for HttpBackend {
    async fn start_session(
        &self,
        coach: CoachKey,
        level: ExamLevel,
        mode: &str,
    ) -> Result<SessionStart, BackendError> {
        self.call(
            "startSession",
            StartSessionInput {
                coach_key: coach,
                target_level: level,
                mode,
            },
        )
        .await
    }

    async fn send_message(
        &self,
        session_id: &SessionId,
        message: &str,
        exam_part: ExamPhase,
    ) -> Result<MessageReply, BackendError> {
        self.call(
            "sendMessage",
            SendMessageInput {
                session_id,
                message,
                exam_part,
            },
        )
        .await
    }

    async fn transcribe_audio(
        &self,
        audio_data: &str,
        language: Language,
    ) -> Result<Transcription, BackendError> {
        self.call(
            "transcribeAudio",
            TranscribeInput {
                audio_data,
                language,
            },
        )
        .await
    }

    async fn end_session(&self, session_id: &SessionId) -> Result<SessionEnd, BackendError> {
        self.call("endSession", EndSessionInput { session_id }).await
    }
}
