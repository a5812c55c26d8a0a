use async_trait::async_trait;
use base64::Engine;
use std::io::Cursor;
use thiserror::Error;

/// Audio collected between `StartCapture` and `StopCapture`, mono f32 PCM.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl CapturedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Encodes the buffer as a 16-bit mono WAV inside a base64 data URL.
    pub fn to_data_url(&self) -> anyhow::Result<String> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in &self.samples {
                let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                writer.write_sample(v)?;
            }
            writer.finalize()?;
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(cursor.into_inner());
        Ok(format!("data:audio/wav;base64,{encoded}"))
    }
}

/// Failure to acquire the microphone. Recording simply does not start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Microphone permission denied")]
    PermissionDenied,
    #[error("Microphone unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("A recording is already in progress")]
    AlreadyRecording,
}

/// Exclusive handle on an input device for the length of one recording.
///
/// `start` acquires the device; `stop` must release it before returning, even
/// when nothing was captured.
pub trait AudioCapture {
    fn start(&mut self) -> Result<(), CaptureError>;
    fn stop(&mut self) -> CapturedAudio;
    fn is_recording(&self) -> bool;
    /// Latest normalized input level in [0, 1].
    fn level(&self) -> f32;
}

/// Single shared output for coach audio. A new `play` replaces the old one.
#[async_trait]
pub trait Playback: Send + Sync {
    /// Plays the audio at `url`, resolving when playback ends.
    async fn play(&self, url: &str) -> anyhow::Result<()>;
    /// Silences whatever is playing now.
    fn stop(&self);
}

/// Playback that finishes immediately, for running without speakers.
pub struct SilentPlayback;

#[async_trait]
impl Playback for SilentPlayback {
    async fn play(&self, url: &str) -> anyhow::Result<()> {
        tracing::debug!("Skipping playback of {}", url);
        Ok(())
    }

    fn stop(&self) {}
}

/// Mean magnitude of a buffer, scaled into [0, 1] for meter display.
pub fn normalized_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32;
    // Speech rarely exceeds a quarter of full scale on average.
    (mean * 4.0).clamp(0.0, 1.0)
}
