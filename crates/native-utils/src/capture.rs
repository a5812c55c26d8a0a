use crate::audio::{TRANSCRIPTION_SAMPLE_RATE, downmix, resample_mono};
use crate::device;
use cpal::traits::{DeviceTrait, StreamTrait};
use sle_exam_core::audio::{AudioCapture, CaptureError, CapturedAudio, normalized_level};
use sle_exam_core::phase::EXAM_PARTS;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Records from a cpal input device into memory.
///
/// The device is opened in `start` and closed in `stop`; between recordings
/// no stream exists.
pub struct Microphone {
    device_name: Option<String>,
    stream: Option<cpal::Stream>,
    buffer: Arc<Mutex<Vec<f32>>>,
    level: Arc<AtomicU32>,
    sample_rate: u32,
}

impl Microphone {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
            level: Arc::new(AtomicU32::new(0)),
            sample_rate: TRANSCRIPTION_SAMPLE_RATE,
        }
    }
}

impl AudioCapture for Microphone {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        let input = device::get_or_default_input(self.device_name.clone())
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        let input_config = input
            .default_input_config()
            .map_err(|e| classify(e.to_string()))?;
        let input_config: cpal::StreamConfig = input_config.config();
        let input_channel_count = input_config.channels as usize;
        tracing::debug!("Input stream config: {:?}", &input_config);

        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
        }
        let buffer = self.buffer.clone();
        let level = self.level.clone();
        let max_samples = max_recording_samples(input_config.sample_rate.0);
        let mut truncated = false;

        // Mixes to mono, updates the live level and appends to the take.
        let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let audio = downmix(data, input_channel_count);
            level.store(normalized_level(&audio).to_bits(), Ordering::Relaxed);
            if let Ok(mut buffer) = buffer.lock() {
                if !append_capped(&mut buffer, &audio, max_samples) && !truncated {
                    truncated = true;
                    tracing::warn!("Recording hit the longest part length, dropping further audio");
                }
            }
        };

        let stream = input
            .build_input_stream(
                &input_config,
                input_data_fn,
                move |err| tracing::error!("An error occurred on input stream: {}", err),
                None,
            )
            .map_err(|e| classify(e.to_string()))?;
        stream.play().map_err(|e| classify(e.to_string()))?;

        self.sample_rate = input_config.sample_rate.0;
        self.stream = Some(stream);
        tracing::info!("Recording started");
        Ok(())
    }

    fn stop(&mut self) -> CapturedAudio {
        // Dropping the stream closes the device.
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("Failed to pause input stream: {}", e);
            }
            drop(stream);
            tracing::info!("Recording stopped");
        }
        self.level.store(0, Ordering::Relaxed);

        let samples = match self.buffer.lock() {
            Ok(mut buffer) => std::mem::take(&mut *buffer),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        match resample_mono(&samples, self.sample_rate, TRANSCRIPTION_SAMPLE_RATE) {
            Ok(resampled) => CapturedAudio::new(resampled, TRANSCRIPTION_SAMPLE_RATE),
            Err(e) => {
                tracing::warn!("Resampling failed, sending native rate: {:?}", e);
                CapturedAudio::new(samples, self.sample_rate)
            }
        }
    }

    fn is_recording(&self) -> bool {
        self.stream.is_some()
    }

    fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }
}

/// Mono samples in the longest exam part at `sample_rate`.
pub fn max_recording_samples(sample_rate: u32) -> usize {
    let secs = EXAM_PARTS
        .iter()
        .filter_map(|part| part.duration_secs())
        .max()
        .unwrap_or(0);
    secs as usize * sample_rate as usize
}

/// Appends what fits under `max` samples. Returns false once audio was dropped.
pub fn append_capped(buffer: &mut Vec<f32>, audio: &[f32], max: usize) -> bool {
    let room = max.saturating_sub(buffer.len());
    let take = room.min(audio.len());
    buffer.extend_from_slice(&audio[..take]);
    take == audio.len()
}

/// Sorts a device error into the two failure kinds the exam cares about.
pub fn classify(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CaptureError::PermissionDenied
    } else {
        CaptureError::DeviceUnavailable(message)
    }
}
