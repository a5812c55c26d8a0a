use crate::audio::{decode_wav, resample_mono, shared_buffer};
use crate::device;
use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use base64::Engine;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use ringbuf::{HeapCons, HeapProd};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use sle_exam_core::audio::Playback;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The size of each audio chunk for the audio output stream.
pub const OUTPUT_CHUNK_SIZE: usize = 1024;
/// The latency for the output audio buffer in milliseconds.
pub const OUTPUT_LATENCY_MS: usize = 1000;

const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Keeps the output stream alive. Playback goes silent once this is dropped.
pub struct OutputGuard {
    _stream: cpal::Stream,
}

/// Plays coach audio through a cpal output device.
///
/// Clips are fetched over HTTP (or decoded from a `data:` URL), converted to
/// the device rate and pushed into a ring buffer drained by the output callback.
pub struct SpeakerPlayback {
    client: reqwest::Client,
    producer: Mutex<HeapProd<f32>>,
    flush: Arc<AtomicBool>,
    generation: AtomicU64,
    sample_rate: u32,
}

impl SpeakerPlayback {
    pub fn open(device_name: Option<String>) -> anyhow::Result<(Self, OutputGuard)> {
        let output = device::get_or_default_output(device_name)?;
        tracing::info!("Using output device: {:?}", output.name()?);

        let output_config = output
            .default_output_config()
            .context("Failed to get default output config")?;
        let output_config = StreamConfig {
            channels: output_config.channels(),
            sample_rate: output_config.sample_rate(),
            buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
        };
        let output_channel_count = output_config.channels as usize;
        let output_sample_rate = output_config.sample_rate.0;
        tracing::info!("Output stream config: {:?}", &output_config);

        let (playback, mut consumer) = Self::with_buffer(
            output_sample_rate as usize * OUTPUT_LATENCY_MS / 1000 * 4,
            output_sample_rate,
        );
        let flush = playback.flush.clone();
        let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            render_output(&mut consumer, &flush, data, output_channel_count);
        };

        let stream = output.build_output_stream(
            &output_config,
            output_data_fn,
            move |err| tracing::error!("An error occurred on output stream: {}", err),
            None,
        )?;
        stream.play()?;
        Ok((playback, OutputGuard { _stream: stream }))
    }

    /// Playback over a fresh ring buffer. The returned consumer is what the
    /// output callback drains.
    pub fn with_buffer(capacity: usize, sample_rate: u32) -> (Self, HeapCons<f32>) {
        let (producer, consumer) = shared_buffer(capacity).split();
        let playback = Self {
            client: reqwest::Client::new(),
            producer: Mutex::new(producer),
            flush: Arc::new(AtomicBool::new(false)),
            generation: AtomicU64::new(0),
            sample_rate,
        };
        (playback, consumer)
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch coach audio from {url}"))?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn queued(&self) -> usize {
        match self.producer.lock() {
            Ok(producer) => producer.occupied_len(),
            Err(_) => 0,
        }
    }
}

#[async_trait]
impl Playback for SpeakerPlayback {
    async fn play(&self, url: &str) -> anyhow::Result<()> {
        let generation = self.generation.load(Ordering::Acquire);
        let bytes = self.fetch(url).await?;
        let (samples, rate) = decode_wav(&bytes).context("Coach audio is not a WAV clip")?;
        let samples = resample_mono(&samples, rate, self.sample_rate)?;
        tracing::debug!("Playing {} samples at {}hz", samples.len(), self.sample_rate);

        // Audio pushed before a pending flush is serviced would be wiped with it.
        while self.flush.load(Ordering::Acquire) {
            if !self.is_current(generation) {
                bail!("Playback interrupted");
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }

        let mut offset = 0;
        while offset < samples.len() {
            if !self.is_current(generation) {
                bail!("Playback interrupted");
            }
            let pushed = match self.producer.lock() {
                Ok(mut producer) => producer.push_slice(&samples[offset..]),
                Err(_) => bail!("Output buffer is poisoned"),
            };
            offset += pushed;
            if pushed == 0 {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        }

        while self.queued() > 0 {
            if !self.is_current(generation) {
                bail!("Playback interrupted");
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
        Ok(())
    }

    fn stop(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.flush.store(true, Ordering::Release);
    }
}

/// Fills one output buffer from the queue, duplicating mono onto the first
/// two channels. A pending flush drops everything queued first.
pub fn render_output(
    consumer: &mut HeapCons<f32>,
    flush: &AtomicBool,
    data: &mut [f32],
    channel_count: usize,
) {
    if flush.swap(false, Ordering::AcqRel) {
        consumer.clear();
    }
    let mut sample_index = 0;
    while sample_index < data.len() {
        let sample = consumer.try_pop().unwrap_or(0.0);
        // Left channel (ch:0).
        data[sample_index] = sample;
        sample_index += 1;
        // Right channel (ch:1), if it exists.
        if channel_count > 1 && sample_index < data.len() {
            data[sample_index] = sample;
            sample_index += 1;
        }
        // Silence the remaining channels.
        for _ in 2..channel_count {
            if sample_index < data.len() {
                data[sample_index] = 0.0;
                sample_index += 1;
            }
        }
    }
}

/// Decodes the payload of a base64 `data:` URL.
pub fn decode_data_url(url: &str) -> anyhow::Result<Vec<u8>> {
    let (_, payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .ok_or_else(|| anyhow!("Unsupported data URL"))?;
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}
