use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::io::Cursor;

/// Sample rate sent to transcription. Speech models expect 16 kHz.
pub const TRANSCRIPTION_SAMPLE_RATE: u32 = 16_000;

/// Frames fed to the resampler per call.
pub const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits a slice of audio samples into fixed-size chunks, zero-padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Resamples a mono buffer. Returns the input untouched when the rates match.
pub fn resample_mono(samples: &[f32], from: u32, to: u32) -> anyhow::Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(from as f64, to as f64, RESAMPLE_CHUNK_SIZE)?;
    let mut out = Vec::with_capacity(samples.len() * to as usize / from as usize + 1);
    for chunk in split_for_chunks(samples, RESAMPLE_CHUNK_SIZE) {
        let resampled = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = resampled.first() {
            out.extend_from_slice(channel);
        }
    }
    Ok(out)
}

/// Averages interleaved frames down to one channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

/// Creates a new ring buffer on the heap for shared audio data.
pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Decodes a WAV file into mono f32 samples and its sample rate.
pub fn decode_wav(bytes: &[u8]) -> anyhow::Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };
    Ok((downmix(&interleaved, spec.channels as usize), spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decodes_stereo_wav_to_mono() {
        let bytes = wav_bytes(2, &[16384, 0, -16384, -16384]);
        let (samples, rate) = decode_wav(&bytes).unwrap();
        assert_eq!(rate, 22_050);
        assert_eq!(samples, vec![0.25, -0.5]);
    }

    #[test]
    fn rejects_non_wav_payloads() {
        assert!(decode_wav(b"ID3\x03mp3 data").is_err());
    }

    #[test]
    fn pads_last_chunk() {
        let chunks = split_for_chunks(&[1.0, 2.0, 3.0], 2);
        assert_eq!(chunks, vec![vec![1.0, 2.0], vec![3.0, 0.0]]);
    }

    #[test]
    fn resampling_scales_length() {
        let input = vec![0.1; 48_000];
        let out = resample_mono(&input, 48_000, TRANSCRIPTION_SAMPLE_RATE).unwrap();
        // Chunk padding may add up to one chunk's worth of output.
        let expected = 16_000;
        assert!(out.len() >= expected - RESAMPLE_CHUNK_SIZE && out.len() <= expected + RESAMPLE_CHUNK_SIZE);
        assert_eq!(resample_mono(&input, 16_000, 16_000).unwrap().len(), 48_000);
    }
}
