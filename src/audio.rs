/*
 * Meeting Assistant CLI - Rust Edition
 * Copyright (c) 2024 Meeting Assistant Contributors
 *
 * This work is licensed under the Creative Commons Attribution-NonCommercial 4.0 International License.
 * To view a copy of this license, visit http://creativecommons.org/licenses/by-nc/4.0/
 *
 * You are free to share and adapt this work for non-commercial purposes with attribution.
 * Commercial use is prohibited without explicit written permission.
 *
 * For commercial licensing inquiries, please contact the project maintainers.
 */

//! PCM helpers shared by the ingest adapter, finalization pipeline, and retranscription core:
//! WAV encoding via `hound`, RMS energy for silence detection, and linear resampling.

use crate::error::CoreResult;
use std::path::Path;

/// Root-mean-square energy of a float PCM buffer. Below `0.01` the original system treats a
/// segment as silent (SPEC_FULL.md section 4.E step 5.a).
pub const SILENCE_RMS_THRESHOLD: f32 = 0.01;

pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

pub fn is_silent(samples: &[f32]) -> bool {
    rms_energy(samples) < SILENCE_RMS_THRESHOLD
}

pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / i16::MAX as f32).collect()
}

pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).collect()
}

/// Linear resampler. Good enough for speech-band audio going into an STT service; the original
/// system's real-time path performs the same kind of simple rate conversion before handing
/// samples to the transcription client.
pub fn resample_linear(samples: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    if from_hz == to_hz || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = to_hz as f64 / from_hz as f64;
    let out_len = ((samples.len() as f64) * ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        let a = samples.get(idx).copied().unwrap_or(0.0);
        let b = samples.get(idx + 1).copied().unwrap_or(a);
        out.push(a + (b - a) * frac);
    }
    out
}

/// Writes a mono, 16-bit PCM WAV file at the given sample rate.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate_hz: u32) -> CoreResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Reads a WAV file as mono f32 samples, downmixing stereo if present.
pub fn read_wav_as_f32(path: &Path) -> CoreResult<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().filter_map(Result::ok).collect(),
        hound::SampleFormat::Int => reader
            .samples::<i32>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / (1i64 << (spec.bits_per_sample - 1)) as f32)
            .collect(),
    };

    let mono = if spec.channels == 2 {
        samples.chunks(2).map(|c| (c[0] + c.get(1).copied().unwrap_or(c[0])) / 2.0).collect()
    } else {
        samples
    };

    Ok((mono, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_detection_threshold() {
        let silent = vec![0.001_f32; 1000];
        let loud = vec![0.5_f32; 1000];
        assert!(is_silent(&silent));
        assert!(!is_silent(&loud));
    }

    #[test]
    fn resample_preserves_length_ratio() {
        let samples = vec![0.0_f32; 48000];
        let resampled = resample_linear(&samples, 48000, 24000);
        assert_eq!(resampled.len(), 24000);
    }

    #[test]
    fn resample_noop_when_rates_match() {
        let samples = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(resample_linear(&samples, 24000, 24000), samples);
    }

    #[test]
    fn wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        let samples: Vec<i16> = (0..16000).map(|i| (i % 100) as i16 * 100).collect();
        write_wav(&path, &samples, 16000).unwrap();
        let (read_back, rate) = read_wav_as_f32(&path).unwrap();
        assert_eq!(rate, 16000);
        assert_eq!(read_back.len(), samples.len());
    }
}
