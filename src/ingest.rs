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

//! Realtime Ingest Adapter (SPEC_FULL.md section 4.C). A rolling byte-threshold buffer fed PCM
//! frames by whatever drives the realtime media router, through the `MediaPublisher`/frame-feeding
//! interface below, rather than owning a capture process itself.

use crate::audio::resample_linear;
use crate::clients::stt::{clean_transcript, is_empty_transcript, SpeechToText};
use crate::error::CoreResult;
use crate::store::EphemeralStore;
use crate::types::{AudioChunk, TranscriptionSegment};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A decoded PCM frame delivered by the realtime media router.
#[derive(Debug, Clone)]
pub struct PcmFrame {
    pub sample_rate_hz: u32,
    pub samples: Vec<i16>,
}

/// Publishes structured data messages back to the realtime media router, e.g. the
/// `transcription` topic of SPEC_FULL.md section 6.
#[async_trait]
pub trait MediaPublisher: Send + Sync {
    async fn publish_transcription(&self, session_id: Uuid, segment: &TranscriptionSegment) -> CoreResult<()>;
}

/// Extracts the session id from a media room name of the form `PREFIX_{uuid}`. A non-matching
/// name is a fatal configuration error per SPEC_FULL.md section 4.C.
pub fn session_id_from_room_name(room_name: &str, prefix: &str) -> Option<Uuid> {
    let stripped = room_name.strip_prefix(prefix)?.strip_prefix('_')?;
    Uuid::parse_str(stripped).ok()
}

struct RollingBuffer {
    samples: Vec<i16>,
    sample_rate_hz: u32,
}

impl RollingBuffer {
    fn new() -> Self {
        Self { samples: Vec::new(), sample_rate_hz: 0 }
    }

    fn push(&mut self, frame: &PcmFrame) {
        self.sample_rate_hz = frame.sample_rate_hz;
        self.samples.extend_from_slice(&frame.samples);
    }

    fn byte_len(&self) -> usize {
        self.samples.len() * 2
    }

    fn take_all(&mut self) -> (Vec<i16>, u32) {
        (std::mem::take(&mut self.samples), self.sample_rate_hz)
    }
}

/// One instance per live session. Flushes are serialized by construction: `on_frame` is `&mut
/// self`, so the caller drives one frame (and therefore one possible flush) at a time.
pub struct IngestAdapter {
    session_id: Uuid,
    target_rate_hz: u32,
    flush_threshold_bytes: usize,
    language: String,
    store: Arc<dyn EphemeralStore>,
    stt: Arc<dyn SpeechToText>,
    publisher: Arc<dyn MediaPublisher>,
    buffer: RollingBuffer,
    next_segment_index: AtomicU32,
    elapsed_transcribed_s: parking_lot::Mutex<f64>,
}

impl IngestAdapter {
    pub fn new(
        session_id: Uuid,
        language: impl Into<String>,
        target_rate_hz: u32,
        flush_threshold_bytes: usize,
        store: Arc<dyn EphemeralStore>,
        stt: Arc<dyn SpeechToText>,
        publisher: Arc<dyn MediaPublisher>,
    ) -> Self {
        Self {
            session_id,
            target_rate_hz,
            flush_threshold_bytes,
            language: language.into(),
            store,
            stt,
            publisher,
            buffer: RollingBuffer::new(),
            next_segment_index: AtomicU32::new(0),
            elapsed_transcribed_s: parking_lot::Mutex::new(0.0),
        }
    }

    /// Feeds one decoded frame; flushes the buffer once it reaches the configured byte
    /// threshold.
    pub async fn on_frame(&mut self, frame: PcmFrame) -> CoreResult<()> {
        self.buffer.push(&frame);
        if self.buffer.byte_len() >= self.flush_threshold_bytes {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flushes any residual buffered audio (at least 0.1s), called exactly once on session
    /// close. Cancellation mid-RPC aborts the RPC and skips the store append.
    pub async fn flush_on_close(&mut self, cancellation: &CancellationToken) -> CoreResult<()> {
        let min_samples = (self.buffer.sample_rate_hz.max(1) as f64 * 0.1) as usize;
        if self.buffer.samples.len() >= min_samples {
            tokio::select! {
                result = self.flush() => return result,
                _ = cancellation.cancelled() => return Ok(()),
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> CoreResult<()> {
        let (raw_samples, source_rate) = self.buffer.take_all();
        if raw_samples.is_empty() {
            return Ok(());
        }

        let float_samples = crate::audio::i16_to_f32(&raw_samples);
        let resampled = resample_linear(&float_samples, source_rate.max(1), self.target_rate_hz);
        let duration_s = resampled.len() as f64 / self.target_rate_hz as f64;

        let chunk = AudioChunk {
            pcm: crate::audio::f32_to_i16(&resampled),
            sample_rate_hz: self.target_rate_hz,
            timestamp: Utc::now(),
            duration_s,
        };
        self.store.append_audio(self.session_id, chunk).await?;

        let transcription = match self.stt.transcribe(self.session_id, &self.language, self.target_rate_hz, resampled).await {
            Ok(t) => t,
            Err(err) => {
                tracing::warn!(session_id = %self.session_id, error = %err, "stt rpc failed, dropping chunk");
                return Ok(());
            }
        };

        let text = clean_transcript(&transcription.text);
        if is_empty_transcript(&text) {
            return Ok(());
        }

        let mut elapsed = self.elapsed_transcribed_s.lock();
        let start_s = *elapsed;
        let end_s = start_s + duration_s;
        *elapsed = end_s;
        drop(elapsed);

        let index = self.next_segment_index.fetch_add(1, Ordering::SeqCst);
        let segment = TranscriptionSegment {
            index,
            speaker: "Speaker 1".to_string(),
            start_s,
            end_s,
            text,
            confidence: transcription.confidence,
            is_final: true,
        };

        self.publisher.publish_transcription(self.session_id, &segment).await?;
        self.store.append_transcription(self.session_id, segment).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::sync::Mutex as StdMutex;

    struct FixedStt {
        text: String,
    }

    #[async_trait]
    impl SpeechToText for FixedStt {
        async fn transcribe(&self, _session_id: Uuid, _language: &str, _sample_rate: u32, _audio: Vec<f32>) -> CoreResult<crate::clients::stt::Transcription> {
            Ok(crate::clients::stt::Transcription { text: self.text.clone(), confidence: 0.9 })
        }
    }

    struct RecordingPublisher {
        published: StdMutex<Vec<TranscriptionSegment>>,
    }

    #[async_trait]
    impl MediaPublisher for RecordingPublisher {
        async fn publish_transcription(&self, _session_id: Uuid, segment: &TranscriptionSegment) -> CoreResult<()> {
            self.published.lock().unwrap().push(segment.clone());
            Ok(())
        }
    }

    fn loud_frame(sample_rate: u32, n: usize) -> PcmFrame {
        let samples: Vec<i16> = (0..n).map(|i| if i % 2 == 0 { 20000 } else { -20000 }).collect();
        PcmFrame { sample_rate_hz: sample_rate, samples }
    }

    #[test]
    fn room_name_parsing() {
        let id = Uuid::new_v4();
        let name = format!("session_{id}");
        assert_eq!(session_id_from_room_name(&name, "session"), Some(id));
        assert_eq!(session_id_from_room_name("other_room", "session"), None);
    }

    #[tokio::test]
    async fn flush_threshold_triggers_store_append_and_publish() {
        let store: Arc<dyn EphemeralStore> = Arc::new(InMemoryStore::new());
        let stt: Arc<dyn SpeechToText> = Arc::new(FixedStt { text: "hello there".to_string() });
        let publisher = Arc::new(RecordingPublisher { published: StdMutex::new(Vec::new()) });
        let session_id = Uuid::new_v4();

        let mut adapter = IngestAdapter::new(
            session_id,
            "en",
            24000,
            48000 * 2 / 2, // ~0.5s at 24kHz int16
            store.clone(),
            stt,
            publisher.clone(),
        );

        adapter.on_frame(loud_frame(24000, 48000)).await.unwrap();

        let audio = store.list_audio(session_id).await.unwrap();
        assert_eq!(audio.len(), 1);
        let transcripts = store.list_transcriptions(session_id).await.unwrap();
        assert_eq!(transcripts.len(), 1);
        assert_eq!(transcripts[0].text, "hello there");
        assert_eq!(transcripts[0].index, 0);
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn silent_audio_is_still_appended_to_the_store() {
        // No silence gate on the ingest flush path (SPEC_FULL.md section 4.C): the store's audio
        // list must conserve every sample received, even when the STT RPC yields no usable text.
        let store: Arc<dyn EphemeralStore> = Arc::new(InMemoryStore::new());
        let stt: Arc<dyn SpeechToText> = Arc::new(FixedStt { text: String::new() });
        let publisher = Arc::new(RecordingPublisher { published: StdMutex::new(Vec::new()) });
        let session_id = Uuid::new_v4();

        let mut adapter = IngestAdapter::new(session_id, "en", 24000, 1000, store.clone(), stt, publisher);
        let silent = PcmFrame { sample_rate_hz: 24000, samples: vec![0; 24000] };
        adapter.on_frame(silent).await.unwrap();

        assert_eq!(store.list_audio(session_id).await.unwrap().len(), 1);
        // Empty STT text still yields no transcription segment.
        assert!(store.list_transcriptions(session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn flush_on_close_skips_tiny_residual() {
        let store: Arc<dyn EphemeralStore> = Arc::new(InMemoryStore::new());
        let stt: Arc<dyn SpeechToText> = Arc::new(FixedStt { text: "x".to_string() });
        let publisher = Arc::new(RecordingPublisher { published: StdMutex::new(Vec::new()) });
        let session_id = Uuid::new_v4();

        let mut adapter = IngestAdapter::new(session_id, "en", 24000, usize::MAX, store.clone(), stt, publisher);
        adapter.on_frame(loud_frame(24000, 100)).await.unwrap();
        adapter.flush_on_close(&CancellationToken::new()).await.unwrap();

        assert!(store.list_audio(session_id).await.unwrap().is_empty());
    }
}
