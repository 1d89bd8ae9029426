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

//! Retranscription / Task Tracker (SPEC_FULL.md section 4.E). Ported from
//! `original_source/backend/app/audio_processing_service.py`'s diarize-coalesce-segment-
//! transcribe pipeline and `routers/sessions_v2.py`'s progress-marker sequence.

use crate::audio::{is_silent, read_wav_as_f32, resample_linear};
use crate::clients::diarization::{single_speaker_fallback, Diarizer};
use crate::clients::objectstore::ObjectStore;
use crate::clients::stt::{clean_transcript, is_empty_transcript, SpeechToText};
use crate::codec::convert_to_wav;
use crate::error::{CoreError, CoreResult};
use crate::registry::SessionRegistry;
use crate::segment::coalesce;
use crate::tasks::{progress, TaskStore};
use crate::types::{AudioFile, SpeakerSegment, Transcript, TranscriptionSegment};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait AudioFileLookup: Send + Sync {
    /// Finds the most recent completed-upload AudioFile for a session.
    async fn find_completed(&self, session_id: Uuid) -> CoreResult<Option<AudioFile>>;
}

#[async_trait::async_trait]
pub trait TranscriptRepository: Send + Sync {
    async fn delete_for_session(&self, session_id: Uuid) -> CoreResult<()>;
    async fn save(&self, transcript: Transcript) -> CoreResult<()>;
}

pub struct RetranscriptionPipeline {
    registry: Arc<dyn SessionRegistry>,
    audio_files: Arc<dyn AudioFileLookup>,
    transcripts: Arc<dyn TranscriptRepository>,
    object_store: Arc<dyn ObjectStore>,
    diarizer: Arc<dyn Diarizer>,
    stt: Arc<dyn SpeechToText>,
    tasks: Arc<dyn TaskStore>,
    temp_dir: std::path::PathBuf,
    codec_timeout: Duration,
}

impl RetranscriptionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        audio_files: Arc<dyn AudioFileLookup>,
        transcripts: Arc<dyn TranscriptRepository>,
        object_store: Arc<dyn ObjectStore>,
        diarizer: Arc<dyn Diarizer>,
        stt: Arc<dyn SpeechToText>,
        tasks: Arc<dyn TaskStore>,
        temp_dir: std::path::PathBuf,
        codec_timeout: Duration,
    ) -> Self {
        Self { registry, audio_files, transcripts, object_store, diarizer, stt, tasks, temp_dir, codec_timeout }
    }

    /// Returns immediately with a task id; the body below is expected to be driven by a spawned
    /// task (see `run`).
    pub async fn start(&self, session_id: Uuid, caller_id: Uuid) -> CoreResult<Uuid> {
        self.registry.get_by_id(session_id, Some(caller_id)).await?;
        let task = self.tasks.create().await?;
        Ok(task.id)
    }

    /// Runs the retranscription body for a previously-created task. Intended to be spawned onto
    /// a background executor by the caller immediately after `start`.
    pub async fn run(&self, task_id: Uuid, session_id: Uuid, caller_id: Uuid, language: &str, cancellation: CancellationToken) {
        if let Err(err) = self.run_inner(task_id, session_id, caller_id, language, &cancellation).await {
            if matches!(err, CoreError::Cancelled) {
                let _ = self.tasks.cancel(task_id).await;
            } else {
                let _ = self.tasks.finish_failure(task_id, err.to_string()).await;
            }
        }
    }

    async fn run_inner(
        &self,
        task_id: Uuid,
        session_id: Uuid,
        caller_id: Uuid,
        language: &str,
        cancellation: &CancellationToken,
    ) -> CoreResult<()> {
        // Step 1: authorize.
        self.registry.get_by_id(session_id, Some(caller_id)).await?;
        check_cancelled(cancellation)?;

        // Step 2: locate media.
        self.tasks.update_progress(task_id, progress::FINDING_AUDIO.0, progress::FINDING_AUDIO.1).await?;
        let audio_file = self
            .audio_files
            .find_completed(session_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("no completed media for session {session_id}")))?;
        check_cancelled(cancellation)?;

        // Step 3: download.
        self.tasks.update_progress(task_id, progress::DOWNLOADING_AUDIO.0, progress::DOWNLOADING_AUDIO.1).await?;
        let media_bytes = self.object_store.download(&audio_file.storage_path).await?;
        check_cancelled(cancellation)?;

        // Step 4: delete prior transcripts.
        self.tasks.update_progress(task_id, progress::CLEANING_OLD_DATA.0, progress::CLEANING_OLD_DATA.1).await?;
        self.transcripts.delete_for_session(session_id).await?;
        check_cancelled(cancellation)?;

        // Step 5: processing core.
        self.tasks.update_progress(task_id, progress::PROCESSING_AUDIO.0, progress::PROCESSING_AUDIO.1).await?;
        let format_tag = match audio_file.format {
            crate::types::AudioFormat::Wav => "wav",
            crate::types::AudioFormat::Mp3 => "mp3",
        };
        let outcome = self.process(session_id, format_tag, language, &media_bytes, cancellation).await?;

        let transcript = Transcript {
            id: Uuid::new_v4(),
            session_id,
            content: outcome.content.clone(),
            segments: outcome.segments.clone(),
            language: language.to_string(),
            word_count: outcome.content.split_whitespace().count(),
            model_id: "agent_microservice".to_string(),
        };
        self.transcripts.save(transcript.clone()).await?;

        // Step 6: finish.
        self.tasks
            .finish_success(
                task_id,
                serde_json::json!({
                    "transcription_id": transcript.id,
                    "duration_s": outcome.duration_s,
                    "total_segments": outcome.segments.len(),
                    "speaker_count": outcome.speaker_count,
                }),
            )
            .await?;

        Ok(())
    }

    async fn process(
        &self,
        session_id: Uuid,
        format_tag: &str,
        target_language: &str,
        media_bytes: &[u8],
        cancellation: &CancellationToken,
    ) -> CoreResult<ProcessOutcome> {
        let container_path = self.temp_dir.join(format!("{session_id}_{}.src", chrono::Utc::now().timestamp_millis()));
        std::fs::write(&container_path, media_bytes)?;
        let mut temp_files = TempFileGuard::new(container_path.clone());

        let wav_path = if format_tag == "wav" {
            container_path.clone()
        } else {
            let converted = self.temp_dir.join(format!("{session_id}_{}.wav", chrono::Utc::now().timestamp_millis()));
            convert_to_wav(&container_path, &converted, self.codec_timeout).await.ok();
            if converted.exists() {
                temp_files.track(converted.clone());
                converted
            } else {
                container_path.clone()
            }
        };

        let (full_audio, sample_rate) = read_wav_as_f32(&wav_path).unwrap_or((Vec::new(), 16000));
        let duration_s = full_audio.len() as f64 / sample_rate.max(1) as f64;

        let diarized = self.diarizer.diarize(session_id, format_tag, media_bytes).await.unwrap_or_default();
        let raw_segments = if diarized.is_empty() { single_speaker_fallback(duration_s) } else { diarized };

        let coalesced = coalesce(raw_segments);

        let mut kept_segments: Vec<TranscriptionSegment> = Vec::new();
        let mut speakers: HashSet<String> = HashSet::new();
        let mut index = 0u32;

        for speaker_segment in &coalesced {
            // `temp_files` drops (and cleans up) on this `?` propagating out, satisfying the
            // "deleted on every exit path, including error and cancellation" requirement.
            check_cancelled(cancellation)?;
            if let Some(text_segment) = self
                .transcribe_speaker_segment(session_id, speaker_segment, &full_audio, sample_rate, target_language, index)
                .await?
            {
                speakers.insert(speaker_segment.label.clone());
                kept_segments.push(text_segment);
                index += 1;
            }
        }

        drop(temp_files);

        kept_segments.sort_by(|a, b| a.start_s.partial_cmp(&b.start_s).unwrap_or(std::cmp::Ordering::Equal));
        for (i, seg) in kept_segments.iter_mut().enumerate() {
            seg.index = i as u32;
        }

        let content = kept_segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");

        Ok(ProcessOutcome { content, segments: kept_segments, duration_s, speaker_count: speakers.len() })
    }

    async fn transcribe_speaker_segment(
        &self,
        session_id: Uuid,
        speaker_segment: &SpeakerSegment,
        full_audio: &[f32],
        sample_rate: u32,
        language: &str,
        index: u32,
    ) -> CoreResult<Option<TranscriptionSegment>> {
        let start_idx = ((speaker_segment.start_s * sample_rate as f64) as usize).min(full_audio.len());
        let end_idx = ((speaker_segment.end_s * sample_rate as f64) as usize).min(full_audio.len());
        if start_idx >= end_idx {
            return Ok(None);
        }
        let slice = &full_audio[start_idx..end_idx];

        if is_silent(slice) {
            tracing::debug!(session_id = %session_id, start_s = speaker_segment.start_s, "skipping silent segment");
            return Ok(None);
        }

        let resampled = resample_linear(slice, sample_rate, 24000);
        let transcription = self.stt.transcribe(session_id, language, 24000, resampled).await?;
        let text = clean_transcript(&transcription.text);
        if is_empty_transcript(&text) {
            return Ok(None);
        }

        Ok(Some(TranscriptionSegment {
            index,
            speaker: speaker_segment.label.clone(),
            start_s: speaker_segment.start_s,
            end_s: speaker_segment.end_s,
            text,
            confidence: transcription.confidence,
            is_final: true,
        }))
    }
}

struct ProcessOutcome {
    content: String,
    segments: Vec<TranscriptionSegment>,
    duration_s: f64,
    speaker_count: usize,
}

/// Removes every tracked temp file when dropped, so a `?` out of the middle of `process` (a
/// cancellation or a transcription failure) still cleans up the container/WAV it wrote.
struct TempFileGuard {
    paths: Vec<std::path::PathBuf>,
}

impl TempFileGuard {
    fn new(first: std::path::PathBuf) -> Self {
        Self { paths: vec![first] }
    }

    fn track(&mut self, path: std::path::PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn check_cancelled(token: &CancellationToken) -> CoreResult<()> {
    if token.is_cancelled() {
        Err(CoreError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::objectstore::InMemoryObjectStore;
    use crate::registry::InMemoryRegistry;
    use crate::tasks::InMemoryTaskStore;
    use crate::types::{Session, TaskStatus};
    use async_trait::async_trait;
    use parking_lot::RwLock as PLRwLock;
    use std::collections::HashMap;

    struct FixedDiarizer {
        segments: Vec<SpeakerSegment>,
    }

    #[async_trait]
    impl Diarizer for FixedDiarizer {
        async fn diarize(&self, _session_id: Uuid, _format: &str, _bytes: &[u8]) -> CoreResult<Vec<SpeakerSegment>> {
            Ok(self.segments.clone())
        }
    }

    struct SilenceAwareStt;

    #[async_trait]
    impl SpeechToText for SilenceAwareStt {
        async fn transcribe(&self, _session_id: Uuid, _language: &str, _sample_rate: u32, audio: Vec<f32>) -> CoreResult<crate::clients::stt::Transcription> {
            Ok(crate::clients::stt::Transcription { text: format!("words-{}", audio.len()), confidence: 0.8 })
        }
    }

    struct InMemoryAudioFiles {
        file: Option<AudioFile>,
    }

    #[async_trait]
    impl AudioFileLookup for InMemoryAudioFiles {
        async fn find_completed(&self, _session_id: Uuid) -> CoreResult<Option<AudioFile>> {
            Ok(self.file.clone())
        }
    }

    #[derive(Default)]
    struct InMemoryTranscripts {
        saved: PLRwLock<HashMap<Uuid, Transcript>>,
    }

    #[async_trait]
    impl TranscriptRepository for InMemoryTranscripts {
        async fn delete_for_session(&self, session_id: Uuid) -> CoreResult<()> {
            self.saved.write().retain(|_, t| t.session_id != session_id);
            Ok(())
        }
        async fn save(&self, transcript: Transcript) -> CoreResult<()> {
            self.saved.write().insert(transcript.id, transcript);
            Ok(())
        }
    }

    fn write_fixture_wav(dir: &std::path::Path, seconds: f64, sample_rate: u32) -> std::path::PathBuf {
        let n = (seconds * sample_rate as f64) as usize;
        let samples: Vec<i16> = (0..n).map(|i| if i % 2 == 0 { 10000 } else { -10000 }).collect();
        let path = dir.join("fixture.wav");
        crate::audio::write_wav(&path, &samples, sample_rate).unwrap();
        path
    }

    #[tokio::test]
    async fn coalesces_and_transcribes_segments() {
        let dir = tempfile::tempdir().unwrap();
        let wav_path = write_fixture_wav(dir.path(), 10.0, 16000);
        let media_bytes = std::fs::read(&wav_path).unwrap();

        let object_store = Arc::new(InMemoryObjectStore::new());
        let owner = Uuid::new_v4();
        let registry = Arc::new(InMemoryRegistry::new(object_store.clone()));
        let session = registry.create(Session::new(owner, "s", "en")).await.unwrap();

        let audio_file = AudioFile {
            id: Uuid::new_v4(),
            session_id: session.id,
            owner_id: owner,
            storage_path: "raw/owner/session.wav".to_string(),
            public_url: None,
            size_bytes: media_bytes.len() as u64,
            duration_s: 10.0,
            format: crate::types::AudioFormat::Wav,
            sample_rate_hz: 16000,
            upload_status: crate::types::UploadStatus::Completed,
        };
        object_store.upload(&audio_file.storage_path, media_bytes, "audio/wav").await.unwrap();

        let diarizer = Arc::new(FixedDiarizer {
            segments: vec![
                SpeakerSegment { start_s: 0.0, end_s: 3.0, label: "A".into() },
                SpeakerSegment { start_s: 3.0, end_s: 4.0, label: "A".into() },
                SpeakerSegment { start_s: 4.0, end_s: 10.0, label: "B".into() },
            ],
        });

        let pipeline = RetranscriptionPipeline::new(
            registry,
            Arc::new(InMemoryAudioFiles { file: Some(audio_file) }),
            Arc::new(InMemoryTranscripts::default()),
            object_store,
            diarizer,
            Arc::new(SilenceAwareStt),
            Arc::new(InMemoryTaskStore::new()),
            dir.path().to_path_buf(),
            Duration::from_secs(5),
        );

        let task_id = pipeline.start(session.id, owner).await.unwrap();
        pipeline.run(task_id, session.id, owner, "en", CancellationToken::new()).await;

        let task = pipeline.tasks.get(task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        let result = task.result.unwrap();
        assert_eq!(result["total_segments"], 2);
    }

    #[tokio::test]
    async fn diarization_unavailable_falls_back_to_single_speaker() {
        let dir = tempfile::tempdir().unwrap();
        let wav_path = write_fixture_wav(dir.path(), 5.0, 16000);
        let media_bytes = std::fs::read(&wav_path).unwrap();

        let object_store = Arc::new(InMemoryObjectStore::new());
        let owner = Uuid::new_v4();
        let registry = Arc::new(InMemoryRegistry::new(object_store.clone()));
        let session = registry.create(Session::new(owner, "s", "en")).await.unwrap();

        let audio_file = AudioFile {
            id: Uuid::new_v4(),
            session_id: session.id,
            owner_id: owner,
            storage_path: "raw/owner/session.wav".to_string(),
            public_url: None,
            size_bytes: media_bytes.len() as u64,
            duration_s: 5.0,
            format: crate::types::AudioFormat::Wav,
            sample_rate_hz: 16000,
            upload_status: crate::types::UploadStatus::Completed,
        };
        object_store.upload(&audio_file.storage_path, media_bytes, "audio/wav").await.unwrap();

        let pipeline = RetranscriptionPipeline::new(
            registry,
            Arc::new(InMemoryAudioFiles { file: Some(audio_file) }),
            Arc::new(InMemoryTranscripts::default()),
            object_store,
            Arc::new(FixedDiarizer { segments: Vec::new() }),
            Arc::new(SilenceAwareStt),
            Arc::new(InMemoryTaskStore::new()),
            dir.path().to_path_buf(),
            Duration::from_secs(5),
        );

        let task_id = pipeline.start(session.id, owner).await.unwrap();
        pipeline.run(task_id, session.id, owner, "en", CancellationToken::new()).await;

        let task = pipeline.tasks.get(task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert_eq!(task.result.unwrap()["speaker_count"], 1);
    }

    #[tokio::test]
    async fn missing_media_fails_the_task() {
        let object_store = Arc::new(InMemoryObjectStore::new());
        let owner = Uuid::new_v4();
        let registry = Arc::new(InMemoryRegistry::new(object_store.clone()));
        let session = registry.create(Session::new(owner, "s", "en")).await.unwrap();

        let pipeline = RetranscriptionPipeline::new(
            registry,
            Arc::new(InMemoryAudioFiles { file: None }),
            Arc::new(InMemoryTranscripts::default()),
            object_store,
            Arc::new(FixedDiarizer { segments: Vec::new() }),
            Arc::new(SilenceAwareStt),
            Arc::new(InMemoryTaskStore::new()),
            std::env::temp_dir(),
            Duration::from_secs(5),
        );

        let task_id = pipeline.start(session.id, owner).await.unwrap();
        pipeline.run(task_id, session.id, owner, "en", CancellationToken::new()).await;

        let task = pipeline.tasks.get(task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }
}
