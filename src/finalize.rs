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

//! Finalization Pipeline (SPEC_FULL.md section 4.D). Ported from
//! `original_source/backend/app/services.py::SessionService.finalize_session`: drain the
//! ephemeral store, assemble and upload audio, persist the transcript, and — the load-bearing
//! invariant — always reach `completed` even when the audio or transcript steps fail.

use crate::audio::write_wav;
use crate::clients::objectstore::{raw_capture_path, ObjectStore};
use crate::codec::transcode_wav_to_mp3;
use crate::error::{CoreError, CoreResult};
use crate::registry::{SessionRegistry, SessionUpdate};
use crate::store::EphemeralStore;
use crate::types::{AudioFile, AudioFormat, Session, SessionStatus, Transcript, UploadStatus};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct FinalizationPipeline {
    registry: Arc<dyn SessionRegistry>,
    store: Arc<dyn EphemeralStore>,
    object_store: Arc<dyn ObjectStore>,
    temp_dir: std::path::PathBuf,
    codec_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct FinalizationResult {
    pub session: Option<Session>,
    pub audio_file: Option<AudioFile>,
    pub transcript: Option<Transcript>,
    pub warnings: Vec<String>,
}

impl FinalizationPipeline {
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        store: Arc<dyn EphemeralStore>,
        object_store: Arc<dyn ObjectStore>,
        temp_dir: std::path::PathBuf,
        codec_timeout: Duration,
    ) -> Self {
        Self { registry, store, object_store, temp_dir, codec_timeout }
    }

    pub async fn finalize(&self, session_id: Uuid, caller_id: Uuid) -> CoreResult<FinalizationResult> {
        // Step 1: load + ownership check.
        let session = self.registry.get_by_id(session_id, Some(caller_id)).await?;

        // Idempotence short-circuit: a session already completed does not repeat steps 3-5.
        if session.status == SessionStatus::Completed {
            return Ok(FinalizationResult { session: Some(session), ..Default::default() });
        }

        let mut result = FinalizationResult::default();

        // Step 2: drain the ephemeral store.
        let audio_chunks = self.store.list_audio(session_id).await.map_err(|_| {
            CoreError::TransientStore(format!("failed to drain audio for session {session_id}"))
        })?;
        let transcription_segments = self.store.list_transcriptions(session_id).await.map_err(|_| {
            CoreError::TransientStore(format!("failed to drain transcriptions for session {session_id}"))
        })?;

        // Step 3: audio assembly. Failures here are downgraded to warnings; finalization must
        // still reach `completed`.
        let mut duration_s: Option<f64> = None;
        if !audio_chunks.is_empty() {
            match self.assemble_and_upload_audio(&session, &audio_chunks).await {
                Ok(audio_file) => {
                    duration_s = Some(audio_file.duration_s);
                    result.audio_file = Some(audio_file);
                }
                Err(err) => {
                    tracing::warn!(session_id = %session_id, error = %err, "audio assembly failed during finalization");
                    result.warnings.push(format!("audio assembly failed: {err}"));
                }
            }
        }

        // Step 4: transcript assembly.
        if !transcription_segments.is_empty() {
            let content = transcription_segments
                .iter()
                .filter(|s| !s.text.trim().is_empty())
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let word_count = content.split_whitespace().count();
            let transcript = Transcript {
                id: Uuid::new_v4(),
                session_id,
                content,
                segments: transcription_segments,
                language: session.language.clone(),
                word_count,
                model_id: "agent_microservice".to_string(),
            };
            result.transcript = Some(transcript);
        }

        // Step 5: session status update. Must succeed regardless of steps 3/4 outcome.
        let update = SessionUpdate {
            status: Some(SessionStatus::Completed),
            duration_s: duration_s.map(|d| d.round() as i64),
            ended_at: Some(Utc::now()),
            ..Default::default()
        };
        let updated_session = self.transition_to_completed(session_id, update).await?;
        result.session = Some(updated_session);

        // Step 6: clear the store. Always safe to repeat.
        let _ = self.store.clear_audio(session_id).await;
        let _ = self.store.clear_transcriptions(session_id).await;

        Ok(result)
    }

    /// Reaches `completed` via the normal `recording -> processing -> completed` path when
    /// possible, or directly when the session was already in `processing` from a prior partial
    /// attempt — mirroring the original's try/except fallback that always lands on `completed`.
    async fn transition_to_completed(&self, session_id: Uuid, update: SessionUpdate) -> CoreResult<Session> {
        let current = self.registry.get_by_id(session_id, None).await?;
        if current.status != SessionStatus::Processing {
            self.registry
                .update(session_id, None, SessionUpdate { status: Some(SessionStatus::Processing), ..Default::default() })
                .await?;
        }
        self.registry.update(session_id, None, update).await
    }

    async fn assemble_and_upload_audio(
        &self,
        session: &Session,
        chunks: &[crate::types::AudioChunk],
    ) -> CoreResult<AudioFile> {
        let sample_rate_hz = chunks.first().map(|c| c.sample_rate_hz).unwrap_or(24000);
        let combined: Vec<i16> = chunks.iter().flat_map(|c| c.pcm.iter().copied()).collect();
        let duration_s = combined.len() as f64 / sample_rate_hz as f64;

        let wav_path = self.temp_dir.join(format!("{}_{}.wav", session.id, Utc::now().timestamp_millis()));
        let mp3_path = self.temp_dir.join(format!("{}_{}.mp3", session.id, Utc::now().timestamp_millis()));
        write_wav(&wav_path, &combined, sample_rate_hz)?;

        let transcode_result = transcode_wav_to_mp3(&wav_path, &mp3_path, self.codec_timeout).await;
        let _ = std::fs::remove_file(&wav_path);
        transcode_result?;

        let mp3_bytes = std::fs::read(&mp3_path)?;
        let size_bytes = mp3_bytes.len() as u64;
        let _ = std::fs::remove_file(&mp3_path);

        let storage_path = raw_capture_path(session.owner_id, session.id, Utc::now().timestamp_millis());
        let upload = self.object_store.upload(&storage_path, mp3_bytes, "audio/mpeg").await?;

        Ok(AudioFile {
            id: Uuid::new_v4(),
            session_id: session.id,
            owner_id: session.owner_id,
            storage_path: upload.path,
            public_url: upload.public_url,
            size_bytes,
            duration_s,
            format: AudioFormat::Mp3,
            sample_rate_hz,
            upload_status: UploadStatus::Completed,
        })
    }
}
