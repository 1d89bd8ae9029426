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

//! SQLite-backed durable storage for transcripts and audio files, behind the `sqlite-storage`
//! feature. The ephemeral store and session registry stay in-memory/cache-shaped per SPEC_FULL.md
//! sections 4.A/4.B; transcripts and audio file records are the one part of the model meant to
//! outlive a process restart, so they get a real backing table instead of a `HashMap`.
//!
//! Query shape (`sqlx::query`/`query_as` over positional `?` placeholders, `SqlitePoolOptions`)
//! follows a plain runtime-query style rather than the compile-time `sqlx::query!` macros.

use crate::error::{CoreError, CoreResult};
use crate::retranscribe::{AudioFileLookup, TranscriptRepository};
use crate::types::{AudioFile, AudioFormat, Transcript, TranscriptionSegment, UploadStatus};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Opens a SQLite pool at `database_url` and applies the two tables this module owns. Intended
/// to be called once at process startup alongside `Config::load()`.
pub async fn connect(database_url: &str) -> CoreResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| CoreError::TransientStore(format!("failed to connect to {database_url}: {e}")))?;
    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> CoreResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transcripts (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            content TEXT NOT NULL,
            segments_json TEXT NOT NULL,
            language TEXT NOT NULL,
            word_count INTEGER NOT NULL,
            model_id TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS audio_files (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            public_url TEXT,
            size_bytes INTEGER NOT NULL,
            duration_s REAL NOT NULL,
            format TEXT NOT NULL,
            sample_rate_hz INTEGER NOT NULL,
            upload_status TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::TransientStore(err.to_string())
    }
}

pub struct SqliteTranscriptRepository {
    pool: SqlitePool,
}

impl SqliteTranscriptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TranscriptRepository for SqliteTranscriptRepository {
    async fn delete_for_session(&self, session_id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM transcripts WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save(&self, transcript: Transcript) -> CoreResult<()> {
        let segments_json = serde_json::to_string(&transcript.segments)?;
        sqlx::query(
            "INSERT INTO transcripts (id, session_id, content, segments_json, language, word_count, model_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET content = excluded.content, segments_json = excluded.segments_json,
                 word_count = excluded.word_count",
        )
        .bind(transcript.id.to_string())
        .bind(transcript.session_id.to_string())
        .bind(&transcript.content)
        .bind(&segments_json)
        .bind(&transcript.language)
        .bind(transcript.word_count as i64)
        .bind(&transcript.model_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct SqliteAudioFileLookup {
    pool: SqlitePool,
}

impl SqliteAudioFileLookup {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, audio_file: &AudioFile) -> CoreResult<()> {
        let format = match audio_file.format {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        };
        let upload_status = match audio_file.upload_status {
            UploadStatus::Pending => "pending",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        };
        sqlx::query(
            "INSERT INTO audio_files (id, session_id, owner_id, storage_path, public_url, size_bytes,
                duration_s, format, sample_rate_hz, upload_status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(audio_file.id.to_string())
        .bind(audio_file.session_id.to_string())
        .bind(audio_file.owner_id.to_string())
        .bind(&audio_file.storage_path)
        .bind(&audio_file.public_url)
        .bind(audio_file.size_bytes as i64)
        .bind(audio_file.duration_s)
        .bind(format)
        .bind(audio_file.sample_rate_hz as i64)
        .bind(upload_status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AudioFileLookup for SqliteAudioFileLookup {
    async fn find_completed(&self, session_id: Uuid) -> CoreResult<Option<AudioFile>> {
        let row = sqlx::query(
            "SELECT id, session_id, owner_id, storage_path, public_url, size_bytes, duration_s,
                format, sample_rate_hz, upload_status
             FROM audio_files
             WHERE session_id = ? AND upload_status = 'completed'
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        let format = match row.try_get::<String, _>("format")?.as_str() {
            "wav" => AudioFormat::Wav,
            "mp3" => AudioFormat::Mp3,
            other => return Err(CoreError::CodecFailure(format!("unknown stored audio format: {other}"))),
        };
        let upload_status = match row.try_get::<String, _>("upload_status")?.as_str() {
            "pending" => UploadStatus::Pending,
            "completed" => UploadStatus::Completed,
            "failed" => UploadStatus::Failed,
            other => return Err(CoreError::CodecFailure(format!("unknown stored upload status: {other}"))),
        };

        Ok(Some(AudioFile {
            id: parse_uuid(&row, "id")?,
            session_id: parse_uuid(&row, "session_id")?,
            owner_id: parse_uuid(&row, "owner_id")?,
            storage_path: row.try_get("storage_path")?,
            public_url: row.try_get("public_url")?,
            size_bytes: row.try_get::<i64, _>("size_bytes")? as u64,
            duration_s: row.try_get("duration_s")?,
            format,
            sample_rate_hz: row.try_get::<i64, _>("sample_rate_hz")? as u32,
            upload_status,
        }))
    }
}

fn parse_uuid(row: &sqlx::sqlite::SqliteRow, column: &str) -> CoreResult<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|e| CoreError::CodecFailure(format!("stored uuid in column {column} is invalid: {e}")))
}

/// Loads the full segment list and language/content fields back out for a session, bypassing the
/// `TranscriptRepository` trait (which is write/delete only, matching what the finalization and
/// retranscription pipelines need). Used by read paths such as a transcript-fetch endpoint.
pub async fn load_transcript(pool: &SqlitePool, session_id: Uuid) -> CoreResult<Option<Transcript>> {
    let row = sqlx::query(
        "SELECT id, session_id, content, segments_json, language, word_count, model_id
         FROM transcripts WHERE session_id = ?",
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else { return Ok(None) };
    let segments_json: String = row.try_get("segments_json")?;
    let segments: Vec<TranscriptionSegment> = serde_json::from_str(&segments_json)?;

    Ok(Some(Transcript {
        id: parse_uuid(&row, "id")?,
        session_id: parse_uuid(&row, "session_id")?,
        content: row.try_get("content")?,
        segments,
        language: row.try_get("language")?,
        word_count: row.try_get::<i64, _>("word_count")? as usize,
        model_id: row.try_get("model_id")?,
    }))
}
