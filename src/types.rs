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

//! Core data model (SPEC_FULL.md section 3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Recording,
    Paused,
    Processing,
    Completed,
    Cancelled,
    Archived,
}

impl SessionStatus {
    /// True if `self -> next` is a legal transition per the session state machine.
    ///
    /// `Cancelled` and `Archived` are absorbing; `recording <-> paused` is free; the
    /// `recording -> processing -> completed` path is reserved for the finalization pipeline,
    /// which is why `update()` in the registry takes `owner: Option<Uuid>` (`None` bypasses the
    /// ownership filter for internal-service callers) alongside this check.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        if matches!(self, Cancelled | Archived) {
            return false;
        }
        matches!(
            (self, next),
            (Created, Recording)
                | (Created, Cancelled)
                | (Recording, Paused)
                | (Paused, Recording)
                | (Recording, Processing)
                | (Recording, Cancelled)
                | (Paused, Cancelled)
                | (Processing, Completed)
                | (_, Archived)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub language: String,
    pub status: SessionStatus,
    pub template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_s: i64,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    pub fn new(owner_id: Uuid, title: impl Into<String>, language: impl Into<String>) -> Self {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            owner_id,
            title: title.into(),
            language: language.into(),
            status: SessionStatus::Created,
            template_id: None,
            created_at: now,
            updated_at: now,
            ended_at: None,
            duration_s: 0,
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    pub index: u32,
    pub speaker: String,
    pub start_s: f64,
    pub end_s: f64,
    pub text: String,
    pub confidence: f32,
    pub is_final: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSegment {
    pub start_s: f64,
    pub end_s: f64,
    pub label: String,
}

impl SpeakerSegment {
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}

/// A buffered chunk of raw audio awaiting finalization. Produced only by the realtime ingest
/// adapter, consumed only by the finalization pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunk {
    pub pcm: Vec<i16>,
    pub sample_rate_hz: u32,
    pub timestamp: DateTime<Utc>,
    pub duration_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFile {
    pub id: Uuid,
    pub session_id: Uuid,
    pub owner_id: Uuid,
    pub storage_path: String,
    pub public_url: Option<String>,
    pub size_bytes: u64,
    pub duration_s: f64,
    pub format: AudioFormat,
    pub sample_rate_hz: u32,
    pub upload_status: UploadStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub session_id: Uuid,
    pub content: String,
    pub segments: Vec<TranscriptionSegment>,
    pub language: String,
    pub word_count: usize,
    pub model_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Started,
    Success,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProgress {
    pub step: String,
    pub percent: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub status: TaskStatus,
    pub progress: TaskProgress,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new_pending() -> Self {
        Task {
            id: Uuid::new_v4(),
            status: TaskStatus::Pending,
            progress: TaskProgress { step: "initializing".into(), percent: 0 },
            result: None,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        assert!(SessionStatus::Created.can_transition_to(SessionStatus::Recording));
        assert!(SessionStatus::Recording.can_transition_to(SessionStatus::Paused));
        assert!(SessionStatus::Paused.can_transition_to(SessionStatus::Recording));
        assert!(SessionStatus::Processing.can_transition_to(SessionStatus::Completed));
        assert!(!SessionStatus::Completed.can_transition_to(SessionStatus::Recording));
        assert!(!SessionStatus::Cancelled.can_transition_to(SessionStatus::Recording));
        assert!(!SessionStatus::Created.can_transition_to(SessionStatus::Processing));
    }

    #[test]
    fn task_terminal_states() {
        assert!(TaskStatus::Success.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Started.is_terminal());
    }
}
