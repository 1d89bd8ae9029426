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

//! Ephemeral Store (SPEC_FULL.md section 4.A).
//!
//! Append-only per-session buffers for transcription segments and audio chunks, plus a small
//! key-value session state map. Every key carries a 24h TTL, refreshed on every write. The
//! reference backing store is Redis-shaped (LPUSH + EXPIRE, LRANGE + reverse); this trait keeps
//! that contract storage-agnostic so an in-memory implementation can back tests and
//! single-process deployments.

use crate::error::{CoreError, CoreResult};
use crate::types::{AudioChunk, TranscriptionSegment};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const TRANSCRIPTION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const AUDIO_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn append_transcription(&self, session_id: Uuid, segment: TranscriptionSegment) -> CoreResult<()>;
    async fn list_transcriptions(&self, session_id: Uuid) -> CoreResult<Vec<TranscriptionSegment>>;
    async fn clear_transcriptions(&self, session_id: Uuid) -> CoreResult<()>;

    async fn append_audio(&self, session_id: Uuid, chunk: AudioChunk) -> CoreResult<()>;
    async fn list_audio(&self, session_id: Uuid) -> CoreResult<Vec<AudioChunk>>;
    async fn clear_audio(&self, session_id: Uuid) -> CoreResult<()>;

    async fn set_state(&self, session_id: Uuid, kv: HashMap<String, Value>) -> CoreResult<()>;
    async fn get_state(&self, session_id: Uuid) -> CoreResult<HashMap<String, Value>>;

    /// Generic keyed cache primitives, independent of any session's transcription/audio/state
    /// entries. `ttl_s` is caller-chosen rather than the fixed 24h transcription/audio TTL.
    async fn cache_set(&self, key: String, value: Value, ttl_s: u64) -> CoreResult<()>;
    async fn cache_get(&self, key: &str) -> CoreResult<Option<Value>>;
    async fn cache_delete(&self, key: &str) -> CoreResult<()>;
}

struct Entry<T> {
    values: Vec<T>,
    expires_at: Instant,
}

/// In-process backing store used for tests and for deployments that don't need a shared cache.
/// Expired entries are swept lazily on access rather than via a background daemon.
#[derive(Default)]
pub struct InMemoryStore {
    transcriptions: RwLock<HashMap<Uuid, Entry<TranscriptionSegment>>>,
    audio: RwLock<HashMap<Uuid, Entry<AudioChunk>>>,
    state: RwLock<HashMap<Uuid, (HashMap<String, Value>, Instant)>>,
    cache: RwLock<HashMap<String, (Value, Instant)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EphemeralStore for InMemoryStore {
    async fn append_transcription(&self, session_id: Uuid, segment: TranscriptionSegment) -> CoreResult<()> {
        let mut guard = self.transcriptions.write();
        let entry = guard.entry(session_id).or_insert_with(|| Entry {
            values: Vec::new(),
            expires_at: Instant::now() + TRANSCRIPTION_TTL,
        });
        entry.values.push(segment);
        entry.expires_at = Instant::now() + TRANSCRIPTION_TTL;
        Ok(())
    }

    async fn list_transcriptions(&self, session_id: Uuid) -> CoreResult<Vec<TranscriptionSegment>> {
        let mut guard = self.transcriptions.write();
        Ok(read_live(&mut guard, session_id))
    }

    async fn clear_transcriptions(&self, session_id: Uuid) -> CoreResult<()> {
        self.transcriptions.write().remove(&session_id);
        Ok(())
    }

    async fn append_audio(&self, session_id: Uuid, chunk: AudioChunk) -> CoreResult<()> {
        let mut guard = self.audio.write();
        let entry = guard.entry(session_id).or_insert_with(|| Entry {
            values: Vec::new(),
            expires_at: Instant::now() + AUDIO_TTL,
        });
        entry.values.push(chunk);
        entry.expires_at = Instant::now() + AUDIO_TTL;
        Ok(())
    }

    async fn list_audio(&self, session_id: Uuid) -> CoreResult<Vec<AudioChunk>> {
        let mut guard = self.audio.write();
        Ok(read_live(&mut guard, session_id))
    }

    async fn clear_audio(&self, session_id: Uuid) -> CoreResult<()> {
        self.audio.write().remove(&session_id);
        Ok(())
    }

    async fn set_state(&self, session_id: Uuid, kv: HashMap<String, Value>) -> CoreResult<()> {
        self.state.write().insert(session_id, (kv, Instant::now() + TRANSCRIPTION_TTL));
        Ok(())
    }

    async fn get_state(&self, session_id: Uuid) -> CoreResult<HashMap<String, Value>> {
        let mut guard = self.state.write();
        if let Some((kv, expires_at)) = guard.get(&session_id) {
            if *expires_at < Instant::now() {
                guard.remove(&session_id);
                return Ok(HashMap::new());
            }
            return Ok(kv.clone());
        }
        Ok(HashMap::new())
    }

    async fn cache_set(&self, key: String, value: Value, ttl_s: u64) -> CoreResult<()> {
        self.cache.write().insert(key, (value, Instant::now() + Duration::from_secs(ttl_s)));
        Ok(())
    }

    async fn cache_get(&self, key: &str) -> CoreResult<Option<Value>> {
        let mut guard = self.cache.write();
        match guard.get(key) {
            Some((value, expires_at)) if *expires_at >= Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                guard.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn cache_delete(&self, key: &str) -> CoreResult<()> {
        self.cache.write().remove(key);
        Ok(())
    }
}

fn read_live<T: Clone>(guard: &mut HashMap<Uuid, Entry<T>>, session_id: Uuid) -> Vec<T> {
    match guard.get(&session_id) {
        Some(entry) if entry.expires_at >= Instant::now() => entry.values.clone(),
        Some(_) => {
            guard.remove(&session_id);
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// Maps any store failure to the *transient backing store* error kind, matching SPEC_FULL.md
/// section 7's recovery table (the finalization pipeline fails the task on this kind).
pub fn transient(reason: impl Into<String>) -> CoreError {
    CoreError::TransientStore(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn seg(index: u32, text: &str) -> TranscriptionSegment {
        TranscriptionSegment {
            index,
            speaker: "Speaker 1".into(),
            start_s: index as f64 * 2.0,
            end_s: index as f64 * 2.0 + 2.0,
            text: text.into(),
            confidence: 0.9,
            is_final: true,
        }
    }

    #[tokio::test]
    async fn append_and_list_preserves_order() {
        let store = InMemoryStore::new();
        let session = Uuid::new_v4();
        store.append_transcription(session, seg(0, "a")).await.unwrap();
        store.append_transcription(session, seg(1, "b")).await.unwrap();
        let listed = store.list_transcriptions(session).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].text, "a");
        assert_eq!(listed[1].text, "b");
    }

    #[tokio::test]
    async fn clear_empties_the_list() {
        let store = InMemoryStore::new();
        let session = Uuid::new_v4();
        store.append_transcription(session, seg(0, "a")).await.unwrap();
        store.clear_transcriptions(session).await.unwrap();
        assert!(store.list_transcriptions(session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn audio_chunk_round_trip() {
        let store = InMemoryStore::new();
        let session = Uuid::new_v4();
        let chunk = AudioChunk {
            pcm: vec![1, 2, 3],
            sample_rate_hz: 24000,
            timestamp: Utc::now(),
            duration_s: 0.5,
        };
        store.append_audio(session, chunk).await.unwrap();
        let listed = store.list_audio(session).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pcm, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unknown_session_lists_empty() {
        let store = InMemoryStore::new();
        assert!(store.list_transcriptions(Uuid::new_v4()).await.unwrap().is_empty());
        assert!(store.list_audio(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_set_then_get_round_trips() {
        let store = InMemoryStore::new();
        store.cache_set("greeting".to_string(), Value::String("hi".into()), 60).await.unwrap();
        assert_eq!(store.cache_get("greeting").await.unwrap(), Some(Value::String("hi".into())));
    }

    #[tokio::test]
    async fn cache_get_on_unknown_key_is_none() {
        let store = InMemoryStore::new();
        assert_eq!(store.cache_get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_delete_removes_the_entry() {
        let store = InMemoryStore::new();
        store.cache_set("k".to_string(), Value::Bool(true), 60).await.unwrap();
        store.cache_delete("k").await.unwrap();
        assert_eq!(store.cache_get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_entry_expires_after_ttl() {
        let store = InMemoryStore::new();
        store.cache_set("k".to_string(), Value::Bool(true), 0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(store.cache_get("k").await.unwrap(), None);
    }
}
