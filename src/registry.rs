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

//! Session Registry (SPEC_FULL.md section 4.B): authoritative per-session metadata and the
//! state-machine-guarded `update()` entry point that every lifecycle transition routes through.

use crate::clients::objectstore::ObjectStore;
use crate::error::{CoreError, CoreResult};
use crate::types::{Session, SessionStatus};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Fields an `update()` call may change. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub title: Option<String>,
    pub duration_s: Option<i64>,
    pub ended_at: Option<chrono::DateTime<Utc>>,
}

#[async_trait]
pub trait SessionRegistry: Send + Sync {
    async fn create(&self, session: Session) -> CoreResult<Session>;

    /// `owner` of `None` means an internal-service caller: skips the ownership filter.
    async fn get_by_id(&self, id: Uuid, owner: Option<Uuid>) -> CoreResult<Session>;

    async fn list_by_owner(&self, owner: Uuid, limit: usize, offset: usize) -> CoreResult<Vec<Session>>;

    async fn update(&self, id: Uuid, owner: Option<Uuid>, update: SessionUpdate) -> CoreResult<Session>;

    async fn update_template(&self, id: Uuid, template_id: Uuid, owner: Uuid) -> CoreResult<Session>;

    /// Best-effort cascade: the row is removed first, then referenced media is deleted from the
    /// object store. Media-delete failures are reported but never fail the session delete.
    async fn delete(&self, id: Uuid, owner: Option<Uuid>) -> CoreResult<Vec<String>>;
}

struct Record {
    session: Session,
    media_paths: Vec<String>,
}

/// In-memory registry backing tests and single-process deployments. A `sqlx`-backed
/// implementation of the same trait is the production counterpart; the locking and
/// transition-validation discipline here is what it must preserve.
pub struct InMemoryRegistry {
    sessions: RwLock<HashMap<Uuid, Record>>,
    object_store: Arc<dyn ObjectStore>,
}

impl InMemoryRegistry {
    pub fn new(object_store: Arc<dyn ObjectStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            object_store,
        }
    }

    pub fn register_media(&self, id: Uuid, path: String) -> CoreResult<()> {
        let mut guard = self.sessions.write();
        let record = guard
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("session not found: {id}")))?;
        record.media_paths.push(path);
        Ok(())
    }
}

fn check_owner(session: &Session, owner: Option<Uuid>) -> CoreResult<()> {
    match owner {
        Some(owner_id) if owner_id != session.owner_id => {
            Err(CoreError::Forbidden(format!("caller does not own session {}", session.id)))
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl SessionRegistry for InMemoryRegistry {
    async fn create(&self, session: Session) -> CoreResult<Session> {
        let mut guard = self.sessions.write();
        if guard.contains_key(&session.id) {
            return Err(CoreError::InvalidInput(format!("session already exists: {}", session.id)));
        }
        let out = session.clone();
        guard.insert(session.id, Record { session, media_paths: Vec::new() });
        Ok(out)
    }

    async fn get_by_id(&self, id: Uuid, owner: Option<Uuid>) -> CoreResult<Session> {
        let guard = self.sessions.read();
        let record = guard
            .get(&id)
            .ok_or_else(|| CoreError::NotFound(format!("session not found: {id}")))?;
        check_owner(&record.session, owner)?;
        Ok(record.session.clone())
    }

    async fn list_by_owner(&self, owner: Uuid, limit: usize, offset: usize) -> CoreResult<Vec<Session>> {
        let guard = self.sessions.read();
        let mut matches: Vec<Session> = guard
            .values()
            .filter(|r| r.session.owner_id == owner)
            .map(|r| r.session.clone())
            .collect();
        matches.sort_by_key(|s| s.created_at);
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn update(&self, id: Uuid, owner: Option<Uuid>, update: SessionUpdate) -> CoreResult<Session> {
        let mut guard = self.sessions.write();
        let record = guard
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("session not found: {id}")))?;
        check_owner(&record.session, owner)?;

        if let Some(next) = update.status {
            if !record.session.status.can_transition_to(next) {
                return Err(CoreError::InvalidStateTransition(format!(
                    "{:?} -> {:?} is not a legal transition for session {}",
                    record.session.status, next, id
                )));
            }
            record.session.status = next;
        }
        if let Some(title) = update.title {
            record.session.title = title;
        }
        if let Some(duration) = update.duration_s {
            record.session.duration_s = duration;
        }
        if let Some(ended_at) = update.ended_at {
            record.session.ended_at = Some(ended_at);
        }
        record.session.updated_at = Utc::now();
        Ok(record.session.clone())
    }

    async fn update_template(&self, id: Uuid, template_id: Uuid, owner: Uuid) -> CoreResult<Session> {
        let mut guard = self.sessions.write();
        let record = guard
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("session not found: {id}")))?;
        check_owner(&record.session, Some(owner))?;
        record.session.template_id = Some(template_id);
        record.session.updated_at = Utc::now();
        Ok(record.session.clone())
    }

    async fn delete(&self, id: Uuid, owner: Option<Uuid>) -> CoreResult<Vec<String>> {
        let media_paths = {
            let mut guard = self.sessions.write();
            let record = guard
                .get(&id)
                .ok_or_else(|| CoreError::NotFound(format!("session not found: {id}")))?;
            check_owner(&record.session, owner)?;
            let paths = record.media_paths.clone();
            guard.remove(&id);
            paths
        };

        let mut failures = Vec::new();
        for path in media_paths {
            if let Err(err) = self.object_store.delete(&path).await {
                tracing::warn!(session_id = %id, path = %path, error = %err, "failed to delete session media");
                failures.push(path);
            }
        }
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::objectstore::InMemoryObjectStore;

    fn registry() -> InMemoryRegistry {
        InMemoryRegistry::new(Arc::new(InMemoryObjectStore::new()))
    }

    #[tokio::test]
    async fn create_then_get() {
        let reg = registry();
        let owner = Uuid::new_v4();
        let session = Session::new(owner, "standup", "en");
        let created = reg.create(session.clone()).await.unwrap();
        let fetched = reg.get_by_id(created.id, Some(owner)).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.status, SessionStatus::Created);
    }

    #[tokio::test]
    async fn ownership_mismatch_is_forbidden() {
        let reg = registry();
        let owner = Uuid::new_v4();
        let session = Session::new(owner, "standup", "en");
        let created = reg.create(session).await.unwrap();
        let err = reg.get_by_id(created.id, Some(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn illegal_transition_rejected() {
        let reg = registry();
        let owner = Uuid::new_v4();
        let session = Session::new(owner, "standup", "en");
        let created = reg.create(session).await.unwrap();
        let err = reg
            .update(created.id, Some(owner), SessionUpdate { status: Some(SessionStatus::Processing), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition(_)));
    }

    #[tokio::test]
    async fn recording_pause_resume_lifecycle() {
        let reg = registry();
        let owner = Uuid::new_v4();
        let session = Session::new(owner, "standup", "en");
        let created = reg.create(session).await.unwrap();
        reg.update(created.id, Some(owner), SessionUpdate { status: Some(SessionStatus::Recording), ..Default::default() })
            .await
            .unwrap();
        reg.update(created.id, Some(owner), SessionUpdate { status: Some(SessionStatus::Paused), ..Default::default() })
            .await
            .unwrap();
        let resumed = reg
            .update(created.id, Some(owner), SessionUpdate { status: Some(SessionStatus::Recording), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(resumed.status, SessionStatus::Recording);
    }

    #[tokio::test]
    async fn internal_caller_bypasses_ownership() {
        let reg = registry();
        let owner = Uuid::new_v4();
        let session = Session::new(owner, "standup", "en");
        let created = reg.create(session).await.unwrap();
        let fetched = reg.get_by_id(created.id, None).await.unwrap();
        assert_eq!(fetched.id, created.id);
    }
}
