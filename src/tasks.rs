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

//! Task store backing the Task Status API (SPEC_FULL.md section 6). Grounded on
//! `original_source/backend/api_service/routers/tasks_v2.py`'s `task_store` dict and
//! `update_task_status` overwrite-in-place semantics; the mock-progression fallback that file
//! uses for unknown/dev task ids is a demo stub and intentionally not reproduced here.

use crate::error::{CoreError, CoreResult};
use crate::types::{Task, TaskProgress, TaskStatus};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

pub mod progress {
    pub const INITIALIZING: (u8, &str) = (0, "initializing");
    pub const FINDING_AUDIO: (u8, &str) = (15, "finding_audio");
    pub const DOWNLOADING_AUDIO: (u8, &str) = (25, "downloading_audio");
    pub const CLEANING_OLD_DATA: (u8, &str) = (35, "cleaning_old_data");
    pub const PROCESSING_AUDIO: (u8, &str) = (50, "processing_audio");
    pub const COMPLETED: (u8, &str) = (100, "completed");
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self) -> CoreResult<Task>;
    async fn get(&self, id: Uuid) -> CoreResult<Task>;
    async fn update_progress(&self, id: Uuid, percent: u8, step: &str) -> CoreResult<()>;
    async fn finish_success(&self, id: Uuid, result: serde_json::Value) -> CoreResult<()>;
    async fn finish_failure(&self, id: Uuid, error: String) -> CoreResult<()>;
    async fn cancel(&self, id: Uuid) -> CoreResult<()>;
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutate(&self, id: Uuid, f: impl FnOnce(&mut Task) -> CoreResult<()>) -> CoreResult<()> {
        let mut guard = self.tasks.write();
        let task = guard.get_mut(&id).ok_or_else(|| CoreError::NotFound(format!("task not found: {id}")))?;
        if task.status.is_terminal() {
            return Err(CoreError::InvalidStateTransition(format!("task {id} is already in a terminal state")));
        }
        f(task)?;
        task.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self) -> CoreResult<Task> {
        let task = Task::new_pending();
        self.tasks.write().insert(task.id, task.clone());
        Ok(task)
    }

    async fn get(&self, id: Uuid) -> CoreResult<Task> {
        self.tasks.read().get(&id).cloned().ok_or_else(|| CoreError::NotFound(format!("task not found: {id}")))
    }

    async fn update_progress(&self, id: Uuid, percent: u8, step: &str) -> CoreResult<()> {
        self.mutate(id, |task| {
            task.status = TaskStatus::Started;
            task.progress = TaskProgress { step: step.to_string(), percent };
            Ok(())
        })
    }

    async fn finish_success(&self, id: Uuid, result: serde_json::Value) -> CoreResult<()> {
        self.mutate(id, |task| {
            task.status = TaskStatus::Success;
            task.progress = TaskProgress { step: "completed".to_string(), percent: 100 };
            task.result = Some(result);
            Ok(())
        })
    }

    async fn finish_failure(&self, id: Uuid, error: String) -> CoreResult<()> {
        self.mutate(id, |task| {
            task.status = TaskStatus::Failed;
            task.error = Some(error);
            Ok(())
        })
    }

    async fn cancel(&self, id: Uuid) -> CoreResult<()> {
        self.mutate(id, |task| {
            task.status = TaskStatus::Cancelled;
            task.error = Some("Task cancelled by user".to_string());
            Ok(())
        })
    }
}
