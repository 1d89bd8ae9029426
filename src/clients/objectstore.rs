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

//! Object store client (SPEC_FULL.md section 6). The concrete backend is out of scope; this is
//! the thin upload/download/delete contract the finalization and retranscription pipelines need.

use crate::config::ServiceEndpoints;
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub path: String,
    pub public_url: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> CoreResult<UploadResult>;
    async fn download(&self, path: &str) -> CoreResult<Vec<u8>>;
    async fn delete(&self, path: &str) -> CoreResult<()>;
}

/// HTTP-backed object store client. Request/response shapes follow a generic
/// presigned-upload-gateway contract (PUT bytes to `{base_url}/{path}`, GET to download,
/// DELETE to remove).
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpObjectStore {
    pub fn new(endpoints: &ServiceEndpoints, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: endpoints.object_store_url.clone(),
            token: endpoints.object_store_token.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> CoreResult<UploadResult> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CoreError::ServiceUnavailable {
                service: "object_store",
                reason: format!("upload failed with status {}", response.status()),
            });
        }

        #[derive(serde::Deserialize)]
        struct UploadResponse {
            public_url: Option<String>,
        }
        let parsed: UploadResponse = response.json().await.unwrap_or(UploadResponse { public_url: None });

        Ok(UploadResult { path: path.to_string(), public_url: parsed.public_url })
    }

    async fn download(&self, path: &str) -> CoreResult<Vec<u8>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        let response = self.client.get(&url).bearer_auth(&self.token).send().await?;
        if !response.status().is_success() {
            return Err(CoreError::NotFound(format!("object not found at {path}")));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, path: &str) -> CoreResult<()> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        let response = self.client.delete(&url).bearer_auth(&self.token).send().await?;
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(CoreError::ServiceUnavailable {
                service: "object_store",
                reason: format!("delete failed with status {}", response.status()),
            });
        }
        Ok(())
    }
}

/// In-memory object store used by tests.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> CoreResult<UploadResult> {
        self.objects.write().insert(path.to_string(), bytes);
        Ok(UploadResult { path: path.to_string(), public_url: Some(format!("memory://{path}")) })
    }

    async fn download(&self, path: &str) -> CoreResult<Vec<u8>> {
        self.objects
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("object not found at {path}")))
    }

    async fn delete(&self, path: &str) -> CoreResult<()> {
        self.objects.write().remove(path);
        Ok(())
    }
}

/// Builds the storage path for a live-session capture, per SPEC_FULL.md section 6.
pub fn raw_capture_path(owner_id: uuid::Uuid, session_id: uuid::Uuid, epoch_ms: i64) -> String {
    format!("raw/{owner_id}/{session_id}_{epoch_ms}.mp3")
}

/// Builds the storage path for a batch-imported capture, per SPEC_FULL.md section 6.
pub fn batch_import_path(owner_id: uuid::Uuid, session_id: uuid::Uuid, epoch_ms: i64) -> String {
    format!("batch-transcription/{owner_id}/{session_id}_{epoch_ms}.mp3")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trip() {
        let store = InMemoryObjectStore::new();
        let upload = store.upload("raw/a/b.mp3", vec![1, 2, 3], "audio/mpeg").await.unwrap();
        assert_eq!(upload.path, "raw/a/b.mp3");
        let downloaded = store.download("raw/a/b.mp3").await.unwrap();
        assert_eq!(downloaded, vec![1, 2, 3]);
        store.delete("raw/a/b.mp3").await.unwrap();
        assert!(store.download("raw/a/b.mp3").await.is_err());
    }

    #[test]
    fn path_conventions() {
        let owner = uuid::Uuid::nil();
        let session = uuid::Uuid::nil();
        assert!(raw_capture_path(owner, session, 0).starts_with("raw/"));
        assert!(batch_import_path(owner, session, 0).starts_with("batch-transcription/"));
    }
}
