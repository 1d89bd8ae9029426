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

//! Speaker diarization RPC client (SPEC_FULL.md section 6): request/response shapes for the
//! internal diarization microservice, with a single-speaker fallback when it's unavailable.

use crate::error::CoreResult;
use crate::types::SpeakerSegment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
struct DiarizeRequest<'a> {
    audio_data: String,
    file_format: &'a str,
    session_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
struct DiarizeSegmentResponse {
    start_time: f64,
    end_time: f64,
    speaker_label: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DiarizeResponse {
    success: bool,
    #[serde(default)]
    segments: Vec<DiarizeSegmentResponse>,
    #[serde(default)]
    error_message: Option<String>,
}

#[async_trait]
pub trait Diarizer: Send + Sync {
    /// On service failure or an empty result, callers should fall back to a single whole-audio
    /// segment (SPEC_FULL.md section 4.E step 3) rather than propagate the error.
    async fn diarize(&self, session_id: Uuid, file_format: &str, audio_bytes: &[u8]) -> CoreResult<Vec<SpeakerSegment>>;
}

pub struct HttpDiarizer {
    client: reqwest::Client,
    url: String,
}

impl HttpDiarizer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl Diarizer for HttpDiarizer {
    async fn diarize(&self, session_id: Uuid, file_format: &str, audio_bytes: &[u8]) -> CoreResult<Vec<SpeakerSegment>> {
        let request = DiarizeRequest { audio_data: hex_encode(audio_bytes), file_format, session_id };
        let response = self.client.post(&self.url).json(&request).send().await?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }
        let parsed: DiarizeResponse = match response.json().await {
            Ok(p) => p,
            Err(_) => return Ok(Vec::new()),
        };
        if !parsed.success {
            tracing::warn!(error = ?parsed.error_message, "diarization service reported failure");
            return Ok(Vec::new());
        }
        Ok(parsed
            .segments
            .into_iter()
            .map(|s| SpeakerSegment { start_s: s.start_time, end_s: s.end_time, label: s.speaker_label })
            .collect())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Synthesizes the single-speaker fallback used whenever diarization is unavailable or returns
/// no segments (SPEC_FULL.md section 4.E step 3, scenario 6).
pub fn single_speaker_fallback(duration_s: f64) -> Vec<SpeakerSegment> {
    vec![SpeakerSegment { start_s: 0.0, end_s: duration_s, label: "Speaker 1".to_string() }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_spans_full_duration() {
        let segments = single_speaker_fallback(42.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_s, 0.0);
        assert_eq!(segments[0].end_s, 42.0);
        assert_eq!(segments[0].label, "Speaker 1");
    }

    #[tokio::test]
    async fn http_client_parses_segments() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/diarize")
            .with_status(200)
            .with_body(r#"{"success":true,"segments":[{"start_time":0.0,"end_time":3.0,"speaker_label":"speaker_0","duration":3.0}],"speaker_count":1,"processing_time_ms":5}"#)
            .create_async()
            .await;

        let client = HttpDiarizer::new(format!("{}/diarize", server.url()), Duration::from_secs(5)).unwrap();
        let segments = client.diarize(Uuid::new_v4(), "wav", b"fakeaudio").await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].label, "speaker_0");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_client_falls_back_on_service_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/diarize").with_status(500).create_async().await;

        let client = HttpDiarizer::new(format!("{}/diarize", server.url()), Duration::from_secs(5)).unwrap();
        let segments = client.diarize(Uuid::new_v4(), "wav", b"fakeaudio").await.unwrap();
        assert!(segments.is_empty());
        mock.assert_async().await;
    }
}
