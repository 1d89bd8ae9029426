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

//! Speech-to-text RPC client (SPEC_FULL.md section 6): the internal STT microservice's
//! `{audio_data: {...}} -> {success, text, ...}` JSON contract.

use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
struct AudioData {
    sample_rate: u32,
    audio_array: Vec<f32>,
    format: &'static str,
    duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
struct TranscribeRequest {
    audio_data: AudioData,
    session_id: Uuid,
    language: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TranscribeResponse {
    success: bool,
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence_score: f32,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    pub confidence: f32,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(
        &self,
        session_id: Uuid,
        language: &str,
        sample_rate: u32,
        audio: Vec<f32>,
    ) -> CoreResult<Transcription>;
}

pub struct HttpSpeechToText {
    client: reqwest::Client,
    url: String,
}

impl HttpSpeechToText {
    pub fn new(url: impl Into<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechToText {
    async fn transcribe(
        &self,
        session_id: Uuid,
        language: &str,
        sample_rate: u32,
        audio: Vec<f32>,
    ) -> CoreResult<Transcription> {
        let duration_seconds = audio.len() as f64 / sample_rate as f64;
        let request = TranscribeRequest {
            audio_data: AudioData { sample_rate, audio_array: audio, format: "pcm_f32", duration_seconds },
            session_id,
            language: language.to_string(),
        };

        let response = self.client.post(&self.url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(CoreError::ServiceUnavailable {
                service: "stt",
                reason: format!("status {}", response.status()),
            });
        }

        let parsed: TranscribeResponse = response.json().await?;
        if !parsed.success {
            return Err(CoreError::ServiceUnavailable {
                service: "stt",
                reason: parsed.error_message.unwrap_or_else(|| "transcription failed".to_string()),
            });
        }

        Ok(Transcription { text: clean_transcript(&parsed.text), confidence: parsed.confidence_score })
    }
}

/// Strips bracketed meta-tokens (e.g. `<|en|>`) the STT service may emit, matching
/// `original_source`'s `re.sub(r'<\|[^|]*\|>', '', text)`.
pub fn clean_transcript(raw: &str) -> String {
    let re = Regex::new(r"<\|[^|]*\|>").expect("static regex is valid");
    re.replace_all(raw, "").trim().to_string()
}

/// True if the cleaned text carries no transcribable content (empty, whitespace, or
/// punctuation-only), per SPEC_FULL.md section 4.E step 5.c.
pub fn is_empty_transcript(text: &str) -> bool {
    !text.chars().any(|c| c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_meta_tokens() {
        assert_eq!(clean_transcript("<|en|> hello world"), "hello world");
        assert_eq!(clean_transcript("hello <|nospeech|>"), "hello");
    }

    #[test]
    fn detects_empty_transcript() {
        assert!(is_empty_transcript(""));
        assert!(is_empty_transcript("   "));
        assert!(is_empty_transcript("..."));
        assert!(!is_empty_transcript("ok"));
    }

    #[tokio::test]
    async fn http_client_parses_success_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/transcribe")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"text":"<|en|> hi there","confidence_score":0.95,"processing_time_ms":10}"#)
            .create_async()
            .await;

        let client = HttpSpeechToText::new(format!("{}/transcribe", server.url()), Duration::from_secs(5)).unwrap();
        let result = client.transcribe(Uuid::new_v4(), "en", 24000, vec![0.0; 240]).await.unwrap();
        assert_eq!(result.text, "hi there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_client_surfaces_service_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/transcribe")
            .with_status(200)
            .with_body(r#"{"success":false,"error_message":"model overloaded"}"#)
            .create_async()
            .await;

        let client = HttpSpeechToText::new(format!("{}/transcribe", server.url()), Duration::from_secs(5)).unwrap();
        let err = client.transcribe(Uuid::new_v4(), "en", 24000, vec![0.0; 240]).await.unwrap_err();
        assert!(matches!(err, CoreError::ServiceUnavailable { .. }));
        mock.assert_async().await;
    }
}
