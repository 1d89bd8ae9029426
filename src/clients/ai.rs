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

//! AI summary/title generation (SPEC_FULL.md section 4.F, design note 9). An ordered list of
//! providers sharing a common `generate` contract, tried in priority order with fall-through on
//! failure, plus a deterministic rule-based fallback when every provider fails. Ordered dispatch
//! only; no installable or hot-loadable plugin machinery.

use crate::error::CoreResult;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct GenerationUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub cost_usd: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub model_used: String,
    pub usage: GenerationUsage,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> CoreResult<Generation>;
}

/// Generic chat-completions-shaped HTTP provider. One instance per configured
/// `AI_PROVIDER_URLS` / `AI_PROVIDER_API_KEYS` pair (SPEC_FULL.md config), tried in the order
/// they're configured.
pub struct HttpChatProvider {
    name: String,
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl HttpChatProvider {
    pub fn new(name: impl Into<String>, url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { name: name.into(), client, url: url.into(), api_key: api_key.into(), model: model.into() })
    }
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[async_trait]
impl AiProvider for HttpChatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> CoreResult<Generation> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(crate::error::CoreError::ServiceUnavailable {
                service: "ai_provider",
                reason: format!("{} returned status {}", self.name, response.status()),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(Generation {
            text,
            model_used: parsed.model.unwrap_or_else(|| self.model.clone()),
            usage: GenerationUsage {
                prompt_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
                completion_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
                cost_usd: None,
            },
        })
    }
}

/// Dispatches across an ordered list of providers, falling through to the next on any failure.
pub struct AiSummarizer {
    providers: Vec<Box<dyn AiProvider>>,
}

impl AiSummarizer {
    pub fn new(providers: Vec<Box<dyn AiProvider>>) -> Self {
        Self { providers }
    }

    async fn generate_with_fallback(&self, system_prompt: &str, user_prompt: &str) -> Option<Generation> {
        for provider in &self.providers {
            match provider.generate(system_prompt, user_prompt).await {
                Ok(generation) => return Some(generation),
                Err(err) => {
                    tracing::warn!(provider = provider.name(), error = %err, "ai provider failed, trying next");
                }
            }
        }
        None
    }

    /// Produces a markdown summary of a transcript, falling back to a deterministic minimal
    /// summary if every provider fails.
    pub async fn summarize(&self, transcript_text: &str) -> String {
        let system = "Summarize the following meeting transcript in markdown with key points.";
        match self.generate_with_fallback(system, transcript_text).await {
            Some(generation) if !generation.text.trim().is_empty() => generation.text,
            _ => rule_based_summary(transcript_text),
        }
    }

    /// Produces a short title, falling back to a timestamped default.
    pub async fn title(&self, transcript_text: &str) -> String {
        let system = "Produce a short plain-text title (no punctuation at the end) for this transcript.";
        match self.generate_with_fallback(system, transcript_text).await {
            Some(generation) if !generation.text.trim().is_empty() => generation.text.trim().to_string(),
            _ => rule_based_title(),
        }
    }
}

fn rule_based_summary(transcript_text: &str) -> String {
    let word_count = transcript_text.split_whitespace().count();
    let preview: String = transcript_text.split_whitespace().take(40).collect::<Vec<_>>().join(" ");
    format!("## Summary\n\n{word_count} words transcribed.\n\n{preview}{}", if word_count > 40 { "..." } else { "" })
}

fn rule_based_title() -> String {
    format!("Session {}", Utc::now().format("%Y-%m-%d %H:%M UTC"))
}
