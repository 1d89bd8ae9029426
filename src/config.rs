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

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Endpoint + credential configuration for every external collaborator the core talks to.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub stt_url: String,
    pub diarization_url: String,
    pub ai_provider_urls: Vec<String>,
    pub ai_provider_api_keys: Vec<String>,
    pub object_store_url: String,
    pub object_store_token: String,
    pub ephemeral_store_url: String,
    pub internal_service_token: String,
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub rpc_timeout: Duration,
    pub codec_timeout: Duration,
    pub large_conversion_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(30),
            codec_timeout: Duration::from_secs(60),
            large_conversion_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub services: ServiceEndpoints,
    pub timeouts: TimeoutConfig,
    pub model_id: String,
    pub target_sample_rate_hz: u32,
    pub ingest_flush_threshold_bytes: usize,
    pub room_prefix: String,
    pub temp_dir: PathBuf,
    /// SQLite connection string for the durable transcript/audio-file tables (`persistence.rs`,
    /// behind the `sqlite-storage` feature). Defaults to a file under `temp_dir` so a bare
    /// checkout still starts without extra setup.
    pub database_url: String,
}

impl Config {
    /// Loads configuration from the environment (with `.env` support for local development).
    /// Required variables that are missing are a startup failure, not a runtime error.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let services = ServiceEndpoints {
            stt_url: env::var("STT_SERVICE_URL").context("STT_SERVICE_URL environment variable not found")?,
            diarization_url: env::var("DIARIZATION_SERVICE_URL")
                .context("DIARIZATION_SERVICE_URL environment variable not found")?,
            ai_provider_urls: split_list(&env::var("AI_PROVIDER_URLS").unwrap_or_default()),
            ai_provider_api_keys: split_list(&env::var("AI_PROVIDER_API_KEYS").unwrap_or_default()),
            object_store_url: env::var("OBJECT_STORE_URL").context("OBJECT_STORE_URL environment variable not found")?,
            object_store_token: env::var("OBJECT_STORE_TOKEN").context("OBJECT_STORE_TOKEN environment variable not found")?,
            ephemeral_store_url: env::var("EPHEMERAL_STORE_URL")
                .unwrap_or_else(|_| "memory://local".to_string()),
            internal_service_token: env::var("INTERNAL_SERVICE_TOKEN")
                .context("INTERNAL_SERVICE_TOKEN environment variable not found")?,
        };

        let rpc_timeout_s = env::var("RPC_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .unwrap_or(30);
        let codec_timeout_s = env::var("CODEC_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .unwrap_or(60);
        let large_conversion_timeout_s = env::var("LARGE_CONVERSION_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()
            .unwrap_or(300);

        let timeouts = TimeoutConfig {
            rpc_timeout: Duration::from_secs(rpc_timeout_s),
            codec_timeout: Duration::from_secs(codec_timeout_s),
            large_conversion_timeout: Duration::from_secs(large_conversion_timeout_s),
        };

        let model_id = env::var("MODEL_ID").unwrap_or_else(|_| "agent_microservice".to_string());

        let target_sample_rate_hz = env::var("TARGET_SAMPLE_RATE_HZ")
            .unwrap_or_else(|_| "24000".to_string())
            .parse::<u32>()
            .unwrap_or(24000);

        let ingest_flush_threshold_bytes = env::var("INGEST_FLUSH_THRESHOLD_BYTES")
            .unwrap_or_else(|_| (2 * target_sample_rate_hz as usize * 2).to_string())
            .parse::<usize>()
            .unwrap_or(2 * target_sample_rate_hz as usize * 2);

        let room_prefix = env::var("ROOM_PREFIX").unwrap_or_else(|_| "session".to_string());

        let temp_dir = env::var("TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("session-orchestrator"));

        std::fs::create_dir_all(&temp_dir).context("failed to create temporary directory")?;

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!("sqlite://{}?mode=rwc", temp_dir.join("orchestrator.db").display())
        });

        Ok(Config {
            services,
            timeouts,
            model_id,
            target_sample_rate_hz,
            ingest_flush_threshold_bytes,
            room_prefix,
            temp_dir,
            database_url,
        })
    }

    pub fn temp_file(&self, prefix: &str, extension: &str) -> PathBuf {
        let timestamp = chrono::Utc::now().timestamp_millis();
        self.temp_dir.join(format!("{prefix}_{timestamp}.{extension}"))
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
