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

//! Session orchestration core: ephemeral buffering of live multi-participant audio, finalization
//! into a persisted speaker-attributed transcript, and on-demand retranscription with progress
//! tracking. See `SPEC_FULL.md` for the component breakdown this module layout follows.

pub mod audio;
pub mod clients;
pub mod codec;
pub mod config;
pub mod error;
pub mod finalize;
pub mod ingest;
#[cfg(feature = "sqlite-storage")]
pub mod persistence;
pub mod registry;
pub mod retranscribe;
pub mod segment;
pub mod store;
pub mod tasks;
pub mod types;

use tracing_subscriber::EnvFilter;

/// Initializes the process-wide tracing subscriber. Call once at startup.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
