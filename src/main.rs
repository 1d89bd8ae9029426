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

//! Process entry point. The core has no interactive CLI surface (SPEC_FULL.md section 6); this
//! binary loads configuration, wires the components together, and exits. An HTTP router,
//! realtime media transport, and database driver are intentionally left to the service that
//! embeds this crate as a library.

use anyhow::Result;
use clap::Parser;
use session_orchestrator::config::Config;

#[derive(Parser, Debug)]
#[command(name = "session-orchestrator", about = "Session orchestration core: ephemeral buffering, finalization, and retranscription")]
struct Cli {
    /// Load configuration and exit without starting any component.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    session_orchestrator::init_tracing();

    let cli = Cli::parse();
    let config = Config::load()?;

    tracing::info!(
        model_id = %config.model_id,
        target_sample_rate_hz = config.target_sample_rate_hz,
        "configuration loaded"
    );

    if cli.check_config {
        println!("configuration OK");
        return Ok(());
    }

    #[cfg(feature = "sqlite-storage")]
    {
        let pool = session_orchestrator::persistence::connect(&config.database_url).await?;
        tracing::info!(database_url = %config.database_url, "durable storage migrated");
        drop(pool);
    }

    tracing::info!("session orchestration core initialized; embed as a library to drive ingest, finalization, and retranscription");
    Ok(())
}
