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

//! Standalone diagnostic: reads a diarization JSON fixture, runs the short-segment coalescing
//! pass against it, and prints the resulting segments.

use anyhow::{Context, Result};
use session_orchestrator::segment::coalesce;
use session_orchestrator::types::SpeakerSegment;
use std::path::PathBuf;

#[derive(serde::Deserialize)]
struct FixtureSegment {
    start_s: f64,
    end_s: f64,
    label: String,
}

fn main() -> Result<()> {
    session_orchestrator::init_tracing();

    let mut args = std::env::args().skip(1);
    let diarization_json = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("usage: retranscribe_audio <diarization_fixture.json>");
            eprintln!();
            eprintln!("Reads a JSON array of {{start_s, end_s, label}} diarization segments,");
            eprintln!("applies the short-segment coalescing pass, and prints the result.");
            std::process::exit(1);
        }
    };

    let raw = std::fs::read_to_string(&diarization_json)
        .with_context(|| format!("failed to read {}", diarization_json.display()))?;
    let fixture: Vec<FixtureSegment> = serde_json::from_str(&raw).context("invalid diarization fixture JSON")?;

    let segments: Vec<SpeakerSegment> = fixture
        .into_iter()
        .map(|s| SpeakerSegment { start_s: s.start_s, end_s: s.end_s, label: s.label })
        .collect();

    println!("input segments: {}", segments.len());
    let coalesced = coalesce(segments);
    println!("coalesced segments: {}", coalesced.len());
    for segment in &coalesced {
        println!(
            "  [{:.2}s - {:.2}s] {} ({:.2}s)",
            segment.start_s,
            segment.end_s,
            segment.label,
            segment.duration_s()
        );
    }

    Ok(())
}
