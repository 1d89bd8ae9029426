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

//! Three-pass short-segment coalescing (SPEC_FULL.md section 4.E step 4), ported directly from
//! `original_source/backend/app/audio_processing_service.py::_merge_adjacent_short_segments`.
//! Retranscription-only: the finalization pipeline does not run this (see DESIGN.md open
//! question 2).

use crate::types::SpeakerSegment;

const SAME_SPEAKER_MERGE_THRESHOLD_S: f64 = 5.0;
const FORCED_MERGE_THRESHOLD_S: f64 = 2.0;
const MIN_SEGMENT_DURATION_S: f64 = 1.0;

pub fn coalesce(segments: Vec<SpeakerSegment>) -> Vec<SpeakerSegment> {
    let pass1 = merge_same_speaker_short_pairs(segments);
    let pass2 = force_merge_short_segments(pass1);
    drop_sub_minimum(pass2)
}

/// Pass 1: merge consecutive segments sharing a label when both are shorter than 5s.
fn merge_same_speaker_short_pairs(segments: Vec<SpeakerSegment>) -> Vec<SpeakerSegment> {
    let mut merged = Vec::with_capacity(segments.len());
    let mut iter = segments.into_iter().peekable();

    while let Some(current) = iter.next() {
        if let Some(next) = iter.peek() {
            let same_speaker = current.label == next.label;
            let both_short = current.duration_s() < SAME_SPEAKER_MERGE_THRESHOLD_S
                && next.duration_s() < SAME_SPEAKER_MERGE_THRESHOLD_S;
            if same_speaker && both_short {
                let next = iter.next().expect("peeked Some");
                merged.push(SpeakerSegment { start_s: current.start_s, end_s: next.end_s, label: current.label });
                continue;
            }
        }
        merged.push(current);
    }
    merged
}

/// Pass 2: any segment shorter than 2s merges into its chronological successor (label becomes
/// the successor's); a trailing short segment merges backward into its predecessor instead
/// (label becomes the predecessor's).
fn force_merge_short_segments(segments: Vec<SpeakerSegment>) -> Vec<SpeakerSegment> {
    let mut result: Vec<SpeakerSegment> = Vec::with_capacity(segments.len());
    let mut i = 0;

    while i < segments.len() {
        let current = &segments[i];
        let is_last = i == segments.len() - 1;

        if current.duration_s() < FORCED_MERGE_THRESHOLD_S && !is_last {
            let next = &segments[i + 1];
            result.push(SpeakerSegment { start_s: current.start_s, end_s: next.end_s, label: next.label.clone() });
            i += 2;
            continue;
        }

        if current.duration_s() < FORCED_MERGE_THRESHOLD_S && is_last {
            if let Some(prev) = result.pop() {
                result.push(SpeakerSegment { start_s: prev.start_s, end_s: current.end_s, label: prev.label });
                i += 1;
                continue;
            }
        }

        result.push(current.clone());
        i += 1;
    }

    result
}

/// Pass 3: drop any segment whose final duration is below 1s.
fn drop_sub_minimum(segments: Vec<SpeakerSegment>) -> Vec<SpeakerSegment> {
    let before = segments.len();
    let kept: Vec<SpeakerSegment> = segments.into_iter().filter(|s| s.duration_s() >= MIN_SEGMENT_DURATION_S).collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        tracing::debug!(dropped, "coalescing dropped sub-1s segments");
    }
    kept
}
