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

//! External audio-codec tool invocation (SPEC_FULL.md section 4.D step 3.c): ffmpeg subprocess
//! plumbing for one-shot transcodes. Finalization needs a single conversion rather than a
//! long-lived recording process, so this is a plain spawn-wait-kill wrapper, not a graceful
//! shutdown state machine.

use crate::error::CoreError;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Transcodes `input_wav` to MP3 at 128kbps, writing to `output_mp3`. Bounded by `timeout`;
/// SPEC_FULL.md section 4.D uses 60s for ordinary finalization and 300s for large conversions.
pub async fn transcode_wav_to_mp3(input_wav: &Path, output_mp3: &Path, timeout: Duration) -> Result<(), CoreError> {
    let mut child = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(input_wav)
        .arg("-codec:a")
        .arg("libmp3lame")
        .arg("-b:a")
        .arg("128k")
        .arg(output_mp3)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| CoreError::CodecFailure(format!("failed to spawn ffmpeg: {e}")))?;

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(CoreError::CodecFailure(format!("ffmpeg wait failed: {e}"))),
        Err(_) => {
            let _ = child.kill().await;
            return Err(CoreError::CodecFailure("ffmpeg transcode timed out".to_string()));
        }
    };

    if !status.success() {
        return Err(CoreError::CodecFailure(format!("ffmpeg exited with status {status}")));
    }

    Ok(())
}

/// Converts an arbitrary audio container to mono 16kHz 16-bit WAV, used by retranscription when
/// the persisted media isn't already a WAV.
pub async fn convert_to_wav(input: &Path, output_wav: &Path, timeout: Duration) -> Result<(), CoreError> {
    let mut child = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-ac")
        .arg("1")
        .arg("-ar")
        .arg("16000")
        .arg(output_wav)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| CoreError::CodecFailure(format!("failed to spawn ffmpeg: {e}")))?;

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(CoreError::CodecFailure(format!("ffmpeg wait failed: {e}"))),
        Err(_) => {
            let _ = child.kill().await;
            return Err(CoreError::CodecFailure("ffmpeg wav conversion timed out".to_string()));
        }
    };

    if !status.success() {
        return Err(CoreError::CodecFailure(format!("ffmpeg exited with status {status}")));
    }

    Ok(())
}
