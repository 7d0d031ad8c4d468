//! Speech transcription through an external ASR command.
//!
//! The command is invoked the way the `whisper` CLI expects:
//!
//! ```text
//! <asr> <results>/audio_16k.wav --model <model> [--language <lang>]
//!       --output_format srt --output_dir <results>
//! ```
//!
//! and the subtitle file it writes is renamed to `subtitles.srt`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pipeline::CollaboratorError;

use crate::command::ToolCommand;

pub const AUDIO_FILE: &str = "audio_16k.wav";
pub const SUBTITLES_FILE: &str = "subtitles.srt";

/// Extracts a 16 kHz mono WAV track from `media_path`.
pub async fn extract_audio(
    ffmpeg: &Path,
    media_path: &Path,
    wav_path: &Path,
    timeout: Duration,
) -> Result<(), CollaboratorError> {
    ToolCommand::new(ffmpeg)
        .args(["-y", "-v", "error", "-i"])
        .path_arg(media_path)
        .args(["-ac", "1", "-ar", "16000", "-vn"])
        .path_arg(wav_path)
        .timeout(timeout)
        .execute()
        .await?;
    Ok(())
}

/// Transcribes `media_path` into `<results_dir>/subtitles.srt`.
pub async fn transcribe_to_srt(
    ffmpeg: &Path,
    asr: &Path,
    media_path: &Path,
    results_dir: &Path,
    model: &str,
    language: &str,
    timeout: Duration,
) -> Result<PathBuf, CollaboratorError> {
    tokio::fs::create_dir_all(results_dir)
        .await
        .map_err(|e| CollaboratorError::io(results_dir, &e))?;

    let wav = results_dir.join(AUDIO_FILE);
    extract_audio(ffmpeg, media_path, &wav, timeout).await?;

    let mut cmd = ToolCommand::new(asr);
    cmd.path_arg(&wav).args(["--model", model]);
    if !language.trim().is_empty() {
        cmd.args(["--language", language]);
    }
    cmd.args(["--output_format", "srt", "--output_dir"])
        .path_arg(results_dir)
        .timeout(timeout);
    cmd.execute().await?;

    let produced = wav.with_extension("srt");
    let srt = results_dir.join(SUBTITLES_FILE);
    tokio::fs::rename(&produced, &srt)
        .await
        .map_err(|e| CollaboratorError::io(&produced, &e))?;
    Ok(srt)
}
