//! Scene segmentation and keyframe extraction.
//!
//! Scenes come from ffmpeg's content-change detector: a frame whose scene
//! score exceeds [`SCENE_CHANGE_THRESHOLD`] starts a new scene. When no cut
//! is found (a single-shot clip, or ffmpeg unavailable) the media is split
//! into fixed [`SEGMENT_SECONDS`] segments instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pipeline::{CollaboratorError, Scene};

use crate::command::ToolCommand;

/// Length of one fallback segment, in seconds.
pub const SEGMENT_SECONDS: f64 = 10.0;
/// ffmpeg `scene` score (0 to 1) above which a frame is treated as a cut.
pub const SCENE_CHANGE_THRESHOLD: f64 = 0.27;
/// Upper bound on the number of scenes per job.
pub const MAX_SCENES: usize = 12;
/// Width keyframes are scaled to; height keeps the aspect ratio.
pub const KEYFRAME_WIDTH: u32 = 720;

/// Splits `duration` into consecutive `[start, end)` segments of at most
/// `segment` seconds, keeping the first `max` of them.
pub fn fixed_segments(duration: f64, segment: f64, max: usize) -> Vec<(f64, f64)> {
    let mut out = Vec::new();
    if !(duration > 0.0 && segment > 0.0) {
        return out;
    }
    let mut t = 0.0;
    while t < duration && out.len() < max {
        let end = (t + segment).min(duration);
        out.push((t, end));
        t = end;
    }
    out
}

/// Runs ffmpeg's scene-change filter over the video stream and returns the
/// cut timestamps, in seconds.
pub async fn detect_cuts(
    ffmpeg: &Path,
    media_path: &Path,
    timeout: Duration,
) -> Result<Vec<f64>, CollaboratorError> {
    let output = ToolCommand::new(ffmpeg)
        .args(["-hide_banner", "-nostats", "-i"])
        .path_arg(media_path)
        .args(["-an", "-vf"])
        .arg(format!("select='gt(scene,{SCENE_CHANGE_THRESHOLD})',showinfo"))
        .args(["-f", "null", "-"])
        .timeout(timeout)
        .execute()
        .await?;
    Ok(parse_cut_times(&output.stderr))
}

/// Extracts `pts_time` values from ffmpeg `showinfo` log lines.
pub fn parse_cut_times(showinfo: &str) -> Vec<f64> {
    showinfo
        .lines()
        .filter(|line| line.contains("Parsed_showinfo"))
        .filter_map(|line| {
            let (_, rest) = line.split_once("pts_time:")?;
            rest.split_whitespace().next()?.parse::<f64>().ok()
        })
        .filter(|t| t.is_finite())
        .collect()
}

/// Turns cut timestamps into consecutive scenes covering the media.
///
/// The first scene starts at zero and the last ends at `duration`; when the
/// duration is unknown (zero) the last cut closes the final scene. Returns
/// no scenes when there are no usable cuts, so callers can fall back to
/// [`fixed_segments`]. At most `max` scenes are kept.
pub fn scenes_from_cuts(cuts: &[f64], duration: f64, max: usize) -> Vec<(f64, f64)> {
    let known_duration = duration.is_finite() && duration > 0.0;
    let mut bounds: Vec<f64> = cuts
        .iter()
        .copied()
        .filter(|&t| t > 0.0 && (!known_duration || t < duration))
        .collect();
    bounds.sort_by(f64::total_cmp);
    bounds.dedup();
    if bounds.is_empty() {
        return Vec::new();
    }
    bounds.insert(0, 0.0);
    if known_duration {
        bounds.push(duration);
    }
    bounds
        .windows(2)
        .map(|w| (w[0], w[1]))
        .take(max)
        .collect()
}

/// The keyframe file name for the 1-based scene `index`.
pub fn keyframe_name(index: usize) -> String {
    format!("scene_{index:02}.jpg")
}

/// Extracts one frame per segment, at its midpoint, into `frames_dir`.
///
/// Extraction is best effort: a scene whose frame could not be written keeps
/// `keyframe: None`.
pub async fn extract_scenes(
    ffmpeg: Option<&Path>,
    media_path: &Path,
    segments: &[(f64, f64)],
    frames_dir: &Path,
    timeout: Duration,
) -> Vec<Scene> {
    if ffmpeg.is_some() {
        if let Err(e) = tokio::fs::create_dir_all(frames_dir).await {
            tracing::warn!(error = %e, dir = %frames_dir.display(), "cannot create frames directory");
        }
    }

    let mut scenes = Vec::with_capacity(segments.len());
    for (i, &(start, end)) in segments.iter().enumerate() {
        let keyframe = match ffmpeg {
            Some(ffmpeg) => {
                let out = frames_dir.join(keyframe_name(i + 1));
                extract_keyframe(ffmpeg, media_path, (start + end) / 2.0, &out, timeout).await
            }
            None => None,
        };
        scenes.push(Scene {
            start,
            end,
            keyframe,
        });
    }
    scenes
}

async fn extract_keyframe(
    ffmpeg: &Path,
    media_path: &Path,
    at: f64,
    out: &Path,
    timeout: Duration,
) -> Option<PathBuf> {
    let result = ToolCommand::new(ffmpeg)
        .args(["-y", "-v", "error", "-ss"])
        .arg(format!("{at:.3}"))
        .arg("-i")
        .path_arg(media_path)
        .arg("-vf")
        .arg(format!("scale={KEYFRAME_WIDTH}:-1"))
        .args(["-frames:v", "1"])
        .path_arg(out)
        .timeout(timeout)
        .execute()
        .await;

    match result {
        Ok(_) if tokio::fs::try_exists(out).await.unwrap_or(false) => Some(out.to_path_buf()),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, at, "keyframe extraction failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_ten_second_segments() {
        let segs = fixed_segments(25.0, SEGMENT_SECONDS, MAX_SCENES);
        assert_eq!(segs, vec![(0.0, 10.0), (10.0, 20.0), (20.0, 25.0)]);
    }

    #[test]
    fn caps_the_number_of_scenes() {
        let segs = fixed_segments(600.0, SEGMENT_SECONDS, MAX_SCENES);
        assert_eq!(segs.len(), MAX_SCENES);
        assert_eq!(segs.last(), Some(&(110.0, 120.0)));
    }

    #[test]
    fn unknown_duration_yields_no_segments() {
        assert!(fixed_segments(0.0, SEGMENT_SECONDS, MAX_SCENES).is_empty());
        assert!(fixed_segments(f64::NAN, SEGMENT_SECONDS, MAX_SCENES).is_empty());
    }

    #[test]
    fn cut_times_come_from_showinfo_lines() {
        let log = "\
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':
[Parsed_showinfo_1 @ 0x600000e0c000] n:   0 pts:  49152 pts_time:3.2     duration:    512
[Parsed_showinfo_1 @ 0x600000e0c000] n:   1 pts: 122880 pts_time:8       duration:    512
[Parsed_showinfo_1 @ 0x600000e0c000] n:   2 pts: 200000 pts_time:nan
frame=    2 fps=0.0 q=-0.0 Lsize=N/A time=00:00:14.96
";
        assert_eq!(parse_cut_times(log), vec![3.2, 8.0]);
    }

    #[test]
    fn cuts_split_the_whole_duration() {
        let scenes = scenes_from_cuts(&[8.0, 3.2, 8.0], 15.0, MAX_SCENES);
        assert_eq!(scenes, vec![(0.0, 3.2), (3.2, 8.0), (8.0, 15.0)]);
    }

    #[test]
    fn cuts_without_duration_end_at_the_last_cut() {
        let scenes = scenes_from_cuts(&[3.0, 7.5], 0.0, MAX_SCENES);
        assert_eq!(scenes, vec![(0.0, 3.0), (3.0, 7.5)]);
    }

    #[test]
    fn no_usable_cuts_means_no_scenes() {
        assert!(scenes_from_cuts(&[], 30.0, MAX_SCENES).is_empty());
        assert!(scenes_from_cuts(&[0.0, 45.0], 30.0, MAX_SCENES).is_empty());
    }

    #[test]
    fn detected_scenes_are_capped() {
        let cuts: Vec<f64> = (1..=20).map(f64::from).collect();
        let scenes = scenes_from_cuts(&cuts, 30.0, MAX_SCENES);
        assert_eq!(scenes.len(), MAX_SCENES);
        assert_eq!(scenes[0], (0.0, 1.0));
    }

    #[test]
    fn keyframe_names_are_zero_padded() {
        assert_eq!(keyframe_name(3), "scene_03.jpg");
        assert_eq!(keyframe_name(12), "scene_12.jpg");
    }

    #[tokio::test]
    async fn without_ffmpeg_scenes_have_no_keyframes() {
        let tmp = tempfile::tempdir().unwrap();
        let scenes = extract_scenes(
            None,
            &tmp.path().join("clip.mp4"),
            &[(0.0, 10.0), (10.0, 12.5)],
            &tmp.path().join("frames"),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(scenes.len(), 2);
        assert!(scenes.iter().all(|s| s.keyframe.is_none()));
        assert_eq!(scenes[1].end, 12.5);
    }
}
