// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media description builder.
//!
//! Turns a local path or URL plus optional ffmpeg parameters into the
//! shell-sourced description the engine ingests: s16le stereo PCM at 96 kHz
//! for audio and 30 fps yuv420p raw video scaled to fit 1280x720.

use echotune_core::traits::engine::{AudioDescription, MediaDescription, VideoDescription};

use crate::probe_dimensions;

pub const AUDIO_SAMPLE_RATE: u32 = 96_000;
pub const AUDIO_CHANNELS: u8 = 2;
pub const VIDEO_FPS: u8 = 30;
pub const MAX_WIDTH: u32 = 1280;
pub const MAX_HEIGHT: u32 = 720;

const RECONNECT_FLAGS: &str =
    "-reconnect 1 -reconnect_at_eof 1 -reconnect_streamed 1 -reconnect_delay_max 2";

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Splits a user-level ffmpeg parameter string into (seek, filter) flags.
///
/// Strings containing `filter:` are placed after `-i`; everything else goes
/// before it.
pub fn split_ffmpeg_params(params: &str) -> (Option<&str>, Option<&str>) {
    let params = params.trim();
    if params.is_empty() {
        (None, None)
    } else if params.contains("filter:") {
        (None, Some(params))
    } else {
        (Some(params), None)
    }
}

/// Fits (width, height) into 1280x720 preserving aspect ratio, with both
/// sides rounded down to even.
pub fn scale_dimensions(original_width: u32, original_height: u32) -> (u16, u16) {
    if original_width == 0 || original_height == 0 {
        return (MAX_WIDTH as u16, MAX_HEIGHT as u16);
    }

    let ratio = original_width as f64 / original_height as f64;
    let mut width = original_width.min(MAX_WIDTH);
    let mut height = (width as f64 / ratio) as u32;

    if height > MAX_HEIGHT {
        height = MAX_HEIGHT;
        width = (height as f64 * ratio) as u32;
    }

    if width % 2 != 0 {
        width -= 1;
    }
    if height % 2 != 0 {
        height -= 1;
    }

    (width as u16, height as u16)
}

fn build_audio_command(input: &str, seek: Option<&str>, filter: Option<&str>) -> String {
    let mut cmd = String::from("ffmpeg ");
    if is_url(input) {
        cmd.push_str(RECONNECT_FLAGS);
        cmd.push(' ');
    }
    if let Some(seek) = seek {
        cmd.push_str(seek);
        cmd.push(' ');
    }
    cmd.push_str(&format!("-i \"{input}\" "));
    if let Some(filter) = filter {
        cmd.push_str(filter);
        cmd.push(' ');
    }
    cmd.push_str(&format!(
        "-f s16le -ac {AUDIO_CHANNELS} -ar {AUDIO_SAMPLE_RATE} -v quiet pipe:1"
    ));
    cmd
}

fn build_video_command(
    input: &str,
    seek: Option<&str>,
    filter: Option<&str>,
    width: u16,
    height: u16,
) -> String {
    let mut cmd = String::from("ffmpeg ");
    if is_url(input) {
        cmd.push_str(RECONNECT_FLAGS);
        cmd.push(' ');
    }
    if let Some(seek) = seek {
        cmd.push_str(seek);
        cmd.push(' ');
    }
    cmd.push_str(&format!("-i \"{input}\" "));
    if let Some(filter) = filter {
        cmd.push_str(filter);
        cmd.push(' ');
    }
    cmd.push_str(&format!(
        "-f rawvideo -r {VIDEO_FPS} -pix_fmt yuv420p -vf scale={width}:{height} -v quiet pipe:1"
    ));
    cmd
}

/// Builds the engine description for `input`, probing dimensions for video.
///
/// A failed dimension probe falls back to the full 1280x720 frame.
pub async fn build_media_description(
    input: &str,
    is_video: bool,
    ffmpeg_params: &str,
) -> MediaDescription {
    let (seek, filter) = split_ffmpeg_params(ffmpeg_params);

    let microphone = AudioDescription {
        input: build_audio_command(input, seek, filter),
        sample_rate: AUDIO_SAMPLE_RATE,
        channels: AUDIO_CHANNELS,
    };

    if !is_video {
        return MediaDescription {
            microphone: Some(microphone),
            ..MediaDescription::default()
        };
    }

    let (width, height) = match probe_dimensions(input).await {
        Some((w, h)) => scale_dimensions(w, h),
        None => (MAX_WIDTH as u16, MAX_HEIGHT as u16),
    };

    let camera = VideoDescription {
        input: build_video_command(input, seek, filter, width, height),
        width,
        height,
        fps: VIDEO_FPS,
    };

    MediaDescription {
        microphone: Some(microphone),
        camera: Some(camera),
        screen: None,
    }
}

/// Seek parameter string for re-playing `input` from `position`.
///
/// Remote or missing inputs need the `-i` embedded so the seek applies to
/// the demuxer input; local files seek in place.
pub fn seek_params(input: &str, is_local_file: bool, position: u64, duration: u32) -> String {
    if is_url(input) || !is_local_file {
        format!("-ss {position} -i {input} -to {duration}")
    } else {
        format!("-ss {position} -to {duration}")
    }
}

/// Decomposes `speed` into chained atempo factors, each within [0.5, 2.0].
pub fn atempo_chain(speed: f64) -> String {
    let mut parts = Vec::new();
    let mut remaining = speed;
    while remaining > 2.0 {
        parts.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        parts.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    parts.push(format!("atempo={remaining:.6}"));
    parts.join(",")
}

/// Full filter string for a speed change: video PTS scaling plus the audio
/// atempo chain.
pub fn speed_filters(speed: f64) -> String {
    let video_pts = 1.0 / speed;
    format!(
        "-filter:v setpts={video_pts:.6}*PTS -filter:a {}",
        atempo_chain(speed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn audio_command_shape() {
        let desc = build_media_description("/tmp/song.ogg", false, "").await;
        let audio = desc.microphone.unwrap();
        assert_eq!(
            audio.input,
            "ffmpeg -i \"/tmp/song.ogg\" -f s16le -ac 2 -ar 96000 -v quiet pipe:1"
        );
        assert_eq!(audio.sample_rate, 96_000);
        assert!(desc.camera.is_none());
        assert!(desc.screen.is_none());
    }

    #[tokio::test]
    async fn url_inputs_get_reconnect_flags() {
        let desc = build_media_description("https://cdn.example.org/a.mp3", false, "").await;
        let audio = desc.microphone.unwrap();
        assert!(audio.input.starts_with(
            "ffmpeg -reconnect 1 -reconnect_at_eof 1 -reconnect_streamed 1 -reconnect_delay_max 2 "
        ));
    }

    #[tokio::test]
    async fn seek_flags_precede_input_and_filters_follow() {
        let desc = build_media_description("/tmp/a.ogg", false, "-ss 70 -to 200").await;
        let audio = desc.microphone.unwrap();
        assert!(audio.input.contains("-ss 70 -to 200 -i \"/tmp/a.ogg\""));

        let desc = build_media_description("/tmp/a.ogg", false, "-filter:a atempo=1.500000").await;
        let audio = desc.microphone.unwrap();
        assert!(audio.input.contains("-i \"/tmp/a.ogg\" -filter:a atempo=1.500000 -f s16le"));
    }

    #[tokio::test]
    async fn video_without_probe_defaults_to_full_frame() {
        let desc = build_media_description("/nonexistent/video.mp4", true, "").await;
        let camera = desc.camera.unwrap();
        assert_eq!((camera.width, camera.height), (1280, 720));
        assert!(camera.input.contains("-vf scale=1280:720"));
        assert!(camera.input.contains("-f rawvideo -r 30 -pix_fmt yuv420p"));
    }

    #[test]
    fn split_detects_filter_strings() {
        assert_eq!(split_ffmpeg_params(""), (None, None));
        assert_eq!(split_ffmpeg_params("-ss 10 -to 60"), (Some("-ss 10 -to 60"), None));
        let filters = "-filter:v setpts=0.5*PTS -filter:a atempo=2.0";
        assert_eq!(split_ffmpeg_params(filters), (None, Some(filters)));
    }

    #[test]
    fn scaling_fits_and_stays_even() {
        for (original, expected_fit) in [
            ((1920, 1080), true),
            ((640, 480), true),
            ((720, 1280), true),
            ((1280, 720), true),
            ((854, 480), true),
        ] {
            let (w, h) = scale_dimensions(original.0, original.1);
            assert!(w as u32 <= 1280 && h as u32 <= 720, "{original:?} -> {w}x{h}");
            assert_eq!(w % 2, 0);
            assert_eq!(h % 2, 0);

            if expected_fit {
                let original_ratio = original.0 as f64 / original.1 as f64;
                let scaled_ratio = w as f64 / h as f64;
                assert!(
                    (original_ratio - scaled_ratio).abs() / original_ratio < 0.01,
                    "{original:?} -> {w}x{h} distorts aspect"
                );
            }
        }
    }

    #[test]
    fn scaling_known_fixtures() {
        assert_eq!(scale_dimensions(1920, 1080), (1280, 720));
        assert_eq!(scale_dimensions(640, 480), (640, 480));
        let (w, h) = scale_dimensions(720, 1280);
        assert_eq!(h, 720);
        assert!(w <= 406 && w >= 402);
    }

    #[test]
    fn zero_dimensions_fall_back() {
        assert_eq!(scale_dimensions(0, 0), (1280, 720));
    }

    #[test]
    fn atempo_factors_multiply_back_to_speed() {
        for speed in [0.5, 0.75, 1.0, 1.5, 2.0, 2.5, 3.0, 4.0] {
            let chain = atempo_chain(speed);
            let product: f64 = chain
                .split(',')
                .map(|part| {
                    part.strip_prefix("atempo=")
                        .expect("every element is an atempo factor")
                        .parse::<f64>()
                        .unwrap()
                })
                .product();
            assert!(
                (product - speed).abs() < 1e-9,
                "speed {speed}: chain {chain} multiplies to {product}"
            );

            for part in chain.split(',') {
                let factor: f64 = part.strip_prefix("atempo=").unwrap().parse().unwrap();
                assert!((0.5..=2.0).contains(&factor), "factor {factor} out of range");
            }
        }
    }

    #[test]
    fn known_decompositions() {
        assert_eq!(atempo_chain(3.0), "atempo=2.0,atempo=1.500000");
        assert_eq!(atempo_chain(4.0), "atempo=2.0,atempo=2.000000");
        assert_eq!(atempo_chain(0.5), "atempo=0.500000");
    }

    #[test]
    fn speed_filters_scale_video_pts_inversely() {
        let filters = speed_filters(2.0);
        assert!(filters.starts_with("-filter:v setpts=0.500000*PTS -filter:a atempo=2.000000"));
    }

    #[test]
    fn seek_params_distinguish_local_and_remote() {
        assert_eq!(
            seek_params("https://cdn.example.org/a.mp3", false, 70, 200),
            "-ss 70 -i https://cdn.example.org/a.mp3 -to 200"
        );
        assert_eq!(seek_params("/tmp/a.ogg", true, 70, 200), "-ss 70 -to 200");
        // A local-looking path that does not exist seeks through the input.
        assert_eq!(
            seek_params("/tmp/missing.ogg", false, 10, 60),
            "-ss 10 -i /tmp/missing.ogg -to 60"
        );
    }
}
