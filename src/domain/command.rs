//! Command-line construction for the external ffmpeg/ffplay processes
//!
//! Pure functions: they only assemble argument lists, nothing is executed here.
//! The program path itself is never part of the returned arguments.

use std::path::Path;

use super::entities::{EncoderOptions, EncoderProfile, Resolution};

/// Build the ffmpeg arguments that capture a V4L2 device and publish it as FLV over RTMP.
///
/// Order matters to ffmpeg:
/// - input options (`-f v4l2 ... -i <device>`) precede the input
/// - output muxer/protocol options precede the output URL
pub fn build_encoder_args(opts: &EncoderOptions, profile: &EncoderProfile) -> Vec<String> {
    let fps = opts.fps.to_string();
    let bitrate = opts.bitrate.as_str();

    let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "warning".into()];

    if opts.low_latency {
        args.extend(strings(&[
            "-fflags",
            "nobuffer",
            "-flags",
            "low_delay",
            "-avioflags",
            "direct",
        ]));
    }

    args.extend([
        "-f".into(),
        "v4l2".into(),
        "-framerate".into(),
        fps.clone(),
        "-video_size".into(),
        opts.resolution.to_string(),
        "-input_format".into(),
        opts.input_format.as_str().into(),
        "-i".into(),
        path_arg(&opts.device),
        "-vf".into(),
        format!("fps={},format=yuv420p", opts.fps),
        "-c:v".into(),
        profile.encoder_name().into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-b:v".into(),
        bitrate.into(),
        "-maxrate".into(),
        bitrate.into(),
        "-bufsize".into(),
        if opts.low_latency { "1M" } else { "5M" }.into(),
        "-g".into(),
        fps.clone(),
        "-bf".into(),
        "0".into(),
    ]);

    if profile.is_software() {
        args.extend([
            "-preset".into(),
            "veryfast".into(),
            "-tune".into(),
            "zerolatency".into(),
            "-profile:v".into(),
            "baseline".into(),
            "-x264-params".into(),
            format!(
                "keyint={fps}:min-keyint={fps}:scenecut=0:bframes=0:nal-hrd=cbr",
                fps = opts.fps
            ),
        ]);
    }

    args.extend(strings(&["-f", "flv"]));

    if opts.low_latency {
        args.extend(strings(&[
            "-rtmp_live",
            "live",
            "-flvflags",
            "no_duration_filesize",
            "-muxdelay",
            "0",
            "-muxpreload",
            "0",
        ]));
    }

    args.push(opts.target.url());
    args
}

/// Build ffplay arguments tuned for minimal playback latency.
pub fn build_player_args(url: &str) -> Vec<String> {
    let mut args = strings(&[
        "-autoexit",
        "-fflags",
        "nobuffer",
        "-flags",
        "low_delay",
        "-probesize",
        "32",
        "-analyzeduration",
        "0",
        "-framedrop",
        "-fast",
        "-rtmp_live",
        "live",
    ]);
    args.push(url.to_string());
    args
}

/// Build ffmpeg arguments that decode `url` into raw RGB24 frames on stdout,
/// scaled to `resolution` so every frame has a fixed byte length.
pub fn build_decoder_args(url: &str, resolution: Resolution) -> Vec<String> {
    let mut args = strings(&[
        "-hide_banner",
        "-loglevel",
        "error",
        "-fflags",
        "nobuffer",
        "-flags",
        "low_delay",
        "-rtmp_live",
        "live",
        "-i",
    ]);
    args.push(url.to_string());
    args.extend([
        "-an".into(),
        "-vf".into(),
        format!("scale={}:{}", resolution.width, resolution.height),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "-".into(),
    ]);
    args
}

/// Render a command as one shell-readable line (for logs and `--dry-run`).
pub fn render_command(program: &Path, args: &[String]) -> String {
    std::iter::once(path_arg(program))
        .chain(args.iter().cloned())
        .map(|a| shell_quote(&a))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '$' | '`' | '\\' | ';' | '&' | '|'));
    if needs_quotes {
        format!("'{}'", arg.replace('\'', r"'\''"))
    } else {
        arg.to_string()
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
