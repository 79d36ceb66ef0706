//! Integration tests for the fallback pipe viewer loop

mod common;

use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use rstest::rstest;
use tempfile::TempDir;

use common::{raw_frames, RecordingWriter};
use rtmpcam::application::services::{
    PipeViewer, ViewerCommand, ViewerEnd, ViewerEvent, ViewerOptions,
};
use rtmpcam::application::ApplicationError;
use rtmpcam::domain::{ImageFormat, Resolution};
use rtmpcam::infrastructure::traits::RealFileSystem;
use rtmpcam::util::testing::init_test_setup;

const W: u32 = 4;
const H: u32 = 2;

fn options(out: &TempDir) -> ViewerOptions {
    ViewerOptions {
        resolution: Resolution::new(W, H),
        output_dir: out.path().to_path_buf(),
        queue_size: 16,
        image_format: ImageFormat::Png,
        save_on_start: false,
        max_frames: None,
        join_timeout: Duration::from_secs(5),
        status_interval: None,
    }
}

fn viewer(opts: ViewerOptions, writer: Arc<RecordingWriter>, interrupted: bool) -> PipeViewer {
    init_test_setup();
    PipeViewer::new(
        Arc::new(RealFileSystem),
        writer,
        opts,
        Arc::new(AtomicBool::new(interrupted)),
    )
}

/// Decoder pipe that delivers `frames` and then closes, as ffmpeg does on SIGINT.
struct InterruptedPipe {
    data: Cursor<Vec<u8>>,
    interrupted: Arc<AtomicBool>,
}

impl Read for InterruptedPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(buf)?;
        if n == 0 {
            self.interrupted.store(true, Ordering::SeqCst);
        }
        Ok(n)
    }
}

/// Controls channel preloaded with `commands`; the sender is dropped.
fn controls(commands: &[ViewerCommand]) -> Receiver<ViewerCommand> {
    let (tx, rx) = unbounded();
    for cmd in commands {
        tx.send(*cmd).unwrap();
    }
    rx
}

#[test]
fn given_empty_stream_when_run_then_stream_open_error() {
    let out = TempDir::new().unwrap();
    let v = viewer(options(&out), Arc::new(RecordingWriter::new()), false);

    let err = v
        .run(&mut Cursor::new(Vec::new()), &controls(&[]), &mut |_| {})
        .unwrap_err();

    assert!(matches!(err, ApplicationError::StreamOpen { .. }));
}

#[rstest]
#[case(3, 0)]
#[case(2, 5)] // trailing partial frame is discarded
fn given_finite_stream_when_run_then_ends_with_stream_ended(
    #[case] whole_frames: usize,
    #[case] extra_bytes: usize,
) {
    let out = TempDir::new().unwrap();
    let mut bytes = raw_frames(W, H, whole_frames);
    bytes.extend(vec![0u8; extra_bytes]);
    let v = viewer(options(&out), Arc::new(RecordingWriter::new()), false);

    let report = v
        .run(&mut Cursor::new(bytes), &controls(&[]), &mut |_| {})
        .unwrap();

    assert_eq!(report.frames, whole_frames as u64);
    assert_eq!(report.ended_by, ViewerEnd::StreamEnded);
    assert!(report.sessions.is_empty());
}

#[test]
fn given_quit_command_when_run_then_stops_after_current_frame() {
    let out = TempDir::new().unwrap();
    let v = viewer(options(&out), Arc::new(RecordingWriter::new()), false);

    let report = v
        .run(
            &mut Cursor::new(raw_frames(W, H, 10)),
            &controls(&[ViewerCommand::Quit]),
            &mut |_| {},
        )
        .unwrap();

    assert_eq!(report.frames, 1);
    assert_eq!(report.ended_by, ViewerEnd::Quit);
}

#[test]
fn given_interrupt_flag_when_run_then_ends_without_reading() {
    let out = TempDir::new().unwrap();
    let v = viewer(options(&out), Arc::new(RecordingWriter::new()), true);

    let report = v
        .run(&mut Cursor::new(raw_frames(W, H, 3)), &controls(&[]), &mut |_| {})
        .unwrap();

    assert_eq!(report.frames, 0);
    assert_eq!(report.ended_by, ViewerEnd::Interrupted);
}

#[test]
fn given_max_frames_when_run_then_stops_at_limit() {
    let out = TempDir::new().unwrap();
    let mut opts = options(&out);
    opts.max_frames = Some(2);
    let v = viewer(opts, Arc::new(RecordingWriter::new()), false);

    let report = v
        .run(&mut Cursor::new(raw_frames(W, H, 5)), &controls(&[]), &mut |_| {})
        .unwrap();

    assert_eq!(report.frames, 2);
    assert_eq!(report.ended_by, ViewerEnd::MaxFrames);
}

#[test]
fn given_toggle_save_when_run_then_saves_following_frames_from_zero() {
    // Arrange
    let out = TempDir::new().unwrap();
    let writer = Arc::new(RecordingWriter::new());
    let v = viewer(options(&out), writer.clone(), false);
    let mut events = Vec::new();

    // Act: toggle is seen after the first frame, so frames 1 and 2 are saved
    let report = v
        .run(
            &mut Cursor::new(raw_frames(W, H, 3)),
            &controls(&[ViewerCommand::ToggleSave]),
            &mut |e| events.push(e),
        )
        .unwrap();

    // Assert
    assert_eq!(report.frames, 3);
    assert_eq!(report.sessions.len(), 1);
    let session = &report.sessions[0];
    assert_eq!(session.written, 2);
    assert_eq!(session.dropped, 0);
    assert!(session.joined);
    assert_eq!(
        writer.file_names(),
        vec!["frame_000000.png", "frame_000001.png"]
    );
    assert!(writer.written().iter().all(|p| p.starts_with(&session.session_dir)));
    assert!(matches!(events[0], ViewerEvent::SavingStarted(_)));
    assert!(matches!(events[1], ViewerEvent::SavingStopped(_)));
}

#[test]
fn given_toggle_twice_in_one_frame_when_run_then_empty_session_is_closed() {
    let out = TempDir::new().unwrap();
    let writer = Arc::new(RecordingWriter::new());
    let v = viewer(options(&out), writer.clone(), false);

    let report = v
        .run(
            &mut Cursor::new(raw_frames(W, H, 4)),
            &controls(&[ViewerCommand::ToggleSave, ViewerCommand::ToggleSave]),
            &mut |_| {},
        )
        .unwrap();

    // both toggles are drained after the first frame
    assert_eq!(report.sessions.len(), 1);
    assert_eq!(report.sessions[0].written, 0);
    assert!(writer.written().is_empty());
}

#[test]
fn given_unusable_output_dir_when_saving_then_viewing_continues() {
    let out = TempDir::new().unwrap();
    let blocker = out.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let mut opts = options(&out);
    opts.output_dir = blocker;
    opts.save_on_start = true;
    let v = viewer(opts, Arc::new(RecordingWriter::new()), false);
    let mut events = Vec::new();

    let report = v
        .run(
            &mut Cursor::new(raw_frames(W, H, 2)),
            &controls(&[]),
            &mut |e| events.push(e),
        )
        .unwrap();

    assert_eq!(report.frames, 2);
    assert!(report.sessions.is_empty());
    assert!(matches!(events[0], ViewerEvent::SavingFailed(_)));
}

#[test]
fn given_status_interval_when_run_then_reports_progress() {
    let out = TempDir::new().unwrap();
    let mut opts = options(&out);
    opts.status_interval = Some(Duration::ZERO);
    let v = viewer(opts, Arc::new(RecordingWriter::new()), false);
    let mut events = Vec::new();

    v.run(
        &mut Cursor::new(raw_frames(W, H, 3)),
        &controls(&[]),
        &mut |e| events.push(e),
    )
    .unwrap();

    let counts: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            ViewerEvent::Status { frames, saving, .. } => {
                assert!(!saving);
                Some(*frames)
            }
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![1, 2, 3]);
}

#[rstest]
#[case(0)]
#[case(2)]
fn given_ctrl_c_closes_decoder_when_reading_then_ends_as_interrupted(#[case] whole_frames: usize) {
    // Arrange
    init_test_setup();
    let out = TempDir::new().unwrap();
    let interrupted = Arc::new(AtomicBool::new(false));
    let v = PipeViewer::new(
        Arc::new(RealFileSystem),
        Arc::new(RecordingWriter::new()),
        options(&out),
        interrupted.clone(),
    );
    let mut pipe = InterruptedPipe {
        data: Cursor::new(raw_frames(W, H, whole_frames)),
        interrupted,
    };

    // Act
    let report = v.run(&mut pipe, &controls(&[]), &mut |_| {}).unwrap();

    // Assert
    assert_eq!(report.frames, whole_frames as u64);
    assert_eq!(report.ended_by, ViewerEnd::Interrupted);
}

#[test]
fn given_oversized_resolution_when_run_then_rejected_before_reading() {
    let out = TempDir::new().unwrap();
    let mut opts = options(&out);
    opts.resolution = Resolution::new(u32::MAX, u32::MAX);
    let v = viewer(opts, Arc::new(RecordingWriter::new()), false);

    let err = v
        .run(&mut Cursor::new(Vec::new()), &controls(&[]), &mut |_| {})
        .unwrap_err();

    assert!(matches!(err, ApplicationError::Domain(_)));
}
