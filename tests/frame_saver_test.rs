//! Integration tests for the bounded frame-saving queue and its writer thread

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use tempfile::TempDir;

use common::{frame, RecordingWriter};
use rtmpcam::application::services::{create_session_dir, FrameSaver};
use rtmpcam::domain::ImageFormat;
use rtmpcam::infrastructure::traits::{ImageFrameWriter, RealFileSystem};
use rtmpcam::util::testing::init_test_setup;

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn given_frames_when_saved_then_named_sequentially_from_zero() {
    init_test_setup();

    // Arrange
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(RecordingWriter::new());
    let mut saver =
        FrameSaver::start_in(dir.path().to_path_buf(), writer.clone(), 8, ImageFormat::Jpg)
            .unwrap();

    // Act: stream positions do not matter, file numbering restarts per session
    for index in [40, 41, 42] {
        assert!(saver.submit(&frame(2, 2, index)));
    }
    let report = saver.stop(TIMEOUT);

    // Assert
    assert_eq!(report.written, 3);
    assert_eq!(report.dropped, 0);
    assert!(report.joined);
    assert_eq!(
        writer.file_names(),
        vec!["frame_000000.jpg", "frame_000001.jpg", "frame_000002.jpg"]
    );
}

#[test]
fn given_stalled_writer_when_queue_fills_then_frames_are_dropped_not_blocked() {
    init_test_setup();

    // Arrange
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(RecordingWriter::new());
    let capacity = 2;
    let mut saver =
        FrameSaver::start_in(dir.path().to_path_buf(), writer.clone(), capacity, ImageFormat::Png)
            .unwrap();
    let gate = writer.gate.clone();
    let held = gate.lock().unwrap();

    // Act
    let submitted = 20u64;
    let accepted = (0..submitted)
        .filter(|&i| saver.submit(&frame(2, 2, i)))
        .count() as u64;
    drop(held);
    let report = saver.stop(TIMEOUT);

    // Assert: at most `capacity` queued plus one held by the writer
    assert!(accepted <= capacity as u64 + 1, "accepted {accepted}");
    assert_eq!(report.dropped, submitted - accepted);
    assert_eq!(report.written, accepted);
    assert_eq!(report.written + report.dropped, submitted);
}

#[test]
fn given_failing_writes_when_saving_then_writer_keeps_going_and_index_advances() {
    init_test_setup();
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(RecordingWriter::failing_on(&[1]));
    let mut saver =
        FrameSaver::start_in(dir.path().to_path_buf(), writer.clone(), 8, ImageFormat::Png)
            .unwrap();

    for index in 0..3 {
        saver.submit(&frame(2, 2, index));
    }
    let report = saver.stop(TIMEOUT);

    assert_eq!(report.written, 2);
    assert_eq!(report.write_errors, 1);
    assert_eq!(
        writer.file_names(),
        vec!["frame_000000.png", "frame_000002.png"]
    );
}

#[test]
fn given_writer_slower_than_timeout_when_stop_then_detaches() {
    init_test_setup();
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(RecordingWriter::new());
    let mut saver =
        FrameSaver::start_in(dir.path().to_path_buf(), writer.clone(), 4, ImageFormat::Png)
            .unwrap();
    let gate = writer.gate.clone();
    let held = gate.lock().unwrap();
    saver.submit(&frame(2, 2, 0));

    let report = saver.stop(Duration::from_millis(200));

    assert!(!report.joined);
    drop(held);
}

#[test]
fn given_real_image_writer_when_saved_then_png_files_exist() {
    init_test_setup();
    let dir = TempDir::new().unwrap();
    let mut saver = FrameSaver::start_in(
        dir.path().to_path_buf(),
        Arc::new(ImageFrameWriter),
        4,
        ImageFormat::Png,
    )
    .unwrap();

    saver.submit(&frame(3, 2, 0));
    saver.submit(&frame(3, 2, 1));
    let report = saver.stop(TIMEOUT);

    assert_eq!(report.written, 2);
    let first = image::open(dir.path().join("frame_000000.png")).unwrap();
    assert_eq!((first.width(), first.height()), (3, 2));
    assert!(dir.path().join("frame_000001.png").is_file());
}

#[test]
fn given_same_second_when_creating_sessions_then_suffixes_are_added() {
    init_test_setup();

    // Arrange
    let root = TempDir::new().unwrap();
    let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
    let fs = RealFileSystem;

    // Act
    let dirs: Vec<PathBuf> = (0..3)
        .map(|_| create_session_dir(&fs, root.path(), &now).unwrap())
        .collect();

    // Assert
    let names: Vec<String> = dirs
        .iter()
        .map(|d| d.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["20240309_140507", "20240309_140507_1", "20240309_140507_2"]
    );
    assert!(dirs.iter().all(|d| d.is_dir()));
}

#[test]
fn given_missing_root_when_starting_then_root_is_created() {
    init_test_setup();
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("captures/nested");

    let saver = FrameSaver::start(
        &RealFileSystem,
        Arc::new(RecordingWriter::new()),
        &root,
        4,
        ImageFormat::Png,
    )
    .unwrap();

    assert!(saver.session_dir().starts_with(&root));
    assert!(saver.session_dir().is_dir());
    let report = saver.stop(TIMEOUT);
    assert_eq!(report.written, 0);
}
