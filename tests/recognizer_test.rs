#![cfg(unix)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use zip::write::FileOptions;

use leafview::recognize::{RecognitionError, Recognizer};
use leafview::settings::RecognizerSettings;
use leafview::test_utils::test_helpers::partwise_score;

fn shell(script: &str, timeout_secs: u64) -> RecognizerSettings {
    RecognizerSettings {
        command: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            script.to_string(),
            "recognizer".to_string(),
            "{input}".to_string(),
            "{output}".to_string(),
        ],
        timeout_secs,
    }
}

fn input_file(dir: &TempDir, name: &str, body: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[test]
fn copies_produced_musicxml() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let score = partwise_score(&["4"]);
    let input = input_file(&work, "page.musicxml", score.as_bytes());

    let script = r#"mkdir -p "$2/book" && cp "$1" "$2/book/page.musicxml""#;
    let recognizer = Recognizer::new(shell(script, 10)).with_scratch_root(scratch.path());
    let recognition = recognizer.recognize(&input).unwrap();

    assert_eq!(recognition.markup, score);
    assert_eq!(recognition.output_name, "page.musicxml");
    assert!(is_empty_dir(scratch.path()));
}

#[test]
fn compressed_output_is_unwrapped() {
    let work = TempDir::new().unwrap();
    let score = partwise_score(&["2"]);
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        zip.start_file("page.xml", FileOptions::default()).unwrap();
        zip.write_all(score.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    let input = input_file(&work, "page.mxl", &cursor.into_inner());

    let recognizer = Recognizer::new(shell(r#"cp "$1" "$2/page.mxl""#, 10));
    let recognition = recognizer.recognize(&input).unwrap();
    assert_eq!(recognition.markup, score);
    assert_eq!(recognition.output_name, "page.mxl");
}

#[test]
fn failing_command_reports_stderr() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let input = input_file(&work, "scan.png", b"not really a png");

    let recognizer = Recognizer::new(shell("echo 'no staves found' >&2; exit 3", 10))
        .with_scratch_root(scratch.path());
    let err = recognizer.recognize(&input).unwrap_err();

    match &err {
        RecognitionError::Failed { status, stderr } => {
            assert_eq!(*status, Some(3));
            assert_eq!(stderr, "no staves found");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("status 3"));
    assert!(is_empty_dir(scratch.path()));
}

#[test]
fn slow_command_is_killed() {
    let work = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let input = input_file(&work, "scan.png", b"x");

    let recognizer = Recognizer::new(shell("sleep 30", 1)).with_scratch_root(scratch.path());
    let started = Instant::now();
    let err = recognizer.recognize(&input).unwrap_err();

    assert!(matches!(err, RecognitionError::Timeout(t) if t == Duration::from_secs(1)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(is_empty_dir(scratch.path()));
}

#[test]
fn silent_success_without_output() {
    let work = TempDir::new().unwrap();
    let input = input_file(&work, "scan.png", b"x");

    let recognizer = Recognizer::new(shell("echo done > \"$2/log.txt\"", 10));
    assert!(matches!(
        recognizer.recognize(&input),
        Err(RecognitionError::NoOutput)
    ));
}

#[test]
fn missing_command_fails_to_spawn() {
    let work = TempDir::new().unwrap();
    let input = input_file(&work, "scan.png", b"x");

    let recognizer = Recognizer::new(RecognizerSettings {
        command: "/nonexistent/leafview-recognizer".to_string(),
        ..RecognizerSettings::default()
    });
    let err = recognizer.recognize(&input).unwrap_err();
    assert!(matches!(err, RecognitionError::Spawn { .. }));
}

#[test]
fn missing_input_is_an_io_error() {
    let recognizer = Recognizer::new(shell("true", 10));
    assert!(matches!(
        recognizer.recognize(Path::new("/no/such/scan.png")),
        Err(RecognitionError::Io(_))
    ));
}
