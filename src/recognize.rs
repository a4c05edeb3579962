//! External optical music recognition: turns a page-image document into
//! MusicXML by running a configured command.
//!
//! The command runs in a scratch directory that is removed on every exit
//! path (the `TempDir` guard is dropped on success, failure and panic
//! unwinding alike).

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::score::{self, ContainerError};
use crate::settings::RecognizerSettings;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Recognized extensions, most preferred first
const OUTPUT_EXTENSIONS: [&str; 3] = ["musicxml", "xml", "mxl"];

#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("no recognizer command configured")]
    NotConfigured,

    #[error("could not start recognizer `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("recognizer timed out after {0:?}")]
    Timeout(Duration),

    #[error("recognizer exited with {}: {stderr}", describe_status(.status))]
    Failed { status: Option<i32>, stderr: String },

    #[error("recognizer produced no MusicXML output")]
    NoOutput,

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Markup produced by a successful run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recognition {
    pub markup: String,
    /// Name of the output file the markup came from
    pub output_name: String,
}

pub struct Recognizer {
    settings: RecognizerSettings,
    scratch_root: Option<PathBuf>,
}

impl Recognizer {
    #[must_use]
    pub fn new(settings: RecognizerSettings) -> Self {
        Self {
            settings,
            scratch_root: None,
        }
    }

    /// Create scratch directories under `root` instead of the system temp dir
    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn recognize(&self, input: &Path) -> Result<Recognition, RecognitionError> {
        if self.settings.command.trim().is_empty() {
            return Err(RecognitionError::NotConfigured);
        }

        let input = std::fs::canonicalize(input)?;
        let scratch = self.scratch_dir()?;
        let output_dir = scratch.path().join("out");
        std::fs::create_dir_all(&output_dir)?;

        let args = expand_args(&self.settings.args, &input, &output_dir);
        info!("Running recognizer {} {:?}", self.settings.command, args);

        let child = Command::new(&self.settings.command)
            .args(&args)
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RecognitionError::Spawn {
                command: self.settings.command.clone(),
                source,
            })?;

        wait_bounded(child, self.settings.timeout())?;

        let found = find_output(scratch.path()).ok_or(RecognitionError::NoOutput)?;
        debug!("Recognizer output: {found:?}");
        let compressed = found
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mxl"));
        let markup = score::read_score_file(&found, compressed)?;

        Ok(Recognition {
            markup,
            output_name: found
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }

    fn scratch_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("leafview-omr-");
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

fn expand_args(args: &[String], input: &Path, output: &Path) -> Vec<String> {
    let input = input.to_string_lossy();
    let output = output.to_string_lossy();
    args.iter()
        .map(|arg| {
            arg.replace("{input}", input.as_ref())
                .replace("{output}", output.as_ref())
        })
        .collect()
}

/// Wait for `child`, killing it once `timeout` has elapsed. Stderr is
/// drained on a side thread so a chatty child cannot block on a full pipe.
fn wait_bounded(mut child: Child, timeout: Duration) -> Result<(), RecognitionError> {
    let stderr_reader = child.stderr.take().map(|mut stderr| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            warn!("Recognizer exceeded {timeout:?}, killing it");
            let _ = child.kill();
            let _ = child.wait();
            return Err(RecognitionError::Timeout(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let stderr = stderr_reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    if status.success() {
        Ok(())
    } else {
        Err(RecognitionError::Failed {
            status: status.code(),
            stderr: stderr.trim().to_string(),
        })
    }
}

/// Best output file under `dir`: uncompressed forms beat `.mxl`, ties go
/// to the shallowest, then the lexicographically first path
pub fn find_output(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let ext = entry.path().extension()?.to_str()?.to_ascii_lowercase();
            let rank = OUTPUT_EXTENSIONS.iter().position(|known| *known == ext)?;
            Some((rank, entry.depth(), entry.into_path()))
        })
        .min()
        .map(|(_, _, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_are_expanded() {
        let args = vec!["-o".to_string(), "{output}/x".to_string(), "{input}".to_string()];
        assert_eq!(
            expand_args(&args, Path::new("/in.pdf"), Path::new("/tmp/out")),
            vec!["-o", "/tmp/out/x", "/in.pdf"]
        );
    }

    #[test]
    fn uncompressed_output_is_preferred() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("score.mxl"), b"zip").unwrap();
        std::fs::write(nested.join("score.musicxml"), b"<score-partwise/>").unwrap();
        std::fs::write(dir.path().join("log.txt"), b"noise").unwrap();

        assert_eq!(find_output(dir.path()), Some(nested.join("score.musicxml")));
    }

    #[test]
    fn compressed_output_is_used_when_alone() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("score.MXL"), b"zip").unwrap();
        assert_eq!(find_output(dir.path()), Some(dir.path().join("score.MXL")));
    }

    #[test]
    fn nothing_found() {
        let dir = TempDir::new().unwrap();
        assert_eq!(find_output(dir.path()), None);
    }

    #[test]
    fn empty_command_is_not_configured() {
        let recognizer = Recognizer::new(RecognizerSettings {
            command: " ".to_string(),
            ..RecognizerSettings::default()
        });
        assert!(matches!(
            recognizer.recognize(Path::new("whatever.pdf")),
            Err(RecognitionError::NotConfigured)
        ));
    }
}
