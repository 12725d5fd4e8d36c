//! OCR engine seam and the Tesseract command-line backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Status label under which engines report recognition progress. Other
/// statuses (loading, initializing) are not shown to the user.
pub const RECOGNIZING_TEXT: &str = "recognizing text";

const PROGRESS_TICK: Duration = Duration::from_millis(250);
const ESTIMATE_CEILING: f64 = 0.95;

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("OCR timed out after {0}s")]
    Timeout(u64),

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One progress callback from the engine. `progress` is in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct OcrProgress {
    pub status: &'static str,
    pub progress: f32,
}

/// Result of the startup readiness check, handed to every pipeline
/// invocation instead of living in global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrCapability {
    Ready,
    Unavailable,
}

impl OcrCapability {
    pub fn is_ready(self) -> bool {
        self == OcrCapability::Ready
    }
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Checks that the engine can start and has its language data.
    async fn probe(&self) -> OcrCapability;

    /// Recognizes the text of the image at `image`.
    async fn recognize(
        &self,
        image: &Path,
        on_progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> Result<String, RecognitionError>;
}

/// Runs the `tesseract` binary as a child process.
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            timeout,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn probe(&self) -> OcrCapability {
        let output = match self.command().arg("--list-langs").output().await {
            Ok(output) => output,
            Err(e) => {
                warn!(binary = %self.binary.display(), "tesseract could not be started: {e}");
                return OcrCapability::Unavailable;
            }
        };

        if !output.status.success() {
            warn!(status = %output.status, "tesseract --list-langs failed");
            return OcrCapability::Unavailable;
        }

        // Older releases print the language list on stderr.
        let listing = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if has_language(&listing, &self.language) {
            info!(language = %self.language, "tesseract ready");
            OcrCapability::Ready
        } else {
            warn!(language = %self.language, "tesseract is missing language data");
            OcrCapability::Unavailable
        }
    }

    async fn recognize(
        &self,
        image: &Path,
        on_progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> Result<String, RecognitionError> {
        on_progress(OcrProgress {
            status: "initializing api",
            progress: 0.0,
        });

        let child = self
            .command()
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .spawn()
            .map_err(|e| RecognitionError::Unavailable(e.to_string()))?;

        on_progress(OcrProgress {
            status: RECOGNIZING_TEXT,
            progress: 0.0,
        });

        let output = wait_reporting(
            child.wait_with_output(),
            self.timeout,
            PROGRESS_TICK,
            on_progress,
        )
        .await??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Failed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract recognized {} chars", text.len());

        on_progress(OcrProgress {
            status: RECOGNIZING_TEXT,
            progress: 1.0,
        });

        Ok(text)
    }
}

/// The CLI reports nothing while it works, so recognition progress is
/// estimated from elapsed time against the timeout. The estimate rises
/// quickly at first, slows down, and never reaches `ESTIMATE_CEILING`;
/// the final 1.0 is only sent once the text is in hand.
fn estimated_fraction(elapsed: Duration, timeout: Duration) -> f32 {
    let tau = (timeout.as_secs_f64() / 8.0).max(0.001);
    let fraction = ESTIMATE_CEILING * (1.0 - (-elapsed.as_secs_f64() / tau).exp());
    fraction as f32
}

async fn wait_reporting<T>(
    work: impl Future<Output = T>,
    timeout: Duration,
    tick: Duration,
    on_progress: &(dyn Fn(OcrProgress) + Send + Sync),
) -> Result<T, RecognitionError> {
    let started = Instant::now();
    let deadline = tokio::time::sleep(timeout);
    let mut ticks = tokio::time::interval_at(started + tick, tick);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(work, deadline);

    loop {
        tokio::select! {
            out = &mut work => return Ok(out),
            _ = &mut deadline => return Err(RecognitionError::Timeout(timeout.as_secs())),
            _ = ticks.tick() => on_progress(OcrProgress {
                status: RECOGNIZING_TEXT,
                progress: estimated_fraction(started.elapsed(), timeout),
            }),
        }
    }
}

fn has_language(listing: &str, language: &str) -> bool {
    // "eng+hin" requires every component
    language
        .split('+')
        .all(|lang| listing.lines().any(|line| line.trim() == lang))
}
