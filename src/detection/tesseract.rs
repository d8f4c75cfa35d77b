use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use image::{GrayImage, ImageFormat};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::detection::TextRecognizer;
use crate::error::PipelineError;
use crate::models::RecognizedText;

pub const DEFAULT_TESSERACT_TIMEOUT_SECS: u64 = 30;

/// Text recognizer that runs the external `tesseract` binary.
///
/// The crop is handed over as a PNG in a uniquely named temp file which is
/// removed when the call returns, whether tesseract succeeded or not. A run
/// that outlives `timeout` is killed and reported as an error.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    pub binary: PathBuf,
    pub language: String,
    /// Where scratch images go; the system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            scratch_dir: None,
            timeout: Duration::from_secs(DEFAULT_TESSERACT_TIMEOUT_SECS),
        }
    }
}

impl TesseractRecognizer {
    /// Fail with a configuration error if the binary cannot be started
    pub fn ensure_available(&self) -> Result<(), PipelineError> {
        let status = Command::new(&self.binary).arg("--version").output().map_err(|e| {
            PipelineError::Configuration(format!(
                "tesseract binary {} could not be started: {}",
                self.binary.display(),
                e
            ))
        })?;
        if !status.status.success() {
            return Err(PipelineError::Configuration(format!(
                "tesseract binary {} exited with {}",
                self.binary.display(),
                status.status
            )));
        }
        Ok(())
    }

    fn scratch_file(&self) -> std::io::Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("medlabel-crop-").suffix(".png");
        match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

/// Read a child pipe to the end on its own thread so a chatty child never
/// blocks on a full pipe while we wait on it
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn collect(reader: JoinHandle<Vec<u8>>) -> Vec<u8> {
    reader.join().unwrap_or_default()
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &GrayImage) -> anyhow::Result<RecognizedText> {
        let scratch = self.scratch_file().context("Failed to create scratch image file")?;
        image
            .save_with_format(scratch.path(), ImageFormat::Png)
            .context("Failed to write scratch image for tesseract")?;
        debug!(path = %scratch.path().display(), "running tesseract");

        let mut child = Command::new(&self.binary)
            .arg(scratch.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Tesseract process failed to start. Please ensure 'tesseract-ocr' is installed and in your PATH.")?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout).context("Failed to wait for tesseract")? {
            Some(status) => status,
            None => {
                // Pipe readers are left detached; they end once the pipes close
                if let Err(e) = child.kill() {
                    warn!(error = %e, "failed to kill tesseract");
                }
                let _ = child.wait();
                anyhow::bail!("tesseract did not finish within {:?}", self.timeout);
            }
        };

        let stdout = collect(stdout);
        if !status.success() {
            anyhow::bail!(
                "tesseract exited with {}: {}",
                status,
                String::from_utf8_lossy(&collect(stderr)).trim()
            );
        }

        Ok(RecognizedText::from_lines(&String::from_utf8_lossy(&stdout)))
    }

    fn name(&self) -> &str {
        "Tesseract Recognition"
    }
}
