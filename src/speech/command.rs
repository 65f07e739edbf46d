//! Command-based speech recognition engine
//!
//! Runs a configured external speech-to-text command as the recognition
//! engine. The command is expected to capture one utterance from the
//! microphone and print the transcript to stdout; tools like
//! vosk-transcriber, nerd-dictation or a whisper-cli wrapper all fit.
//!
//! Recognition failures are classified from the process exit: an empty
//! transcript is a no-speech condition, stderr mentioning permissions maps
//! to a permission denial, network-sounding failures map to a network
//! error, everything else is unclassified.

use super::{RecognitionOptions, Recognizer};
use crate::config::ListenConfig;
use crate::error::RecognitionError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Recognition engine backed by an external speech-to-text command
#[derive(Debug)]
pub struct CommandRecognizer {
    /// Resolved path to the command binary
    program: PathBuf,
    /// Argument template; "{lang}" is substituted per session
    args: Vec<String>,
}

impl CommandRecognizer {
    /// Create a recognizer from config, resolving the binary on PATH
    pub fn new(config: &ListenConfig) -> Result<Self, RecognitionError> {
        let program = config.program.as_deref().ok_or_else(|| {
            RecognitionError::Engine(
                "no speech-to-text command configured (set listen.program)".to_string(),
            )
        })?;

        let program = which::which(program).map_err(|_| {
            RecognitionError::Engine(format!(
                "speech-to-text command not found on PATH: '{}'",
                program
            ))
        })?;

        tracing::info!("Using speech-to-text command: {:?}", program);

        Ok(Self {
            program,
            args: config.args.clone(),
        })
    }

    /// Substitute session options into the argument template
    fn build_args(&self, options: &RecognitionOptions) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace("{lang}", &options.language))
            .collect()
    }
}

#[async_trait]
impl Recognizer for CommandRecognizer {
    async fn recognize(
        &self,
        options: &RecognitionOptions,
    ) -> Result<String, RecognitionError> {
        let args = self.build_args(options);
        tracing::debug!("Running recognizer: {:?} {:?}", self.program, args);

        let start = std::time::Instant::now();

        // kill_on_drop so aborting the session task also ends the capture
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                RecognitionError::Engine(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!("Recognizer exited with {}: {}", output.status, stderr);
            return Err(classify_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let transcript = match final_hypothesis(&stdout) {
            Some(text) => text,
            None => return Err(RecognitionError::NoSpeech),
        };

        tracing::info!(
            "Recognized in {:.2}s: {:?}",
            start.elapsed().as_secs_f32(),
            transcript
        );

        Ok(transcript)
    }
}

/// Extract the final hypothesis from recognizer stdout.
///
/// Engines that stream partial hypotheses print one line per revision; the
/// last non-empty line is the final, single-alternative result.
fn final_hypothesis(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .map(str::to_string)
}

/// Map a failed recognizer run onto the recognition error taxonomy
fn classify_failure(stderr: &str) -> RecognitionError {
    let lower = stderr.to_lowercase();
    let detail = stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("recognizer exited with an error")
        .to_string();

    if lower.contains("permission")
        || lower.contains("denied")
        || lower.contains("not allowed")
    {
        RecognitionError::PermissionDenied
    } else if lower.contains("network")
        || lower.contains("connection")
        || lower.contains("resolve")
        || lower.contains("timed out")
    {
        RecognitionError::Network(detail)
    } else {
        RecognitionError::Engine(detail)
    }
}
