//! espeak-family speech synthesis engine
//!
//! Shells out to espeak-ng (or classic espeak) for synthesis. Prosody
//! parameters are mapped onto the engine's scales: rate multiplies the
//! 175 wpm default, pitch maps onto the 0-99 range around the 50 default,
//! volume maps onto the 0-200 amplitude range around the 100 default.

use super::{Synthesizer, UtteranceParams, Voice};
use crate::config::SpeakConfig;
use crate::error::SynthesisError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Engine default speaking rate in words per minute
const DEFAULT_WPM: f32 = 175.0;

/// Binaries probed on PATH, in order, when none is configured
const CANDIDATES: &[&str] = &["espeak-ng", "espeak"];

/// Synthesis engine backed by an espeak-compatible binary
#[derive(Debug)]
pub struct EspeakSynthesizer {
    program: PathBuf,
}

impl EspeakSynthesizer {
    /// Create a synthesizer from config, probing PATH when unconfigured
    pub fn new(config: &SpeakConfig) -> Result<Self, SynthesisError> {
        if let Some(ref program) = config.program {
            let resolved = which::which(program)
                .map_err(|_| SynthesisError::EngineNotFound(program.clone()))?;
            tracing::info!("Using configured synthesizer: {:?}", resolved);
            return Ok(Self { program: resolved });
        }

        for candidate in CANDIDATES {
            if let Ok(resolved) = which::which(candidate) {
                tracing::info!("Using synthesizer: {:?}", resolved);
                return Ok(Self { program: resolved });
            }
        }

        Err(SynthesisError::EngineNotFound("espeak-ng".to_string()))
    }
}

#[async_trait]
impl Synthesizer for EspeakSynthesizer {
    async fn voices(&self) -> Vec<Voice> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                parse_voice_list(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::warn!("Voice listing failed: {}", output.status);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Voice listing failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn speak(
        &self,
        text: &str,
        params: &UtteranceParams,
    ) -> Result<(), SynthesisError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-s")
            .arg(words_per_minute(params.rate).to_string())
            .arg("-p")
            .arg(pitch_level(params.pitch).to_string())
            .arg("-a")
            .arg(amplitude(params.volume).to_string());

        if let Some(ref voice) = params.voice {
            cmd.arg("-v").arg(&voice.language);
        }

        cmd.arg("--").arg(text);

        tracing::debug!("Running synthesizer: {:?}", cmd);

        // kill_on_drop so cancelling the utterance task silences the engine
        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SynthesisError::Engine(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or("synthesizer exited with an error");
            return Err(SynthesisError::Engine(detail.to_string()));
        }

        Ok(())
    }
}

/// Map a rate multiplier onto espeak's words-per-minute scale
fn words_per_minute(rate: f32) -> u32 {
    (DEFAULT_WPM * rate).round().max(1.0) as u32
}

/// Map a pitch multiplier onto espeak's 0-99 scale (engine default 50)
fn pitch_level(pitch: f32) -> u32 {
    ((pitch * 50.0).round() as i64).clamp(0, 99) as u32
}

/// Map a volume in [0.0, 1.0] onto espeak's 0-200 amplitude (default 100)
fn amplitude(volume: f32) -> u32 {
    ((volume * 100.0).round() as i64).clamp(0, 200) as u32
}

/// Parse `espeak-ng --voices` output.
///
/// The listing is a header line followed by one voice per line:
/// ```text
///  Pty Language       Age/Gender VoiceName          File            Other Languages
///  5   en-gb          --/M       English_(Great_Britain) gmw/en
/// ```
fn parse_voice_list(stdout: &str) -> Vec<Voice> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            Some(Voice {
                language: fields[1].to_string(),
                name: fields[3].to_string(),
            })
        })
        .collect()
}
