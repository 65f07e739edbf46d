//! Speech capability layer
//!
//! Wraps the host's speech recognition and synthesis engines behind traits
//! so the adapters can be constructed with a fake backend in tests and with
//! a probed engine in production. A missing capability is represented as
//! `None` from the factory functions, which the adapters report through
//! `is_supported()`; the view disables the matching control instead of
//! failing.

pub mod command;
pub mod espeak;
pub mod input;
pub mod output;

use crate::config::{ListenConfig, SpeakConfig};
use crate::error::{RecognitionError, SynthesisError};
use async_trait::async_trait;
use std::sync::Arc;

/// One installed synthesizer voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Engine voice name, e.g. "English_(Great_Britain)"
    pub name: String,
    /// Language tag the engine reports, e.g. "en-gb"
    pub language: String,
}

/// Prosody and voice parameters for one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceParams {
    /// Selected voice; None uses the engine default
    pub voice: Option<Voice>,
    /// Speaking rate as a multiple of the engine default
    pub rate: f32,
    /// Pitch as a multiple of the engine default
    pub pitch: f32,
    /// Volume in [0.0, 1.0]
    pub volume: f32,
}

/// Recognition session parameters.
///
/// Sessions are always single-utterance with final results only and a
/// single alternative; only the language varies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// BCP 47 language tag, e.g. "en-US"
    pub language: String,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
        }
    }
}

/// One bounded attempt to convert spoken audio into a transcript
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Capture one utterance and return its final transcript.
    ///
    /// An utterance with no usable speech is `RecognitionError::NoSpeech`;
    /// the input adapter owns the retry policy for it.
    async fn recognize(&self, options: &RecognitionOptions)
        -> Result<String, RecognitionError>;
}

/// One bounded attempt to render text as spoken audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Voices the engine offers; empty when the engine cannot enumerate them
    async fn voices(&self) -> Vec<Voice>;

    /// Speak `text` to completion with the given parameters
    async fn speak(&self, text: &str, params: &UtteranceParams)
        -> Result<(), SynthesisError>;
}

/// Probe the configured speech-to-text command.
///
/// Returns None (capability unsupported) when no command is configured or
/// the binary cannot be found; voice input is then disabled.
pub fn create_recognizer(config: &ListenConfig) -> Option<Arc<dyn Recognizer>> {
    match command::CommandRecognizer::new(config) {
        Ok(recognizer) => Some(Arc::new(recognizer)),
        Err(e) => {
            tracing::warn!("Speech recognition unavailable: {}", e);
            None
        }
    }
}

/// Probe the host speech synthesizer.
///
/// Returns None (capability unsupported) when no engine is found; replies
/// are then rendered as text only.
pub fn create_synthesizer(config: &SpeakConfig) -> Option<Arc<dyn Synthesizer>> {
    match espeak::EspeakSynthesizer::new(config) {
        Ok(synthesizer) => Some(Arc::new(synthesizer)),
        Err(e) => {
            tracing::warn!("Speech synthesis unavailable: {}", e);
            None
        }
    }
}
