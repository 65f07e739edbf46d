//! Speech output adapter
//!
//! Owns the utterance lifecycle: at most one utterance exists at a time and
//! its handle's existence is the "speaking" state. Starting a new utterance
//! cancels the previous one first, and the replacement only begins once the
//! cancelled one has fully wound down, so the engine is never driven by two
//! utterances at once. Every utterance that is not cancelled delivers
//! exactly one terminal callback.

use super::{Synthesizer, UtteranceParams, Voice};
use crate::error::SynthesisError;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fixed conversational prosody; the voice is the only selectable part
pub const SPEAKING_RATE: f32 = 0.95;
pub const SPEAKING_PITCH: f32 = 1.0;
pub const SPEAKING_VOLUME: f32 = 1.0;

/// An in-flight utterance. Aborting the task cancels synthesis.
struct Utterance {
    task: JoinHandle<()>,
}

/// Adapter over the host speech synthesis capability
pub struct SpeechOutput {
    synthesizer: Option<Arc<dyn Synthesizer>>,
    utterance: Option<Utterance>,
}

impl SpeechOutput {
    /// Create the adapter with an injected synthesis backend.
    ///
    /// `None` means the capability is unsupported; `speak` becomes a no-op
    /// and replies are rendered as text only.
    pub fn new(synthesizer: Option<Arc<dyn Synthesizer>>) -> Self {
        Self {
            synthesizer,
            utterance: None,
        }
    }

    /// True iff a synthesis backend was available at construction
    pub fn is_supported(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// True while an utterance is in flight
    pub fn is_speaking(&self) -> bool {
        self.utterance
            .as_ref()
            .is_some_and(|utterance| !utterance.task.is_finished())
    }

    /// Speak `text`, cancelling any in-flight utterance first.
    ///
    /// Returns false without doing anything when the capability is
    /// unsupported. Otherwise `on_done` is invoked exactly once with the
    /// outcome, unless the utterance itself is later cancelled (by `stop`
    /// or a newer `speak`), in which case no callback fires.
    pub fn speak<F>(&mut self, text: &str, on_done: F) -> bool
    where
        F: FnOnce(Result<(), SynthesisError>) + Send + 'static,
    {
        let Some(synthesizer) = self.synthesizer.clone() else {
            tracing::debug!("Speech output unsupported, ignoring speak");
            return false;
        };

        // Cancel the previous utterance before the new one starts
        let previous = self.utterance.take().map(|utterance| {
            utterance.task.abort();
            utterance.task
        });

        let text = text.to_string();
        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                // The abort has been requested; wait for the old task to
                // fully terminate so synthesis never overlaps
                let _ = previous.await;
            }

            let voices = synthesizer.voices().await;
            let params = UtteranceParams {
                voice: select_voice(&voices),
                rate: SPEAKING_RATE,
                pitch: SPEAKING_PITCH,
                volume: SPEAKING_VOLUME,
            };

            let result = synthesizer.speak(&text, &params).await;
            on_done(result);
        });

        self.utterance = Some(Utterance { task });
        true
    }

    /// Cancel any in-flight utterance. Neither callback fires.
    pub fn stop(&mut self) {
        if let Some(utterance) = self.utterance.take() {
            utterance.task.abort();
            tracing::debug!("Utterance cancelled");
        }
    }
}

impl Drop for SpeechOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pick the persona voice: an en-GB or British-labeled voice when the
/// engine offers one, otherwise the engine default
fn select_voice(voices: &[Voice]) -> Option<Voice> {
    voices
        .iter()
        .find(|voice| {
            voice.language.to_ascii_lowercase().contains("en-gb")
                || voice.name.to_ascii_lowercase().contains("british")
        })
        .cloned()
}
