//! Error types for valet
//!
//! Uses thiserror for ergonomic error definitions. The display strings of
//! the per-subsystem enums double as the user-facing notice text, so they
//! are written as complete sentences where a user will read them.

use thiserror::Error;

/// Top-level error type for the valet application
#[derive(Error, Debug)]
pub enum ValetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech input error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Speech output error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Weather error: {0}")]
    Weather(#[from] WeatherError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the speech recognition engine.
///
/// None of these are fatal: the controller surfaces them as a notice and
/// returns the status to idle. `NoSpeech` is special-cased by the input
/// adapter, which retries it transparently before letting it surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("No speech detected. Please try again.")]
    NoSpeech,

    #[error("Microphone access was denied. Check your audio permissions.")]
    PermissionDenied,

    #[error("Speech service network failure: {0}")]
    Network(String),

    #[error("Speech recognition failed: {0}")]
    Engine(String),
}

/// Errors from the speech synthesis engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Speech synthesizer not found: '{0}'. Install espeak-ng or set speak.program in the config.")]
    EngineNotFound(String),

    #[error("Speech synthesis failed: {0}")]
    Engine(String),
}

/// Errors from the chat completion endpoint.
///
/// Rate limiting (429) and exhausted credits (402) get their own variants
/// because the user can act on them differently; everything else collapses
/// into a generic server or transport failure. There is no automatic retry,
/// the user resubmits manually.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Chat configuration error: {0}")]
    Config(String),

    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited,

    #[error("The assistant service requires additional credits. Please check your account.")]
    PaymentRequired,

    #[error("Assistant service error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Could not reach the assistant service: {0}")]
    Network(String),

    #[error("Unexpected response from the assistant service: {0}")]
    InvalidResponse(String),

    #[error("Assistant request was interrupted: {0}")]
    Interrupted(String),
}

/// Errors from the weather lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeatherError {
    #[error("Location not found: '{0}'")]
    LocationNotFound(String),

    #[error("Weather service error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("Could not reach the weather service: {0}")]
    Network(String),

    #[error("Unexpected response from the weather service: {0}")]
    InvalidResponse(String),
}

/// Result type alias using ValetError
pub type Result<T> = std::result::Result<T, ValetError>;
