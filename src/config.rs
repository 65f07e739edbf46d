//! Configuration loading and types for valet
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/valet/config.toml)
//! 3. Environment variables (VALET_*)
//! 4. CLI arguments (highest priority)

use crate::error::ValetError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Valet Configuration
#
# Location: ~/.config/valet/config.toml
# All settings can be overridden via CLI flags

[chat]
# OpenAI-compatible endpoint base URL (the client appends /chat/completions)
endpoint = "https://api.openai.com/v1"

# Model name sent to the endpoint
model = "gpt-4o-mini"

# API key for the endpoint. Prefer the VALET_API_KEY environment variable;
# local endpoints (llama.cpp server, Ollama) usually need none.
# api_key = "sk-..."

# Request timeout in seconds
timeout_secs = 30

# Persona used as the system prompt. The default gives the assistant a
# composed, lightly British register to match the preferred voice.
# persona = "You are Valet, ..."

[weather]
# Default location for the weather quick action (/weather with no argument)
default_location = "New York"

# Open-Meteo endpoints (no API key required)
# geocode_endpoint = "https://geocoding-api.open-meteo.com/v1/search"
# forecast_endpoint = "https://api.open-meteo.com/v1/forecast"

# timeout_secs = 10

[listen]
# External speech-to-text command. It must capture one utterance from the
# microphone and print the transcript to stdout; the last non-empty line is
# taken as the final hypothesis. When unset, voice input is disabled and
# text input still works.
#
# Example (nerd-dictation, vosk-transcriber and whisper-based tools all fit):
# program = "vosk-transcriber"
# args = ["--lang", "{lang}", "--single-utterance"]

# BCP 47 language tag substituted for "{lang}" in args
language = "en-US"

[speak]
# Speech synthesizer binary. When unset, espeak-ng then espeak are probed
# on PATH; when neither exists, replies are shown but not spoken.
# program = "espeak-ng"

[feedback]
# Audio cues when the microphone opens and closes
enabled = false

# Volume level (0.0 to 1.0)
# volume = 0.7
"#;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub listen: ListenConfig,

    #[serde(default)]
    pub speak: SpeakConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,
}

/// Chat completion endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// OpenAI-compatible endpoint base URL
    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,

    /// Model name sent with each request
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Bearer token, if the endpoint requires one
    #[serde(default)]
    pub api_key: Option<String>,

    /// System prompt establishing the assistant persona
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Request timeout in seconds
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
}

/// Weather lookup configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeatherConfig {
    /// Geocoding endpoint resolving a place name to coordinates
    #[serde(default = "default_geocode_endpoint")]
    pub geocode_endpoint: String,

    /// Current-conditions endpoint
    #[serde(default = "default_forecast_endpoint")]
    pub forecast_endpoint: String,

    /// Location used when the weather quick action gets no argument
    #[serde(default = "default_location")]
    pub default_location: String,

    /// Request timeout in seconds (applies to each of the two calls)
    #[serde(default = "default_weather_timeout")]
    pub timeout_secs: u64,
}

/// Speech recognition engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    /// External speech-to-text command; None disables voice input
    #[serde(default)]
    pub program: Option<String>,

    /// Arguments passed to the command; "{lang}" is replaced with `language`
    #[serde(default)]
    pub args: Vec<String>,

    /// BCP 47 language tag for recognition
    #[serde(default = "default_language")]
    pub language: String,
}

/// Speech synthesizer configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SpeakConfig {
    /// Synthesizer binary; None probes espeak-ng then espeak on PATH
    #[serde(default)]
    pub program: Option<String>,
}

/// Audio cue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedbackConfig {
    /// Enable earcons on mic open/close and errors
    #[serde(default)]
    pub enabled: bool,

    /// Volume level (0.0 to 1.0)
    #[serde(default = "default_feedback_volume")]
    pub volume: f32,
}

fn default_chat_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_persona() -> String {
    "You are Valet, a capable personal AI assistant with a composed, lightly \
     British register. You are courteous and efficient, and you keep replies \
     concise yet informative. Help users with their questions and tasks \
     effectively."
        .to_string()
}

fn default_chat_timeout() -> u64 {
    30
}

fn default_geocode_endpoint() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_forecast_endpoint() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_location() -> String {
    "New York".to_string()
}

fn default_weather_timeout() -> u64 {
    10
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_feedback_volume() -> f32 {
    0.7
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: default_chat_endpoint(),
            model: default_chat_model(),
            api_key: None,
            persona: default_persona(),
            timeout_secs: default_chat_timeout(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocode_endpoint: default_geocode_endpoint(),
            forecast_endpoint: default_forecast_endpoint(),
            default_location: default_location(),
            timeout_secs: default_weather_timeout(),
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            language: default_language(),
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            volume: default_feedback_volume(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            weather: WeatherConfig::default(),
            listen: ListenConfig::default(),
            speak: SpeakConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "valet")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "valet")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, ValetError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ValetError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| ValetError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(key) = std::env::var("VALET_API_KEY") {
        config.chat.api_key = Some(key);
    }
    if let Ok(endpoint) = std::env::var("VALET_CHAT_ENDPOINT") {
        config.chat.endpoint = endpoint;
    }
    if let Ok(model) = std::env::var("VALET_MODEL") {
        config.chat.model = model;
    }

    Ok(config)
}
