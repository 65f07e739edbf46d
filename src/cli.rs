// Command-line interface definitions for valet
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "valet")]
#[command(author, version, about = "Voice-and-text AI assistant for the terminal")]
#[command(long_about = "
Valet is a voice-and-text AI assistant for the terminal. Type a message or
open the microphone, and the reply is rendered in the session and spoken
back through the host speech synthesizer.

SETUP:
  1. Install espeak-ng for spoken replies (optional)
  2. Configure a speech-to-text command for voice input (optional)
  3. Export VALET_API_KEY for the chat endpoint
  4. Run: valet

USAGE:
  Type your message, or use /mic to talk. Slash commands inside a session:
  /mic /stop /time /date /weather [place] /clear /help /quit
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable spoken replies for this session
    #[arg(long)]
    pub mute: bool,

    /// Override the chat endpoint base URL
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Override the chat model name
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive session (default if no command specified)
    Chat,

    /// Speak a piece of text through the synthesizer and exit
    Say {
        /// Text to speak
        text: String,
    },

    /// Capture one utterance, print the transcript and exit
    Listen,

    /// Show the effective configuration
    Config,
}
