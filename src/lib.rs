//! Valet: voice-and-text AI assistant for the terminal
//!
//! This library provides the core functionality for:
//! - Capturing speech through a host recognition engine (external command)
//! - Relaying the conversation to an OpenAI-compatible chat endpoint
//! - Speaking replies through the host synthesizer (espeak family)
//! - Quick actions: current time, current date, weather, clear chat
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────────────┐
//!                    │    Conversation Controller   │
//!                    │  idle → listening →          │
//!                    │  processing → speaking → idle│
//!                    └──────────────────────────────┘
//!                        │            │           │
//!            ┌───────────┘            │           └───────────┐
//!            ▼                        ▼                       ▼
//!   ┌────────────────┐      ┌────────────────┐      ┌────────────────┐
//!   │  Speech Input  │      │  Chat Client   │      │ Speech Output  │
//!   │  (Recognizer)  │      │    (ureq)      │      │ (Synthesizer)  │
//!   └────────────────┘      └────────────────┘      └────────────────┘
//!            │                                               │
//!            ▼                                               ▼
//!    external STT command                             espeak-ng / espeak
//! ```
//!
//! The controller owns the status value and the message sequence. Adapters
//! deliver exactly one terminal event per started operation; cancelled
//! operations deliver none, and a late event from a cancelled operation is
//! dropped by a generation check.

pub mod chat;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod feedback;
pub mod message;
pub mod speech;
pub mod state;
pub mod weather;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use controller::{Controller, Event, Notice};
pub use error::{Result, ValetError};
pub use message::{ConversationMessage, Role};
pub use state::Status;
