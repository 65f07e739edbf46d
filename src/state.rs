//! Assistant status state machine
//!
//! Defines the single status value that drives the conversation cycle:
//! Idle → Listening → Processing → Speaking → Idle

use std::fmt;

/// What the assistant is currently doing.
///
/// Exactly one value exists at a time, owned by the conversation controller.
/// View code only observes it; every mutation happens inside the controller
/// in response to a user action or a terminal adapter event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Waiting for user input
    #[default]
    Idle,

    /// A speech recognition session is active
    Listening,

    /// Waiting on the chat endpoint
    Processing,

    /// Speaking a reply through the synthesizer
    Speaking,
}

impl Status {
    /// Check if the assistant is ready to accept a new request
    pub fn is_idle(&self) -> bool {
        matches!(self, Status::Idle)
    }

    /// Check if a recognition session is active
    pub fn is_listening(&self) -> bool {
        matches!(self, Status::Listening)
    }

    /// Check if a reply is being spoken
    pub fn is_speaking(&self) -> bool {
        matches!(self, Status::Speaking)
    }

    /// Stable lowercase name, used for logging
    pub fn name(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Listening => "listening",
            Status::Processing => "processing",
            Status::Speaking => "speaking",
        }
    }
}

impl fmt::Display for Status {
    /// The label shown next to the status dot in the session view
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Idle => "Ready",
            Status::Listening => "Listening...",
            Status::Processing => "Processing...",
            Status::Speaking => "Speaking...",
        };
        write!(f, "{}", label)
    }
}
