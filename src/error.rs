//! Error types shared by the transport, lesson and library layers

use thiserror::Error;

/// Errors raised while negotiating or opening the MIDI IN endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No interface with class Audio / subclass MIDI Streaming
    #[error("No MIDI Streaming interface found")]
    NoStreamingInterface,

    /// The streaming interface has no bulk IN endpoint
    #[error("MIDI Streaming interface {interface} has no bulk IN endpoint")]
    NoBulkInEndpoint { interface: u8 },

    /// Host MIDI port matching the pattern is not present
    #[error("MIDI input port '{0}' not found")]
    PortNotFound(String),

    /// The host has no MIDI input ports at all
    #[error("No MIDI input ports available")]
    NoPorts,

    /// Backend (midir) failure
    #[error("MIDI backend error: {0}")]
    Backend(String),
}

/// Errors raised when a lesson cannot be started
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LessonError {
    /// Song or chord pack without steps
    #[error("Lesson '{0}' has no steps")]
    EmptySequence(String),

    /// A step must require between 1 and 3 notes
    #[error("Step {index} requires {count} notes (must be 1-3)")]
    InvalidSlotCount { index: usize, count: usize },

    /// Song pitch outside 0-127
    #[error("Pitch {0} is outside the MIDI range 0-127")]
    PitchOutOfRange(u8),
}

/// Errors raised while parsing note names such as `C4`, `F#` or `Bb3`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoteParseError {
    #[error("Invalid note format: '{0}'")]
    InvalidFormat(String),

    #[error("Unknown note letter in '{0}'")]
    InvalidNote(String),

    #[error("Octave out of MIDI range in '{0}'")]
    InvalidOctave(String),
}
