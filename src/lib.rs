//! KeyGuide - USB-MIDI keyboard tutor
//!
//! Note-On events from a class-compliant keyboard are pulled off a bulk IN
//! endpoint, queued in a bounded ring and checked against song or chord
//! lessons, with short correct / incorrect indicators as feedback.

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod lesson;
pub mod library;
pub mod midi;
pub mod monitor;
pub mod transport;
pub mod tutor;

pub use error::{LessonError, NoteParseError, TransportError};
pub use lesson::LessonEngine;
pub use tutor::{MonotonicClock, TickReport, Tutor};
