//! Lesson engine: note and chord verification with pass/fail feedback

pub mod feedback;
pub mod pitch;
pub mod session;
pub mod stats;
pub mod step;

pub use feedback::{FeedbackKind, FeedbackTimer, DEFAULT_FEEDBACK_MS};
pub use pitch::{parse_pitch, pitch_name, Accidental, Letter, NoteLength, NoteName, PitchClass};
pub use session::{
    Advance, Button, ButtonOutcome, LessonEngine, LessonMode, LessonSession, NoteOutcome,
    SessionSnapshot, SessionState,
};
pub use stats::SessionStats;
pub use step::{Chord, ChordPack, LessonStep, SlotTarget, Song, SongNote, SongStep, MAX_SLOTS};
