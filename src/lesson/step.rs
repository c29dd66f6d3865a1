//! Lesson content: songs, chord packs and the steps built from them

use serde::Serialize;

use super::pitch::{pitch_name, NoteLength, NoteName, PitchClass};
use crate::error::LessonError;

/// Maximum number of notes required by one step
pub const MAX_SLOTS: usize = 3;

/// One note of a song step, spelled the way the song writes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SongNote {
    pub name: NoteName,
    pub pitch: u8,
    pub length: NoteLength,
}

impl SongNote {
    pub const fn new(name: NoteName, pitch: u8, length: NoteLength) -> Self {
        Self {
            name,
            pitch,
            length,
        }
    }

    /// Note with the sharp spelling of `pitch`
    pub fn from_pitch(pitch: u8, length: NoteLength) -> Self {
        Self::new(NoteName::from_pitch(pitch), pitch, length)
    }

    pub fn quarter(pitch: u8) -> Self {
        Self::from_pitch(pitch, NoteLength::Quarter)
    }
}

/// Compile-time check of a fixed-size step
struct SlotCount<const N: usize>;

impl<const N: usize> SlotCount<N> {
    const VALID: () = assert!(N >= 1 && N <= MAX_SLOTS, "a step requires 1 to 3 notes");
}

/// 1 to 3 notes played together
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongStep {
    notes: Vec<SongNote>,
}

impl SongStep {
    pub fn new(notes: Vec<SongNote>) -> Result<Self, LessonError> {
        validate_slot_count(0, notes.len())?;
        if let Some(note) = notes.iter().find(|n| n.pitch > 127) {
            return Err(LessonError::PitchOutOfRange(note.pitch));
        }
        Ok(Self { notes })
    }

    /// Step with a slot count checked at compile time
    ///
    /// # Panics
    ///
    /// If a pitch is above 127.
    pub fn from_array<const N: usize>(notes: [SongNote; N]) -> Self {
        let () = SlotCount::<N>::VALID;
        assert!(
            notes.iter().all(|n| n.pitch <= 127),
            "song pitches must be 0-127"
        );
        Self {
            notes: notes.to_vec(),
        }
    }

    pub fn notes(&self) -> &[SongNote] {
        &self.notes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Song {
    pub title: String,
    pub steps: Vec<SongStep>,
}

impl Song {
    pub fn new(title: impl Into<String>, steps: Vec<SongStep>) -> Self {
        Self {
            title: title.into(),
            steps,
        }
    }

    /// Build from raw pitches, one quarter note each
    pub fn from_pitches(title: impl Into<String>, steps: &[&[u8]]) -> Result<Self, LessonError> {
        let steps = steps
            .iter()
            .enumerate()
            .map(|(index, pitches)| {
                SongStep::new(pitches.iter().map(|p| SongNote::quarter(*p)).collect())
                    .map_err(|e| at_step(e, index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(title, steps))
    }
}

/// Chord to be played in any octave and inversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chord {
    pub name: String,
    tones: Vec<NoteName>,
}

impl Chord {
    pub fn new(name: impl Into<String>, tones: Vec<NoteName>) -> Result<Self, LessonError> {
        validate_slot_count(0, tones.len())?;
        Ok(Self {
            name: name.into(),
            tones,
        })
    }

    /// Chord with a tone count checked at compile time
    pub fn from_array<const N: usize>(name: impl Into<String>, tones: [NoteName; N]) -> Self {
        let () = SlotCount::<N>::VALID;
        Self {
            name: name.into(),
            tones: tones.to_vec(),
        }
    }

    pub fn tones(&self) -> &[NoteName] {
        &self.tones
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChordPack {
    pub name: String,
    pub chords: Vec<Chord>,
}

impl ChordPack {
    pub fn new(name: impl Into<String>, chords: Vec<Chord>) -> Self {
        Self {
            name: name.into(),
            chords,
        }
    }
}

/// What a slot expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SlotTarget {
    /// Exact MIDI pitch (song mode)
    Pitch(u8),
    /// Any octave of a pitch class (chord mode)
    Class(PitchClass),
}

impl SlotTarget {
    pub fn accepts(&self, pitch: u8) -> bool {
        match *self {
            SlotTarget::Pitch(expected) => expected == pitch,
            SlotTarget::Class(class) => PitchClass::of_pitch(pitch) == class,
        }
    }

    pub fn label(&self) -> String {
        match *self {
            SlotTarget::Pitch(pitch) => pitch_name(pitch),
            SlotTarget::Class(class) => NoteName::from_pitch(class.value()).to_string(),
        }
    }
}

/// One step of a running lesson with its display data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LessonStep {
    Notes { notes: Vec<SongNote> },
    Chord { name: String, tones: Vec<NoteName> },
}

impl LessonStep {
    pub fn targets(&self) -> Vec<SlotTarget> {
        match self {
            LessonStep::Notes { notes } => {
                notes.iter().map(|n| SlotTarget::Pitch(n.pitch)).collect()
            }
            LessonStep::Chord { tones, .. } => tones
                .iter()
                .map(|t| SlotTarget::Class(t.pitch_class()))
                .collect(),
        }
    }

    pub fn slot_count(&self) -> usize {
        match self {
            LessonStep::Notes { notes } => notes.len(),
            LessonStep::Chord { tones, .. } => tones.len(),
        }
    }
}

impl From<&SongStep> for LessonStep {
    fn from(step: &SongStep) -> Self {
        LessonStep::Notes {
            notes: step.notes.clone(),
        }
    }
}

impl From<&Chord> for LessonStep {
    fn from(chord: &Chord) -> Self {
        LessonStep::Chord {
            name: chord.name.clone(),
            tones: chord.tones.clone(),
        }
    }
}

fn validate_slot_count(index: usize, count: usize) -> Result<(), LessonError> {
    if count == 0 || count > MAX_SLOTS {
        return Err(LessonError::InvalidSlotCount { index, count });
    }
    Ok(())
}

/// Rewrite the step index of a slot-count error raised while building a
/// sequence
pub(crate) fn at_step(error: LessonError, index: usize) -> LessonError {
    match error {
        LessonError::InvalidSlotCount { count, .. } => {
            LessonError::InvalidSlotCount { index, count }
        }
        other => other,
    }
}
