//! Note names, pitch classes and scientific pitch notation

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NoteParseError;

/// Natural note letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    /// Parse a letter; `H` is the German name for B
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            'F' => Some(Letter::F),
            'G' => Some(Letter::G),
            'A' => Some(Letter::A),
            'B' | 'H' => Some(Letter::B),
            _ => None,
        }
    }

    pub const fn semitone(self) -> u8 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    pub const fn as_char(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accidental {
    #[default]
    Natural,
    Sharp,
    Flat,
}

impl Accidental {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '#' | '♯' => Some(Accidental::Sharp),
            'b' | '♭' => Some(Accidental::Flat),
            _ => None,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        }
    }
}

/// Pitch reduced modulo 12 (C = 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const fn new(class: u8) -> Self {
        Self(class % 12)
    }

    pub const fn of_pitch(pitch: u8) -> Self {
        Self(pitch % 12)
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Letter plus accidental, without octave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NoteName {
    pub letter: Letter,
    pub accidental: Accidental,
}

impl NoteName {
    pub const fn new(letter: Letter, accidental: Accidental) -> Self {
        Self { letter, accidental }
    }

    pub const fn natural(letter: Letter) -> Self {
        Self::new(letter, Accidental::Natural)
    }

    /// Sharp applies +1, flat +11, both modulo 12
    pub const fn pitch_class(self) -> PitchClass {
        let base = self.letter.semitone();
        let class = match self.accidental {
            Accidental::Natural => base,
            Accidental::Sharp => (base + 1) % 12,
            Accidental::Flat => (base + 11) % 12,
        };
        PitchClass(class)
    }

    /// Sharp spelling of a pitch
    pub fn from_pitch(pitch: u8) -> Self {
        const SPELLING: [(Letter, Accidental); 12] = [
            (Letter::C, Accidental::Natural),
            (Letter::C, Accidental::Sharp),
            (Letter::D, Accidental::Natural),
            (Letter::D, Accidental::Sharp),
            (Letter::E, Accidental::Natural),
            (Letter::F, Accidental::Natural),
            (Letter::F, Accidental::Sharp),
            (Letter::G, Accidental::Natural),
            (Letter::G, Accidental::Sharp),
            (Letter::A, Accidental::Natural),
            (Letter::A, Accidental::Sharp),
            (Letter::B, Accidental::Natural),
        ];
        let (letter, accidental) = SPELLING[usize::from(pitch % 12)];
        Self::new(letter, accidental)
    }

    /// Parse `C`, `F#`, `Bb`, `H`
    pub fn parse(s: &str) -> Result<Self, NoteParseError> {
        let (name, rest) = split_name(s)?;
        if !rest.is_empty() {
            return Err(NoteParseError::InvalidFormat(s.to_string()));
        }
        Ok(name)
    }
}

impl FromStr for NoteName {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter.as_char(), self.accidental.symbol())
    }
}

/// Split a leading note name off `s`, returning the remainder
fn split_name(s: &str) -> Result<(NoteName, &str), NoteParseError> {
    let trimmed = s.trim();
    let mut chars = trimmed.char_indices();

    let (_, first) = chars
        .next()
        .ok_or_else(|| NoteParseError::InvalidFormat(s.to_string()))?;
    let letter =
        Letter::from_char(first).ok_or_else(|| NoteParseError::InvalidNote(s.to_string()))?;

    let rest = &trimmed[first.len_utf8()..];
    match rest.chars().next().and_then(Accidental::from_char) {
        Some(accidental) => {
            let skip = rest.chars().next().map_or(0, char::len_utf8);
            Ok((NoteName::new(letter, accidental), &rest[skip..]))
        }
        None => Ok((NoteName::natural(letter), rest)),
    }
}

/// Parse scientific pitch notation (`C4` = 60, `A0` = 21, `Bb3` = 58)
pub fn parse_pitch(s: &str) -> Result<u8, NoteParseError> {
    let (name, octave) = split_name(s)?;
    let octave = octave.trim();
    if octave.is_empty() {
        return Err(NoteParseError::InvalidFormat(s.to_string()));
    }

    let octave: i32 = octave
        .parse()
        .map_err(|_| NoteParseError::InvalidOctave(s.to_string()))?;
    if !(-1..=9).contains(&octave) {
        return Err(NoteParseError::InvalidOctave(s.to_string()));
    }

    let base = i32::from(name.letter.semitone());
    let shift = match name.accidental {
        Accidental::Natural => 0,
        Accidental::Sharp => 1,
        Accidental::Flat => -1,
    };
    let pitch = (octave + 1) * 12 + base + shift;

    u8::try_from(pitch)
        .ok()
        .filter(|p| *p <= 127)
        .ok_or_else(|| NoteParseError::InvalidOctave(s.to_string()))
}

/// Octave number of a MIDI pitch (60 is octave 4)
pub const fn octave(pitch: u8) -> i8 {
    (pitch / 12) as i8 - 1
}

/// Single display character for the octave; pitches below C0 show `-`
pub fn octave_char(pitch: u8) -> char {
    match octave(pitch) {
        o @ 0..=9 => char::from(b'0' + o as u8),
        _ => '-',
    }
}

/// Sharp-spelled name with octave (`pitch_name(61) == "C#4"`)
pub fn pitch_name(pitch: u8) -> String {
    format!("{}{}", NoteName::from_pitch(pitch), octave(pitch))
}

/// Display-only note duration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteLength {
    Whole,
    Half,
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
}

impl NoteLength {
    /// Single-character glyph shown next to a song note
    pub const fn glyph(self) -> char {
        match self {
            NoteLength::Whole => 'w',
            NoteLength::Half => 'h',
            NoteLength::Quarter => 'q',
            NoteLength::Eighth => 'e',
            NoteLength::Sixteenth => 's',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_class_of_names() {
        let cases = [
            ("C", 0),
            ("C#", 1),
            ("Db", 1),
            ("E", 4),
            ("F", 5),
            ("Cb", 11),
            ("B#", 0),
            ("H", 11),
            ("Bb", 10),
            ("Ab", 8),
        ];
        for (name, class) in cases {
            let parsed = NoteName::parse(name).unwrap();
            assert_eq!(parsed.pitch_class().value(), class, "{}", name);
        }
    }

    #[test]
    fn test_parse_pitch() {
        assert_eq!(parse_pitch("C4").unwrap(), 60);
        assert_eq!(parse_pitch("A4").unwrap(), 69);
        assert_eq!(parse_pitch("A0").unwrap(), 21);
        assert_eq!(parse_pitch("Bb3").unwrap(), 58);
        assert_eq!(parse_pitch("F#4").unwrap(), 66);
        assert_eq!(parse_pitch("H4").unwrap(), 71);
        assert_eq!(parse_pitch("C-1").unwrap(), 0);
        assert_eq!(parse_pitch("G9").unwrap(), 127);
        assert_eq!(parse_pitch(" e5 ").unwrap(), 76);
    }

    #[test]
    fn test_parse_pitch_errors() {
        assert!(matches!(parse_pitch(""), Err(NoteParseError::InvalidFormat(_))));
        assert!(matches!(parse_pitch("C"), Err(NoteParseError::InvalidFormat(_))));
        assert!(matches!(parse_pitch("X4"), Err(NoteParseError::InvalidNote(_))));
        assert!(matches!(parse_pitch("C#x"), Err(NoteParseError::InvalidOctave(_))));
        assert!(matches!(parse_pitch("G#9"), Err(NoteParseError::InvalidOctave(_))));
        assert!(matches!(parse_pitch("Cb-1"), Err(NoteParseError::InvalidOctave(_))));
        assert!(matches!(parse_pitch("C10"), Err(NoteParseError::InvalidOctave(_))));
    }

    #[test]
    fn test_note_name_rejects_trailing_text() {
        assert!(NoteName::parse("F#4").is_err());
        assert!(NoteName::parse("Fm").is_err());
    }

    #[test]
    fn test_pitch_name_and_octave() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(61), "C#4");
        assert_eq!(pitch_name(21), "A0");
        assert_eq!(pitch_name(0), "C-1");
        assert_eq!(octave_char(60), '4');
        assert_eq!(octave_char(5), '-');
        assert_eq!(octave_char(127), '9');
    }

    #[test]
    fn test_round_trip_names() {
        for pitch in 0..=127u8 {
            assert_eq!(parse_pitch(&pitch_name(pitch)).unwrap(), pitch);
        }
    }
}
