//! Songs and chord packs available for lessons
//!
//! The built-in library ships two songs, a chromatic study and two chord
//! packs. The config file can add more, or replace them when
//! `builtin_library` is off.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::AppConfig;
use crate::lesson::{
    Accidental, Chord, ChordPack, Letter, NoteLength, NoteName, Song, SongNote, SongStep,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct Library {
    pub songs: Vec<Song>,
    pub chord_packs: Vec<ChordPack>,
}

const fn natural(letter: Letter) -> NoteName {
    NoteName::natural(letter)
}

const fn sharp(letter: Letter) -> NoteName {
    NoteName::new(letter, Accidental::Sharp)
}

const fn flat(letter: Letter) -> NoteName {
    NoteName::new(letter, Accidental::Flat)
}

fn note(name: NoteName, pitch: u8, length: NoteLength) -> SongNote {
    SongNote::new(name, pitch, length)
}

fn q(name: NoteName, pitch: u8) -> SongNote {
    note(name, pitch, NoteLength::Quarter)
}

fn twinkle() -> Song {
    use Letter::*;
    Song::new(
        "Twinkle Twinkle",
        vec![
            SongStep::from_array([q(natural(C), 60), q(natural(C), 60)]),
            SongStep::from_array([q(natural(G), 67), q(natural(G), 67)]),
            SongStep::from_array([q(natural(A), 69), q(natural(A), 69)]),
            SongStep::from_array([note(natural(G), 67, NoteLength::Half)]),
        ],
    )
}

fn mary() -> Song {
    use Letter::*;
    Song::new(
        "Mary Had a Lamb",
        vec![
            SongStep::from_array([q(natural(E), 64), q(natural(D), 62)]),
            SongStep::from_array([q(natural(C), 60), q(natural(D), 62)]),
            SongStep::from_array([
                q(natural(E), 64),
                q(natural(E), 64),
                note(natural(E), 64, NoteLength::Half),
            ]),
        ],
    )
}

fn chroma_study() -> Song {
    use Letter::*;
    let eighth = NoteLength::Eighth;
    Song::new(
        "Chroma Study",
        vec![
            SongStep::from_array([q(natural(C), 60), q(natural(D), 62)]),
            SongStep::from_array([q(natural(E), 64), q(natural(F), 65)]),
            SongStep::from_array([
                note(sharp(F), 66, eighth),
                note(natural(G), 67, eighth),
                q(natural(A), 69),
            ]),
            SongStep::from_array([q(flat(B), 70), q(natural(A), 69)]),
            SongStep::from_array([q(natural(G), 67), q(sharp(F), 66)]),
            SongStep::from_array([q(sharp(F), 66), q(flat(B), 70)]),
            SongStep::from_array([note(natural(C), 72, NoteLength::Half)]),
        ],
    )
}

fn basic_chords() -> ChordPack {
    use Letter::*;
    ChordPack::new(
        "Basic chords",
        vec![
            Chord::from_array("C", [natural(C), natural(E), natural(G)]),
            Chord::from_array("G", [natural(G), natural(B), natural(D)]),
            Chord::from_array("Am", [natural(A), natural(C), natural(E)]),
            Chord::from_array("F", [natural(F), natural(A), natural(C)]),
            Chord::from_array("Dm", [natural(D), natural(F), natural(A)]),
            Chord::from_array("Em", [natural(E), natural(G), natural(B)]),
        ],
    )
}

fn advanced_chords() -> ChordPack {
    use Letter::*;
    ChordPack::new(
        "Advanced chords",
        vec![
            Chord::from_array("F#", [sharp(F), sharp(A), sharp(C)]),
            Chord::from_array("Bb", [flat(B), natural(D), natural(F)]),
            Chord::from_array("Gm", [natural(G), flat(B), natural(D)]),
            Chord::from_array("Ab", [flat(A), natural(C), flat(E)]),
            Chord::from_array("C#m", [sharp(C), natural(E), sharp(G)]),
            Chord::from_array("E", [natural(E), sharp(G), natural(B)]),
        ],
    )
}

/// Pick an entry by 1-based index or case-insensitive title substring
fn select<'a, T>(items: &'a [T], selector: &str, title: impl Fn(&T) -> &str) -> Option<&'a T> {
    let selector = selector.trim();
    if let Ok(index) = selector.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| items.get(i));
    }

    let needle = selector.to_lowercase();
    items
        .iter()
        .find(|item| title(item).to_lowercase() == needle)
        .or_else(|| items.iter().find(|item| title(item).to_lowercase().contains(&needle)))
}

impl Library {
    pub fn builtin() -> Self {
        Self {
            songs: vec![twinkle(), mary(), chroma_study()],
            chord_packs: vec![basic_chords(), advanced_chords()],
        }
    }

    /// Built-in entries (unless disabled) followed by the configured ones
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut library = if config.builtin_library {
            Self::builtin()
        } else {
            Self::default()
        };

        for song in &config.songs {
            let song = song
                .to_song()
                .with_context(|| format!("Invalid song '{}'", song.title))?;
            library.songs.push(song);
        }
        for pack in &config.chord_packs {
            let pack = pack
                .to_chord_pack()
                .with_context(|| format!("Invalid chord pack '{}'", pack.name))?;
            library.chord_packs.push(pack);
        }

        Ok(library)
    }

    pub fn find_song(&self, selector: &str) -> Option<&Song> {
        select(&self.songs, selector, |s| s.title.as_str())
    }

    pub fn find_chord_pack(&self, selector: &str) -> Option<&ChordPack> {
        select(&self.chord_packs, selector, |p| p.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty() && self.chord_packs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::{LessonEngine, LessonStep, SlotTarget};

    #[test]
    fn test_builtin_contents() {
        let library = Library::builtin();
        let titles: Vec<&str> = library.songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Twinkle Twinkle", "Mary Had a Lamb", "Chroma Study"]);
        assert_eq!(library.chord_packs.len(), 2);
        assert!(library.chord_packs.iter().all(|p| p.chords.len() == 6));
    }

    #[test]
    fn test_builtin_chord_classes() {
        let library = Library::builtin();
        let advanced = library.find_chord_pack("advanced").unwrap();
        let ab = &advanced.chords[3];
        assert_eq!(ab.name, "Ab");
        let classes: Vec<u8> = ab.tones().iter().map(|t| t.pitch_class().value()).collect();
        assert_eq!(classes, vec![8, 0, 3]);
    }

    #[test]
    fn test_chroma_study_spelling() {
        let library = Library::builtin();
        let song = library.find_song("chroma").unwrap();
        let bb = song.steps[3].notes()[0];
        assert_eq!(bb.name.to_string(), "Bb");
        assert_eq!(bb.pitch, 70);
    }

    #[test]
    fn test_select_by_index_and_title() {
        let library = Library::builtin();
        assert_eq!(library.find_song("2").unwrap().title, "Mary Had a Lamb");
        assert_eq!(library.find_song("twinkle twinkle").unwrap().title, "Twinkle Twinkle");
        assert_eq!(library.find_chord_pack("1").unwrap().name, "Basic chords");
        assert!(library.find_song("0").is_none());
        assert!(library.find_song("9").is_none());
        assert!(library.find_song("bach").is_none());
    }

    #[test]
    fn test_every_builtin_lesson_starts() {
        let library = Library::builtin();
        let mut engine = LessonEngine::default();
        for song in &library.songs {
            engine.start_song(song, 0).unwrap();
        }
        for pack in &library.chord_packs {
            engine.start_chord_exercise(pack, 0).unwrap();
            let snapshot = engine.snapshot().unwrap();
            assert!(matches!(snapshot.step, LessonStep::Chord { .. }));
            assert!(snapshot.targets.iter().all(|t| matches!(t, SlotTarget::Class(_))));
        }
    }

    #[test]
    fn test_from_config_appends_and_can_drop_builtins() {
        let config: AppConfig = serde_yaml::from_str(
            r#"
builtin_library: false
songs:
  - title: Ode
    steps: [[E4], [E4], [F4], [G4]]
"#,
        )
        .unwrap();
        let library = Library::from_config(&config).unwrap();
        assert_eq!(library.songs.len(), 1);
        assert!(library.chord_packs.is_empty());
        assert_eq!(library.songs[0].steps.len(), 4);
        assert!(!library.is_empty());

        let config = AppConfig::default();
        assert_eq!(Library::from_config(&config).unwrap().songs.len(), 3);
    }

    #[test]
    fn test_no_builtins_and_no_config_entries_is_empty() {
        let config: AppConfig = serde_yaml::from_str("builtin_library: false").unwrap();
        config.validate().unwrap();
        let library = Library::from_config(&config).unwrap();
        assert!(library.is_empty());
        assert!(library.find_song("1").is_none());
        assert!(!Library::builtin().is_empty());
    }
}
