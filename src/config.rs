//! Configuration management for KeyGuide
//!
//! Handles loading, parsing and validation of the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::lesson::step::at_step;
use crate::lesson::{
    parse_pitch, Chord, ChordPack, NoteLength, NoteName, Song, SongNote, SongStep,
};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    /// Include the built-in songs and chord packs
    #[serde(default = "default_true")]
    pub builtin_library: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub songs: Vec<SongConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chord_packs: Vec<ChordPackConfig>,
}

/// MIDI port configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Case-insensitive substring of the keyboard's port name; first port
    /// when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_port: Option<String>,
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

/// Scheduler timing, all in milliseconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// On-time of the correct / incorrect indicators
    #[serde(default = "default_feedback_ms")]
    pub feedback_ms: u64,
    /// Interval between keyboard presence checks
    #[serde(default = "default_port_check_ms")]
    pub port_check_ms: u64,
}

/// Song as written in the config
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SongConfig {
    pub title: String,
    /// Each step lists 1-3 notes played together
    pub steps: Vec<Vec<NoteEntry>>,
}

/// Song note: `"C4"`, a MIDI number, or `{ note: "C4", length: half }`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NoteEntry {
    Number(u8),
    Name(String),
    Detailed {
        note: String,
        #[serde(default)]
        length: NoteLength,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChordPackConfig {
    pub name: String,
    pub chords: Vec<ChordConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChordConfig {
    pub name: String,
    /// Note names without octave (`C`, `F#`, `Bb`)
    pub tones: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_client_name() -> String {
    "KeyGuide".to_string()
}

fn default_tick_ms() -> u64 {
    1
}

fn default_feedback_ms() -> u64 {
    120
}

fn default_port_check_ms() -> u64 {
    1000
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            input_port: None,
            client_name: default_client_name(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            feedback_ms: default_feedback_ms(),
            port_check_ms: default_port_check_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            midi: MidiConfig::default(),
            timing: TimingConfig::default(),
            builtin_library: true,
            songs: Vec::new(),
            chord_packs: Vec::new(),
        }
    }
}

impl NoteEntry {
    fn to_note(&self) -> Result<SongNote> {
        match self {
            NoteEntry::Number(pitch) => {
                if *pitch > 127 {
                    anyhow::bail!("Note number {} is invalid (must be 0-127)", pitch);
                }
                Ok(SongNote::quarter(*pitch))
            }
            NoteEntry::Name(name) => parse_note(name, NoteLength::Quarter),
            NoteEntry::Detailed { note, length } => parse_note(note, *length),
        }
    }
}

fn parse_note(text: &str, length: NoteLength) -> Result<SongNote> {
    let pitch = parse_pitch(text)?;
    // Keep the spelling used in the file (Bb stays Bb)
    let name_part: String = text
        .trim()
        .chars()
        .take_while(|c| !c.is_ascii_digit() && *c != '-')
        .collect();
    let name = NoteName::parse(&name_part)?;
    Ok(SongNote::new(name, pitch, length))
}

impl SongConfig {
    pub fn to_song(&self) -> Result<Song> {
        let steps = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, entries)| {
                let notes = entries
                    .iter()
                    .map(NoteEntry::to_note)
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("Invalid note in step {}", index + 1))?;
                SongStep::new(notes).map_err(|e| anyhow::Error::new(at_step(e, index)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Song::new(self.title.clone(), steps))
    }
}

impl ChordPackConfig {
    pub fn to_chord_pack(&self) -> Result<ChordPack> {
        let chords = self
            .chords
            .iter()
            .enumerate()
            .map(|(index, chord)| {
                let tones = chord
                    .tones
                    .iter()
                    .map(|t| NoteName::parse(t))
                    .collect::<Result<Vec<_>, _>>()
                    .with_context(|| format!("Invalid tone in chord '{}'", chord.name))?;
                Chord::new(chord.name.clone(), tones)
                    .map_err(|e| anyhow::Error::new(at_step(e, index)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ChordPack::new(self.name.clone(), chords))
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path).await
        } else {
            info!("No config file at {}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if let Some(port) = &self.midi.input_port {
            if port.trim().is_empty() {
                anyhow::bail!("MIDI input_port cannot be empty (omit it to use the first port)");
            }
        }
        if self.midi.client_name.is_empty() {
            anyhow::bail!("MIDI client_name cannot be empty");
        }

        if self.timing.tick_ms == 0 || self.timing.tick_ms > 1000 {
            anyhow::bail!("timing.tick_ms {} is invalid (must be 1-1000)", self.timing.tick_ms);
        }
        if self.timing.port_check_ms < self.timing.tick_ms {
            anyhow::bail!(
                "timing.port_check_ms ({}) must be at least tick_ms ({})",
                self.timing.port_check_ms,
                self.timing.tick_ms
            );
        }

        for (idx, song) in self.songs.iter().enumerate() {
            if song.title.trim().is_empty() {
                anyhow::bail!("Song {} title cannot be empty", idx + 1);
            }
            if song.steps.is_empty() {
                anyhow::bail!("Song '{}' has no steps", song.title);
            }
            song.to_song()
                .with_context(|| format!("Invalid song '{}'", song.title))?;
        }

        for (idx, pack) in self.chord_packs.iter().enumerate() {
            if pack.name.trim().is_empty() {
                anyhow::bail!("Chord pack {} name cannot be empty", idx + 1);
            }
            if pack.chords.is_empty() {
                anyhow::bail!("Chord pack '{}' has no chords", pack.name);
            }
            pack.to_chord_pack()
                .with_context(|| format!("Invalid chord pack '{}'", pack.name))?;
        }

        if !self.builtin_library && self.songs.is_empty() && self.chord_packs.is_empty() {
            anyhow::bail!("builtin_library is off and no songs or chord packs are defined");
        }

        Ok(())
    }
}
