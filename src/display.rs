//! Lesson display
//!
//! Renders the lesson on a two-row, 16-column text layout and drives the
//! correct / incorrect indicators. [`ConsoleDisplay`] prints it to the
//! terminal.

use colored::*;
use tracing::debug;

use crate::lesson::pitch::octave_char;
use crate::lesson::{
    FeedbackKind, LessonEngine, LessonStep, NoteOutcome, SessionSnapshot, SessionState,
    SessionStats,
};

/// Columns per display row
pub const LCD_COLUMNS: usize = 16;

/// Output side of the tutor
pub trait LessonDisplay {
    /// Show the current step of a running lesson
    fn show_step(&mut self, snapshot: &SessionSnapshot);

    /// Show the end-of-lesson summary
    fn show_summary(&mut self, snapshot: &SessionSnapshot);

    /// Switch an indicator on or off
    fn set_indicator(&mut self, kind: FeedbackKind, lit: bool);

    /// Show free text (menus, connection status)
    fn show_message(&mut self, lines: [&str; 2]);
}

/// Redraw whatever the engine currently shows
pub fn refresh(display: &mut dyn LessonDisplay, engine: &LessonEngine) {
    match engine.snapshot() {
        Some(snapshot) if snapshot.state == SessionState::Summary => {
            display.show_summary(&snapshot)
        }
        Some(snapshot) => display.show_step(&snapshot),
        None => display.show_message(["KeyGuide", "Pick a lesson"]),
    }
}

fn fit(line: String) -> String {
    line.chars().take(LCD_COLUMNS).collect()
}

/// Two display rows for a step.
///
/// Song steps list each note with accidental and octave, with the duration
/// glyph under the first character of each note. Chord steps show the chord
/// name and its tones.
pub fn step_lines(step: &LessonStep) -> [String; 2] {
    match step {
        LessonStep::Notes { notes } => {
            let mut top = String::new();
            let mut bottom = String::new();
            for (i, note) in notes.iter().enumerate() {
                if i > 0 {
                    top.push(' ');
                }
                let column = top.chars().count();
                while bottom.chars().count() < column {
                    bottom.push(' ');
                }
                bottom.push(note.length.glyph());
                top.push_str(&note.name.to_string());
                top.push(octave_char(note.pitch));
            }
            [fit(top), fit(bottom)]
        }
        LessonStep::Chord { name, tones } => {
            let tones: Vec<String> = tones.iter().map(ToString::to_string).collect();
            [fit(format!("Chord:{}", name)), fit(tones.join(" "))]
        }
    }
}

/// Two display rows for the summary
pub fn summary_lines(stats: &SessionStats) -> [String; 2] {
    let [ok, percent] = stats.summary_lines();
    [fit(ok), fit(format!("{} any key", percent))]
}

/// Terminal rendering with colored indicators
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self
    }

    fn print_rows(&self, rows: &[String; 2]) {
        let border = format!("+{}+", "-".repeat(LCD_COLUMNS)).dimmed();
        println!("{}", border);
        for row in rows {
            println!("{}{:<width$}{}", "|".dimmed(), row, "|".dimmed(), width = LCD_COLUMNS);
        }
        println!("{}", border);
    }

    /// One-line verdict for a played pitch
    pub fn show_note(&self, pitch: u8, outcome: &NoteOutcome) {
        let name = crate::lesson::pitch_name(pitch);
        match outcome {
            NoteOutcome::Hit { .. } => println!("  {} {}", "✔".green().bold(), name.green()),
            NoteOutcome::Miss => println!("  {} {}", "✘".red().bold(), name.red()),
            NoteOutcome::Ignored => println!("  {} {}", "·".dimmed(), name.dimmed()),
        }
    }
}

impl LessonDisplay for ConsoleDisplay {
    fn show_step(&mut self, snapshot: &SessionSnapshot) {
        let progress: String = snapshot
            .slot_hits
            .iter()
            .map(|hit| if *hit { "●" } else { "○" })
            .collect();
        println!(
            "\n{} {} {}",
            snapshot.title.bold().cyan(),
            format!("step {}/{}", snapshot.step_index + 1, snapshot.step_count).dimmed(),
            progress.yellow()
        );
        self.print_rows(&step_lines(&snapshot.step));
    }

    fn show_summary(&mut self, snapshot: &SessionSnapshot) {
        println!("\n{}", format!("{} complete", snapshot.title).bold().green());
        self.print_rows(&summary_lines(&snapshot.stats));
    }

    fn set_indicator(&mut self, kind: FeedbackKind, lit: bool) {
        debug!("Indicator {:?} {}", kind, if lit { "on" } else { "off" });
    }

    fn show_message(&mut self, lines: [&str; 2]) {
        self.print_rows(&[fit(lines[0].to_string()), fit(lines[1].to_string())]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::{
        Accidental, Chord, Letter, NoteLength, NoteName, SongNote, SongStep,
    };

    #[test]
    fn test_song_step_lines() {
        let step = SongStep::from_array([
            SongNote::new(NoteName::new(Letter::C, Accidental::Sharp), 61, NoteLength::Eighth),
            SongNote::new(NoteName::natural(Letter::E), 64, NoteLength::Half),
        ]);
        let [top, bottom] = step_lines(&LessonStep::from(&step));
        assert_eq!(top, "C#4 E4");
        assert_eq!(bottom, "e   h");
    }

    #[test]
    fn test_chord_step_lines() {
        let chord = Chord::from_array(
            "Gm",
            [
                NoteName::natural(Letter::G),
                NoteName::new(Letter::B, Accidental::Flat),
                NoteName::natural(Letter::D),
            ],
        );
        let [top, bottom] = step_lines(&LessonStep::from(&chord));
        assert_eq!(top, "Chord:Gm");
        assert_eq!(bottom, "G Bb D");
    }

    #[test]
    fn test_summary_lines() {
        let stats = SessionStats {
            correct: 5,
            wrong: 1,
            total_attempts: 6,
        };
        let [top, bottom] = summary_lines(&stats);
        assert_eq!(top, "OK: 5/6");
        assert_eq!(bottom, "P: 83% any key");
    }

    #[test]
    fn test_lines_fit_display_width() {
        let chord = Chord::from_array("A very long chord name", [NoteName::natural(Letter::A)]);
        let [top, _] = step_lines(&LessonStep::from(&chord));
        assert_eq!(top.chars().count(), LCD_COLUMNS);
    }

    #[derive(Default)]
    struct Recorder {
        steps: usize,
        summaries: usize,
        messages: usize,
    }

    impl LessonDisplay for Recorder {
        fn show_step(&mut self, _snapshot: &SessionSnapshot) {
            self.steps += 1;
        }
        fn show_summary(&mut self, _snapshot: &SessionSnapshot) {
            self.summaries += 1;
        }
        fn set_indicator(&mut self, _kind: FeedbackKind, _lit: bool) {}
        fn show_message(&mut self, _lines: [&str; 2]) {
            self.messages += 1;
        }
    }

    #[test]
    fn test_refresh_picks_view() {
        let mut recorder = Recorder::default();
        let mut engine = LessonEngine::default();
        refresh(&mut recorder, &engine);
        assert_eq!(recorder.messages, 1);

        let song = crate::lesson::Song::from_pitches("s", &[&[60]]).unwrap();
        engine.start_song(&song, 0).unwrap();
        refresh(&mut recorder, &engine);
        assert_eq!(recorder.steps, 1);

        engine.handle_note(60, 0);
        refresh(&mut recorder, &engine);
        assert_eq!(recorder.summaries, 1);
    }
}
