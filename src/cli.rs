//! Console input
//!
//! A rustyline prompt on its own thread stands in for the tutor's buttons
//! (and, in simulate mode, for the keyboard). Parsed commands travel to the
//! tick loop over a crossbeam channel.

use crossbeam::channel::{self, Receiver, Sender};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, warn};

use crate::lesson::{parse_pitch, Button};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Press(Button),
    /// Pitches typed on one line, delivered as one transfer
    Play(Vec<u8>),
    StartSong(String),
    StartChords(String),
    List,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  o, ok, skip        OK button: count missing notes as played, next step
  b, back            back one step (leaves the lesson at step 1)
  r, reset           restart from step 1 (leaves the lesson at step 1)
  song <n|title>     start a song
  chords <n|name>    start a chord pack
  list               show songs and chord packs
  status             show transport statistics
  q, quit            exit
Simulate mode: type notes (C4 E4 G4 or 60 64 67), one line = one transfer";

/// Parse one line; `simulate` enables note entry
pub fn parse_command(line: &str, simulate: bool) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "o" | "ok" | "skip" => ConsoleCommand::Press(Button::Skip),
        "b" | "back" | "prev" => ConsoleCommand::Press(Button::Previous),
        "r" | "reset" => ConsoleCommand::Press(Button::Reset),
        "q" | "quit" | "exit" => ConsoleCommand::Quit,
        "h" | "help" | "?" => ConsoleCommand::Help,
        "list" | "ls" => ConsoleCommand::List,
        "status" => ConsoleCommand::Status,
        "song" if !rest.is_empty() => ConsoleCommand::StartSong(rest.to_string()),
        "chords" if !rest.is_empty() => ConsoleCommand::StartChords(rest.to_string()),
        "song" | "chords" => return Err(format!("Usage: {} <number|name>", word)),
        _ if simulate => return parse_notes(line).map(ConsoleCommand::Play),
        _ => return Err(format!("Unknown command: '{}' (type 'help')", line)),
    };
    Ok(command)
}

/// Note names or MIDI numbers separated by whitespace or commas
fn parse_notes(line: &str) -> Result<Vec<u8>, String> {
    let pitches = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| match token.parse::<u8>() {
            Ok(pitch) if pitch <= 127 => Ok(pitch),
            Ok(pitch) => Err(format!("Note number {} is out of range", pitch)),
            Err(_) => parse_pitch(token).map_err(|e| e.to_string()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if pitches.is_empty() {
        return Err("No notes given".to_string());
    }
    Ok(pitches)
}

/// Run the prompt on a dedicated thread. The channel closes after `Quit`
/// (also sent on Ctrl-D / Ctrl-C at the prompt).
pub fn spawn_input(prompt: &str, simulate: bool) -> anyhow::Result<Receiver<ConsoleCommand>> {
    let (tx, rx) = channel::unbounded();
    let mut editor = DefaultEditor::new()?;
    let prompt = prompt.to_string();

    std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || run_prompt(&mut editor, &prompt, simulate, &tx))?;

    Ok(rx)
}

fn run_prompt(
    editor: &mut DefaultEditor,
    prompt: &str,
    simulate: bool,
    tx: &Sender<ConsoleCommand>,
) {
    loop {
        match editor.readline(prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                match parse_command(&line, simulate) {
                    Ok(command) => {
                        let quit = command == ConsoleCommand::Quit;
                        if tx.send(command).is_err() || quit {
                            break;
                        }
                    }
                    Err(message) => println!("{}", message),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                debug!("Console input closed");
                let _ = tx.send(ConsoleCommand::Quit);
                break;
            }
            Err(e) => {
                warn!("Console input error: {}", e);
                let _ = tx.send(ConsoleCommand::Quit);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_words() {
        assert_eq!(parse_command("o", false), Ok(ConsoleCommand::Press(Button::Skip)));
        assert_eq!(parse_command(" OK ", false), Ok(ConsoleCommand::Press(Button::Skip)));
        assert_eq!(parse_command("b", true), Ok(ConsoleCommand::Press(Button::Previous)));
        assert_eq!(parse_command("reset", false), Ok(ConsoleCommand::Press(Button::Reset)));
        assert_eq!(parse_command("q", false), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_lesson_selection() {
        assert_eq!(
            parse_command("song Twinkle Twinkle", false),
            Ok(ConsoleCommand::StartSong("Twinkle Twinkle".to_string()))
        );
        assert_eq!(
            parse_command("chords 2", false),
            Ok(ConsoleCommand::StartChords("2".to_string()))
        );
        assert!(parse_command("song", false).is_err());
    }

    #[test]
    fn test_notes_only_in_simulate_mode() {
        assert_eq!(
            parse_command("C4 e4, 67", true),
            Ok(ConsoleCommand::Play(vec![60, 64, 67]))
        );
        assert_eq!(parse_command("B4", true), Ok(ConsoleCommand::Play(vec![71])));
        assert!(parse_command("C4", false).is_err());
        assert!(parse_command("C4 X9", true).is_err());
        assert!(parse_command("200", true).is_err());
    }
}
