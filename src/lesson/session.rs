//! Lesson session engine
//!
//! A session walks through an ordered list of steps. Each step requires up to
//! three notes ("slots"); a played pitch fills the first unfilled slot that
//! accepts it. When every slot is filled the session moves to the next step,
//! or to the summary after the last one. The engine also owns the feedback
//! indicators so every outcome arms the right one.

use serde::Serialize;
use tracing::{debug, info};

use super::feedback::{FeedbackKind, FeedbackTimer};
use super::stats::SessionStats;
use super::step::{ChordPack, LessonStep, SlotTarget, Song, MAX_SLOTS};
use crate::error::LessonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonMode {
    /// Exact pitches
    Song,
    /// Pitch classes, any octave
    Chord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Running,
    Summary,
}

/// Logical control inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    /// OK: count the missing notes of the step as played and move on
    Skip,
    /// Go back one step; leaves the lesson at the first step
    Previous,
    /// Restart from the first step; leaves the lesson when already there
    Reset,
}

/// What happened to the current step after an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Step still has unfilled slots
    Stayed,
    /// Moved to the step at this index
    NextStep(usize),
    /// Last step completed; summary is showing
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOutcome {
    /// No running session, or the summary is showing
    Ignored,
    Hit { slot: usize, advance: Advance },
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonOutcome {
    /// No session
    Ignored,
    /// Skip applied
    Advanced(Advance),
    /// Previous / Reset moved to this step
    Moved(usize),
    /// Session ended without summary, or left from the summary
    Ended,
}

/// State of one lesson from start to exit
#[derive(Debug, Clone)]
pub struct LessonSession {
    mode: LessonMode,
    title: String,
    steps: Vec<LessonStep>,
    current: usize,
    slot_hit: [bool; MAX_SLOTS],
    state: SessionState,
    stats: SessionStats,
    started_at: u64,
}

impl LessonSession {
    fn new(
        mode: LessonMode,
        title: String,
        steps: Vec<LessonStep>,
        started_at: u64,
    ) -> Result<Self, LessonError> {
        if steps.is_empty() {
            return Err(LessonError::EmptySequence(title));
        }
        if let Some((index, step)) = steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.slot_count() == 0 || s.slot_count() > MAX_SLOTS)
        {
            return Err(LessonError::InvalidSlotCount {
                index,
                count: step.slot_count(),
            });
        }

        Ok(Self {
            mode,
            title,
            steps,
            current: 0,
            slot_hit: [false; MAX_SLOTS],
            state: SessionState::Running,
            stats: SessionStats::default(),
            started_at,
        })
    }

    pub fn mode(&self) -> LessonMode {
        self.mode
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn current_step(&self) -> &LessonStep {
        &self.steps[self.current]
    }

    /// Hit flags of the current step's slots
    pub fn slot_hits(&self) -> &[bool] {
        &self.slot_hit[..self.current_step().slot_count()]
    }

    /// Mark the first unfilled slot accepting `pitch`
    fn match_slot(&mut self, pitch: u8) -> Option<usize> {
        let targets = self.current_step().targets();
        let slot = first_open_slot(&targets, &self.slot_hit, pitch)?;
        self.slot_hit[slot] = true;
        Some(slot)
    }

    fn missing_slots(&self) -> usize {
        self.slot_hits().iter().filter(|hit| !**hit).count()
    }

    fn is_step_complete(&self) -> bool {
        self.slot_hits().iter().all(|hit| *hit)
    }

    fn go_to(&mut self, index: usize) {
        self.current = index;
        self.slot_hit = [false; MAX_SLOTS];
    }

    fn advance_or_summary(&mut self, now: u64) -> Advance {
        if self.current + 1 < self.steps.len() {
            self.go_to(self.current + 1);
            info!("➡️ Step {}/{}", self.current + 1, self.steps.len());
            Advance::NextStep(self.current)
        } else {
            self.state = SessionState::Summary;
            info!(
                "🏁 '{}' finished: {}/{} correct ({}%) in {:.1}s",
                self.title,
                self.stats.correct,
                self.stats.total_attempts,
                self.stats.accuracy_percent(),
                now.saturating_sub(self.started_at) as f64 / 1000.0
            );
            Advance::Summary
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            title: self.title.clone(),
            state: self.state,
            step_index: self.current,
            step_count: self.steps.len(),
            step: self.current_step().clone(),
            targets: self.current_step().targets(),
            slot_hits: self.slot_hits().to_vec(),
            stats: self.stats,
            accuracy_percent: self.stats.accuracy_percent(),
        }
    }
}

/// The single matching rule for both modes
fn first_open_slot(targets: &[SlotTarget], hits: &[bool], pitch: u8) -> Option<usize> {
    targets
        .iter()
        .zip(hits)
        .position(|(target, hit)| !*hit && target.accepts(pitch))
}

/// Read-only view for display and `--json` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub mode: LessonMode,
    pub title: String,
    pub state: SessionState,
    pub step_index: usize,
    pub step_count: usize,
    pub step: LessonStep,
    pub targets: Vec<SlotTarget>,
    pub slot_hits: Vec<bool>,
    pub stats: SessionStats,
    pub accuracy_percent: u32,
}

/// Owns the active session, if any, and the feedback indicators
#[derive(Debug, Clone, Default)]
pub struct LessonEngine {
    session: Option<LessonSession>,
    feedback: FeedbackTimer,
}

impl LessonEngine {
    pub fn new(feedback_ms: u64) -> Self {
        Self {
            session: None,
            feedback: FeedbackTimer::new(feedback_ms),
        }
    }

    pub fn start_song(&mut self, song: &Song, now: u64) -> Result<(), LessonError> {
        let steps = song.steps.iter().map(LessonStep::from).collect();
        self.start(LessonMode::Song, song.title.clone(), steps, now)
    }

    pub fn start_chord_exercise(&mut self, pack: &ChordPack, now: u64) -> Result<(), LessonError> {
        let steps = pack.chords.iter().map(LessonStep::from).collect();
        self.start(LessonMode::Chord, pack.name.clone(), steps, now)
    }

    fn start(
        &mut self,
        mode: LessonMode,
        title: String,
        steps: Vec<LessonStep>,
        now: u64,
    ) -> Result<(), LessonError> {
        self.feedback.clear();
        self.session = None;

        let session = LessonSession::new(mode, title, steps, now)?;
        info!(
            "🎼 Lesson '{}' started ({:?}, {} steps)",
            session.title,
            session.mode,
            session.steps.len()
        );
        self.session = Some(session);
        Ok(())
    }

    /// Feed one played pitch into the running session
    pub fn handle_note(&mut self, pitch: u8, now: u64) -> NoteOutcome {
        let Some(session) = self.session.as_mut() else {
            return NoteOutcome::Ignored;
        };
        if session.state == SessionState::Summary {
            return NoteOutcome::Ignored;
        }

        match session.match_slot(pitch) {
            Some(slot) => {
                session.stats.record_hit();
                self.feedback.arm(FeedbackKind::Correct, now);
                debug!("✅ Pitch {} filled slot {}", pitch, slot);

                let advance = if session.is_step_complete() {
                    session.advance_or_summary(now)
                } else {
                    Advance::Stayed
                };
                NoteOutcome::Hit { slot, advance }
            }
            None => {
                session.stats.record_miss();
                self.feedback.arm(FeedbackKind::Incorrect, now);
                debug!("❌ Pitch {} matches no open slot", pitch);
                NoteOutcome::Miss
            }
        }
    }

    /// Route a button press. In the summary, any button ends the session.
    pub fn handle_button(&mut self, button: Button, now: u64) -> ButtonOutcome {
        let Some(session) = self.session.as_ref() else {
            return ButtonOutcome::Ignored;
        };
        if session.state == SessionState::Summary {
            self.end();
            return ButtonOutcome::Ended;
        }

        match button {
            Button::Skip => self.handle_skip(now),
            Button::Previous => self.handle_previous(),
            Button::Reset => self.handle_reset(),
        }
    }

    /// Count the current step's unfilled slots as correct, then advance
    pub fn handle_skip(&mut self, now: u64) -> ButtonOutcome {
        let Some(session) = self.session.as_mut() else {
            return ButtonOutcome::Ignored;
        };
        if session.state == SessionState::Summary {
            self.end();
            return ButtonOutcome::Ended;
        }

        let missing = session.missing_slots();
        session.stats.record_skipped(missing as u32);
        let slots = session.current_step().slot_count();
        session.slot_hit[..slots].fill(true);
        debug!("⏭️ Step {} skipped ({} missing)", session.current + 1, missing);

        ButtonOutcome::Advanced(session.advance_or_summary(now))
    }

    /// Back one step; ends the session at the first step
    pub fn handle_previous(&mut self) -> ButtonOutcome {
        let Some(session) = self.session.as_mut() else {
            return ButtonOutcome::Ignored;
        };
        if session.state == SessionState::Summary || session.current == 0 {
            self.end();
            return ButtonOutcome::Ended;
        }

        session.go_to(session.current - 1);
        debug!("⬅️ Back to step {}", session.current + 1);
        ButtonOutcome::Moved(session.current)
    }

    /// Restart from the first step; ends the session when already there
    pub fn handle_reset(&mut self) -> ButtonOutcome {
        let Some(session) = self.session.as_mut() else {
            return ButtonOutcome::Ignored;
        };
        if session.state == SessionState::Summary || session.current == 0 {
            self.end();
            return ButtonOutcome::Ended;
        }

        session.go_to(0);
        debug!("🔄 Lesson restarted from step 1");
        ButtonOutcome::Moved(0)
    }

    fn end(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Lesson '{}' ended", session.title);
        }
        self.feedback.clear();
    }

    /// Expire feedback indicators; returns the kinds that went off
    pub fn update(&mut self, now: u64) -> Vec<FeedbackKind> {
        self.feedback.tick(now)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&LessonSession> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(LessonSession::snapshot)
    }

    pub fn feedback(&self) -> &FeedbackTimer {
        &self.feedback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::pitch::{Letter, NoteName};
    use crate::lesson::step::Chord;

    fn song(steps: &[&[u8]]) -> Song {
        Song::from_pitches("test", steps).unwrap()
    }

    fn c_major_pack() -> ChordPack {
        let tones = [Letter::C, Letter::E, Letter::G].map(NoteName::natural).to_vec();
        ChordPack::new("pack", vec![Chord::new("C", tones).unwrap()])
    }

    fn engine_with(steps: &[&[u8]]) -> LessonEngine {
        let mut engine = LessonEngine::default();
        engine.start_song(&song(steps), 0).unwrap();
        engine
    }

    fn stats(engine: &LessonEngine) -> SessionStats {
        *engine.session().unwrap().stats()
    }

    #[test]
    fn test_song_exact_match_completes() {
        let mut engine = engine_with(&[&[60]]);

        assert_eq!(
            engine.handle_note(60, 10),
            NoteOutcome::Hit {
                slot: 0,
                advance: Advance::Summary
            }
        );
        let session = engine.session().unwrap();
        assert_eq!(session.state(), SessionState::Summary);
        assert_eq!(session.stats().correct, 1);
        assert_eq!(session.stats().total_attempts, 1);
        assert_eq!(session.stats().accuracy_percent(), 100);
    }

    #[test]
    fn test_song_mismatch_then_correct() {
        let mut engine = engine_with(&[&[60], &[62]]);

        assert_eq!(engine.handle_note(61, 0), NoteOutcome::Miss);
        let s = stats(&engine);
        assert_eq!((s.correct, s.wrong, s.total_attempts), (0, 1, 1));
        assert_eq!(engine.session().unwrap().current_index(), 0);
        assert!(engine.feedback().is_lit(FeedbackKind::Incorrect));

        assert_eq!(
            engine.handle_note(60, 1),
            NoteOutcome::Hit {
                slot: 0,
                advance: Advance::NextStep(1)
            }
        );
        assert_eq!(stats(&engine).correct, 1);
        assert!(engine.feedback().is_lit(FeedbackKind::Correct));
    }

    #[test]
    fn test_song_octave_is_a_miss() {
        let mut engine = engine_with(&[&[60]]);
        assert_eq!(engine.handle_note(72, 0), NoteOutcome::Miss);
    }

    #[test]
    fn test_repeated_pitch_fills_slots_in_order() {
        let mut engine = engine_with(&[&[60, 60], &[67]]);

        assert_eq!(
            engine.handle_note(60, 0),
            NoteOutcome::Hit {
                slot: 0,
                advance: Advance::Stayed
            }
        );
        assert_eq!(engine.session().unwrap().slot_hits(), &[true, false]);
        assert_eq!(
            engine.handle_note(60, 1),
            NoteOutcome::Hit {
                slot: 1,
                advance: Advance::NextStep(1)
            }
        );
    }

    #[test]
    fn test_filled_slot_does_not_match_again() {
        let mut engine = engine_with(&[&[60, 64]]);
        engine.handle_note(60, 0);
        assert_eq!(engine.handle_note(60, 1), NoteOutcome::Miss);
        assert_eq!(stats(&engine).wrong, 1);
    }

    #[test]
    fn test_chord_matches_pitch_class_any_octave() {
        let mut engine = LessonEngine::default();
        engine.start_chord_exercise(&c_major_pack(), 0).unwrap();

        assert!(matches!(
            engine.handle_note(72, 0),
            NoteOutcome::Hit {
                slot: 0,
                advance: Advance::Stayed
            }
        ));
        assert!(matches!(
            engine.handle_note(64, 1),
            NoteOutcome::Hit {
                slot: 1,
                advance: Advance::Stayed
            }
        ));
        assert_eq!(
            engine.handle_note(79, 2),
            NoteOutcome::Hit {
                slot: 2,
                advance: Advance::Summary
            }
        );
        assert_eq!(stats(&engine).correct, 3);
        assert_eq!(stats(&engine).total_attempts, 3);
    }

    #[test]
    fn test_chord_wrong_class_is_miss() {
        let mut engine = LessonEngine::default();
        engine.start_chord_exercise(&c_major_pack(), 0).unwrap();
        assert_eq!(engine.handle_note(61, 0), NoteOutcome::Miss);
    }

    #[test]
    fn test_skip_counts_missing_slots() {
        let mut engine = engine_with(&[&[60, 64], &[67]]);

        assert_eq!(
            engine.handle_button(Button::Skip, 0),
            ButtonOutcome::Advanced(Advance::NextStep(1))
        );
        let s = stats(&engine);
        assert_eq!((s.correct, s.total_attempts), (2, 2));

        engine.handle_note(50, 1);
        assert_eq!(
            engine.handle_button(Button::Skip, 2),
            ButtonOutcome::Advanced(Advance::Summary)
        );
        let s = stats(&engine);
        assert_eq!((s.correct, s.wrong, s.total_attempts), (3, 1, 4));
    }

    #[test]
    fn test_skip_after_partial_hit() {
        let mut engine = engine_with(&[&[60, 62, 64]]);
        engine.handle_note(62, 0);
        engine.handle_skip(1);
        let s = stats(&engine);
        assert_eq!((s.correct, s.total_attempts), (3, 3));
    }

    #[test]
    fn test_previous_and_reset_at_first_step_end_session() {
        let mut engine = engine_with(&[&[60], &[62]]);
        assert_eq!(engine.handle_button(Button::Previous, 0), ButtonOutcome::Ended);
        assert!(!engine.is_active());

        let mut engine = engine_with(&[&[60], &[62]]);
        assert_eq!(engine.handle_button(Button::Reset, 0), ButtonOutcome::Ended);
        assert!(!engine.is_active());
        assert!(engine.snapshot().is_none());
    }

    #[test]
    fn test_navigation_clears_slots() {
        let mut engine = engine_with(&[&[60], &[62], &[64, 65]]);
        engine.handle_note(60, 0);
        engine.handle_note(62, 0);
        engine.handle_note(64, 0);
        assert_eq!(engine.session().unwrap().slot_hits(), &[true, false]);

        assert_eq!(engine.handle_previous(), ButtonOutcome::Moved(1));
        assert_eq!(engine.session().unwrap().slot_hits(), &[false]);

        engine.handle_note(62, 0);
        assert_eq!(engine.session().unwrap().slot_hits(), &[false, false]);

        assert_eq!(engine.handle_reset(), ButtonOutcome::Moved(0));
        assert_eq!(engine.session().unwrap().current_index(), 0);
        // Stats survive navigation
        assert_eq!(stats(&engine).correct, 4);
    }

    #[test]
    fn test_summary_gating() {
        let mut engine = engine_with(&[&[60]]);
        engine.handle_note(60, 0);

        assert_eq!(engine.handle_note(60, 1), NoteOutcome::Ignored);
        assert_eq!(engine.handle_note(30, 2), NoteOutcome::Ignored);
        assert_eq!(stats(&engine).total_attempts, 1);

        assert_eq!(engine.handle_button(Button::Skip, 3), ButtonOutcome::Ended);
        assert!(!engine.is_active());
        assert!(!engine.feedback().is_lit(FeedbackKind::Correct));
    }

    #[test]
    fn test_inactive_engine_ignores_input() {
        let mut engine = LessonEngine::default();
        assert_eq!(engine.handle_note(60, 0), NoteOutcome::Ignored);
        assert_eq!(engine.handle_button(Button::Reset, 0), ButtonOutcome::Ignored);
        assert!(!engine.is_active());
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let mut engine = engine_with(&[&[60]]);
        let empty = Song::new("empty", vec![]);
        assert_eq!(
            engine.start_song(&empty, 0),
            Err(LessonError::EmptySequence("empty".to_string()))
        );
        assert!(!engine.is_active());

        let empty_pack = ChordPack::new("none", vec![]);
        assert!(engine.start_chord_exercise(&empty_pack, 0).is_err());
        assert!(!engine.is_active());
    }

    #[test]
    fn test_start_resets_feedback_and_stats() {
        let mut engine = engine_with(&[&[60]]);
        engine.handle_note(61, 0);
        assert!(engine.feedback().is_lit(FeedbackKind::Incorrect));

        engine.start_song(&song(&[&[62]]), 5).unwrap();
        assert!(!engine.feedback().is_lit(FeedbackKind::Incorrect));
        assert_eq!(stats(&engine), SessionStats::default());
    }

    #[test]
    fn test_feedback_expires_through_update() {
        let mut engine = LessonEngine::new(120);
        engine.start_song(&song(&[&[60], &[62]]), 0).unwrap();
        engine.handle_note(60, 1000);
        assert!(engine.update(1100).is_empty());
        assert_eq!(engine.update(1120), vec![FeedbackKind::Correct]);
    }

    #[test]
    fn test_snapshot_reports_current_step() {
        let mut engine = engine_with(&[&[60, 64]]);
        engine.handle_note(64, 0);
        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.mode, LessonMode::Song);
        assert_eq!(snapshot.step_index, 0);
        assert_eq!(snapshot.targets, vec![SlotTarget::Pitch(60), SlotTarget::Pitch(64)]);
        assert_eq!(snapshot.slot_hits, vec![false, true]);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["stats"]["correct"], 1);
    }
}
