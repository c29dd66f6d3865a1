//! One cooperative tick of the tutor
//!
//! Each tick runs to completion in a fixed order: the transport polls its
//! endpoint and enqueues completed packets, the ring is drained through the
//! decoder into the lesson engine, then the feedback indicators expire.
//! Packets therefore reach the engine in the order the transport received
//! them, and everything received in a tick is enqueued before any of it is
//! consumed.

use std::time::Instant;

use tracing::{debug, info, trace};

use crate::error::TransportError;
use crate::lesson::{Button, ButtonOutcome, FeedbackKind, LessonEngine, NoteOutcome};
use crate::midi::decode;
use crate::transport::{
    endpoint, InPipe, InterfaceDescriptor, MidiTransport, PacketRing, PollOutcome,
    TransportState,
};

/// Milliseconds since creation, never going backwards
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything that happened during one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub poll: PollOutcome,
    /// Decoded pitches in arrival order with the engine's verdict
    pub notes: Vec<(u8, NoteOutcome)>,
    /// Packets drained from the ring that were not Note-On
    pub discarded: usize,
    /// Indicators that switched off
    pub expired: Vec<FeedbackKind>,
}

impl TickReport {
    /// Whether the lesson view may have changed
    pub fn changed(&self) -> bool {
        !self.notes.is_empty()
    }
}

/// Transport, event ring and lesson engine wired together
pub struct Tutor<P: InPipe> {
    transport: MidiTransport<P>,
    ring: PacketRing,
    engine: LessonEngine,
}

impl<P: InPipe> Tutor<P> {
    /// Discover the MIDI IN endpoint and build the pipeline
    pub fn new(
        pipe: P,
        interfaces: &[InterfaceDescriptor],
        feedback_ms: u64,
    ) -> Result<Self, TransportError> {
        let endpoints = endpoint::discover(interfaces)?;
        Ok(Self {
            transport: MidiTransport::new(pipe, endpoints.input),
            ring: PacketRing::new(),
            engine: LessonEngine::new(feedback_ms),
        })
    }

    pub fn tick(&mut self, now: u64) -> TickReport {
        let poll = self.transport.poll(&mut self.ring);

        let mut notes = Vec::new();
        let mut discarded = 0;
        while let Some(packet) = self.ring.pop() {
            match decode(&packet) {
                Some(event) => {
                    let outcome = self.engine.handle_note(event.pitch, now);
                    notes.push((event.pitch, outcome));
                }
                None => {
                    trace!("Discarded {}", packet);
                    discarded += 1;
                }
            }
        }

        let expired = self.engine.update(now);

        TickReport {
            poll,
            notes,
            discarded,
            expired,
        }
    }

    pub fn press(&mut self, button: Button, now: u64) -> ButtonOutcome {
        self.engine.handle_button(button, now)
    }

    /// New keyboard attached: rediscover the endpoint and resume polling
    pub fn device_attached(
        &mut self,
        interfaces: &[InterfaceDescriptor],
    ) -> Result<(), TransportError> {
        let endpoints = endpoint::discover(interfaces)?;
        self.ring.clear();
        self.transport.reinitialize(endpoints.input);
        info!("🎹 Keyboard attached");
        Ok(())
    }

    /// Keyboard removed: stop polling until the next attach
    pub fn device_detached(&mut self) {
        if self.transport.state() != TransportState::Error {
            debug!("Keyboard detached");
        }
        self.transport.disconnect();
    }

    pub fn engine(&self) -> &LessonEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut LessonEngine {
        &mut self.engine
    }

    pub fn transport(&self) -> &MidiTransport<P> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut MidiTransport<P> {
        &mut self.transport
    }

    pub fn ring(&self) -> &PacketRing {
        &self.ring
    }
}
