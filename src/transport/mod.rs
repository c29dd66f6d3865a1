//! Inbound USB-MIDI transport
//!
//! [`MidiTransport`] owns the bulk IN endpoint of one keyboard. Every tick it
//! polls the pending receive request; completed transfers are split into
//! 4-byte event packets and pushed into an [`EventRing`]. The host pipe sits
//! behind the [`InPipe`] trait so the state machine runs the same against a
//! real port ([`midir_pipe::MidirPipe`]) or a scripted one
//! ([`loopback::LoopbackPipe`]).

pub mod endpoint;
pub mod loopback;
pub mod midir_pipe;
pub mod ring_buffer;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::midi::{UsbMidiPacket, PACKET_SIZE};
pub use endpoint::{EndpointDescriptor, InterfaceDescriptor, MidiEndpoints};
pub use ring_buffer::EventRing;

/// Ring capacity in packets: 64 bytes of 4-byte records, one full-speed
/// bulk packet
pub const EVENT_RING_CAPACITY: usize = 16;

/// Ring type used between the transport and the lesson loop
pub type PacketRing = EventRing<UsbMidiPacket, EVENT_RING_CAPACITY>;

/// Status of the outstanding receive request as seen by the host pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrbStatus {
    /// No request outstanding
    Idle,
    /// Request submitted, not completed yet
    Busy,
    /// Request completed with `len` bytes available from [`InPipe::received`]
    Done(usize),
    /// Endpoint halted; needs a clear-feature before the next request
    Stall,
    /// Unrecoverable failure (device gone)
    Error,
}

/// Host side of one IN pipe
pub trait InPipe {
    /// Queue a receive of at most `max_len` bytes on `endpoint`
    fn submit_receive(&mut self, endpoint: u8, max_len: usize);

    /// Non-blocking status of the last submitted request
    fn poll_urb(&mut self) -> UrbStatus;

    /// Bytes of the last completed request
    fn received(&self) -> &[u8];

    /// Issue CLEAR_FEATURE(ENDPOINT_HALT) on `endpoint`
    fn clear_stall(&mut self, endpoint: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Idle,
    Transferring,
    Error,
}

/// Result of one [`MidiTransport::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A new receive request was submitted from Idle
    Submitted,
    /// The outstanding request has not completed
    Pending,
    /// A transfer completed; `records` packets enqueued, `dropped` rejected
    /// by a full ring. The receive was resubmitted.
    Received { records: usize, dropped: usize },
    /// A transfer longer than the endpoint's max packet size was discarded
    /// and the receive resubmitted
    Oversize { len: usize },
    /// A stall was cleared and the receive resubmitted
    StallCleared,
    /// The transfer failed; the transport is now in Error
    Failed,
    /// The transport is in Error and submits nothing
    Halted,
}

/// Cumulative transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransportStats {
    pub transfers: u64,
    pub records_enqueued: u64,
    pub records_dropped: u64,
    pub partial_bytes: u64,
    pub oversize_transfers: u64,
    pub stalls_cleared: u64,
    pub errors: u64,
    pub reinitializations: u64,
}

/// Polling receive state machine for one MIDI IN endpoint
pub struct MidiTransport<P: InPipe> {
    pipe: P,
    endpoint: EndpointDescriptor,
    state: TransportState,
    stats: TransportStats,
}

impl<P: InPipe> MidiTransport<P> {
    pub fn new(pipe: P, endpoint: EndpointDescriptor) -> Self {
        Self {
            pipe,
            endpoint,
            state: TransportState::Idle,
            stats: TransportStats::default(),
        }
    }

    /// Advance the state machine by one tick.
    ///
    /// Completed data is pushed into `ring` before this returns, so a caller
    /// that drains the ring afterwards sees every packet of this tick.
    pub fn poll<const N: usize>(&mut self, ring: &mut EventRing<UsbMidiPacket, N>) -> PollOutcome {
        match self.state {
            TransportState::Error => PollOutcome::Halted,
            TransportState::Idle => {
                self.submit();
                self.state = TransportState::Transferring;
                trace!("Receive submitted on 0x{:02X}", self.endpoint.address);
                PollOutcome::Submitted
            }
            TransportState::Transferring => match self.pipe.poll_urb() {
                UrbStatus::Idle | UrbStatus::Busy => PollOutcome::Pending,
                UrbStatus::Done(len) => {
                    let outcome = self.complete(len, ring);
                    self.submit();
                    outcome
                }
                UrbStatus::Stall => {
                    debug!(
                        "Endpoint 0x{:02X} stalled, clearing and retrying",
                        self.endpoint.address
                    );
                    self.pipe.clear_stall(self.endpoint.address);
                    self.stats.stalls_cleared += 1;
                    self.submit();
                    PollOutcome::StallCleared
                }
                UrbStatus::Error => {
                    warn!(
                        "⚠️ Transfer error on endpoint 0x{:02X}, transport halted",
                        self.endpoint.address
                    );
                    self.stats.errors += 1;
                    self.state = TransportState::Error;
                    PollOutcome::Failed
                }
            },
        }
    }

    fn submit(&mut self) {
        self.pipe
            .submit_receive(self.endpoint.address, usize::from(self.endpoint.max_packet_size));
    }

    fn complete<const N: usize>(
        &mut self,
        len: usize,
        ring: &mut EventRing<UsbMidiPacket, N>,
    ) -> PollOutcome {
        self.stats.transfers += 1;

        if len > usize::from(self.endpoint.max_packet_size) {
            warn!(
                "Ignoring {} byte transfer (max packet {})",
                len, self.endpoint.max_packet_size
            );
            self.stats.oversize_transfers += 1;
            return PollOutcome::Oversize { len };
        }

        let data = self.pipe.received();
        let data = &data[..len.min(data.len())];
        let chunks = data.chunks_exact(PACKET_SIZE);
        let partial = chunks.remainder().len();

        let mut records = 0;
        let mut dropped = 0;
        for chunk in chunks {
            let Some(packet) = UsbMidiPacket::from_slice(chunk) else {
                continue;
            };
            if ring.push(packet) {
                records += 1;
            } else {
                dropped += 1;
            }
        }

        if partial > 0 {
            debug!("Discarding {} trailing bytes of partial packet", partial);
        }
        if dropped > 0 {
            warn!("Event ring full, dropped {} packet(s)", dropped);
        }
        trace!("Transfer of {} bytes: {} packet(s) enqueued", len, records);

        self.stats.partial_bytes += partial as u64;
        self.stats.records_enqueued += records as u64;
        self.stats.records_dropped += dropped as u64;

        PollOutcome::Received { records, dropped }
    }

    /// Force the Error state, as on device removal
    pub fn disconnect(&mut self) {
        if self.state != TransportState::Error {
            debug!("Transport disconnected");
        }
        self.state = TransportState::Error;
    }

    /// Return to Idle with a freshly discovered endpoint
    pub fn reinitialize(&mut self, endpoint: EndpointDescriptor) {
        debug!(
            "Transport reinitialized on endpoint 0x{:02X}",
            endpoint.address
        );
        self.endpoint = endpoint;
        self.state = TransportState::Idle;
        self.stats.reinitializations += 1;
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    pub fn pipe(&self) -> &P {
        &self.pipe
    }

    pub fn pipe_mut(&mut self) -> &mut P {
        &mut self.pipe
    }
}
