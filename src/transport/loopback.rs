//! In-memory pipe with scripted completions
//!
//! Used by the tests and by `--simulate`, where notes typed at the prompt
//! are packetized and delivered as bulk transfers.

use std::collections::VecDeque;

use super::endpoint::{
    EndpointDescriptor, InterfaceDescriptor, AUDIO_CLASS, FULL_SPEED_MAX_PACKET,
    MIDI_STREAMING_SUBCLASS,
};
use super::{InPipe, UrbStatus};
use crate::midi::packetize;

/// Scripted outcome of one receive request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Data(Vec<u8>),
    Stall,
    Error,
}

#[derive(Debug, Default)]
pub struct LoopbackPipe {
    completions: VecDeque<Completion>,
    received: Vec<u8>,
    pending: bool,
    submissions: u64,
    stalls_cleared: u64,
    last_endpoint: Option<u8>,
    last_max_len: usize,
}

impl LoopbackPipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next outstanding request
    pub fn complete(&mut self, completion: Completion) {
        self.completions.push_back(completion);
    }

    /// Packetize MIDI messages on cable 0 and queue them as full-speed bulk
    /// transfers of at most one max packet each
    pub fn send_messages<M: AsRef<[u8]>>(&mut self, messages: &[M]) {
        let bytes: Vec<u8> = messages
            .iter()
            .flat_map(|m| packetize(0, m.as_ref()))
            .flat_map(|p| p.bytes())
            .collect();

        for chunk in bytes.chunks(usize::from(FULL_SPEED_MAX_PACKET)) {
            self.completions.push_back(Completion::Data(chunk.to_vec()));
        }
    }

    /// Queued completions not yet consumed
    pub fn queued(&self) -> usize {
        self.completions.len()
    }

    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    pub fn stalls_cleared(&self) -> u64 {
        self.stalls_cleared
    }

    pub fn last_endpoint(&self) -> Option<u8> {
        self.last_endpoint
    }

    pub fn last_max_len(&self) -> usize {
        self.last_max_len
    }

    /// Descriptors of the simulated keyboard: MIDI Streaming interface 1
    /// with bulk IN endpoint 0x81
    pub fn interfaces(&self) -> Vec<InterfaceDescriptor> {
        vec![InterfaceDescriptor {
            number: 1,
            class: AUDIO_CLASS,
            subclass: MIDI_STREAMING_SUBCLASS,
            endpoints: vec![EndpointDescriptor::bulk_in(0x01)],
        }]
    }
}

impl InPipe for LoopbackPipe {
    fn submit_receive(&mut self, endpoint: u8, max_len: usize) {
        self.pending = true;
        self.submissions += 1;
        self.last_endpoint = Some(endpoint);
        self.last_max_len = max_len;
    }

    fn poll_urb(&mut self) -> UrbStatus {
        if !self.pending {
            return UrbStatus::Idle;
        }

        match self.completions.pop_front() {
            None => UrbStatus::Busy,
            Some(Completion::Data(data)) => {
                self.pending = false;
                let len = data.len();
                self.received = data;
                UrbStatus::Done(len)
            }
            Some(Completion::Stall) => {
                self.pending = false;
                UrbStatus::Stall
            }
            Some(Completion::Error) => {
                self.pending = false;
                UrbStatus::Error
            }
        }
    }

    fn received(&self) -> &[u8] {
        &self.received
    }

    fn clear_stall(&mut self, _endpoint: u8) {
        self.stalls_cleared += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_without_request() {
        let mut pipe = LoopbackPipe::new();
        pipe.complete(Completion::Data(vec![0x09, 0x90, 60, 1]));
        assert_eq!(pipe.poll_urb(), UrbStatus::Idle);

        pipe.submit_receive(0x81, 64);
        assert_eq!(pipe.poll_urb(), UrbStatus::Done(4));
        assert_eq!(pipe.received(), &[0x09, 0x90, 60, 1]);
        assert_eq!(pipe.poll_urb(), UrbStatus::Idle);
    }

    #[test]
    fn test_busy_until_completion_queued() {
        let mut pipe = LoopbackPipe::new();
        pipe.submit_receive(0x81, 64);
        assert_eq!(pipe.poll_urb(), UrbStatus::Busy);
        pipe.complete(Completion::Stall);
        assert_eq!(pipe.poll_urb(), UrbStatus::Stall);
    }

    #[test]
    fn test_send_messages_splits_into_max_packets() {
        let mut pipe = LoopbackPipe::new();
        let messages: Vec<[u8; 3]> = (0..20).map(|i| [0x90, 40 + i, 100]).collect();
        pipe.send_messages(&messages);

        // 20 packets of 4 bytes = 80 bytes = 64 + 16
        assert_eq!(pipe.queued(), 2);

        pipe.submit_receive(0x81, 64);
        assert_eq!(pipe.poll_urb(), UrbStatus::Done(64));
        assert_eq!(&pipe.received()[..4], &[0x09, 0x90, 40, 100]);
        pipe.submit_receive(0x81, 64);
        assert_eq!(pipe.poll_urb(), UrbStatus::Done(16));
    }
}
