//! Host MIDI input port as a bulk IN pipe
//!
//! midir delivers whole MIDI messages on its own callback thread. The
//! callback packetizes them into USB-MIDI event packets and appends the bytes
//! to a shared inbox; [`InPipe::poll_urb`] hands the inbox out in transfers of
//! at most one max packet, the way a keyboard's bulk endpoint would.

use std::collections::VecDeque;
use std::sync::Arc;

use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::endpoint::{
    EndpointDescriptor, InterfaceDescriptor, AUDIO_CLASS, MIDI_STREAMING_SUBCLASS,
};
use super::{InPipe, UrbStatus};
use crate::error::TransportError;
use crate::midi::{format_hex, packetize, PACKET_SIZE};

/// Bytes buffered between the callback and the poller before new input is
/// dropped
const INBOX_LIMIT: usize = 4096;

/// Endpoint address presented for the host port
const HOST_IN_ENDPOINT: u8 = 0x81;

pub struct MidirPipe {
    client_name: String,
    /// Case-insensitive substring; `None` takes the first port
    port_pattern: Option<String>,
    port_name: Option<String>,
    connection: Option<MidiInputConnection<()>>,
    inbox: Arc<Mutex<VecDeque<u8>>>,
    /// Max length of the outstanding request, if any
    pending: Option<usize>,
    received: Vec<u8>,
}

impl MidirPipe {
    pub fn new(client_name: impl Into<String>, port_pattern: Option<String>) -> Self {
        Self {
            client_name: client_name.into(),
            port_pattern,
            port_name: None,
            connection: None,
            inbox: Arc::new(Mutex::new(VecDeque::with_capacity(INBOX_LIMIT))),
            pending: None,
            received: Vec::new(),
        }
    }

    /// List available MIDI input ports
    pub fn list_input_ports(client_name: &str) -> Result<Vec<String>, TransportError> {
        let midi_in = MidiInput::new(&format!("{}-Scanner", client_name))
            .map_err(|e| TransportError::Backend(e.to_string()))?;

        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    /// Find an input port by case-insensitive substring match
    fn find_port(midi_in: &MidiInput, pattern: Option<&str>) -> Option<(MidiInputPort, String)> {
        let pattern = pattern.map(str::to_lowercase);
        midi_in.ports().into_iter().find_map(|port| {
            let name = midi_in.port_name(&port).ok()?;
            let matches = pattern
                .as_deref()
                .map_or(true, |p| name.to_lowercase().contains(p));
            if matches {
                debug!("Found port '{}' matching {:?}", name, pattern);
                Some((port, name))
            } else {
                None
            }
        })
    }

    /// Open the matching input port
    pub fn connect(&mut self) -> Result<(), TransportError> {
        self.disconnect();

        let midi_in = MidiInput::new(&format!("{}-Input", self.client_name))
            .map_err(|e| TransportError::Backend(e.to_string()))?;

        if midi_in.port_count() == 0 {
            return Err(TransportError::NoPorts);
        }

        let (port, name) = Self::find_port(&midi_in, self.port_pattern.as_deref()).ok_or_else(
            || TransportError::PortNotFound(self.port_pattern.clone().unwrap_or_default()),
        )?;

        info!("🎹 Connecting to input port: {}", name);

        let inbox = Arc::clone(&self.inbox);
        let connection = midi_in
            .connect(
                &port,
                &self.client_name,
                move |_timestamp, data, _| {
                    let packets = packetize(0, data);
                    if packets.is_empty() {
                        debug!("Unframed MIDI data ignored: {}", format_hex(data));
                        return;
                    }

                    let mut inbox = inbox.lock();
                    if inbox.len() + packets.len() * PACKET_SIZE > INBOX_LIMIT {
                        warn!("MIDI inbox full, dropping {}", format_hex(data));
                        return;
                    }
                    for packet in packets {
                        inbox.extend(packet.bytes());
                    }
                },
                (),
            )
            .map_err(|e| TransportError::Backend(e.to_string()))?;

        self.connection = Some(connection);
        self.port_name = Some(name);
        Ok(())
    }

    /// Close the port and discard anything not yet delivered
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!(
                "MIDI input port closed: {}",
                self.port_name.as_deref().unwrap_or("?")
            );
        }
        self.inbox.lock().clear();
        self.pending = None;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Whether the connected port is still listed by the backend
    pub fn is_port_present(&self) -> bool {
        let Some(name) = self.port_name.as_deref() else {
            return false;
        };
        match Self::list_input_ports(&self.client_name) {
            Ok(ports) => ports.iter().any(|p| p == name),
            Err(e) => {
                warn!("Port check failed: {}", e);
                false
            }
        }
    }

    /// Whether a port matching the pattern can currently be opened
    pub fn is_port_available(&self) -> bool {
        MidiInput::new(&format!("{}-Scanner", self.client_name))
            .map(|midi_in| Self::find_port(&midi_in, self.port_pattern.as_deref()).is_some())
            .unwrap_or(false)
    }

    /// Descriptors presented for the host port: one MIDI Streaming interface
    /// with a full-speed bulk IN endpoint
    pub fn interfaces(&self) -> Vec<InterfaceDescriptor> {
        vec![InterfaceDescriptor {
            number: 1,
            class: AUDIO_CLASS,
            subclass: MIDI_STREAMING_SUBCLASS,
            endpoints: vec![EndpointDescriptor::bulk_in(HOST_IN_ENDPOINT)],
        }]
    }
}

impl InPipe for MidirPipe {
    fn submit_receive(&mut self, _endpoint: u8, max_len: usize) {
        self.pending = Some(max_len);
    }

    fn poll_urb(&mut self) -> UrbStatus {
        if self.connection.is_none() {
            return UrbStatus::Error;
        }
        let Some(max_len) = self.pending else {
            return UrbStatus::Idle;
        };

        let mut inbox = self.inbox.lock();
        if inbox.is_empty() {
            return UrbStatus::Busy;
        }

        let take = (max_len - max_len % PACKET_SIZE).min(inbox.len());
        self.received.clear();
        self.received.extend(inbox.drain(..take));
        self.pending = None;
        trace!("Host transfer of {} bytes", take);
        UrbStatus::Done(take)
    }

    fn received(&self) -> &[u8] {
        &self.received
    }

    fn clear_stall(&mut self, endpoint: u8) {
        trace!("Clear halt on 0x{:02X} (no-op for host ports)", endpoint);
    }
}

impl Drop for MidirPipe {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::endpoint;

    fn pipe_with_inbox(bytes: &[u8]) -> MidirPipe {
        let pipe = MidirPipe::new("KeyGuide-Test", None);
        pipe.inbox.lock().extend(bytes.iter().copied());
        pipe
    }

    #[test]
    fn test_interfaces_discoverable() {
        let pipe = MidirPipe::new("KeyGuide-Test", None);
        let endpoints = endpoint::discover(&pipe.interfaces()).unwrap();
        assert_eq!(endpoints.input.address, HOST_IN_ENDPOINT);
        assert_eq!(endpoints.input.max_packet_size, 64);
    }

    #[test]
    fn test_disconnected_pipe_reports_error() {
        let mut pipe = pipe_with_inbox(&[0x09, 0x90, 60, 100]);
        pipe.submit_receive(HOST_IN_ENDPOINT, 64);
        assert_eq!(pipe.poll_urb(), UrbStatus::Error);
    }

    #[test]
    fn test_port_listing_does_not_panic() {
        // Backends without MIDI support (CI containers) report an error
        let _ = MidirPipe::list_input_ports("KeyGuide-Test");
    }
}
