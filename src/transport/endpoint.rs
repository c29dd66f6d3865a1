//! Endpoint descriptors and MIDI Streaming endpoint discovery
//!
//! Run once when the device class attaches: find the Audio / MIDI Streaming
//! interface and pick its bulk endpoints.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::TransportError;

/// USB class code for Audio (MIDI falls under Audio)
pub const AUDIO_CLASS: u8 = 0x01;
/// Audio subclass for MIDI Streaming
pub const MIDI_STREAMING_SUBCLASS: u8 = 0x03;
/// Full-speed bulk packet size
pub const FULL_SPEED_MAX_PACKET: u16 = 64;

const DIRECTION_IN_BIT: u8 = 0x80;
const TRANSFER_TYPE_MASK: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

impl TransferType {
    /// Decode the low two bits of `bmAttributes`
    pub fn from_attributes(attributes: u8) -> Self {
        match attributes & TRANSFER_TYPE_MASK {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }
}

/// Endpoint as described by the device; immutable for the life of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    pub address: u8,
    pub direction: Direction,
    pub transfer_type: TransferType,
    pub max_packet_size: u16,
}

impl EndpointDescriptor {
    /// Build from raw `bEndpointAddress`, `bmAttributes` and `wMaxPacketSize`
    pub fn from_raw(address: u8, attributes: u8, max_packet_size: u16) -> Self {
        let direction = if address & DIRECTION_IN_BIT != 0 {
            Direction::In
        } else {
            Direction::Out
        };
        Self {
            address,
            direction,
            transfer_type: TransferType::from_attributes(attributes),
            max_packet_size,
        }
    }

    /// Full-speed bulk IN endpoint at the given address
    pub fn bulk_in(address: u8) -> Self {
        Self::from_raw(address | DIRECTION_IN_BIT, 0x02, FULL_SPEED_MAX_PACKET)
    }

    pub fn is_bulk_in(&self) -> bool {
        self.direction == Direction::In && self.transfer_type == TransferType::Bulk
    }

    pub fn is_bulk_out(&self) -> bool {
        self.direction == Direction::Out && self.transfer_type == TransferType::Bulk
    }
}

/// Interface descriptor with its endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub class: u8,
    pub subclass: u8,
    pub endpoints: Vec<EndpointDescriptor>,
}

impl InterfaceDescriptor {
    pub fn is_midi_streaming(&self) -> bool {
        self.class == AUDIO_CLASS && self.subclass == MIDI_STREAMING_SUBCLASS
    }
}

/// Endpoints of a MIDI Streaming interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEndpoints {
    pub interface: u8,
    /// Bulk IN endpoint (keyboard to host)
    pub input: EndpointDescriptor,
    /// Bulk OUT endpoint, present on most keyboards but unused here
    pub output: Option<EndpointDescriptor>,
}

/// Locate the MIDI Streaming interface and its bulk endpoints.
///
/// The first matching interface wins. Within it, the first bulk IN and the
/// first bulk OUT endpoint are taken.
pub fn discover(interfaces: &[InterfaceDescriptor]) -> Result<MidiEndpoints, TransportError> {
    let interface = interfaces
        .iter()
        .find(|itf| itf.is_midi_streaming())
        .ok_or(TransportError::NoStreamingInterface)?;

    debug!("MIDI Streaming interface found at {}", interface.number);

    let input = interface
        .endpoints
        .iter()
        .find(|ep| ep.is_bulk_in())
        .copied()
        .ok_or(TransportError::NoBulkInEndpoint {
            interface: interface.number,
        })?;

    let output = interface.endpoints.iter().find(|ep| ep.is_bulk_out()).copied();

    info!(
        "MIDI IN endpoint 0x{:02X} (max packet {} bytes){}",
        input.address,
        input.max_packet_size,
        output
            .map(|ep| format!(", OUT endpoint 0x{:02X}", ep.address))
            .unwrap_or_default()
    );

    Ok(MidiEndpoints {
        interface: interface.number,
        input,
        output,
    })
}
