//! USB-MIDI event packets and note decoding
//!
//! A class-compliant keyboard delivers MIDI as 4-byte event packets:
//! `[cable << 4 | CIN, status, data1, data2]`. This module provides the packet
//! type, a packetizer for byte-oriented sources and the Note-On decoder that
//! feeds the lesson engine.

use std::fmt;

/// Size of one USB-MIDI event packet in bytes
pub const PACKET_SIZE: usize = 4;

/// USB-MIDI code index numbers (low nibble of the packet header)
pub mod cin {
    pub const SYSTEM_COMMON_2: u8 = 0x2;
    pub const SYSTEM_COMMON_3: u8 = 0x3;
    pub const SYSEX_START: u8 = 0x4;
    pub const SINGLE_BYTE_END: u8 = 0x5;
    pub const SYSEX_END_2: u8 = 0x6;
    pub const SYSEX_END_3: u8 = 0x7;
    pub const NOTE_OFF: u8 = 0x8;
    pub const NOTE_ON: u8 = 0x9;
    pub const SINGLE_BYTE: u8 = 0xF;
}

/// One raw 4-byte transport record, immutable once captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UsbMidiPacket([u8; PACKET_SIZE]);

impl UsbMidiPacket {
    /// Build a packet from its four wire bytes
    pub const fn from_bytes(bytes: [u8; PACKET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a packet from cable number, code index and MIDI bytes
    pub const fn new(cable: u8, code_index: u8, status: u8, data1: u8, data2: u8) -> Self {
        Self([((cable & 0x0F) << 4) | (code_index & 0x0F), status, data1, data2])
    }

    /// Parse a packet from a slice; `None` unless exactly four bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; PACKET_SIZE] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub const fn bytes(&self) -> [u8; PACKET_SIZE] {
        self.0
    }

    /// Virtual cable number (high nibble of the header)
    pub const fn cable(&self) -> u8 {
        self.0[0] >> 4
    }

    /// Code index number (low nibble of the header)
    pub const fn code_index(&self) -> u8 {
        self.0[0] & 0x0F
    }

    pub const fn status(&self) -> u8 {
        self.0[1]
    }

    pub const fn data1(&self) -> u8 {
        self.0[2]
    }

    pub const fn data2(&self) -> u8 {
        self.0[3]
    }

    /// Number of meaningful MIDI bytes carried, derived from the code index
    pub fn midi_len(&self) -> usize {
        match self.code_index() {
            cin::SINGLE_BYTE_END | cin::SINGLE_BYTE => 1,
            cin::SYSTEM_COMMON_2 | cin::SYSEX_END_2 | 0xC | 0xD => 2,
            cin::SYSTEM_COMMON_3 | cin::SYSEX_START | cin::SYSEX_END_3 => 3,
            0x8..=0xE => 3,
            // 0x0 and 0x1 are reserved / cable events
            _ => 0,
        }
    }

    /// The MIDI bytes carried by this packet
    pub fn midi_bytes(&self) -> &[u8] {
        &self.0[1..1 + self.midi_len()]
    }
}

impl fmt::Display for UsbMidiPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cable:{} cin:{:X} | {}",
            self.cable(),
            self.code_index(),
            format_hex(self.midi_bytes())
        )
    }
}

/// Split one MIDI message into USB-MIDI event packets.
///
/// Running status (a data byte first) and truncated channel messages yield
/// no packets.
pub fn packetize(cable: u8, message: &[u8]) -> Vec<UsbMidiPacket> {
    let Some(&status) = message.first() else {
        return Vec::new();
    };

    if status < 0x80 {
        return Vec::new();
    }

    if status == 0xF0 {
        return packetize_sysex(cable, message);
    }

    if status < 0xF0 {
        let needed = match status & 0xF0 {
            0xC0 | 0xD0 => 2,
            _ => 3,
        };
        if message.len() < needed {
            return Vec::new();
        }
        let data1 = message[1] & 0x7F;
        let data2 = if needed == 3 { message[2] & 0x7F } else { 0 };
        return vec![UsbMidiPacket::new(cable, status >> 4, status, data1, data2)];
    }

    let packet = match status {
        0xF8..=0xFF => UsbMidiPacket::new(cable, cin::SINGLE_BYTE, status, 0, 0),
        0xF1 | 0xF3 => {
            let data1 = message.get(1).copied().unwrap_or(0) & 0x7F;
            UsbMidiPacket::new(cable, cin::SYSTEM_COMMON_2, status, data1, 0)
        }
        0xF2 => {
            let data1 = message.get(1).copied().unwrap_or(0) & 0x7F;
            let data2 = message.get(2).copied().unwrap_or(0) & 0x7F;
            UsbMidiPacket::new(cable, cin::SYSTEM_COMMON_3, status, data1, data2)
        }
        _ => UsbMidiPacket::new(cable, cin::SINGLE_BYTE_END, status, 0, 0),
    };
    vec![packet]
}

fn packetize_sysex(cable: u8, message: &[u8]) -> Vec<UsbMidiPacket> {
    let terminated = message.last() == Some(&0xF7);
    let chunk_count = message.len().div_ceil(3);

    message
        .chunks(3)
        .enumerate()
        .map(|(i, chunk)| {
            let last = i + 1 == chunk_count;
            let code_index = if last && terminated {
                match chunk.len() {
                    1 => cin::SINGLE_BYTE_END,
                    2 => cin::SYSEX_END_2,
                    _ => cin::SYSEX_END_3,
                }
            } else {
                cin::SYSEX_START
            };
            let byte = |n: usize| chunk.get(n).copied().unwrap_or(0);
            UsbMidiPacket::new(cable, code_index, byte(0), byte(1), byte(2))
        })
        .collect()
}

/// Decoded key press: only the pitch survives decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteEvent {
    pub pitch: u8,
}

/// Extract a key press from a transport record.
///
/// Only Note-On with nonzero velocity produces an event. Note-Off,
/// velocity-0 Note-On and every other message are discarded.
pub fn decode(packet: &UsbMidiPacket) -> Option<NoteEvent> {
    if packet.status() & 0xF0 == 0x90 && packet.data2() != 0 {
        Some(NoteEvent {
            pitch: packet.data1() & 0x7F,
        })
    } else {
        None
    }
}

/// MIDI messages as shown by the packet monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Polyphonic Key Pressure
    PolyPressure { channel: u8, note: u8, pressure: u8 },

    /// Control Change
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Program Change
    ProgramChange { channel: u8, program: u8 },

    /// Channel Pressure
    ChannelPressure { channel: u8, pressure: u8 },

    /// Pitch Bend (0-16383)
    PitchBend { channel: u8, value: u16 },

    /// Anything in the system range (SysEx fragments, clock, ...)
    System { status: u8 },
}

impl MidiMessage {
    /// Describe the MIDI content of a packet
    pub fn from_packet(packet: &UsbMidiPacket) -> Option<Self> {
        let status = packet.status();
        if status < 0x80 {
            return None;
        }

        let channel = status & 0x0F;
        let data1 = packet.data1() & 0x7F;
        let data2 = packet.data2() & 0x7F;

        let message = match status & 0xF0 {
            0x80 => MidiMessage::NoteOff {
                channel,
                note: data1,
                velocity: data2,
            },
            0x90 => MidiMessage::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            },
            0xA0 => MidiMessage::PolyPressure {
                channel,
                note: data1,
                pressure: data2,
            },
            0xB0 => MidiMessage::ControlChange {
                channel,
                cc: data1,
                value: data2,
            },
            0xC0 => MidiMessage::ProgramChange {
                channel,
                program: data1,
            },
            0xD0 => MidiMessage::ChannelPressure {
                channel,
                pressure: data1,
            },
            0xE0 => MidiMessage::PitchBend {
                channel,
                value: ((data2 as u16) << 7) | data1 as u16,
            },
            _ => MidiMessage::System { status },
        };
        Some(message)
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                write!(f, "PolyPressure ch:{} n:{} p:{}", channel + 1, note, pressure)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                write!(f, "ChannelPressure ch:{} p:{}", channel + 1, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, value)
            }
            MidiMessage::System { status } => write!(f, "System {:02X}", status),
        }
    }
}

/// Format bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
