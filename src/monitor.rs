//! Raw packet monitor for debugging keyboards
//!
//! Runs the real transport against a host port and prints every 4-byte
//! record that reaches the event ring, without a lesson attached.

use anyhow::{Context, Result};
use colored::*;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::midi::{decode, format_hex, MidiMessage, UsbMidiPacket};
use crate::transport::midir_pipe::MidirPipe;
use crate::transport::{endpoint, InPipe, MidiTransport, PacketRing, PollOutcome};
use crate::tutor::MonotonicClock;

/// Print the available MIDI input ports
pub fn list_ports_formatted(client_name: &str) {
    println!("\n{}", "=== Available MIDI Input Ports ===".bold().cyan());

    match MidirPipe::list_input_ports(client_name) {
        Ok(ports) if ports.is_empty() => println!("  {}", "No input ports found".dimmed()),
        Ok(ports) => {
            for (index, name) in ports.iter().enumerate() {
                println!("  {} {}", format!("[{}]", index).green(), name);
            }
        }
        Err(e) => println!("  {} {}", "Port scan failed:".red(), e),
    }

    println!();
}

/// One monitor line: `[timestamp] cable/CIN | HEX => PARSED`
pub fn format_packet(timestamp_ms: u64, packet: &UsbMidiPacket) -> String {
    let raw = format_hex(&packet.bytes());
    let message = MidiMessage::from_packet(packet);

    let raw = match message {
        Some(MidiMessage::NoteOn { velocity, .. }) if velocity > 0 => raw.bright_green(),
        Some(MidiMessage::NoteOn { .. }) | Some(MidiMessage::NoteOff { .. }) => raw.bright_red(),
        Some(MidiMessage::ControlChange { .. }) => raw.bright_yellow(),
        Some(MidiMessage::PitchBend { .. }) => raw.bright_cyan(),
        Some(MidiMessage::System { .. }) => raw.bright_magenta(),
        Some(_) => raw.normal(),
        None => raw.bright_black(),
    };

    let parsed = message
        .map(|m| format!(" => {}", m.to_string().bright_blue()))
        .unwrap_or_default();
    let lesson = if decode(packet).is_some() {
        format!(" {}", "[note]".green().bold())
    } else {
        String::new()
    };

    format!(
        "[{}ms] {} {} | {}{}{}",
        format!("{:08}", timestamp_ms).dimmed(),
        "IN ".green(),
        format!("c{} cin:{:X}", packet.cable(), packet.code_index()).white(),
        raw,
        parsed,
        lesson
    )
}

/// Poll once and format every packet that reached the ring.
///
/// Returns `None` once the transport has stopped.
pub fn poll_lines<P: InPipe>(
    transport: &mut MidiTransport<P>,
    ring: &mut PacketRing,
    now_ms: u64,
) -> Option<Vec<String>> {
    match transport.poll(ring) {
        PollOutcome::Failed | PollOutcome::Halted => return None,
        PollOutcome::Received { dropped, .. } if dropped > 0 => {
            warn!("{} packets dropped (ring full)", dropped);
        }
        _ => {}
    }
    let lines = std::iter::from_fn(|| ring.pop())
        .map(|packet| format_packet(now_ms, &packet))
        .collect();
    Some(lines)
}

/// Monitor the configured input port until Ctrl+C or until the port goes away
pub async fn run_monitor(config: &AppConfig) -> Result<()> {
    println!("{}", "=== USB-MIDI Packet Monitor ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let mut pipe = MidirPipe::new(&config.midi.client_name, config.midi.input_port.clone());
    pipe.connect().context("Failed to open MIDI input port")?;
    let port_name = pipe.port_name().unwrap_or("?").to_string();

    let endpoints = endpoint::discover(&pipe.interfaces())?;
    let mut transport = MidiTransport::new(pipe, endpoints.input);
    let mut ring = PacketRing::new();
    let clock = MonotonicClock::new();

    println!("{} {}", "Monitoring".green(), port_name.bright_white());
    println!(
        "{}",
        "Format: [timestamp] DIR CABLE/CIN | HEX => PARSED".dimmed()
    );
    println!("{}\n", "─".repeat(80).dimmed());

    let mut interval = tokio::time::interval(Duration::from_millis(config.timing.tick_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut port_check =
        tokio::time::interval(Duration::from_millis(config.timing.port_check_ms));
    port_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = port_check.tick() => {
                if !transport.pipe().is_port_present() {
                    transport.pipe_mut().disconnect();
                    transport.disconnect();
                }
            }
            _ = interval.tick() => {
                let Some(lines) = poll_lines(&mut transport, &mut ring, clock.now_ms()) else {
                    warn!("⚠️  Port {} lost", port_name);
                    break;
                };
                for line in lines {
                    println!("{}", line);
                }
            }
        }
    }

    let stats = transport.stats();
    info!(
        "Monitor stopped: {} transfers, {} packets, {} dropped",
        stats.transfers, stats.records_enqueued, stats.records_dropped
    );
    println!("\n{}", "Monitor stopped".yellow());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::{Completion, LoopbackPipe};
    use crate::transport::EndpointDescriptor;

    fn transport() -> MidiTransport<LoopbackPipe> {
        MidiTransport::new(LoopbackPipe::new(), EndpointDescriptor::bulk_in(0x01))
    }

    #[test]
    fn test_poll_lines_until_disconnect() {
        colored::control::set_override(false);
        let mut transport = transport();
        let mut ring = PacketRing::new();
        assert_eq!(poll_lines(&mut transport, &mut ring, 0), Some(vec![]));

        transport
            .pipe_mut()
            .send_messages(&[[0x90, 60, 100], [0x80, 60, 0]]);
        let lines = poll_lines(&mut transport, &mut ring, 5).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[note]"));
        assert!(lines[1].contains("NoteOff ch:1 n:60 v:0"));
        assert!(ring.is_empty());

        transport.disconnect();
        assert_eq!(poll_lines(&mut transport, &mut ring, 6), None);
    }

    #[test]
    fn test_poll_lines_stops_on_transfer_error() {
        let mut transport = transport();
        let mut ring = PacketRing::new();
        poll_lines(&mut transport, &mut ring, 0);

        transport.pipe_mut().complete(Completion::Error);
        assert_eq!(poll_lines(&mut transport, &mut ring, 1), None);
        assert_eq!(poll_lines(&mut transport, &mut ring, 2), None);
        assert_eq!(transport.stats().errors, 1);
    }

    #[test]
    fn test_format_marks_lesson_notes() {
        colored::control::set_override(false);
        let note_on = UsbMidiPacket::from_bytes([0x09, 0x90, 60, 100]);
        let line = format_packet(12, &note_on);
        assert!(line.starts_with("[00000012ms]"));
        assert!(line.contains("09 90 3C 64"));
        assert!(line.contains("NoteOn ch:1 n:60 v:100"));
        assert!(line.ends_with("[note]"));

        let released = UsbMidiPacket::from_bytes([0x09, 0x90, 60, 0]);
        assert!(!format_packet(0, &released).contains("[note]"));
    }

    #[test]
    fn test_format_unparsed_record() {
        colored::control::set_override(false);
        let empty = UsbMidiPacket::default();
        let line = format_packet(0, &empty);
        assert!(line.contains("00 00 00 00"));
        assert!(!line.contains("=>"));
    }
}
