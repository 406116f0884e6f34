//! Motor command vocabulary and the transport that carries it.
//!
//! The drive firmware accepts newline-terminated three-letter words and
//! keeps executing the last one until told otherwise. There are no
//! acknowledgements on the wire, so `Stop` is the only way to end a
//! motion in progress.

use std::io::Write;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::Result;

/// Commands understood by the drive firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotorCommand {
    /// Drive both wheels forward
    Forward,
    /// Drive both wheels backward
    Backward,
    /// Spin counter-clockwise in place
    Left,
    /// Spin clockwise in place
    Right,
    /// Halt both wheels
    Stop,
}

impl MotorCommand {
    /// Wire encoding, without the trailing newline.
    pub fn wire_word(self) -> &'static str {
        match self {
            MotorCommand::Forward => "FWD",
            MotorCommand::Backward => "BCK",
            MotorCommand::Left => "LFT",
            MotorCommand::Right => "RGT",
            MotorCommand::Stop => "STP",
        }
    }
}

impl std::fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_word())
    }
}

/// Transport carrying motor commands to the drive firmware.
///
/// Fire and forget: `send` returns as soon as the word has been written
/// out, the caller owns all timing.
pub trait MotionTransport: Send {
    /// Send a single command.
    fn send(&mut self, command: MotorCommand) -> Result<()>;
}

/// Motor transport over a UART link.
pub struct SerialMotion {
    port: Box<dyn SerialPort>,
}

impl SerialMotion {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Baud rate (e.g., 9600)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialMotion { port })
    }
}

impl MotionTransport for SerialMotion {
    fn send(&mut self, command: MotorCommand) -> Result<()> {
        self.port.write_all(command.wire_word().as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        log::trace!("Sent motor command: {}", command);
        Ok(())
    }
}
