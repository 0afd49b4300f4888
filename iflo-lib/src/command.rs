use crate::error::PumpError;
use crate::frame::Frame;
use crate::status::StatusRaw;
use bytes::Bytes;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use zerocopy::FromBytes;

/// Command / Function Identifier byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum CommandCode {
    /// Write a 16-bit value to a pump memory register
    WriteRegister = 0x01,
    /// Hand control to the bus (remote) or back to the front panel (local)
    SetControl = 0x04,
    /// Select the operating mode
    SetMode = 0x05,
    /// Start or stop the motor
    SetRun = 0x06,
    /// Request the 15-byte status block
    QueryStatus = 0x07,

    #[num_enum(catch_all)]
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ControlMode {
    #[strum(to_string = "local")]
    Local = 0x00,
    #[strum(to_string = "remote")]
    Remote = 0xFF,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RunState {
    #[strum(to_string = "stopped")]
    Stopped = 0x04,
    #[strum(to_string = "running")]
    Running = 0x0A,
}

/// Operating mode, selecting which target-speed source applies.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    Default,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum PumpMode {
    #[default]
    #[strum(to_string = "Filter")]
    Filter = 0x00,
    #[strum(to_string = "Manual")]
    Manual = 0x01,
    #[strum(to_string = "Speed 1")]
    Speed1 = 0x02,
    #[strum(to_string = "Speed 2")]
    Speed2 = 0x03,
    #[strum(to_string = "Speed 3")]
    Speed3 = 0x04,
    #[strum(to_string = "Speed 4")]
    Speed4 = 0x05,
    #[strum(to_string = "Feature 1")]
    Feature1 = 0x06,
    #[strum(to_string = "Ext. Program 1")]
    ExtProgram1 = 0x09,
    #[strum(to_string = "Ext. Program 2")]
    ExtProgram2 = 0x0A,
    #[strum(to_string = "Ext. Program 3")]
    ExtProgram3 = 0x0B,
    #[strum(to_string = "Ext. Program 4")]
    ExtProgram4 = 0x0C,
}

impl PumpMode {
    pub fn is_ext_program(&self) -> bool {
        self.ext_program_index().is_some()
    }

    /// 0-based external program index, when this mode is one
    pub fn ext_program_index(&self) -> Option<usize> {
        match self {
            PumpMode::ExtProgram1 => Some(0),
            PumpMode::ExtProgram2 => Some(1),
            PumpMode::ExtProgram3 => Some(2),
            PumpMode::ExtProgram4 => Some(3),
            _ => None,
        }
    }

    /// 0-based front-panel preset index, when this mode is one
    pub fn preset_index(&self) -> Option<usize> {
        match self {
            PumpMode::Speed1 => Some(0),
            PumpMode::Speed2 => Some(1),
            PumpMode::Speed3 => Some(2),
            PumpMode::Speed4 => Some(3),
            _ => None,
        }
    }

    pub fn from_ext_program_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(PumpMode::ExtProgram1),
            1 => Some(PumpMode::ExtProgram2),
            2 => Some(PumpMode::ExtProgram3),
            3 => Some(PumpMode::ExtProgram4),
            _ => None,
        }
    }
}

/// 16-bit register addresses for `CommandCode::WriteRegister`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum Register {
    /// Set speed directly in RPM (VS pumps)
    SetRpm = 0x02C4,
    /// Set flow directly in GPM (VF pumps)
    SetGpm = 0x02E4,
    /// Select which external program runs
    ExtProgramSelect = 0x0321,
    /// Speed for external program 1
    ExtProgram1Rpm = 0x0327,
    /// Speed for external program 2
    ExtProgram2Rpm = 0x0328,
    /// Speed for external program 3
    ExtProgram3Rpm = 0x0329,
    /// Speed for external program 4
    ExtProgram4Rpm = 0x032A,

    #[num_enum(catch_all)]
    Unknown(u16),
}

impl Register {
    /// 0-based external program index for the per-program speed registers
    pub fn ext_program_index(&self) -> Option<usize> {
        match self {
            Register::ExtProgram1Rpm => Some(0),
            Register::ExtProgram2Rpm => Some(1),
            Register::ExtProgram3Rpm => Some(2),
            Register::ExtProgram4Rpm => Some(3),
            _ => None,
        }
    }

    pub fn ext_program_rpm(index: usize) -> Option<Register> {
        match index {
            0 => Some(Register::ExtProgram1Rpm),
            1 => Some(Register::ExtProgram2Rpm),
            2 => Some(Register::ExtProgram3Rpm),
            3 => Some(Register::ExtProgram4Rpm),
            _ => None,
        }
    }
}

/// Values written to `Register::ExtProgramSelect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum ExtProgram {
    Off = 0x0000,
    Program1 = 0x0008,
    Program2 = 0x0010,
    Program3 = 0x0018,
    Program4 = 0x0020,
}

impl ExtProgram {
    /// 0-based program index; `None` for `Off`
    pub fn index(&self) -> Option<usize> {
        match self {
            ExtProgram::Off => None,
            ExtProgram::Program1 => Some(0),
            ExtProgram::Program2 => Some(1),
            ExtProgram::Program3 => Some(2),
            ExtProgram::Program4 => Some(3),
        }
    }
}

/// A request the controller role can put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpCommand {
    SetControl(ControlMode),
    SetMode(PumpMode),
    SetRun(RunState),
    QueryStatus,
    WriteRegister { register: Register, value: u16 },
}

impl PumpCommand {
    /// Direct speed write; forces the pump into manual mode
    pub fn set_speed(rpm: u16) -> Self {
        PumpCommand::WriteRegister {
            register: Register::SetRpm,
            value: rpm,
        }
    }

    /// Direct flow write (VF pumps)
    pub fn set_flow(gpm: u16) -> Self {
        PumpCommand::WriteRegister {
            register: Register::SetGpm,
            value: gpm,
        }
    }

    pub fn select_ext_program(program: ExtProgram) -> Self {
        PumpCommand::WriteRegister {
            register: Register::ExtProgramSelect,
            value: program.into(),
        }
    }

    pub fn code(&self) -> CommandCode {
        match self {
            PumpCommand::WriteRegister { .. } => CommandCode::WriteRegister,
            PumpCommand::SetControl(_) => CommandCode::SetControl,
            PumpCommand::SetMode(_) => CommandCode::SetMode,
            PumpCommand::SetRun(_) => CommandCode::SetRun,
            PumpCommand::QueryStatus => CommandCode::QueryStatus,
        }
    }

    pub fn payload(&self) -> Bytes {
        match *self {
            PumpCommand::WriteRegister { register, value } => {
                let reg: u16 = register.into();
                let mut buf = Vec::with_capacity(4);
                buf.extend_from_slice(&reg.to_be_bytes());
                buf.extend_from_slice(&value.to_be_bytes());
                Bytes::from(buf)
            }
            PumpCommand::SetControl(mode) => Bytes::copy_from_slice(&[mode.into()]),
            PumpCommand::SetMode(mode) => Bytes::copy_from_slice(&[mode.into()]),
            PumpCommand::SetRun(state) => Bytes::copy_from_slice(&[state.into()]),
            PumpCommand::QueryStatus => Bytes::new(),
        }
    }

    pub fn to_frame(&self, destination: u8, source: u8) -> Frame {
        Frame::new(destination, source, self.code().into(), self.payload())
    }
}

impl TryFrom<&Frame> for PumpCommand {
    type Error = PumpError;

    /// Decode a validated request frame into a command. Used by the device
    /// role; malformed payloads and unknown command bytes are errors the
    /// caller turns into silent drops (the protocol has no NACK).
    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        let payload = &frame.payload;
        match frame.command_code() {
            CommandCode::WriteRegister => {
                if payload.len() != 4 {
                    return Err(PumpError::InvalidPayload(format!(
                        "register write expects 4 bytes, got {}",
                        payload.len()
                    )));
                }
                let register = u16::from_be_bytes([payload[0], payload[1]]);
                let value = u16::from_be_bytes([payload[2], payload[3]]);
                Ok(PumpCommand::WriteRegister {
                    register: Register::from_primitive(register),
                    value,
                })
            }
            CommandCode::SetControl => {
                let byte = single_byte(payload)?;
                let mode = ControlMode::try_from(byte).map_err(|_| {
                    PumpError::InvalidPayload(format!("bad control byte {byte:#04x}"))
                })?;
                Ok(PumpCommand::SetControl(mode))
            }
            CommandCode::SetMode => {
                let byte = single_byte(payload)?;
                let mode = PumpMode::try_from(byte)
                    .map_err(|_| PumpError::InvalidPayload(format!("bad mode byte {byte:#04x}")))?;
                Ok(PumpCommand::SetMode(mode))
            }
            CommandCode::SetRun => {
                let byte = single_byte(payload)?;
                let state = RunState::try_from(byte)
                    .map_err(|_| PumpError::InvalidPayload(format!("bad run byte {byte:#04x}")))?;
                Ok(PumpCommand::SetRun(state))
            }
            CommandCode::QueryStatus => Ok(PumpCommand::QueryStatus),
            CommandCode::Unknown(code) => Err(PumpError::UnsupportedCommand(code)),
        }
    }
}

/// A response frame interpreted by the controller role. Requests and
/// responses share command codes; direction is carried by the addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpResponse {
    /// Register write acknowledged; echoes the written value only
    RegisterAck(u16),
    ControlAck(ControlMode),
    ModeAck(PumpMode),
    RunAck(RunState),
    Status(StatusRaw),
    /// Recognized frame with a command code we don't handle
    Unknown(Frame),
}

impl TryFrom<&Frame> for PumpResponse {
    type Error = PumpError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        let payload = &frame.payload;
        match frame.command_code() {
            CommandCode::WriteRegister => {
                if payload.len() != 2 {
                    return Err(PumpError::InvalidPayload(format!(
                        "register ack expects 2 bytes, got {}",
                        payload.len()
                    )));
                }
                Ok(PumpResponse::RegisterAck(u16::from_be_bytes([
                    payload[0], payload[1],
                ])))
            }
            CommandCode::SetControl => {
                let byte = single_byte(payload)?;
                let mode = ControlMode::try_from(byte).map_err(|_| {
                    PumpError::InvalidPayload(format!("bad control ack {byte:#04x}"))
                })?;
                Ok(PumpResponse::ControlAck(mode))
            }
            CommandCode::SetMode => {
                let byte = single_byte(payload)?;
                let mode = PumpMode::try_from(byte)
                    .map_err(|_| PumpError::InvalidPayload(format!("bad mode ack {byte:#04x}")))?;
                Ok(PumpResponse::ModeAck(mode))
            }
            CommandCode::SetRun => {
                let byte = single_byte(payload)?;
                let state = RunState::try_from(byte)
                    .map_err(|_| PumpError::InvalidPayload(format!("bad run ack {byte:#04x}")))?;
                Ok(PumpResponse::RunAck(state))
            }
            CommandCode::QueryStatus => {
                let raw = StatusRaw::read_from_bytes(payload.as_ref()).map_err(|_| {
                    PumpError::InvalidPayload(format!(
                        "status payload expects {} bytes, got {}",
                        crate::constants::STATUS_PAYLOAD_LEN,
                        payload.len()
                    ))
                })?;
                Ok(PumpResponse::Status(raw))
            }
            CommandCode::Unknown(_) => Ok(PumpResponse::Unknown(frame.clone())),
        }
    }
}

fn single_byte(payload: &Bytes) -> Result<u8, PumpError> {
    if payload.len() != 1 {
        return Err(PumpError::InvalidPayload(format!(
            "expected 1 payload byte, got {}",
            payload.len()
        )));
    }
    Ok(payload[0])
}
