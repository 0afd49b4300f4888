use crate::command::{PumpMode, RunState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zerocopy::byteorder::big_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Wire layout of the 15-byte status payload (command 0x07 response).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct StatusRaw {
    pub run: u8,   // 0x0A running, 0x04 stopped
    pub mode: u8,  // see PumpMode
    pub drive: u8, // 0x02 = drive ready
    pub watts: U16,
    pub rpm: U16,
    pub gpm: u8,
    pub ppc: u8, // PPC / chlorinator level
    pub reserved_9: u8,
    pub error: u8, // 0x00 = no error
    pub reserved_11: u8,
    pub timer: u8, // minutes remaining
    pub clock_hour: u8,
    pub clock_minute: u8,
}

/// Last-known mirror of the pump's state, owned by the controller role.
///
/// Written only when a status or acknowledgment frame parses successfully;
/// external collaborators (web UI, MQTT publisher) read it without mutation
/// rights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PumpStatus {
    /// Whether at least one status response has been received
    pub valid: bool,
    pub running: bool,
    pub rpm: u16,
    pub watts: u16,
    pub gpm: u8,
    pub mode: PumpMode,
    pub error_code: u8,
    pub drive: u8,
    pub timer: u8,
    pub clock_hour: u8,
    pub clock_minute: u8,
    /// Whether the pump was last commanded into remote control
    pub remote_active: bool,
    pub last_update: Option<DateTime<Utc>>,
}

impl PumpStatus {
    /// Fold a full status response into the snapshot.
    pub fn apply_status(&mut self, raw: &StatusRaw) {
        self.valid = true;
        self.running = RunState::try_from(raw.run)
            .map(|r| r == RunState::Running)
            .unwrap_or(false);
        self.rpm = raw.rpm.get();
        self.watts = raw.watts.get();
        self.gpm = raw.gpm;
        self.mode = PumpMode::try_from(raw.mode).unwrap_or_default();
        self.error_code = raw.error;
        self.drive = raw.drive;
        self.timer = raw.timer;
        self.clock_hour = raw.clock_hour;
        self.clock_minute = raw.clock_minute;
        self.last_update = Some(Utc::now());
    }
}

impl fmt::Display for PumpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return write!(f, "no status received yet");
        }
        write!(
            f,
            "{} | {} RPM, {} W, {} GPM | mode {} | err {:#04x} | {:02}:{:02}",
            if self.running { "running" } else { "stopped" },
            self.rpm,
            self.watts,
            self.gpm,
            self.mode,
            self.error_code,
            self.clock_hour,
            self.clock_minute
        )
    }
}
