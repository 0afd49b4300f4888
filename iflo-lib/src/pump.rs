use crate::command::{ControlMode, ExtProgram, PumpCommand, PumpMode, Register, RunState};
use crate::constants::*;
use crate::error::PumpError;
use crate::frame::{Frame, extract_frame};
use crate::status::StatusRaw;
use bytes::Bytes;
use tracing::{debug, trace};
use zerocopy::IntoBytes;
use zerocopy::byteorder::big_endian::U16;

/// Simulated IntelliFlo pump: the device role of the protocol.
///
/// Owns the complete device state; mutated only by validated inbound frames
/// and the periodic physics tick. A real-pump adapter replaces this struct
/// wholesale while keeping the frame codec and controller unchanged.
#[derive(Debug, Clone)]
pub struct PumpSimulator {
    address: u8,
    control: ControlMode,
    run: RunState,
    mode: PumpMode,
    drive: u8,
    current_rpm: u16,
    target_rpm: u16,
    /// Last speed written through the direct-speed register
    manual_rpm: u16,
    filter_rpm: u16,
    preset_rpm: [u16; 4],
    ext_program_rpm: [u16; 4],
    active_program: Option<usize>,
    watts: u16,
    gpm: u8,
    error: u8,
    timer: u8,
    clock_hour: u8,
    clock_minute: u8,
}

impl PumpSimulator {
    pub fn new(address: u8) -> Self {
        PumpSimulator {
            address,
            control: ControlMode::Local,
            run: RunState::Stopped,
            mode: PumpMode::Filter,
            drive: DRIVE_READY,
            current_rpm: 0,
            target_rpm: 0,
            manual_rpm: 0,
            filter_rpm: DEFAULT_FILTER_RPM,
            preset_rpm: DEFAULT_PRESET_RPM,
            ext_program_rpm: [0; 4],
            active_program: None,
            watts: 0,
            gpm: 0,
            error: 0,
            timer: 0,
            clock_hour: 0,
            clock_minute: 0,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn control_mode(&self) -> ControlMode {
        self.control
    }

    pub fn is_running(&self) -> bool {
        self.run == RunState::Running
    }

    pub fn mode(&self) -> PumpMode {
        self.mode
    }

    pub fn current_rpm(&self) -> u16 {
        self.current_rpm
    }

    pub fn target_rpm(&self) -> u16 {
        self.target_rpm
    }

    /// 0-based index of the selected external program, if any
    pub fn active_ext_program(&self) -> Option<usize> {
        self.active_program
    }

    pub fn watts(&self) -> u16 {
        self.watts
    }

    pub fn gpm(&self) -> u8 {
        self.gpm
    }

    pub fn set_clock(&mut self, hour: u8, minute: u8) {
        self.clock_hour = hour % 24;
        self.clock_minute = minute % 60;
    }

    pub fn set_filter_rpm(&mut self, rpm: u16) {
        self.filter_rpm = rpm;
    }

    pub fn set_preset_rpm(&mut self, index: usize, rpm: u16) {
        if let Some(slot) = self.preset_rpm.get_mut(index) {
            *slot = rpm;
        }
    }

    /// Handle raw bytes from the line: locate a frame, validate it, apply
    /// it, and return the encoded response when one is due. Line noise,
    /// bad checksums and misaddressed frames all come back as `None`.
    pub fn process(&mut self, bytes: &[u8]) -> Option<Bytes> {
        let frame = match extract_frame(bytes) {
            Ok((frame, _)) => frame,
            Err(e) => {
                trace!("dropping unparseable input ({e}): {}", hex::encode(bytes));
                return None;
            }
        };
        self.handle_frame(&frame).map(|reply| reply.to_bytes())
    }

    /// Apply a validated frame to the state machine. `None` means the frame
    /// was dropped (not for us, malformed, or rejected); the protocol has
    /// no NACK.
    pub fn handle_frame(&mut self, frame: &Frame) -> Option<Frame> {
        if frame.destination != self.address {
            trace!(
                "dropping frame: {}",
                PumpError::AddressMismatch {
                    expected: self.address,
                    actual: frame.destination,
                }
            );
            return None;
        }

        let command = match PumpCommand::try_from(frame) {
            Ok(command) => command,
            Err(e) => {
                debug!("dropping frame: {e}");
                return None;
            }
        };

        let reply = match command {
            PumpCommand::SetControl(mode) => Some(self.on_set_control(mode)),
            PumpCommand::SetMode(mode) => self.on_set_mode(mode),
            PumpCommand::SetRun(state) => Some(self.on_set_run(state)),
            PumpCommand::QueryStatus => Some(self.status_payload()),
            PumpCommand::WriteRegister { register, value } => {
                Some(self.on_write_register(register, value))
            }
        };

        reply.map(|payload| Frame::new(frame.source, self.address, frame.command, payload))
    }

    fn on_set_control(&mut self, mode: ControlMode) -> Bytes {
        debug!("control mode -> {mode}");
        self.control = mode;
        Bytes::copy_from_slice(&[mode.into()])
    }

    /// Mode changes are only honored under remote control; a rejected
    /// command gets no acknowledgment at all.
    fn on_set_mode(&mut self, mode: PumpMode) -> Option<Bytes> {
        if self.control != ControlMode::Remote {
            debug!("dropping mode change to {mode}: {}", PumpError::PreconditionRejected);
            return None;
        }
        debug!("mode -> {mode}");
        self.mode = mode;
        self.target_rpm = self.speed_for_mode(mode);
        Some(Bytes::copy_from_slice(&[mode.into()]))
    }

    fn on_set_run(&mut self, state: RunState) -> Bytes {
        match state {
            RunState::Running => {
                self.run = RunState::Running;
                self.target_rpm = self.speed_for_mode(self.mode);
                debug!("start: target {} RPM in mode {}", self.target_rpm, self.mode);
            }
            RunState::Stopped => {
                self.run = RunState::Stopped;
                self.target_rpm = 0;
                if self.mode.is_ext_program() {
                    // leaving an external program on stop drops back to filter
                    self.mode = PumpMode::Filter;
                    self.active_program = None;
                }
                debug!("stop");
            }
        }
        Bytes::copy_from_slice(&[state.into()])
    }

    fn on_write_register(&mut self, register: Register, value: u16) -> Bytes {
        match register {
            Register::SetRpm => {
                self.manual_rpm = value;
                self.target_rpm = value;
                self.mode = PumpMode::Manual;
                debug!("direct speed write: {value} RPM");
            }
            Register::SetGpm => {
                self.gpm = value.min(u8::MAX as u16) as u8;
                debug!("direct flow write: {} GPM", self.gpm);
            }
            Register::ExtProgramSelect => match ExtProgram::try_from(value) {
                Ok(program) => self.select_ext_program(program),
                Err(_) => trace!("unknown program select value {value:#06x} ignored"),
            },
            _ => {
                if let Some(index) = register.ext_program_index() {
                    self.ext_program_rpm[index] = value;
                    debug!("program {} speed -> {value} RPM", index + 1);
                    if self.mode.ext_program_index() == Some(index) {
                        self.target_rpm = value;
                    }
                } else {
                    // unknown registers are accepted and acknowledged
                    // without any state change
                    trace!("write to unknown register {:#06x} ignored", u16::from(register));
                }
            }
        }
        Bytes::copy_from_slice(&value.to_be_bytes())
    }

    fn select_ext_program(&mut self, program: ExtProgram) {
        match program.index() {
            Some(index) => {
                self.active_program = Some(index);
                // index 0..=3 always maps to a mode
                if let Some(mode) = PumpMode::from_ext_program_index(index) {
                    self.mode = mode;
                }
                self.target_rpm = self.ext_program_rpm[index];
                debug!(
                    "external program {} selected, target {} RPM",
                    index + 1,
                    self.target_rpm
                );
            }
            None => {
                self.active_program = None;
                self.mode = PumpMode::Filter;
                self.target_rpm = self.speed_for_mode(PumpMode::Filter);
                debug!("external programs off, back to filter");
            }
        }
    }

    fn speed_for_mode(&self, mode: PumpMode) -> u16 {
        if let Some(index) = mode.preset_index() {
            return self.preset_rpm[index];
        }
        if let Some(index) = mode.ext_program_index() {
            return self.ext_program_rpm[index];
        }
        match mode {
            PumpMode::Manual => self.manual_rpm,
            // no dedicated speed table exists for feature 1
            _ => self.filter_rpm,
        }
    }

    fn status_payload(&self) -> Bytes {
        let raw = StatusRaw {
            run: self.run.into(),
            mode: self.mode.into(),
            drive: self.drive,
            watts: U16::new(self.watts),
            rpm: U16::new(self.current_rpm),
            gpm: self.gpm,
            ppc: 0,
            reserved_9: 0,
            error: self.error,
            reserved_11: 0,
            timer: self.timer,
            clock_hour: self.clock_hour,
            clock_minute: self.clock_minute,
        };
        Bytes::copy_from_slice(raw.as_bytes())
    }

    /// Periodic physics step, independent of message arrival.
    ///
    /// Speed converges toward the target asymmetrically: ramp-down is
    /// faster than ramp-up, neither overshoots, and a stopped pump holds
    /// at zero. Power and flow follow speed linearly up to the rated
    /// maxima.
    pub fn tick(&mut self) {
        let target = if self.run == RunState::Running {
            self.target_rpm
        } else {
            0
        };

        if self.current_rpm < target {
            self.current_rpm = self.current_rpm.saturating_add(ACCEL_RPM_PER_TICK).min(target);
        } else if self.current_rpm > target {
            self.current_rpm = self.current_rpm.saturating_sub(DECEL_RPM_PER_TICK).max(target);
        }

        if self.current_rpm == 0 {
            self.watts = 0;
            self.gpm = 0;
        } else {
            let rpm = self.current_rpm as u32;
            self.watts = (rpm * RATED_WATTS as u32 / RATED_RPM as u32) as u16;
            self.gpm = (rpm * RATED_GPM as u32 / RATED_RPM as u32) as u8;
        }
    }

    /// Advance the simulated clock one minute. Runs on wall-clock cadence,
    /// independent of run state. A nonzero countdown timer loses a minute.
    pub fn advance_clock(&mut self) {
        self.clock_minute += 1;
        if self.clock_minute >= 60 {
            self.clock_minute = 0;
            self.clock_hour = (self.clock_hour + 1) % 24;
        }
        if self.timer > 0 {
            self.timer -= 1;
        }
    }
}
