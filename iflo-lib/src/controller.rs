use crate::channel::ByteChannel;
use crate::command::{ControlMode, PumpCommand, PumpMode, PumpResponse, Register, RunState};
use crate::constants::*;
use crate::error::PumpError;
use crate::frame::{extract_frame, find_frame};
use crate::status::PumpStatus;
use bytes::BytesMut;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, trace, warn};

const RECV_CHUNK: usize = 1024;

/// The controller role: builds request frames with its own source address,
/// transmits them, waits a bounded interval for the pump's response, and
/// keeps the shared status snapshot current.
pub struct PumpController<C: ByteChannel> {
    channel: C,
    pump_address: u8,
    own_address: u8,
    response_timeout: Duration,
    settle_pause: Duration,
    status: PumpStatus,
}

impl<C: ByteChannel> PumpController<C> {
    /// Controller for pump 1, with the stock remote-controller address and
    /// protocol timing.
    pub fn new(channel: C) -> Self {
        PumpController {
            channel,
            pump_address: ADDR_PUMP_1,
            own_address: ADDR_REMOTE_CONTROLLER,
            response_timeout: Duration::from_millis(RESPONSE_TIMEOUT_MS),
            settle_pause: Duration::from_millis(FULL_START_SETTLE_MS),
            status: PumpStatus::default(),
        }
    }

    pub fn with_addresses(mut self, pump_address: u8, own_address: u8) -> Self {
        self.pump_address = pump_address;
        self.own_address = own_address;
        self
    }

    pub fn with_timing(mut self, response_timeout: Duration, settle_pause: Duration) -> Self {
        self.response_timeout = response_timeout;
        self.settle_pause = settle_pause;
        self
    }

    /// Read-only view of the last-known pump state, for status consumers.
    pub fn status(&self) -> &PumpStatus {
        &self.status
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    // ------------------------------------------------------------------
    // Primitive operations
    // ------------------------------------------------------------------

    /// Hand the pump to bus control (`remote = true`) or back to its front
    /// panel.
    pub async fn set_control(&mut self, remote: bool) -> Result<PumpResponse, PumpError> {
        let mode = if remote {
            ControlMode::Remote
        } else {
            ControlMode::Local
        };
        self.execute(PumpCommand::SetControl(mode)).await
    }

    /// Start or stop the motor.
    pub async fn set_run(&mut self, start: bool) -> Result<PumpResponse, PumpError> {
        let state = if start {
            RunState::Running
        } else {
            RunState::Stopped
        };
        self.execute(PumpCommand::SetRun(state)).await
    }

    /// Query the 15-byte status block and fold it into the snapshot.
    pub async fn query_status(&mut self) -> Result<PumpResponse, PumpError> {
        self.execute(PumpCommand::QueryStatus).await
    }

    /// Write the direct-speed register.
    ///
    /// The pump firmware accepts 450-3450 RPM; the protocol itself carries
    /// whatever it is given, so callers must validate the range before
    /// invoking (the codec transmits out-of-range values as-is).
    pub async fn set_speed(&mut self, rpm: u16) -> Result<PumpResponse, PumpError> {
        self.execute(PumpCommand::set_speed(rpm)).await
    }

    /// Select an operating mode. Honored by the pump only under remote
    /// control; under local control the pump stays silent and the wait
    /// times out.
    pub async fn set_mode(&mut self, mode: PumpMode) -> Result<PumpResponse, PumpError> {
        self.execute(PumpCommand::SetMode(mode)).await
    }

    /// Write an arbitrary pump register.
    pub async fn write_register(
        &mut self,
        register: Register,
        value: u16,
    ) -> Result<PumpResponse, PumpError> {
        self.execute(PumpCommand::WriteRegister { register, value })
            .await
    }

    // ------------------------------------------------------------------
    // Composite sequences
    // ------------------------------------------------------------------

    /// The full remote-start sequence: start the motor, write the speed,
    /// give the drive a second to settle, read status back, then latch
    /// remote control.
    ///
    /// Steps that time out are logged and skipped: the pump offers no
    /// transactional guarantees, so the sequence runs to the end
    /// regardless and the remote-active flag is set on completion.
    pub async fn full_start(&mut self, rpm: u16) -> Result<(), PumpError> {
        info!("full start at {rpm} RPM");
        self.step(PumpCommand::SetRun(RunState::Running)).await?;
        self.step(PumpCommand::set_speed(rpm)).await?;
        sleep(self.settle_pause).await;
        self.step(PumpCommand::QueryStatus).await?;
        self.step(PumpCommand::SetControl(ControlMode::Remote))
            .await?;
        self.status.remote_active = true;
        Ok(())
    }

    /// Stop the motor and hand control back to the front panel.
    pub async fn full_stop(&mut self) -> Result<(), PumpError> {
        info!("full stop");
        self.step(PumpCommand::SetRun(RunState::Stopped)).await?;
        self.step(PumpCommand::SetControl(ControlMode::Local))
            .await?;
        self.status.remote_active = false;
        Ok(())
    }

    /// One sequence step: a timeout is a soft failure (warned, sequence
    /// continues); transport errors are hard failures.
    async fn step(&mut self, command: PumpCommand) -> Result<(), PumpError> {
        match self.execute(command).await {
            Ok(_) => Ok(()),
            Err(PumpError::ResponseTimeout(_)) => {
                warn!("no response to {:?} within {:?}, continuing", command, self.response_timeout);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Wire plumbing
    // ------------------------------------------------------------------

    /// Transmit a request and block for its response, updating the
    /// snapshot on success.
    pub async fn execute(&mut self, command: PumpCommand) -> Result<PumpResponse, PumpError> {
        let frame = command.to_frame(self.pump_address, self.own_address);
        let bytes = frame.to_bytes();
        debug!(
            "tx {:?} -> {:#04x}: {}",
            frame.command_code(),
            frame.destination,
            hex::encode(&bytes)
        );
        self.channel.transmit(&bytes).await?;
        let response = self.await_response().await?;
        self.apply_response(&response);
        Ok(response)
    }

    /// Accumulate line bytes until a valid frame addressed to this
    /// controller parses, or the response timeout expires. Checksum
    /// failures and foreign traffic are skipped, never fatal.
    async fn await_response(&mut self) -> Result<PumpResponse, PumpError> {
        let deadline = Instant::now() + self.response_timeout;
        let mut buf = BytesMut::new();

        loop {
            let chunk = timeout_at(deadline, self.channel.receive(RECV_CHUNK)).await??;
            buf.extend_from_slice(&chunk);

            loop {
                match extract_frame(&buf) {
                    Ok((frame, consumed)) => {
                        let _ = buf.split_to(consumed);
                        if frame.destination != self.own_address {
                            trace!(
                                "skipping frame for {:#04x} (we are {:#04x})",
                                frame.destination, self.own_address
                            );
                            continue;
                        }
                        match PumpResponse::try_from(&frame) {
                            Ok(PumpResponse::Unknown(frame)) => {
                                warn!(
                                    "ignoring response with unrecognized command {:#04x}",
                                    frame.command
                                );
                            }
                            Ok(response) => return Ok(response),
                            Err(e) => warn!("ignoring malformed response: {e}"),
                        }
                    }
                    Err(PumpError::ChecksumMismatch { computed, received }) => {
                        warn!(
                            "checksum mismatch (computed {computed:#06x}, received {received:#06x}), resyncing"
                        );
                        // skip past this preamble and rescan the tail
                        if let Some(start) = find_frame(&buf) {
                            let _ = buf.split_to(start + 1);
                        } else {
                            buf.clear();
                        }
                    }
                    // nothing frame-shaped yet; read more until the deadline
                    Err(PumpError::NoPreamble(_)) | Err(PumpError::Truncated { .. }) => break,
                    Err(e) => return Err(e),
                }
            }
        }
    }

    /// Update only the snapshot fields the response speaks for.
    fn apply_response(&mut self, response: &PumpResponse) {
        match response {
            PumpResponse::RunAck(state) => {
                self.status.running = *state == RunState::Running;
            }
            PumpResponse::ModeAck(mode) => {
                self.status.mode = *mode;
            }
            PumpResponse::ControlAck(mode) => {
                self.status.remote_active = *mode == ControlMode::Remote;
            }
            PumpResponse::RegisterAck(value) => {
                debug!("register write acknowledged with {value:#06x}");
            }
            PumpResponse::Status(raw) => {
                self.status.apply_status(raw);
            }
            PumpResponse::Unknown(frame) => {
                warn!("unhandled response command {:#04x}", frame.command);
            }
        }
    }
}
