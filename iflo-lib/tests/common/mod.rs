//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use iflo_lib::command::{
    CommandCode, ControlMode, ExtProgram, PumpCommand, PumpMode, PumpResponse, Register, RunState,
};
#[allow(unused_imports)]
pub use iflo_lib::constants::*;
#[allow(unused_imports)]
pub use iflo_lib::error::PumpError;
#[allow(unused_imports)]
pub use iflo_lib::frame::{Frame, checksum, extract_frame, find_frame, frame_length, verify_checksum};
#[allow(unused_imports)]
pub use iflo_lib::pump::PumpSimulator;
#[allow(unused_imports)]
pub use iflo_lib::status::{PumpStatus, StatusRaw};

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Status query from the remote controller (0x20) to pump 1 (0x60)
#[allow(dead_code)]
pub const STATUS_REQUEST: &str = "ff00ffa50060200700012c";

/// Run-start command from the remote controller to pump 1
#[allow(dead_code)]
pub const RUN_START_REQUEST: &str = "ff00ffa500602006010a0136";

/// Remote-control handover from the remote controller to pump 1
#[allow(dead_code)]
pub const CTRL_REMOTE_REQUEST: &str = "ff00ffa50060200401ff0229";

/// Build a request frame addressed to pump 1 from the remote controller
#[allow(dead_code)]
pub fn request(command: PumpCommand) -> Frame {
    command.to_frame(ADDR_PUMP_1, ADDR_REMOTE_CONTROLLER)
}
