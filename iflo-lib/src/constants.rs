// Wire constants for the Pentair IntelliFlo RS-485 protocol, as
// reverse-engineered by the nodejs-poolController and pavsp communities.

/// Every frame starts with this sequence; the trailing 0xA5 opens the
/// checksummed region.
pub const PREAMBLE: [u8; 4] = [0xFF, 0x00, 0xFF, 0xA5];

/// Preamble (4) + version (1) + dst (1) + src (1) + cmd (1) + len (1) + checksum (2)
pub const MIN_FRAME_LEN: usize = 11;

/// Offset of the 0xA5 lead byte, start of the checksummed region
pub const IDX_LEAD: usize = 3;

/// Offset of the version byte
pub const IDX_VERSION: usize = 4;

/// Offset of the destination address
pub const IDX_DST: usize = 5;

/// Offset of the source address
pub const IDX_SRC: usize = 6;

/// Offset of the command byte
pub const IDX_CMD: usize = 7;

/// Offset of the payload length byte
pub const IDX_LEN: usize = 8;

/// Offset of the first payload byte
pub const IDX_PAYLOAD: usize = 9;

/// Version byte (always 0x00 in observed traffic)
pub const PROTOCOL_VERSION: u8 = 0x00;

/// Broadcast address used by main controllers for status broadcasts
pub const ADDR_BROADCAST: u8 = 0x0F;

/// First main controller (IntelliTouch / EasyTouch)
pub const ADDR_MAIN_CONTROLLER_1: u8 = 0x10;

/// Second main controller
pub const ADDR_MAIN_CONTROLLER_2: u8 = 0x11;

/// Remote controller range start; this library acts as a remote controller
pub const ADDR_REMOTE_CONTROLLER: u8 = 0x20;

/// Pump 1, the usual destination
pub const ADDR_PUMP_1: u8 = 0x60;

/// Pump 2
pub const ADDR_PUMP_2: u8 = 0x61;

/// Pump 3
pub const ADDR_PUMP_3: u8 = 0x62;

/// Pump 4
pub const ADDR_PUMP_4: u8 = 0x63;

/// Status response payload is always 15 bytes
pub const STATUS_PAYLOAD_LEN: usize = 15;

/// Drive state reported while the drive is ready
pub const DRIVE_READY: u8 = 0x02;

/// Lowest speed the pump firmware accepts (caller precondition)
pub const MIN_RPM: u16 = 450;

/// Highest speed the pump firmware accepts (caller precondition)
pub const MAX_RPM: u16 = 3450;

/// How long to wait for a pump response before giving up on a step
pub const RESPONSE_TIMEOUT_MS: u64 = 2000;

/// Settle pause inside the full-start sequence, before the status query
pub const FULL_START_SETTLE_MS: u64 = 1000;

/// How often a supervising loop should poll pump status
pub const STATUS_QUERY_INTERVAL_MS: u64 = 15_000;

/// External program commands must be refreshed this often or the pump
/// drops out of the program and halts
pub const EXT_PROG_REPEAT_INTERVAL_MS: u64 = 30_000;

// Simulation parameters. These model a 3 HP IntelliFlo VS; a real-pump
// adapter replaces the simulator entirely and none of these reach the wire.

/// Top speed of the simulated pump
pub const RATED_RPM: u16 = 3450;

/// Power draw at rated speed
pub const RATED_WATTS: u16 = 1800;

/// Flow at rated speed
pub const RATED_GPM: u8 = 80;

/// Speed gained per physics tick while below target
pub const ACCEL_RPM_PER_TICK: u16 = 50;

/// Speed shed per physics tick while above target; ramp-down is faster
/// than ramp-up
pub const DECEL_RPM_PER_TICK: u16 = 100;

/// Wall-clock interval a physics tick represents
pub const TICK_INTERVAL_MS: u64 = 100;

/// Factory speeds for the four front-panel presets
pub const DEFAULT_PRESET_RPM: [u16; 4] = [750, 1500, 2350, 3110];

/// Factory speed for filter mode
pub const DEFAULT_FILTER_RPM: u16 = 1500;
