pub mod channel;
pub mod command;
pub mod constants;
pub mod controller;
pub mod error;
pub mod frame;
pub mod pump;
pub mod status;

// Re-export the main entry points for easy access
pub use channel::{ByteChannel, SimulatedBus};
pub use controller::PumpController;
pub use pump::PumpSimulator;
