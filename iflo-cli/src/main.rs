use clap::{Parser, Subcommand};
use iflo_lib::command::{CommandCode, ControlMode, PumpCommand, PumpMode, PumpResponse, RunState};
use iflo_lib::constants::*;
use iflo_lib::frame::extract_frame;
use iflo_lib::{PumpController, PumpSimulator, SimulatedBus};
use std::error::Error;
use tracing::info;

#[derive(Parser)]
#[command(name = "iflo", about = "IntelliFlo RS-485 protocol tool", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a hex-encoded frame and print its fields
    Decode {
        /// Frame bytes as hex, leading line noise tolerated
        hex: String,
    },
    /// Encode a request frame and print it as hex
    Encode {
        #[command(subcommand)]
        request: Request,
        /// Destination pump address
        #[arg(long, default_value_t = ADDR_PUMP_1)]
        dst: u8,
        /// Our source address
        #[arg(long, default_value_t = ADDR_REMOTE_CONTROLLER)]
        src: u8,
    },
    /// Run a full controller session against the in-process pump simulator
    Demo {
        /// Target speed in RPM (450-3450)
        #[arg(long, default_value_t = 2000)]
        rpm: u16,
    },
}

#[derive(Subcommand)]
enum Request {
    /// Hand control to the bus or back to the front panel
    Control {
        #[arg(long)]
        local: bool,
    },
    /// Start or stop the motor
    Run {
        #[arg(long)]
        stop: bool,
    },
    /// Request the status block
    Status,
    /// Write the direct-speed register
    Speed { rpm: u16 },
    /// Select an operating mode by its code
    Mode { code: u8 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Decode { hex } => decode(&hex),
        Command::Encode { request, dst, src } => encode(request, dst, src),
        Command::Demo { rpm } => demo(rpm).await,
    }
}

fn decode(input: &str) -> Result<(), Box<dyn Error>> {
    let bytes = hex::decode(input.trim())?;
    let (frame, consumed) = extract_frame(&bytes)?;

    println!("Frame ({consumed} bytes consumed):");
    println!("  Version:     {:#04x}", frame.version);
    println!("  Destination: {:#04x}", frame.destination);
    println!("  Source:      {:#04x}", frame.source);
    println!("  Command:     {:?} ({:#04x})", frame.command_code(), frame.command);
    println!("  Payload:     {}", hex::encode(&frame.payload));

    if frame.command_code() == CommandCode::QueryStatus && !frame.payload.is_empty() {
        if let Ok(PumpResponse::Status(raw)) = PumpResponse::try_from(&frame) {
            println!("Status block:");
            println!("  Run:   {:#04x}", raw.run);
            println!("  Mode:  {}", PumpMode::try_from(raw.mode).unwrap_or_default());
            println!("  Drive: {:#04x}", raw.drive);
            println!("  Power: {} W", raw.watts.get());
            println!("  Speed: {} RPM", raw.rpm.get());
            println!("  Flow:  {} GPM", raw.gpm);
            println!("  Error: {:#04x}", raw.error);
            println!("  Clock: {:02}:{:02}", raw.clock_hour, raw.clock_minute);
        }
    }
    if consumed < bytes.len() {
        println!("{} trailing bytes not consumed", bytes.len() - consumed);
    }
    Ok(())
}

fn encode(request: Request, dst: u8, src: u8) -> Result<(), Box<dyn Error>> {
    let command = match request {
        Request::Control { local } => PumpCommand::SetControl(if local {
            ControlMode::Local
        } else {
            ControlMode::Remote
        }),
        Request::Run { stop } => PumpCommand::SetRun(if stop {
            RunState::Stopped
        } else {
            RunState::Running
        }),
        Request::Status => PumpCommand::QueryStatus,
        Request::Speed { rpm } => {
            check_rpm(rpm)?;
            PumpCommand::set_speed(rpm)
        }
        Request::Mode { code } => {
            let mode = PumpMode::try_from(code)
                .map_err(|_| format!("unknown mode code {code:#04x}"))?;
            PumpCommand::SetMode(mode)
        }
    };
    println!("{}", hex::encode(command.to_frame(dst, src).to_bytes()));
    Ok(())
}

async fn demo(rpm: u16) -> Result<(), Box<dyn Error>> {
    check_rpm(rpm)?;

    let bus = SimulatedBus::new(PumpSimulator::new(ADDR_PUMP_1));
    let mut controller = PumpController::new(bus);

    info!("starting pump at {rpm} RPM");
    controller.full_start(rpm).await?;

    // let the simulated drive spin up, then read the result back
    while controller.channel().pump().current_rpm() != controller.channel().pump().target_rpm() {
        controller.channel_mut().pump_mut().tick();
    }
    controller.query_status().await?;

    println!("{}", serde_json::to_string_pretty(controller.status())?);
    println!("{}", controller.status());

    info!("stopping pump");
    controller.full_stop().await?;
    while controller.channel().pump().current_rpm() > 0 {
        controller.channel_mut().pump_mut().tick();
    }
    controller.query_status().await?;
    println!("{}", controller.status());

    Ok(())
}

fn check_rpm(rpm: u16) -> Result<(), Box<dyn Error>> {
    // the pump firmware only accepts this window; the protocol itself
    // would transmit anything, so the range check lives at the caller
    if !(MIN_RPM..=MAX_RPM).contains(&rpm) {
        return Err(format!("speed {rpm} RPM outside the {MIN_RPM}-{MAX_RPM} range").into());
    }
    Ok(())
}
