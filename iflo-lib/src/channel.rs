use crate::pump::PumpSimulator;
use bytes::Bytes;
use std::collections::VecDeque;
use std::io;
use tracing::trace;

/// The opaque half-duplex byte channel both roles talk through.
///
/// Direction switching and UART plumbing live behind an implementation of
/// this trait; the protocol core only needs "flush these bytes" and "give
/// me whatever has arrived". Receive resolves once at least one byte is
/// available; callers bound the wait with `tokio::time::timeout`.
#[allow(async_fn_in_trait)]
pub trait ByteChannel {
    /// Transmit, resolving once the bytes are flushed to the line.
    async fn transmit(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Receive up to `max_len` bytes, resolving once at least one byte is
    /// available. Pends while the line is silent.
    async fn receive(&mut self, max_len: usize) -> io::Result<Bytes>;

    /// Bytes already buffered and ready to read.
    fn bytes_available(&self) -> usize;
}

/// In-memory bus wiring a [`PumpSimulator`] directly to the channel: what
/// the controller transmits is handled by the pump, and the pump's
/// responses queue up for the controller to receive.
///
/// This is the seam for swapping simulation against real hardware: a real
/// RS-485 adapter implements [`ByteChannel`] over a serial port and the
/// controller is none the wiser.
pub struct SimulatedBus {
    pump: PumpSimulator,
    rx: VecDeque<u8>,
}

impl SimulatedBus {
    pub fn new(pump: PumpSimulator) -> Self {
        SimulatedBus {
            pump,
            rx: VecDeque::new(),
        }
    }

    pub fn pump(&self) -> &PumpSimulator {
        &self.pump
    }

    pub fn pump_mut(&mut self) -> &mut PumpSimulator {
        &mut self.pump
    }
}

impl ByteChannel for SimulatedBus {
    async fn transmit(&mut self, bytes: &[u8]) -> io::Result<()> {
        trace!("bus tx {} bytes: {}", bytes.len(), hex::encode(bytes));
        if let Some(response) = self.pump.process(bytes) {
            trace!("bus rx {} bytes queued: {}", response.len(), hex::encode(&response));
            self.rx.extend(response.iter());
        }
        Ok(())
    }

    async fn receive(&mut self, max_len: usize) -> io::Result<Bytes> {
        if self.rx.is_empty() {
            // a silent line never resolves; the caller's timeout fires
            return std::future::pending().await;
        }
        let n = max_len.min(self.rx.len());
        let chunk: Vec<u8> = self.rx.drain(..n).collect();
        Ok(Bytes::from(chunk))
    }

    fn bytes_available(&self) -> usize {
        self.rx.len()
    }
}
