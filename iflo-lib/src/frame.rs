use crate::command::CommandCode;
use crate::constants::*;
use crate::error::PumpError;
use bytes::Bytes;
use num_enum::FromPrimitive;

/// One complete wire-format message.
///
/// On the wire: `FF 00 FF A5 VER DST SRC CMD LEN PAYLOAD.. CHKHI CHKLO`,
/// where the checksum is the 16-bit wrapping sum of every byte from the
/// 0xA5 lead through the last payload byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: u8,
    pub destination: u8,
    pub source: u8,
    pub command: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(destination: u8, source: u8, command: u8, payload: Bytes) -> Self {
        Frame {
            version: PROTOCOL_VERSION,
            destination,
            source,
            command,
            payload,
        }
    }

    pub fn command_code(&self) -> CommandCode {
        CommandCode::from_primitive(self.command)
    }

    /// Total on-wire length of this frame
    pub fn encoded_len(&self) -> usize {
        MIN_FRAME_LEN + self.payload.len()
    }

    /// Encode into a caller-provided buffer, returning the number of bytes
    /// written. Fails with `BufferTooSmall` when the buffer cannot hold the
    /// whole frame; no partial frame is ever written.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, PumpError> {
        if self.payload.len() > u8::MAX as usize {
            return Err(PumpError::InvalidPayload(format!(
                "payload of {} bytes exceeds the 1-byte length field",
                self.payload.len()
            )));
        }
        let needed = self.encoded_len();
        if buf.len() < needed {
            return Err(PumpError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }

        buf[..4].copy_from_slice(&PREAMBLE);
        buf[IDX_VERSION] = self.version;
        buf[IDX_DST] = self.destination;
        buf[IDX_SRC] = self.source;
        buf[IDX_CMD] = self.command;
        buf[IDX_LEN] = self.payload.len() as u8;
        buf[IDX_PAYLOAD..IDX_PAYLOAD + self.payload.len()].copy_from_slice(&self.payload);

        let sum = checksum(&buf[..needed]);
        buf[needed - 2] = (sum >> 8) as u8;
        buf[needed - 1] = (sum & 0xFF) as u8;
        Ok(needed)
    }

    /// Allocating convenience encoder.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = vec![0u8; self.encoded_len()];
        // cannot fail: the buffer is sized to fit
        let n = self
            .encode_into(&mut buf)
            .expect("freshly sized buffer rejected");
        debug_assert_eq!(n, buf.len());
        Bytes::from(buf)
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = PumpError;

    /// Parse a frame from a buffer that begins at a preamble. Validates the
    /// declared length and the checksum; bytes past the frame are ignored.
    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        if buf.len() < MIN_FRAME_LEN {
            return Err(PumpError::Truncated {
                expected: MIN_FRAME_LEN,
                actual: buf.len(),
            });
        }
        if buf[..4] != PREAMBLE {
            return Err(PumpError::NoPreamble(buf.len()));
        }
        let total = frame_length(buf);
        if buf.len() < total {
            return Err(PumpError::Truncated {
                expected: total,
                actual: buf.len(),
            });
        }
        let frame = &buf[..total];
        let computed = checksum(frame);
        let received = u16::from_be_bytes([frame[total - 2], frame[total - 1]]);
        if computed != received {
            return Err(PumpError::ChecksumMismatch { computed, received });
        }
        Ok(Frame {
            version: frame[IDX_VERSION],
            destination: frame[IDX_DST],
            source: frame[IDX_SRC],
            command: frame[IDX_CMD],
            payload: Bytes::copy_from_slice(&frame[IDX_PAYLOAD..total - 2]),
        })
    }
}

/// Locate the first preamble in a buffer.
///
/// Pure sync-byte search: no checksum or field validation. Serial lines
/// prepend noise and partial bytes from prior transmissions, so the decoder
/// resynchronizes here rather than assuming byte-0 alignment.
pub fn find_frame(buf: &[u8]) -> Option<usize> {
    if buf.len() < MIN_FRAME_LEN {
        return None;
    }
    buf.windows(PREAMBLE.len()).position(|w| w == PREAMBLE)
}

/// Total frame length declared by a buffer known to start at a preamble.
///
/// The caller must ensure at least this many bytes are present before
/// trusting header fields beyond the length byte.
pub fn frame_length(buf: &[u8]) -> usize {
    MIN_FRAME_LEN + buf[IDX_LEN] as usize
}

/// 16-bit wrapping sum over the checksummed region of a complete frame
/// (the 0xA5 lead through the last payload byte).
pub fn checksum(frame: &[u8]) -> u16 {
    frame[IDX_LEAD..frame.len() - 2]
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
}

/// Recompute the checksum of a complete frame and compare against its
/// trailing two bytes. Returns false, never panics, on short input.
pub fn verify_checksum(frame: &[u8]) -> bool {
    if frame.len() < MIN_FRAME_LEN {
        return false;
    }
    let received = u16::from_be_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
    checksum(frame) == received
}

/// Scan a buffer for the first valid frame: locate the preamble, check the
/// declared length fits, verify the checksum, and parse. Returns the frame
/// and the offset just past it, so the caller can re-scan the tail for a
/// second frame.
pub fn extract_frame(buf: &[u8]) -> Result<(Frame, usize), PumpError> {
    let start = find_frame(buf).ok_or(PumpError::NoPreamble(buf.len()))?;
    let candidate = &buf[start..];
    if candidate.len() < MIN_FRAME_LEN {
        return Err(PumpError::Truncated {
            expected: MIN_FRAME_LEN,
            actual: candidate.len(),
        });
    }
    let total = frame_length(candidate);
    if candidate.len() < total {
        return Err(PumpError::Truncated {
            expected: total,
            actual: candidate.len(),
        });
    }
    let frame = Frame::try_from(candidate)?;
    Ok((frame, start + total))
}
