//! TLV parameter blocks and packet framing.
//!
//! Every parameter is `id:u8`, `length:u24 LE`, then `length` value bytes.

use crate::error::{EncodeError, ParseError};

/// Header byte of an outbound request: single, complete packet.
pub const REQUEST_HEADER: u8 = 0b0000_0011;

/// Size of the fixed packet header (header, service, message ID, count).
pub const PACKET_HEADER_LEN: usize = 5;

const MAX_PARAMETER_LEN: usize = 0x00FF_FFFF;

/// Bounds-checked little-endian cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Truncated`] when fewer than `n` bytes remain.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        if self.remaining() < n {
            return Err(ParseError::Truncated {
                offset: self.offset,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    /// Consume everything left.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.offset..];
        self.offset = self.buf.len();
        slice
    }

    /// # Errors
    ///
    /// Returns [`ParseError::Truncated`] on buffer underrun.
    pub fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    /// # Errors
    ///
    /// Returns [`ParseError::Truncated`] on buffer underrun.
    pub fn u16_le(&mut self) -> Result<u16, ParseError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// # Errors
    ///
    /// Returns [`ParseError::Truncated`] on buffer underrun.
    pub fn u24_le(&mut self) -> Result<u32, ParseError> {
        let bytes = self.take(3)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }

    /// # Errors
    ///
    /// Returns [`ParseError::Truncated`] on buffer underrun.
    pub fn u32_le(&mut self) -> Result<u32, ParseError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// # Errors
    ///
    /// Returns [`ParseError::Truncated`] on buffer underrun.
    pub fn f32_le(&mut self) -> Result<f32, ParseError> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// A parameter block whose value has not been decoded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawParameter<'a> {
    pub id: u8,
    pub value: &'a [u8],
}

/// Split `payload` into `count` parameter blocks.
///
/// # Errors
///
/// Returns [`ParseError::Truncated`] when a block header or value runs past
/// the end of the payload.
pub fn read_blocks(count: u8, payload: &[u8]) -> Result<Vec<RawParameter<'_>>, ParseError> {
    let mut reader = Reader::new(payload);
    let mut blocks = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let id = reader.u8()?;
        let len = reader.u24_le()? as usize;
        let value = reader.take(len)?;
        blocks.push(RawParameter { id, value });
    }
    Ok(blocks)
}

/// Builds an outbound request packet.
#[derive(Debug, Clone)]
pub struct PacketWriter {
    service_id: u8,
    message_id: u16,
    parameters: Vec<(u8, Vec<u8>)>,
}

impl PacketWriter {
    #[must_use]
    pub fn new(service_id: u8, message_id: u16) -> Self {
        Self {
            service_id,
            message_id,
            parameters: Vec::new(),
        }
    }

    /// Append a parameter; blocks are written in insertion order.
    #[must_use]
    pub fn parameter(mut self, id: u8, value: impl Into<Vec<u8>>) -> Self {
        self.parameters.push((id, value.into()));
        self
    }

    /// Append a parameter only when `value` is present.
    #[must_use]
    pub fn optional(self, id: u8, value: Option<impl Into<Vec<u8>>>) -> Self {
        match value {
            Some(value) => self.parameter(id, value),
            None => self,
        }
    }

    /// Serialize the packet.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooManyParameters`] or
    /// [`EncodeError::ParameterTooLong`] when the request cannot be framed.
    pub fn finish(self) -> Result<Vec<u8>, EncodeError> {
        let count = u8::try_from(self.parameters.len())
            .map_err(|_| EncodeError::TooManyParameters(self.parameters.len()))?;

        let body_len: usize = self.parameters.iter().map(|(_, v)| 4 + v.len()).sum();
        let mut packet = Vec::with_capacity(PACKET_HEADER_LEN + body_len);
        packet.push(REQUEST_HEADER);
        packet.push(self.service_id);
        packet.extend_from_slice(&self.message_id.to_le_bytes());
        packet.push(count);

        for (id, value) in self.parameters {
            if value.len() > MAX_PARAMETER_LEN {
                return Err(EncodeError::ParameterTooLong {
                    id,
                    len: value.len(),
                });
            }
            // Checked against the 24-bit limit above.
            #[allow(clippy::cast_possible_truncation)]
            let len = (value.len() as u32).to_le_bytes();
            packet.push(id);
            packet.extend_from_slice(&len[..3]);
            packet.extend_from_slice(&value);
        }
        Ok(packet)
    }
}
