//! Re-assembly of packets split across several indications.
//!
//! Every fragment starts with a header byte whose bit 0 marks the final
//! fragment. Header bytes are stripped; the final fragment's header is put
//! back in front of the assembled packet.

use crate::error::ReassemblyError;

/// Default upper bound of an assembled packet.
pub const DEFAULT_MAX_PACKET_LEN: usize = 16 * 1024;

const FINAL_FRAGMENT: u8 = 0b0000_0001;

/// Per-connection fragment buffer.
#[derive(Debug)]
pub struct Reassembler {
    buffer: Vec<u8>,
    max_len: usize,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKET_LEN)
    }
}

impl Reassembler {
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_len,
        }
    }

    /// Add one indication. Returns the complete packet once the final
    /// fragment arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::EmptyFragment`] for an empty indication, or
    /// [`ReassemblyError::Overflow`] when the packet would exceed the size
    /// limit. The buffered fragments are discarded on overflow.
    pub fn push(&mut self, fragment: &[u8]) -> Result<Option<Vec<u8>>, ReassemblyError> {
        let Some((&header, body)) = fragment.split_first() else {
            return Err(ReassemblyError::EmptyFragment);
        };
        // +1 for the header byte put back on completion.
        if self.buffer.len() + body.len() + 1 > self.max_len {
            self.buffer.clear();
            return Err(ReassemblyError::Overflow {
                limit: self.max_len,
            });
        }
        self.buffer.extend_from_slice(body);
        if header & FINAL_FRAGMENT == 0 {
            return Ok(None);
        }
        let mut packet = Vec::with_capacity(self.buffer.len() + 1);
        packet.push(header);
        packet.append(&mut self.buffer);
        Ok(Some(packet))
    }

    /// Drop any partially received packet.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }
}
