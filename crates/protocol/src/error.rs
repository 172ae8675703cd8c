//! Protocol error types.

/// Reasons an inbound packet or payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The buffer ended before a field could be read.
    #[error("buffer underrun: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        /// Offset at which the read started.
        offset: usize,
        /// Bytes required by the read.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// The packet is shorter than the 5-byte packet header.
    #[error("packet of {0} bytes is shorter than the packet header")]
    ShortPacket(usize),

    /// No codec is registered for the service ID.
    #[error("unknown service id {0:#04x}")]
    UnknownService(u8),

    /// The service does not define the message ID.
    #[error("unknown message id {message_id:#06x} for service {service}")]
    UnknownMessage {
        /// Name of the service the packet was routed to.
        service: &'static str,
        /// The message ID found in the packet.
        message_id: u16,
    },
}

/// Reasons an outbound request could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The message is not a writable message of the target service.
    #[error("message {message} is not supported by service {service}")]
    UnsupportedMessage {
        /// Name of the request message.
        message: &'static str,
        /// Name of the service asked to encode it.
        service: &'static str,
    },

    /// No service owns the message name.
    #[error("no service owns message {0}")]
    UnknownMessage(&'static str),

    /// A parameter value does not fit the 24-bit length field.
    #[error("parameter {id:#04x} is {len} bytes, above the 24-bit length limit")]
    ParameterTooLong {
        /// Parameter ID.
        id: u8,
        /// Value length in bytes.
        len: usize,
    },

    /// A request carries more parameters than the 1-byte count allows.
    #[error("request carries {0} parameters, at most 255 are allowed")]
    TooManyParameters(usize),

    /// A request field is outside its allowed range.
    #[error("invalid value for {field}: {reason}")]
    InvalidParameter {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable reason.
        reason: &'static str,
    },
}

/// Reasons a fragment could not be added to the reassembly buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReassemblyError {
    /// An indication carried no bytes at all.
    #[error("received an empty fragment")]
    EmptyFragment,

    /// The buffered fragments exceed the configured packet size limit.
    #[error("reassembled packet exceeds {limit} bytes")]
    Overflow {
        /// Configured size limit.
        limit: usize,
    },
}
