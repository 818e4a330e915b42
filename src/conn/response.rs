use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::conn::SeqWidth;
use crate::constants::{
    MSG_DETAIL_OFFSET, MSG_HEADER_SIZE, MSG_KIND_OFFSET, MSG_LEN16_OFFSET, MSG_LEN32_OFFSET,
    MSG_SEQ16_OFFSET, MSG_SEQ32_OFFSET, MSG_SYNTHETIC_BIT,
};
use crate::wire::DecodeError;

/// Reserved values of the response-type byte. Every other value is an
/// event code.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum ResponseType {
    Error = 0,
    Reply = 1,
}

/// Classification of one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Error,
    Reply,
    Event(u8),
}

/// The prologue shared by every server-to-client message, extracted before
/// routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub class: MessageClass,

    /// Error code for errors; request-specific detail otherwise.
    pub detail: u8,

    /// Set when the message was generated synthetically rather than by the
    /// server's own processing.
    pub synthetic: bool,

    /// Low bits of the sequence number, at the connection's configured
    /// width.
    pub seq_low: u64,

    /// Raw value of the tail-length field. Its denomination is per reply
    /// type; errors and events carry no tail and ignore it.
    pub tail_len_field: u32,
}

impl MessageHeader {
    pub fn parse(bytes: &[u8], width: SeqWidth) -> Result<Self, DecodeError> {
        if bytes.len() < MSG_HEADER_SIZE {
            return Err(DecodeError::TruncatedMessage { len: bytes.len() });
        }

        let kind = bytes[MSG_KIND_OFFSET];
        let class = match ResponseType::try_from(kind & !MSG_SYNTHETIC_BIT) {
            Ok(ResponseType::Error) => MessageClass::Error,
            Ok(ResponseType::Reply) => MessageClass::Reply,
            Err(_) => MessageClass::Event(kind & !MSG_SYNTHETIC_BIT),
        };

        let (seq_low, tail_len_field) = match width {
            SeqWidth::U16 => {
                let seq = u16::from_le_bytes([bytes[MSG_SEQ16_OFFSET], bytes[MSG_SEQ16_OFFSET + 1]]);
                let len = u32::from_le_bytes([
                    bytes[MSG_LEN16_OFFSET],
                    bytes[MSG_LEN16_OFFSET + 1],
                    bytes[MSG_LEN16_OFFSET + 2],
                    bytes[MSG_LEN16_OFFSET + 3],
                ]);
                (seq as u64, len)
            }
            SeqWidth::U32 => {
                let seq = u32::from_le_bytes([
                    bytes[MSG_SEQ32_OFFSET],
                    bytes[MSG_SEQ32_OFFSET + 1],
                    bytes[MSG_SEQ32_OFFSET + 2],
                    bytes[MSG_SEQ32_OFFSET + 3],
                ]);
                let len = u32::from_le_bytes([
                    bytes[MSG_LEN32_OFFSET],
                    bytes[MSG_LEN32_OFFSET + 1],
                    bytes[MSG_LEN32_OFFSET + 2],
                    bytes[MSG_LEN32_OFFSET + 3],
                ]);
                (seq as u64, len)
            }
        };

        Ok(MessageHeader {
            class,
            detail: bytes[MSG_DETAIL_OFFSET],
            synthetic: kind & MSG_SYNTHETIC_BIT != 0,
            seq_low,
            tail_len_field,
        })
    }
}
