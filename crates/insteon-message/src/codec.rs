//! Message encoding and decoding.
//!
//! ## Frame Format
//!
//! | Field   | Size (bytes)     | Description                                  |
//! |---------|------------------|----------------------------------------------|
//! | flags   | 1                | Category, extended bit, hop counts.          |
//! | from    | 3                | Source address.                              |
//! | to      | 3                | Destination device or group address.         |
//! | cmd1    | 1                | Command byte 1.                              |
//! | cmd2    | 1                | Command byte 2.                              |
//! | data    | 14 (if extended) | Extended data block, present iff ext bit.    |
//!
//! The codec preserves category and extended bit losslessly and does not
//! interpret the command bytes.

use bytes::BytesMut;

use crate::{
    Address, Flags, FormatError, FormatResult, MessageType, ADDRESS_SIZE, EXTENDED_FRAME_SIZE,
    EXT_DATA_SIZE, STANDARD_FRAME_SIZE,
};

/// An inbound or outbound protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Message {
    from: Address,
    to: Address,
    flags: Flags,
    cmd1: u8,
    cmd2: u8,
    data: Option<[u8; EXT_DATA_SIZE]>,
}

impl Message {
    /// Build a standard (non-extended) message.
    pub fn standard(from: Address, to: Address, msg_type: MessageType, cmd1: u8, cmd2: u8) -> Self {
        Message {
            from,
            to,
            flags: Flags::new(msg_type, false),
            cmd1,
            cmd2,
            data: None,
        }
    }

    /// Build an extended message carrying a 14-byte data block.
    pub fn extended(
        from: Address,
        to: Address,
        msg_type: MessageType,
        cmd1: u8,
        cmd2: u8,
        data: [u8; EXT_DATA_SIZE],
    ) -> Self {
        Message {
            from,
            to,
            flags: Flags::new(msg_type, true),
            cmd1,
            cmd2,
            data: Some(data),
        }
    }

    /// Build an extended message from a short data prefix, zero padded.
    pub fn extended_from_slice(
        from: Address,
        to: Address,
        msg_type: MessageType,
        cmd1: u8,
        cmd2: u8,
        prefix: &[u8],
    ) -> FormatResult<Self> {
        if prefix.len() > EXT_DATA_SIZE {
            return Err(FormatError::InvalidDataLength {
                expected: EXT_DATA_SIZE,
                actual: prefix.len(),
            });
        }
        let mut data = [0u8; EXT_DATA_SIZE];
        data[..prefix.len()].copy_from_slice(prefix);
        Ok(Message::extended(from, to, msg_type, cmd1, cmd2, data))
    }

    /// Build a message from explicit flags. The data block must be present
    /// exactly when `flags.is_ext` is set.
    pub fn with_flags(
        from: Address,
        to: Address,
        flags: Flags,
        cmd1: u8,
        cmd2: u8,
        data: Option<[u8; EXT_DATA_SIZE]>,
    ) -> FormatResult<Self> {
        match (flags.is_ext, data.is_some()) {
            (true, false) => Err(FormatError::InvalidDataLength {
                expected: EXT_DATA_SIZE,
                actual: 0,
            }),
            (false, true) => Err(FormatError::InvalidDataLength {
                expected: 0,
                actual: EXT_DATA_SIZE,
            }),
            _ => Ok(Message {
                from,
                to,
                flags,
                cmd1,
                cmd2,
                data,
            }),
        }
    }

    /// Source address.
    pub fn from(&self) -> Address {
        self.from
    }

    /// Destination address.
    pub fn to(&self) -> Address {
        self.to
    }

    /// Flags.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Message category.
    pub fn msg_type(&self) -> MessageType {
        self.flags.msg_type
    }

    /// Whether this is an extended message.
    pub fn is_ext(&self) -> bool {
        self.flags.is_ext
    }

    /// Command byte 1.
    pub fn cmd1(&self) -> u8 {
        self.cmd1
    }

    /// Command byte 2.
    pub fn cmd2(&self) -> u8 {
        self.cmd2
    }

    /// Extended data block, if present.
    pub fn data(&self) -> Option<&[u8; EXT_DATA_SIZE]> {
        self.data.as_ref()
    }

    /// Group number for broadcasts addressed to `00.00.gg`.
    pub fn group(&self) -> Option<u8> {
        if self.msg_type().is_broadcast() {
            self.to.as_group()
        } else {
            None
        }
    }

    /// Fill D14 with the extended-message checksum some devices require:
    /// the two's complement of `cmd1 + cmd2 + D1..D13`.
    pub fn with_checksum(mut self) -> Self {
        if let Some(ref mut data) = self.data {
            let sum = data[..EXT_DATA_SIZE - 1]
                .iter()
                .fold(self.cmd1.wrapping_add(self.cmd2), |acc, b| acc.wrapping_add(*b));
            data[EXT_DATA_SIZE - 1] = (!sum).wrapping_add(1);
        }
        self
    }

    /// Frame length implied by a flags byte.
    pub fn frame_len(flags_byte: u8) -> usize {
        if Flags::from_byte(flags_byte).is_ext {
            EXTENDED_FRAME_SIZE
        } else {
            STANDARD_FRAME_SIZE
        }
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(EXTENDED_FRAME_SIZE);
        buf.push(self.flags.to_byte());
        buf.extend_from_slice(self.from.as_bytes());
        buf.extend_from_slice(self.to.as_bytes());
        buf.push(self.cmd1);
        buf.push(self.cmd2);
        if let Some(ref data) = self.data {
            buf.extend_from_slice(data);
        }
        buf
    }

    /// Decode one complete frame.
    pub fn decode(frame: &[u8]) -> FormatResult<Self> {
        if frame.is_empty() {
            return Err(FormatError::FrameTooShort {
                expected: STANDARD_FRAME_SIZE,
                actual: 0,
            });
        }

        let flags = Flags::from_byte(frame[0]);
        let expected = Message::frame_len(frame[0]);
        if frame.len() < expected {
            return Err(FormatError::FrameTooShort {
                expected,
                actual: frame.len(),
            });
        }
        if frame.len() > expected {
            return Err(FormatError::FrameTooLong {
                expected,
                actual: frame.len(),
            });
        }

        let mut offset = 1;
        let from = Address::from_slice(&frame[offset..]).ok_or(FormatError::FrameTooShort {
            expected,
            actual: frame.len(),
        })?;
        offset += ADDRESS_SIZE;
        let to = Address::from_slice(&frame[offset..]).ok_or(FormatError::FrameTooShort {
            expected,
            actual: frame.len(),
        })?;
        offset += ADDRESS_SIZE;
        let cmd1 = frame[offset];
        let cmd2 = frame[offset + 1];
        offset += 2;

        let data = if flags.is_ext {
            let mut block = [0u8; EXT_DATA_SIZE];
            block.copy_from_slice(&frame[offset..offset + EXT_DATA_SIZE]);
            Some(block)
        } else {
            None
        };

        Ok(Message {
            from,
            to,
            flags,
            cmd1,
            cmd2,
            data,
        })
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} {}{} cmd {:#04x} {:#04x}",
            self.from,
            self.to,
            self.flags.msg_type,
            if self.flags.is_ext { " ext" } else { "" },
            self.cmd1,
            self.cmd2
        )
    }
}

/// Accumulates bytes from a serial stream and yields complete messages.
///
/// The frame length is known from the flags byte, so any byte sequence
/// splits into frames. A frame that fails to decode is consumed and its
/// error returned, so the next call resumes at the following frame.
#[derive(Debug, Default)]
pub struct MessageReader {
    buffer: BytesMut,
}

impl MessageReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        MessageReader {
            buffer: BytesMut::with_capacity(EXTENDED_FRAME_SIZE * 2),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next message. Returns `Ok(None)` if more data is
    /// needed.
    pub fn next_message(&mut self) -> FormatResult<Option<Message>> {
        let Some(&first) = self.buffer.first() else {
            return Ok(None);
        };
        let len = Message::frame_len(first);
        if self.buffer.len() < len {
            return Ok(None);
        }
        let frame = self.buffer.split_to(len);
        Message::decode(&frame).map(Some)
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
