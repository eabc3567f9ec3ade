//! Message flags byte.
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! +-----------+---+-------+-------+
//! | msg type  |ext| hops  |  max  |
//! |           |   | left  | hops  |
//! +-----------+---+-------+-------+
//! ```

/// Message category carried in the top three bits of the flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Direct message to a single device.
    Direct,
    /// Positive reply to a direct message.
    DirectAck,
    /// Direct follow-up of a group broadcast.
    AllLinkCleanup,
    /// Positive reply to a cleanup.
    AllLinkCleanupAck,
    /// Plain broadcast.
    Broadcast,
    /// Negative reply to a direct message.
    DirectNak,
    /// Broadcast to a group of linked responders.
    AllLinkBroadcast,
    /// Negative reply to a cleanup.
    AllLinkCleanupNak,
}

impl MessageType {
    /// Decode from the 3-bit field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => MessageType::Direct,
            0b001 => MessageType::DirectAck,
            0b010 => MessageType::AllLinkCleanup,
            0b011 => MessageType::AllLinkCleanupAck,
            0b100 => MessageType::Broadcast,
            0b101 => MessageType::DirectNak,
            0b110 => MessageType::AllLinkBroadcast,
            _ => MessageType::AllLinkCleanupNak,
        }
    }

    /// Encode to the 3-bit field.
    pub fn to_bits(self) -> u8 {
        match self {
            MessageType::Direct => 0b000,
            MessageType::DirectAck => 0b001,
            MessageType::AllLinkCleanup => 0b010,
            MessageType::AllLinkCleanupAck => 0b011,
            MessageType::Broadcast => 0b100,
            MessageType::DirectNak => 0b101,
            MessageType::AllLinkBroadcast => 0b110,
            MessageType::AllLinkCleanupNak => 0b111,
        }
    }

    /// True for replies to a direct command.
    pub fn is_direct_reply(self) -> bool {
        matches!(self, MessageType::DirectAck | MessageType::DirectNak)
    }

    /// True for either kind of broadcast.
    pub fn is_broadcast(self) -> bool {
        matches!(self, MessageType::Broadcast | MessageType::AllLinkBroadcast)
    }

    /// Short label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            MessageType::Direct => "direct",
            MessageType::DirectAck => "direct_ack",
            MessageType::AllLinkCleanup => "all_link_cleanup",
            MessageType::AllLinkCleanupAck => "all_link_cleanup_ack",
            MessageType::Broadcast => "broadcast",
            MessageType::DirectNak => "direct_nak",
            MessageType::AllLinkBroadcast => "all_link_broadcast",
            MessageType::AllLinkCleanupNak => "all_link_cleanup_nak",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Decoded flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flags {
    /// Message category.
    pub msg_type: MessageType,
    /// Whether the 14-byte data block follows.
    pub is_ext: bool,
    /// Hops remaining (0-3).
    pub hops_left: u8,
    /// Maximum hops (0-3).
    pub max_hops: u8,
}

impl Flags {
    /// Flags with the default hop counts used for outbound commands.
    pub fn new(msg_type: MessageType, is_ext: bool) -> Self {
        Flags {
            msg_type,
            is_ext,
            hops_left: 3,
            max_hops: 3,
        }
    }

    /// Decode a flags byte. Every byte value is a valid flags byte.
    pub fn from_byte(byte: u8) -> Self {
        Flags {
            msg_type: MessageType::from_bits(byte >> 5),
            is_ext: byte & 0x10 != 0,
            hops_left: (byte >> 2) & 0x03,
            max_hops: byte & 0x03,
        }
    }

    /// Encode to a flags byte.
    pub fn to_byte(&self) -> u8 {
        (self.msg_type.to_bits() << 5)
            | (u8::from(self.is_ext) << 4)
            | ((self.hops_left & 0x03) << 2)
            | (self.max_hops & 0x03)
    }
}
