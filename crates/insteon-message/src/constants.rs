//! Protocol constants
//!
//! Command codes and sizes used by the Insteon standard and extended
//! messages. The same cmd1 value can mean different things depending on the
//! message category and the extended bit, so these are only names for the
//! byte values; interpretation belongs to the device engine.

// ============================================================================
// Frame Sizes
// ============================================================================

/// Size of an address on the wire.
pub const ADDRESS_SIZE: usize = 3;
/// Size of the extended data block.
pub const EXT_DATA_SIZE: usize = 14;
/// Standard frame: flags + from + to + cmd1 + cmd2.
pub const STANDARD_FRAME_SIZE: usize = 1 + ADDRESS_SIZE * 2 + 2;
/// Extended frame: standard frame + data block.
pub const EXTENDED_FRAME_SIZE: usize = STANDARD_FRAME_SIZE + EXT_DATA_SIZE;

// ============================================================================
// Command Codes (cmd1)
// ============================================================================

/// Broadcast cleanup report sent after a group broadcast.
pub const CMD_LINK_CLEANUP_REPORT: u8 = 0x06;
/// Light on (cmd2 = level).
pub const CMD_ON: u8 = 0x11;
/// Light on fast (cmd2 = level).
pub const CMD_ON_FAST: u8 = 0x12;
/// Light off.
pub const CMD_OFF: u8 = 0x13;
/// Light off fast.
pub const CMD_OFF_FAST: u8 = 0x14;
/// Start a manual level change (cmd2 0 = down, 1 = up).
pub const CMD_START_MANUAL_CHANGE: u8 = 0x17;
/// Stop a manual level change.
pub const CMD_STOP_MANUAL_CHANGE: u8 = 0x18;
/// Status request; the ack's cmd2 is the level, cmd1 the link-db delta.
pub const CMD_STATUS_REQUEST: u8 = 0x19;
/// Instant change to the level in cmd2 (also used for instant off).
pub const CMD_INSTANT_CHANGE: u8 = 0x21;
/// Standard: light on at ramp rate. Extended: set configuration.
pub const CMD_ON_AT_RAMP_RATE: u8 = 0x2E;
/// Extended-set alias for [`CMD_ON_AT_RAMP_RATE`].
pub const CMD_EXTENDED_SET: u8 = 0x2E;
/// Standard: light off at ramp rate. Extended: read/write link database.
pub const CMD_OFF_AT_RAMP_RATE: u8 = 0x2F;
/// Trigger an all-link scene on the device (extended).
pub const CMD_TRIGGER_SCENE: u8 = 0x30;

// ============================================================================
// Extended-Set Parameters
// ============================================================================

/// Extended-set sub-command selecting the default on-level.
pub const EXT_SET_ON_LEVEL: u8 = 0x06;

// ============================================================================
// Levels
// ============================================================================

/// Full brightness.
pub const LEVEL_FULL: u8 = 0xFF;
/// Off.
pub const LEVEL_OFF: u8 = 0x00;
