//! Insteon message framing
//!
//! Addresses, flags, and the fixed-offset binary frame used between the
//! gateway and the modem transport. Command bytes are carried, not
//! interpreted: the same cmd1 can mean different operations depending on the
//! message category and the extended bit, and that decision belongs to the
//! device engine.
//!
//! # Example
//!
//! ```rust
//! use insteon_message::{Address, Message, MessageType, CMD_ON};
//!
//! let modem = Address::new(0x44, 0x85, 0x11);
//! let light = "01.02.03".parse::<Address>().unwrap();
//!
//! let msg = Message::standard(modem, light, MessageType::Direct, CMD_ON, 0xFF);
//! let bytes = msg.encode();
//! assert_eq!(Message::decode(&bytes).unwrap(), msg);
//! ```

mod address;
mod codec;
mod constants;
mod error;
mod flags;

pub use address::*;
pub use codec::*;
pub use constants::*;
pub use error::*;
pub use flags::*;
