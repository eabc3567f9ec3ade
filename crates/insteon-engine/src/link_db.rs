//! Device link databases.
//!
//! Each device keeps a table of the links it participates in: as controller
//! of a group (it sends the broadcasts) or as responder (it reacts to
//! another device's broadcasts). The engine only needs a narrow view of that
//! table, expressed by [`LinkDatabase`]. [`MemoryLinkDb`] keeps it in memory.

use insteon_message::Address;
use tracing::debug;

use crate::error::EngineError;

/// One entry in a link database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkRecord {
    /// The other device of the link.
    pub remote: Address,
    /// Group number.
    pub group: u8,
    /// True if the owner controls the group.
    pub is_controller: bool,
    /// Link data bytes (responder on-level, ramp rate, button).
    pub data: [u8; 3],
}

/// Link database collaborator used by devices.
pub trait LinkDatabase: std::fmt::Debug {
    /// Find a link.
    fn find(&self, remote: Address, group: u8, is_controller: bool) -> Option<&LinkRecord>;

    /// Add or update a link where the owner is the controller.
    fn add_ctrl_of(&mut self, remote: Address, group: u8, data: [u8; 3]) -> Result<(), EngineError>;

    /// Add or update a link where the owner is a responder.
    fn add_resp_of(&mut self, remote: Address, group: u8, data: [u8; 3]) -> Result<(), EngineError>;

    /// Change counter last reported by the device, if known.
    fn delta(&self) -> Option<u8>;

    /// Bring the database up to date with the device's change counter.
    fn refresh(&mut self, delta: u8) -> Result<(), EngineError>;

    /// All records.
    fn records(&self) -> Vec<LinkRecord>;
}

/// In-memory link database.
#[derive(Debug, Clone, Default)]
pub struct MemoryLinkDb {
    records: Vec<LinkRecord>,
    delta: Option<u8>,
}

impl MemoryLinkDb {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn upsert(&mut self, record: LinkRecord) {
        let existing = self.records.iter_mut().find(|r| {
            r.remote == record.remote
                && r.group == record.group
                && r.is_controller == record.is_controller
        });
        match existing {
            Some(r) => r.data = record.data,
            None => self.records.push(record),
        }
        self.delta = Some(self.delta.map_or(0, |d| d.wrapping_add(1)));
    }
}

impl LinkDatabase for MemoryLinkDb {
    fn find(&self, remote: Address, group: u8, is_controller: bool) -> Option<&LinkRecord> {
        self.records
            .iter()
            .find(|r| r.remote == remote && r.group == group && r.is_controller == is_controller)
    }

    fn add_ctrl_of(&mut self, remote: Address, group: u8, data: [u8; 3]) -> Result<(), EngineError> {
        debug!("link db: controller of {} group {}", remote, group);
        self.upsert(LinkRecord {
            remote,
            group,
            is_controller: true,
            data,
        });
        Ok(())
    }

    fn add_resp_of(&mut self, remote: Address, group: u8, data: [u8; 3]) -> Result<(), EngineError> {
        debug!("link db: responder of {} group {}", remote, group);
        self.upsert(LinkRecord {
            remote,
            group,
            is_controller: false,
            data,
        });
        Ok(())
    }

    fn delta(&self) -> Option<u8> {
        self.delta
    }

    fn refresh(&mut self, delta: u8) -> Result<(), EngineError> {
        debug!("link db: refreshed at delta {}", delta);
        self.delta = Some(delta);
        Ok(())
    }

    fn records(&self) -> Vec<LinkRecord> {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEM: Address = Address::new(0x44, 0x85, 0x11);

    #[test]
    fn test_add_and_find() {
        let mut db = MemoryLinkDb::new();
        db.add_ctrl_of(MODEM, 1, [0, 0, 0]).unwrap();
        db.add_resp_of(MODEM, 1, [0xFF, 0x1F, 0x01]).unwrap();

        assert_eq!(db.len(), 2);
        assert!(db.find(MODEM, 1, true).is_some());
        assert_eq!(db.find(MODEM, 1, false).unwrap().data, [0xFF, 0x1F, 0x01]);
        assert!(db.find(MODEM, 2, true).is_none());
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut db = MemoryLinkDb::new();
        db.add_ctrl_of(MODEM, 1, [0, 0, 0]).unwrap();
        db.add_ctrl_of(MODEM, 1, [1, 2, 3]).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.records()[0].data, [1, 2, 3]);
    }

    #[test]
    fn test_refresh_records_delta() {
        let mut db = MemoryLinkDb::new();
        assert_eq!(db.delta(), None);
        db.refresh(0x42).unwrap();
        assert_eq!(db.delta(), Some(0x42));
    }
}
