//! In-process event signals.
//!
//! A [`Signal`] is owned by the producer (one per device) and delivers each
//! event synchronously to its subscribers in registration order. Every
//! subscriber runs even when an earlier one fails; the failures are
//! returned to the emitter so it can decide how far they spread.

use crate::error::SignalError;

/// Handle returned by [`Signal::connect`], used to disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

type Slot<E> = Box<dyn FnMut(&E) -> Result<(), SignalError>>;

/// A typed observer list.
pub struct Signal<E> {
    slots: Vec<(SlotId, Slot<E>)>,
    next_id: u64,
}

impl<E> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.slots.len())
            .finish()
    }
}

impl<E> Signal<E> {
    /// Create a signal with no subscribers.
    pub fn new() -> Self {
        Signal {
            slots: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a subscriber. It is called after every subscriber already
    /// connected.
    pub fn connect<F>(&mut self, slot: F) -> SlotId
    where
        F: FnMut(&E) -> Result<(), SignalError> + 'static,
    {
        let id = SlotId(self.next_id);
        self.next_id += 1;
        self.slots.push((id, Box::new(slot)));
        id
    }

    /// Remove a subscriber. Returns false if it was not connected.
    pub fn disconnect(&mut self, id: SlotId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(slot_id, _)| *slot_id != id);
        self.slots.len() != before
    }

    /// Number of connected subscribers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if nothing is connected.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Deliver an event to every subscriber.
    pub fn emit(&mut self, event: &E) -> Result<(), SignalError> {
        let mut failures = Vec::new();
        for (_, slot) in self.slots.iter_mut() {
            if let Err(err) = slot(event) {
                failures.push(err.0);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SignalError(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_delivery_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut signal = Signal::<u8>::new();
        for tag in ["a", "b", "c"] {
            let seen = Rc::clone(&seen);
            signal.connect(move |value: &u8| {
                seen.borrow_mut().push(format!("{tag}{value}"));
                Ok(())
            });
        }

        signal.emit(&7).unwrap();
        assert_eq!(*seen.borrow(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn test_failure_does_not_stop_later_subscribers() {
        let count = Rc::new(RefCell::new(0));
        let mut signal = Signal::<()>::new();
        signal.connect(|_| Err(SignalError::new("first broke")));
        {
            let count = Rc::clone(&count);
            signal.connect(move |_| {
                *count.borrow_mut() += 1;
                Ok(())
            });
        }

        let err = signal.emit(&()).unwrap_err();
        assert_eq!(err.0, "first broke");
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_disconnect() {
        let mut signal = Signal::<()>::new();
        let id = signal.connect(|_| Err(SignalError::new("gone")));
        assert_eq!(signal.len(), 1);
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        assert!(signal.is_empty());
        assert!(signal.emit(&()).is_ok());
    }
}
