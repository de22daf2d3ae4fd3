//! Per-peer slot bookkeeping
//!
//! Mirrors what the engine was asked to do with each slot so that misuse is
//! rejected before it reaches the engine.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::interface::{Interface, Slot};

/// What has been done with an interface of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    /// Socket options applied
    Configured,
    /// Bound or connected
    Linked,
}

#[derive(Debug, Default)]
struct SlotState {
    interfaces: HashMap<Interface, InterfaceState>,
    /// Set by any failed configure/bind/connect, cleared only by unlink
    broken: bool,
}

#[derive(Debug, Default)]
pub(crate) struct SlotTable {
    slots: BTreeMap<Slot, SlotState>,
}

impl SlotTable {
    /// Whether `interface` of `slot` may still be configured or linked
    pub fn ensure_usable(&self, slot: Slot, interface: Interface) -> Result<()> {
        let Some(state) = self.slots.get(&slot) else {
            return Ok(());
        };

        if state.broken {
            return Err(Error::SlotBroken(slot));
        }
        if state.interfaces.get(&interface) == Some(&InterfaceState::Linked) {
            return Err(Error::InterfaceLinked { slot, interface });
        }
        if state.interfaces.keys().any(|other| !interface.compatible_with(*other)) {
            return Err(Error::InterfaceConflict { slot, interface });
        }
        Ok(())
    }

    /// Record the outcome of an engine call on `interface` of `slot`
    ///
    /// The slot is created if needed. Success moves the interface to `next`,
    /// failure breaks the whole slot.
    pub fn record<T>(
        &mut self,
        slot: Slot,
        interface: Interface,
        next: InterfaceState,
        result: Result<T>,
    ) -> Result<T> {
        let state = self.slots.entry(slot).or_default();
        match &result {
            Ok(_) => {
                state.interfaces.insert(interface, next);
            }
            Err(err) => {
                tracing::debug!(%slot, %interface, error = %err, "slot marked broken");
                state.broken = true;
            }
        }
        result
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.slots.contains_key(&slot)
    }

    pub fn remove(&mut self, slot: Slot) -> bool {
        self.slots.remove(&slot).is_some()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn state(&self, slot: Slot, interface: Interface) -> Option<InterfaceState> {
        self.slots.get(&slot)?.interfaces.get(&interface).copied()
    }

    pub fn is_broken(&self, slot: Slot) -> bool {
        self.slots.get(&slot).is_some_and(|state| state.broken)
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.slots.keys().copied().collect()
    }
}
