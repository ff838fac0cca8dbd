//! Per-address nonce bookkeeping.

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::Address;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
struct Slot {
    next: u64,
    in_flight: bool,
}

/// Next nonce for each address, plus whether a submission for it is outstanding.
///
/// Workers never see the map. They [`claim`](Self::claim) an address, which yields its
/// current nonce and marks it busy, and [`commit`](NonceClaim::commit) the claim once the
/// submission succeeded. Dropping a claim without committing leaves the nonce unchanged.
/// The lock only guards the map and is never held across an await point.
#[derive(Debug, Default)]
pub struct SequenceState {
    slots: Mutex<HashMap<Address, Slot>>,
}

impl SequenceState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `address` starting at `nonce`. Returns `false` if it was already present.
    pub fn insert(&self, address: Address, nonce: u64) -> bool {
        let mut slots = self.slots.lock();
        if slots.contains_key(&address) {
            return false;
        }
        slots.insert(address, Slot { next: nonce, in_flight: false });
        true
    }

    /// Current next nonce of `address`.
    pub fn read(&self, address: Address) -> Option<u64> {
        self.slots.lock().get(&address).map(|slot| slot.next)
    }

    /// Advances `address` by one if its next nonce still equals `expected`.
    pub fn compare_and_advance(&self, address: Address, expected: u64) -> bool {
        let mut slots = self.slots.lock();
        match slots.get_mut(&address) {
            Some(slot) if slot.next == expected => {
                slot.next += 1;
                true
            }
            _ => false,
        }
    }

    /// Claims the current nonce of `address`.
    ///
    /// Returns `None` for unknown addresses and for addresses whose previous claim is
    /// still alive.
    pub fn claim(self: &Arc<Self>, address: Address) -> Option<NonceClaim> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&address)?;
        if slot.in_flight {
            return None;
        }
        slot.in_flight = true;
        Some(NonceClaim { state: Arc::clone(self), address, nonce: slot.next })
    }

    fn release(&self, address: Address) {
        if let Some(slot) = self.slots.lock().get_mut(&address) {
            slot.in_flight = false;
        }
    }
}

/// Exclusive right to submit the current nonce of one address.
///
/// The address is released when the claim is dropped, whatever the outcome.
#[derive(Debug)]
pub struct NonceClaim {
    state: Arc<SequenceState>,
    address: Address,
    nonce: u64,
}

impl NonceClaim {
    /// The claimed nonce.
    pub const fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Records a successful submission, advancing the address by exactly one.
    pub fn commit(self) -> bool {
        self.state.compare_and_advance(self.address, self.nonce)
    }
}

impl Drop for NonceClaim {
    fn drop(&mut self) {
        self.state.release(self.address);
    }
}
