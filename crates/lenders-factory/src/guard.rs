//! Reentrancy guard
//!
//! An operation is in flight from the moment its caller enters until it
//! returns. While it is in flight:
//! - the same caller cannot start another operation, from any thread
//! - the thread holding the engine lock cannot start any operation, which
//!   catches callbacks from external asset transfers
//!
//! Both checks run before the engine lock is requested, so a rejected call
//! never blocks.

use std::collections::HashSet;
use std::thread::{self, ThreadId};

use lenders_common::{AccountId, LendingError, Result};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct GuardState {
    callers: HashSet<AccountId>,
    holder: Option<ThreadId>,
}

/// Tracks in-flight callers and the thread holding the engine lock
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    state: Mutex<GuardState>,
}

/// Marks `caller` in flight until dropped
#[must_use]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
    caller: AccountId,
}

/// Marks the current thread as engine lock holder until dropped
#[must_use]
pub struct Holding<'a> {
    guard: &'a ReentrancyGuard,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `caller` as in flight
    pub fn enter(&self, caller: AccountId) -> Result<Entered<'_>> {
        let mut state = self.state.lock();
        if state.holder == Some(thread::current().id()) || !state.callers.insert(caller) {
            return Err(LendingError::Reentrancy(caller));
        }
        Ok(Entered {
            guard: self,
            caller,
        })
    }

    /// Record that the current thread now holds the engine lock
    pub fn hold(&self) -> Holding<'_> {
        self.state.lock().holder = Some(thread::current().id());
        Holding { guard: self }
    }

    /// Whether the current thread holds the engine lock
    pub fn held_by_current_thread(&self) -> bool {
        self.state.lock().holder == Some(thread::current().id())
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().callers.len()
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard.state.lock().callers.remove(&self.caller);
    }
}

impl Drop for Holding<'_> {
    fn drop(&mut self) {
        self.guard.state.lock().holder = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lenders_common::Address;

    #[test]
    fn test_same_caller_rejected() {
        let guard = ReentrancyGuard::new();
        let alice = Address::repeat_byte(0x01);

        let entered = guard.enter(alice).unwrap();
        assert_eq!(guard.enter(alice).err(), Some(LendingError::Reentrancy(alice)));
        assert!(guard.enter(Address::repeat_byte(0x02)).is_ok());

        drop(entered);
        assert!(guard.enter(alice).is_ok());
    }

    #[test]
    fn test_holder_thread_rejected() {
        let guard = ReentrancyGuard::new();
        let alice = Address::repeat_byte(0x01);
        let bob = Address::repeat_byte(0x02);

        let _entered = guard.enter(alice).unwrap();
        let holding = guard.hold();
        assert!(guard.held_by_current_thread());
        assert_eq!(guard.enter(bob).err(), Some(LendingError::Reentrancy(bob)));

        drop(holding);
        assert!(!guard.held_by_current_thread());
        assert!(guard.enter(bob).is_ok());
    }

    #[test]
    fn test_other_threads_not_holders() {
        let guard = ReentrancyGuard::new();
        let _holding = guard.hold();

        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(!guard.held_by_current_thread());
                assert!(guard.enter(Address::repeat_byte(0x03)).is_ok());
            });
        });
        assert_eq!(guard.in_flight(), 0);
    }
}
