use serde::{Deserialize, Serialize};
use std::fmt;
use std::ptr::NonNull;

use crate::CallSite;

/// Opaque handle for a tracked block's location.
///
/// The tracker only ever compares addresses; it never dereferences them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(usize);

impl Address {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    pub(crate) fn as_ptr(self) -> Option<NonNull<u8>> {
        NonNull::new(self.0 as *mut u8)
    }
}

impl<T> From<NonNull<T>> for Address {
    fn from(ptr: NonNull<T>) -> Self {
        Self(ptr.as_ptr() as usize)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Lifecycle state of a tracked block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockState {
    Live,
    Released,
}

/// Tracker operation that produced or last touched a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Allocate,
    ZeroAllocate,
    Resize,
    ResizeArray,
    Release,
}

impl Operation {
    pub const fn name(self) -> &'static str {
        match self {
            Operation::Allocate => "allocate",
            Operation::ZeroAllocate => "zero_allocate",
            Operation::Resize => "resize",
            Operation::ResizeArray => "resize_array",
            Operation::Release => "release",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bookkeeping entry for one tracked block.
///
/// `address` is the lookup key. A resize re-keys the record in place instead of creating a
/// second one, so a logical block keeps one record for its whole life.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    address: Address,
    size: usize,
    state: BlockState,
    operation: Operation,
    call_site: CallSite,
}

impl BlockRecord {
    pub fn live(address: Address, size: usize, operation: Operation, call_site: CallSite) -> Self {
        Self {
            address,
            size,
            state: BlockState::Live,
            operation,
            call_site,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == BlockState::Live
    }

    /// Operation that produced or last touched this block.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Attribution of the most recent operation on this block.
    pub fn call_site(&self) -> &CallSite {
        &self.call_site
    }

    pub(crate) fn mark_released(&mut self, call_site: CallSite) {
        self.state = BlockState::Released;
        self.operation = Operation::Release;
        self.call_site = call_site;
    }

    /// Moves the record to the block a resize returned. The block is live again even if it
    /// had been released, since the caller is still using it.
    pub(crate) fn rekey(
        &mut self,
        address: Address,
        size: usize,
        operation: Operation,
        call_site: CallSite,
    ) {
        self.address = address;
        self.size = size;
        self.state = BlockState::Live;
        self.operation = operation;
        self.call_site = call_site;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_displays_as_hex() {
        assert_eq!(Address::new(0x1000).to_string(), "0x1000");
        assert_eq!(Address::new(255).to_string(), "0xff");
    }

    #[test]
    fn test_address_from_pointer() {
        let value = 7u64;
        let ptr = NonNull::from(&value);
        assert_eq!(Address::from(ptr).get(), &value as *const u64 as usize);
    }

    #[test]
    fn test_release_restamps_record() {
        let mut record = BlockRecord::live(
            Address::new(0x10),
            32,
            Operation::ZeroAllocate,
            CallSite::new("a.rs", 1),
        );
        assert!(record.is_live());

        record.mark_released(CallSite::new("b.rs", 2));
        assert_eq!(record.state(), BlockState::Released);
        assert_eq!(record.operation(), Operation::Release);
        assert_eq!(record.call_site().to_string(), "b.rs:2");
        assert_eq!(record.size(), 32);
    }

    #[test]
    fn test_rekey_moves_record_and_revives_it() {
        let mut record =
            BlockRecord::live(Address::new(0x10), 8, Operation::Allocate, CallSite::new("a.rs", 1));
        record.mark_released(CallSite::new("a.rs", 2));

        record.rekey(
            Address::new(0x20),
            16,
            Operation::Resize,
            CallSite::new("a.rs", 3),
        );
        assert_eq!(record.address(), Address::new(0x20));
        assert_eq!(record.size(), 16);
        assert!(record.is_live());
        assert_eq!(record.operation(), Operation::Resize);
    }

    #[test]
    fn test_operation_names_match_serde() {
        for op in [
            Operation::Allocate,
            Operation::ZeroAllocate,
            Operation::Resize,
            Operation::ResizeArray,
            Operation::Release,
        ] {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.name()));
        }
    }
}
