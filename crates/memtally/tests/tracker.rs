use std::cell::{Cell, RefCell};
use std::ptr::NonNull;

use memtally::{
    call_site, Address, BlockState, CallSite, Operation, RawAllocator, Report, Reporter,
    TrackError, Tracker,
};

/// Deterministic allocator handing out synthetic, never dereferenced addresses.
#[derive(Default)]
struct MockAllocator {
    next: Cell<usize>,
    fail: Cell<bool>,
    relocate: Cell<bool>,
    released: RefCell<Vec<usize>>,
}

impl MockAllocator {
    fn relocating() -> Self {
        let alloc = Self::default();
        alloc.relocate.set(true);
        alloc
    }

    fn fresh(&self) -> Option<NonNull<u8>> {
        if self.fail.get() {
            return None;
        }
        let n = self.next.get();
        self.next.set(n + 1);
        NonNull::new((0x1000 + n * 0x100) as *mut u8)
    }
}

impl RawAllocator for MockAllocator {
    fn allocate(&self, _size: usize) -> Option<NonNull<u8>> {
        self.fresh()
    }

    fn allocate_zeroed(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        count.checked_mul(size)?;
        self.fresh()
    }

    unsafe fn resize(&self, ptr: Option<NonNull<u8>>, _new_size: usize) -> Option<NonNull<u8>> {
        if self.fail.get() {
            return None;
        }
        match ptr {
            Some(ptr) if !self.relocate.get() => Some(ptr),
            _ => self.fresh(),
        }
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        self.released.borrow_mut().push(ptr.as_ptr() as usize);
    }
}

fn untracked(address: usize) -> NonNull<u8> {
    NonNull::new(address as *mut u8).unwrap()
}

struct Discard;

impl Reporter for Discard {
    fn report(&self, _report: &Report) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

#[test]
fn test_insert_then_find() {
    let mut tracker = Tracker::new(MockAllocator::default());

    let a = tracker.allocate(100, call_site!()).unwrap();
    let b = tracker.zero_allocate(10, 4, call_site!()).unwrap();

    let record = tracker.find(a).unwrap();
    assert_eq!(record.state(), BlockState::Live);
    assert_eq!(record.size(), 100);
    assert_eq!(record.operation(), Operation::Allocate);

    let record = tracker.find(b).unwrap();
    assert_eq!(record.state(), BlockState::Live);
    assert_eq!(record.size(), 40);
    assert_eq!(record.operation(), Operation::ZeroAllocate);
}

#[test]
fn test_call_site_is_recorded_and_refreshed() {
    let mut tracker = Tracker::new(MockAllocator::default());

    let a = tracker.allocate(8, CallSite::new("alloc.c", 10)).unwrap();
    assert_eq!(tracker.find(a).unwrap().call_site().to_string(), "alloc.c:10");

    tracker.release(a, CallSite::new("free.c", 99));
    let record = tracker.find(a).unwrap();
    assert_eq!(record.call_site().source(), "free.c");
    assert_eq!(record.call_site().line(), 99);
    assert_eq!(record.operation(), Operation::Release);
}

#[test]
fn test_release_twice_keeps_single_record() {
    let mut tracker = Tracker::new(MockAllocator::default());
    let a = tracker.allocate(64, call_site!()).unwrap();

    tracker.release(a, call_site!());
    assert_eq!(tracker.find(a).unwrap().state(), BlockState::Released);
    let len = tracker.registry().len();

    tracker.release(a, call_site!());
    assert_eq!(tracker.registry().len(), len);
    assert_eq!(tracker.find(a).unwrap().state(), BlockState::Released);

    let stats = tracker.stats();
    assert_eq!(stats.releases, 2);
    assert_eq!(stats.released_bytes, 128);
    assert_eq!(stats.double_releases, 1);
}

#[test]
fn test_resize_preserves_identity_across_relocation() {
    let mut tracker = Tracker::new(MockAllocator::relocating());
    let a = tracker.allocate(16, call_site!()).unwrap();
    tracker.allocate(1, call_site!()).unwrap();
    let id = tracker.registry().find(Address::from(a)).unwrap();
    let len = tracker.registry().len();

    let b = unsafe { tracker.resize(Some(a), 256, call_site!()) }.unwrap();
    assert_ne!(a, b);

    assert_eq!(tracker.registry().len(), len);
    assert!(tracker.find(a).is_none());
    assert_eq!(tracker.registry().find(Address::from(b)), Some(id));

    let record = tracker.find(b).unwrap();
    assert_eq!(record.size(), 256);
    assert_eq!(record.operation(), Operation::Resize);
    assert_eq!(record.state(), BlockState::Live);
}

#[test]
fn test_resize_in_place_charges_net_growth_only() {
    let mut tracker = Tracker::new(MockAllocator::default());
    let a = tracker.allocate(100, call_site!()).unwrap();

    let same = unsafe { tracker.resize(Some(a), 150, call_site!()) }.unwrap();
    assert_eq!(a, same);
    let same = unsafe { tracker.resize(Some(same), 20, call_site!()) }.unwrap();

    let stats = tracker.stats();
    assert_eq!(stats.allocated_bytes, 100);
    assert_eq!(stats.resize_growth_bytes, 50);
    assert_eq!(stats.total_charged_bytes(), 150);
    assert_eq!(stats.smallest_block, Some(20));
    assert_eq!(tracker.find(same).unwrap().size(), 20);
    assert_eq!(tracker.registry().len(), 1);
}

#[test]
fn test_resize_of_untracked_block_is_fresh_allocation() {
    let mut tracker = Tracker::new(MockAllocator::relocating());

    let b = unsafe { tracker.resize(Some(untracked(0xdead0)), 32, call_site!()) }.unwrap();

    let record = tracker.find(b).unwrap();
    assert_eq!(record.size(), 32);
    assert_eq!(tracker.stats().allocations, 1);
    assert_eq!(tracker.stats().allocated_bytes, 32);
    assert_eq!(tracker.stats().resizes, 0);
}

#[test]
fn test_failures_leave_state_unchanged() {
    let mut tracker = Tracker::new(MockAllocator::default());
    let a = tracker.allocate(10, call_site!()).unwrap();
    let before_stats = *tracker.stats();
    let before_records: Vec<_> = tracker.records().cloned().collect();

    tracker.allocator().fail.set(true);
    assert_eq!(
        tracker.allocate(5, call_site!()),
        Err(TrackError::OutOfMemory { requested: 5 })
    );
    assert!(tracker.zero_allocate(2, 2, call_site!()).is_err());
    assert!(unsafe { tracker.resize(Some(a), 99, call_site!()) }.is_err());
    assert!(unsafe { tracker.resize_array(Some(a), 9, 9, call_site!()) }.is_err());

    assert_eq!(*tracker.stats(), before_stats);
    let after_records: Vec<_> = tracker.records().cloned().collect();
    assert_eq!(after_records, before_records);
}

#[test]
fn test_accumulator_matches_operation_history() {
    let mut tracker = Tracker::new(MockAllocator::relocating());
    let mut expected_allocated = 0u64;
    let mut expected_released = 0u64;

    let mut live = Vec::new();
    for size in [8usize, 24, 100, 3] {
        live.push((tracker.allocate(size, call_site!()).unwrap(), size));
        expected_allocated += size as u64;
    }

    let (ptr, old) = live.remove(1);
    let grown = unsafe { tracker.resize_array(Some(ptr), 10, 8, call_site!()) }.unwrap();
    expected_allocated += (80 - old) as u64;
    live.push((grown, 80));

    let (ptr, old) = live.remove(0);
    let shrunk = unsafe { tracker.resize(Some(ptr), 2, call_site!()) }.unwrap();
    assert!(old > 2);
    live.push((shrunk, 2));

    for (ptr, size) in live.drain(..2) {
        tracker.release(ptr, call_site!());
        expected_released += size as u64;
    }

    let stats = tracker.stats();
    assert_eq!(stats.total_charged_bytes(), expected_allocated);
    assert_eq!(stats.released_bytes, expected_released);
}

#[test]
fn test_leak_report_is_complete() {
    let mut tracker = Tracker::new(MockAllocator::default());
    let a = tracker.allocate(1, call_site!()).unwrap();
    let b = tracker.allocate(2, call_site!()).unwrap();
    let c = tracker.allocate(4, call_site!()).unwrap();
    tracker.release(b, call_site!());

    let leaks = tracker.leak_report();
    let addresses: Vec<_> = leaks.entries.iter().map(|e| e.address).collect();
    let live: Vec<_> = tracker.registry().live().map(|r| r.address()).collect();

    assert_eq!(addresses, live);
    assert_eq!(addresses, vec![Address::from(a), Address::from(c)]);
    assert_eq!(leaks.total_leaks, 2);
    assert_eq!(leaks.total_leaked_bytes, 5);
}

#[test]
fn test_untracked_release_is_noop() {
    let mut tracker = Tracker::new(MockAllocator::default());

    tracker.release(untracked(0x42), call_site!());
    assert!(!tracker.registry().is_initialized());
    assert!(tracker.registry().is_empty());

    tracker.allocate(7, call_site!()).unwrap();
    let before = *tracker.stats();
    tracker.release(untracked(0x42), call_site!());

    assert_eq!(*tracker.stats(), before);
    assert_eq!(tracker.registry().len(), 1);
}

#[test]
fn test_reused_address_prefers_live_record() {
    let mut tracker = Tracker::new(MockAllocator::default());
    let a = tracker.allocate(10, call_site!()).unwrap();
    tracker.release(a, call_site!());

    // the allocator hands the same address out again
    tracker.allocator().next.set(0);
    let again = tracker.allocate(30, call_site!()).unwrap();
    assert_eq!(a, again);

    let record = tracker.find(again).unwrap();
    assert_eq!(record.state(), BlockState::Live);
    assert_eq!(record.size(), 30);

    tracker.release(again, call_site!());
    assert_eq!(tracker.stats().double_releases, 0);
    assert_eq!(tracker.stats().released_bytes, 40);
}

#[test]
fn test_scenario() {
    let mut tracker = Tracker::new(MockAllocator::relocating());

    let a = tracker.allocate(100, call_site!()).unwrap();
    assert_eq!(tracker.find(a).unwrap().size(), 100);

    let b = tracker.zero_allocate(10, 4, call_site!()).unwrap();
    assert_eq!(tracker.find(b).unwrap().size(), 40);

    tracker.release(a, call_site!());
    assert_eq!(tracker.find(a).unwrap().state(), BlockState::Released);

    let c = unsafe { tracker.resize(Some(b), 100, call_site!()) }.unwrap();
    assert_eq!(tracker.find(c).unwrap().size(), 100);
    assert_eq!(tracker.stats().resize_growth_bytes, 60);

    let report = tracker.teardown(&Discard).unwrap();

    assert_eq!(report.usage.allocations, 2);
    assert_eq!(report.usage.allocated_bytes, 140);
    assert_eq!(report.usage.total_charged_bytes, 200);
    assert_eq!(report.usage.releases, 1);
    assert_eq!(report.usage.released_bytes, 100);

    assert_eq!(report.leaks.total_leaks, 1);
    assert_eq!(report.leaks.total_leaked_bytes, 100);
    assert_eq!(report.leaks.entries[0].address, Address::from(c));
    assert_eq!(report.leaks.entries[0].size, 100);

    let text = report.to_string();
    let usage_at = text.find("total allocations : 2").unwrap();
    let leak_at = text.find("100 bytes leaked (resize at").unwrap();
    assert!(usage_at < leak_at);
}

#[test]
fn test_teardown_reports_before_destroying() {
    struct LeakCheck;

    impl Reporter for LeakCheck {
        fn report(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>> {
            if report.leaks.total_leaks != 1 {
                return Err("leak missing at report time".into());
            }
            Ok(())
        }
    }

    let alloc = MockAllocator::default();
    let mut tracker = Tracker::new(&alloc).with_reclaim_leaks(true);
    let leaked = tracker.allocate(12, call_site!()).unwrap();

    tracker.teardown(&LeakCheck).unwrap();
    assert_eq!(*alloc.released.borrow(), vec![leaked.as_ptr() as usize]);
}
