use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::allocator::{LibcAllocator, RawAllocator};
use crate::error::TrackError;
use crate::output::Reporter;
use crate::report::{Report, ReportHeader};
use crate::tracker::Tracker;
use crate::CallSite;

/// Cloneable handle to a [`Tracker`] shared between threads.
///
/// Every operation holds the lock for its whole duration, so a record and the counters it
/// feeds are always updated together. A poisoned lock is recovered: tracker operations
/// finish their bookkeeping before anything that can panic.
///
/// ```rust
/// use memtally::{call_site, SharedTracker};
/// use std::thread;
///
/// let shared = SharedTracker::system();
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let shared = shared.clone();
///         thread::spawn(move || {
///             let ptr = shared.allocate(16, call_site!()).unwrap();
///             unsafe { shared.free(ptr, call_site!()) };
///         })
///     })
///     .collect();
/// for handle in handles {
///     handle.join().unwrap();
/// }
///
/// let report = shared.report();
/// assert_eq!(report.usage.allocations, 4);
/// assert!(report.leaks.is_empty());
/// ```
#[derive(Debug)]
pub struct SharedTracker<A: RawAllocator = LibcAllocator> {
    inner: Arc<Mutex<Tracker<A>>>,
}

impl<A: RawAllocator> Clone for SharedTracker<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SharedTracker<LibcAllocator> {
    pub fn system() -> Self {
        Self::new(Tracker::system())
    }
}

impl<A: RawAllocator> From<Tracker<A>> for SharedTracker<A> {
    fn from(tracker: Tracker<A>) -> Self {
        Self::new(tracker)
    }
}

impl<A: RawAllocator> SharedTracker<A> {
    pub fn new(tracker: Tracker<A>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracker<A>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the tracker.
    pub fn with<R>(&self, f: impl FnOnce(&mut Tracker<A>) -> R) -> R {
        let mut tracker = self.lock();
        f(&mut tracker)
    }

    pub fn init(&self) -> Result<(), TrackError> {
        self.lock().init()
    }

    pub fn allocate(&self, size: usize, site: CallSite) -> Result<NonNull<u8>, TrackError> {
        self.lock().allocate(size, site)
    }

    pub fn zero_allocate(
        &self,
        count: usize,
        size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, TrackError> {
        self.lock().zero_allocate(count, size, site)
    }

    /// # Safety
    ///
    /// Same contract as [`Tracker::resize`].
    pub unsafe fn resize(
        &self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, TrackError> {
        // SAFETY: forwarded to the caller
        unsafe { self.lock().resize(ptr, new_size, site) }
    }

    /// # Safety
    ///
    /// Same contract as [`Tracker::resize_array`].
    pub unsafe fn resize_array(
        &self,
        ptr: Option<NonNull<u8>>,
        count: usize,
        size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, TrackError> {
        // SAFETY: forwarded to the caller
        unsafe { self.lock().resize_array(ptr, count, size, site) }
    }

    pub fn release(&self, ptr: NonNull<u8>, site: CallSite) {
        self.lock().release(ptr, site)
    }

    /// # Safety
    ///
    /// Same contract as [`Tracker::free`].
    pub unsafe fn free(&self, ptr: NonNull<u8>, site: CallSite) {
        // SAFETY: forwarded to the caller
        unsafe { self.lock().free(ptr, site) }
    }

    pub fn report(&self) -> Report {
        self.lock().report()
    }

    /// Reports and empties the shared tracker. Other handles stay valid and see an empty
    /// tracker afterwards.
    pub fn teardown(
        &self,
        header: ReportHeader,
        reporter: &dyn Reporter,
    ) -> Result<Report, Box<dyn std::error::Error>> {
        self.lock().finish(header, reporter)
    }
}
