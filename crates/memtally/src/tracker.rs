use std::mem;
use std::ptr::NonNull;

use tracing::{debug, trace, warn};

use crate::allocator::{LibcAllocator, RawAllocator};
use crate::error::{array_size, TrackError};
use crate::output::Reporter;
use crate::record::{Address, BlockRecord, BlockState, Operation};
use crate::registry::Registry;
use crate::report::{LeakReport, Report, ReportHeader, UsageReport};
use crate::stats::UsageStats;
use crate::CallSite;

/// Registry capacity reserved by an explicit [`Tracker::init`].
pub const INITIAL_CAPACITY: usize = 64;

/// Instrumented allocation layer.
///
/// Every operation calls the underlying allocator first and only touches the registry and
/// the usage counters once that succeeded. Failed operations leave the tracker exactly as
/// it was.
///
/// [`release`](Self::release) is bookkeeping only. The tracker never decides to free
/// memory; use [`free`](Self::free) or the [`allocator`](Self::allocator) for that.
///
/// # Examples
///
/// ```rust
/// use memtally::{call_site, Address, Tracker};
///
/// let mut tracker = Tracker::system();
/// let a = tracker.allocate(100, call_site!()).unwrap();
/// let b = tracker.zero_allocate(10, 4, call_site!()).unwrap();
/// unsafe { tracker.free(a, call_site!()) };
///
/// let report = tracker.report();
/// assert_eq!(report.usage.allocations, 2);
/// assert_eq!(report.leaks.total_leaks, 1);
/// assert_eq!(report.leaks.entries[0].address, Address::from(b));
/// # unsafe { tracker.free(b, call_site!()) };
/// ```
#[derive(Debug)]
pub struct Tracker<A: RawAllocator = LibcAllocator> {
    allocator: A,
    registry: Registry,
    stats: UsageStats,
    reclaim_leaks: bool,
}

impl Tracker<LibcAllocator> {
    /// Tracker over the C library allocator.
    pub const fn system() -> Self {
        Self::new(LibcAllocator)
    }
}

impl Default for Tracker<LibcAllocator> {
    fn default() -> Self {
        Self::system()
    }
}

impl<A: RawAllocator> Tracker<A> {
    /// Creates a tracker without allocating. Registry storage is obtained on the first
    /// tracked block, or up front by [`init`](Self::init).
    pub const fn new(allocator: A) -> Self {
        Self {
            allocator,
            registry: Registry::new(),
            stats: UsageStats::new(),
            reclaim_leaks: false,
        }
    }

    /// When set, teardown hands every still-live block back to the allocator after the
    /// reports ran. Off by default: leaks are reported, not cleaned up.
    pub fn with_reclaim_leaks(mut self, reclaim: bool) -> Self {
        self.reclaim_leaks = reclaim;
        self
    }

    /// Obtains the registry's storage. Calling it again, or after blocks were already
    /// tracked, is a no-op.
    pub fn init(&mut self) -> Result<(), TrackError> {
        if self.registry.is_initialized() {
            return Ok(());
        }
        self.registry.reserve(INITIAL_CAPACITY)?;
        debug!(capacity = INITIAL_CAPACITY, "memtally tracker initialized");
        Ok(())
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn stats(&self) -> &UsageStats {
        &self.stats
    }

    /// Tracked counterpart of `malloc`.
    pub fn allocate(&mut self, size: usize, site: CallSite) -> Result<NonNull<u8>, TrackError> {
        self.registry.reserve(1)?;
        let ptr = self
            .allocator
            .allocate(size)
            .ok_or(TrackError::OutOfMemory { requested: size })?;
        self.track_new(ptr, size, Operation::Allocate, site);
        Ok(ptr)
    }

    /// Tracked counterpart of `calloc`. The block is recorded as `count * size` bytes.
    pub fn zero_allocate(
        &mut self,
        count: usize,
        size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, TrackError> {
        let bytes = array_size(count, size)?;
        self.registry.reserve(1)?;
        let ptr = self
            .allocator
            .allocate_zeroed(count, size)
            .ok_or(TrackError::OutOfMemory { requested: bytes })?;
        self.track_new(ptr, bytes, Operation::ZeroAllocate, site);
        Ok(ptr)
    }

    /// Tracked counterpart of `realloc`.
    ///
    /// A tracked block keeps its record, re-keyed to the returned address, and only the
    /// net growth is charged. A `None` or untracked `ptr` is recorded as a fresh
    /// allocation of `new_size` bytes.
    ///
    /// # Safety
    ///
    /// `ptr` must be `None` or a live block of this tracker's allocator.
    pub unsafe fn resize(
        &mut self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, TrackError> {
        self.registry.reserve(1)?;
        // SAFETY: forwarded to the caller
        let new_ptr = unsafe { self.allocator.resize(ptr, new_size) }
            .ok_or(TrackError::OutOfMemory { requested: new_size })?;
        self.track_resize(ptr, new_ptr, new_size, Operation::Resize, site);
        Ok(new_ptr)
    }

    /// Tracked counterpart of `reallocarray`. Same bookkeeping as [`resize`](Self::resize)
    /// with a size of `count * size` bytes.
    ///
    /// # Safety
    ///
    /// `ptr` must be `None` or a live block of this tracker's allocator.
    pub unsafe fn resize_array(
        &mut self,
        ptr: Option<NonNull<u8>>,
        count: usize,
        size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, TrackError> {
        let bytes = array_size(count, size)?;
        self.registry.reserve(1)?;
        // SAFETY: forwarded to the caller
        let new_ptr = unsafe { self.allocator.resize_array(ptr, count, size) }
            .ok_or(TrackError::OutOfMemory { requested: bytes })?;
        self.track_resize(ptr, new_ptr, bytes, Operation::ResizeArray, site);
        Ok(new_ptr)
    }

    /// Marks the block at `ptr` as released. Untracked addresses are ignored.
    ///
    /// This does not free anything. A second release of the same block is not rejected:
    /// the record is re-stamped, counted again and flagged in
    /// [`UsageStats::double_releases`].
    pub fn release(&mut self, ptr: NonNull<u8>, site: CallSite) {
        let address = Address::from(ptr);
        let Some(id) = self.registry.find(address) else {
            debug!(%address, call_site = %site, "release of untracked block ignored");
            return;
        };
        let Some(record) = self.registry.get_mut(id) else {
            return;
        };

        let already_released = record.state() == BlockState::Released;
        if already_released {
            warn!(
                %address,
                previous = %record.call_site(),
                call_site = %site,
                "block released twice"
            );
        }

        let size = record.size();
        trace!(%address, size, call_site = %site, "release");
        record.mark_released(site);
        self.stats.record_release(size, already_released);
    }

    /// [`release`](Self::release) followed by the underlying allocator's release.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block of this tracker's allocator.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>, site: CallSite) {
        self.release(ptr, site);
        // SAFETY: forwarded to the caller
        unsafe { self.allocator.release(ptr) };
    }

    /// Record currently keyed by `ptr`, if any.
    pub fn find(&self, ptr: NonNull<u8>) -> Option<&BlockRecord> {
        self.registry
            .find(Address::from(ptr))
            .and_then(|id| self.registry.get(id))
    }

    /// All records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &BlockRecord> + '_ {
        self.registry.iter()
    }

    pub fn usage_report(&self) -> UsageReport {
        UsageReport::from(&self.stats)
    }

    pub fn leak_report(&self) -> LeakReport {
        LeakReport::from_records(&self.registry)
    }

    /// Usage section then leak section, without tearing anything down.
    pub fn report(&self) -> Report {
        self.report_with(ReportHeader::default())
    }

    pub fn report_with(&self, header: ReportHeader) -> Report {
        let usage = self.usage_report();
        let leaks = self.leak_report();
        Report::new(header, usage, leaks)
    }

    /// Runs the usage report, then the leak report, hands both to `reporter` and destroys
    /// the registry. Storage is released even if the reporter fails.
    pub fn teardown(self, reporter: &dyn Reporter) -> Result<Report, Box<dyn std::error::Error>> {
        self.teardown_with(ReportHeader::default(), reporter)
    }

    pub fn teardown_with(
        mut self,
        header: ReportHeader,
        reporter: &dyn Reporter,
    ) -> Result<Report, Box<dyn std::error::Error>> {
        self.finish(header, reporter)
    }

    /// Teardown in place. The tracker is empty and reusable afterwards.
    pub(crate) fn finish(
        &mut self,
        header: ReportHeader,
        reporter: &dyn Reporter,
    ) -> Result<Report, Box<dyn std::error::Error>> {
        let report = self.report_with(header);
        let outcome = reporter.report(&report);
        self.destroy();
        outcome.map(|()| report)
    }

    fn destroy(&mut self) {
        let registry = mem::take(&mut self.registry);
        self.stats = UsageStats::new();

        let allocator = &self.allocator;
        let reclaim = self.reclaim_leaks;
        let mut reclaimed = 0usize;

        let destroyed = registry.destroy(|record| {
            if !reclaim {
                return;
            }
            if let Some(ptr) = record.address().as_ptr() {
                // SAFETY: a live record's address came from this allocator and has not
                // been released through the tracker
                unsafe { allocator.release(ptr) };
                reclaimed += 1;
            }
        });

        debug!(records = destroyed, reclaimed, "memtally registry destroyed");
    }

    fn track_new(&mut self, ptr: NonNull<u8>, size: usize, operation: Operation, site: CallSite) {
        let address = Address::from(ptr);
        trace!(%address, size, %operation, call_site = %site, "track");
        self.registry
            .insert(BlockRecord::live(address, size, operation, site));
        self.stats.record_allocation(size);
    }

    fn track_resize(
        &mut self,
        old: Option<NonNull<u8>>,
        new: NonNull<u8>,
        size: usize,
        operation: Operation,
        site: CallSite,
    ) {
        let found = old.and_then(|ptr| self.registry.find(Address::from(ptr)));

        match found.and_then(|id| self.registry.get_mut(id)) {
            Some(record) => {
                let old_size = record.size();
                trace!(
                    from = %record.address(),
                    to = %Address::from(new),
                    old_size,
                    size,
                    %operation,
                    call_site = %site,
                    "rekey"
                );
                record.rekey(Address::from(new), size, operation, site);
                self.stats.record_resize(old_size, size);
            }
            None => {
                if let Some(ptr) = old {
                    warn!(
                        address = %Address::from(ptr),
                        call_site = %site,
                        "resize of untracked block, tracking result as a fresh allocation"
                    );
                }
                self.track_new(new, size, operation, site);
            }
        }
    }
}
