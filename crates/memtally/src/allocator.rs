use std::ptr::{self, NonNull};

/// The underlying allocator a [`Tracker`](crate::Tracker) delegates to.
///
/// Failure is signalled the C way, with `None` standing in for a null pointer. The tracker
/// never looks inside the blocks, it only records the addresses returned here.
pub trait RawAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Allocates `count * size` zeroed bytes. Must fail if the product overflows.
    fn allocate_zeroed(&self, count: usize, size: usize) -> Option<NonNull<u8>>;

    /// Resizes `ptr` to `new_size` bytes, possibly moving it. `None` behaves like
    /// [`allocate`](Self::allocate). On failure the original block is left untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must be `None` or a block obtained from this allocator and not yet released.
    unsafe fn resize(&self, ptr: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>>;

    /// Array form of [`resize`](Self::resize). Fails if `count * size` overflows.
    ///
    /// # Safety
    ///
    /// Same contract as [`resize`](Self::resize).
    unsafe fn resize_array(
        &self,
        ptr: Option<NonNull<u8>>,
        count: usize,
        size: usize,
    ) -> Option<NonNull<u8>> {
        let new_size = count.checked_mul(size)?;
        unsafe { self.resize(ptr, new_size) }
    }

    /// # Safety
    ///
    /// `ptr` must be a block obtained from this allocator and not yet released.
    unsafe fn release(&self, ptr: NonNull<u8>);
}

impl<A: RawAllocator + ?Sized> RawAllocator for &A {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        (**self).allocate(size)
    }

    fn allocate_zeroed(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        (**self).allocate_zeroed(count, size)
    }

    unsafe fn resize(&self, ptr: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        unsafe { (**self).resize(ptr, new_size) }
    }

    unsafe fn resize_array(
        &self,
        ptr: Option<NonNull<u8>>,
        count: usize,
        size: usize,
    ) -> Option<NonNull<u8>> {
        unsafe { (**self).resize_array(ptr, count, size) }
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        unsafe { (**self).release(ptr) }
    }
}

/// The C library's `malloc` family.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibcAllocator;

impl RawAllocator for LibcAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: malloc has no preconditions
        NonNull::new(unsafe { libc::malloc(size) }.cast())
    }

    fn allocate_zeroed(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: calloc has no preconditions and checks the product for overflow
        NonNull::new(unsafe { libc::calloc(count, size) }.cast())
    }

    /// Resizing to zero bytes asks for one byte instead. Some C libraries free the block
    /// and return null for `realloc(ptr, 0)`, which would look like a failure while the
    /// original block is already gone.
    unsafe fn resize(&self, ptr: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        let raw = ptr.map_or(ptr::null_mut(), |p| p.as_ptr().cast());
        // SAFETY: caller guarantees `ptr` came from this allocator and is still allocated
        NonNull::new(unsafe { libc::realloc(raw, new_size.max(1)) }.cast())
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        // SAFETY: caller guarantees `ptr` came from this allocator and is still allocated
        unsafe { libc::free(ptr.as_ptr().cast()) }
    }
}
