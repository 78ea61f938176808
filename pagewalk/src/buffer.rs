use std::{
    alloc::{self, Layout},
    ops::{Deref, DerefMut},
    process,
    ptr::{self, NonNull},
    slice,
};

use tracing::error;

/// A single heap block that is owned for its whole lifetime and released once on drop.
///
/// Memory comes zeroed from the global allocator. For large blocks that means fresh anonymous
/// pages, which the kernel commits only when they are touched for the first time.
#[derive(Debug)]
pub(crate) struct PageBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl PageBuffer {
    /// Allocates `len` bytes. Aborts the process if the allocator has no memory to give.
    pub(crate) fn allocate(len: usize) -> Self {
        assert!(len > 0, "page buffer must not be empty");
        let layout = match Layout::array::<u8>(len) {
            Ok(layout) => layout,
            Err(_) => {
                error!("allocation of {} bytes failed: larger than the address space allows", len);
                process::abort()
            }
        };
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        match NonNull::new(ptr) {
            Some(ptr) => PageBuffer { ptr, layout },
            None => alloc::handle_alloc_error(layout),
        }
    }

    pub(crate) fn touch_write(&mut self, offset: usize, value: u8) {
        let byte: *mut u8 = &mut self[offset];
        unsafe { ptr::write_volatile(byte, value) }
    }

    pub(crate) fn touch_read(&self, offset: usize) -> u8 {
        let byte: *const u8 = &self[offset];
        unsafe { ptr::read_volatile(byte) }
    }
}

impl Deref for PageBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl DerefMut for PageBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for PageBuffer {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Counts bytes that are not zero in the given prefix.
pub(crate) fn count_non_zero(bytes: &[u8]) -> usize {
    bytes.iter().filter(|b| **b != 0).count()
}
