//! Record buffer allocation.
//!
//! The parser makes exactly one allocation per successful line, sized by the
//! layout planner. Hosts that account for memory themselves can supply their
//! own [`RecordAllocator`].

/// Provides zero-initialized record buffers.
pub trait RecordAllocator {
    /// Returns a zero-filled buffer of exactly `size` bytes, owned by the caller.
    ///
    /// The request is never partially satisfied. The builder rejects a buffer
    /// of any other length.
    fn allocate(&self, size: usize) -> Vec<u8>;
}

/// Allocates record buffers on the global heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl RecordAllocator for HeapAllocator {
    fn allocate(&self, size: usize) -> Vec<u8> {
        vec![0; size]
    }
}

impl<A: RecordAllocator + ?Sized> RecordAllocator for &A {
    fn allocate(&self, size: usize) -> Vec<u8> {
        (**self).allocate(size)
    }
}
