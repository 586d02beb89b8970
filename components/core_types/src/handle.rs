//! Opaque handles into runtime-owned tables.

use std::fmt;

/// Handle to an object stored in the garbage-collected heap.
///
/// A `GcRef` is a slot index. It stays valid for as long as the object it
/// names is reachable from a root; the collector may reuse the slot once the
/// object has been swept.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GcRef(u32);

impl GcRef {
    /// Create a handle from a raw slot index
    pub fn from_index(index: usize) -> Self {
        GcRef(index as u32)
    }

    /// Slot index in the heap
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for GcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a host function in the VM's native table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId(u32);

impl NativeId {
    /// Create a handle from a native table index
    pub fn from_index(index: usize) -> Self {
        NativeId(index as u32)
    }

    /// Index into the native table
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native#{}", self.0)
    }
}
