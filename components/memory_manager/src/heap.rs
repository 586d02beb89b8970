//! Slab heap with allocation accounting.
//!
//! Objects live in slots addressed by [`GcRef`]. Freed slots go on a free
//! list and are reused by later allocations. The heap tracks how many bytes
//! were allocated since the last collection; once that exceeds the current
//! threshold, [`Heap::should_collect`] reports true and the owner is expected
//! to run [`Heap::collect`] at its next safepoint.

use core_types::{GcRef, Value};

use crate::object::{Closure, HeapObject, HostResource, PropertyMap};

/// Collector pacing configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GcConfig {
    /// Bytes allocated before the first automatic collection
    pub initial_threshold: usize,
    /// Lower bound for the adaptive threshold
    pub min_threshold: usize,
    /// Threshold after a cycle is `live_bytes * growth_factor`
    pub growth_factor: f64,
    /// Request a collection at every safepoint (testing aid)
    pub stress: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 1024 * 1024,
            min_threshold: 256 * 1024,
            growth_factor: 2.0,
            stress: false,
        }
    }
}

impl GcConfig {
    /// Set the initial threshold
    pub fn with_initial_threshold(mut self, bytes: usize) -> Self {
        self.initial_threshold = bytes;
        self.min_threshold = self.min_threshold.min(bytes);
        self
    }

    /// Enable or disable stress mode
    pub fn with_stress(mut self, stress: bool) -> Self {
        self.stress = stress;
        self
    }
}

/// Cumulative collector statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Number of completed collections
    pub collections: usize,
    /// Total objects reclaimed across all collections
    pub objects_freed: usize,
    /// Objects alive after the last collection (or currently allocated)
    pub objects_live: usize,
    /// Estimated bytes alive after the last collection
    pub bytes_live: usize,
    /// Finalizers that reported an error
    pub finalizer_failures: usize,
}

pub(crate) struct Slot {
    pub(crate) object: HeapObject,
    pub(crate) size: usize,
}

/// The garbage-collected heap
pub struct Heap {
    pub(crate) slots: Vec<Option<Slot>>,
    pub(crate) free: Vec<usize>,
    pub(crate) config: GcConfig,
    pub(crate) bytes_since_gc: usize,
    pub(crate) bytes_live: usize,
    pub(crate) threshold: usize,
    pub(crate) stats: GcStats,
}

impl Heap {
    /// Create an empty heap
    pub fn new(config: GcConfig) -> Self {
        let threshold = config.initial_threshold;
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            config,
            bytes_since_gc: 0,
            bytes_live: 0,
            threshold,
            stats: GcStats::default(),
        }
    }

    /// Store an object and return its handle
    pub fn alloc(&mut self, object: HeapObject) -> GcRef {
        let size = object.estimated_size();
        self.bytes_since_gc += size;
        self.bytes_live += size;
        self.stats.objects_live += 1;
        let slot = Slot { object, size };
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                GcRef::from_index(index)
            }
            None => {
                self.slots.push(Some(slot));
                GcRef::from_index(self.slots.len() - 1)
            }
        }
    }

    /// Allocate an array
    pub fn alloc_array(&mut self, items: Vec<Value>) -> GcRef {
        self.alloc(HeapObject::Array(items))
    }

    /// Allocate an object
    pub fn alloc_object(&mut self, props: PropertyMap) -> GcRef {
        self.alloc(HeapObject::Object(props))
    }

    /// Allocate a closure
    pub fn alloc_closure(&mut self, closure: Closure) -> GcRef {
        self.alloc(HeapObject::Closure(closure))
    }

    /// Allocate a cell holding `value`
    pub fn alloc_cell(&mut self, value: Value) -> GcRef {
        self.alloc(HeapObject::Cell(value))
    }

    /// Allocate a resource wrapper
    pub fn alloc_resource(&mut self, resource: Box<dyn HostResource>) -> GcRef {
        self.alloc(HeapObject::Resource(resource))
    }

    /// Look up an object
    pub fn get(&self, r: GcRef) -> Option<&HeapObject> {
        self.slots.get(r.index()).and_then(|s| s.as_ref()).map(|s| &s.object)
    }

    /// Look up an object mutably
    pub fn get_mut(&mut self, r: GcRef) -> Option<&mut HeapObject> {
        self.slots
            .get_mut(r.index())
            .and_then(|s| s.as_mut())
            .map(|s| &mut s.object)
    }

    /// Account for growth of an existing object (array push, new key)
    pub fn record_growth(&mut self, r: GcRef, bytes: usize) {
        if let Some(Some(slot)) = self.slots.get_mut(r.index()) {
            slot.size += bytes;
            self.bytes_since_gc += bytes;
            self.bytes_live += bytes;
        }
    }

    /// Whether allocation since the last cycle has crossed the threshold
    pub fn should_collect(&self) -> bool {
        self.config.stress || self.bytes_since_gc >= self.threshold
    }

    /// Current adaptive threshold in bytes
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Bytes allocated since the last collection
    pub fn bytes_since_gc(&self) -> usize {
        self.bytes_since_gc
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.stats.objects_live
    }

    /// Whether the heap holds no objects
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collector statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Pacing configuration
    pub fn config(&self) -> &GcConfig {
        &self.config
    }
}
