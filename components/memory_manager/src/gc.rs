//! Stop-the-world mark-and-sweep collection.
//!
//! Marking starts from every [`RootSource`] handed to [`Heap::collect`] and
//! propagates through a gray worklist until it drains. Sweep frees every
//! unmarked slot; resources run their finalizer first, and a failing
//! finalizer is logged and counted but never aborts the cycle.

use core_types::{GcRef, Value};
use tracing::{debug, warn};

use crate::heap::Heap;
use crate::object::HeapObject;

/// Something that holds references into the heap.
///
/// The VM's operand stack, frame stack (with its cell table) and global
/// table each implement this so the collector never needs to know their
/// layout.
pub trait RootSource {
    /// Report every root value or handle to the tracer
    fn trace_roots(&self, tracer: &mut Tracer);
}

impl RootSource for [Value] {
    fn trace_roots(&self, tracer: &mut Tracer) {
        for value in self {
            tracer.mark_value(value);
        }
    }
}

impl RootSource for Vec<Value> {
    fn trace_roots(&self, tracer: &mut Tracer) {
        self.as_slice().trace_roots(tracer);
    }
}

/// Marking state for one collection
pub struct Tracer {
    marks: Vec<bool>,
    gray: Vec<GcRef>,
}

impl Tracer {
    fn new(slot_count: usize) -> Self {
        Self {
            marks: vec![false; slot_count],
            gray: Vec::new(),
        }
    }

    /// Mark the object a value refers to, if any
    pub fn mark_value(&mut self, value: &Value) {
        if let Some(r) = value.heap_ref() {
            self.mark_ref(r);
        }
    }

    /// Mark an object by handle
    pub fn mark_ref(&mut self, r: GcRef) {
        if let Some(mark) = self.marks.get_mut(r.index()) {
            if !*mark {
                *mark = true;
                self.gray.push(r);
            }
        }
    }

    fn is_marked(&self, index: usize) -> bool {
        self.marks.get(index).copied().unwrap_or(false)
    }
}

fn trace_children(object: &HeapObject, tracer: &mut Tracer) {
    match object {
        HeapObject::Array(items) => items.iter().for_each(|v| tracer.mark_value(v)),
        HeapObject::Object(props) => props.values().for_each(|v| tracer.mark_value(v)),
        HeapObject::Cell(value) => tracer.mark_value(value),
        HeapObject::Closure(closure) => closure.upvalues.iter().for_each(|r| tracer.mark_ref(*r)),
        HeapObject::Resource(_) => {}
    }
}

/// Outcome of a single collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Objects reclaimed
    pub freed: usize,
    /// Objects that survived
    pub live: usize,
    /// Estimated bytes that survived
    pub live_bytes: usize,
    /// Finalizers that failed during this sweep
    pub finalizer_failures: usize,
}

impl Heap {
    /// Run a full collection with the given roots.
    pub fn collect(&mut self, roots: &[&dyn RootSource]) -> CollectionReport {
        let mut tracer = Tracer::new(self.slots.len());
        for source in roots {
            source.trace_roots(&mut tracer);
        }
        while let Some(r) = tracer.gray.pop() {
            if let Some(Some(slot)) = self.slots.get(r.index()) {
                trace_children(&slot.object, &mut tracer);
            }
        }

        let mut report = CollectionReport::default();
        for index in 0..self.slots.len() {
            if self.slots[index].is_none() {
                continue;
            }
            if tracer.is_marked(index) {
                if let Some(slot) = &self.slots[index] {
                    report.live += 1;
                    report.live_bytes += slot.size;
                }
                continue;
            }
            if let Some(mut slot) = self.slots[index].take() {
                if let HeapObject::Resource(resource) = &mut slot.object {
                    if let Err(message) = resource.finalize() {
                        warn!(
                            resource = resource.type_name(),
                            %message,
                            "finalizer failed during sweep"
                        );
                        report.finalizer_failures += 1;
                    }
                }
                self.free.push(index);
                report.freed += 1;
            }
        }

        self.bytes_since_gc = 0;
        self.bytes_live = report.live_bytes;
        let grown = (report.live_bytes as f64 * self.config.growth_factor) as usize;
        self.threshold = grown.max(self.config.min_threshold);

        self.stats.collections += 1;
        self.stats.objects_freed += report.freed;
        self.stats.objects_live = report.live;
        self.stats.bytes_live = report.live_bytes;
        self.stats.finalizer_failures += report.finalizer_failures;

        debug!(
            freed = report.freed,
            live = report.live,
            live_bytes = report.live_bytes,
            threshold = self.threshold,
            "garbage collection finished"
        );
        report
    }
}
