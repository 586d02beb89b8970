//! GC integration for the VM
//!
//! The collector only sees [`RootSource`]s. The VM exposes its operand
//! stack, frame stack, global table and temporary roots through one
//! borrowed view so a collection can run while the heap is mutably
//! borrowed.

use std::collections::HashMap;
use std::rc::Rc;

use core_types::Value;
use memory_manager::{CollectionReport, RootSource, Tracer};
use tracing::trace;

use crate::call_frame::CallFrame;
use crate::vm::Vm;

/// Borrowed view of everything the VM keeps alive
struct VmRoots<'a> {
    stack: &'a [Value],
    frames: &'a [CallFrame],
    globals: &'a HashMap<Rc<str>, Value>,
    temp_roots: &'a [Value],
}

impl RootSource for VmRoots<'_> {
    fn trace_roots(&self, tracer: &mut Tracer) {
        self.stack.trace_roots(tracer);
        for frame in self.frames {
            frame.trace_roots(tracer);
        }
        for value in self.globals.values() {
            tracer.mark_value(value);
        }
        self.temp_roots.trace_roots(tracer);
    }
}

impl Vm {
    /// Run a full collection now
    pub fn collect_garbage(&mut self) -> CollectionReport {
        let roots = VmRoots {
            stack: &self.stack,
            frames: &self.frames,
            globals: &self.globals,
            temp_roots: &self.temp_roots,
        };
        self.heap.collect(&[&roots])
    }

    /// Collect if allocation has crossed the threshold
    pub(crate) fn safepoint(&mut self) {
        if self.heap.should_collect() {
            trace!(
                bytes = self.heap.bytes_since_gc(),
                threshold = self.heap.threshold(),
                "collection triggered at safepoint"
            );
            self.collect_garbage();
        }
    }
}
