//! Contract tests for the collector: cycles, finalizers, pacing

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use bytecode_system::FunctionProto;
use core_types::{GcRef, Value};
use memory_manager::{Closure, GcConfig, Heap, HeapObject, HostResource, PropertyMap, RootSource, Tracer};
use proptest::prelude::*;

struct Probe {
    finalized: Rc<Cell<usize>>,
    fail: bool,
}

impl HostResource for Probe {
    fn type_name(&self) -> &'static str {
        "probe"
    }

    fn finalize(&mut self) -> Result<(), String> {
        self.finalized.set(self.finalized.get() + 1);
        if self.fail {
            Err("close failed".to_string())
        } else {
            Ok(())
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn no_roots() -> Vec<Value> {
    Vec::new()
}

#[test]
fn test_cyclic_closure_object_graph_is_reclaimed() {
    let mut heap = Heap::new(GcConfig::default());
    let obj = heap.alloc_object(PropertyMap::new());
    let cell = heap.alloc_cell(Value::Object(obj));
    let closure = heap.alloc_closure(Closure {
        proto: Rc::new(FunctionProto::new(None)),
        upvalues: vec![cell],
    });
    if let Some(HeapObject::Object(props)) = heap.get_mut(obj) {
        props.insert(Rc::from("callback"), Value::Function(closure));
    }

    let roots = vec![Value::Function(closure)];
    assert_eq!(heap.collect(&[&roots]).freed, 0);

    let report = heap.collect(&[&no_roots()]);
    assert_eq!(report.freed, 3);
    assert!(heap.get(obj).is_none());
}

#[test]
fn test_finalizer_runs_once_on_unreachable_resource() {
    let finalized = Rc::new(Cell::new(0));
    let mut heap = Heap::new(GcConfig::default());
    heap.alloc_resource(Box::new(Probe {
        finalized: finalized.clone(),
        fail: false,
    }));
    heap.collect(&[&no_roots()]);
    heap.collect(&[&no_roots()]);
    assert_eq!(finalized.get(), 1);
}

#[test]
fn test_failing_finalizer_does_not_abort_sweep() {
    let finalized = Rc::new(Cell::new(0));
    let mut heap = Heap::new(GcConfig::default());
    heap.alloc_resource(Box::new(Probe {
        finalized: finalized.clone(),
        fail: true,
    }));
    heap.alloc_array(Vec::new());
    let report = heap.collect(&[&no_roots()]);
    assert_eq!(report.freed, 2);
    assert_eq!(report.finalizer_failures, 1);
    assert_eq!(heap.stats().finalizer_failures, 1);
}

#[test]
fn test_threshold_adapts_to_live_size() {
    let config = GcConfig {
        initial_threshold: 1,
        min_threshold: 1,
        growth_factor: 2.0,
        stress: false,
    };
    let mut heap = Heap::new(config);
    let big = heap.alloc_array(vec![Value::Null; 1000]);
    let roots = vec![Value::Array(big)];
    let report = heap.collect(&[&roots]);
    assert_eq!(heap.threshold(), report.live_bytes * 2);
    assert!(!heap.should_collect());
}

#[test]
fn test_multiple_root_sources() {
    struct Handles(Vec<GcRef>);
    impl RootSource for Handles {
        fn trace_roots(&self, tracer: &mut Tracer) {
            for r in &self.0 {
                tracer.mark_ref(*r);
            }
        }
    }

    let mut heap = Heap::new(GcConfig::default());
    let a = heap.alloc_array(Vec::new());
    let b = heap.alloc_cell(Value::Null);
    let c = heap.alloc_array(Vec::new());
    let values = vec![Value::Array(a)];
    let handles = Handles(vec![b]);
    let report = heap.collect(&[&values, &handles]);
    assert_eq!(report.freed, 1);
    assert!(heap.get(c).is_none());
}

proptest! {
    #[test]
    fn prop_only_rooted_chains_survive(len in 1usize..20, rooted in any::<bool>()) {
        let mut heap = Heap::new(GcConfig::default());
        let mut head = heap.alloc_array(Vec::new());
        for _ in 1..len {
            head = heap.alloc_array(vec![Value::Array(head)]);
        }
        let roots = if rooted { vec![Value::Array(head)] } else { Vec::new() };
        let report = heap.collect(&[&roots]);
        prop_assert_eq!(report.live, if rooted { len } else { 0 });
        prop_assert_eq!(report.freed, if rooted { 0 } else { len });
    }
}
