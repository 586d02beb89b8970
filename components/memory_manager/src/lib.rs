//! Memory Manager - garbage-collected heap
//!
//! This component provides:
//! - A slab heap of [`HeapObject`]s addressed by [`GcRef`](core_types::GcRef)
//! - A stop-the-world mark-and-sweep collector driven by [`RootSource`]s
//! - Allocation accounting with an adaptive collection threshold
//! - Finalizers for objects wrapping host resources
//!
//! # Example
//!
//! ```
//! use memory_manager::{GcConfig, Heap, HeapObject};
//! use core_types::Value;
//!
//! let mut heap = Heap::new(GcConfig::default());
//! let kept = heap.alloc(HeapObject::Array(vec![Value::Number(1.0)]));
//! let _dropped = heap.alloc(HeapObject::Array(Vec::new()));
//!
//! let roots = vec![Value::Array(kept)];
//! let report = heap.collect(&[&roots]);
//!
//! assert_eq!(report.freed, 1);
//! assert!(heap.get(kept).is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod gc;
pub mod heap;
pub mod object;

pub use gc::{CollectionReport, RootSource, Tracer};
pub use heap::{GcConfig, GcStats, Heap};
pub use object::{Closure, HeapObject, HostResource, PropertyMap};
