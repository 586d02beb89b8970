//! Heap object representations

use std::any::Any;
use std::fmt;
use std::mem::size_of;
use std::rc::Rc;

use bytecode_system::FunctionProto;
use core_types::{GcRef, Value};
use indexmap::IndexMap;

/// Insertion-ordered property storage for objects
pub type PropertyMap = IndexMap<Rc<str>, Value>;

/// A host resource owned by the heap, such as an open file.
///
/// The owning native should release the resource explicitly; `finalize` is
/// the collector's fallback for handles that became unreachable while open.
pub trait HostResource: Any {
    /// Short name shown in dumps
    fn type_name(&self) -> &'static str;

    /// Release the resource; called at most once, during sweep
    fn finalize(&mut self) -> Result<(), String>;

    /// Downcast support for natives that operate on the resource
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A closure: a shared code object plus its captured cells
#[derive(Debug, Clone)]
pub struct Closure {
    /// Compiled function body
    pub proto: Rc<FunctionProto>,
    /// Captured cells, one per entry of `proto.captures`
    pub upvalues: Vec<GcRef>,
}

/// An object living in the collected heap
pub enum HeapObject {
    /// Growable sequence of values
    Array(Vec<Value>),
    /// String-keyed map preserving first-insertion order
    Object(PropertyMap),
    /// Script function
    Closure(Closure),
    /// Boxed captured variable shared by the closures that reference it
    Cell(Value),
    /// Host resource with a finalizer
    Resource(Box<dyn HostResource>),
}

impl HeapObject {
    /// Name of the object kind
    pub fn kind(&self) -> &'static str {
        match self {
            HeapObject::Array(_) => "array",
            HeapObject::Object(_) => "object",
            HeapObject::Closure(_) => "closure",
            HeapObject::Cell(_) => "cell",
            HeapObject::Resource(r) => r.type_name(),
        }
    }

    /// Approximate footprint used for collection pacing
    pub fn estimated_size(&self) -> usize {
        let header = size_of::<HeapObject>();
        match self {
            HeapObject::Array(items) => header + items.capacity() * size_of::<Value>(),
            HeapObject::Object(props) => {
                header
                    + props
                        .iter()
                        .map(|(k, _)| k.len() + size_of::<Rc<str>>() + size_of::<Value>())
                        .sum::<usize>()
            }
            HeapObject::Closure(c) => header + c.upvalues.len() * size_of::<GcRef>(),
            HeapObject::Cell(_) | HeapObject::Resource(_) => header,
        }
    }
}

impl fmt::Debug for HeapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapObject::Array(items) => f.debug_tuple("Array").field(items).finish(),
            HeapObject::Object(props) => f.debug_tuple("Object").field(props).finish(),
            HeapObject::Closure(c) => write!(f, "Closure({}, {:?})", c.proto.display_name(), c.upvalues),
            HeapObject::Cell(v) => f.debug_tuple("Cell").field(v).finish(),
            HeapObject::Resource(r) => write!(f, "Resource({})", r.type_name()),
        }
    }
}
