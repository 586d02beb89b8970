//! Unit tests for interpreter components

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use bytecode_system::{Constant, FunctionProto, Opcode};
use core_types::{SourcePosition, Value};
use interpreter::{BinaryOp, CallFrame, Exception, Handler, Vm};
use memory_manager::HostResource;
use parser::CompileOptions;

fn script(ops: &[Opcode]) -> Rc<FunctionProto> {
    let mut proto = FunctionProto::new(Some("<script>".to_string()));
    for op in ops {
        proto.emit(*op, SourcePosition::new(1, 1, 0));
    }
    Rc::new(proto)
}

fn run_source(vm: &mut Vm, source: &str) -> Value {
    let proto = parser::compile(source, CompileOptions::default()).expect("compile");
    vm.run(proto).expect("run")
}

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// VM Tests
// ============================================================================

#[test]
fn test_vm_global_overwrite() {
    let mut vm = Vm::new();
    vm.set_global("x", Value::Number(10.0));
    vm.set_global("x", Value::Number(20.0));
    assert_eq!(vm.get_global("x"), Some(Value::Number(20.0)));
}

#[test]
fn test_vm_script_without_return_yields_null() {
    let mut vm = Vm::new();
    assert_eq!(run_source(&mut vm, "let a = 1;"), Value::Null);
    assert_eq!(vm.get_global("a"), Some(Value::Number(1.0)));
}

#[test]
fn test_vm_repl_mode_returns_last_expression() {
    let mut vm = Vm::new();
    let proto = parser::compile("let a = 2; a * 21;", CompileOptions::repl()).unwrap();
    assert_eq!(vm.run(proto).unwrap(), Value::Number(42.0));
}

#[test]
fn test_vm_globals_persist_between_runs() {
    let mut vm = Vm::new();
    run_source(&mut vm, "let counter = 1;");
    assert_eq!(run_source(&mut vm, "counter += 1; return counter;"), Value::Number(2.0));
}

#[test]
fn test_vm_dup2_and_member_update() {
    let mut vm = Vm::new();
    let result = run_source(&mut vm, "let o = {n: 1}; o.n += 4; o[\"n\"]++; return o.n;");
    assert_eq!(result, Value::Number(6.0));
}

#[test]
fn test_vm_typeof_names() {
    let mut vm = Vm::new();
    let result = run_source(
        &mut vm,
        "return typeof null + typeof true + typeof 1 + typeof \"s\" + typeof [] + typeof {} + typeof function() {};",
    );
    assert_eq!(result, Value::from("nullbooleannumberstringarrayobjectfunction"));
}

#[test]
fn test_vm_equality_by_identity_for_arrays() {
    let mut vm = Vm::new();
    let result = run_source(&mut vm, "let a = [1]; let b = [1]; let c = a; return [a == b, a == c, \"x\" == \"x\"];");
    assert_eq!(
        vm.array_elements(&result).unwrap(),
        vec![Value::Boolean(false), Value::Boolean(true), Value::Boolean(true)]
    );
}

#[test]
fn test_vm_for_in_and_for_of() {
    let mut vm = Vm::new();
    let source = r#"
        let o = {a: 1, b: 2};
        let s = "";
        for (let k in o) { s = s + k; }
        for (let v of o) { s = s + v; }
        for (let c of "xy") { s = s + c; }
        for (let i in [7, 8]) { s = s + i; }
        return s;
    "#;
    assert_eq!(run_source(&mut vm, source), Value::from("ab12xy01"));
}

#[test]
fn test_vm_for_in_snapshots_keys() {
    let mut vm = Vm::new();
    let source = r#"
        let o = {a: 1};
        let n = 0;
        for (let k in o) { o.b = 2; n++; }
        return n;
    "#;
    assert_eq!(run_source(&mut vm, source), Value::Number(1.0));
}

#[test]
fn test_vm_sparse_array_assignment() {
    let mut vm = Vm::new();
    let result = run_source(&mut vm, "let a = []; a[3] = \"x\"; return a;");
    let items = vm.array_elements(&result).unwrap();
    assert_eq!(items.len(), 4);
    assert!(items[..3].iter().all(Value::is_null));
}

#[test]
fn test_vm_null_assignment_keeps_key() {
    let mut vm = Vm::new();
    let result = run_source(&mut vm, "let o = {}; o.a = 1; o.a = null; return o;");
    let entries = vm.object_entries(&result).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(&*entries[0].0, "a");
    assert_eq!(entries[0].1, Value::Null);
}

#[test]
fn test_vm_delete_member() {
    let mut vm = Vm::new();
    let result = run_source(&mut vm, "let o = {a: 1, b: 2, c: 3}; delete o.b; let a = [1, 2]; delete a[0]; return [o, a];");
    let pair = vm.array_elements(&result).unwrap();
    let keys: Vec<_> = vm
        .object_entries(&pair[0])
        .unwrap()
        .into_iter()
        .map(|(k, _)| k.to_string())
        .collect();
    assert_eq!(keys, vec!["a", "c"]);
    assert_eq!(vm.array_elements(&pair[1]).unwrap(), vec![Value::Null, Value::Number(2.0)]);
}

#[test]
fn test_vm_binary_op_direct() {
    let mut vm = Vm::new();
    let result = vm.binary_op(BinaryOp::Pow, &Value::Number(2.0), &Value::Number(10.0));
    assert_eq!(result.unwrap(), Value::Number(1024.0));
}

#[test]
fn test_vm_output_redirect() {
    fn say(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
        let text = vm.display(&args[0]);
        writeln!(vm.output(), "{}", text).map_err(|e| vm.error("Error", e.to_string()))?;
        Ok(Value::Null)
    }
    let buffer = SharedBuffer::default();
    let mut vm = Vm::new();
    vm.set_output(Box::new(buffer.clone()));
    vm.register_native("say", say);
    run_source(&mut vm, "say([1, \"two\", {k: null}]);");
    let printed = String::from_utf8(buffer.0.borrow().clone()).unwrap();
    assert_eq!(printed, "[1,'two',{'k':null}]\n");
}

#[test]
fn test_vm_dump_state_inside_native() {
    fn snapshot(vm: &mut Vm, _args: &[Value]) -> Result<Value, Exception> {
        Ok(Value::from(vm.dump_state()))
    }
    let mut vm = Vm::new();
    vm.register_native("snapshot", snapshot);
    let dump = run_source(&mut vm, "function probe() { return snapshot(); } let answer = 42; return probe();");
    let dump = dump.as_str().unwrap().to_string();
    assert!(dump.contains("probe ip="));
    assert!(dump.contains("<script> ip="));
    assert!(dump.contains("answer = 42"));
    assert!(dump.contains("snapshot = <native snapshot>"));
}

// ============================================================================
// Bytecode-level tests
// ============================================================================

#[test]
fn test_handcrafted_loop() {
    // sum = 0; i = 0; while (i < 5) { sum = sum + i; i = i + 1 } return sum
    let mut proto = FunctionProto::new(Some("<script>".to_string()));
    proto.local_count = 2;
    let zero = proto.add_constant(Constant::Number(0.0));
    let one = proto.add_constant(Constant::Number(1.0));
    let five = proto.add_constant(Constant::Number(5.0));
    let pos = SourcePosition::default();
    proto.emit(Opcode::LoadConst(zero), pos);
    proto.emit(Opcode::StoreLocal(0), pos);
    proto.emit(Opcode::LoadConst(zero), pos);
    proto.emit(Opcode::StoreLocal(1), pos);
    let top = proto.current_offset();
    proto.emit(Opcode::LoadLocal(1), pos);
    proto.emit(Opcode::LoadConst(five), pos);
    proto.emit(Opcode::Lt, pos);
    let exit = proto.emit(Opcode::JumpIfFalse(0), pos);
    proto.emit(Opcode::LoadLocal(0), pos);
    proto.emit(Opcode::LoadLocal(1), pos);
    proto.emit(Opcode::Add, pos);
    proto.emit(Opcode::StoreLocal(0), pos);
    proto.emit(Opcode::LoadLocal(1), pos);
    proto.emit(Opcode::LoadConst(one), pos);
    proto.emit(Opcode::Add, pos);
    proto.emit(Opcode::StoreLocal(1), pos);
    proto.emit(Opcode::Jump(top), pos);
    proto.patch_jump(exit);
    proto.emit(Opcode::LoadLocal(0), pos);
    proto.emit(Opcode::Return, pos);

    let result = Vm::new().run(Rc::new(proto)).unwrap();
    assert_eq!(result, Value::Number(10.0));
}

#[test]
fn test_stack_underflow_is_internal_error() {
    let err = Vm::new().run(script(&[Opcode::Pop, Opcode::Return])).unwrap_err();
    assert_eq!(err.kind, core_types::ErrorKind::InternalError);
}

#[test]
fn test_handler_restores_stack_height() {
    let mut proto = FunctionProto::new(Some("<script>".to_string()));
    let pos = SourcePosition::default();
    proto.emit(Opcode::LoadTrue, pos);
    let push = proto.emit(Opcode::PushHandler(0), pos);
    proto.emit(Opcode::LoadNull, pos);
    proto.emit(Opcode::LoadNull, pos);
    proto.emit(Opcode::Add, pos);
    proto.emit(Opcode::PopHandler, pos);
    proto.patch_jump(push);
    // catch: drop the error, return what was below it
    proto.emit(Opcode::Pop, pos);
    proto.emit(Opcode::Return, pos);
    let result = Vm::new().run(Rc::new(proto)).unwrap();
    assert_eq!(result, Value::Boolean(true));
}

// ============================================================================
// CallFrame / Handler Tests
// ============================================================================

#[test]
fn test_call_frame_stack_entry() {
    let mut proto = FunctionProto::new(Some("worker".to_string()));
    proto.source_name = Some(Rc::from("job.bn"));
    proto.cell_count = 2;
    proto.emit(Opcode::LoadNull, SourcePosition::new(4, 9, 30));
    let frame = CallFrame::new(
        core_types::GcRef::from_index(0),
        Rc::new(proto),
        Vec::new(),
        0,
        Vec::new(),
    );
    assert_eq!(frame.cells.len(), 2);
    let mut frame = frame;
    frame.ip = 1;
    let entry = frame.stack_frame();
    assert_eq!(entry.function_name.as_deref(), Some("worker"));
    assert_eq!(entry.source_url.as_deref(), Some("job.bn"));
    assert_eq!((entry.line, entry.column), (4, 9));
}

#[test]
fn test_handler_is_copy() {
    let handler = Handler {
        frame_depth: 1,
        catch_ip: 7,
        stack_height: 3,
    };
    let copy = handler;
    assert_eq!(copy, handler);
}

// ============================================================================
// Resource Tests
// ============================================================================

struct Counter {
    closed: Rc<RefCell<bool>>,
    hits: u32,
}

impl HostResource for Counter {
    fn type_name(&self) -> &'static str {
        "counter"
    }

    fn finalize(&mut self) -> Result<(), String> {
        *self.closed.borrow_mut() = true;
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[test]
fn test_resource_downcast_and_finalize() {
    let closed = Rc::new(RefCell::new(false));
    let mut vm = Vm::new();
    let handle = vm.alloc_resource(Box::new(Counter {
        closed: closed.clone(),
        hits: 0,
    }));
    vm.resource_mut::<Counter>(&handle).unwrap().hits += 1;
    assert_eq!(vm.resource_mut::<Counter>(&handle).unwrap().hits, 1);
    assert_eq!(vm.display(&handle), "<resource counter>");

    vm.set_global("h", handle);
    vm.collect_garbage();
    assert!(!*closed.borrow());

    vm.remove_global("h");
    vm.collect_garbage();
    assert!(*closed.borrow());
}
