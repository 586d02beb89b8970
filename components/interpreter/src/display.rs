//! Value rendering and state dumps

use std::collections::HashSet;
use std::fmt::Write as _;

use core_types::{escape_string, format_number, GcRef, Value};
use memory_manager::HeapObject;

use crate::vm::Vm;

enum Step<'a> {
    Value(&'a Value, bool),
    Key(&'a str),
    Text(&'static str),
    Leave(GcRef),
}

impl Vm {
    /// Render a value for output.
    ///
    /// Strings print raw at the top level and quoted inside containers.
    pub fn display(&self, value: &Value) -> String {
        let mut out = String::new();
        self.render(value, false, &mut out);
        out
    }

    /// Render a value with strings quoted, as `todump` shows it
    pub fn repr(&self, value: &Value) -> String {
        let mut out = String::new();
        self.render(value, true, &mut out);
        out
    }

    /// Walks containers with an explicit work stack, so nesting depth is
    /// bounded by memory rather than the host stack.
    fn render<'a>(&'a self, root: &'a Value, quoted: bool, out: &mut String) {
        let mut seen = HashSet::new();
        let mut work = vec![Step::Value(root, quoted)];
        while let Some(step) = work.pop() {
            match step {
                Step::Text(text) => out.push_str(text),
                Step::Key(key) => {
                    let _ = write!(out, "'{}':", escape_string(key));
                }
                Step::Leave(r) => {
                    seen.remove(&r);
                }
                Step::Value(value, quoted) => self.render_value(value, quoted, &mut seen, &mut work, out),
            }
        }
    }

    fn render_value<'a>(
        &'a self,
        value: &'a Value,
        quoted: bool,
        seen: &mut HashSet<GcRef>,
        work: &mut Vec<Step<'a>>,
        out: &mut String,
    ) {
        match value {
            Value::Null => out.push_str("null"),
            Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&format_number(*n)),
            Value::String(s) if quoted => {
                out.push('\'');
                out.push_str(&escape_string(s));
                out.push('\'');
            }
            Value::String(s) => out.push_str(s),
            Value::Array(r) => {
                if !seen.insert(*r) {
                    out.push_str("[...]");
                    return;
                }
                out.push('[');
                work.push(Step::Leave(*r));
                work.push(Step::Text("]"));
                if let Some(HeapObject::Array(items)) = self.heap.get(*r) {
                    for (i, item) in items.iter().enumerate().rev() {
                        work.push(Step::Value(item, true));
                        if i > 0 {
                            work.push(Step::Text(","));
                        }
                    }
                }
            }
            Value::Object(r) => {
                if !seen.insert(*r) {
                    out.push_str("{...}");
                    return;
                }
                out.push('{');
                work.push(Step::Leave(*r));
                work.push(Step::Text("}"));
                if let Some(HeapObject::Object(props)) = self.heap.get(*r) {
                    for (i, (key, item)) in props.iter().enumerate().rev() {
                        work.push(Step::Value(item, true));
                        work.push(Step::Key(key));
                        if i > 0 {
                            work.push(Step::Text(","));
                        }
                    }
                }
            }
            Value::Function(r) => {
                let _ = write!(out, "<function {}>", self.closure_name(*r).unwrap_or("<anonymous>"));
            }
            Value::NativeFunction(id) => {
                let _ = write!(out, "<native {}>", self.native_name(*id).unwrap_or("?"));
            }
            Value::Resource(r) => match self.heap.get(*r) {
                Some(HeapObject::Resource(resource)) => {
                    let _ = write!(out, "<resource {}>", resource.type_name());
                }
                _ => out.push_str("<resource>"),
            },
        }
    }

    /// Render frames, operand stack and globals without touching VM state
    pub fn dump_state(&self) -> String {
        let mut out = String::new();
        out.push_str("frames:\n");
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            let _ = writeln!(
                out,
                "  #{} {} ip={} base={}",
                depth,
                frame.proto.display_name(),
                frame.ip,
                frame.base
            );
        }
        out.push_str("stack:\n");
        for (i, value) in self.stack.iter().enumerate() {
            let _ = writeln!(out, "  [{}] {}", i, self.repr(value));
        }
        out.push_str("globals:\n");
        let mut names: Vec<_> = self.globals.keys().collect();
        names.sort();
        for name in names {
            if let Some(value) = self.globals.get(name) {
                let _ = writeln!(out, "  {} = {}", name, self.repr(value));
            }
        }
        out
    }
}
