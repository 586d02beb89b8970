//! Language-level natives: strings, arrays, numbers, serialization, regex,
//! and runtime introspection

use std::cmp::Ordering;
use std::collections::HashSet;
use std::rc::Rc;

use core_types::{GcRef, Value};
use interpreter::{Args, BinaryOp, Exception, NativeFn, Vm};
use memory_manager::HeapObject;
use regex::Regex;
use tracing::debug;

/// Natives installed by [`install`]
pub const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("ceil", ceil),
    ("dump", dump),
    ("endswith", endswith),
    ("filter", filter),
    ("floor", floor),
    ("format", format),
    ("fromjson", fromjson),
    ("gc", gc),
    ("join", join),
    ("length", length),
    ("map", map),
    ("match", regex_match),
    ("modf", modf),
    ("natural_compare", natural_compare),
    ("pop", pop),
    ("push", push),
    ("reduce", reduce),
    ("round", round),
    ("sort", sort),
    ("split", split),
    ("startswith", startswith),
    ("todump", todump),
    ("tojson", tojson),
    ("tolower", tolower),
    ("tonumber", tonumber),
    ("tostring", tostring),
    ("toupper", toupper),
    ("trunc", trunc),
];

/// Register every language native as a global
pub fn install(vm: &mut Vm) {
    for (name, function) in FUNCTIONS {
        vm.register_native(name, *function);
    }
}

// Introspection

fn length(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("length", args);
    args.expect_count(vm, 1)?;
    let n = match args.get(0) {
        Value::String(s) => s.chars().count(),
        value @ Value::Array(_) => vm.array_mut(&value)?.len(),
        value @ Value::Object(_) => vm.object_entries(&value)?.len(),
        _ => return Err(args.error(vm, "only strings, arrays and objects have a length")),
    };
    Ok(Value::Number(n as f64))
}

fn gc(vm: &mut Vm, _args: &[Value]) -> Result<Value, Exception> {
    let report = vm.collect_garbage();
    debug!(freed = report.freed, live = report.live, "collection requested by script");
    Ok(Value::Number(report.freed as f64))
}

fn dump(vm: &mut Vm, _args: &[Value]) -> Result<Value, Exception> {
    let state = vm.dump_state();
    write!(vm.output(), "{}", state).map_err(|e| vm.error("Error", e.to_string()))?;
    Ok(Value::Null)
}

// Serialization

fn tostring(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("tostring", args);
    args.expect_count(vm, 1)?;
    Ok(Value::from(vm.display(&args.get(0))))
}

fn todump(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("todump", args);
    args.expect_count(vm, 1)?;
    Ok(Value::from(vm.repr(&args.get(0))))
}

/// Deepest container nesting `tojson` will serialize
pub const MAX_JSON_DEPTH: usize = 256;

enum JsonError {
    Unsupported(String),
    TooDeep,
}

fn to_json(vm: &Vm, value: &Value, seen: &mut HashSet<GcRef>, depth: usize) -> Result<serde_json::Value, JsonError> {
    let enter = |r: GcRef, seen: &mut HashSet<GcRef>| {
        if depth >= MAX_JSON_DEPTH {
            Err(JsonError::TooDeep)
        } else if seen.insert(r) {
            Ok(())
        } else {
            Err(JsonError::Unsupported("cannot serialize a cyclic structure".to_string()))
        }
    };
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Boolean(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 9.0e15 {
                Ok(serde_json::Value::from(*n as i64))
            } else {
                Ok(serde_json::Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number))
            }
        }
        Value::String(s) => Ok(serde_json::Value::String(s.to_string())),
        Value::Array(r) => {
            enter(*r, seen)?;
            let mut out = Vec::new();
            if let Some(HeapObject::Array(items)) = vm.heap().get(*r) {
                for item in items {
                    out.push(to_json(vm, item, seen, depth + 1)?);
                }
            }
            seen.remove(r);
            Ok(serde_json::Value::Array(out))
        }
        Value::Object(r) => {
            enter(*r, seen)?;
            let mut out = serde_json::Map::new();
            if let Some(HeapObject::Object(props)) = vm.heap().get(*r) {
                for (key, item) in props {
                    out.insert(key.to_string(), to_json(vm, item, seen, depth + 1)?);
                }
            }
            seen.remove(r);
            Ok(serde_json::Value::Object(out))
        }
        other => Err(JsonError::Unsupported(format!("cannot serialize a {}", other.type_of()))),
    }
}

fn from_json(vm: &mut Vm, json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => {
            let items = items.into_iter().map(|item| from_json(vm, item)).collect();
            vm.new_array(items)
        }
        serde_json::Value::Object(map) => {
            let entries = map
                .into_iter()
                .map(|(key, item)| (key, from_json(vm, item)))
                .collect();
            vm.new_object(entries)
        }
    }
}

fn tojson(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("tojson", args);
    args.expect_range(vm, 1, 2)?;
    let pretty = args.optional_boolean(vm, 1)?.unwrap_or(false);
    let json = match to_json(vm, &args.get(0), &mut HashSet::new(), 0) {
        Ok(json) => json,
        Err(JsonError::Unsupported(message)) => return Err(args.error(vm, message)),
        Err(JsonError::TooDeep) => {
            let message = format!("tojson: nesting deeper than {} levels", MAX_JSON_DEPTH);
            return Err(vm.range_error(message));
        }
    };
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    text.map(Value::from).map_err(|e| vm.error("Error", e.to_string()))
}

fn fromjson(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("fromjson", args);
    args.expect_count(vm, 1)?;
    let text = args.string(vm, 0)?;
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => Ok(from_json(vm, json)),
        Err(e) => Err(vm.error("Error", format!("Invalid JSON: {}", e))),
    }
}

// Strings

fn tonumber(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("tonumber", args);
    args.expect_count(vm, 1)?;
    let text = args.string(vm, 0)?;
    let trimmed = text.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok().map(|n| n as f64),
        None => trimmed.parse::<f64>().ok(),
    };
    match parsed {
        Some(n) if !trimmed.is_empty() => Ok(Value::Number(n)),
        _ => Err(args.error(vm, format_args!("'{}' is not a valid number", text))),
    }
}

fn tolower(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("tolower", args);
    args.expect_count(vm, 1)?;
    Ok(Value::from(args.string(vm, 0)?.to_lowercase()))
}

fn toupper(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("toupper", args);
    args.expect_count(vm, 1)?;
    Ok(Value::from(args.string(vm, 0)?.to_uppercase()))
}

fn split(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("split", args);
    args.expect_range(vm, 1, 2)?;
    let text = args.string(vm, 0)?;
    let parts: Vec<Value> = match args.optional_string(vm, 1)? {
        None => vec![Value::String(text)],
        Some(delimiter) if delimiter.is_empty() => {
            text.chars().map(|c| Value::from(c.to_string())).collect()
        }
        Some(delimiter) => text.split(&*delimiter).map(Value::from).collect(),
    };
    Ok(vm.new_array(parts))
}

fn join(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("join", args);
    args.expect_range(vm, 1, 2)?;
    let array = args.array(vm, 0)?;
    let separator = args.optional_string(vm, 1)?.unwrap_or_else(|| Rc::from(""));
    let items = vm.array_elements(&array)?;
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(&separator);
        }
        match item {
            Value::String(s) => out.push_str(s),
            other => {
                return Err(args.error(
                    vm,
                    format_args!("element {} must be a string, got {}", i, other.type_of()),
                ))
            }
        }
    }
    Ok(Value::from(out))
}

fn affix_test(vm: &mut Vm, name: &str, values: &[Value], test: fn(&str, &str) -> bool) -> Result<Value, Exception> {
    let args = Args::new(name, values);
    if args.len() < 2 {
        return Err(args.error(vm, "expected a string and at least one candidate"));
    }
    let text = args.string(vm, 0)?;
    for i in 1..args.len() {
        let candidate = args.string(vm, i)?;
        if test(&text, &candidate) {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

fn startswith(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    affix_test(vm, "startswith", args, |s, p| s.starts_with(p))
}

fn endswith(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    affix_test(vm, "endswith", args, |s, p| s.ends_with(p))
}

/// Expand `${0}` positional and `${name}` global placeholders
fn format(vm: &mut Vm, values: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("format", values);
    if args.is_empty() {
        return Err(args.error(vm, "expected a template string"));
    }
    let template = args.string(vm, 0)?;
    let mut out = String::with_capacity(template.len());
    let mut rest = &*template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = match after.find('}') {
            Some(end) => end,
            None => return Err(args.error(vm, "unterminated placeholder")),
        };
        let key = after[..end].trim();
        let value = if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            let index: usize = key
                .parse()
                .map_err(|_| args.error(vm, format_args!("placeholder index '{}' is too large", key)))?;
            args.get(index + 1)
        } else {
            match vm.get_global(key) {
                Some(value) => value,
                None => return Err(vm.reference_error(format!("'{}' is not defined", key))),
            }
        };
        out.push_str(&vm.display(&value));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(Value::from(out))
}

/// Compare strings treating digit runs as numbers
pub fn natural_order(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let take_run = |it: &mut std::iter::Peekable<std::str::Chars>| {
                    let mut run = String::new();
                    while let Some(c) = it.peek().copied().filter(char::is_ascii_digit) {
                        run.push(c);
                        it.next();
                    }
                    run
                };
                let run_a = take_run(&mut a);
                let run_b = take_run(&mut b);
                let digits_a = run_a.trim_start_matches('0');
                let digits_b = run_b.trim_start_matches('0');
                let ordering = digits_a
                    .len()
                    .cmp(&digits_b.len())
                    .then_with(|| digits_a.cmp(digits_b))
                    .then_with(|| run_a.len().cmp(&run_b.len()));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn natural_compare(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("natural_compare", args);
    args.expect_count(vm, 2)?;
    let a = args.string(vm, 0)?;
    let b = args.string(vm, 1)?;
    let n = match natural_order(&a, &b) {
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
        Ordering::Greater => 1.0,
    };
    Ok(Value::Number(n))
}

fn regex_match(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("match", args);
    args.expect_count(vm, 2)?;
    let text = args.string(vm, 0)?;
    let pattern = args.string(vm, 1)?;
    let regex = Regex::new(&pattern)
        .map_err(|e| vm.error("Error", format!("Invalid regular expression: {}", e)))?;
    match regex.captures(&text) {
        Some(captures) => {
            let groups = captures
                .iter()
                .map(|group| group.map_or(Value::Null, |m| Value::from(m.as_str())))
                .collect();
            Ok(vm.new_array(groups))
        }
        None => Ok(Value::Null),
    }
}

// Arrays

/// Copy the elements and keep them alive while callbacks run
fn rooted_elements(vm: &mut Vm, array: &Value) -> Result<Vec<Value>, Exception> {
    let items = vm.array_elements(array)?;
    let snapshot = vm.new_array(items.clone());
    vm.push_root(snapshot);
    Ok(items)
}

fn push(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("push", args);
    if args.len() < 2 {
        return Err(args.error(vm, "expected an array and at least one value"));
    }
    let array = args.array(vm, 0)?;
    let values: Vec<Value> = (1..args.len()).map(|i| args.get(i)).collect();
    vm.array_push(&array, values)?;
    Ok(Value::Null)
}

fn pop(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("pop", args);
    args.expect_count(vm, 1)?;
    let array = args.array(vm, 0)?;
    match vm.array_mut(&array)?.pop() {
        Some(value) => Ok(value),
        None => Err(vm.range_error("pop: array is empty")),
    }
}

fn comparison(vm: &mut Vm, comparator: Option<&Value>, a: &Value, b: &Value) -> Result<bool, Exception> {
    match comparator {
        Some(f) => match vm.call_value(f, &[a.clone(), b.clone()])? {
            Value::Number(n) => Ok(n > 0.0),
            other => {
                let message = format!("sort: comparator must return a number, got {}", other.type_of());
                Err(vm.type_error(message))
            }
        },
        None => Ok(vm.binary_op(BinaryOp::Gt, a, b)? == Value::Boolean(true)),
    }
}

/// Stable merge sort; `comparator` may re-enter the VM and fail
fn merge_sort(vm: &mut Vm, mut items: Vec<Value>, comparator: Option<&Value>) -> Result<Vec<Value>, Exception> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(vm, items, comparator)?;
    let right = merge_sort(vm, right, comparator)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if comparison(vm, comparator, &left[i], &right[j])? {
            merged.push(right[j].clone());
            j += 1;
        } else {
            merged.push(left[i].clone());
            i += 1;
        }
    }
    merged.extend_from_slice(&left[i..]);
    merged.extend_from_slice(&right[j..]);
    Ok(merged)
}

fn sort(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("sort", args);
    args.expect_range(vm, 1, 2)?;
    let array = args.array(vm, 0)?;
    let comparator = args.optional_function(vm, 1)?;
    let items = rooted_elements(vm, &array)?;
    let sorted = merge_sort(vm, items, comparator.as_ref())?;
    *vm.array_mut(&array)? = sorted;
    Ok(array)
}

fn filter(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("filter", args);
    args.expect_count(vm, 2)?;
    let array = args.array(vm, 0)?;
    let predicate = args.function(vm, 1)?;
    let items = rooted_elements(vm, &array)?;
    let result = vm.new_array(Vec::new());
    vm.push_root(result.clone());
    for (i, item) in items.into_iter().enumerate() {
        match vm.call_value(&predicate, &[item.clone(), Value::Number(i as f64)])? {
            Value::Boolean(true) => vm.array_push(&result, vec![item])?,
            Value::Boolean(false) => {}
            other => {
                let message = format!("filter: predicate must return boolean, got {}", other.type_of());
                return Err(vm.type_error(message));
            }
        }
    }
    Ok(result)
}

fn map(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("map", args);
    args.expect_count(vm, 2)?;
    let array = args.array(vm, 0)?;
    let f = args.function(vm, 1)?;
    let items = rooted_elements(vm, &array)?;
    let result = vm.new_array(Vec::with_capacity(items.len()));
    vm.push_root(result.clone());
    for (i, item) in items.into_iter().enumerate() {
        let mapped = vm.call_value(&f, &[item, Value::Number(i as f64)])?;
        vm.array_push(&result, vec![mapped])?;
    }
    Ok(result)
}

fn reduce(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("reduce", args);
    args.expect_range(vm, 2, 3)?;
    let array = args.array(vm, 0)?;
    let f = args.function(vm, 1)?;
    let mut items = rooted_elements(vm, &array)?.into_iter();
    let mut accumulator = if args.len() == 3 {
        args.get(2)
    } else {
        match items.next() {
            Some(first) => first,
            None => return Ok(Value::Null),
        }
    };
    for item in items {
        accumulator = vm.call_value(&f, &[accumulator, item])?;
        vm.push_root(accumulator.clone());
    }
    Ok(accumulator)
}

// Numbers

fn unary_math(vm: &mut Vm, name: &str, values: &[Value], f: fn(f64) -> f64) -> Result<Value, Exception> {
    let args = Args::new(name, values);
    args.expect_count(vm, 1)?;
    Ok(Value::Number(f(args.number(vm, 0)?)))
}

fn ceil(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    unary_math(vm, "ceil", args, f64::ceil)
}

fn floor(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    unary_math(vm, "floor", args, f64::floor)
}

fn round(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    unary_math(vm, "round", args, f64::round)
}

fn trunc(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    unary_math(vm, "trunc", args, f64::trunc)
}

fn modf(vm: &mut Vm, args: &[Value]) -> Result<Value, Exception> {
    let args = Args::new("modf", args);
    args.expect_count(vm, 1)?;
    let n = args.number(vm, 0)?;
    let integral = n.trunc();
    Ok(vm.new_array(vec![Value::Number(integral), Value::Number(n - integral)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_order() {
        assert_eq!(natural_order("file2", "file10"), Ordering::Less);
        assert_eq!(natural_order("a", "a"), Ordering::Equal);
        assert_eq!(natural_order("b1", "a2"), Ordering::Greater);
        assert_eq!(natural_order("x01", "x1"), Ordering::Greater);
        assert_eq!(natural_order("x", "x1"), Ordering::Less);
    }

    #[test]
    fn test_format_positional_and_global() {
        let mut vm = Vm::new();
        vm.set_global("who", Value::from("world"));
        let result = format(
            &mut vm,
            &[Value::from("${0}, ${who}! ${1}"), Value::from("hello"), Value::Number(3.0)],
        );
        assert_eq!(result.unwrap(), Value::from("hello, world! 3"));
    }

    #[test]
    fn test_format_missing_positional_is_null() {
        let mut vm = Vm::new();
        let result = format(&mut vm, &[Value::from("[${4}]")]);
        assert_eq!(result.unwrap(), Value::from("[null]"));
        assert!(format(&mut vm, &[Value::from("${oops")]).is_err());
    }

    #[test]
    fn test_split_variants() {
        let mut vm = Vm::new();
        let parts = split(&mut vm, &[Value::from("a,b,"), Value::from(",")]).unwrap();
        assert_eq!(
            vm.array_elements(&parts).unwrap(),
            vec![Value::from("a"), Value::from("b"), Value::from("")]
        );
        let chars = split(&mut vm, &[Value::from("ab"), Value::from("")]).unwrap();
        assert_eq!(vm.array_elements(&chars).unwrap().len(), 2);
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let mut vm = Vm::new();
        let value = fromjson(&mut vm, &[Value::from(r#"{"z":1,"a":[true,null,"s"]}"#)]).unwrap();
        let text = tojson(&mut vm, &[value]).unwrap();
        assert_eq!(text, Value::from(r#"{"z":1,"a":[true,null,"s"]}"#));
    }

    #[test]
    fn test_tojson_rejects_cycles() {
        let mut vm = Vm::new();
        let array = vm.new_array(Vec::new());
        vm.array_push(&array, vec![array.clone()]).unwrap();
        assert!(tojson(&mut vm, &[array]).is_err());
    }

    #[test]
    fn test_tonumber() {
        let mut vm = Vm::new();
        assert_eq!(tonumber(&mut vm, &[Value::from(" 2.5 ")]).unwrap(), Value::Number(2.5));
        assert_eq!(tonumber(&mut vm, &[Value::from("0x1f")]).unwrap(), Value::Number(31.0));
        assert!(tonumber(&mut vm, &[Value::from("abc")]).is_err());
        assert!(tonumber(&mut vm, &[Value::from("")]).is_err());
    }

    #[test]
    fn test_sort_without_comparator() {
        let mut vm = Vm::new();
        let array = vm.new_array(vec![Value::Number(3.0), Value::Number(1.0), Value::Number(2.0)]);
        sort(&mut vm, &[array.clone()]).unwrap();
        assert_eq!(
            vm.array_elements(&array).unwrap(),
            vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]
        );
    }

    #[test]
    fn test_regex_match_groups() {
        let mut vm = Vm::new();
        let found = regex_match(&mut vm, &[Value::from("key=42"), Value::from(r"(\w+)=(\d+)(x)?")]).unwrap();
        assert_eq!(
            vm.array_elements(&found).unwrap(),
            vec![Value::from("key=42"), Value::from("key"), Value::from("42"), Value::Null]
        );
        let missing = regex_match(&mut vm, &[Value::from("nope"), Value::from(r"\d")]).unwrap();
        assert_eq!(missing, Value::Null);
    }
}
