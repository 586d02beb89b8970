//! Unit tests for bytecode_system

mod test_proto;
