//! Contract tests: jump patching behaves uniformly across control opcodes

use bytecode_system::{FunctionProto, IterKind, Opcode};
use core_types::SourcePosition;

#[test]
fn test_every_control_opcode_is_patchable() {
    let jumps = [
        Opcode::Jump(0),
        Opcode::JumpIfFalse(0),
        Opcode::JumpIfTrue(0),
        Opcode::JumpIfFalseOrPop(0),
        Opcode::JumpIfTrueOrPop(0),
        Opcode::JumpIfNull(0),
        Opcode::JumpIfNotNull(0),
        Opcode::IterNext(0),
        Opcode::PushHandler(0),
    ];
    let mut proto = FunctionProto::new(None);
    let sites: Vec<usize> = jumps
        .iter()
        .map(|op| proto.emit(*op, SourcePosition::default()))
        .collect();
    for site in sites {
        proto.patch_jump_to(site, 99);
        assert_eq!(proto.instructions[site].opcode.jump_target(), Some(99));
    }
}

#[test]
fn test_iteration_kinds_distinct() {
    assert_ne!(Opcode::IterInit(IterKind::Keys), Opcode::IterInit(IterKind::Values));
}
