//! Human-readable listing of code objects

use std::fmt;

use core_types::{escape_string, format_number};

use crate::opcode::Opcode;
use crate::proto::{Capture, Constant, FunctionProto};

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(n) => write!(f, "{}", format_number(*n)),
            Constant::String(s) => write!(f, "\"{}\"", escape_string(s)),
        }
    }
}

impl FunctionProto {
    fn write_listing(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let mut s = String::new();
                if p.rest {
                    s.push_str("...");
                }
                s.push_str(&p.name);
                if p.has_default {
                    s.push_str(" = ?");
                }
                s
            })
            .collect();
        writeln!(
            f,
            "{}function {}({}) locals={} cells={}",
            indent,
            self.display_name(),
            params.join(", "),
            self.local_count,
            self.cell_count
        )?;
        for (i, capture) in self.captures.iter().enumerate() {
            match capture {
                Capture::Cell(slot) => writeln!(f, "{}  upvalue {} <- cell {}", indent, i, slot)?,
                Capture::Upvalue(idx) => writeln!(f, "{}  upvalue {} <- upvalue {}", indent, i, idx)?,
            }
        }
        for (ip, inst) in self.instructions.iter().enumerate() {
            write!(
                f,
                "{}  {:04} {:>4}:{:<3} {:?}",
                indent, ip, inst.source_position.line, inst.source_position.column, inst.opcode
            )?;
            if let Some(comment) = self.operand_comment(&inst.opcode) {
                write!(f, "  ; {}", comment)?;
            }
            writeln!(f)?;
        }
        for nested in &self.nested {
            nested.write_listing(f, depth + 1)?;
        }
        Ok(())
    }

    fn operand_comment(&self, opcode: &Opcode) -> Option<String> {
        match opcode {
            Opcode::LoadConst(idx)
            | Opcode::LoadGlobal(idx)
            | Opcode::StoreGlobal(idx)
            | Opcode::DefineGlobal(idx)
            | Opcode::DeleteGlobal(idx)
            | Opcode::ObjectInsert(idx) => self.constants.get(*idx as usize).map(|c| c.to_string()),
            Opcode::MakeClosure(idx) => self
                .nested
                .get(*idx as usize)
                .map(|p| format!("function {}", p.display_name())),
            _ => None,
        }
    }
}

impl fmt::Display for FunctionProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_listing(f, 0)
    }
}
