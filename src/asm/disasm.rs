//! Disassembler for LS-8 programs.
//!
//! Converts program bytes back to readable assembly.

use crate::cpu::decode::{decode, Instruction};

/// Disassemble the instruction starting with `opcode`.
pub fn disassemble_instruction(opcode: u8, a: u8, b: u8) -> String {
    match decode(opcode, a, b) {
        Ok(decoded) => format_instruction(&decoded),
        Err(_) => format!("??? ; {:#04x}", opcode),
    }
}

/// Disassemble a program, one instruction per line.
///
/// Bytes that are not opcodes are shown as `???` and skipped one at a time.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS-8 Disassembly\n");
    output.push_str("; -----------------\n\n");

    let mut addr = 0;
    while addr < bytes.len() {
        let byte_at = |offset: usize| bytes.get(addr + offset).copied().unwrap_or(0);
        let (opcode, a, b) = (byte_at(0), byte_at(1), byte_at(2));

        let width = decode(opcode, a, b).map(|i| i.width()).unwrap_or(1);
        let end = (addr + width).min(bytes.len());
        let raw: Vec<String> = bytes[addr..end].iter().map(|b| format!("{:02X}", b)).collect();

        output.push_str(&format!(
            "{:03}: {:<9} {}\n",
            addr,
            raw.join(" "),
            disassemble_instruction(opcode, a, b)
        ));
        addr += width;
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    let mnemonic = instr.opcode().mnemonic();
    match instr {
        Instruction::Hlt | Instruction::Ret => mnemonic.to_string(),
        Instruction::Ldi { reg, value } => format!("{} R{},{}", mnemonic, reg, value),
        Instruction::Alu { op, a, .. } if op.is_unary() => format!("{} R{}", mnemonic, a),
        Instruction::Alu { a, b, .. } => format!("{} R{},R{}", mnemonic, a, b),
        Instruction::Prn { reg }
        | Instruction::Push { reg }
        | Instruction::Pop { reg }
        | Instruction::Call { reg }
        | Instruction::Jmp { reg }
        | Instruction::Jeq { reg }
        | Instruction::Jne { reg } => format!("{} R{}", mnemonic, reg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assembler::assemble;

    #[test]
    fn test_disassemble_hlt() {
        assert_eq!(disassemble_instruction(0x01, 0, 0), "HLT");
    }

    #[test]
    fn test_disassemble_operands() {
        assert_eq!(disassemble_instruction(0x82, 0, 8), "LDI R0,8");
        assert_eq!(disassemble_instruction(0xA2, 0, 1), "MUL R0,R1");
        assert_eq!(disassemble_instruction(0x69, 5, 0xFF), "NOT R5");
        assert_eq!(disassemble_instruction(0x50, 3, 0), "CALL R3");
    }

    #[test]
    fn test_disassemble_unknown() {
        assert_eq!(disassemble_instruction(0xFF, 0, 0), "??? ; 0xff");
    }

    #[test]
    fn test_disassemble_program() {
        let program = assemble("LDI R0,8\nPRN R0\nHLT").unwrap();
        let text = disassemble(&program);

        assert!(text.contains("000: 82 00 08  LDI R0,8"));
        assert!(text.contains("003: 47 00     PRN R0"));
        assert!(text.contains("005: 01        HLT"));
    }

    #[test]
    fn test_disassemble_truncated_tail() {
        // LDI missing its operands at the end of the slice
        let text = disassemble(&[0x82]);
        assert!(text.contains("000: 82        LDI R0,0"));
    }
}
