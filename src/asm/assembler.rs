//! Simple assembler for LS-8 programs.
//!
//! Syntax:
//! ```text
//! ; Comment (# works too)
//! LOOP:            ; Define a label
//!     LDI R0,8     ; Load immediate
//!     MUL R0,R1    ; Register operands are R0-R7
//!     LDI R2,LOOP  ; Labels may be used as immediates
//!     JMP R2
//!     HLT
//!
//!     ORG 0x40     ; Pad with zeros up to an address
//!     DB 42        ; Define a data byte
//! ```

use crate::cpu::decode::Opcode;
use crate::cpu::MEMORY_SIZE;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to program bytes.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A parsed operand.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Register(u8),
    Value(u8),
    Label(String),
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, u8>,
    /// Label references to patch: (output index, label, source line).
    pending: Vec<(usize, String, usize)>,
    /// Output bytes.
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve label references
        self.resolve_references()?;

        tracing::debug!(bytes = self.output.len(), labels = self.symbols.len(), "assembled");
        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = line.split([';', '#']).next().unwrap_or("").trim();
        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some((label, rest)) = line.split_once(':') {
            self.define_label(label.trim(), line_num)?;

            let rest = rest.trim();
            if !rest.is_empty() {
                return self.process_statement(rest, line_num);
            }
            return Ok(());
        }

        self.process_statement(line, line_num)
    }

    fn define_label(&mut self, label: &str, line_num: usize) -> Result<(), AssemblerError> {
        if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid label {:?}", label),
            });
        }

        let addr = self.current_addr(line_num)?;
        let key = label.to_uppercase();
        if self.symbols.insert(key.clone(), addr).is_some() {
            return Err(AssemblerError::DuplicateLabel { line: line_num, label: key });
        }
        Ok(())
    }

    fn process_statement(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, operands) = match line.split_once(char::is_whitespace) {
            Some((mnemonic, rest)) => (mnemonic.to_uppercase(), rest.trim()),
            None => (line.to_uppercase(), ""),
        };

        let operands: Vec<&str> = if operands.is_empty() {
            Vec::new()
        } else {
            operands.split(',').map(str::trim).collect()
        };

        match mnemonic.as_str() {
            // Directives
            "ORG" => {
                let [operand] = operands.as_slice() else {
                    return Err(self.operand_count_error(&mnemonic, 1, operands.len(), line_num));
                };
                let target = self.parse_number(operand, line_num)? as usize;
                if target < self.output.len() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("ORG {} is behind current address {}", target, self.output.len()),
                    });
                }
                self.output.resize(target, 0);
            }

            "DB" => {
                if operands.is_empty() {
                    return Err(self.operand_count_error(&mnemonic, 1, 0, line_num));
                }
                for operand in operands {
                    let operand = self.parse_immediate(operand, line_num)?;
                    self.emit_operand(operand, line_num)?;
                }
            }

            // Instructions
            _ => {
                let opcode: Opcode = mnemonic.parse().map_err(|_| AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: mnemonic.clone(),
                })?;
                self.process_instruction(opcode, &operands, line_num)?;
            }
        }

        Ok(())
    }

    fn process_instruction(&mut self, opcode: Opcode, operands: &[&str], line_num: usize)
        -> Result<(), AssemblerError>
    {
        let expected = opcode.operand_count();
        if operands.len() != expected {
            return Err(self.operand_count_error(opcode.mnemonic(), expected, operands.len(), line_num));
        }

        let mut parsed = Vec::with_capacity(expected);
        for (i, operand) in operands.iter().enumerate() {
            // LDI is the only instruction with an immediate operand
            let operand = if opcode == Opcode::Ldi && i == 1 {
                self.parse_immediate(operand, line_num)?
            } else {
                self.parse_register(operand, line_num)?
            };
            parsed.push(operand);
        }

        self.emit(opcode.byte(), line_num)?;
        for operand in parsed {
            self.emit_operand(operand, line_num)?;
        }
        Ok(())
    }

    fn parse_register(&self, operand: &str, line_num: usize) -> Result<Operand, AssemblerError> {
        let index = operand
            .strip_prefix(['R', 'r'])
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|&n| n < 8)
            .ok_or_else(|| AssemblerError::SyntaxError {
                line: line_num,
                message: format!("expected register R0-R7, found {:?}", operand),
            })?;
        Ok(Operand::Register(index))
    }

    fn parse_immediate(&self, operand: &str, line_num: usize) -> Result<Operand, AssemblerError> {
        let starts_numeric = operand.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '-');
        if starts_numeric {
            return Ok(Operand::Value(self.parse_number(operand, line_num)?));
        }

        if operand.is_empty() || !operand.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid operand {:?}", operand),
            });
        }
        Ok(Operand::Label(operand.to_uppercase()))
    }

    fn parse_number(&self, operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
        let (digits, radix) = if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
            (hex, 16)
        } else if let Some(bin) = operand.strip_prefix("0b").or_else(|| operand.strip_prefix("0B")) {
            (bin, 2)
        } else {
            (operand, 10)
        };

        let value = i64::from_str_radix(digits, radix).map_err(|_| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid number {:?}", operand),
        })?;

        u8::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value })
    }

    fn current_addr(&self, line_num: usize) -> Result<u8, AssemblerError> {
        u8::try_from(self.output.len()).map_err(|_| AssemblerError::ProgramTooLarge { line: line_num })
    }

    fn emit(&mut self, byte: u8, line_num: usize) -> Result<(), AssemblerError> {
        if self.output.len() >= MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { line: line_num });
        }
        self.output.push(byte);
        Ok(())
    }

    fn emit_operand(&mut self, operand: Operand, line_num: usize) -> Result<(), AssemblerError> {
        match operand {
            Operand::Register(index) => self.emit(index, line_num),
            Operand::Value(value) => self.emit(value, line_num),
            Operand::Label(label) => {
                self.pending.push((self.output.len(), label, line_num));
                self.emit(0, line_num) // Placeholder, patched in pass 2
            }
        }
    }

    fn operand_count_error(&self, mnemonic: &str, expected: usize, found: usize, line_num: usize)
        -> AssemblerError
    {
        AssemblerError::OperandCount {
            line: line_num,
            mnemonic: mnemonic.to_string(),
            expected,
            found,
        }
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = self.symbols.get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: *line_num,
                    label: label.clone(),
                })?;
            self.output[*out_idx] = *addr;
        }
        Ok(())
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("{mnemonic} on line {line} takes {expected} operand(s), found {found}")]
    OperandCount { line: usize, mnemonic: String, expected: usize, found: usize },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program does not fit in memory (line {line})")]
    ProgramTooLarge { line: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Cpu;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; print8
            LDI R0,8
            PRN R0
            HLT
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0x82, 0x00, 0x08, 0x47, 0x00, 0x01]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        START:
            LDI R2, END   # forward reference
            JMP R2
            PRN R0
        END: HLT
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0x82, 0x02, 0x07, 0x54, 0x02, 0x47, 0x00, 0x01]);
    }

    #[test]
    fn test_assemble_data_and_org() {
        let source = r#"
            HLT
            ORG 0x04
            DB 42, 0b101, 0xFF
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0x01, 0, 0, 0, 42, 5, 255]);
    }

    #[test]
    fn test_not_takes_one_register() {
        assert_eq!(assemble("not r3").unwrap(), vec![0x69, 0x03]);
        assert!(matches!(
            assemble("NOT R3,R4"),
            Err(AssemblerError::OperandCount { expected: 1, found: 2, .. })
        ));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            assemble("NOP"),
            Err(AssemblerError::UnknownMnemonic { line: 1, .. })
        ));
        assert!(matches!(
            assemble("HLT\nLDI R0,256"),
            Err(AssemblerError::ValueOutOfRange { line: 2, value: 256 })
        ));
        assert!(matches!(
            assemble("PRN R8"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
        assert!(matches!(
            assemble("LDI R0,MISSING"),
            Err(AssemblerError::UndefinedLabel { line: 1, .. })
        ));
        assert!(matches!(
            assemble("A: HLT\nA: HLT"),
            Err(AssemblerError::DuplicateLabel { line: 2, .. })
        ));
        assert!(matches!(
            assemble("DB 1,2,3\nORG 1"),
            Err(AssemblerError::SyntaxError { line: 2, .. })
        ));
    }

    #[test]
    fn test_assembled_subroutine_loop_runs() {
        let source = r#"
                LDI R0,0
                LDI R1,1
                LDI R2,3
                LDI R3,PRINT
                LDI R4,LOOP
        LOOP:   ADD R0,R1
                CALL R3
                CMP R0,R2
                JNE R4
                HLT
        PRINT:  PRN R0
                RET
        "#;

        let program = assemble(source).unwrap();
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();
        let mut out = Vec::new();
        cpu.run(&mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "1\n2\n3\n");
    }
}
