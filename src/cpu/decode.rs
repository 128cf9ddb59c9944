//! Instruction decoder for the LS-8.
//!
//! Every instruction is an opcode byte followed by zero, one or two operand
//! bytes. The fetch always reads three bytes; decoding picks out the ones
//! the opcode actually uses.

use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::cpu::alu::AluOp;

/// The fixed opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Hlt = 0b0000_0001,
    Ldi = 0b1000_0010,
    Prn = 0b0100_0111,
    Mul = 0b1010_0010,
    Add = 0b1010_0000,
    And = 0b1010_1000,
    Or = 0b1010_1010,
    Xor = 0b1010_1011,
    Not = 0b0110_1001,
    Mod = 0b1010_0100,
    Shl = 0b1010_1100,
    Shr = 0b1010_1101,
    Pop = 0b0100_0110,
    Push = 0b0100_0101,
    Call = 0b0101_0000,
    Ret = 0b0001_0001,
    Cmp = 0b1010_0111,
    Jmp = 0b0101_0100,
    Jeq = 0b0101_0101,
    Jne = 0b0101_0110,
}

impl Opcode {
    /// Every opcode, in table order.
    pub const ALL: [Opcode; 20] = [
        Opcode::Hlt, Opcode::Ldi, Opcode::Prn, Opcode::Mul, Opcode::Add,
        Opcode::And, Opcode::Or, Opcode::Xor, Opcode::Not, Opcode::Mod,
        Opcode::Shl, Opcode::Shr, Opcode::Pop, Opcode::Push, Opcode::Call,
        Opcode::Ret, Opcode::Cmp, Opcode::Jmp, Opcode::Jeq, Opcode::Jne,
    ];

    /// The encoded byte.
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Ldi => "LDI",
            Opcode::Prn => "PRN",
            Opcode::Mul => "MUL",
            Opcode::Add => "ADD",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Not => "NOT",
            Opcode::Mod => "MOD",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
            Opcode::Pop => "POP",
            Opcode::Push => "PUSH",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Cmp => "CMP",
            Opcode::Jmp => "JMP",
            Opcode::Jeq => "JEQ",
            Opcode::Jne => "JNE",
        }
    }

    /// Number of operand bytes the opcode consumes.
    pub fn operand_count(self) -> usize {
        match self {
            Opcode::Hlt | Opcode::Ret => 0,
            Opcode::Prn | Opcode::Not | Opcode::Pop | Opcode::Push
            | Opcode::Call | Opcode::Jmp | Opcode::Jeq | Opcode::Jne => 1,
            Opcode::Ldi | Opcode::Mul | Opcode::Add | Opcode::And | Opcode::Or
            | Opcode::Xor | Opcode::Mod | Opcode::Shl | Opcode::Shr | Opcode::Cmp => 2,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.byte() == byte)
            .ok_or(DecodeError::InvalidOpcode(byte))
    }
}

impl FromStr for Opcode {
    type Err = DecodeError;

    fn from_str(mnemonic: &str) -> Result<Self, Self::Err> {
        let upper = mnemonic.to_ascii_uppercase();
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic() == upper)
            .ok_or_else(|| DecodeError::UnknownMnemonic(mnemonic.to_string()))
    }
}

/// Decoded LS-8 instruction.
///
/// Register operands are raw bytes; they are range-checked when the
/// instruction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Stop the machine
    Hlt,

    /// Load immediate: R[reg] := value
    Ldi { reg: u8, value: u8 },

    /// Print R[reg] in decimal
    Prn { reg: u8 },

    /// ALU operation on R[a] and R[b]
    Alu { op: AluOp, a: u8, b: u8 },

    /// Push R[reg] onto the stack
    Push { reg: u8 },

    /// Pop the top of stack into R[reg]
    Pop { reg: u8 },

    /// Push the return address and jump to R[reg]
    Call { reg: u8 },

    /// Pop the return address into PC
    Ret,

    /// PC := R[reg]
    Jmp { reg: u8 },

    /// PC := R[reg] if the equal flag is set
    Jeq { reg: u8 },

    /// PC := R[reg] if the equal flag is clear
    Jne { reg: u8 },
}

impl Instruction {
    /// The opcode this instruction encodes to.
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Hlt => Opcode::Hlt,
            Instruction::Ldi { .. } => Opcode::Ldi,
            Instruction::Prn { .. } => Opcode::Prn,
            Instruction::Alu { op, .. } => match op {
                AluOp::Add => Opcode::Add,
                AluOp::Mul => Opcode::Mul,
                AluOp::Mod => Opcode::Mod,
                AluOp::And => Opcode::And,
                AluOp::Or => Opcode::Or,
                AluOp::Xor => Opcode::Xor,
                AluOp::Not => Opcode::Not,
                AluOp::Shl => Opcode::Shl,
                AluOp::Shr => Opcode::Shr,
                AluOp::Cmp => Opcode::Cmp,
            },
            Instruction::Push { .. } => Opcode::Push,
            Instruction::Pop { .. } => Opcode::Pop,
            Instruction::Call { .. } => Opcode::Call,
            Instruction::Ret => Opcode::Ret,
            Instruction::Jmp { .. } => Opcode::Jmp,
            Instruction::Jeq { .. } => Opcode::Jeq,
            Instruction::Jne { .. } => Opcode::Jne,
        }
    }

    /// Encoded size in bytes, i.e. how far PC moves when the
    /// instruction does not redirect control flow.
    pub fn width(&self) -> usize {
        1 + self.opcode().operand_count()
    }
}

/// Decode an opcode and the two bytes that follow it.
pub fn decode(opcode: u8, a: u8, b: u8) -> Result<Instruction, DecodeError> {
    let alu = |op| Instruction::Alu { op, a, b };

    let instruction = match Opcode::try_from(opcode)? {
        Opcode::Hlt => Instruction::Hlt,
        Opcode::Ldi => Instruction::Ldi { reg: a, value: b },
        Opcode::Prn => Instruction::Prn { reg: a },
        Opcode::Mul => alu(AluOp::Mul),
        Opcode::Add => alu(AluOp::Add),
        Opcode::And => alu(AluOp::And),
        Opcode::Or => alu(AluOp::Or),
        Opcode::Xor => alu(AluOp::Xor),
        Opcode::Not => Instruction::Alu { op: AluOp::Not, a, b: 0 },
        Opcode::Mod => alu(AluOp::Mod),
        Opcode::Shl => alu(AluOp::Shl),
        Opcode::Shr => alu(AluOp::Shr),
        Opcode::Cmp => alu(AluOp::Cmp),
        Opcode::Pop => Instruction::Pop { reg: a },
        Opcode::Push => Instruction::Push { reg: a },
        Opcode::Call => Instruction::Call { reg: a },
        Opcode::Ret => Instruction::Ret,
        Opcode::Jmp => Instruction::Jmp { reg: a },
        Opcode::Jeq => Instruction::Jeq { reg: a },
        Opcode::Jne => Instruction::Jne { reg: a },
    };

    Ok(instruction)
}

/// Encode an instruction to its bytes.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let op = instr.opcode().byte();
    match *instr {
        Instruction::Hlt | Instruction::Ret => vec![op],
        Instruction::Ldi { reg, value } => vec![op, reg, value],
        Instruction::Alu { op: alu_op, a, .. } if alu_op.is_unary() => vec![op, a],
        Instruction::Alu { a, b, .. } => vec![op, a, b],
        Instruction::Prn { reg }
        | Instruction::Push { reg }
        | Instruction::Pop { reg }
        | Instruction::Call { reg }
        | Instruction::Jmp { reg }
        | Instruction::Jeq { reg }
        | Instruction::Jne { reg } => vec![op, reg],
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode {0} ({0:#010b})")]
    InvalidOpcode(u8),

    #[error("unknown mnemonic: {0}")]
    UnknownMnemonic(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_bytes() {
        assert_eq!(Opcode::Hlt.byte(), 0x01);
        assert_eq!(Opcode::Ldi.byte(), 0x82);
        assert_eq!(Opcode::Prn.byte(), 0x47);
        assert_eq!(Opcode::Not.byte(), 0x69);
        assert_eq!(Opcode::Ret.byte(), 0x11);
        assert_eq!(Opcode::Jne.byte(), 0x56);
    }

    #[test]
    fn test_opcode_table_is_unique() {
        for (i, a) in Opcode::ALL.iter().enumerate() {
            for b in &Opcode::ALL[i + 1..] {
                assert_ne!(a.byte(), b.byte(), "{:?} and {:?} share a byte", a, b);
            }
        }
    }

    #[test]
    fn test_width_matches_encoding_bits() {
        // The top two bits of every opcode hold its operand count
        for op in Opcode::ALL {
            assert_eq!(op.operand_count(), (op.byte() >> 6) as usize, "{:?}", op);
        }
    }

    #[test]
    fn test_decode_ignores_unused_operands() {
        assert_eq!(decode(0x01, 0xFF, 0xFF).unwrap(), Instruction::Hlt);
        assert_eq!(decode(0x47, 3, 0xAA).unwrap(), Instruction::Prn { reg: 3 });
        assert_eq!(
            decode(0x69, 2, 7).unwrap(),
            Instruction::Alu { op: AluOp::Not, a: 2, b: 0 }
        );
        assert_eq!(
            decode(0x82, 0, 8).unwrap(),
            Instruction::Ldi { reg: 0, value: 8 }
        );
    }

    #[test]
    fn test_decode_invalid() {
        assert_eq!(decode(0x00, 0, 0), Err(DecodeError::InvalidOpcode(0)));
        assert_eq!(decode(0xFF, 0, 0), Err(DecodeError::InvalidOpcode(0xFF)));
    }

    #[test]
    fn test_encode_decode() {
        let program = [
            Instruction::Ldi { reg: 1, value: 9 },
            Instruction::Alu { op: AluOp::Mul, a: 0, b: 1 },
            Instruction::Call { reg: 4 },
            Instruction::Ret,
        ];

        for instr in program {
            let mut bytes = encode(&instr);
            assert_eq!(bytes.len(), instr.width());
            bytes.resize(3, 0);
            assert_eq!(decode(bytes[0], bytes[1], bytes[2]).unwrap(), instr);
        }
    }

    #[test]
    fn test_mnemonic_lookup() {
        assert_eq!("ldi".parse::<Opcode>().unwrap(), Opcode::Ldi);
        assert_eq!("JNE".parse::<Opcode>().unwrap(), Opcode::Jne);
        assert!("NOP".parse::<Opcode>().is_err());
    }
}
