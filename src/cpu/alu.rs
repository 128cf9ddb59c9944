//! Arithmetic/logic unit.
//!
//! Pure functions over 8-bit operands. The CPU feeds in register values and
//! writes the outcome back: a value for `reg_a`, or new flags for CMP.

use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::cpu::registers::Flags;

/// Operations the ALU understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Mul,
    Mod,
    And,
    Or,
    Xor,
    /// Unary: only `reg_a` is read.
    Not,
    Shl,
    Shr,
    Cmp,
}

impl AluOp {
    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::Mul => "MUL",
            AluOp::Mod => "MOD",
            AluOp::And => "AND",
            AluOp::Or => "OR",
            AluOp::Xor => "XOR",
            AluOp::Not => "NOT",
            AluOp::Shl => "SHL",
            AluOp::Shr => "SHR",
            AluOp::Cmp => "CMP",
        }
    }

    /// True for operations taking a single register.
    pub fn is_unary(self) -> bool {
        self == AluOp::Not
    }
}

impl FromStr for AluOp {
    type Err = AluError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let op = match name.to_ascii_uppercase().as_str() {
            "ADD" => AluOp::Add,
            "MUL" => AluOp::Mul,
            "MOD" => AluOp::Mod,
            "AND" => AluOp::And,
            "OR" => AluOp::Or,
            "XOR" => AluOp::Xor,
            "NOT" => AluOp::Not,
            "SHL" => AluOp::Shl,
            "SHR" => AluOp::Shr,
            "CMP" => AluOp::Cmp,
            _ => return Err(AluError::UnsupportedOperation(name.to_string())),
        };
        Ok(op)
    }
}

/// What an ALU operation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOutput {
    /// New value for `reg_a`.
    Value(u8),
    /// New contents of the flags register.
    Flags(Flags),
}

/// Apply `op` to the operand values `a` and `b`.
///
/// Arithmetic wraps modulo 256. Shifts move bits by `b` positions and
/// produce zero once every bit has been shifted out.
pub fn apply(op: AluOp, a: u8, b: u8) -> Result<AluOutput, AluError> {
    let value = match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Mod => {
            if b == 0 {
                return Err(AluError::DivisionByZero);
            }
            a % b
        }
        AluOp::And => a & b,
        AluOp::Or => a | b,
        AluOp::Xor => a ^ b,
        AluOp::Not => !a,
        AluOp::Shl => a.checked_shl(b as u32).unwrap_or(0),
        AluOp::Shr => a.checked_shr(b as u32).unwrap_or(0),
        AluOp::Cmp => return Ok(AluOutput::Flags(Flags::from_ordering(a.cmp(&b)))),
    };
    Ok(AluOutput::Value(value))
}

/// Errors raised by the ALU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AluError {
    #[error("unsupported ALU operation: {0}")]
    UnsupportedOperation(String),

    #[error("division by zero")]
    DivisionByZero,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(op: AluOp, a: u8, b: u8) -> u8 {
        match apply(op, a, b).unwrap() {
            AluOutput::Value(v) => v,
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_wraps() {
        assert_eq!(value(AluOp::Add, 200, 100), 44);
        assert_eq!(value(AluOp::Mul, 8, 9), 72);
        assert_eq!(value(AluOp::Mul, 16, 16), 0);
        assert_eq!(value(AluOp::Mod, 17, 5), 2);
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(value(AluOp::And, 0b1100, 0b1010), 0b1000);
        assert_eq!(value(AluOp::Or, 0b1100, 0b1010), 0b1110);
        assert_eq!(value(AluOp::Xor, 0b1100, 0b1010), 0b0110);
        // NOT stays within eight bits and ignores b
        assert_eq!(value(AluOp::Not, 0b0000_1111, 0xFF), 0b1111_0000);
        assert_eq!(value(AluOp::Not, 0, 0), 255);
    }

    #[test]
    fn test_shift_direction() {
        // Left shift increases the value, right shift decreases it
        assert_eq!(value(AluOp::Shl, 0b0000_0011, 2), 0b0000_1100);
        assert_eq!(value(AluOp::Shr, 0b0000_1100, 2), 0b0000_0011);
        assert_eq!(value(AluOp::Shl, 0b1000_0001, 1), 0b0000_0010);
        assert_eq!(value(AluOp::Shr, 0b1000_0001, 1), 0b0100_0000);
        assert_eq!(value(AluOp::Shl, 0xFF, 8), 0);
        assert_eq!(value(AluOp::Shr, 0xFF, 200), 0);
    }

    #[test]
    fn test_cmp_sets_exactly_one_flag() {
        let flags = |a, b| match apply(AluOp::Cmp, a, b).unwrap() {
            AluOutput::Flags(f) => f,
            other => panic!("expected flags, got {:?}", other),
        };
        assert_eq!(flags(5, 5).bits(), Flags::EQUAL);
        assert_eq!(flags(9, 5).bits(), Flags::GREATER);
        assert_eq!(flags(1, 5).bits(), Flags::LESS);
    }

    #[test]
    fn test_mod_by_zero() {
        assert_eq!(apply(AluOp::Mod, 10, 0), Err(AluError::DivisionByZero));
    }

    #[test]
    fn test_parse_operation_names() {
        assert_eq!("mul".parse::<AluOp>().unwrap(), AluOp::Mul);
        assert_eq!("CMP".parse::<AluOp>().unwrap(), AluOp::Cmp);
        assert_eq!(
            "DIV".parse::<AluOp>(),
            Err(AluError::UnsupportedOperation("DIV".into()))
        );
    }
}
