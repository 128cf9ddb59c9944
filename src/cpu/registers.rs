//! LS-8 CPU registers.
//!
//! The LS-8 has:
//! - R0-R7: eight 8-bit general purpose registers
//! - PC: program counter
//! - SP: stack pointer, growing downward from 0xF3
//! - FL: flags register holding the result of the last CMP

use std::cmp::Ordering;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Address of the top of an empty stack.
pub const STACK_START: u8 = 0xF3;

/// The flags register, laid out as `00000LGE`.
///
/// At most one of the three bits is set at a time.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags(u8);

impl Flags {
    /// Equal bit.
    pub const EQUAL: u8 = 0b0000_0001;
    /// Greater-than bit.
    pub const GREATER: u8 = 0b0000_0010;
    /// Less-than bit.
    pub const LESS: u8 = 0b0000_0100;

    /// Flags with no bit set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Flags recording the comparison of `a` against `b`.
    pub fn from_ordering(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Equal => Self(Self::EQUAL),
            Ordering::Greater => Self(Self::GREATER),
            Ordering::Less => Self(Self::LESS),
        }
    }

    /// Raw bit pattern.
    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_equal(self) -> bool {
        self.0 & Self::EQUAL != 0
    }

    pub fn is_greater(self) -> bool {
        self.0 & Self::GREATER != 0
    }

    pub fn is_less(self) -> bool {
        self.0 & Self::LESS != 0
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FL={}", self)
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let l = if self.is_less() { 'L' } else { '-' };
        let g = if self.is_greater() { 'G' } else { '-' };
        let e = if self.is_equal() { 'E' } else { '-' };
        write!(f, "{}{}{}", l, g, e)
    }
}

/// The LS-8 register file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7 general purpose registers
    gp: [u8; REGISTER_COUNT],

    /// Program counter. Kept wider than a byte so running off the end
    /// of memory is caught as an out-of-range fetch instead of wrapping.
    pub pc: usize,

    /// Stack pointer: address of the current top of stack
    pub sp: u8,

    /// Flags register, only written by the ALU
    pub fl: Flags,
}

impl Registers {
    /// Create a new register file: registers zeroed, SP at the empty stack.
    pub fn new() -> Self {
        Self {
            gp: [0; REGISTER_COUNT],
            pc: 0,
            sp: STACK_START,
            fl: Flags::empty(),
        }
    }

    /// Reset all registers to their power-on values.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read general purpose register `index`.
    pub fn read(&self, index: u8) -> Result<u8, RegisterError> {
        self.gp
            .get(index as usize)
            .copied()
            .ok_or(RegisterError::IndexOutOfRange(index))
    }

    /// Write general purpose register `index`.
    pub fn write(&mut self, index: u8, value: u8) -> Result<(), RegisterError> {
        let reg = self.gp
            .get_mut(index as usize)
            .ok_or(RegisterError::IndexOutOfRange(index))?;
        *reg = value;
        Ok(())
    }

    /// All general purpose registers, R0 first.
    pub fn general(&self) -> &[u8; REGISTER_COUNT] {
        &self.gp
    }

    /// Advance the program counter by `width` bytes.
    pub fn advance_pc(&mut self, width: usize) {
        self.pc += width;
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.pc = addr as usize;
    }

    /// True when the stack holds nothing pushed.
    pub fn stack_is_empty(&self) -> bool {
        self.sp == STACK_START
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors from register file access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("register index {0} out of range (0-7)")]
    IndexOutOfRange(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let regs = Registers::new();
        assert_eq!(regs.general(), &[0; 8]);
        assert_eq!(regs.pc, 0);
        assert_eq!(regs.sp, 0xF3);
        assert_eq!(regs.fl, Flags::empty());
        assert!(regs.stack_is_empty());
    }

    #[test]
    fn test_register_read_write() {
        let mut regs = Registers::new();
        regs.write(7, 200).unwrap();
        assert_eq!(regs.read(7).unwrap(), 200);
        assert_eq!(regs.read(0).unwrap(), 0);
    }

    #[test]
    fn test_register_index_out_of_range() {
        let mut regs = Registers::new();
        assert_eq!(regs.read(8), Err(RegisterError::IndexOutOfRange(8)));
        assert_eq!(regs.write(255, 1), Err(RegisterError::IndexOutOfRange(255)));
    }

    #[test]
    fn test_flags_exclusive() {
        let eq = Flags::from_ordering(Ordering::Equal);
        assert!(eq.is_equal() && !eq.is_greater() && !eq.is_less());

        let gt = Flags::from_ordering(Ordering::Greater);
        assert_eq!(gt.bits(), 0b010);

        let lt = Flags::from_ordering(Ordering::Less);
        assert_eq!(lt.bits(), 0b100);
        assert_eq!(format!("{}", lt), "L--");
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::new();
        regs.write(3, 9).unwrap();
        regs.sp = 0x10;
        regs.pc = 42;
        regs.reset();
        assert_eq!(regs.read(3).unwrap(), 0);
        assert_eq!(regs.sp, STACK_START);
        assert_eq!(regs.pc, 0);
    }
}
