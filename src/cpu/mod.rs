//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 bytes of memory shared by program and stack
//! - 8 general purpose registers plus PC, SP and the flags register
//! - A 20-instruction set dispatched through one exhaustive match

pub mod memory;
pub mod registers;
pub mod alu;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::{Flags, Registers, RegisterError, REGISTER_COUNT, STACK_START};
pub use alu::{AluOp, AluError};
pub use decode::{Instruction, Opcode, DecodeError};
pub use execute::{Cpu, CpuError, CpuState};
