//! # LS-8 Emulator
//!
//! An emulator for the LS-8, an 8-bit teaching computer with eight
//! registers, a downward-growing stack and 256 bytes of memory shared by
//! code and data.
//!
//! Programs are loaded from `.ls8` files (one binary byte per line) or
//! assembled from mnemonic source, then run by a fetch-decode-execute loop.

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Flags, Instruction, Opcode, AluOp};
pub use asm::{assemble, disassemble, AssemblerError, ProgramFile, ProgramError, load_program_file, save_program_file};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
