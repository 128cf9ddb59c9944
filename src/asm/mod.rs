//! Program files, assembler and disassembler for the LS-8.
//!
//! This module provides:
//! - The `.ls8` program format (one binary byte per line)
//! - A two-pass assembler (mnemonic text → program bytes)
//! - A disassembler (program bytes → readable text)

pub mod assembler;
pub mod disasm;
pub mod program;

pub use assembler::{assemble, AssemblerError};
pub use disasm::disassemble;
pub use program::{ProgramFile, ProgramError, parse_program, load_program_file, save_program_file};
