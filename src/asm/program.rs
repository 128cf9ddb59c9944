//! The `.ls8` program file format.
//!
//! A plain text format:
//! - One byte per line, written as up to 8 binary digits
//! - Everything after `#` is a comment
//! - Blank lines are ignored
//!
//! Bytes are loaded into memory in file order starting at address 0.

use crate::cpu::MEMORY_SIZE;
use std::path::Path;
use std::io::Write;
use thiserror::Error;

/// A parsed program file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramFile {
    /// The program bytes.
    pub bytes: Vec<u8>,
    /// The significant source line each byte came from (for debugging).
    pub source_lines: Vec<String>,
}

impl ProgramFile {
    /// Create a new empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a program from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            source_lines: bytes.iter().map(|b| format!("{:08b}", b)).collect(),
        }
    }

    /// Add a byte.
    pub fn push(&mut self, byte: u8, source: &str) {
        self.bytes.push(byte);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parse program text.
pub fn parse_program(text: &str) -> Result<ProgramFile, ProgramError> {
    let mut program = ProgramFile::new();

    for (line_num, line) in text.lines().enumerate() {
        let code = line.split('#').next().unwrap_or("").trim();
        if code.is_empty() {
            continue;
        }

        if code.len() > 8 || !code.chars().all(|c| c == '0' || c == '1') {
            return Err(ProgramError::ParseError {
                line: line_num + 1,
                message: format!("expected up to 8 binary digits, found {:?}", code),
            });
        }

        let byte = u8::from_str_radix(code, 2).map_err(|e| ProgramError::ParseError {
            line: line_num + 1,
            message: e.to_string(),
        })?;

        if program.len() == MEMORY_SIZE {
            return Err(ProgramError::ProgramTooLarge { line: line_num + 1 });
        }
        program.push(byte, code);
    }

    Ok(program)
}

/// Load a program file from disk.
pub fn load_program_file<P: AsRef<Path>>(path: P) -> Result<ProgramFile, ProgramError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ProgramError::IoError(e.to_string()))?;
    let program = parse_program(&text)?;
    tracing::debug!(path = %path.as_ref().display(), bytes = program.len(), "loaded program file");
    Ok(program)
}

/// Render a program in the file format, one commented byte per line.
pub fn format_program(program: &ProgramFile) -> String {
    let mut text = String::new();
    text.push_str("# LS-8 program\n");
    text.push_str(&format!("# {} bytes\n\n", program.len()));

    for (addr, byte) in program.bytes.iter().enumerate() {
        text.push_str(&format!("{:08b} # {:03}\n", byte, addr));
    }

    text
}

/// Save a program file to disk.
pub fn save_program_file<P: AsRef<Path>>(path: P, program: &ProgramFile) -> Result<(), ProgramError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ProgramError::IoError(e.to_string()))?;

    file.write_all(format_program(program).as_bytes())
        .map_err(|e| ProgramError::IoError(e.to_string()))?;

    Ok(())
}

/// Errors that can occur while reading or writing program files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("program does not fit in memory (line {line} is byte 257)")]
    ProgramTooLarge { line: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_comments_and_blanks() {
        let text = "\
# print8.ls8
10000010 # LDI R0,8
00000000
00001000

01000111 # PRN R0
00000000
00000001   # HLT
";
        let program = parse_program(text).unwrap();
        assert_eq!(program.bytes, vec![0x82, 0, 8, 0x47, 0, 0x01]);
        assert_eq!(program.source_lines[0], "10000010");
    }

    #[test]
    fn test_parse_trailing_whitespace() {
        let program = parse_program("00000001 \t\r\n").unwrap();
        assert_eq!(program.bytes, vec![1]);
    }

    #[test]
    fn test_parse_errors_carry_line_numbers() {
        let err = parse_program("00000001\n0000002\n").unwrap_err();
        assert!(matches!(err, ProgramError::ParseError { line: 2, .. }));

        let err = parse_program("\n100000001\n").unwrap_err();
        assert!(matches!(err, ProgramError::ParseError { line: 2, .. }));

        // from_str_radix alone would accept a sign
        let err = parse_program("+1").unwrap_err();
        assert!(matches!(err, ProgramError::ParseError { line: 1, .. }));
    }

    #[test]
    fn test_program_too_large() {
        let text = "00000000\n".repeat(MEMORY_SIZE + 1);
        assert_eq!(
            parse_program(&text),
            Err(ProgramError::ProgramTooLarge { line: 257 })
        );
        assert_eq!(parse_program(&text[9..]).unwrap().len(), MEMORY_SIZE);
    }

    #[test]
    fn test_format_parses_back() {
        let program = ProgramFile::from_bytes(&[0x82, 0, 8, 0x01]);
        let text = format_program(&program);

        assert!(text.contains("10000010 # 000"));
        assert_eq!(parse_program(&text).unwrap().bytes, program.bytes);
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("ls8-program-{}.ls8", std::process::id()));
        let program = ProgramFile::from_bytes(&[0x47, 3, 0x01]);

        save_program_file(&path, &program).unwrap();
        let loaded = load_program_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.bytes, program.bytes);
    }

    fn run_text(text: &str) -> String {
        let program = parse_program(text).unwrap();
        let mut cpu = crate::cpu::Cpu::new();
        cpu.load_program(&program.bytes).unwrap();
        let mut out = Vec::new();
        cpu.run(&mut out).unwrap();
        assert!(cpu.is_halted());
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_sample_programs() {
        assert_eq!(run_text(include_str!("../../programs/print8.ls8")), "8\n");
        assert_eq!(run_text(include_str!("../../programs/mult.ls8")), "72\n");
        assert_eq!(run_text(include_str!("../../programs/stack.ls8")), "2\n1\n");
        assert_eq!(run_text(include_str!("../../programs/call.ls8")), "1\n2\n3\n");
    }

    #[test]
    fn test_assembled_source_matches_binary() {
        let assembled = crate::asm::assemble(include_str!("../../programs/call.asm")).unwrap();
        let binary = parse_program(include_str!("../../programs/call.ls8")).unwrap();
        assert_eq!(assembled, binary.bytes);
    }

    #[test]
    fn test_missing_file() {
        let err = load_program_file("/nonexistent/ls8/program.ls8").unwrap_err();
        assert!(matches!(err, ProgramError::IoError(_)));
    }
}
