//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use std::io::Write;
use crate::cpu::{Memory, Registers};
use crate::cpu::alu::{self, AluError, AluOp, AluOutput};
use crate::cpu::decode::{self, DecodeError, Instruction};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::RegisterError;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT instruction).
    Halted,
    /// CPU encountered a fatal error.
    Error,
}

/// The LS-8 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory, shared by code and stack.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with zeroed state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset the CPU to initial state, clearing memory.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load a program into memory at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)?;
        tracing::debug!("loaded {} bytes", program.len());
        Ok(())
    }

    /// Execute a single instruction, writing anything it prints to `out`.
    ///
    /// Returns the instruction that was executed. Any error is fatal:
    /// the CPU moves to [`CpuState::Error`] and refuses further steps.
    pub fn step(&mut self, out: &mut dyn Write) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let pc = self.regs.pc;
        let result = self.fetch(pc).and_then(|instr| {
            self.execute(instr, out)?;
            Ok(instr)
        });

        match result {
            Ok(instr) => {
                tracing::trace!(pc, ?instr, "executed");
                self.cycles += 1;
                self.last_instr = Some(instr);
                Ok(instr)
            }
            Err(e) => {
                tracing::debug!(pc, "cpu error: {}", e);
                self.state = CpuState::Error;
                Err(e)
            }
        }
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self, out: &mut dyn Write) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, out: &mut dyn Write, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Fetch the opcode at `pc` and the two bytes after it, then decode.
    fn fetch(&self, pc: usize) -> Result<Instruction, CpuError> {
        let opcode = self.mem.read(pc)?;
        let operand_a = self.mem.read(pc + 1)?;
        let operand_b = self.mem.read(pc + 2)?;

        decode::decode(opcode, operand_a, operand_b).map_err(|e| match e {
            DecodeError::InvalidOpcode(opcode) => CpuError::InvalidInstruction { opcode, pc },
            other => CpuError::Decode(other),
        })
    }

    /// Execute a decoded instruction. Each arm owns its PC update.
    fn execute(&mut self, instr: Instruction, out: &mut dyn Write) -> Result<(), CpuError> {
        match instr {
            Instruction::Hlt => {
                tracing::debug!(cycles = self.cycles + 1, "halted");
                self.state = CpuState::Halted;
            }

            // ==================== Data / I/O ====================

            Instruction::Ldi { reg, value } => {
                self.regs.write(reg, value)?;
                self.regs.advance_pc(instr.width());
            }

            Instruction::Prn { reg } => {
                let value = self.regs.read(reg)?;
                writeln!(out, "{}", value).map_err(|e| CpuError::Output(e.to_string()))?;
                self.regs.advance_pc(instr.width());
            }

            Instruction::Alu { op, a, b } => {
                self.alu(op, a, b)?;
                self.regs.advance_pc(instr.width());
            }

            // ==================== Stack ====================

            Instruction::Push { reg } => {
                let value = self.regs.read(reg)?;
                self.push(value)?;
                self.regs.advance_pc(instr.width());
            }

            Instruction::Pop { reg } => {
                let value = self.mem.read(self.regs.sp as usize)?;
                self.regs.write(reg, value)?;
                // An empty stack stays put instead of walking past its base
                if !self.regs.stack_is_empty() {
                    self.regs.sp = self.regs.sp.wrapping_add(1);
                }
                self.regs.advance_pc(instr.width());
            }

            // ==================== Control Flow ====================

            Instruction::Call { reg } => {
                let target = self.regs.read(reg)?;
                let return_addr = self.regs.pc + instr.width();
                let return_addr = u8::try_from(return_addr)
                    .map_err(|_| MemoryError::AddressOutOfRange(return_addr))?;
                self.push(return_addr)?;
                self.regs.jump(target);
            }

            Instruction::Ret => {
                let return_addr = self.mem.read(self.regs.sp as usize)?;
                self.regs.sp = self.regs.sp.wrapping_add(1);
                self.regs.jump(return_addr);
            }

            Instruction::Jmp { reg } => {
                let target = self.regs.read(reg)?;
                self.regs.jump(target);
            }

            Instruction::Jeq { reg } => {
                let target = self.regs.read(reg)?;
                if self.regs.fl.is_equal() {
                    self.regs.jump(target);
                } else {
                    self.regs.advance_pc(instr.width());
                }
            }

            Instruction::Jne { reg } => {
                let target = self.regs.read(reg)?;
                if !self.regs.fl.is_equal() {
                    self.regs.jump(target);
                } else {
                    self.regs.advance_pc(instr.width());
                }
            }
        }

        Ok(())
    }

    /// Run `op` on registers `reg_a` and `reg_b`.
    ///
    /// Nothing is written if the operation fails.
    fn alu(&mut self, op: AluOp, reg_a: u8, reg_b: u8) -> Result<(), CpuError> {
        let a = self.regs.read(reg_a)?;
        let b = if op.is_unary() { 0 } else { self.regs.read(reg_b)? };

        match alu::apply(op, a, b) {
            Ok(AluOutput::Value(value)) => self.regs.write(reg_a, value)?,
            Ok(AluOutput::Flags(flags)) => self.regs.fl = flags,
            Err(AluError::DivisionByZero) => return Err(CpuError::DivisionByZero { reg: reg_b }),
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    /// Decrement SP and store `value` at the new top of stack.
    fn push(&mut self, value: u8) -> Result<(), CpuError> {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.mem.write(self.regs.sp as usize, value)?;
        Ok(())
    }

    /// Diagnostic line: PC, the three bytes at PC, then R0-R7, all in hex.
    pub fn trace_line(&self) -> String {
        let pc = self.regs.pc;
        let mut line = format!("TRACE: {:02X} |", pc);

        for offset in 0..3 {
            match self.mem.read(pc + offset) {
                Ok(byte) => line.push_str(&format!(" {:02X}", byte)),
                Err(_) => line.push_str(" --"),
            }
        }
        line.push_str(" |");

        for value in self.regs.general() {
            line.push_str(&format!(" {:02X}", value));
        }

        line
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
///
/// All of them stop the machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("invalid instruction {opcode} ({opcode:#010b}) at address {pc}")]
    InvalidInstruction { opcode: u8, pc: usize },

    #[error("division by zero: R{reg} is 0")]
    DivisionByZero { reg: u8 },

    #[error(transparent)]
    Alu(#[from] AluError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("register error: {0}")]
    Register(#[from] RegisterError),

    #[error("decode error: {0}")]
    Decode(DecodeError),

    #[error("output error: {0}")]
    Output(String),
}
