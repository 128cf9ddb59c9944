//! Debugger application state and logic.

use crate::Cpu;
use crate::asm::disasm::disassemble_instruction;
use crate::cpu::decode::decode;
use crate::cpu::MEMORY_SIZE;
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Loaded program bytes, kept for reset.
    pub program: Vec<u8>,
    /// Everything the program has printed so far.
    pub output: Vec<u8>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<usize>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows of 8 bytes.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>) -> Self {
        let mut cpu = Cpu::new();
        let status = match cpu.load_program(&program) {
            Ok(()) => "Ready. Press 's' to step, 'r' to run, 'q' to quit.".to_string(),
            Err(e) => format!("Load error: {}", e),
        };

        Self {
            cpu,
            program,
            output: Vec::new(),
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status,
            mem_scroll: 0,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            return;
        }

        let pc = self.cpu.regs.pc;
        match self.cpu.step(&mut self.output) {
            Ok(instr) => {
                let text = crate::asm::disasm::format_instruction(&instr);
                self.status = format!("PC={:03}: {}", pc, text);
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Stopped after {} cycles ({:?})", self.cpu.cycles, self.cpu.state);
            return;
        }

        self.step();

        // Stop on arrival so the breakpoint instruction has not run yet
        let pc = self.cpu.regs.pc;
        if self.running && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={:03}", pc);
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:03}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:03}", pc);
        }
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.cpu = Cpu::new();
        let _ = self.cpu.load_program(&self.program);
        self.output.clear();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Lines printed by the program so far.
    pub fn output_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.output)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Instruction start addresses, realigned at PC when a jump lands
    /// inside what a linear walk would read as operands.
    fn instruction_starts(&self) -> Vec<usize> {
        let pc = self.cpu.regs.pc;
        let mut starts = Vec::new();
        let mut addr = 0;

        while addr < MEMORY_SIZE {
            starts.push(addr);
            let width = self.width_at(addr);
            addr = if addr < pc && addr + width > pc { pc } else { addr + width };
        }

        starts
    }

    fn width_at(&self, addr: usize) -> usize {
        let byte = |offset: usize| self.cpu.mem.read(addr + offset).unwrap_or(0);
        decode(byte(0), byte(1), byte(2)).map(|i| i.width()).unwrap_or(1)
    }

    /// Get disassembly around current PC: (address, text, is_current).
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let pc = self.cpu.regs.pc;
        let starts = self.instruction_starts();
        let current = starts.iter().position(|&a| a == pc).unwrap_or(0);
        let first = current.saturating_sub(lines / 2);

        starts[first..]
            .iter()
            .take(lines)
            .map(|&addr| {
                let byte = |offset: usize| self.cpu.mem.read(addr + offset).unwrap_or(0);
                let text = disassemble_instruction(byte(0), byte(1), byte(2));
                (addr, text, addr == pc)
            })
            .collect()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(program);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => {
                            app.mem_scroll = app.mem_scroll.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            if app.mem_scroll < MEMORY_SIZE / 8 - 1 {
                                app.mem_scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    fn app_for(source: &str) -> DebuggerApp {
        DebuggerApp::new(assemble(source).unwrap())
    }

    #[test]
    fn test_step_collects_output() {
        let mut app = app_for("LDI R0,72\nPRN R0\nHLT");
        app.step();
        app.step();

        assert_eq!(app.output_lines(), vec!["72"]);
        assert!(app.status.contains("PRN R0"));
    }

    #[test]
    fn test_run_stops_at_breakpoint() {
        let mut app = app_for("LDI R0,1\nPRN R0\nPRN R0\nHLT");
        app.breakpoints.insert(5);
        app.run();
        for _ in 0..10 {
            app.tick();
        }

        assert!(!app.running);
        assert_eq!(app.cpu.regs.pc, 5);
        assert_eq!(app.output_lines(), vec!["1"]);
    }

    #[test]
    fn test_reset_restores_program() {
        let mut app = app_for("LDI R0,1\nPRN R0\nHLT");
        app.run();
        for _ in 0..5 {
            app.tick();
        }
        assert!(app.cpu.is_halted());

        app.reset();
        assert!(app.cpu.is_running());
        assert!(app.output.is_empty());
        assert_eq!(app.cpu.mem.read(0).unwrap(), 0x82);
    }

    #[test]
    fn test_disassembly_follows_pc() {
        let mut app = app_for("LDI R0,1\nPRN R0\nHLT");
        app.step();

        let lines = app.get_disassembly(3);
        assert_eq!(lines[0], (0, "LDI R0,1".to_string(), false));
        assert_eq!(lines[1], (3, "PRN R0".to_string(), true));
        assert_eq!(lines[2], (5, "HLT".to_string(), false));
    }

    #[test]
    fn test_disassembly_realigns_on_jump_target() {
        let mut app = app_for("HLT");
        // PC in the middle of an LDI's operands
        app.cpu.mem.write(10, 0x82).unwrap();
        app.cpu.regs.pc = 11;

        let lines = app.get_disassembly(4);
        assert!(lines.iter().any(|(addr, _, current)| *addr == 11 && *current));
    }
}
