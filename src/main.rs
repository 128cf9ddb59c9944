//! LS-8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu run <program>` - Run an `.ls8` or `.asm` file
//! - `ls8-emu debug <program>` - Interactive debugger
//! - `ls8-emu asm <source>` - Assemble to `.ls8`
//! - `ls8-emu disasm <program>` - Disassemble an `.ls8` file

use std::io::Write;
use std::process;
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version)]
#[command(about = "An emulator for the LS-8 8-bit teaching computer")]
struct Cli {
    /// Log more to stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .ls8 or .asm file to execute
        program: String,
        /// Stop after this many instructions
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Print a trace line before every instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        dump_state: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the .ls8 or .asm file to debug
        program: String,
    },
    /// Assemble source to .ls8
    Asm {
        /// Path to the source file
        source: String,
        /// Output .ls8 file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an .ls8 file to readable text
    Disasm {
        /// Path to the .ls8 file
        program: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Run { program, max_cycles, trace, dump_state }) => {
            run_program(&program, max_cycles, trace, dump_state);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(&program);
        }
        None => {
            println!("LS-8 Emulator v{}", env!("CARGO_PKG_VERSION"));
            println!("An 8-bit, 8-register teaching computer");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

/// Report a fatal error and exit with a non-zero status.
fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    process::exit(1);
}

/// Read a program as bytes, assembling `.asm` sources first.
fn load_bytes(path: &str) -> Vec<u8> {
    use ls8::{assemble, load_program_file};

    if path.ends_with(".asm") {
        let source = std::fs::read_to_string(path)
            .unwrap_or_else(|e| fail(format!("Failed to read file: {}", e)));
        let bytes = assemble(&source)
            .unwrap_or_else(|e| fail(format!("Assembly error: {}", e)));
        tracing::info!(path, bytes = bytes.len(), "assembled program");
        bytes
    } else {
        load_program_file(path)
            .unwrap_or_else(|e| fail(format!("Failed to load program: {}", e)))
            .bytes
    }
}

fn run_program(path: &str, max_cycles: Option<u64>, trace: bool, dump_state: bool) {
    use ls8::Cpu;

    let bytes = load_bytes(path);
    if bytes.is_empty() {
        fail("No instructions to execute");
    }

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&bytes) {
        fail(format!("Failed to load program: {}", e));
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    while cpu.is_running() && max_cycles.map_or(true, |max| cpu.cycles < max) {
        if trace {
            let _ = writeln!(out, "{}", cpu.trace_line());
        }

        if let Err(e) = cpu.step(&mut out) {
            let _ = out.flush();
            fail(e);
        }
    }

    if dump_state {
        match serde_json::to_string_pretty(&cpu) {
            Ok(json) => {
                let _ = writeln!(out, "{}", json);
            }
            Err(e) => fail(format!("Failed to serialize state: {}", e)),
        }
    }
    let _ = out.flush();

    if cpu.is_running() {
        fail(format!(
            "Reached max cycles limit ({}) without halting",
            cpu.cycles
        ));
    }
    tracing::debug!(cycles = cpu.cycles, "program halted");
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    let bytes = load_bytes(path);
    if bytes.is_empty() {
        fail("No instructions to execute");
    }

    if let Err(e) = ls8::run_debugger(bytes) {
        fail(format!("Debugger error: {}", e));
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str) {
    fail("The debugger needs the `tui` feature");
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use ls8::{assemble, save_program_file, ProgramFile};

    let out_path = output.unwrap_or_else(|| {
        match source_path.strip_suffix(".asm") {
            Some(stem) => format!("{}.ls8", stem),
            None => format!("{}.ls8", source_path),
        }
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = std::fs::read_to_string(source_path)
        .unwrap_or_else(|e| fail(format!("Failed to read file: {}", e)));

    let bytes = assemble(&source)
        .unwrap_or_else(|e| fail(format!("Assembly error: {}", e)));

    println!("✓ Assembled {} bytes", bytes.len());

    if let Err(e) = save_program_file(&out_path, &ProgramFile::from_bytes(&bytes)) {
        fail(format!("Failed to save program: {}", e));
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(path: &str) {
    use ls8::disassemble;

    let program = ls8::load_program_file(path)
        .unwrap_or_else(|e| fail(format!("Failed to load program: {}", e)));

    println!("{}", disassemble(&program.bytes));
}
