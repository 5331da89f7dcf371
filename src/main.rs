//! Delay-Line Emulator - CLI Entry Point
//!
//! Commands:
//! - `delayline-emu run <program>` - Run an ASM source or a JSON image
//! - `delayline-emu debug <program>` - Interactive debugger
//! - `delayline-emu asm <source>` - Assemble to a JSON image
//! - `delayline-emu disasm <image>` - Disassemble a JSON image

use std::path::Path;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use delayline::{assemble, load_image, save_image, Cpu, MachineConfig, Program, ProgramImage};

#[derive(Parser)]
#[command(name = "delayline-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "A bit-serial emulator of a stored-program delay-line computer")]
struct Cli {
    #[command(flatten)]
    machine: MachineArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by every command.
#[derive(Args)]
struct MachineArgs {
    /// Machine geometry as JSON (main_words, data_banks, bank_words)
    #[arg(long, global = true)]
    config: Option<String>,
    /// Override the number of words in main memory
    #[arg(long, global = true)]
    main_words: Option<usize>,
    /// Log every executed instruction to stderr
    #[arg(short, long, global = true)]
    trace: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the ASM source or JSON image to execute
        program: String,
        /// Maximum number of cycles to run (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
    },
    /// Interactive debugger
    Debug {
        /// Path to the ASM source or JSON image to debug
        program: String,
    },
    /// Assemble source to a JSON image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a JSON image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.machine.trace);
    let config = machine_config(&cli.machine);

    match cli.command {
        Some(Commands::Run { program, max_cycles }) => {
            run_program(&program, config, max_cycles);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program, config);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, config, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        None => {
            println!("Delay-Line Emulator v0.1.0");
            println!("A bit-serial stored-program computer emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Send library events to stderr. `--trace` shows one line per instruction.
fn init_logging(trace: bool) {
    let level = if trace { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn machine_config(args: &MachineArgs) -> MachineConfig {
    let mut config = match &args.config {
        Some(path) => match MachineConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => MachineConfig::default(),
    };

    if let Some(words) = args.main_words {
        config.main_words = words;
    }
    if let Err(e) = config.validate() {
        eprintln!("❌ Invalid machine configuration: {}", e);
        std::process::exit(1);
    }
    config
}

/// Load a program, assembling it first if it is a source file.
///
/// Images carry the main memory size they were assembled for, which takes
/// precedence over the configured one.
fn load_program_file(path: &str, config: &mut MachineConfig) -> Program {
    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source, config) {
            Ok(program) => {
                println!("📝 Assembled {} words at base {}", program.len(), program.base_address);
                program
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_image(path) {
            Ok(image) => {
                println!("📂 Loaded {} words", image.program.len());
                config.main_words = image.main_words;
                image.program
            }
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_program(path: &str, mut config: MachineConfig, max_cycles: u64) {
    println!("🔧 Running: {}", path);

    let program = load_program_file(path, &mut config);
    if program.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    // Create CPU and load program
    let mut cpu = match Cpu::new(config) {
        Ok(cpu) => cpu,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = cpu.load_program(&program) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    println!();
    println!("━━━ Output ━━━");

    let mut printed = 0;
    while cpu.is_running() && cpu.cycles() < max_cycles {
        let pc = cpu.pc();
        let result = cpu.step();

        for value in &cpu.output()[printed..] {
            println!("{}", value);
        }
        printed = cpu.output().len();

        if let Err(e) = result {
            eprintln!("❌ CPU error at PC={}: {}", pc, e);
            std::process::exit(1);
        }
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cpu.cycles());
    println!("Ticks:  {}", cpu.ticks());
    println!("State:  {:?}", cpu.state());
    println!("{:?}", cpu.regs());

    let data = cpu.data_memory();
    for bank in 0..data.channel_count() {
        let Ok(words) = data.dump(bank) else { continue };
        for (word, value) in words.iter().enumerate().filter(|(_, v)| v.value() != 0) {
            println!("data[{}][{}] = {}", bank, word, value.to_signed());
        }
    }

    if cpu.is_running() {
        println!();
        println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, mut config: MachineConfig) {
    use delayline::tui::run_debugger;

    println!("🔍 Loading: {}", path);

    let program = load_program_file(path, &mut config);
    if program.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(program, config) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _config: MachineConfig) {
    eprintln!("❌ Built without the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, config: MachineConfig, output: Option<String>) {
    let out_path = output.unwrap_or_else(|| default_image_path(source_path));
    if Path::new(&out_path) == Path::new(source_path) {
        eprintln!("❌ Output path would overwrite the source: {}", out_path);
        std::process::exit(1);
    }

    println!("📝 Assembling: {} → {}", source_path, out_path);

    // Read source
    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    // Assemble
    let program = match assemble(&source, &config) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} words at base {}", program.len(), program.base_address);

    // Save image
    let image = ProgramImage::new(program, config.main_words);
    if let Err(e) = save_image(&out_path, &image) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

/// Image path next to the source, with the extension replaced by `.json`.
fn default_image_path(source_path: &str) -> String {
    Path::new(source_path).with_extension("json").to_string_lossy().into_owned()
}

fn disassemble_file(image_path: &str) {
    use delayline::asm::disasm::disassemble;

    println!("📖 Disassembling: {}", image_path);
    println!();

    let image = match load_image(image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", disassemble(&image.program));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_image_path() {
        assert_eq!(default_image_path("prog.asm"), "prog.json");
        assert_eq!(default_image_path("dir/prog.txt"), "dir/prog.json");
        assert_eq!(default_image_path("my.asm.src"), "my.asm.json");
        assert_eq!(default_image_path("prog"), "prog.json");
    }

    #[test]
    fn test_cli_parses_global_options() {
        let cli = Cli::try_parse_from(["delayline-emu", "asm", "prog.asm", "--main-words", "32"]).unwrap();
        assert_eq!(cli.machine.main_words, Some(32));
        assert!(matches!(cli.command, Some(Commands::Asm { ref source, output: None }) if source == "prog.asm"));
    }
}
