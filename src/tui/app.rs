//! Debugger application state and logic.

use std::collections::HashSet;
use crate::{Cpu, CpuError, MachineConfig, Program};
use crate::asm::disasm::disassemble_word;

/// One row of the main-memory view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRow {
    pub addr: usize,
    pub text: String,
    /// The next instruction to execute.
    pub is_pc: bool,
    /// The word currently passing the head of the main line.
    pub is_head: bool,
    pub is_breakpoint: bool,
}

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reference.
    pub program: Program,
    /// Breakpoints (by main-memory address).
    pub breakpoints: HashSet<usize>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Program, config: MachineConfig) -> Result<Self, CpuError> {
        let mut cpu = Cpu::new(config)?;
        cpu.load_program(&program)?;
        let mem_scroll = cpu.base_address();

        Ok(Self {
            cpu,
            program,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll,
        })
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU halted: {:?}", self.cpu.state());
            self.running = false;
            return;
        }

        let pc = self.cpu.pc();
        let before = self.cpu.ticks();
        match self.cpu.step() {
            Ok(instr) => {
                self.status = format!(
                    "PC={:04}: {}  (+{} ticks)",
                    pc,
                    instr.mnemonic(),
                    self.cpu.ticks() - before
                );
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
            self.status = format!(
                "Halted after {} cycles, {} ticks",
                self.cpu.cycles(),
                self.cpu.ticks()
            );
            return;
        }

        self.step();

        // Stop in front of a breakpoint, not on it
        let pc = self.cpu.pc();
        if self.running && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={}", pc);
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={}", pc);
        }
    }

    /// Reload the program into a fresh machine of the same geometry.
    pub fn reset(&mut self) {
        self.cpu.reset();
        match self.cpu.load_program(&self.program) {
            Ok(()) => self.status = "Reset. Ready.".into(),
            Err(e) => self.status = format!("Error: {}", e),
        }
        self.running = false;
    }

    pub fn scroll_up(&mut self) {
        self.mem_scroll = self.mem_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        let last = self.cpu.config().main_words.saturating_sub(1);
        self.mem_scroll = (self.mem_scroll + 1).min(last);
    }

    /// Main-memory rows starting at the scroll offset.
    pub fn memory_rows(&self, lines: usize) -> Vec<MemoryRow> {
        let words = self.cpu.config().main_words;
        let pc = self.cpu.pc();
        let head = self.cpu.main_clock();

        (self.mem_scroll..words.min(self.mem_scroll + lines))
            .filter_map(|addr| {
                let word = self.cpu.read_main_word(addr).ok()?;
                Some(MemoryRow {
                    addr,
                    text: disassemble_word(word),
                    is_pc: addr == pc,
                    is_head: addr == head,
                    is_breakpoint: self.breakpoints.contains(&addr),
                })
            })
            .collect()
    }

    /// Label bound to a main-memory address, if any.
    pub fn label_at(&self, addr: usize) -> Option<&str> {
        let index = addr.checked_sub(self.program.base_address)?;
        self.program.labels_at(index).next()
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Program, config: MachineConfig) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Create app before touching the terminal so load errors print normally
    let mut app = DebuggerApp::new(program, config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        // Handle input
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
                        KeyCode::Up => app.scroll_up(),
                        KeyCode::Down => app.scroll_down(),
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
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
    use crate::assemble;

    fn app(source: &str) -> DebuggerApp {
        let config = MachineConfig::default();
        let program = assemble(source, &config).unwrap();
        DebuggerApp::new(program, config).unwrap()
    }

    #[test]
    fn test_run_stops_at_breakpoint() {
        let mut app = app("LAI 1\nPRA\nSTOP: PRA\nHLT");
        let stop = app.program.address_of("STOP").unwrap();
        app.breakpoints.insert(stop);
        app.run();
        while app.running {
            app.tick();
        }
        assert_eq!(app.cpu.pc(), stop);
        assert_eq!(app.cpu.output(), &[1]);
        assert!(app.cpu.is_running());
    }

    #[test]
    fn test_reset_reloads_program() {
        let mut app = app("LAI 5\nPRA\nHLT");
        app.step();
        app.step();
        app.reset();
        assert!(app.cpu.output().is_empty());
        assert_eq!(app.cpu.pc(), app.program.base_address);
    }

    #[test]
    fn test_memory_rows_mark_pc_and_head() {
        let app = app("START: LAI 5\nHLT");
        let rows = app.memory_rows(4);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "LAI 5");
        assert!(rows[0].is_pc && rows[0].is_head);
        assert_eq!(app.label_at(rows[0].addr), Some("START"));
    }
}
