//! Printing the machine state at the end of a run.
use std::io::Write;

use termcolor::{self, ColorChoice, ColorSpec, StandardStream, WriteColor};

use base::prelude::*;
use cpu::AltoSystem;

fn get_colour_choice() -> termcolor::ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Writes register names in one colour and their values in another.
pub struct RegisterWriter {
    stream: StandardStream,
    name_colour: ColorSpec,
    value_colour: ColorSpec,
}

impl RegisterWriter {
    pub fn new() -> RegisterWriter {
        let mut name_colour = ColorSpec::new();
        name_colour.set_fg(Some(termcolor::Color::Cyan));
        let mut value_colour = ColorSpec::new();
        value_colour.set_fg(Some(termcolor::Color::Yellow)).set_bold(true);
        RegisterWriter {
            stream: StandardStream::stdout(get_colour_choice()),
            name_colour,
            value_colour,
        }
    }

    fn field(&mut self, name: &str, value: u16) -> Result<(), std::io::Error> {
        self.stream.set_color(&self.name_colour)?;
        write!(self.stream, "{name:>4}")?;
        self.stream.reset()?;
        write!(self.stream, " ")?;
        self.stream.set_color(&self.value_colour)?;
        write!(self.stream, "{value:06o}")?;
        self.stream.reset()
    }

    /// Print the shared registers, R0-R37 and the state of the
    /// current task.
    pub fn write_system(&mut self, system: &AltoSystem) -> Result<(), std::io::Error> {
        let cpu = system.cpu();
        let regs = cpu.registers();
        let task = cpu.current_task();
        writeln!(
            self.stream,
            "{} after {} cycles ({:?} simulated)",
            system.config().system_type,
            system.cycles(),
            system.elapsed()
        )?;
        for (name, value) in [
            ("T", regs.t),
            ("L", regs.l),
            ("M", regs.m),
            ("IR", regs.ir),
            ("SKIP", regs.skip),
            ("RMR", regs.rmr),
        ] {
            self.field(name, value)?;
            write!(self.stream, "  ")?;
        }
        writeln!(self.stream)?;
        for (row, chunk) in regs.r.chunks(8).enumerate() {
            for (col, value) in chunk.iter().enumerate() {
                self.field(&format!("R{:o}", row * 8 + col), *value)?;
                write!(self.stream, "  ")?;
            }
            writeln!(self.stream)?;
        }
        match cpu.mpc(task) {
            Some(mpc) => {
                let instruction = cpu.control_store().instruction(mpc, task);
                writeln!(
                    self.stream,
                    "task {task} ({}) at {mpc:04o}: {}",
                    cpu.bank(task),
                    instruction.disassemble(Some(task))
                )?;
            }
            None => writeln!(self.stream, "task {task}")?,
        }
        self.stream.flush()
    }
}
