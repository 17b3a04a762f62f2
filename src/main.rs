// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tokforth::host::{StdHost, TextLines};
use tokforth::{Mode, RunOutcome, Vm, VmConfig, VmError};
use tracing::error;
use tracing_subscriber::prelude::*;

const LOG_FILTER: &str = "TOKFORTH_LOG";

fn parse_memsize(val: &str) -> clap::error::Result<usize> {
    let last_char = val.chars().last().ok_or_else(|| {
        clap::error::Error::raw(clap::error::ErrorKind::ValueValidation, "empty value")
    })?;
    let (unit, digits) = match last_char {
        'b' => (1, &val[..val.len() - 1]),
        'k' => (1024, &val[..val.len() - 1]),
        'M' => (1024 * 1024, &val[..val.len() - 1]),
        _ => (1, val),
    };
    let num: usize = digits
        .parse()
        .map_err(|e| clap::error::Error::raw(clap::error::ErrorKind::ValueValidation, e))?;
    Ok(num * unit)
}

#[derive(Parser)]
#[command(name = "tokforth", version)]
/// Token-threaded Forth interpreter
///
/// Includes the given files in order, then reads standard input line by line.
/// Set TOKFORTH_LOG (e.g. `TOKFORTH_LOG=tokforth=debug`) to see VM logs.
struct Cli {
    /// Forth source files to include before reading input.
    files: Vec<PathBuf>,
    /// Evaluate this line after the files and exit instead of reading stdin.
    #[arg(short = 'e', long = "exec")]
    exec: Option<String>,
    /// Load a user image (written by `save`) before anything else.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Data space size; suffix with 'b', 'k' or 'M'.
    #[arg(long, default_value = "256k", value_parser = parse_memsize)]
    data_space_size: usize,
    #[arg(long, default_value = "16k", value_parser = parse_memsize)]
    parameter_stack_size: usize,
    #[arg(long, default_value = "16k", value_parser = parse_memsize)]
    return_stack_size: usize,
    #[arg(long, default_value_t = 1024)]
    source_size: usize,
    #[arg(long, default_value_t = 1024)]
    word_size: usize,
    #[arg(long, default_value_t = 1024)]
    pad_size: usize,
    /// Do not print the parameter stack after each interactive line.
    #[arg(long)]
    hide_stack: bool,
}

impl Cli {
    fn config(&self) -> VmConfig {
        VmConfig {
            parameter_stack_size: self.parameter_stack_size,
            return_stack_size: self.return_stack_size,
            data_space_size: self.data_space_size,
            pad_size: self.pad_size,
            source_size: self.source_size,
            word_size: self.word_size,
            autoflush: false,
        }
    }
}

fn setup_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_env(LOG_FILTER);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).with_filter(filter))
        .init();
}

fn prepare(vm: &mut Vm, cli: &Cli) -> Result<(), VmError> {
    if let Some(image) = &cli.image {
        vm.load_image_file(image, false)?;
    }
    for file in &cli.files {
        vm.include_file(file)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    setup_tracing();
    let cli = Cli::parse();

    let mut vm = match Vm::new(cli.config()) {
        Ok(vm) => vm,
        Err(err) => {
            error!(error = %err, "cannot start the VM");
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    vm.set_host(StdHost);

    match prepare(&mut vm, &cli) {
        Ok(()) => {}
        Err(VmError::Bye) => return ExitCode::SUCCESS,
        Err(err) => {
            print!("{}", vm.take_output());
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    }

    if let Some(line) = &cli.exec {
        vm.set_line_source(TextLines::new(line));
        let outcome = vm.run();
        print!("{}", vm.take_output());
        if outcome == RunOutcome::EndOfInput && vm.mode() == Mode::Compiling {
            eprintln!("input ended inside a definition");
        }
        return ExitCode::SUCCESS;
    }

    repl(&mut vm, !cli.hide_stack)
}

/// Interprets stdin one line at a time, printing output and the stack after
/// each line like an interactive Forth prompt.
fn repl(vm: &mut Vm, show_stack: bool) -> ExitCode {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let result = vm.evaluate(&line);
        print!("{}", vm.take_output());
        match result {
            Ok(()) => {}
            Err(VmError::Bye) => return ExitCode::SUCCESS,
            Err(err) => {
                println!("{err}");
                if let Err(fatal) = vm.reset() {
                    error!(error = %fatal, "reset failed");
                    return ExitCode::FAILURE;
                }
            }
        }
        if show_stack && vm.mode() == Mode::Executing {
            println!(" ok {}", vm.dot_s());
        }
        let _ = io::stdout().flush();
    }
    ExitCode::SUCCESS
}
