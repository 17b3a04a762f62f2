// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

// Test helper utilities shared by the integration tests
#![allow(dead_code)]

use tokforth::host::TextLines;
use tokforth::mem::Cell;
use tokforth::{RunOutcome, Vm, VmConfig, VmError};

/// Create a VM with the default sizes and the prelude loaded
pub fn create_test_vm() -> Result<Vm, VmError> {
    Vm::new(VmConfig::default())
}

/// Evaluate `source` and return the whole parameter stack, bottom first
pub fn eval(vm: &mut Vm, source: &str) -> Result<Vec<Cell>, VmError> {
    vm.evaluate(source)?;
    Ok(vm.stack())
}

/// Evaluate `source` on a fresh VM and return the stack
pub fn eval_fresh(source: &str) -> Result<Vec<Cell>, VmError> {
    let mut vm = create_test_vm()?;
    eval(&mut vm, source)
}

/// Evaluate `source` on a fresh VM and return what it printed
pub fn output_of(source: &str) -> Result<String, VmError> {
    let mut vm = create_test_vm()?;
    vm.evaluate(source)?;
    Ok(vm.take_output())
}

/// Evaluate `source` on `vm` and return only what it printed
pub fn output_after(vm: &mut Vm, source: &str) -> Result<String, VmError> {
    vm.take_output();
    vm.evaluate(source)?;
    Ok(vm.take_output())
}

/// Feed `source` through the recovering outer loop, the way a terminal
/// session would
pub fn run_session(vm: &mut Vm, source: &str) -> RunOutcome {
    vm.set_line_source(TextLines::new(source));
    vm.run()
}
