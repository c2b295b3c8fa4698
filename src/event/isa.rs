//! Instruction library of the event-driven CPU.
//!
//! Unlike the linear CPU's fixed table, this catalogue is a value: drivers
//! build their own library to give bodies to the declared extension points
//! or to add instructions, then hand it to
//! [`EventVm::with_inst_lib`](crate::event::vm::EventVm::with_inst_lib).
//! Handlers are pure functions over `(vm, instruction)`; the opcode id of
//! an instruction is its index in the library.

use crate::errors::VmError;
use crate::event::vm::{EventVm, Instruction};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// An instruction body. Handlers must tolerate the absence of a current
/// state (they are no-ops without one).
pub type InstFn = fn(&mut EventVm, &Instruction);

/// One catalogue entry.
pub struct InstDef {
    pub name: &'static str,
    pub func: InstFn,
    pub num_args: usize,
    pub desc: &'static str,
}

/// Catalogue of instruction definitions, addressed by opcode id.
#[derive(Default)]
pub struct InstLib {
    defs: Vec<InstDef>,
    name_map: HashMap<&'static str, usize>,
}

impl InstLib {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction definition and returns its opcode id.
    pub fn add_inst(
        &mut self,
        name: &'static str,
        func: InstFn,
        num_args: usize,
        desc: &'static str,
    ) -> usize {
        let id = self.defs.len();
        self.defs.push(InstDef {
            name,
            func,
            num_args,
            desc,
        });
        self.name_map.insert(name, id);
        id
    }

    pub fn size(&self) -> usize {
        self.defs.len()
    }

    /// Returns the definition at `id`, if any.
    pub fn get(&self, id: usize) -> Option<&InstDef> {
        self.defs.get(id)
    }

    pub fn name_of(&self, id: usize) -> Option<&'static str> {
        self.defs.get(id).map(|d| d.name)
    }

    pub fn arity_of(&self, id: usize) -> Option<usize> {
        self.defs.get(id).map(|d| d.num_args)
    }

    pub fn describe(&self, id: usize) -> Option<&'static str> {
        self.defs.get(id).map(|d| d.desc)
    }

    /// Looks an opcode id up by instruction name.
    pub fn id_of(&self, name: &str) -> Result<usize, VmError> {
        self.name_map
            .get(name)
            .copied()
            .ok_or_else(|| VmError::UnknownInstruction(name.to_string()))
    }
}

/// Returns the default instruction library.
///
/// The arithmetic instructions carry full bodies. Everything from
/// `TestEqu` through `Nop` is a declared extension point: registered with
/// its name and arity but a no-op body, for the driver to redefine.
pub fn default_lib() -> Arc<InstLib> {
    static LIB: OnceLock<Arc<InstLib>> = OnceLock::new();
    LIB.get_or_init(|| {
        let mut lib = InstLib::new();
        lib.add_inst("Inc", inst_inc, 1, "Increment value in local memory Arg1");
        lib.add_inst("Dec", inst_dec, 1, "Decrement value in local memory Arg1");
        lib.add_inst("Not", inst_not, 1, "Logically toggle value in local memory Arg1");
        lib.add_inst("Add", inst_add, 3, "Local memory: Arg3 = Arg1 + Arg2");
        lib.add_inst("Sub", inst_sub, 3, "Local memory: Arg3 = Arg1 - Arg2");
        lib.add_inst("Mult", inst_mult, 3, "Local memory: Arg3 = Arg1 * Arg2");
        lib.add_inst("Div", inst_div, 3, "Local memory: Arg3 = Arg1 / Arg2");
        lib.add_inst("Mod", inst_mod, 3, "Local memory: Arg3 = Arg1 % Arg2");
        lib.add_inst("TestEqu", inst_nop, 3, "No-op; body left to the driver");
        lib.add_inst("TestNEqu", inst_nop, 3, "No-op; body left to the driver");
        lib.add_inst("TestLess", inst_nop, 3, "No-op; body left to the driver");
        lib.add_inst("If", inst_nop, 1, "No-op; body left to the driver");
        lib.add_inst("While", inst_nop, 1, "No-op; body left to the driver");
        lib.add_inst("Countdown", inst_nop, 1, "No-op; body left to the driver");
        lib.add_inst("Break", inst_nop, 0, "No-op; body left to the driver");
        lib.add_inst("Close", inst_nop, 0, "No-op; body left to the driver");
        lib.add_inst("Call", inst_nop, 0, "No-op; body left to the driver");
        lib.add_inst("Return", inst_nop, 0, "No-op; body left to the driver");
        lib.add_inst("SetMem", inst_nop, 2, "No-op; body left to the driver");
        lib.add_inst("CopyMem", inst_nop, 2, "No-op; body left to the driver");
        lib.add_inst("SwapMem", inst_nop, 2, "No-op; body left to the driver");
        lib.add_inst("Input", inst_nop, 2, "No-op; body left to the driver");
        lib.add_inst("Output", inst_nop, 2, "No-op; body left to the driver");
        lib.add_inst("Commit", inst_nop, 2, "No-op; body left to the driver");
        lib.add_inst("Pull", inst_nop, 2, "No-op; body left to the driver");
        lib.add_inst("Nop", inst_nop, 0, "No operation");
        Arc::new(lib)
    })
    .clone()
}

// -- Default instruction bodies --
//
// Memories materialize lazily, so every body must handle positions that do
// not exist yet.

fn inst_inc(vm: &mut EventVm, inst: &Instruction) {
    let Some(state) = vm.get_cur_state_mut() else {
        return;
    };
    *state.access_local(inst.args[0] as i64) += 1.0;
}

fn inst_dec(vm: &mut EventVm, inst: &Instruction) {
    let Some(state) = vm.get_cur_state_mut() else {
        return;
    };
    *state.access_local(inst.args[0] as i64) -= 1.0;
}

fn inst_not(vm: &mut EventVm, inst: &Instruction) {
    let Some(state) = vm.get_cur_state_mut() else {
        return;
    };
    let key = inst.args[0] as i64;
    let toggled = if state.get_local(key) == 0.0 { 1.0 } else { 0.0 };
    state.set_local(key, toggled);
}

fn inst_add(vm: &mut EventVm, inst: &Instruction) {
    let Some(state) = vm.get_cur_state_mut() else {
        return;
    };
    let sum = *state.access_local(inst.args[0] as i64) + *state.access_local(inst.args[1] as i64);
    state.set_local(inst.args[2] as i64, sum);
}

fn inst_sub(vm: &mut EventVm, inst: &Instruction) {
    let Some(state) = vm.get_cur_state_mut() else {
        return;
    };
    let diff = *state.access_local(inst.args[0] as i64) - *state.access_local(inst.args[1] as i64);
    state.set_local(inst.args[2] as i64, diff);
}

fn inst_mult(vm: &mut EventVm, inst: &Instruction) {
    let Some(state) = vm.get_cur_state_mut() else {
        return;
    };
    let product =
        *state.access_local(inst.args[0] as i64) * *state.access_local(inst.args[1] as i64);
    state.set_local(inst.args[2] as i64, product);
}

fn inst_div(vm: &mut EventVm, inst: &Instruction) {
    let denom = match vm.get_cur_state_mut() {
        Some(state) => *state.access_local(inst.args[1] as i64),
        None => return,
    };
    if denom == 0.0 {
        vm.count_error();
        return;
    }
    let Some(state) = vm.get_cur_state_mut() else {
        return;
    };
    let num = *state.access_local(inst.args[0] as i64);
    state.set_local(inst.args[2] as i64, num / denom);
}

fn inst_mod(vm: &mut EventVm, inst: &Instruction) {
    let base = match vm.get_cur_state_mut() {
        Some(state) => *state.access_local(inst.args[1] as i64) as i64,
        None => return,
    };
    if base == 0 {
        vm.count_error();
        return;
    }
    let Some(state) = vm.get_cur_state_mut() else {
        return;
    };
    let num = *state.access_local(inst.args[0] as i64) as i64;
    state.set_local(inst.args[2] as i64, (num % base) as f64);
}

fn inst_nop(_vm: &mut EventVm, _inst: &Instruction) {}
